//! Role and ownership checks shared by pages and actions.
//!
//! `authorize` runs two stages: the session role must equal the required
//! role, then the ownership relation is looked up in storage. Both must pass.
//! Pages and actions differ only in how a denial is reported.

use axum::response::{IntoResponse, Redirect, Response};
use sqlx::SqlitePool;

use crate::session::{Role, Session};

use super::error::ApiError;

/// Where pages send callers who may not see them
pub const DASHBOARD_PATH: &str = "/dashboard";

/// Relation between the caller and the resource being touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership<'a> {
    /// No resource relation needed
    Any,
    /// The caller is the coordinator of this center
    CoordinatesCenter(&'a str),
    /// The caller is a lecturer assigned to this center
    AssignedToCenter(&'a str),
    /// The caller submitted this claim
    SubmittedClaim(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requirement<'a> {
    pub role: Role,
    pub ownership: Ownership<'a>,
}

impl<'a> Requirement<'a> {
    pub fn role(role: Role) -> Self {
        Self {
            role,
            ownership: Ownership::Any,
        }
    }

    pub fn owning(mut self, ownership: Ownership<'a>) -> Self {
        self.ownership = ownership;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    RoleMismatch { required: Role, actual: Role },
    NotOwner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allowed,
    Denied(DenialReason),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allowed)
    }
}

async fn owns(
    db: &SqlitePool,
    user_id: &str,
    ownership: Ownership<'_>,
) -> Result<bool, sqlx::Error> {
    let (sql, resource_id) = match ownership {
        Ownership::Any => return Ok(true),
        Ownership::CoordinatesCenter(center_id) => (
            "SELECT COUNT(*) FROM centers WHERE id = ? AND coordinator_id = ?",
            center_id,
        ),
        Ownership::AssignedToCenter(center_id) => (
            "SELECT COUNT(*) FROM users WHERE center_id = ? AND id = ? AND role = 'LECTURER'",
            center_id,
        ),
        Ownership::SubmittedClaim(claim_id) => (
            "SELECT COUNT(*) FROM claims WHERE id = ? AND submitted_by_id = ?",
            claim_id,
        ),
    };

    let count: i64 = sqlx::query_scalar(sql)
        .bind(resource_id)
        .bind(user_id)
        .fetch_one(db)
        .await?;
    Ok(count > 0)
}

/// Decide whether the session may act under `requirement`
pub async fn authorize(
    db: &SqlitePool,
    session: &Session,
    requirement: Requirement<'_>,
) -> Result<AccessDecision, sqlx::Error> {
    if session.role != requirement.role {
        return Ok(AccessDecision::Denied(DenialReason::RoleMismatch {
            required: requirement.role,
            actual: session.role,
        }));
    }

    if !owns(db, &session.user_id, requirement.ownership).await? {
        return Ok(AccessDecision::Denied(DenialReason::NotOwner));
    }

    Ok(AccessDecision::Allowed)
}

/// Page-side rejection: a redirect, or a failure that could not be decided
#[derive(Debug)]
pub enum PageRejection {
    Redirect(&'static str),
    Failed(ApiError),
}

impl IntoResponse for PageRejection {
    fn into_response(self) -> Response {
        match self {
            PageRejection::Redirect(path) => Redirect::to(path).into_response(),
            PageRejection::Failed(err) => err.into_response(),
        }
    }
}

impl From<ApiError> for PageRejection {
    fn from(err: ApiError) -> Self {
        PageRejection::Failed(err)
    }
}

impl From<sqlx::Error> for PageRejection {
    fn from(err: sqlx::Error) -> Self {
        PageRejection::Failed(err.into())
    }
}

/// Guard a page. Any denial redirects to the dashboard.
pub async fn guard_page(
    db: &SqlitePool,
    session: &Session,
    requirement: Requirement<'_>,
) -> Result<(), PageRejection> {
    match authorize(db, session, requirement).await? {
        AccessDecision::Allowed => Ok(()),
        AccessDecision::Denied(reason) => {
            tracing::debug!(
                user_id = %session.user_id,
                ?reason,
                "Page access denied, redirecting to dashboard"
            );
            Err(PageRejection::Redirect(DASHBOARD_PATH))
        }
    }
}

/// Guard an action. Any denial is the same generic failure result.
pub async fn require_action(
    db: &SqlitePool,
    session: &Session,
    requirement: Requirement<'_>,
) -> Result<(), ApiError> {
    match authorize(db, session, requirement).await? {
        AccessDecision::Allowed => Ok(()),
        AccessDecision::Denied(reason) => {
            tracing::info!(
                user_id = %session.user_id,
                role = %session.role,
                ?reason,
                "Action denied"
            );
            Err(ApiError::not_authorized())
        }
    }
}
