//! Role pages. Each page guards itself, then returns its view data as JSON.
//!
//! Denials redirect to the dashboard, so a caller cannot distinguish a page
//! it may not see from one that does not exist.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::cache::keys;
use crate::db::{
    self, AuditLogQuery, ClaimListQuery, ClaimResponse, ClaimScope, ClaimStatus,
};
use crate::session::{Role, Session};
use crate::AppState;

use super::authz::{guard_page, Ownership, PageRejection, Requirement, DASHBOARD_PATH};
use super::error::ApiError;

type PageResult = Result<Json<Value>, PageRejection>;

/// GET /
pub async fn root() -> Redirect {
    Redirect::to(DASHBOARD_PATH)
}

/// GET /dashboard - headline numbers for the caller's role
pub async fn dashboard(State(state): State<Arc<AppState>>, session: Session) -> PageResult {
    let key = keys::dashboard(&session.user_id);
    if let Some(view) = state.views.get(&key) {
        return Ok(Json(view));
    }

    let stats = match session.role {
        Role::Registry => {
            let centers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM centers")
                .fetch_one(&state.db)
                .await?;
            let mut users = serde_json::Map::new();
            for role in Role::ALL {
                let count = db::count_users_with_role(&state.db, role).await?;
                users.insert(role.as_str().to_lowercase(), json!(count));
            }
            let claims = db::count_claims_by_status(&state.db, ClaimScope::All).await?;
            json!({ "centers": centers, "users": users, "claims": claims })
        }
        Role::Coordinator => {
            let center = db::find_center_for_coordinator(&state.db, &session.user_id).await?;
            let claims = match &center {
                Some(center) => {
                    Some(db::count_claims_by_status(&state.db, ClaimScope::Center(&center.id)).await?)
                }
                None => None,
            };
            json!({ "center": center, "claims": claims })
        }
        Role::Lecturer => {
            let claims =
                db::count_claims_by_status(&state.db, ClaimScope::SubmittedBy(&session.user_id))
                    .await?;
            json!({ "claims": claims })
        }
    };

    let view = json!({
        "user": { "id": session.user_id, "name": session.name, "role": session.role },
        "landing": session.role.landing_path(),
        "stats": stats,
    });
    state.views.put(key, view.clone());
    Ok(Json(view))
}

/// GET /registry
pub async fn registry_overview(State(state): State<Arc<AppState>>, session: Session) -> PageResult {
    guard_page(&state.db, &session, Requirement::role(Role::Registry)).await?;

    let centers = db::list_center_summaries(&state.db).await?;
    let claims = db::count_claims_by_status(&state.db, ClaimScope::All).await?;
    Ok(Json(json!({ "centers": centers, "claims": claims })))
}

/// GET /registry/users
pub async fn registry_users(State(state): State<Arc<AppState>>, session: Session) -> PageResult {
    guard_page(&state.db, &session, Requirement::role(Role::Registry)).await?;

    let users = db::list_users_with_assignments(&state.db).await?;
    Ok(Json(json!({ "users": users })))
}

/// GET /registry/audit
pub async fn registry_audit(
    State(state): State<Arc<AppState>>,
    session: Session,
    Query(query): Query<AuditLogQuery>,
) -> PageResult {
    guard_page(&state.db, &session, Requirement::role(Role::Registry)).await?;

    let logs = db::list_audit_logs(&state.db, &query).await?;
    Ok(Json(json!(logs)))
}

/// GET /coordinator - straight to the owned center when there is one
pub async fn coordinator_landing(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Response, PageRejection> {
    guard_page(&state.db, &session, Requirement::role(Role::Coordinator)).await?;

    match db::find_center_for_coordinator(&state.db, &session.user_id).await? {
        Some(center) => Ok(Redirect::to(&format!("/coordinator/{}", center.id)).into_response()),
        None => Ok(Json(json!({
            "center": null,
            "message": "You are not assigned to a center yet",
        }))
        .into_response()),
    }
}

/// GET /coordinator/:center_id
pub async fn center_overview(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(center_id): Path<String>,
) -> PageResult {
    guard_page(
        &state.db,
        &session,
        Requirement::role(Role::Coordinator).owning(Ownership::CoordinatesCenter(&center_id)),
    )
    .await?;

    let center = db::find_center(&state.db, &center_id)
        .await?
        .ok_or(PageRejection::Redirect(DASHBOARD_PATH))?;
    let departments = db::list_departments(&state.db, &center_id).await?;
    let lecturers = db::list_center_lecturers(&state.db, &center_id).await?;
    let claims = db::count_claims_by_status(&state.db, ClaimScope::Center(&center_id)).await?;

    Ok(Json(json!({
        "center": center,
        "departments": departments,
        "lecturers": lecturers,
        "claims": claims,
    })))
}

/// GET /coordinator/:center_id/claims?status=
pub async fn center_claims(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(center_id): Path<String>,
    Query(query): Query<ClaimListQuery>,
) -> PageResult {
    guard_page(
        &state.db,
        &session,
        Requirement::role(Role::Coordinator).owning(Ownership::CoordinatesCenter(&center_id)),
    )
    .await?;

    let status: Option<ClaimStatus> = match query.status.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            raw.parse()
                .map_err(|msg: String| ApiError::validation_field("status", msg))?,
        ),
        None => None,
    };

    let key = keys::center_claims(&center_id, status.as_ref().map(ClaimStatus::as_str));
    if let Some(view) = state.views.get(&key) {
        return Ok(Json(view));
    }

    let claims = db::list_claims_for_center(&state.db, &center_id, status).await?;
    let view = json!({ "center_id": center_id, "status": status, "claims": claims });
    state.views.put(key, view.clone());
    Ok(Json(view))
}

/// GET /lecturer
pub async fn lecturer_landing(State(state): State<Arc<AppState>>, session: Session) -> PageResult {
    guard_page(&state.db, &session, Requirement::role(Role::Lecturer)).await?;

    let user = db::find_user_by_id(&state.db, &session.user_id)
        .await?
        .ok_or(PageRejection::Redirect(DASHBOARD_PATH))?;
    let center = match user.center_id.as_deref() {
        Some(id) => db::find_center(&state.db, id).await?,
        None => None,
    };
    let claims =
        db::count_claims_by_status(&state.db, ClaimScope::SubmittedBy(&session.user_id)).await?;

    Ok(Json(json!({
        "center": center,
        "department_id": user.department_id,
        "claims": claims,
    })))
}

/// GET /lecturer/claims
pub async fn lecturer_claims(State(state): State<Arc<AppState>>, session: Session) -> PageResult {
    guard_page(&state.db, &session, Requirement::role(Role::Lecturer)).await?;

    let key = keys::lecturer_claims(&session.user_id);
    if let Some(view) = state.views.get(&key) {
        return Ok(Json(view));
    }

    let claims: Vec<ClaimResponse> = db::list_claims_for_lecturer(&state.db, &session.user_id)
        .await?
        .into_iter()
        .map(ClaimResponse::from)
        .collect();
    let view = json!({ "claims": claims });
    state.views.put(key, view.clone());
    Ok(Json(view))
}

/// GET /lecturer/claims/:claim_id
pub async fn lecturer_claim_detail(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(claim_id): Path<String>,
) -> PageResult {
    guard_page(
        &state.db,
        &session,
        Requirement::role(Role::Lecturer).owning(Ownership::SubmittedClaim(&claim_id)),
    )
    .await?;

    let claim = db::find_claim(&state.db, &claim_id)
        .await?
        .ok_or(PageRejection::Redirect(DASHBOARD_PATH))?;
    Ok(Json(json!({ "claim": ClaimResponse::from(claim) })))
}

/// GET /lecturer/centers/:center_id
pub async fn lecturer_center(
    State(state): State<Arc<AppState>>,
    session: Session,
    Path(center_id): Path<String>,
) -> PageResult {
    guard_page(
        &state.db,
        &session,
        Requirement::role(Role::Lecturer).owning(Ownership::AssignedToCenter(&center_id)),
    )
    .await?;

    let center = db::find_center(&state.db, &center_id)
        .await?
        .ok_or(PageRejection::Redirect(DASHBOARD_PATH))?;
    let departments = db::list_departments(&state.db, &center_id).await?;
    Ok(Json(json!({ "center": center, "departments": departments })))
}
