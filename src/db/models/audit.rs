//! Audit trail of logins, claim decisions and registry changes.

use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLog {
    pub id: String,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub resource_name: Option<String>,
    pub user_id: Option<String>,
    pub ip_address: Option<String>,
    pub details: Option<String>,
    pub created_at: String,
}

/// One event to record
#[derive(Debug, Clone, Default)]
pub struct AuditEntry<'a> {
    pub action: &'a str,
    pub resource_type: &'a str,
    pub resource_id: Option<&'a str>,
    pub resource_name: Option<&'a str>,
    pub user_id: Option<&'a str>,
    pub ip_address: Option<&'a str>,
    pub details: Option<serde_json::Value>,
}

impl<'a> AuditEntry<'a> {
    pub fn new(action: &'a str, resource_type: &'a str) -> Self {
        Self {
            action,
            resource_type,
            ..Default::default()
        }
    }

    pub fn resource(mut self, id: &'a str, name: Option<&'a str>) -> Self {
        self.resource_id = Some(id);
        self.resource_name = name;
        self
    }

    pub fn by(mut self, user_id: &'a str) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn from_ip(mut self, ip: Option<&'a str>) -> Self {
        self.ip_address = ip;
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Response for listing audit logs with pagination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogListResponse {
    pub items: Vec<AuditLog>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

/// Query parameters for filtering audit logs
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuditLogQuery {
    /// Filter by action (e.g., "claim.approve")
    pub action: Option<String>,
    /// Filter by resource type (e.g., "claim", "center")
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub user_id: Option<String>,
    /// Start of date range (RFC 3339)
    pub start_date: Option<String>,
    /// End of date range (RFC 3339)
    pub end_date: Option<String>,
    /// Page number (1-indexed, defaults to 1)
    pub page: Option<i64>,
    /// Items per page (defaults to 50, max 100)
    pub per_page: Option<i64>,
}

/// Common audit action types
pub mod actions {
    pub const AUTH_LOGIN: &str = "auth.login";
    pub const AUTH_LOGIN_FAILED: &str = "auth.login_failed";
    pub const AUTH_LOGOUT: &str = "auth.logout";
    pub const AUTH_SIGNUP: &str = "auth.signup";

    pub const CLAIM_CREATE: &str = "claim.create";
    pub const CLAIM_APPROVE: &str = "claim.approve";
    pub const CLAIM_REJECT: &str = "claim.reject";

    pub const CENTER_CREATE: &str = "center.create";
    pub const CENTER_ASSIGN_COORDINATOR: &str = "center.assign_coordinator";
    pub const DEPARTMENT_CREATE: &str = "department.create";
    pub const USER_CREATE: &str = "user.create";
    pub const USER_ASSIGN: &str = "user.assign";
}

/// Common resource types
pub mod resource_types {
    pub const USER: &str = "user";
    pub const CENTER: &str = "center";
    pub const DEPARTMENT: &str = "department";
    pub const CLAIM: &str = "claim";
}

pub async fn log_audit(db: &SqlitePool, entry: &AuditEntry<'_>) -> Result<(), sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let details_json = entry.details.as_ref().map(|d| d.to_string());

    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, action, resource_type, resource_id, resource_name, user_id, ip_address, details, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(entry.action)
    .bind(entry.resource_type)
    .bind(entry.resource_id)
    .bind(entry.resource_name)
    .bind(entry.user_id)
    .bind(entry.ip_address)
    .bind(&details_json)
    .bind(&now)
    .execute(db)
    .await?;

    tracing::debug!(
        action = entry.action,
        resource_type = entry.resource_type,
        resource_id = entry.resource_id,
        user_id = entry.user_id,
        "Audit log recorded"
    );

    Ok(())
}

fn push_filters<'q>(builder: &mut QueryBuilder<'q, Sqlite>, query: &'q AuditLogQuery) {
    let filters = [
        ("action = ", query.action.as_deref()),
        ("resource_type = ", query.resource_type.as_deref()),
        ("resource_id = ", query.resource_id.as_deref()),
        ("user_id = ", query.user_id.as_deref()),
        ("created_at >= ", query.start_date.as_deref()),
        ("created_at <= ", query.end_date.as_deref()),
    ];

    let mut first = true;
    for (clause, value) in filters {
        if let Some(value) = value {
            builder.push(if first { " WHERE " } else { " AND " });
            builder.push(clause).push_bind(value);
            first = false;
        }
    }
}

/// List audit logs, newest first, with filtering and pagination
pub async fn list_audit_logs(
    db: &SqlitePool,
    query: &AuditLogQuery,
) -> Result<AuditLogListResponse, sqlx::Error> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(50).clamp(1, 100);
    let offset = (page - 1).saturating_mul(per_page);

    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM audit_logs");
    push_filters(&mut count, query);
    let total: i64 = count.build_query_scalar().fetch_one(db).await?;

    let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM audit_logs");
    push_filters(&mut select, query);
    select
        .push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(per_page)
        .push(" OFFSET ")
        .push_bind(offset);
    let items = select.build_query_as::<AuditLog>().fetch_all(db).await?;

    let total_pages = (total + per_page - 1) / per_page;

    Ok(AuditLogListResponse {
        items,
        total,
        page,
        per_page,
        total_pages,
    })
}
