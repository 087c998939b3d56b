//! Center and department models and queries.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Center {
    pub id: String,
    pub name: String,
    /// Owning coordinator (at most one per center, one center per coordinator)
    pub coordinator_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Department {
    pub id: String,
    pub center_id: String,
    pub name: String,
    pub created_at: String,
}

/// Center with coordinator name and headline counts for the registry overview
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CenterSummary {
    pub id: String,
    pub name: String,
    pub coordinator_id: Option<String>,
    pub coordinator_name: Option<String>,
    pub department_count: i64,
    pub lecturer_count: i64,
    pub pending_claims: i64,
}

/// Lecturer row shown on a coordinator's center overview
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CenterLecturer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub department_id: Option<String>,
    pub department_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCenterRequest {
    pub name: String,
    #[serde(default)]
    pub coordinator_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssignCoordinatorRequest {
    pub coordinator_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateDepartmentRequest {
    pub name: String,
}

pub async fn find_center(db: &SqlitePool, id: &str) -> Result<Option<Center>, sqlx::Error> {
    sqlx::query_as::<_, Center>("SELECT * FROM centers WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

/// The center a coordinator owns, if any
pub async fn find_center_for_coordinator(
    db: &SqlitePool,
    coordinator_id: &str,
) -> Result<Option<Center>, sqlx::Error> {
    sqlx::query_as::<_, Center>("SELECT * FROM centers WHERE coordinator_id = ?")
        .bind(coordinator_id)
        .fetch_optional(db)
        .await
}

pub async fn insert_center(
    db: &SqlitePool,
    name: &str,
    coordinator_id: Option<&str>,
) -> Result<Center, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO centers (id, name, coordinator_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(name)
    .bind(coordinator_id)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    find_center(db, &id).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn set_center_coordinator(
    db: &SqlitePool,
    center_id: &str,
    coordinator_id: &str,
) -> Result<bool, sqlx::Error> {
    let now = chrono::Utc::now().to_rfc3339();
    let result = sqlx::query("UPDATE centers SET coordinator_id = ?, updated_at = ? WHERE id = ?")
        .bind(coordinator_id)
        .bind(&now)
        .bind(center_id)
        .execute(db)
        .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn insert_department(
    db: &SqlitePool,
    center_id: &str,
    name: &str,
) -> Result<Department, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query("INSERT INTO departments (id, center_id, name, created_at) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(center_id)
        .bind(name)
        .bind(&now)
        .execute(db)
        .await?;

    sqlx::query_as::<_, Department>("SELECT * FROM departments WHERE id = ?")
        .bind(&id)
        .fetch_one(db)
        .await
}

/// Department lookup scoped to its center
pub async fn find_department_in_center(
    db: &SqlitePool,
    department_id: &str,
    center_id: &str,
) -> Result<Option<Department>, sqlx::Error> {
    sqlx::query_as::<_, Department>("SELECT * FROM departments WHERE id = ? AND center_id = ?")
        .bind(department_id)
        .bind(center_id)
        .fetch_optional(db)
        .await
}

pub async fn list_departments(
    db: &SqlitePool,
    center_id: &str,
) -> Result<Vec<Department>, sqlx::Error> {
    sqlx::query_as::<_, Department>("SELECT * FROM departments WHERE center_id = ? ORDER BY name")
        .bind(center_id)
        .fetch_all(db)
        .await
}

pub async fn list_center_lecturers(
    db: &SqlitePool,
    center_id: &str,
) -> Result<Vec<CenterLecturer>, sqlx::Error> {
    sqlx::query_as::<_, CenterLecturer>(
        r#"
        SELECT u.id, u.name, u.email, u.department_id, d.name AS department_name
        FROM users u
        LEFT JOIN departments d ON d.id = u.department_id
        WHERE u.center_id = ? AND u.role = 'LECTURER'
        ORDER BY u.name
        "#,
    )
    .bind(center_id)
    .fetch_all(db)
    .await
}

pub async fn list_center_summaries(db: &SqlitePool) -> Result<Vec<CenterSummary>, sqlx::Error> {
    sqlx::query_as::<_, CenterSummary>(
        r#"
        SELECT c.id, c.name, c.coordinator_id, u.name AS coordinator_name,
               (SELECT COUNT(*) FROM departments d WHERE d.center_id = c.id) AS department_count,
               (SELECT COUNT(*) FROM users l WHERE l.center_id = c.id AND l.role = 'LECTURER') AS lecturer_count,
               (SELECT COUNT(*) FROM claims cl WHERE cl.center_id = c.id AND cl.status = 'PENDING') AS pending_claims
        FROM centers c
        LEFT JOIN users u ON u.id = c.coordinator_id
        ORDER BY c.name
        "#,
    )
    .fetch_all(db)
    .await
}
