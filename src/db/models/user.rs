//! User models and queries.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

use crate::session::Role;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub role: String,
    /// Assigned center (lecturers only)
    pub center_id: Option<String>,
    /// Assigned department (lecturers only)
    pub department_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn role_enum(&self) -> Option<Role> {
        self.role.parse().ok()
    }
}

/// Public view of a user, as served by `/api/user/me`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

/// User row joined with assignment names for registry listings
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserWithAssignment {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub center_id: Option<String>,
    pub center_name: Option<String>,
    pub department_id: Option<String>,
    pub department_name: Option<String>,
    /// Center this user coordinates, if any
    pub coordinated_center_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Registry request to create an account of any role
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

/// Registry request to place a lecturer in a center (and optionally a department)
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssignLecturerRequest {
    pub center_id: String,
    #[serde(default)]
    pub department_id: Option<String>,
}

/// Fields for inserting a user
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub role: Role,
}

pub async fn find_user_by_id(db: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_user_by_email(
    db: &SqlitePool,
    email: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ? COLLATE NOCASE")
        .bind(email)
        .fetch_optional(db)
        .await
}

pub async fn insert_user(db: &SqlitePool, new: &NewUser<'_>) -> Result<User, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, name, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(new.email)
    .bind(new.password_hash)
    .bind(new.name)
    .bind(new.role.as_str())
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    find_user_by_id(db, &id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

pub async fn count_users_with_role(db: &SqlitePool, role: Role) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = ?")
        .bind(role.as_str())
        .fetch_one(db)
        .await
}

/// Set a lecturer's center and department
pub async fn assign_lecturer(
    db: &SqlitePool,
    user_id: &str,
    center_id: &str,
    department_id: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let now = chrono::Utc::now().to_rfc3339();
    let result = sqlx::query(
        "UPDATE users SET center_id = ?, department_id = ?, updated_at = ? WHERE id = ? AND role = 'LECTURER'",
    )
    .bind(center_id)
    .bind(department_id)
    .bind(&now)
    .bind(user_id)
    .execute(db)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn list_users_with_assignments(
    db: &SqlitePool,
) -> Result<Vec<UserWithAssignment>, sqlx::Error> {
    sqlx::query_as::<_, UserWithAssignment>(
        r#"
        SELECT u.id, u.email, u.name, u.role,
               u.center_id, c.name AS center_name,
               u.department_id, d.name AS department_name,
               oc.id AS coordinated_center_id,
               u.created_at
        FROM users u
        LEFT JOIN centers c ON c.id = u.center_id
        LEFT JOIN departments d ON d.id = u.department_id
        LEFT JOIN centers oc ON oc.coordinator_id = u.id
        ORDER BY u.role, u.name
        "#,
    )
    .fetch_all(db)
    .await
}
