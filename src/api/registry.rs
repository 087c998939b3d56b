//! Registry management actions: centers, departments, users and assignments.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
};
use serde_json::json;
use std::sync::Arc;

use crate::db::{
    self, actions, resource_types, AssignCoordinatorRequest, AssignLecturerRequest, AuditEntry,
    Center, CreateCenterRequest, CreateDepartmentRequest, CreateUserRequest, Department, NewUser,
    UserResponse,
};
use crate::session::{Role, Session};
use crate::AppState;

use super::audit::{audit_log, extract_client_ip};
use super::auth::hash_password;
use super::authz::{require_action, Requirement};
use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::ValidJson;
use super::response::ActionResult;
use super::validation::{validate_email, validate_name, validate_password, validate_text};

async fn require_registry(state: &AppState, session: &Session) -> Result<(), ApiError> {
    require_action(&state.db, session, Requirement::role(Role::Registry)).await
}

/// Check that `user_id` is a coordinator free to take `center_id`
async fn check_assignable_coordinator(
    state: &AppState,
    user_id: &str,
    center_id: Option<&str>,
) -> Result<(), ApiError> {
    let user = db::find_user_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::validation_field("coordinator_id", "Coordinator not found"))?;
    if user.role_enum() != Some(Role::Coordinator) {
        return Err(ApiError::validation_field(
            "coordinator_id",
            "User is not a coordinator",
        ));
    }

    if let Some(owned) = db::find_center_for_coordinator(&state.db, user_id).await? {
        if Some(owned.id.as_str()) != center_id {
            return Err(ApiError::conflict(format!(
                "Coordinator already owns center '{}'",
                owned.name
            )));
        }
    }
    Ok(())
}

/// POST /registry/centers
pub async fn create_center(
    State(state): State<Arc<AppState>>,
    session: Session,
    headers: HeaderMap,
    ValidJson(req): ValidJson<CreateCenterRequest>,
) -> Result<ActionResult<Center>, ApiError> {
    require_registry(&state, &session).await?;

    let mut errors = ValidationErrorBuilder::new();
    errors.check("name", validate_text(&req.name, "Center name", 100));
    errors.finish()?;

    if let Some(coordinator_id) = req.coordinator_id.as_deref() {
        check_assignable_coordinator(&state, coordinator_id, None).await?;
    }

    let name = req.name.trim();
    let center = db::insert_center(&state.db, name, req.coordinator_id.as_deref()).await?;
    tracing::info!(center_id = %center.id, name, "Center created");
    state.views.invalidate_dashboards();

    let ip = extract_client_ip(&headers);
    audit_log(
        &state,
        AuditEntry::new(actions::CENTER_CREATE, resource_types::CENTER)
            .resource(&center.id, Some(&center.name))
            .by(&session.user_id)
            .from_ip(ip.as_deref())
            .details(json!({ "coordinator_id": center.coordinator_id })),
    )
    .await;

    Ok(ActionResult::created("Center created", center))
}

/// POST /registry/centers/:center_id/coordinator
pub async fn assign_coordinator(
    State(state): State<Arc<AppState>>,
    session: Session,
    headers: HeaderMap,
    Path(center_id): Path<String>,
    ValidJson(req): ValidJson<AssignCoordinatorRequest>,
) -> Result<ActionResult<Center>, ApiError> {
    require_registry(&state, &session).await?;

    let center = db::find_center(&state.db, &center_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Center not found"))?;
    check_assignable_coordinator(&state, &req.coordinator_id, Some(&center.id)).await?;

    db::set_center_coordinator(&state.db, &center.id, &req.coordinator_id).await?;
    state.views.invalidate_dashboards();
    let center = db::find_center(&state.db, &center.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Center not found"))?;

    let ip = extract_client_ip(&headers);
    audit_log(
        &state,
        AuditEntry::new(actions::CENTER_ASSIGN_COORDINATOR, resource_types::CENTER)
            .resource(&center.id, Some(&center.name))
            .by(&session.user_id)
            .from_ip(ip.as_deref())
            .details(json!({ "coordinator_id": req.coordinator_id })),
    )
    .await;

    Ok(ActionResult::ok("Coordinator assigned", center))
}

/// POST /registry/centers/:center_id/departments
pub async fn create_department(
    State(state): State<Arc<AppState>>,
    session: Session,
    headers: HeaderMap,
    Path(center_id): Path<String>,
    ValidJson(req): ValidJson<CreateDepartmentRequest>,
) -> Result<ActionResult<Department>, ApiError> {
    require_registry(&state, &session).await?;
    validate_text(&req.name, "Department name", 100)
        .map_err(|msg| ApiError::validation_field("name", msg))?;

    let center = db::find_center(&state.db, &center_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Center not found"))?;
    let department = db::insert_department(&state.db, &center.id, req.name.trim()).await?;

    let ip = extract_client_ip(&headers);
    audit_log(
        &state,
        AuditEntry::new(actions::DEPARTMENT_CREATE, resource_types::DEPARTMENT)
            .resource(&department.id, Some(&department.name))
            .by(&session.user_id)
            .from_ip(ip.as_deref())
            .details(json!({ "center_id": center.id })),
    )
    .await;

    Ok(ActionResult::created("Department created", department))
}

/// POST /registry/users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    session: Session,
    headers: HeaderMap,
    ValidJson(req): ValidJson<CreateUserRequest>,
) -> Result<ActionResult<UserResponse>, ApiError> {
    require_registry(&state, &session).await?;

    let email = req.email.trim().to_lowercase();
    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("name", validate_name(&req.name))
        .check("email", validate_email(&email))
        .check("password", validate_password(&req.password));
    let role: Option<Role> = req.role.parse().ok();
    if role.is_none() {
        errors.add("role", "Role must be one of REGISTRY, COORDINATOR, LECTURER");
    }
    errors.finish()?;
    let role = role.ok_or_else(|| ApiError::bad_request("Invalid role"))?;

    if db::find_user_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::conflict("An account with this email already exists"));
    }

    let password_hash = hash_password(&req.password)
        .map_err(|_| ApiError::internal("Failed to hash password"))?;
    let user = db::insert_user(
        &state.db,
        &NewUser {
            name: req.name.trim(),
            email: &email,
            password_hash: &password_hash,
            role,
        },
    )
    .await?;
    tracing::info!(user_id = %user.id, role = %role, "User created by registry");
    state.views.invalidate_dashboards();

    let ip = extract_client_ip(&headers);
    audit_log(
        &state,
        AuditEntry::new(actions::USER_CREATE, resource_types::USER)
            .resource(&user.id, Some(&user.email))
            .by(&session.user_id)
            .from_ip(ip.as_deref())
            .details(json!({ "role": role.as_str() })),
    )
    .await;

    Ok(ActionResult::created("User created", user.into()))
}

/// POST /registry/users/:user_id/assignment
pub async fn assign_lecturer(
    State(state): State<Arc<AppState>>,
    session: Session,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    ValidJson(req): ValidJson<AssignLecturerRequest>,
) -> Result<ActionResult<UserResponse>, ApiError> {
    require_registry(&state, &session).await?;

    let user = db::find_user_by_id(&state.db, &user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    if user.role_enum() != Some(Role::Lecturer) {
        return Err(ApiError::bad_request("Only lecturers can be assigned to a center"));
    }

    let center = db::find_center(&state.db, &req.center_id)
        .await?
        .ok_or_else(|| ApiError::validation_field("center_id", "Center not found"))?;
    if let Some(department_id) = req.department_id.as_deref() {
        if db::find_department_in_center(&state.db, department_id, &center.id)
            .await?
            .is_none()
        {
            return Err(ApiError::validation_field(
                "department_id",
                "Department does not belong to this center",
            ));
        }
    }

    if !db::assign_lecturer(&state.db, &user.id, &center.id, req.department_id.as_deref()).await? {
        return Err(ApiError::not_found("User not found"));
    }
    tracing::info!(user_id = %user.id, center_id = %center.id, "Lecturer assigned");
    state.views.invalidate_dashboards();

    let ip = extract_client_ip(&headers);
    audit_log(
        &state,
        AuditEntry::new(actions::USER_ASSIGN, resource_types::USER)
            .resource(&user.id, Some(&user.email))
            .by(&session.user_id)
            .from_ip(ip.as_deref())
            .details(json!({ "center_id": center.id, "department_id": req.department_id })),
    )
    .await;

    Ok(ActionResult::ok("Lecturer assigned", user.into()))
}
