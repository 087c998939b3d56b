use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::HeaderMap,
    response::{Html, IntoResponse, Redirect, Response},
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::db::{
    self, actions, resource_types, AuditEntry, DbPool, LoginForm, NewUser, SignupForm,
    UserResponse,
};
use crate::session::{clear_session, read_session, session_cookie, Role, Session, SessionRead, LOGIN_PATH};
use crate::AppState;

use super::audit::{audit_log, extract_client_ip};
use super::error::{ApiError, ValidationErrorBuilder};
use super::extract::ValidForm;
use super::metrics::record_login;
use super::validation::{validate_email, validate_name, validate_password};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>())?;
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Set the session cookie and send the user to their landing page
fn signed_in(state: &AppState, jar: CookieJar, session: &Session) -> Response {
    let cookie = session_cookie(
        state.sessions.encode(session),
        state.config.auth.secure_cookies,
    );
    (jar.add(cookie), Redirect::to(session.role.landing_path())).into_response()
}

/// POST /login
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    ValidForm(form): ValidForm<LoginForm>,
) -> Result<Response, ApiError> {
    let email = normalize_email(&form.email);
    let ip = extract_client_ip(&headers);

    let user = db::find_user_by_email(&state.db, &email).await?;
    let user = match user {
        Some(user) if verify_password(&form.password, &user.password_hash) => user,
        _ => {
            tracing::info!(email = %email, "Failed login attempt");
            record_login(false);
            audit_log(
                &state,
                AuditEntry::new(actions::AUTH_LOGIN_FAILED, resource_types::USER)
                    .from_ip(ip.as_deref())
                    .details(json!({ "email": email })),
            )
            .await;
            return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
        }
    };

    let role = user.role_enum().ok_or_else(|| {
        tracing::error!(user_id = %user.id, role = %user.role, "Stored user has unknown role");
        ApiError::internal("Account is misconfigured")
    })?;

    let session = state.sessions.issue(&user.id, role, Some(&user.name));
    tracing::info!(user_id = %user.id, role = %role, "User logged in");
    record_login(true);
    audit_log(
        &state,
        AuditEntry::new(actions::AUTH_LOGIN, resource_types::USER)
            .resource(&user.id, Some(&user.email))
            .by(&user.id)
            .from_ip(ip.as_deref()),
    )
    .await;

    Ok(signed_in(&state, jar, &session))
}

/// POST /signup - self-service accounts are always lecturers
pub async fn signup(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    ValidForm(form): ValidForm<SignupForm>,
) -> Result<Response, ApiError> {
    let email = normalize_email(&form.email);

    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("name", validate_name(&form.name))
        .check("email", validate_email(&email))
        .check("password", validate_password(&form.password));
    errors.finish()?;

    if db::find_user_by_email(&state.db, &email).await?.is_some() {
        return Err(ApiError::conflict("An account with this email already exists"));
    }

    let password_hash = hash_password(&form.password)
        .map_err(|_| ApiError::internal("Failed to hash password"))?;
    let user = db::insert_user(
        &state.db,
        &NewUser {
            name: form.name.trim(),
            email: &email,
            password_hash: &password_hash,
            role: Role::Lecturer,
        },
    )
    .await?;
    tracing::info!(user_id = %user.id, "Lecturer signed up");

    let ip = extract_client_ip(&headers);
    audit_log(
        &state,
        AuditEntry::new(actions::AUTH_SIGNUP, resource_types::USER)
            .resource(&user.id, Some(&user.email))
            .by(&user.id)
            .from_ip(ip.as_deref()),
    )
    .await;

    let session = state.sessions.issue(&user.id, Role::Lecturer, Some(&user.name));
    Ok(signed_in(&state, jar, &session))
}

/// GET /logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    session: Session,
    jar: CookieJar,
    headers: HeaderMap,
) -> Response {
    let ip = extract_client_ip(&headers);
    audit_log(
        &state,
        AuditEntry::new(actions::AUTH_LOGOUT, resource_types::USER)
            .resource(&session.user_id, None)
            .by(&session.user_id)
            .from_ip(ip.as_deref()),
    )
    .await;
    tracing::debug!(user_id = %session.user_id, "User logged out");

    (clear_session(jar), Redirect::to(LOGIN_PATH)).into_response()
}

/// GET /api/user/me
///
/// 401 without a usable session or when its user no longer exists; the
/// cookie is dropped in the latter cases.
pub async fn me(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    let session = match read_session(&jar, &state.sessions) {
        SessionRead::Valid(session) => session,
        SessionRead::Absent => return ApiError::unauthorized("Not signed in").into_response(),
        SessionRead::Invalid(_) => {
            return (clear_session(jar), ApiError::unauthorized("Session is invalid"))
                .into_response()
        }
    };

    match db::find_user_by_id(&state.db, &session.user_id).await {
        Ok(Some(user)) => Json(UserResponse::from(user)).into_response(),
        Ok(None) => (clear_session(jar), ApiError::unauthorized("Account no longer exists"))
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load current user");
            ApiError::internal("Failed to load current user").into_response()
        }
    }
}

const LOGIN_HTML: &str = r#"<!doctype html>
<html><head><title>Sign in</title></head><body>
<h1>Sign in</h1>
<form method="post" action="/login">
<label>Email <input type="email" name="email" required></label>
<label>Password <input type="password" name="password" required></label>
<button type="submit">Sign in</button>
</form>
<p><a href="/signup">Create a lecturer account</a></p>
</body></html>"#;

const SIGNUP_HTML: &str = r#"<!doctype html>
<html><head><title>Sign up</title></head><body>
<h1>Create account</h1>
<form method="post" action="/signup">
<label>Name <input type="text" name="name" required></label>
<label>Email <input type="email" name="email" required></label>
<label>Password <input type="password" name="password" minlength="12" required></label>
<button type="submit">Sign up</button>
</form>
<p><a href="/login">Already registered? Sign in</a></p>
</body></html>"#;

pub async fn login_page() -> Html<&'static str> {
    Html(LOGIN_HTML)
}

pub async fn signup_page() -> Html<&'static str> {
    Html(SIGNUP_HTML)
}

/// Create the initial registry account if none exists
pub async fn ensure_registry_user(db: &DbPool, config: &AuthConfig) -> anyhow::Result<()> {
    let existing = db::count_users_with_role(db, Role::Registry)
        .await
        .context("Failed to count registry users")?;
    if existing > 0 {
        return Ok(());
    }

    let password = match &config.registry_password {
        Some(password) => password.clone(),
        None => {
            let generated = hex::encode(rand::random::<[u8; 12]>());
            tracing::warn!(
                email = %config.registry_email,
                password = %generated,
                "No registry password configured; generated one. Change it after first login."
            );
            generated
        }
    };

    let password_hash = hash_password(&password)
        .map_err(|e| anyhow::anyhow!("Failed to hash registry password: {}", e))?;
    db::insert_user(
        db,
        &NewUser {
            name: &config.registry_name,
            email: &normalize_email(&config.registry_email),
            password_hash: &password_hash,
            role: Role::Registry,
        },
    )
    .await
    .context("Failed to create registry user")?;

    tracing::info!(email = %config.registry_email, "Created initial registry account");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::http::StatusCode;

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("Correct-Horse-42").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("Correct-Horse-42", &hash));
        assert!(!verify_password("correct-horse-42", &hash));
        assert!(!verify_password("Correct-Horse-42", "not-a-hash"));
    }

    #[tokio::test]
    async fn test_ensure_registry_user_is_idempotent() {
        let db = db::init_in_memory().await.unwrap();
        let mut config = Config::default().auth;
        config.registry_password = Some("Registry-Pass-01".to_string());

        ensure_registry_user(&db, &config).await.unwrap();
        ensure_registry_user(&db, &config).await.unwrap();

        assert_eq!(db::count_users_with_role(&db, Role::Registry).await.unwrap(), 1);
        let user = db::find_user_by_email(&db, &config.registry_email)
            .await
            .unwrap()
            .unwrap();
        assert!(verify_password("Registry-Pass-01", &user.password_hash));
    }

    #[tokio::test]
    async fn test_me_without_cookie_is_unauthorized() {
        let db = db::init_in_memory().await.unwrap();
        let state = Arc::new(AppState::new(Config::default(), db).unwrap());
        let response = me(State(state), CookieJar::new()).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
