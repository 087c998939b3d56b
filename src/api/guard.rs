//! Route guard applied to every request before routing.
//!
//! Only cookie shape and signature are checked here; role and ownership are
//! left to the handlers. API routes and assets bypass the guard entirely.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use std::sync::Arc;

use crate::session::{clear_session, login_redirect, read_session, SessionRead};
use crate::AppState;

use super::authz::DASHBOARD_PATH;

const PUBLIC_PREFIXES: [&str; 2] = ["/login", "/signup"];
const BYPASS_PREFIXES: [&str; 5] = ["/api", "/static", "/health", "/metrics", "/favicon.ico"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathClass {
    Public,
    Protected,
    Bypass,
}

/// `/login` matches `/login` and `/login/..`, not `/loginx`
fn has_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

pub fn classify(path: &str) -> PathClass {
    if BYPASS_PREFIXES.iter().any(|p| has_prefix(path, p)) {
        PathClass::Bypass
    } else if PUBLIC_PREFIXES.iter().any(|p| has_prefix(path, p)) {
        PathClass::Public
    } else {
        PathClass::Protected
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    /// Let the request through but drop the unusable cookie
    AllowAndClear,
    RedirectLogin { clear_cookie: bool },
    RedirectDashboard,
}

pub fn decide(class: PathClass, read: &SessionRead) -> GuardDecision {
    match (class, read) {
        (PathClass::Bypass, _) => GuardDecision::Allow,
        (PathClass::Protected, SessionRead::Valid(_)) => GuardDecision::Allow,
        (PathClass::Protected, SessionRead::Absent) => {
            GuardDecision::RedirectLogin { clear_cookie: false }
        }
        (PathClass::Protected, SessionRead::Invalid(_)) => {
            GuardDecision::RedirectLogin { clear_cookie: true }
        }
        (PathClass::Public, SessionRead::Valid(_)) => GuardDecision::RedirectDashboard,
        (PathClass::Public, SessionRead::Invalid(_)) => GuardDecision::AllowAndClear,
        (PathClass::Public, SessionRead::Absent) => GuardDecision::Allow,
    }
}

pub async fn route_guard(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let class = classify(request.uri().path());
    if class == PathClass::Bypass {
        return next.run(request).await;
    }

    let jar = CookieJar::from_headers(request.headers());
    let read = read_session(&jar, &state.sessions);
    if let SessionRead::Invalid(reason) = &read {
        tracing::debug!(path = %request.uri().path(), %reason, "Invalid session cookie");
    }

    match decide(class, &read) {
        GuardDecision::Allow => next.run(request).await,
        GuardDecision::AllowAndClear => {
            let response = next.run(request).await;
            (clear_session(jar), response).into_response()
        }
        GuardDecision::RedirectLogin { clear_cookie } => login_redirect(jar, clear_cookie),
        GuardDecision::RedirectDashboard => Redirect::to(DASHBOARD_PATH).into_response(),
    }
}
