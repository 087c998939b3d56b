pub mod audit;
pub mod auth;
pub mod authz;
pub mod claims;
pub mod error;
pub mod extract;
pub mod guard;
pub mod metrics;
pub mod pages;
pub mod rate_limit;
pub mod registry;
pub mod response;
pub mod validation;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let auth_limit = middleware::from_fn_with_state(state.clone(), rate_limit::rate_limit_auth);
    let action_limit =
        middleware::from_fn_with_state(state.clone(), rate_limit::rate_limit_action);

    // Login, signup, logout
    let auth_routes = Router::new()
        .route("/login", get(auth::login_page))
        .route("/login", post(auth::login).layer(auth_limit.clone()))
        .route("/signup", get(auth::signup_page))
        .route("/signup", post(auth::signup).layer(auth_limit))
        .route("/logout", get(auth::logout))
        .route("/api/user/me", get(auth::me));

    let registry_routes = Router::new()
        .route("/registry", get(pages::registry_overview))
        .route("/registry/users", get(pages::registry_users))
        .route("/registry/users", post(registry::create_user))
        .route("/registry/users/:user_id/assignment", post(registry::assign_lecturer))
        .route("/registry/audit", get(pages::registry_audit))
        .route("/registry/centers", post(registry::create_center))
        .route("/registry/centers/:center_id/coordinator", post(registry::assign_coordinator))
        .route("/registry/centers/:center_id/departments", post(registry::create_department));

    let coordinator_routes = Router::new()
        .route("/coordinator", get(pages::coordinator_landing))
        .route("/coordinator/:center_id", get(pages::center_overview))
        .route("/coordinator/:center_id/claims", get(pages::center_claims))
        .route(
            "/coordinator/:center_id/claims/:claim_id/approve",
            post(claims::approve_handler).layer(action_limit.clone()),
        )
        .route(
            "/coordinator/:center_id/claims/:claim_id/reject",
            post(claims::reject_handler).layer(action_limit.clone()),
        );

    let lecturer_routes = Router::new()
        .route("/lecturer", get(pages::lecturer_landing))
        .route("/lecturer/claims", get(pages::lecturer_claims))
        .route("/lecturer/claims", post(claims::submit_handler).layer(action_limit))
        .route("/lecturer/claims/:claim_id", get(pages::lecturer_claim_detail))
        .route("/lecturer/centers/:center_id", get(pages::lecturer_center));

    Router::new()
        .route("/", get(pages::root))
        .route("/dashboard", get(pages::dashboard))
        .route("/health", get(health_check))
        .route("/metrics", get(metrics::metrics_endpoint))
        .merge(auth_routes)
        .merge(registry_routes)
        .merge(coordinator_routes)
        .merge(lecturer_routes)
        .route_layer(middleware::from_fn(metrics::metrics_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), guard::route_guard))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
