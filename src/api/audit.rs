//! Audit helpers used by actions.

use axum::http::HeaderMap;

use crate::db::{log_audit, AuditEntry};
use crate::AppState;

/// Client IP from proxy headers (X-Forwarded-For first, then X-Real-IP)
pub fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(first_ip) = forwarded.split(',').next() {
            let ip = first_ip.trim();
            if !ip.is_empty() {
                return Some(ip.to_string());
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}

/// Record an audit event. Failures are logged and never fail the request.
pub async fn audit_log(state: &AppState, entry: AuditEntry<'_>) {
    if let Err(e) = log_audit(&state.db, &entry).await {
        tracing::warn!(
            action = entry.action,
            resource_type = entry.resource_type,
            error = %e,
            "Failed to create audit log entry"
        );
    }
}
