//! Claim lifecycle actions: lecturers submit, coordinators decide once.
//!
//! The handlers are thin wrappers; `create_claim`, `approve_claim` and
//! `reject_claim` hold the rules and are what the tests drive.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
};
use serde_json::json;
use std::sync::Arc;

use crate::db::{
    self, actions, resource_types, AuditEntry, Claim, ClaimPayload, ClaimResponse, ClaimStatus,
    CreateClaimRequest, NewClaim, RejectClaimRequest,
};
use crate::session::{Role, Session};
use crate::AppState;

use super::audit::{audit_log, extract_client_ip};
use super::authz::{require_action, Ownership, Requirement};
use super::error::ApiError;
use super::extract::{optional_json, ValidJson};
use super::metrics::{record_claim_processed, record_claim_submitted};
use super::response::ActionResult;
use super::validation::{validate_claim_payload, validate_reason};

/// Submit a claim for the caller's assigned center
pub async fn create_claim(
    state: &AppState,
    session: &Session,
    request: CreateClaimRequest,
    ip: Option<&str>,
) -> Result<Claim, ApiError> {
    require_action(&state.db, session, Requirement::role(Role::Lecturer)).await?;

    // The center is always re-derived from storage
    let user = db::find_user_by_id(&state.db, &session.user_id)
        .await?
        .ok_or_else(ApiError::not_authorized)?;
    let center_id = user
        .center_id
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("You are not assigned to a center"))?;

    if let Some(sent) = request.center_id.as_deref() {
        if sent != center_id {
            tracing::warn!(
                user_id = %user.id,
                sent_center_id = sent,
                center_id,
                "Ignoring client-supplied center on claim submission"
            );
        }
    }

    let payload = ClaimPayload::from_parts(request.claim_type, request.details)
        .map_err(|e| ApiError::validation_field("details", format!("Invalid claim details: {}", e)))?;
    validate_claim_payload(&payload)?;

    let details = payload
        .to_json()
        .map_err(|e| ApiError::internal(format!("Failed to encode claim details: {}", e)))?;
    let claim = db::insert_claim(
        &state.db,
        &NewClaim {
            claim_type: payload.claim_type(),
            details: &details,
            amount: payload.amount(),
            submitted_by_id: &user.id,
            center_id,
        },
    )
    .await?;

    tracing::info!(
        claim_id = %claim.id,
        claim_type = %payload.claim_type(),
        center_id,
        amount = claim.amount,
        "Claim submitted"
    );

    audit_log(
        state,
        AuditEntry::new(actions::CLAIM_CREATE, resource_types::CLAIM)
            .resource(&claim.id, Some(payload.claim_type().as_str()))
            .by(&user.id)
            .from_ip(ip)
            .details(json!({ "center_id": center_id, "amount": claim.amount })),
    )
    .await;
    record_claim_submitted(payload.claim_type());
    state.views.invalidate_claim_views(&user.id, center_id);

    Ok(claim)
}

pub async fn approve_claim(
    state: &AppState,
    session: &Session,
    center_id: &str,
    claim_id: &str,
    ip: Option<&str>,
) -> Result<Claim, ApiError> {
    transition(state, session, center_id, claim_id, ClaimStatus::Approved, None, ip).await
}

pub async fn reject_claim(
    state: &AppState,
    session: &Session,
    center_id: &str,
    claim_id: &str,
    reason: Option<&str>,
    ip: Option<&str>,
) -> Result<Claim, ApiError> {
    validate_reason(reason).map_err(|msg| ApiError::validation_field("reason", msg))?;
    transition(state, session, center_id, claim_id, ClaimStatus::Rejected, reason, ip).await
}

async fn transition(
    state: &AppState,
    session: &Session,
    center_id: &str,
    claim_id: &str,
    to: ClaimStatus,
    reason: Option<&str>,
    ip: Option<&str>,
) -> Result<Claim, ApiError> {
    require_action(
        &state.db,
        session,
        Requirement::role(Role::Coordinator).owning(Ownership::CoordinatesCenter(center_id)),
    )
    .await?;

    // A claim of another center is reported exactly like a forbidden one
    let claim = db::find_claim_in_center(&state.db, claim_id, center_id)
        .await?
        .ok_or_else(ApiError::not_authorized)?;

    if claim.status_enum().map_or(true, |s| s.is_terminal()) {
        return Err(ApiError::conflict(format!(
            "Claim has already been {}",
            claim.status.to_lowercase()
        )));
    }

    commit_transition(state, session, &claim, to, reason, ip).await
}

/// Write a decision for a claim that was read as PENDING.
///
/// The update re-checks the status, so a claim decided by someone else since
/// it was read is a conflict and keeps its first decision.
async fn commit_transition(
    state: &AppState,
    session: &Session,
    claim: &Claim,
    to: ClaimStatus,
    reason: Option<&str>,
    ip: Option<&str>,
) -> Result<Claim, ApiError> {
    let claim_id = claim.id.as_str();
    let center_id = claim.center_id.as_str();

    if !db::transition_claim(&state.db, claim_id, center_id, to, &session.user_id).await? {
        tracing::info!(claim_id, "Claim was processed by a concurrent request");
        return Err(ApiError::conflict(
            "Claim was already processed by another request",
        ));
    }

    let claim = db::find_claim(&state.db, claim_id)
        .await?
        .ok_or_else(|| ApiError::internal("Claim disappeared after update"))?;

    tracing::info!(claim_id, center_id, status = %to, processed_by = %session.user_id, "Claim processed");

    let action = match to {
        ClaimStatus::Approved => actions::CLAIM_APPROVE,
        _ => actions::CLAIM_REJECT,
    };
    let mut details = json!({ "center_id": center_id, "amount": claim.amount });
    if let Some(reason) = reason {
        details["reason"] = json!(reason);
    }
    audit_log(
        state,
        AuditEntry::new(action, resource_types::CLAIM)
            .resource(&claim.id, Some(claim.claim_type.as_str()))
            .by(&session.user_id)
            .from_ip(ip)
            .details(details),
    )
    .await;
    record_claim_processed(to);
    state
        .views
        .invalidate_claim_views(&claim.submitted_by_id, center_id);

    Ok(claim)
}

/// POST /lecturer/claims
pub async fn submit_handler(
    State(state): State<Arc<AppState>>,
    session: Session,
    headers: HeaderMap,
    ValidJson(request): ValidJson<CreateClaimRequest>,
) -> Result<ActionResult<ClaimResponse>, ApiError> {
    let ip = extract_client_ip(&headers);
    let claim = create_claim(&state, &session, request, ip.as_deref()).await?;
    Ok(ActionResult::created("Claim submitted", claim.into()))
}

/// POST /coordinator/:center_id/claims/:claim_id/approve
pub async fn approve_handler(
    State(state): State<Arc<AppState>>,
    session: Session,
    headers: HeaderMap,
    Path((center_id, claim_id)): Path<(String, String)>,
) -> Result<ActionResult<ClaimResponse>, ApiError> {
    let ip = extract_client_ip(&headers);
    let claim = approve_claim(&state, &session, &center_id, &claim_id, ip.as_deref()).await?;
    Ok(ActionResult::ok("Claim approved", claim.into()))
}

/// POST /coordinator/:center_id/claims/:claim_id/reject
pub async fn reject_handler(
    State(state): State<Arc<AppState>>,
    session: Session,
    headers: HeaderMap,
    Path((center_id, claim_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<ActionResult<ClaimResponse>, ApiError> {
    let ip = extract_client_ip(&headers);
    let request: RejectClaimRequest = optional_json(&body, "reason")?;
    let claim = reject_claim(
        &state,
        &session,
        &center_id,
        &claim_id,
        request.reason.as_deref(),
        ip.as_deref(),
    )
    .await?;
    Ok(ActionResult::ok("Claim rejected", claim.into()))
}
