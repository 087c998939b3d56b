//! Body extractors whose rejections are failure results.
//!
//! Malformed bodies, wrong field types and unknown fields all surface as
//! `ApiError` validation failures instead of axum's plain-text rejections.

use axum::body::Bytes;
use axum::extract::FromRequest;
use serde::de::DeserializeOwned;

use super::error::ApiError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ValidJson<T>(pub T);

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Form), rejection(ApiError))]
pub struct ValidForm<T>(pub T);

/// Decode an optional JSON body. An empty body yields the default value;
/// anything else must satisfy the schema.
pub fn optional_json<T>(body: &Bytes, field: &str) -> Result<T, ApiError>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::validation_field(field, format!("Invalid request body: {}", e)))
}
