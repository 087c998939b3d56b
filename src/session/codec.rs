//! Session cookie encoding.
//!
//! Cookie format: `base64url(json) "." base64url(hmac_sha256(json_b64))`.
//! The JSON body is `{"userId": .., "role": .., "name": .., "exp": ..}`.
//! Decoding never touches storage: it only proves the cookie was issued by
//! this server, is unexpired and names a known role.

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD as B64, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Longest accepted session lifetime (ten years)
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365 * 10;

/// Roles a session can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Manages centers, departments and users
    Registry,
    /// Owns one center and processes its claims
    Coordinator,
    /// Submits claims to its assigned center
    Lecturer,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Registry, Role::Coordinator, Role::Lecturer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Registry => "REGISTRY",
            Role::Coordinator => "COORDINATOR",
            Role::Lecturer => "LECTURER",
        }
    }

    /// Landing page a user of this role is sent to after login
    pub fn landing_path(&self) -> &'static str {
        match self {
            Role::Registry => "/registry",
            Role::Coordinator => "/coordinator",
            Role::Lecturer => "/lecturer",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REGISTRY" => Ok(Role::Registry),
            "COORDINATOR" => Ok(Role::Coordinator),
            "LECTURER" => Ok(Role::Lecturer),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Identity carried by the session cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Expiry as unix seconds
    #[serde(rename = "exp")]
    pub expires_at: i64,
}

impl Session {
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// Why a cookie value was not accepted as a session
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session cookie is not well-formed")]
    Malformed,
    #[error("session signature does not match")]
    BadSignature,
    #[error("session has no userId")]
    MissingUserId,
    #[error("session has no role")]
    MissingRole,
    #[error("session role '{0}' is not recognised")]
    UnknownRole(String),
    #[error("session has expired")]
    Expired,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSession {
    user_id: Option<String>,
    role: Option<String>,
    name: Option<String>,
    exp: Option<i64>,
}

/// Signs and verifies session cookie values
#[derive(Clone)]
pub struct SessionCodec {
    mac: HmacSha256,
    ttl: chrono::TimeDelta,
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl SessionCodec {
    pub fn new(secret: &str, ttl_hours: i64) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| anyhow!("Invalid session signing key"))?;
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&ttl_hours) {
            return Err(anyhow!(
                "Session TTL must be between 1 and {} hours",
                MAX_SESSION_TTL_HOURS
            ));
        }
        let ttl = chrono::TimeDelta::try_hours(ttl_hours)
            .ok_or_else(|| anyhow!("Session TTL of {} hours is out of range", ttl_hours))?;
        Ok(Self { mac, ttl })
    }

    /// Build a fresh session for a user, expiring after the configured TTL
    pub fn issue(&self, user_id: &str, role: Role, name: Option<&str>) -> Session {
        Session {
            user_id: user_id.to_string(),
            role,
            name: name.map(str::to_string),
            expires_at: chrono::Utc::now()
                .checked_add_signed(self.ttl)
                .map_or(i64::MAX, |at| at.timestamp()),
        }
    }

    pub fn encode(&self, session: &Session) -> String {
        let body = serde_json::json!({
            "userId": session.user_id,
            "role": session.role.as_str(),
            "name": session.name,
            "exp": session.expires_at,
        });
        let payload = B64.encode(body.to_string());
        let signature = B64.encode(self.sign(&payload));
        format!("{}.{}", payload, signature)
    }

    pub fn decode(&self, value: &str) -> Result<Session, SessionError> {
        self.decode_at(value, chrono::Utc::now().timestamp())
    }

    /// Decode against an explicit clock (unix seconds)
    pub fn decode_at(&self, value: &str, now: i64) -> Result<Session, SessionError> {
        let (payload, signature) = value.split_once('.').ok_or(SessionError::Malformed)?;
        let signature = B64
            .decode(signature)
            .map_err(|_| SessionError::Malformed)?;

        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| SessionError::BadSignature)?;

        let json = B64.decode(payload).map_err(|_| SessionError::Malformed)?;
        let raw: RawSession =
            serde_json::from_slice(&json).map_err(|_| SessionError::Malformed)?;

        let user_id = raw
            .user_id
            .filter(|id| !id.is_empty())
            .ok_or(SessionError::MissingUserId)?;
        let role = raw.role.ok_or(SessionError::MissingRole)?;
        let role: Role = role
            .parse()
            .map_err(|_| SessionError::UnknownRole(role.clone()))?;
        let expires_at = raw.exp.ok_or(SessionError::Malformed)?;

        let session = Session {
            user_id,
            role,
            name: raw.name,
            expires_at,
        };
        if session.is_expired_at(now) {
            return Err(SessionError::Expired);
        }
        Ok(session)
    }

    fn sign(&self, payload: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-test-secret-test-secret";

    fn codec() -> SessionCodec {
        SessionCodec::new(SECRET, 1).unwrap()
    }

    /// Sign an arbitrary JSON body the way `encode` would
    fn forge(codec: &SessionCodec, body: &str) -> String {
        let payload = B64.encode(body);
        format!("{}.{}", payload, B64.encode(codec.sign(&payload)))
    }

    #[test]
    fn test_issue_and_decode() {
        let codec = codec();
        let session = codec.issue("user-1", Role::Coordinator, Some("Ama"));
        let decoded = codec.decode(&codec.encode(&session)).unwrap();
        assert_eq!(decoded, session);
    }

    #[test]
    fn test_ttl_out_of_range_is_an_error() {
        assert!(SessionCodec::new(SECRET, 0).is_err());
        assert!(SessionCodec::new(SECRET, 10_000_000_000).is_err());

        let codec = SessionCodec::new(SECRET, MAX_SESSION_TTL_HOURS).unwrap();
        let session = codec.issue("user-1", Role::Lecturer, None);
        assert!(session.expires_at > chrono::Utc::now().timestamp());
        assert_eq!(codec.decode(&codec.encode(&session)).unwrap(), session);
    }

    #[test]
    fn test_name_is_optional() {
        let codec = codec();
        let session = codec.issue("user-1", Role::Lecturer, None);
        let decoded = codec.decode(&codec.encode(&session)).unwrap();
        assert_eq!(decoded.name, None);
        assert_eq!(decoded.role, Role::Lecturer);
    }

    #[test]
    fn test_rejects_tampered_payload() {
        let codec = codec();
        let value = codec.encode(&codec.issue("user-1", Role::Lecturer, None));
        let (_, signature) = value.split_once('.').unwrap();

        let forged_body = B64.encode(r#"{"userId":"user-1","role":"REGISTRY","exp":99999999999}"#);
        let forged = format!("{}.{}", forged_body, signature);
        assert_eq!(codec.decode(&forged), Err(SessionError::BadSignature));
    }

    #[test]
    fn test_rejects_unsigned_json() {
        let codec = codec();
        let raw = r#"{"userId":"user-1","role":"REGISTRY"}"#;
        assert_eq!(codec.decode(raw), Err(SessionError::Malformed));
    }

    #[test]
    fn test_rejects_other_secret() {
        let issued = codec();
        let other = SessionCodec::new("another-secret-another-secret-xx", 1).unwrap();
        let value = issued.encode(&issued.issue("user-1", Role::Registry, None));
        assert_eq!(other.decode(&value), Err(SessionError::BadSignature));
    }

    #[test]
    fn test_structural_failures() {
        let codec = codec();
        assert_eq!(
            codec.decode(&forge(&codec, "not json")),
            Err(SessionError::Malformed)
        );
        assert_eq!(
            codec.decode(&forge(&codec, r#"{"role":"LECTURER","exp":99999999999}"#)),
            Err(SessionError::MissingUserId)
        );
        assert_eq!(
            codec.decode(&forge(&codec, r#"{"userId":"","role":"LECTURER","exp":99999999999}"#)),
            Err(SessionError::MissingUserId)
        );
        assert_eq!(
            codec.decode(&forge(&codec, r#"{"userId":"u","exp":99999999999}"#)),
            Err(SessionError::MissingRole)
        );
        assert_eq!(
            codec.decode(&forge(&codec, r#"{"userId":"u","role":"ADMIN","exp":99999999999}"#)),
            Err(SessionError::UnknownRole("ADMIN".to_string()))
        );
        assert_eq!(
            codec.decode(&forge(&codec, r#"{"userId":"u","role":"lecturer","exp":99999999999}"#)),
            Err(SessionError::UnknownRole("lecturer".to_string()))
        );
        assert_eq!(
            codec.decode(&forge(&codec, r#"{"userId":7,"role":"LECTURER","exp":99999999999}"#)),
            Err(SessionError::Malformed)
        );
    }

    #[test]
    fn test_rejects_expired() {
        let codec = codec();
        let session = codec.issue("user-1", Role::Lecturer, None);
        let value = codec.encode(&session);
        assert_eq!(
            codec.decode_at(&value, session.expires_at),
            Err(SessionError::Expired)
        );
        assert!(codec.decode_at(&value, session.expires_at - 1).is_ok());
    }

    #[test]
    fn test_garbage_never_panics() {
        let codec = codec();
        for value in ["", ".", "..", "a.b", "%%%.%%%", "e30.", ".e30"] {
            assert!(codec.decode(value).is_err(), "{:?} should not decode", value);
        }
    }

    #[test]
    fn test_role_parsing_is_exact() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("Registry".parse::<Role>().is_err());
    }
}
