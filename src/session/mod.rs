//! Reading the caller's session from the request cookie.
//!
//! Handlers receive the session as an explicit `Session` argument; nothing
//! reads cookies ambiently. The extractor performs no database access.

mod codec;

pub use codec::{Role, Session, SessionCodec, SessionError, MAX_SESSION_TTL_HOURS};

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

use crate::AppState;

/// Session cookie name
pub const SESSION_COOKIE: &str = "app_session";

/// Where unauthenticated requests are sent
pub const LOGIN_PATH: &str = "/login";

/// Result of looking for a session on a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRead {
    Absent,
    Invalid(SessionError),
    Valid(Session),
}

impl SessionRead {
    pub fn into_session(self) -> Option<Session> {
        match self {
            SessionRead::Valid(session) => Some(session),
            _ => None,
        }
    }
}

pub fn read_session(jar: &CookieJar, codec: &SessionCodec) -> SessionRead {
    match jar.get(SESSION_COOKIE) {
        None => SessionRead::Absent,
        Some(cookie) => match codec.decode(cookie.value()) {
            Ok(session) => SessionRead::Valid(session),
            Err(e) => SessionRead::Invalid(e),
        },
    }
}

pub fn current_session(jar: &CookieJar, codec: &SessionCodec) -> Option<Session> {
    read_session(jar, codec).into_session()
}

/// Cookie carrying an encoded session
pub fn session_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Expired cookie that makes the browser drop the session
pub fn removal_cookie() -> Cookie<'static> {
    let mut cookie = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    cookie.make_removal();
    cookie
}

pub fn clear_session(jar: CookieJar) -> CookieJar {
    jar.add(removal_cookie())
}

/// Redirect to the login page, dropping the cookie when it was unusable
pub fn login_redirect(jar: CookieJar, clear_cookie: bool) -> Response {
    if clear_cookie {
        (clear_session(jar), Redirect::to(LOGIN_PATH)).into_response()
    } else {
        Redirect::to(LOGIN_PATH).into_response()
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Session {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        match read_session(&jar, &state.sessions) {
            SessionRead::Valid(session) => Ok(session),
            SessionRead::Absent => Err(login_redirect(jar, false)),
            SessionRead::Invalid(reason) => {
                tracing::debug!(reason = %reason, "Rejecting invalid session cookie");
                Err(login_redirect(jar, true))
            }
        }
    }
}
