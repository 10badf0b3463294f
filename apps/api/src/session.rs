//! Identity/session state consulted once at the start of an upload.

use axum::http::{header::AUTHORIZATION, HeaderMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatus {
    /// Collaborators are initialized and usable.
    pub ready: bool,
    pub authenticated: bool,
}

impl SessionStatus {
    /// Console runs hold store credentials directly and are always signed in.
    pub fn local() -> Self {
        Self {
            ready: true,
            authenticated: true,
        }
    }

    /// HTTP callers authenticate with `Authorization: Bearer <token>`.
    pub fn from_headers(headers: &HeaderMap, expected_token: &str) -> Self {
        let authenticated = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| !expected_token.is_empty() && token.trim() == expected_token);
        Self {
            ready: true,
            authenticated,
        }
    }

    pub fn can_upload(&self) -> bool {
        self.ready && self.authenticated
    }
}
