use serde::{Deserialize, Serialize};

use crate::model::AccountView;

/// A sign-in record, kept in the KV store under `session:{id}`.
/// Signing out removes it, which invalidates every token naming it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session id (UUIDv4, no dashes).
    pub id: String,

    pub account_id: String,

    /// RFC 3339 timestamp when the token was issued.
    pub issued_at: String,

    /// RFC 3339 timestamp when the token expires.
    pub expires_at: String,
}

impl Session {
    /// Whether the session has lapsed at `now`. An unparsable expiry counts
    /// as lapsed.
    pub fn is_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        match chrono::DateTime::parse_from_rfc3339(&self.expires_at) {
            Ok(exp) => exp.with_timezone(&chrono::Utc) <= now,
            Err(_) => true,
        }
    }
}

/// JWT claims payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: account id.
    pub sub: String,

    /// Session id.
    pub sid: String,

    /// Issued at (unix timestamp).
    pub iat: i64,

    /// Expiration (unix timestamp).
    pub exp: i64,
}

/// Returned by sign-in.
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub account: AccountView,
}
