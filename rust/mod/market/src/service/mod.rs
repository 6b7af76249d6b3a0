pub mod account;
pub mod bookmark;
pub mod dashboard;
pub mod opportunity;
pub mod registration;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

use vhub_core::ServiceError;
use vhub_kv::{KVError, KVStore};
use vhub_sql::{SQLError, SQLStore};

use crate::policy::{can_perform, DenyReason, Operation};
use crate::model::Actor;
use crate::store::MarketStore;

/// Marketplace service error type.
#[derive(Debug, Error)]
pub enum MarketError {
    #[error("authentication required")]
    AuthenticationRequired,

    #[error("denied ({reason}): {}", reason.describe())]
    AuthorizationDenied { reason: DenyReason },

    #[error("invalid {field}: {message}")]
    ValidationFailed { field: String, message: String },

    /// A uniqueness or capacity race was lost. Never retried here; the
    /// caller re-fetches and decides again.
    #[error("conflict: {0}")]
    ConflictFailed(String),

    /// The store is temporarily unreachable.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal: {0}")]
    Internal(String),
}

impl MarketError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        MarketError::ValidationFailed {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<DenyReason> for MarketError {
    fn from(reason: DenyReason) -> Self {
        match reason {
            DenyReason::NotAuthenticated => MarketError::AuthenticationRequired,
            reason => MarketError::AuthorizationDenied { reason },
        }
    }
}

impl From<SQLError> for MarketError {
    fn from(e: SQLError) -> Self {
        match e {
            SQLError::Constraint(_) | SQLError::Precondition { .. } => {
                MarketError::ConflictFailed(e.to_string())
            }
            e if e.is_transient() => MarketError::StoreUnavailable(e.to_string()),
            e => MarketError::Internal(e.to_string()),
        }
    }
}

impl From<KVError> for MarketError {
    fn from(e: KVError) -> Self {
        match e {
            KVError::Storage(m) => MarketError::StoreUnavailable(m),
            KVError::Serialization(m) => MarketError::Internal(m),
        }
    }
}

impl From<MarketError> for ServiceError {
    fn from(e: MarketError) -> Self {
        match e {
            MarketError::AuthenticationRequired => ServiceError::Unauthorized(e.to_string()),
            MarketError::AuthorizationDenied { reason } => ServiceError::PermissionDenied {
                reason: reason.as_str().to_string(),
                message: reason.describe().to_string(),
            },
            MarketError::ValidationFailed { field, message } => ServiceError::Validation {
                field: Some(field),
                message,
            },
            MarketError::ConflictFailed(m) => ServiceError::Conflict(m),
            MarketError::StoreUnavailable(m) => ServiceError::Unavailable(m),
            MarketError::NotFound(m) => ServiceError::NotFound(m),
            MarketError::Internal(m) => ServiceError::Internal(m),
        }
    }
}

/// Configuration for the marketplace service.
#[derive(Debug, Clone)]
pub struct MarketConfig {
    /// JWT signing secret.
    pub jwt_secret: String,
    /// Session lifetime in seconds (default: 24h).
    pub session_ttl_secs: i64,
    /// How many times a call failing with `StoreUnavailable` is repeated.
    pub store_retries: u32,
    /// Pause before each retry.
    pub retry_backoff: Duration,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "vhub-dev-secret-change-me".to_string(),
            session_ttl_secs: 86400,
            store_retries: 3,
            retry_backoff: Duration::from_millis(50),
        }
    }
}

/// The marketplace service. Every operation takes the acting [`Actor`]
/// explicitly, asks the policy first, then issues one atomic store call.
pub struct MarketService {
    pub(crate) store: MarketStore,
    pub(crate) kv: Arc<dyn KVStore>,
    pub(crate) config: MarketConfig,
}

impl MarketService {
    /// Create a new MarketService, initializing the DB schema.
    pub fn new(
        sql: Arc<dyn SQLStore>,
        kv: Arc<dyn KVStore>,
        config: MarketConfig,
    ) -> Result<Arc<Self>, MarketError> {
        let store = MarketStore::new(sql)?;
        Ok(Arc::new(Self { store, kv, config }))
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// Ask the policy, turning a denial into the matching error.
    pub(crate) fn authorize(&self, actor: &Actor, op: Operation<'_>) -> Result<(), MarketError> {
        can_perform(actor, &op)
            .into_result()
            .map_err(MarketError::from)
    }

    /// Run a store call, repeating it while it fails with
    /// `StoreUnavailable`. Every other error is returned at once.
    ///
    /// The backoff sleeps the calling thread; HTTP handlers reach the
    /// service through [`crate::api::run_blocking`].
    pub(crate) fn with_retry<T>(
        &self,
        what: &str,
        mut f: impl FnMut(&MarketStore) -> Result<T, MarketError>,
    ) -> Result<T, MarketError> {
        let mut attempt = 0;
        loop {
            match f(&self.store) {
                Err(MarketError::StoreUnavailable(msg)) if attempt < self.config.store_retries => {
                    attempt += 1;
                    warn!(operation = what, attempt, error = %msg, "store unavailable, retrying");
                    if !self.config.retry_backoff.is_zero() {
                        std::thread::sleep(self.config.retry_backoff);
                    }
                }
                other => return other,
            }
        }
    }
}

/// Decode a JSON patch, accepting only the listed keys.
///
/// The offending key is reported as the error field, so a client that
/// sends `verified` or `current_volunteers` learns exactly which one.
pub(crate) fn parse_patch<T: DeserializeOwned>(
    body: serde_json::Value,
    allowed: &[&str],
) -> Result<T, MarketError> {
    let obj = body
        .as_object()
        .ok_or_else(|| MarketError::invalid("body", "expected a JSON object"))?;
    for key in obj.keys() {
        if !allowed.contains(&key.as_str()) {
            return Err(MarketError::invalid(key.as_str(), "field is not writable"));
        }
    }
    serde_json::from_value(body).map_err(|e| MarketError::invalid("body", e.to_string()))
}

/// Reject blank required text.
pub(crate) fn require_text(field: &str, value: &str) -> Result<(), MarketError> {
    if value.trim().is_empty() {
        return Err(MarketError::invalid(field, format!("{field} cannot be empty")));
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Patch {
        title: Option<String>,
    }

    #[test]
    fn test_deny_mapping() {
        assert!(matches!(
            MarketError::from(DenyReason::NotAuthenticated),
            MarketError::AuthenticationRequired
        ));
        assert!(matches!(
            MarketError::from(DenyReason::NotVerified),
            MarketError::AuthorizationDenied {
                reason: DenyReason::NotVerified
            }
        ));
    }

    #[test]
    fn test_sql_error_mapping() {
        let busy = MarketError::from(SQLError::Busy("locked".into()));
        assert!(matches!(busy, MarketError::StoreUnavailable(_)));

        let pre = MarketError::from(SQLError::Precondition {
            index: 1,
            expected: 1,
            affected: 0,
        });
        assert!(matches!(pre, MarketError::ConflictFailed(_)));

        let unique = MarketError::from(SQLError::Constraint("UNIQUE".into()));
        assert!(matches!(unique, MarketError::ConflictFailed(_)));

        let query = MarketError::from(SQLError::Query("syntax".into()));
        assert!(matches!(query, MarketError::Internal(_)));
    }

    #[test]
    fn test_service_error_conversion() {
        let err: ServiceError = MarketError::AuthorizationDenied {
            reason: DenyReason::CapacityExceeded,
        }
        .into();
        match err {
            ServiceError::PermissionDenied { reason, .. } => assert_eq!(reason, "CapacityExceeded"),
            other => panic!("unexpected {other:?}"),
        }

        let err: ServiceError = MarketError::StoreUnavailable("busy".into()).into();
        assert!(err.retryable());

        let err: ServiceError = MarketError::ConflictFailed("full".into()).into();
        assert!(!err.retryable());
    }

    #[test]
    fn test_parse_patch_rejects_unknown_keys() {
        let p: Patch = parse_patch(json!({"title": "x"}), &["title"]).unwrap();
        assert_eq!(p.title.as_deref(), Some("x"));

        match parse_patch::<Patch>(json!({"title": "x", "verified": true}), &["title"]) {
            Err(MarketError::ValidationFailed { field, .. }) => assert_eq!(field, "verified"),
            other => panic!("unexpected {other:?}"),
        }

        assert!(parse_patch::<Patch>(json!([1, 2]), &["title"]).is_err());
    }
}
