use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::{debug, info};

use vhub_core::new_id;

use crate::model::{Account, AccountView, Actor, Claims, Session, SignIn, TokenResponse};
use crate::service::{MarketError, MarketService};

const SESSION_PREFIX: &str = "session:";

fn session_key(id: &str) -> String {
    format!("{}{}", SESSION_PREFIX, id)
}

/// Hash a plain password with argon2id.
pub(crate) fn hash_password(password: &str) -> Result<String, MarketError> {
    use argon2::Argon2;
    use password_hash::rand_core::OsRng;
    use password_hash::{PasswordHasher, SaltString};

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| MarketError::Internal(format!("password hashing failed: {}", e)))
}

/// Verify a password against an argon2id hash.
pub(crate) fn verify_password(password: &str, hash: &str) -> bool {
    use argon2::Argon2;
    use password_hash::{PasswordHash, PasswordVerifier};

    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

impl MarketService {
    /// Check credentials and open a session.
    pub fn sign_in(&self, input: SignIn) -> Result<TokenResponse, MarketError> {
        let email = input.email.trim().to_lowercase();
        let found = self.with_retry("sign_in", |s| s.account_by_email(&email))?;

        let account = match found {
            Some((account, hash)) if verify_password(&input.password, &hash) => account,
            _ => {
                debug!(email = %email, "sign-in rejected");
                return Err(MarketError::AuthenticationRequired);
            }
        };

        self.purge_expired_sessions(chrono::Utc::now())?;
        self.issue_token(&account)
    }

    /// Drop every session record that has lapsed at `now`, along with any
    /// record that no longer parses. Returns how many were removed.
    pub(crate) fn purge_expired_sessions(
        &self,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<usize, MarketError> {
        let mut removed = 0;
        for (key, bytes) in self.kv.scan(SESSION_PREFIX)? {
            let lapsed = match serde_json::from_slice::<Session>(&bytes) {
                Ok(session) => session.is_expired(now),
                Err(_) => true,
            };
            if lapsed {
                self.kv.delete(&key)?;
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(removed, "expired sessions purged");
        }
        Ok(removed)
    }

    /// Create a session record and sign a token naming it.
    pub(crate) fn issue_token(&self, account: &Account) -> Result<TokenResponse, MarketError> {
        let now = chrono::Utc::now();
        let exp = now + chrono::Duration::seconds(self.config.session_ttl_secs);

        let session = Session {
            id: new_id(),
            account_id: account.id.clone(),
            issued_at: now.to_rfc3339(),
            expires_at: exp.to_rfc3339(),
        };
        let data = serde_json::to_vec(&session)
            .map_err(|e| MarketError::Internal(e.to_string()))?;
        self.kv.set(&session_key(&session.id), &data)?;

        let claims = Claims {
            sub: account.id.clone(),
            sid: session.id.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };
        let access_token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| MarketError::Internal(format!("JWT encode failed: {}", e)))?;

        info!(account_id = %account.id, session_id = %session.id, "session opened");

        Ok(TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.session_ttl_secs,
            account: AccountView::private(account),
        })
    }

    /// Verify a token's signature and expiry.
    fn decode_token(&self, token: &str) -> Result<Claims, MarketError> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| {
            debug!(error = %e, "token rejected");
            MarketError::AuthenticationRequired
        })?;
        Ok(data.claims)
    }

    /// Close the session a token names. Every token for that session
    /// stops resolving.
    pub fn sign_out(&self, token: &str) -> Result<(), MarketError> {
        let claims = self.decode_token(token)?;
        match self.kv.take(&session_key(&claims.sid))? {
            Some(_) => {
                info!(account_id = %claims.sub, session_id = %claims.sid, "session closed");
                Ok(())
            }
            None => Err(MarketError::AuthenticationRequired),
        }
    }

    /// Turn an optional bearer token into the acting [`Actor`].
    ///
    /// No token is an anonymous visitor. A token that is malformed,
    /// expired or signed out is an error, never a silent downgrade to
    /// anonymous. The account is re-read on every call so a fresh
    /// verification takes effect on the next request.
    pub fn resolve_actor(&self, token: Option<&str>) -> Result<Actor, MarketError> {
        let Some(token) = token else {
            return Ok(Actor::Anonymous);
        };
        let claims = self.decode_token(token)?;

        let session: Session = match self.kv.get(&session_key(&claims.sid))? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| MarketError::Internal(format!("corrupt session: {}", e)))?,
            None => return Err(MarketError::AuthenticationRequired),
        };
        if session.account_id != claims.sub || session.is_expired(chrono::Utc::now()) {
            return Err(MarketError::AuthenticationRequired);
        }

        let account = match self.with_retry("resolve_actor", |s| s.get_account(&claims.sub)) {
            Ok(account) => account,
            Err(MarketError::NotFound(_)) => return Err(MarketError::AuthenticationRequired),
            Err(e) => return Err(e),
        };
        Ok(Actor::from_account(&account))
    }
}
