//! Server-side configuration, read from a TOML file.
//!
//! ```toml
//! [storage]
//! data_dir = "/var/lib/vhub"
//!
//! [session]
//! secret = "..."
//! ttl_secs = 86400
//!
//! [verifier]
//! key_hash = "$argon2id$..."
//!
//! [store]
//! retries = 3
//! backoff_ms = 50
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use market::service::MarketConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub storage: StorageConfig,
    pub session: SessionConfig,
    pub verifier: VerifierConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding `data.redb` and `data.sqlite`.
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// JWT signing secret.
    pub secret: String,
    #[serde(default = "default_ttl")]
    pub ttl_secs: i64,
}

/// The external trust authority. Holders of the key may flip an
/// organization's verified flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// argon2id hash of the verifier key.
    pub key_hash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retries: default_retries(),
            backoff_ms: default_backoff_ms(),
        }
    }
}

fn default_ttl() -> i64 {
    86400
}

fn default_retries() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    50
}

impl ServerConfig {
    /// A bare name resolves to `/etc/vhub/<name>.toml`; anything with a
    /// `/` or `.` is taken as a path.
    pub fn resolve_path(name_or_path: &str) -> PathBuf {
        if name_or_path.contains('/') || name_or_path.contains('.') {
            PathBuf::from(name_or_path)
        } else {
            PathBuf::from("/etc/vhub").join(format!("{}.toml", name_or_path))
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?;
        let config: ServerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn market_config(&self) -> MarketConfig {
        MarketConfig {
            jwt_secret: self.session.secret.clone(),
            session_ttl_secs: self.session.ttl_secs,
            store_retries: self.store.retries,
            retry_backoff: Duration::from_millis(self.store.backoff_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path() {
        assert_eq!(
            ServerConfig::resolve_path("prod"),
            PathBuf::from("/etc/vhub/prod.toml")
        );
        assert_eq!(
            ServerConfig::resolve_path("./local.toml"),
            PathBuf::from("./local.toml")
        );
    }

    #[test]
    fn test_load_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vhub.toml");
        std::fs::write(
            &path,
            r#"
[storage]
data_dir = "/var/lib/vhub"

[session]
secret = "s3cret"

[verifier]
key_hash = "$argon2id$v=19$m=19456,t=2,p=1$abc$def"
"#,
        )
        .unwrap();

        let config = ServerConfig::load(&path).unwrap();
        assert_eq!(config.storage.data_dir, "/var/lib/vhub");
        assert_eq!(config.session.ttl_secs, 86400);
        assert_eq!(config.store.retries, 3);

        let market = config.market_config();
        assert_eq!(market.jwt_secret, "s3cret");
        assert_eq!(market.retry_backoff, Duration::from_millis(50));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(ServerConfig::load(Path::new("/nonexistent/vhub.toml")).is_err());
    }
}
