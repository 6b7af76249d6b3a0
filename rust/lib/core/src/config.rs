use std::path::PathBuf;

/// Storage and listener configuration shared by service binaries.
///
/// Parsed from `--flag=value` arguments or filled in from a config file,
/// then handed to storage initialization.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Root directory for all on-disk state.
    pub data_dir: Option<PathBuf>,

    /// Path to the redb session database.
    /// Defaults to `{data_dir}/data.redb` if not specified.
    pub kv_path: Option<PathBuf>,

    /// Path to the SQLite record database.
    /// Defaults to `{data_dir}/data.sqlite` if not specified.
    pub sqlite_path: Option<PathBuf>,

    /// Listen address for the HTTP server.
    pub listen: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            kv_path: None,
            sqlite_path: None,
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Parse configuration from command-line style arguments.
    ///
    /// Supported flags:
    /// - `--data-dir=PATH`
    /// - `--kv=PATH`
    /// - `--sqlite=PATH`
    /// - `--listen=ADDR`
    ///
    /// Unknown arguments are ignored.
    pub fn from_args(args: &[String]) -> Self {
        let mut config = ServiceConfig::default();

        for arg in args {
            if let Some(val) = arg.strip_prefix("--data-dir=") {
                config.data_dir = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--kv=") {
                config.kv_path = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--sqlite=") {
                config.sqlite_path = Some(PathBuf::from(val));
            } else if let Some(val) = arg.strip_prefix("--listen=") {
                config.listen = val.to_string();
            }
        }

        config
    }

    /// Resolve the redb path, falling back to `{data_dir}/data.redb`.
    pub fn resolve_kv_path(&self) -> PathBuf {
        self.kv_path
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("data.redb"))
    }

    /// Resolve the SQLite path, falling back to `{data_dir}/data.sqlite`.
    pub fn resolve_sqlite_path(&self) -> PathBuf {
        self.sqlite_path
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("data.sqlite"))
    }

    fn resolve_data_subpath(&self, name: &str) -> PathBuf {
        self.data_dir
            .as_ref()
            .map(|d| d.join(name))
            .unwrap_or_else(|| PathBuf::from(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_args() {
        let args = vec![
            "--data-dir=/var/lib/vhub".to_string(),
            "--listen=127.0.0.1:9090".to_string(),
            "--verbose".to_string(),
        ];
        let config = ServiceConfig::from_args(&args);
        assert_eq!(config.data_dir, Some(PathBuf::from("/var/lib/vhub")));
        assert_eq!(config.listen, "127.0.0.1:9090");
        assert!(config.kv_path.is_none());
    }

    #[test]
    fn test_resolve_defaults() {
        let config = ServiceConfig {
            data_dir: Some(PathBuf::from("/data")),
            ..Default::default()
        };
        assert_eq!(config.resolve_kv_path(), PathBuf::from("/data/data.redb"));
        assert_eq!(config.resolve_sqlite_path(), PathBuf::from("/data/data.sqlite"));
    }

    #[test]
    fn test_explicit_path_wins() {
        let config = ServiceConfig::from_args(&[
            "--data-dir=/data".to_string(),
            "--sqlite=/fast/records.sqlite".to_string(),
        ]);
        assert_eq!(
            config.resolve_sqlite_path(),
            PathBuf::from("/fast/records.sqlite")
        );
    }
}
