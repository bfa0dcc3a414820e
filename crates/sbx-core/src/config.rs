use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{SbxError, SbxResult};

/// Top-level configuration (loaded from sealbox.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SbxConfig {
    pub log: LogConfig,
    pub storage: StorageConfig,
}

impl SbxConfig {
    /// Load configuration from a TOML file, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> SbxResult<Self> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "config file not found (using defaults)");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| SbxError::Config(format!("parsing {}: {e}", path.display())))
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level / EnvFilter directive (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Primary backend implementation: "s3" or "memory"
    pub backend_kind: String,
    /// Where the primary backend lives
    pub backend: BackendConfig,
    /// Object key prefix inside the bucket
    pub prefix: String,
    /// S3 region (default: us-east-1)
    pub region: String,
    /// Bucket name
    pub bucket: String,
    /// Local directory used when the primary backend errors
    pub fallback_dir: PathBuf,
    /// Reject plaintext HTTP endpoints
    pub enforce_tls: bool,
}

impl StorageConfig {
    /// `{protocol}://{host}:{port}`
    pub fn endpoint(&self) -> String {
        format!(
            "{}://{}:{}",
            self.backend.protocol, self.backend.host, self.backend.port
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub host: String,
    pub port: u16,
    /// "http" or "https"
    pub protocol: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend_kind: "s3".into(),
            backend: BackendConfig::default(),
            prefix: "sealbox".into(),
            region: "us-east-1".into(),
            bucket: "sealbox".into(),
            fallback_dir: PathBuf::from("~/.local/share/sealbox/fallback"),
            enforce_tls: false,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 8333,
            protocol: "http".into(),
        }
    }
}

/// Expand a leading `~/` to the user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            PathBuf::from(home).join(rest)
        }
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[log]
level = "debug"
format = "json"

[storage]
backend_kind = "memory"
prefix = "vault"
bucket = "my-bucket"
fallback_dir = "/var/lib/sealbox/fallback"
enforce_tls = true

[storage.backend]
protocol = "https"
host = "cas.example.com"
port = 9443
"#;
        let config = SbxConfig::from_toml(toml_str).unwrap();

        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, "json");
        assert_eq!(config.storage.backend_kind, "memory");
        assert_eq!(config.storage.prefix, "vault");
        assert_eq!(config.storage.bucket, "my-bucket");
        assert!(config.storage.enforce_tls);
        assert_eq!(
            config.storage.fallback_dir,
            PathBuf::from("/var/lib/sealbox/fallback")
        );
        assert_eq!(config.storage.endpoint(), "https://cas.example.com:9443");
    }

    #[test]
    fn test_parse_defaults() {
        let config = SbxConfig::from_toml("").unwrap();

        assert_eq!(config.log.level, "info");
        assert_eq!(config.log.format, "text");
        assert_eq!(config.storage.backend_kind, "s3");
        assert_eq!(config.storage.endpoint(), "http://localhost:8333");
        assert_eq!(config.storage.region, "us-east-1");
        assert!(!config.storage.enforce_tls);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[storage.backend]
host = "192.168.1.100"
"#;
        let config = SbxConfig::from_toml(toml_str).unwrap();

        // Overridden
        assert_eq!(config.storage.backend.host, "192.168.1.100");
        // Defaults
        assert_eq!(config.storage.backend.port, 8333);
        assert_eq!(config.storage.bucket, "sealbox");
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = SbxConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed = SbxConfig::from_toml(&toml_str).unwrap();

        assert_eq!(config.storage.endpoint(), parsed.storage.endpoint());
        assert_eq!(config.storage.fallback_dir, parsed.storage.fallback_dir);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = SbxConfig::load(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(config.storage.backend_kind, "s3");
    }

    #[test]
    fn test_load_invalid_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        std::fs::write(&path, "[storage\nbackend_kind = ").unwrap();

        let err = SbxConfig::load(&path).unwrap_err();
        assert!(matches!(err, SbxError::Config(_)));
    }

    #[test]
    fn test_expand_tilde() {
        std::env::set_var("HOME", "/home/tester");
        assert_eq!(
            expand_tilde(Path::new("~/data")),
            PathBuf::from("/home/tester/data")
        );
        assert_eq!(expand_tilde(Path::new("/abs")), PathBuf::from("/abs"));
    }
}
