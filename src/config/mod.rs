use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC secret used to sign session tokens; random per process when unset
    pub jwt_secret: Option<String>,
    /// Lifetime of a session token and its cookie
    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: u64,
    /// Whether POST /auth/register is open to the public
    #[serde(default)]
    pub allow_registration: bool,
    /// Mark the session cookie `Secure`
    #[serde(default = "default_true")]
    pub secure_cookies: bool,
    /// Bootstrap administrator, created at startup if missing
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            session_ttl_seconds: default_session_ttl(),
            allow_registration: false,
            secure_cookies: true,
            admin_email: None,
            admin_password: None,
        }
    }
}

fn default_session_ttl() -> u64 {
    60 * 60
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed to call the API cross-origin (same-origin is always allowed)
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_login_max")]
    pub login_max: u32,
    #[serde(default = "default_auth_window")]
    pub login_window_seconds: u64,
    #[serde(default = "default_register_max")]
    pub register_max: u32,
    #[serde(default = "default_auth_window")]
    pub register_window_seconds: u64,
    /// Interval of the expired-bucket sweep, 0 disables it
    #[serde(default)]
    pub cleanup_interval_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            login_max: default_login_max(),
            login_window_seconds: default_auth_window(),
            register_max: default_register_max(),
            register_window_seconds: default_auth_window(),
            cleanup_interval_seconds: 0,
        }
    }
}

fn default_login_max() -> u32 {
    20
}

fn default_register_max() -> u32 {
    10
}

fn default_auth_window() -> u64 {
    10 * 60
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root directory for uploaded files (default: <data_dir>/storage)
    pub dir: Option<PathBuf>,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: None,
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_max_upload_bytes() -> u64 {
    25 * 1024 * 1024
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Values taken from the environment / command line that win over the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub jwt_secret: Option<String>,
    pub allow_registration: Option<bool>,
    pub allowed_origins: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from {}", path.display());
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml(&content)
        } else {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse configuration file")
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(secret) = overrides.jwt_secret.filter(|s| !s.is_empty()) {
            self.auth.jwt_secret = Some(secret);
        }
        if let Some(allow) = overrides.allow_registration {
            self.auth.allow_registration = allow;
        }
        if let Some(origins) = overrides.allowed_origins {
            self.cors.allowed_origins = parse_origin_list(&origins);
        }
    }

    pub fn storage_dir(&self) -> PathBuf {
        self.storage
            .dir
            .clone()
            .unwrap_or_else(|| self.server.data_dir.join("storage"))
    }
}

/// Split a comma separated origin list, dropping blanks
pub fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .map(|o| o.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.auth.session_ttl_seconds, 3600);
        assert!(!config.auth.allow_registration);
        assert_eq!(config.rate_limit.login_max, 20);
        assert_eq!(config.rate_limit.register_max, 10);
        assert_eq!(config.rate_limit.login_window_seconds, 600);
        assert_eq!(config.storage.max_upload_bytes, 25 * 1024 * 1024);
        assert_eq!(config.storage_dir(), PathBuf::from("./data/storage"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [auth]
            jwt_secret = "s3cret"
            allow_registration = true

            [cors]
            allowed_origins = ["https://app.example.com"]
            "#,
        )
        .unwrap();

        assert_eq!(config.auth.jwt_secret.as_deref(), Some("s3cret"));
        assert!(config.auth.allow_registration);
        assert_eq!(config.auth.session_ttl_seconds, 3600);
        assert_eq!(config.cors.allowed_origins, vec!["https://app.example.com"]);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_overrides_win() {
        let mut config = Config::default();
        config.apply_overrides(Overrides {
            jwt_secret: Some("from-env".to_string()),
            allow_registration: Some(true),
            allowed_origins: Some(" https://a.example , ,https://b.example".to_string()),
        });

        assert_eq!(config.auth.jwt_secret.as_deref(), Some("from-env"));
        assert!(config.auth.allow_registration);
        assert_eq!(
            config.cors.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_empty_secret_override_ignored() {
        let mut config = Config::default();
        config.apply_overrides(Overrides {
            jwt_secret: Some(String::new()),
            ..Default::default()
        });
        assert!(config.auth.jwt_secret.is_none());
    }
}
