use std::path::PathBuf;

use anyhow::{anyhow, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "BOOKSHELF_ENV";
const CONFIG_DIR_ENV: &str = "BOOKSHELF_CONFIG_DIR";
const ENV_PREFIX: &str = "BOOKSHELF";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "local" => Ok(Environment::Local),
            "staging" => Ok(Environment::Staging),
            "production" => Ok(Environment::Production),
            other => Err(anyhow!(
                "unsupported environment '{}'; expected local/staging/production",
                other
            )),
        }
    }
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub auth: AuthSettings,
    #[serde(default)]
    pub media: MediaSettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, and environment overlay.
    ///
    /// Environment variables use the `BOOKSHELF_` prefix and `__` between
    /// nested keys, e.g. `BOOKSHELF_SERVER__PORT=9090`.
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .context("unable to resolve current directory")?
                .join("config"),
        };

        let base_path = config_dir.join("base.toml");
        let environment_path = config_dir.join(format!("{}.toml", environment));

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            );

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        // The environment is selected by BOOKSHELF_ENV, never by file contents.
        settings.environment = environment.parse()?;

        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "0.0.0.0".to_string()
    }

    fn default_port() -> u16 {
        8080
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "DatabaseSettings::default_url")]
    pub url: String,
    #[serde(default = "DatabaseSettings::default_max_connections")]
    pub max_connections: u32,
}

impl DatabaseSettings {
    fn default_url() -> String {
        "sqlite://bookshelf.db".to_string()
    }

    fn default_max_connections() -> u32 {
        5
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
            max_connections: Self::default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    /// Default `tracing` filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// What a non-superuser sees after attempting to delete a book.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeniedDelete {
    /// Redirect to the dashboard without any message.
    #[default]
    Redirect,
    /// Answer with a 403 error envelope.
    Forbidden,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "AuthSettings::default_login_url")]
    pub login_url: String,
    #[serde(default = "AuthSettings::default_dashboard_url")]
    pub dashboard_url: String,
    #[serde(default = "AuthSettings::default_session_cookie")]
    pub session_cookie: String,
    #[serde(default = "AuthSettings::default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default)]
    pub secure_cookies: bool,
    #[serde(default = "AuthSettings::default_password_min_length")]
    pub password_min_length: usize,
    #[serde(default)]
    pub denied_delete: DeniedDelete,
}

impl AuthSettings {
    fn default_login_url() -> String {
        "/accounts/login/".to_string()
    }

    fn default_dashboard_url() -> String {
        "/dashboard/".to_string()
    }

    fn default_session_cookie() -> String {
        "bookshelf_session".to_string()
    }

    fn default_session_ttl_secs() -> u64 {
        // two weeks
        1_209_600
    }

    fn default_password_min_length() -> usize {
        8
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            login_url: Self::default_login_url(),
            dashboard_url: Self::default_dashboard_url(),
            session_cookie: Self::default_session_cookie(),
            session_ttl_secs: Self::default_session_ttl_secs(),
            secure_cookies: false,
            password_min_length: Self::default_password_min_length(),
            denied_delete: DeniedDelete::Redirect,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaSettings {
    #[serde(default = "MediaSettings::default_root")]
    pub root: PathBuf,
    #[serde(default = "MediaSettings::default_url_prefix")]
    pub url_prefix: String,
    #[serde(default = "MediaSettings::default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl MediaSettings {
    fn default_root() -> PathBuf {
        PathBuf::from("media")
    }

    fn default_url_prefix() -> String {
        "/media".to_string()
    }

    fn default_max_upload_bytes() -> usize {
        5 * 1024 * 1024
    }
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            root: Self::default_root(),
            url_prefix: Self::default_url_prefix(),
            max_upload_bytes: Self::default_max_upload_bytes(),
        }
    }
}
