//! Configuration management for companynotes.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "companynotes";

/// Default notes file name.
const NOTES_FILE_NAME: &str = "notes.json";

/// Placeholder shown instead of secret values.
const REDACTED: &str = "********";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Well-known unprefixed variables (`PORT`, `CORS_ORIGIN`, `OPENAI_API_KEY`,
///    `ALLOW_DEV_AUTH_BYPASS`)
/// 2. Environment variables prefixed with `COMPANYNOTES_`, nested with `__`
/// 3. TOML config file at `~/.config/companynotes/config.toml`
/// 4. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Note storage configuration.
    pub storage: StorageConfig,
    /// Hosted document backend configuration.
    pub hosted: HostedConfig,
    /// Caller identity configuration.
    pub auth: AuthConfig,
    /// AI summary configuration.
    pub summary: SummaryConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub host: String,
    /// Port to bind. 0 picks an ephemeral port.
    pub port: u16,
    /// Origins allowed by CORS. Accepts a list or a comma separated string.
    #[serde(deserialize_with = "comma_separated")]
    pub cors_origins: Vec<String>,
    /// Largest accepted request body.
    pub body_limit_bytes: usize,
}

/// Which note backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Hosted when credentials are present and reachable, local file otherwise.
    #[default]
    Auto,
    /// Always the local JSON file.
    File,
    /// Always the hosted backend; startup fails if it is unavailable.
    Hosted,
}

/// Note storage configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend selection.
    pub backend: BackendKind,
    /// Path to the local notes file.
    /// Defaults to `~/.local/share/companynotes/notes.json`
    pub notes_path: Option<PathBuf>,
}

/// Hosted document backend configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostedConfig {
    /// Service root, e.g. the production API or a local emulator.
    pub endpoint: String,
    /// Project that owns the database.
    pub project_id: Option<String>,
    /// Database name within the project.
    pub database: String,
    /// Bearer token sent with every request.
    pub access_token: Option<String>,
    /// Collection holding notes.
    pub notes_collection: String,
    /// Collection holding companies.
    pub companies_collection: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development. Enables the identity header fallback when no verifier is configured.
    #[default]
    Development,
    /// Production.
    Production,
}

/// Caller identity configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Deployment environment.
    pub environment: Environment,
    /// Force the identity header fallback on, even in production.
    pub allow_dev_bypass: bool,
    /// Header carrying a caller-asserted user id under the fallback.
    pub user_header: String,
    /// User id assumed under the fallback when the header is absent.
    pub dev_user: String,
    /// Bearer token verification.
    pub jwt: JwtConfig,
}

/// Bearer token verification settings. Configure at most one key source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Shared HS256 secret.
    pub secret: Option<String>,
    /// RS256 public key in PEM format.
    pub public_key_path: Option<PathBuf>,
    /// Required `iss` claim.
    pub issuer: Option<String>,
    /// Required `aud` claim.
    pub audience: Option<String>,
}

/// AI summary configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// API key for the completion provider. Summaries are disabled without it.
    pub api_key: Option<String>,
    /// Base URL of an OpenAI-compatible API.
    pub endpoint: String,
    /// Model name.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion length limit.
    pub max_tokens: u32,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            body_limit_bytes: 1024 * 1024,
        }
    }
}

impl Default for HostedConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://firestore.googleapis.com".to_string(),
            project_id: None,
            database: "(default)".to_string(),
            access_token: None,
            notes_collection: "notes".to_string(),
            companies_collection: "companies".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            allow_dev_bypass: false,
            user_header: "x-user-id".to_string(),
            dev_user: "dev-user".to_string(),
            jwt: JwtConfig::default(),
        }
    }
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.5,
            max_tokens: 200,
            timeout_secs: 30,
        }
    }
}

impl HostedConfig {
    /// Whether both a project and a token are present.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.project_id.is_some() && self.access_token.is_some()
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl JwtConfig {
    /// Whether a verification key is configured.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.secret.is_some() || self.public_key_path.is_some()
    }
}

impl SummaryConfig {
    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Accepts either a list of strings or one comma separated string.
fn comma_separated<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect(),
        OneOrMany::Many(list) => list,
    })
}

/// Unprefixed variables honoured for compatibility with common deployments.
fn well_known_env() -> Env {
    Env::raw()
        .only(&["PORT", "CORS_ORIGIN", "OPENAI_API_KEY", "ALLOW_DEV_AUTH_BYPASS"])
        .map(|key| {
            let target = match key.as_str().to_ascii_uppercase().as_str() {
                "PORT" => "server.port",
                "CORS_ORIGIN" => "server.cors_origins",
                "OPENAI_API_KEY" => "summary.api_key",
                "ALLOW_DEV_AUTH_BYPASS" => "auth.allow_dev_bypass",
                _ => return key.into(),
            };
            target.into()
        })
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("COMPANYNOTES_").split("__"))
            .merge(well_known_env());

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.hosted.project_id.as_deref().is_some_and(str::is_empty) {
            return Err(invalid("hosted.project_id must not be empty"));
        }

        if self.storage.backend == BackendKind::Hosted && self.hosted.project_id.is_none() {
            return Err(invalid(
                "storage.backend = \"hosted\" requires hosted.project_id",
            ));
        }

        if self.hosted.timeout_secs == 0 {
            return Err(invalid("hosted.timeout_secs must be greater than 0"));
        }

        if self.auth.jwt.secret.is_some() && self.auth.jwt.public_key_path.is_some() {
            return Err(invalid(
                "auth.jwt.secret and auth.jwt.public_key_path are mutually exclusive",
            ));
        }

        if self.auth.user_header.trim().is_empty() {
            return Err(invalid("auth.user_header must not be empty"));
        }

        if !(0.0..=2.0).contains(&self.summary.temperature) {
            return Err(invalid(format!(
                "summary.temperature ({}) must be between 0.0 and 2.0",
                self.summary.temperature
            )));
        }

        if self.summary.max_tokens == 0 {
            return Err(invalid("summary.max_tokens must be greater than 0"));
        }

        if self.summary.timeout_secs == 0 {
            return Err(invalid("summary.timeout_secs must be greater than 0"));
        }

        Ok(())
    }

    /// Get the notes file path, resolving defaults if not set.
    #[must_use]
    pub fn notes_path(&self) -> PathBuf {
        self.storage
            .notes_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(NOTES_FILE_NAME))
    }

    /// Get the `host:port` string the server binds to.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// A copy with every secret replaced by a placeholder, for display.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mask = |secret: &Option<String>| secret.as_ref().map(|_| REDACTED.to_string());

        let mut shown = self.clone();
        shown.hosted.access_token = mask(&self.hosted.access_token);
        shown.auth.jwt.secret = mask(&self.auth.jwt.secret);
        shown.summary.api_key = mask(&self.summary.api_key);
        shown
    }

    /// Render as a TOML document in the config file layout.
    ///
    /// # Errors
    ///
    /// Returns an error if a value has no TOML representation.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}
