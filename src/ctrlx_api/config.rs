use crate::ctrlx_api::types::CtrlxError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Default device address (local ctrlX CORE)
pub const DEFAULT_BASE_URL: &str = "https://localhost";
/// Factory username of a ctrlX CORE
pub const DEFAULT_USERNAME: &str = "boschrexroth";
/// Factory password of a ctrlX CORE
pub const DEFAULT_PASSWORD: &str = "boschrexroth";
/// Lifetime assumed for every issued bearer token (one hour)
pub const DEFAULT_TOKEN_LIFETIME_MS: u64 = 3_600_000;

/// Connection settings for a [`CtrlxClient`](crate::CtrlxClient)
///
/// The value is handed to the client once at construction and never changes
/// afterwards. TLS certificate verification is **off** by default so that
/// devices with self-signed certificates work out of the box; set
/// `verify_ssl = true` to opt in.
///
/// # Example
///
/// ```
/// use ctrlx_sdk::ClientConfig;
///
/// let config = ClientConfig::new("https://192.168.1.1")
///     .with_credentials("admin", "s3cret")
///     .with_verify_ssl(true);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Device base URL, e.g. `https://192.168.1.1`
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Verify the device TLS certificate
    pub verify_ssl: bool,
    /// How long an issued token is considered valid, in milliseconds
    pub token_lifetime_ms: u64,
    /// Per-request timeout in milliseconds; `None` keeps the transport default
    pub timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            username: DEFAULT_USERNAME.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            verify_ssl: false,
            token_lifetime_ms: DEFAULT_TOKEN_LIFETIME_MS,
            timeout_ms: None,
        }
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("verify_ssl", &self.verify_ssl)
            .field("token_lifetime_ms", &self.token_lifetime_ms)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl ClientConfig {
    /// Create a config for a device, keeping default credentials
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Set authentication credentials
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Enable or disable TLS certificate verification
    pub fn with_verify_ssl(mut self, verify_ssl: bool) -> Self {
        self.verify_ssl = verify_ssl;
        self
    }

    /// Set the assumed token lifetime
    pub fn with_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.token_lifetime_ms = duration_ms(lifetime);
        self
    }

    /// Set a per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(duration_ms(timeout));
        self
    }

    /// Parse a config from TOML; missing keys take their default values
    ///
    /// ```
    /// use ctrlx_sdk::ClientConfig;
    ///
    /// let config = ClientConfig::from_toml_str(r#"
    ///     base_url = "https://10.0.0.5"
    ///     verify_ssl = true
    /// "#).unwrap();
    /// assert_eq!(config.username, "boschrexroth");
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self, CtrlxError> {
        let config: ClientConfig = toml::from_str(content).map_err(|e| {
            tracing::error!("Failed to parse client configuration: {}", e);
            CtrlxError::Config(format!("Invalid TOML configuration: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CtrlxError> {
        let path = path.as_ref();
        tracing::debug!("Loading client configuration from {}", path.display());

        let content = std::fs::read_to_string(path).map_err(|e| {
            CtrlxError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// Build a config from `CTRLX_*` environment variables over the defaults
    ///
    /// Recognized variables: `CTRLX_BASE_URL`, `CTRLX_USERNAME`,
    /// `CTRLX_PASSWORD`, `CTRLX_VERIFY_SSL`, `CTRLX_TOKEN_LIFETIME_MS`,
    /// `CTRLX_TIMEOUT_MS`.
    pub fn from_env() -> Result<Self, CtrlxError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, CtrlxError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(base_url) = lookup("CTRLX_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(username) = lookup("CTRLX_USERNAME") {
            config.username = username;
        }
        if let Some(password) = lookup("CTRLX_PASSWORD") {
            config.password = password;
        }
        if let Some(verify) = lookup("CTRLX_VERIFY_SSL") {
            config.verify_ssl = parse_bool("CTRLX_VERIFY_SSL", &verify)?;
        }
        if let Some(lifetime) = lookup("CTRLX_TOKEN_LIFETIME_MS") {
            config.token_lifetime_ms = parse_ms("CTRLX_TOKEN_LIFETIME_MS", &lifetime)?;
        }
        if let Some(timeout) = lookup("CTRLX_TIMEOUT_MS") {
            config.timeout_ms = Some(parse_ms("CTRLX_TIMEOUT_MS", &timeout)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Check that the config can be used to build a client
    pub fn validate(&self) -> Result<(), CtrlxError> {
        let url = reqwest::Url::parse(&self.base_url).map_err(|e| {
            CtrlxError::Config(format!("Invalid base_url '{}': {}", self.base_url, e))
        })?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(CtrlxError::Config(format!(
                "Unsupported base_url scheme '{}', expected http or https",
                url.scheme()
            )));
        }

        if self.token_lifetime_ms == 0 {
            return Err(CtrlxError::Config(
                "token_lifetime_ms must be greater than zero".to_string(),
            ));
        }

        // A zero timeout makes every request fail before it is sent.
        if self.timeout_ms == Some(0) {
            return Err(CtrlxError::Config(
                "timeout_ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Base URL without trailing slashes
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn token_lifetime(&self) -> Duration {
        Duration::from_millis(self.token_lifetime_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, CtrlxError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(CtrlxError::Config(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

fn parse_ms(key: &str, value: &str) -> Result<u64, CtrlxError> {
    value.trim().parse::<u64>().map_err(|e| {
        CtrlxError::Config(format!("{} must be a number of milliseconds: {}", key, e))
    })
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
