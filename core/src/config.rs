//! Connection configuration for a Teamscale server.
//!
//! A `ClientConfig` is built once per session and handed to the client, which
//! only ever reads it. The credential is kept in a `SecretString` so it is
//! redacted from `Debug` output and logs.

use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Environment variable holding the server URL.
pub const ENV_URL: &str = "TEAMSCALE_URL";
/// Environment variable holding the user name.
pub const ENV_USER: &str = "TEAMSCALE_USER";
/// Environment variable holding the access key or password.
pub const ENV_ACCESS_KEY: &str = "TEAMSCALE_ACCESS_KEY";
/// Environment variable holding the project id.
pub const ENV_PROJECT: &str = "TEAMSCALE_PROJECT";
pub const ENV_VERIFY_TLS: &str = "TEAMSCALE_VERIFY_TLS";
pub const ENV_TIMEOUT_SECONDS: &str = "TEAMSCALE_TIMEOUT_SECONDS";
pub const ENV_BRANCH: &str = "TEAMSCALE_BRANCH";

/// Default time to wait for a response.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid base url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("invalid value {value:?} for {var}")]
    InvalidValue { var: &'static str, value: String },
}

/// Connection settings for one Teamscale project.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    base_url: String,
    username: String,
    credential: SecretString,
    project: String,
    verify_tls: bool,
    timeout: Duration,
    branch: Option<String>,
}

impl ClientConfig {
    /// Create a configuration with TLS verification on, the default timeout
    /// and no branch. A trailing `/` on `base_url` is dropped so service URLs
    /// never contain `//`.
    pub fn new(
        base_url: &str,
        username: &str,
        credential: SecretString,
        project: &str,
    ) -> Result<Self, ConfigError> {
        url::Url::parse(base_url)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            credential,
            project: project.to_string(),
            verify_tls: true,
            timeout: DEFAULT_TIMEOUT,
            branch: None,
        })
    }

    /// Read the configuration from `TEAMSCALE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from any key lookup, using the same keys as
    /// [`ClientConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| lookup(var).ok_or(ConfigError::MissingVar(var));

        let credential = SecretString::new(required(ENV_ACCESS_KEY)?.into_boxed_str());
        let mut config = Self::new(
            &required(ENV_URL)?,
            &required(ENV_USER)?,
            credential,
            &required(ENV_PROJECT)?,
        )?;

        if let Some(value) = lookup(ENV_VERIFY_TLS) {
            config.verify_tls = parse_bool(&value).ok_or(ConfigError::InvalidValue {
                var: ENV_VERIFY_TLS,
                value,
            })?;
        }
        if let Some(value) = lookup(ENV_TIMEOUT_SECONDS) {
            let seconds: u64 = value.parse().map_err(|_| ConfigError::InvalidValue {
                var: ENV_TIMEOUT_SECONDS,
                value: value.clone(),
            })?;
            config.timeout = Duration::from_secs(seconds);
        }
        if let Some(branch) = lookup(ENV_BRANCH).filter(|b| !b.is_empty()) {
            config.branch = Some(branch);
        }
        Ok(config)
    }

    pub fn with_verify_tls(mut self, verify_tls: bool) -> Self {
        self.verify_tls = verify_tls;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Upload to `branch` instead of the default branch.
    pub fn with_branch(mut self, branch: &str) -> Self {
        self.branch = Some(branch.to_string());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn credential(&self) -> &SecretString {
        &self.credential
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn verify_tls(&self) -> bool {
        self.verify_tls
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
