//! Configuration structures handed to the transport runners.
//!
//! These are built once from the resolved command line and environment and
//! never mutated afterwards.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Settings shared by both transports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerConfig {
    /// SkyWalking OAP URL, e.g. `http://localhost:12800`.
    pub url: Option<String>,

    /// Only register tools that declare themselves read-only.
    pub read_only: bool,

    /// Path of the log file. Logs go to stderr when unset.
    pub log_file: Option<PathBuf>,

    /// Copy every byte transiting stdin/stdout to the log.
    pub log_commands: bool,
}

impl ServerConfig {
    /// Returns the configured URL, treating a blank value as unset.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().map(str::trim).filter(|u| !u.is_empty())
    }

    /// Validates the settings that apply to every transport.
    ///
    /// # Errors
    ///
    /// Returns an error if a URL is set but is not an http(s) URL.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(url) = self.url() {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidUrl {
                    url: url.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Validates the settings for the stdio transport, which needs an
    /// explicit backend URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingUrl`] if no URL is configured, or any
    /// error from [`ServerConfig::validate`].
    pub fn validate_for_stdio(&self) -> Result<(), ConfigError> {
        if self.url().is_none() {
            return Err(ConfigError::MissingUrl);
        }
        self.validate()
    }
}

/// Settings specific to the SSE transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseConfig {
    /// Host and port to listen on.
    pub address: String,

    /// Path prefix for the SSE and message endpoints.
    pub base_path: String,

    /// How long in-flight connections may take to finish after a signal.
    pub shutdown_timeout: Duration,

    /// Extra wait after graceful shutdown completes.
    pub shutdown_grace: Duration,

    /// Wait after spawning the listener before watching for signals.
    pub startup_delay: Duration,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            address: super::DEFAULT_SSE_ADDRESS.to_string(),
            base_path: String::new(),
            shutdown_timeout: super::DEFAULT_SHUTDOWN_TIMEOUT,
            shutdown_grace: super::DEFAULT_SHUTDOWN_GRACE,
            startup_delay: super::DEFAULT_STARTUP_DELAY,
        }
    }
}

impl SseConfig {
    /// Creates SSE settings with default timings.
    #[must_use]
    pub fn new(address: impl Into<String>, base_path: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            base_path: base_path.into(),
            ..Self::default()
        }
    }

    /// Validates the listen address and base path.
    ///
    /// # Errors
    ///
    /// Returns an error if the address has no valid port, or the base path
    /// is neither empty nor absolute.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_address = self
            .address
            .rsplit_once(':')
            .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
        if !valid_address {
            return Err(ConfigError::InvalidAddress {
                address: self.address.clone(),
            });
        }

        if !self.base_path.is_empty() && !self.base_path.starts_with('/') {
            return Err(ConfigError::InvalidBasePath {
                path: self.base_path.clone(),
            });
        }
        Ok(())
    }

    /// Base path without trailing slashes (`""` for the root).
    #[must_use]
    pub fn normalized_base_path(&self) -> &str {
        self.base_path.trim_end_matches('/')
    }

    /// Full path of the SSE endpoint.
    #[must_use]
    pub fn sse_path(&self) -> String {
        format!("{}/sse", self.normalized_base_path())
    }

    /// Full path of the message endpoint.
    #[must_use]
    pub fn message_path(&self) -> String {
        format!("{}/message", self.normalized_base_path())
    }
}
