//! Device endpoint configuration.
//!
//! Describes how to reach the device's WebSocket server and derives the
//! connection URL from it.
//!
//! # Example
//!
//! ```
//! use device_link::EndpointConfig;
//!
//! let endpoint = EndpointConfig::new("192.168.1.50", 81).with_path("leds");
//! assert_eq!(endpoint.url(), "ws://192.168.1.50:81/leds");
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Host used when no endpoint has been configured.
pub const DEFAULT_HOST: &str = "192.168.1.50";

/// Port used when no endpoint has been configured.
pub const DEFAULT_PORT: u16 = 81;

/// Path used when none (or a blank one) is given.
pub const DEFAULT_PATH: &str = "/";

/// Characters that would end the host part of the derived URL.
const HOST_DELIMITERS: &[char] = &['/', '?', '#', '@', '\\'];

// ============================================================================
// EndpointConfig
// ============================================================================

/// Address of the device's WebSocket server.
///
/// Treated as a value: the manager replaces it wholesale and never mutates
/// a stored config in place.
///
/// Deserializes from the presentation-layer shape
/// `{ "ip": "...", "port": 81, "path": "/", "secure": false }`, where
/// `host` may be used instead of `ip` and `path`/`secure` are optional.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Hostname or IP address of the device.
    #[serde(alias = "ip")]
    pub host: String,

    /// TCP port of the WebSocket server.
    pub port: u16,

    /// Request path. Normalized to start with `/`.
    #[serde(default = "default_path")]
    pub path: String,

    /// Use `wss://` instead of `ws://`.
    #[serde(default)]
    pub secure: bool,
}

fn default_path() -> String {
    DEFAULT_PATH.to_string()
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl EndpointConfig {
    /// Creates an insecure endpoint with the default `/` path.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            path: default_path(),
            secure: false,
        }
    }

    /// Returns a copy with the given path.
    #[inline]
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Returns a copy with the secure flag set.
    #[inline]
    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Returns a new config with every field present in `patch` applied.
    #[must_use]
    pub fn merged(&self, patch: &EndpointOverride) -> Self {
        Self {
            host: patch.host.clone().unwrap_or_else(|| self.host.clone()),
            port: patch.port.unwrap_or(self.port),
            path: patch.path.clone().unwrap_or_else(|| self.path.clone()),
            secure: patch.secure.unwrap_or(self.secure),
        }
    }
}

// ============================================================================
// URL Derivation
// ============================================================================

impl EndpointConfig {
    /// Returns `wss` for secure endpoints and `ws` otherwise.
    #[inline]
    #[must_use]
    pub const fn scheme(&self) -> &'static str {
        if self.secure { "wss" } else { "ws" }
    }

    /// Returns the path with a leading `/`; blank paths become `/`.
    #[must_use]
    pub fn normalized_path(&self) -> String {
        if self.path.trim().is_empty() {
            return default_path();
        }
        if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        }
    }

    /// Returns the connection URL, `scheme://host:port/path`.
    ///
    /// Bare IPv6 literals are wrapped in brackets.
    #[must_use]
    pub fn url(&self) -> String {
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        format!(
            "{}://{}:{}{}",
            self.scheme(),
            host,
            self.port,
            self.normalized_path()
        )
    }

    /// Parses [`url()`](Self::url) into a [`Url`].
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the endpoint is invalid
    /// - [`Error::Url`] if the derived URL cannot be parsed
    /// - [`Error::Config`] if the URL does not carry the configured port
    pub fn parse_url(&self) -> Result<Url> {
        self.validate()?;
        let url = Url::parse(&self.url())?;
        if url.port_or_known_default() != Some(self.port) {
            return Err(Error::config(format!(
                "host '{}' does not yield a URL on port {}",
                self.host, self.port
            )));
        }
        Ok(url)
    }

    /// Checks the boundary rules: non-empty host free of URL delimiters and
    /// whitespace, non-zero port.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::config("host must not be empty"));
        }
        if self
            .host
            .chars()
            .any(|c| c.is_whitespace() || HOST_DELIMITERS.contains(&c))
        {
            return Err(Error::config(format!(
                "host '{}' must be a bare hostname or IP address",
                self.host
            )));
        }
        if self.port == 0 {
            return Err(Error::config("port must be between 1 and 65535"));
        }
        Ok(())
    }
}

// ============================================================================
// EndpointOverride
// ============================================================================

/// Partial endpoint merged over the stored config by
/// [`ConnectionManager::connect_with`](crate::ConnectionManager::connect_with).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointOverride {
    /// Replacement host.
    #[serde(default, alias = "ip")]
    pub host: Option<String>,
    /// Replacement port.
    #[serde(default)]
    pub port: Option<u16>,
    /// Replacement path.
    #[serde(default)]
    pub path: Option<String>,
    /// Replacement secure flag.
    #[serde(default)]
    pub secure: Option<bool>,
}

impl EndpointOverride {
    /// Creates an empty override.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the host.
    #[inline]
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the port.
    #[inline]
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the path.
    #[inline]
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the secure flag.
    #[inline]
    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = Some(secure);
        self
    }

    /// Returns `true` if no field is set.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.host.is_none() && self.port.is_none() && self.path.is_none() && self.secure.is_none()
    }
}

// ============================================================================
// Tests
// ============================================================================
