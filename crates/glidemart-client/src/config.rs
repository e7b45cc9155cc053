//! Client configuration
//!
//! Endpoint, credentials, concurrency limits, and operating flags.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Instance name that selects the scripted in-process transport when no
/// credentials are supplied.
pub const DEMO_INSTANCE: &str = "demo";

fn default_read_concurrency() -> usize {
    40
}

fn default_write_concurrency() -> usize {
    80
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// Configuration for a [`ServiceNowClient`](crate::ServiceNowClient).
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Instance subdomain (`{instance}.service-now.com`).
    pub instance: String,

    /// Basic-auth username.
    #[serde(default)]
    pub username: String,

    /// Basic-auth password.
    #[serde(default)]
    pub password: String,

    /// Endpoint override. When unset the instance is addressed as
    /// `https://{instance}.service-now.com`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Refuse every non-GET/HEAD request.
    #[serde(default)]
    pub read_only: bool,

    /// Emit request-level tracing.
    #[serde(default)]
    pub debug: bool,

    /// Read bucket size (GET/HEAD requests in flight).
    #[serde(default = "default_read_concurrency")]
    pub read_concurrency: usize,

    /// Write bucket size (all other requests in flight).
    #[serde(default = "default_write_concurrency")]
    pub write_concurrency: usize,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("instance", &self.instance)
            .field("username", &self.username)
            .field("password", &"***")
            .field("read_only", &self.read_only)
            .field("debug", &self.debug)
            .field("read_concurrency", &self.read_concurrency)
            .field("write_concurrency", &self.write_concurrency)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl ClientConfig {
    /// Create a configuration for the given instance.
    #[must_use]
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            username: String::new(),
            password: String::new(),
            endpoint: None,
            read_only: false,
            debug: false,
            read_concurrency: default_read_concurrency(),
            write_concurrency: default_write_concurrency(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    /// Set basic-auth credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Address the instance at an explicit URL (proxies, test servers)
    /// instead of the `service-now.com` subdomain.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Block all writes.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Enable request-level tracing.
    #[must_use]
    pub fn with_debug(mut self) -> Self {
        self.debug = true;
        self
    }

    /// Override the read bucket size.
    #[must_use]
    pub fn with_read_concurrency(mut self, n: usize) -> Self {
        self.read_concurrency = n;
        self
    }

    /// Override the write bucket size.
    #[must_use]
    pub fn with_write_concurrency(mut self, n: usize) -> Self {
        self.write_concurrency = n;
        self
    }

    /// Override the per-request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = timeout.as_secs().max(1);
        self
    }

    /// Per-request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Whether this configuration selects the scripted in-process transport.
    #[must_use]
    pub fn is_demo(&self) -> bool {
        self.instance == DEMO_INSTANCE && self.username.is_empty() && self.password.is_empty()
    }

    /// Instance root, without a trailing slash.
    #[must_use]
    pub fn instance_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.service-now.com", self.instance)
        }
    }

    /// Check the configuration before building a client.
    pub fn validate(&self) -> Result<()> {
        if self.instance.is_empty() {
            return Err(Error::configuration("instance is required"));
        }
        if self
            .instance
            .chars()
            .any(|c| !c.is_ascii_alphanumeric() && c != '-')
        {
            return Err(Error::configuration(format!(
                "instance '{}' is not a valid subdomain",
                self.instance
            )));
        }
        if !self.is_demo() && (self.username.is_empty() || self.password.is_empty()) {
            return Err(Error::configuration(format!(
                "credentials are required for instance '{}'",
                self.instance
            )));
        }
        if self.read_concurrency == 0 || self.write_concurrency == 0 {
            return Err(Error::configuration("concurrency limits must be positive"));
        }
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
                return Err(Error::configuration(format!(
                    "endpoint '{endpoint}' must be an http(s) URL"
                )));
            }
        }
        Ok(())
    }
}
