//! Client error types
//!
//! One error enumeration for the whole client, with transient/permanent
//! classification driving the transport retry loop.

use thiserror::Error;

/// Error that can occur while talking to an instance.
#[derive(Debug, Error)]
pub enum Error {
    // Configuration errors (permanent)
    /// Missing or inconsistent client configuration.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A write was attempted while the client is in read-only mode.
    #[error("client is read-only: refused {method} {url}")]
    ReadOnly { method: String, url: String },

    // Request validation errors (permanent)
    /// The request does not match the API grammar.
    #[error("invalid request: {message}")]
    RequestValidation { message: String },

    // Transport errors
    /// Network-level failure after retries were exhausted.
    #[error("request failed after {attempts} attempts: {message}")]
    Transport {
        message: String,
        attempts: u32,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The instance rejected the request with a non-retryable status.
    #[error("HTTP {status} from {method} {url}: {message}")]
    Status {
        status: u16,
        method: String,
        url: String,
        message: String,
    },

    /// HTTP 403; carries the acting user so the operator knows which
    /// account lacks the role.
    #[error("user {user} is not authorised for {method} {url}")]
    Unauthorised {
        user: String,
        method: String,
        url: String,
    },

    // Protocol errors (permanent)
    /// The response body did not match what the endpoint promises.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    // Schema errors (permanent)
    /// The SCHEMA endpoint returned something unusable.
    #[error("schema error for table {table}: {message}")]
    Schema { table: String, message: String },

    // Coercion errors (permanent)
    /// A value cannot be converted to or from its declared column type.
    #[error("cannot coerce {column} ({kind}): {message}")]
    Coercion {
        column: String,
        kind: String,
        message: String,
    },

    // Plan errors (permanent)
    /// The desired state cannot be reconciled as specified.
    #[error("plan error: {message}")]
    Plan { message: String },

    // Quota errors (permanent)
    /// The table exceeds the hard row cap for bulk reads.
    #[error("table {table} has {count} matching rows, above the {limit} row limit")]
    Quota {
        table: String,
        count: u64,
        limit: u64,
    },

    // Operational errors
    /// The remote is in a state the client refuses to touch.
    #[error("operational error: {message}")]
    Operational { message: String },
}

impl Error {
    /// Whether the transport retry loop may try again after this error.
    ///
    /// Only rate limiting and low-level connection failures qualify; every
    /// 4xx/5xx other than 429 is terminal.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Transport { .. } => true,
            Error::Status { status, .. } => *status == 429,
            _ => false,
        }
    }

    // Convenience constructors, matching the variants used in hot paths.

    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Error::RequestValidation {
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol {
            message: message.into(),
        }
    }

    pub fn schema(table: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Schema {
            table: table.into(),
            message: message.into(),
        }
    }

    pub fn coercion(
        column: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Coercion {
            column: column.into(),
            kind: kind.into(),
            message: message.into(),
        }
    }

    pub fn plan(message: impl Into<String>) -> Self {
        Error::Plan {
            message: message.into(),
        }
    }

    pub fn operational(message: impl Into<String>) -> Self {
        Error::Operational {
            message: message.into(),
        }
    }

    pub fn transport(
        message: impl Into<String>,
        attempts: u32,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Error::Transport {
            message: message.into(),
            attempts,
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(Error::transport("reset", 3, std::io::Error::other("reset")).is_transient());
        assert!(Error::Status {
            status: 429,
            method: "GET".into(),
            url: "/v2/table/u_foo".into(),
            message: "rate limited".into(),
        }
        .is_transient());

        assert!(!Error::Status {
            status: 500,
            method: "GET".into(),
            url: "/v2/table/u_foo".into(),
            message: "boom".into(),
        }
        .is_transient());
        assert!(!Error::validation("bad sys_id").is_transient());
        assert!(!Error::configuration("no instance").is_transient());
    }

    #[test]
    fn display_carries_context() {
        let err = Error::Unauthorised {
            user: "svc_datamart".into(),
            method: "PUT".into(),
            url: "/v2/table/u_foo/0123".into(),
        };
        assert_eq!(
            err.to_string(),
            "user svc_datamart is not authorised for PUT /v2/table/u_foo/0123"
        );

        let err = Error::Quota {
            table: "u_dm_host".into(),
            count: 100_001,
            limit: 100_000,
        };
        assert!(err.to_string().contains("100001"));
        assert!(err.to_string().contains("u_dm_host"));
    }
}
