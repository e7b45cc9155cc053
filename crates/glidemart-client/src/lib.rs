//! # glidemart client
//!
//! Request core for a declarative ServiceNow-style instance client: a
//! uniform request gateway with URL validation, read/write concurrency
//! buckets, bounded-retry transport, a coalescing schema cache, and
//! schema-driven type coercion between wire rows (all strings) and typed
//! rows.
//!
//! The reconciliation layers in `glidemart-reconcile` drive everything
//! through [`ServiceNowClient`].
//!
//! ## Example
//!
//! ```ignore
//! use glidemart_client::{ClientConfig, GetRecordsOptions, ServiceNowClient};
//!
//! let config = ClientConfig::new("acme").with_credentials("svc_datamart", "secret");
//! let client = ServiceNowClient::new(config)?;
//!
//! let hosts = client
//!     .get_records(
//!         "u_dm_host",
//!         GetRecordsOptions::new()
//!             .with_column("u_name")
//!             .with_query("u_in_datamart=1"),
//!     )
//!     .await?;
//! ```

pub mod client;
pub mod coerce;
pub mod config;
pub mod error;
pub mod limits;
pub mod record_cache;
pub mod request;
pub mod schema;
pub mod status;
pub mod transport;
pub mod value;

// Re-exports
pub use client::{
    ActingUser, ApiResponse, ColumnSelect, GetRecordsOptions, ImportOutcome, ServiceNowClient,
    MAX_QUERY_ROWS,
};
pub use coerce::SchemaSource;
pub use config::{ClientConfig, DEMO_INSTANCE};
pub use error::{Error, Result};
pub use limits::{Direction, ReadWriteLimiter};
pub use record_cache::{InMemoryRecordCache, RecordCache};
pub use request::{ApiPath, ApiRequest, IMPORT_TABLE_PREFIX};
pub use schema::{SchemaCache, SchemaElement, TableSchema, SCHEMA_TTL};
pub use status::{Status, TracingStatus};
pub use transport::{HttpTransport, Method, Payload, PreparedRequest, Transport};
pub use value::{is_sys_id, FieldValue, TypedRow};
