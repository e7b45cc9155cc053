//! # glidemart reconcile
//!
//! The declarative reconciliation engine: callers describe tables,
//! columns, choice lists, data policies, relationships, and row sets, and
//! the reconcilers converge the instance to match, planning first and
//! committing in deterministic order.
//!
//! ## Example
//!
//! ```ignore
//! use glidemart_reconcile::{ColumnKind, ColumnSpec, TableReconciler, TableSpec};
//!
//! let tables = TableReconciler::new(client.clone());
//! let desired = TableSpec::new("u_dm_host")
//!     .with_label("Host")
//!     .with_column(ColumnSpec::new("u_name", ColumnKind::String).with_max_length(80))
//!     .with_column(ColumnSpec::new("u_in_datamart", ColumnKind::Boolean));
//!
//! let report = tables.sync(&desired, /* commit */ true).await?;
//! ```

pub mod choice;
mod column;
pub mod delta;
pub mod descriptor;
mod fields;
pub mod policy;
pub mod relationship;
pub mod spec;
pub mod table;

// Re-exports
pub use choice::{ChoiceOutcome, ChoiceReconciler};
pub use delta::{
    DeltaMerge, DeltaMergeOptions, DeltaOutcome, PrimaryKey, DEFAULT_DELETED_FLAG,
};
pub use descriptor::{ColumnDescriptor, TableDescriptor};
pub use policy::PolicyReconciler;
pub use relationship::{RelationshipOutcome, RelationshipReconciler};
pub use spec::{
    ActionKind, ChoiceRule, ColumnKind, ColumnSpec, DataPolicyMode, PendingAction, SyncReport,
    TableSpec,
};
pub use table::TableReconciler;
