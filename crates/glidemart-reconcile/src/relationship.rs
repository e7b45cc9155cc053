//! CI relationship reconciliation.
//!
//! Rows carry reference columns that translate into `cmdb_rel_ci` edges of
//! a named relationship type. The reconciler diffs the desired edges for
//! the rows at hand against the existing ones, scoped to the relationship
//! type and the parents present in the row set.

use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::info;

use glidemart_client::{Error, GetRecordsOptions, Result, ServiceNowClient, TypedRow};

use crate::fields::text;

/// Counters for one relationship sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelationshipOutcome {
    pub created: usize,
    pub deleted: usize,
}

/// Reconciler for `cmdb_rel_ci` edges.
#[derive(Clone)]
pub struct RelationshipReconciler {
    client: ServiceNowClient,
}

impl RelationshipReconciler {
    #[must_use]
    pub fn new(client: ServiceNowClient) -> Self {
        Self { client }
    }

    /// Converge relationships for `rows` of `table`.
    ///
    /// `columns` maps a reference column to its relationship descriptor
    /// pair, `"Parent descriptor::Child descriptor"`. Each row contributes
    /// one desired edge per column with a non-empty value; an empty value
    /// means the row is disconnected, so a lingering edge is deleted.
    pub async fn sync(
        &self,
        table: &str,
        columns: &BTreeMap<String, String>,
        rows: &[TypedRow],
    ) -> Result<RelationshipOutcome> {
        // a relationship type may back at most one column
        let mut seen_pairs: HashMap<&str, &str> = HashMap::new();
        for (column, pair) in columns {
            if let Some(other) = seen_pairs.insert(pair.as_str(), column.as_str()) {
                return Err(Error::plan(format!(
                    "relationship type '{pair}' is used by both {other} and {column}"
                )));
            }
        }

        let mut outcome = RelationshipOutcome::default();
        for (column, pair) in columns {
            let one = self.sync_column(table, column, pair, rows).await?;
            outcome.created += one.created;
            outcome.deleted += one.deleted;
        }
        Ok(outcome)
    }

    async fn sync_column(
        &self,
        table: &str,
        column: &str,
        pair: &str,
        rows: &[TypedRow],
    ) -> Result<RelationshipOutcome> {
        let (parent_desc, child_desc) = pair.split_once("::").ok_or_else(|| {
            Error::plan(format!(
                "relationship descriptor '{pair}' for {column} is not 'parent::child'"
            ))
        })?;

        let type_id = self.find_type(parent_desc, child_desc).await?;

        // desired edges: one per row with a connected reference
        let mut desired: BTreeMap<String, (String, String)> = BTreeMap::new();
        let mut parents: HashSet<String> = HashSet::new();
        for row in rows {
            let parent = text(row, "sys_id");
            if parent.is_empty() {
                continue;
            }
            parents.insert(parent.clone());
            let child = text(row, column);
            if child.is_empty() {
                continue;
            }
            desired.insert(format!("{parent}|{child}"), (parent, child));
        }

        let existing = self
            .client
            .get_records(
                "cmdb_rel_ci",
                GetRecordsOptions::new()
                    .with_query(format!("type={type_id}"))
                    .with_column("parent")
                    .with_column("child")
                    .with_column("sys_id"),
            )
            .await?;

        let mut outcome = RelationshipOutcome::default();

        // edges whose parent is outside this row set are not ours to touch
        for row in &existing {
            let parent = text(row, "parent");
            if !parents.contains(&parent) {
                continue;
            }
            let key = format!("{parent}|{}", text(row, "child"));
            if desired.remove(&key).is_none() {
                self.client
                    .delete_record("cmdb_rel_ci", &text(row, "sys_id"))
                    .await?;
                outcome.deleted += 1;
            }
        }

        for (_, (parent, child)) in desired {
            self.client
                .create_record(
                    "cmdb_rel_ci",
                    json!({"type": type_id, "parent": parent, "child": child}),
                )
                .await?;
            outcome.created += 1;
        }

        if outcome != RelationshipOutcome::default() {
            info!(
                table,
                column,
                created = outcome.created,
                deleted = outcome.deleted,
                "relationships reconciled"
            );
        }
        Ok(outcome)
    }

    /// Resolve a `cmdb_rel_type` by its descriptor pair. Creating types
    /// through the API is unreliable, so a missing type is the operator's
    /// problem.
    async fn find_type(&self, parent_desc: &str, child_desc: &str) -> Result<String> {
        let rows = self
            .client
            .get_records(
                "cmdb_rel_type",
                GetRecordsOptions::new()
                    .with_query(format!(
                        "parent_descriptor={parent_desc}^child_descriptor={child_desc}"
                    ))
                    .with_column("sys_id")
                    .with_max_records(1),
            )
            .await?;

        rows.first().map(|row| text(row, "sys_id")).ok_or_else(|| {
            Error::operational(format!(
                "relationship type '{parent_desc}::{child_desc}' does not exist, \
                 please create it manually"
            ))
        })
    }
}
