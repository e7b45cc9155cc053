//! Data-policy reconciliation.
//!
//! Each managed table carries at most one policy record owned by the
//! acting user (`sys_data_policy2`), whose condition selects the rows this
//! client created. Per-column rules (`sys_data_policy_rule`) mark columns
//! readonly or writable; [`PolicyReconciler::toggle`] flips the policy off
//! and on around bulk row writes.

use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, info};

use glidemart_client::{Error, GetRecordsOptions, Result, ServiceNowClient, TypedRow};

use crate::fields::{flag, text};
use crate::spec::DataPolicyMode;

const POLICY_TABLE: &str = "sys_data_policy2";
const RULE_TABLE: &str = "sys_data_policy_rule";

/// Reconciler for a table's data policy and its per-column rules.
#[derive(Clone)]
pub struct PolicyReconciler {
    client: ServiceNowClient,
}

impl PolicyReconciler {
    #[must_use]
    pub fn new(client: ServiceNowClient) -> Self {
        Self { client }
    }

    /// The user-owned policy record for `table`, if one exists.
    async fn find_policy(&self, table: &str) -> Result<Option<TypedRow>> {
        let me = self.client.acting_user().await?.user_name;
        let rows = self
            .client
            .get_records(
                POLICY_TABLE,
                GetRecordsOptions::new()
                    .with_query(format!("model_table={table}^sys_created_by={me}"))
                    .with_column("sys_id")
                    .with_column("active")
                    .with_column("conditions")
                    .with_column("short_description")
                    .with_max_records(1),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Make sure the policy record exists with its canonical fields and
    /// return its sys_id.
    pub async fn ensure_policy(&self, table: &str) -> Result<String> {
        let me = self.client.acting_user().await?.user_name;
        let conditions = format!("sys_created_by={me}^EQ");
        let short_description = format!("Columns managed on {table}");

        if let Some(policy) = self.find_policy(table).await? {
            let sys_id = text(&policy, "sys_id");
            if text(&policy, "conditions") != conditions
                || text(&policy, "short_description") != short_description
            {
                self.client
                    .update_record(
                        POLICY_TABLE,
                        &sys_id,
                        json!({
                            "conditions": conditions,
                            "short_description": short_description,
                        }),
                    )
                    .await?;
            }
            return Ok(sys_id);
        }

        self.client
            .create_record(
                POLICY_TABLE,
                json!({
                    "model_table": table,
                    "apply_import_set": "true",
                    "apply_soap": "false",
                    "enforce_ui": "true",
                    "inherit": "false",
                    "active": "true",
                    "conditions": conditions,
                    "short_description": short_description,
                }),
            )
            .await?;

        // creation returns no body; read the record back for its sys_id
        let created = self.find_policy(table).await?.ok_or_else(|| {
            Error::operational(format!("data policy for {table} did not materialise"))
        })?;
        info!(table, "created data policy");
        Ok(text(&created, "sys_id"))
    }

    /// Converge the per-column rules of `table` onto `desired`. Rules for
    /// columns the map does not name are removed only when
    /// `delete_missing` is set.
    pub async fn sync_rules(
        &self,
        table: &str,
        desired: &BTreeMap<String, DataPolicyMode>,
        delete_missing: bool,
    ) -> Result<()> {
        let policy_id = self.ensure_policy(table).await?;

        let existing = self
            .client
            .get_records(
                RULE_TABLE,
                GetRecordsOptions::new()
                    .with_query(format!("table={table}^sys_data_policy={policy_id}"))
                    .with_column("field")
                    .with_column("disabled")
                    .with_column("sys_id"),
            )
            .await?;

        let mut by_field = BTreeMap::new();
        for row in &existing {
            by_field.insert(text(row, "field"), row);
        }

        for (field, mode) in desired {
            let disabled = match mode {
                DataPolicyMode::ReadOnly => "true",
                DataPolicyMode::Writable => "false",
            };
            match by_field.remove(field) {
                None => {
                    self.client
                        .create_record(
                            RULE_TABLE,
                            json!({
                                "table": table,
                                "field": field,
                                "disabled": disabled,
                                "mandatory": "ignore",
                                "sys_data_policy": policy_id,
                            }),
                        )
                        .await?;
                }
                Some(row) => {
                    let current = if flag(row, "disabled") { "true" } else { "false" };
                    if current != disabled {
                        self.client
                            .update_record(
                                RULE_TABLE,
                                &text(row, "sys_id"),
                                json!({"disabled": disabled}),
                            )
                            .await?;
                    }
                }
            }
        }

        if delete_missing {
            for (_, row) in by_field {
                self.client
                    .delete_record(RULE_TABLE, &text(row, "sys_id"))
                    .await?;
            }
        }

        Ok(())
    }

    /// Converge the rule for a single column.
    pub async fn sync_rule(&self, table: &str, field: &str, mode: DataPolicyMode) -> Result<()> {
        let mut desired = BTreeMap::new();
        desired.insert(field.to_string(), mode);
        self.sync_rules(table, &desired, false).await
    }

    /// Flip the policy's `active` flag. A table without a policy is left
    /// alone.
    pub async fn toggle(&self, table: &str, active: bool) -> Result<()> {
        let Some(policy) = self.find_policy(table).await? else {
            debug!(table, "no data policy to toggle");
            return Ok(());
        };

        let state = if active { "true" } else { "false" };
        self.client
            .update_record(POLICY_TABLE, &text(&policy, "sys_id"), json!({"active": state}))
            .await?;
        debug!(table, active, "toggled data policy");
        Ok(())
    }
}
