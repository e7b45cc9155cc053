//! Choice-list reconciliation.
//!
//! Converges the `sys_choice` rows for one (table, column) pair onto a
//! desired value → label map.

use serde_json::json;
use tracing::info;

use glidemart_client::{GetRecordsOptions, Result, ServiceNowClient};

use crate::fields::text;

/// Counters for one choice-list sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChoiceOutcome {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// Reconciler for one column's choice list.
#[derive(Clone)]
pub struct ChoiceReconciler {
    client: ServiceNowClient,
}

impl ChoiceReconciler {
    #[must_use]
    pub fn new(client: ServiceNowClient) -> Self {
        Self { client }
    }

    /// Make the column's choice list match `desired` exactly.
    pub async fn sync(
        &self,
        table: &str,
        element: &str,
        desired: &std::collections::BTreeMap<String, String>,
    ) -> Result<ChoiceOutcome> {
        let existing = self
            .client
            .get_records(
                "sys_choice",
                GetRecordsOptions::new()
                    .with_query(format!("name={table}^element={element}"))
                    .with_column("value")
                    .with_column("label")
                    .with_column("inactive")
                    .with_column("sys_id"),
            )
            .await?;

        let mut by_value = std::collections::BTreeMap::new();
        for row in &existing {
            by_value.insert(text(row, "value"), row);
        }

        let mut outcome = ChoiceOutcome::default();

        for (value, label) in desired {
            match by_value.remove(value) {
                None => {
                    self.client
                        .create_record(
                            "sys_choice",
                            json!({
                                "name": table,
                                "element": element,
                                "value": value,
                                "label": label,
                                "inactive": "false",
                            }),
                        )
                        .await?;
                    outcome.created += 1;
                }
                Some(row) => {
                    // the desired fields must all match, as strings
                    let current_label = text(row, "label");
                    let inactive = text(row, "inactive");
                    if &current_label != label || (inactive == "true" || inactive == "1") {
                        self.client
                            .update_record(
                                "sys_choice",
                                &text(row, "sys_id"),
                                json!({"label": label, "inactive": "false"}),
                            )
                            .await?;
                        outcome.updated += 1;
                    }
                }
            }
        }

        // whatever the desired map does not name goes away
        for (_, row) in by_value {
            self.client
                .delete_record("sys_choice", &text(row, "sys_id"))
                .await?;
            outcome.deleted += 1;
        }

        if outcome != ChoiceOutcome::default() {
            info!(
                table,
                element,
                created = outcome.created,
                updated = outcome.updated,
                deleted = outcome.deleted,
                "choice list reconciled"
            );
        }
        Ok(outcome)
    }
}
