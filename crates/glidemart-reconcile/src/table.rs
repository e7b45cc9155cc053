//! Table reconciliation.
//!
//! Diff-then-commit for table shape: the plan lists one pending action per
//! table or column change, error entries block the whole commit, and
//! commits run in deterministic order (table first, then columns as the
//! caller listed them).

use serde_json::json;
use std::time::Duration;
use tracing::info;

use glidemart_client::{Error, Result, ServiceNowClient};

use crate::choice::ChoiceReconciler;
use crate::column::{plan_columns, plan_columns_for_new_table};
use crate::descriptor::{self, TableDescriptor};
use crate::policy::PolicyReconciler;
use crate::spec::{ActionKind, ColumnSpec, PendingAction, PlannedOp, SyncReport, TableSpec};

/// How long to wait after creating a table before looking for the columns
/// the server materialises on its own.
const CREATE_SETTLE: Duration = Duration::from_secs(2);

/// Reconciler for table shape.
#[derive(Clone)]
pub struct TableReconciler {
    client: ServiceNowClient,
    choices: ChoiceReconciler,
    policies: PolicyReconciler,
}

impl TableReconciler {
    #[must_use]
    pub fn new(client: ServiceNowClient) -> Self {
        let choices = ChoiceReconciler::new(client.clone());
        let policies = PolicyReconciler::new(client.clone());
        Self {
            client,
            choices,
            policies,
        }
    }

    /// The flattened descriptor for `name_or_id`, or `None` when the table
    /// does not exist.
    pub async fn get(&self, name_or_id: &str) -> Result<Option<TableDescriptor>> {
        descriptor::load(&self.client, name_or_id).await
    }

    /// Reconcile `desired` against the instance.
    ///
    /// With `commit` false this only plans. With `commit` true, any error
    /// entry aborts before the first write; otherwise the table action runs
    /// first, then the column actions in the caller's order. Creating a
    /// table waits briefly for server-side column materialisation and then
    /// replans before committing columns.
    pub async fn sync(&self, desired: &TableSpec, commit: bool) -> Result<SyncReport> {
        let desired = desired.normalized();
        let report = self.plan(&desired, true).await?;

        if !commit {
            return Ok(report);
        }
        self.refuse_on_errors(&desired.name, &report)?;

        let creates_table = report
            .actions
            .iter()
            .any(|action| matches!(action.op, Some(PlannedOp::CreateTable { .. })));

        if creates_table {
            for action in &report.actions {
                if let Some(PlannedOp::CreateTable {
                    spec,
                    parent_sys_id,
                }) = &action.op
                {
                    self.create_table(spec, parent_sys_id.as_deref()).await?;
                }
            }

            tokio::time::sleep(CREATE_SETTLE).await;
            self.client.invalidate_schema(&desired.name);

            // replan against what the server materialised
            let report = self.plan(&desired, false).await?;
            self.refuse_on_errors(&desired.name, &report)?;
            self.commit_columns(&report).await?;
            return Ok(SyncReport {
                actions: report.actions,
                committed: true,
            });
        }

        self.commit_columns(&report).await?;
        Ok(SyncReport {
            actions: report.actions,
            committed: true,
        })
    }

    async fn plan(&self, desired: &TableSpec, allow_create: bool) -> Result<SyncReport> {
        let me = self.client.acting_user().await?.user_name;
        let existing = self.get(&desired.name).await?;

        let mut actions = Vec::new();

        match existing {
            None => {
                if !allow_create {
                    return Err(Error::operational(format!(
                        "table {} did not materialise after creation",
                        desired.name
                    )));
                }

                let mut parent_sys_id = None;
                let mut parent_blocked = false;
                if let Some(parent) = &desired.parent {
                    match self.get(parent).await? {
                        None => {
                            parent_blocked = true;
                            actions.push(PendingAction::error(
                                desired.name.clone(),
                                format!("parent table {parent} does not exist"),
                            ));
                        }
                        Some(p) if !p.extendable => {
                            parent_blocked = true;
                            actions.push(PendingAction::error(
                                desired.name.clone(),
                                format!("parent table {parent} is not extendable"),
                            ));
                        }
                        Some(p) => parent_sys_id = Some(p.sys_id),
                    }
                }

                if !parent_blocked {
                    actions.push(PendingAction::new(
                        desired.name.clone(),
                        ActionKind::Create,
                        format!("create table {}", desired.name),
                        PlannedOp::CreateTable {
                            spec: desired.clone(),
                            parent_sys_id,
                        },
                    ));
                }
                actions.extend(plan_columns_for_new_table(desired));
            }
            Some(existing) => {
                // re-parenting a table is not a thing the instance supports
                if let Some(parent) = &desired.parent {
                    if existing.parent.as_deref() != Some(parent.as_str()) {
                        return Err(Error::plan(format!(
                            "table {} extends {}, the desired parent is {parent}",
                            desired.name,
                            existing.parent.as_deref().unwrap_or("(nothing)")
                        )));
                    }
                }
                actions.extend(plan_columns(desired, &existing, &me));
            }
        }

        Ok(SyncReport {
            actions,
            committed: false,
        })
    }

    fn refuse_on_errors(&self, table: &str, report: &SyncReport) -> Result<()> {
        let errors: Vec<&str> = report
            .actions
            .iter()
            .filter(|a| a.kind == ActionKind::Error)
            .map(|a| a.description.as_str())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::plan(format!(
                "refusing to commit {table}: {}",
                errors.join("; ")
            )))
        }
    }

    async fn create_table(&self, spec: &TableSpec, parent_sys_id: Option<&str>) -> Result<()> {
        let mut record = serde_json::Map::new();
        record.insert("name".to_string(), json!(spec.name));
        record.insert(
            "label".to_string(),
            json!(spec.label.clone().unwrap_or_else(|| spec.name.clone())),
        );
        let extendable = if spec.extendable { "true" } else { "false" };
        record.insert("is_extendable".to_string(), json!(extendable));
        if let Some(parent) = parent_sys_id {
            record.insert("super_class".to_string(), json!(parent));
        }

        info!(table = %spec.name, "creating table");
        self.client
            .create_record("sys_db_object", serde_json::Value::Object(record))
            .await
    }

    async fn commit_columns(&self, report: &SyncReport) -> Result<()> {
        for action in &report.actions {
            match &action.op {
                Some(PlannedOp::CreateColumn { table, spec }) => {
                    self.create_column(table, spec).await?;
                    self.sync_column_extras(table, spec).await?;
                    self.client.invalidate_schema(table);
                }
                Some(PlannedOp::UpdateColumn {
                    table,
                    sys_id,
                    patch,
                    spec,
                }) => {
                    if patch.as_object().is_some_and(|p| !p.is_empty()) {
                        self.client
                            .update_record("sys_dictionary", sys_id, patch.clone())
                            .await?;
                    }
                    self.sync_column_extras(table, spec).await?;
                    self.client.invalidate_schema(table);
                }
                Some(PlannedOp::DeleteColumn { sys_id }) => {
                    self.client.delete_record("sys_dictionary", sys_id).await?;
                }
                Some(PlannedOp::CreateTable { .. }) | None => {}
            }
            if action.op.is_some() {
                info!("{}", action.description);
            }
        }
        Ok(())
    }

    async fn create_column(&self, table: &str, spec: &ColumnSpec) -> Result<()> {
        let mut record = serde_json::Map::new();
        record.insert("name".to_string(), json!(table));
        record.insert("element".to_string(), json!(spec.name));
        record.insert(
            "column_label".to_string(),
            json!(spec.label.clone().unwrap_or_else(|| spec.name.clone())),
        );
        record.insert(
            "internal_type".to_string(),
            json!(spec.kind.internal_type()),
        );
        record.insert("active".to_string(), json!("true"));
        if let Some(max_length) = spec.max_length {
            record.insert("max_length".to_string(), json!(max_length.to_string()));
        }
        if let Some(reference) = &spec.reference_table {
            record.insert("reference".to_string(), json!(reference));
        }
        if spec.choices.is_some() {
            record.insert("choice".to_string(), json!(spec.choice.as_remote()));
        }

        self.client
            .create_record("sys_dictionary", serde_json::Value::Object(record))
            .await
    }

    /// Choice lists and data-policy rules ride along with their column.
    async fn sync_column_extras(&self, table: &str, spec: &ColumnSpec) -> Result<()> {
        if let Some(choices) = &spec.choices {
            self.choices.sync(table, &spec.name, choices).await?;
        }
        if let Some(mode) = spec.data_policy {
            self.policies.sync_rule(table, &spec.name, mode).await?;
        }
        Ok(())
    }
}
