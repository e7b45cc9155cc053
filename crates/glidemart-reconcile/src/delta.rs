//! Row delta-merge.
//!
//! Reconciles a desired row set against the rows already on a table, keyed
//! by a caller-chosen primary-key function. The plan classifies every row
//! as matched, create, update, or delete (hard, or soft via the deleted
//! flag); execution runs create → update → delete with bounded fan-out,
//! bracketed by a data-policy toggle that is restored on every exit path.

use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use md5::{Digest, Md5};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

use glidemart_client::{
    coerce, Error, FieldValue, GetRecordsOptions, Result, ServiceNowClient, Status, TypedRow,
};

use crate::fields::text;
use crate::policy::PolicyReconciler;

/// Writes in flight per phase.
const WRITE_CONCURRENCY: usize = 40;

/// Column that soft-deletes flip when the schema carries it.
pub const DEFAULT_DELETED_FLAG: &str = "u_in_datamart";

/// How incoming and existing rows are keyed for matching.
#[derive(Debug, Clone, Default)]
pub enum PrimaryKey {
    /// One field's value is the key.
    Field(String),
    /// Digest over the named fields.
    Fields(Vec<String>),
    /// Digest over every user column of the encoded row.
    #[default]
    Auto,
}

/// Options for one merge run.
#[derive(Debug, Clone)]
pub struct DeltaMergeOptions {
    pub primary_key: PrimaryKey,
    /// Soft-delete flag column; soft deletes only happen when the table's
    /// schema carries it.
    pub deleted_flag: String,
    /// Hard-delete rows that fell out of the incoming set.
    pub allow_deletes: bool,
    /// Reference columns whose incoming values are business keys: column →
    /// the field on the referenced table to resolve through.
    pub reference_lookup: BTreeMap<String, String>,
    /// Opt into the record cache for the existing-row read.
    pub cache_ttl: Option<String>,
}

impl Default for DeltaMergeOptions {
    fn default() -> Self {
        Self {
            primary_key: PrimaryKey::Auto,
            deleted_flag: DEFAULT_DELETED_FLAG.to_string(),
            allow_deletes: false,
            reference_lookup: BTreeMap::new(),
            cache_ttl: None,
        }
    }
}

/// Counters a merge returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeltaOutcome {
    pub rows_matched: usize,
    pub rows_created: usize,
    pub rows_updated: usize,
    pub rows_deleted: usize,
}

struct Plan {
    creates: Vec<Map<String, Value>>,
    updates: Vec<Map<String, Value>>,
    soft_deletes: Vec<Map<String, Value>>,
    hard_deletes: Vec<String>,
    matched: usize,
}

impl Plan {
    fn has_writes(&self) -> bool {
        !self.creates.is_empty()
            || !self.updates.is_empty()
            || !self.soft_deletes.is_empty()
            || !self.hard_deletes.is_empty()
    }
}

/// The merge engine.
#[derive(Clone)]
pub struct DeltaMerge {
    client: ServiceNowClient,
    policies: PolicyReconciler,
}

impl DeltaMerge {
    #[must_use]
    pub fn new(client: ServiceNowClient) -> Self {
        let policies = PolicyReconciler::new(client.clone());
        Self { client, policies }
    }

    /// Reconcile `incoming` against the rows on `table`.
    pub async fn run(
        &self,
        table: &str,
        mut incoming: Vec<TypedRow>,
        options: DeltaMergeOptions,
        status: &dyn Status,
    ) -> Result<DeltaOutcome> {
        let schema = self.client.schema(table).await?;
        let soft_delete = schema.contains(&options.deleted_flag);
        let stamp_first_discovered = schema.contains("first_discovered");

        self.apply_reference_lookups(&schema, &mut incoming, &options.reference_lookup, status)
            .await?;

        // the existing read projects exactly the fields the merge compares
        let mut fields: BTreeSet<String> = incoming
            .iter()
            .flat_map(|row| row.keys().cloned())
            .collect();
        fields.insert("sys_id".to_string());
        fields.insert("sys_class_name".to_string());
        if soft_delete {
            fields.insert(options.deleted_flag.clone());
        }

        let mut read = GetRecordsOptions::new();
        for field in &fields {
            read = read.with_column(field.clone());
        }
        if let Some(ttl) = &options.cache_ttl {
            read = read.with_cache_ttl(ttl.clone());
        }
        let existing = self.client.get_records(table, read).await?;

        // incoming rows assert their presence through the flag
        if soft_delete {
            for row in &mut incoming {
                row.insert(options.deleted_flag.clone(), FieldValue::Bool(true));
            }
        }

        let incoming_wire = coerce::encode_rows(&schema, &incoming)?;
        let existing_wire = coerce::encode_rows(&schema, &existing)?;

        let plan = build_plan(
            &options,
            soft_delete,
            stamp_first_discovered,
            incoming_wire,
            existing_wire,
            status,
        );

        status.log(&format!(
            "{table}: {} matched, {} to create, {} to update, {} to delete",
            plan.matched,
            plan.creates.len(),
            plan.updates.len(),
            plan.soft_deletes.len() + plan.hard_deletes.len(),
        ));

        let outcome = DeltaOutcome {
            rows_matched: plan.matched,
            rows_created: plan.creates.len(),
            rows_updated: plan.updates.len(),
            rows_deleted: plan.soft_deletes.len() + plan.hard_deletes.len(),
        };

        // nothing to write: leave the policy untouched
        if !plan.has_writes() {
            return Ok(outcome);
        }

        self.policies.toggle(table, false).await?;
        let mut guard = ToggleGuard::new(self.policies.clone(), table);

        let result = self.execute(table, &plan, status).await;

        guard.disarm();
        let restored = self.policies.toggle(table, true).await;

        result?;
        restored?;
        Ok(outcome)
    }

    async fn execute(&self, table: &str, plan: &Plan, status: &dyn Status) -> Result<()> {
        status.set_stages(3);

        status.add(plan.creates.len());
        stream::iter(plan.creates.clone())
            .map(|row| {
                let client = self.client.clone();
                let table = table.to_string();
                async move { client.create_record(&table, Value::Object(row)).await }
            })
            .buffer_unordered(WRITE_CONCURRENCY)
            .try_collect::<Vec<()>>()
            .await?;
        status.done(plan.creates.len());
        status.done_stage();

        status.add(plan.updates.len());
        stream::iter(plan.updates.clone())
            .map(|payload| {
                let client = self.client.clone();
                let table = table.to_string();
                async move {
                    let sys_id = payload
                        .get("sys_id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    client
                        .update_record(&table, &sys_id, Value::Object(payload))
                        .await
                }
            })
            .buffer_unordered(WRITE_CONCURRENCY)
            .try_collect::<Vec<()>>()
            .await?;
        status.done(plan.updates.len());
        status.done_stage();

        // soft deletes are flag updates, but they belong to the delete phase
        status.add(plan.soft_deletes.len() + plan.hard_deletes.len());
        stream::iter(plan.soft_deletes.clone())
            .map(|payload| {
                let client = self.client.clone();
                let table = table.to_string();
                async move {
                    let sys_id = payload
                        .get("sys_id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string();
                    client
                        .update_record(&table, &sys_id, Value::Object(payload))
                        .await
                }
            })
            .buffer_unordered(WRITE_CONCURRENCY)
            .try_collect::<Vec<()>>()
            .await?;
        stream::iter(plan.hard_deletes.clone())
            .map(|sys_id| {
                let client = self.client.clone();
                let table = table.to_string();
                async move { client.delete_record(&table, &sys_id).await }
            })
            .buffer_unordered(WRITE_CONCURRENCY)
            .try_collect::<Vec<()>>()
            .await?;
        status.done(plan.soft_deletes.len() + plan.hard_deletes.len());
        status.done_stage();

        Ok(())
    }

    /// Rewrite business keys in reference columns to sys_ids.
    async fn apply_reference_lookups(
        &self,
        schema: &glidemart_client::TableSchema,
        incoming: &mut [TypedRow],
        lookups: &BTreeMap<String, String>,
        status: &dyn Status,
    ) -> Result<()> {
        for (column, key_field) in lookups {
            let element = schema.element(column).ok_or_else(|| {
                Error::plan(format!(
                    "reference lookup names {column}, which {} does not have",
                    schema.table
                ))
            })?;
            let target = element.reference_table.clone().ok_or_else(|| {
                Error::plan(format!("reference lookup column {column} is not a reference"))
            })?;

            let rows = self
                .client
                .get_records(
                    &target,
                    GetRecordsOptions::new()
                        .with_column("sys_id")
                        .with_column(key_field.clone()),
                )
                .await?;

            let mut index: HashMap<String, String> = HashMap::new();
            for row in &rows {
                index.insert(text(row, key_field), text(row, "sys_id"));
            }
            debug!(column, target = %target, entries = index.len(), "built reference lookup");

            for row in incoming.iter_mut() {
                let key = text(row, column);
                if key.is_empty() {
                    continue;
                }
                match index.get(&key) {
                    Some(sys_id) => {
                        row.insert(column.clone(), FieldValue::Str(sys_id.clone()));
                    }
                    None => {
                        status.warn(&format!(
                            "no {target} row matches {column}='{key}', leaving it disconnected"
                        ));
                        row.insert(column.clone(), FieldValue::Str(String::new()));
                    }
                }
            }
        }
        Ok(())
    }
}

fn build_plan(
    options: &DeltaMergeOptions,
    soft_delete: bool,
    stamp_first_discovered: bool,
    incoming_wire: Vec<Map<String, Value>>,
    existing_wire: Vec<Map<String, Value>>,
    status: &dyn Status,
) -> Plan {
    // index incoming; collisions discard, unkeyed rows stay uncompared
    let mut incoming_by_key: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
    for row in incoming_wire {
        match row_key(&options.primary_key, &row, &options.deleted_flag) {
            None => {
                status.warn("incoming row has no primary key, leaving it uncompared");
            }
            Some(key) => {
                if incoming_by_key.contains_key(&key) {
                    status.warn(&format!("duplicate incoming row for key {key}, discarding"));
                } else {
                    incoming_by_key.insert(key, row);
                }
            }
        }
    }

    // index existing; duplicates and unkeyed rows become delete candidates
    let mut existing_by_key: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
    let mut leftovers: Vec<Map<String, Value>> = Vec::new();
    for row in existing_wire {
        match row_key(&options.primary_key, &row, &options.deleted_flag) {
            None => leftovers.push(row),
            Some(key) => {
                if existing_by_key.contains_key(&key) {
                    status.warn(&format!("duplicate existing row for key {key}"));
                    leftovers.push(row);
                } else {
                    existing_by_key.insert(key, row);
                }
            }
        }
    }

    let mut plan = Plan {
        creates: Vec::new(),
        updates: Vec::new(),
        soft_deletes: Vec::new(),
        hard_deletes: Vec::new(),
        matched: 0,
    };

    for (key, mut row) in incoming_by_key {
        match existing_by_key.remove(&key) {
            None => {
                if stamp_first_discovered {
                    row.insert(
                        "first_discovered".to_string(),
                        Value::String(Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()),
                    );
                }
                plan.creates.push(row);
            }
            Some(current) => {
                let mut patch = Map::new();
                for (field, value) in &row {
                    let current_value = current.get(field);
                    if current_value.map(value_text) != Some(value_text(value)) {
                        patch.insert(field.clone(), value.clone());
                    }
                }
                if patch.is_empty() {
                    plan.matched += 1;
                } else {
                    patch.insert(
                        "sys_id".to_string(),
                        current.get("sys_id").cloned().unwrap_or(Value::Null),
                    );
                    if let Some(class) = current.get("sys_class_name") {
                        patch.insert("sys_class_name".to_string(), class.clone());
                    }
                    plan.updates.push(patch);
                }
            }
        }
    }

    // rows that fell out of the incoming set, plus existing duplicates
    let abandoned = existing_by_key.into_values().chain(leftovers);
    for row in abandoned {
        if options.allow_deletes {
            if let Some(sys_id) = row.get("sys_id").and_then(Value::as_str) {
                plan.hard_deletes.push(sys_id.to_string());
            }
            continue;
        }
        if soft_delete {
            let flagged_off = row
                .get(&options.deleted_flag)
                .and_then(Value::as_str)
                .is_some_and(|flag| flag == "0");
            if flagged_off {
                continue;
            }
            let mut patch = Map::new();
            patch.insert(options.deleted_flag.clone(), Value::String("0".to_string()));
            patch.insert(
                "sys_id".to_string(),
                row.get("sys_id").cloned().unwrap_or(Value::Null),
            );
            if let Some(class) = row.get("sys_class_name") {
                patch.insert("sys_class_name".to_string(), class.clone());
            }
            plan.soft_deletes.push(patch);
        }
    }

    plan
}

/// Stringify a wire value for comparison.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Key one encoded row. The automatic key digests every user column except
/// the deleted flag, which the merge itself controls.
fn row_key(pk: &PrimaryKey, wire: &Map<String, Value>, deleted_flag: &str) -> Option<String> {
    match pk {
        PrimaryKey::Field(field) => wire
            .get(field)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        PrimaryKey::Fields(fields) => {
            let mut pairs: Vec<String> = fields
                .iter()
                .map(|field| {
                    format!(
                        "{field}={}",
                        wire.get(field).and_then(Value::as_str).unwrap_or_default()
                    )
                })
                .collect();
            if pairs.iter().all(|pair| pair.ends_with('=')) {
                return None;
            }
            pairs.sort();
            Some(md5_hex(&pairs.join("|")))
        }
        PrimaryKey::Auto => {
            let mut pairs: Vec<String> = wire
                .iter()
                .filter(|(name, _)| name.starts_with("u_") && name.as_str() != deleted_flag)
                .map(|(name, value)| format!("{name}={}", value_text(value)))
                .collect();
            if pairs.is_empty() {
                return None;
            }
            pairs.sort();
            Some(md5_hex(&pairs.join("|")))
        }
    }
}

fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

/// Re-enables the data policy from Drop when the merge future is cancelled
/// mid-write. The normal paths disarm it and toggle explicitly.
struct ToggleGuard {
    policies: PolicyReconciler,
    table: String,
    armed: bool,
}

impl ToggleGuard {
    fn new(policies: PolicyReconciler, table: &str) -> Self {
        Self {
            policies,
            table: table.to_string(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ToggleGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let policies = self.policies.clone();
            let table = std::mem::take(&mut self.table);
            handle.spawn(async move {
                let _ = policies.toggle(&table, true).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire(pairs: &[(&str, &str)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), json!(v)))
            .collect()
    }

    struct Quiet;
    impl Status for Quiet {
        fn log(&self, _: &str) {}
        fn warn(&self, _: &str) {}
    }

    fn options(pk: PrimaryKey) -> DeltaMergeOptions {
        DeltaMergeOptions {
            primary_key: pk,
            ..DeltaMergeOptions::default()
        }
    }

    #[test]
    fn field_key_uses_the_value() {
        let row = wire(&[("u_pk", "a1")]);
        let key = row_key(&PrimaryKey::Field("u_pk".into()), &row, DEFAULT_DELETED_FLAG);
        assert_eq!(key.as_deref(), Some("a1"));

        let row = wire(&[("u_pk", "")]);
        assert!(row_key(&PrimaryKey::Field("u_pk".into()), &row, DEFAULT_DELETED_FLAG).is_none());
    }

    #[test]
    fn auto_key_ignores_field_order_and_the_flag() {
        let a = wire(&[("u_a", "1"), ("u_b", "2"), ("u_in_datamart", "1")]);
        let b = wire(&[("u_b", "2"), ("u_a", "1"), ("u_in_datamart", "0")]);
        let ka = row_key(&PrimaryKey::Auto, &a, DEFAULT_DELETED_FLAG).unwrap();
        let kb = row_key(&PrimaryKey::Auto, &b, DEFAULT_DELETED_FLAG).unwrap();
        assert_eq!(ka, kb);
        assert_eq!(ka.len(), 32);

        // non-user fields never key
        let sys_only = wire(&[("sys_id", "x")]);
        assert!(row_key(&PrimaryKey::Auto, &sys_only, DEFAULT_DELETED_FLAG).is_none());
    }

    #[test]
    fn fields_key_is_order_insensitive() {
        let row = wire(&[("u_a", "1"), ("u_b", "2")]);
        let k1 = row_key(
            &PrimaryKey::Fields(vec!["u_a".into(), "u_b".into()]),
            &row,
            DEFAULT_DELETED_FLAG,
        );
        let k2 = row_key(
            &PrimaryKey::Fields(vec!["u_b".into(), "u_a".into()]),
            &row,
            DEFAULT_DELETED_FLAG,
        );
        assert_eq!(k1, k2);
    }

    #[test]
    fn matched_rows_plan_nothing() {
        let incoming = vec![wire(&[("u_pk", "a1"), ("u_name", "n1")])];
        let existing = vec![wire(&[
            ("u_pk", "a1"),
            ("u_name", "n1"),
            ("sys_id", "0123456789abcdef0123456789abcdef"),
        ])];
        let plan = build_plan(
            &options(PrimaryKey::Field("u_pk".into())),
            false,
            false,
            incoming,
            existing,
            &Quiet,
        );
        assert_eq!(plan.matched, 1);
        assert!(!plan.has_writes());
    }

    #[test]
    fn changed_rows_plan_updates_with_identity_fields() {
        let incoming = vec![wire(&[("u_pk", "a1"), ("u_name", "renamed")])];
        let existing = vec![wire(&[
            ("u_pk", "a1"),
            ("u_name", "n1"),
            ("sys_id", "0123456789abcdef0123456789abcdef"),
            ("sys_class_name", "u_dm_host"),
        ])];
        let plan = build_plan(
            &options(PrimaryKey::Field("u_pk".into())),
            false,
            false,
            incoming,
            existing,
            &Quiet,
        );
        assert_eq!(plan.updates.len(), 1);
        let patch = &plan.updates[0];
        assert_eq!(patch.get("u_name"), Some(&json!("renamed")));
        assert_eq!(
            patch.get("sys_id"),
            Some(&json!("0123456789abcdef0123456789abcdef"))
        );
        assert_eq!(patch.get("sys_class_name"), Some(&json!("u_dm_host")));
        // unchanged fields stay out of the payload
        assert!(!patch.contains_key("u_pk"));
    }

    #[test]
    fn soft_delete_flips_the_flag_once() {
        let incoming = vec![wire(&[("u_pk", "a1"), ("u_name", "n1"), ("u_in_datamart", "1")])];
        let existing = vec![
            wire(&[
                ("u_pk", "a1"),
                ("u_name", "n1"),
                ("u_in_datamart", "1"),
                ("sys_id", "1111111111111111111111111111aaaa"),
            ]),
            wire(&[
                ("u_pk", "a2"),
                ("u_name", "n2"),
                ("u_in_datamart", "1"),
                ("sys_id", "2222222222222222222222222222bbbb"),
            ]),
        ];
        let plan = build_plan(
            &options(PrimaryKey::Field("u_pk".into())),
            true,
            false,
            incoming,
            existing,
            &Quiet,
        );
        assert_eq!(plan.matched, 1);
        assert!(plan.creates.is_empty());
        assert!(plan.updates.is_empty());
        assert_eq!(plan.soft_deletes.len(), 1);
        assert_eq!(
            plan.soft_deletes[0].get("u_in_datamart"),
            Some(&json!("0"))
        );
        assert_eq!(
            plan.soft_deletes[0].get("sys_id"),
            Some(&json!("2222222222222222222222222222bbbb"))
        );
    }

    #[test]
    fn already_flagged_rows_are_left_alone() {
        let incoming = vec![wire(&[("u_pk", "a1"), ("u_in_datamart", "1")])];
        let existing = vec![
            wire(&[
                ("u_pk", "a1"),
                ("u_in_datamart", "1"),
                ("sys_id", "1111111111111111111111111111aaaa"),
            ]),
            wire(&[
                ("u_pk", "a2"),
                ("u_in_datamart", "0"),
                ("sys_id", "2222222222222222222222222222bbbb"),
            ]),
        ];
        let plan = build_plan(
            &options(PrimaryKey::Field("u_pk".into())),
            true,
            false,
            incoming,
            existing,
            &Quiet,
        );
        assert!(plan.soft_deletes.is_empty());
        assert!(!plan.has_writes());
    }

    #[test]
    fn hard_deletes_when_allowed() {
        let incoming = vec![wire(&[("u_pk", "a1"), ("u_name", "n1")])];
        let existing = vec![
            wire(&[
                ("u_pk", "a1"),
                ("u_name", "n1"),
                ("sys_id", "1111111111111111111111111111aaaa"),
            ]),
            wire(&[
                ("u_pk", "a2"),
                ("u_name", "n2"),
                ("sys_id", "2222222222222222222222222222bbbb"),
            ]),
        ];
        let mut opts = options(PrimaryKey::Field("u_pk".into()));
        opts.allow_deletes = true;
        let plan = build_plan(&opts, false, false, incoming, existing, &Quiet);
        assert_eq!(
            plan.hard_deletes,
            vec!["2222222222222222222222222222bbbb".to_string()]
        );
    }

    #[test]
    fn without_flag_or_permission_nothing_is_deleted() {
        let incoming: Vec<Map<String, Value>> = Vec::new();
        let existing = vec![wire(&[
            ("u_pk", "a2"),
            ("sys_id", "2222222222222222222222222222bbbb"),
        ])];
        let plan = build_plan(
            &options(PrimaryKey::Field("u_pk".into())),
            false,
            false,
            incoming,
            existing,
            &Quiet,
        );
        assert!(plan.hard_deletes.is_empty());
        assert!(plan.soft_deletes.is_empty());
    }

    #[test]
    fn duplicate_incoming_rows_are_discarded() {
        let incoming = vec![
            wire(&[("u_pk", "a1"), ("u_name", "first")]),
            wire(&[("u_pk", "a1"), ("u_name", "second")]),
        ];
        let plan = build_plan(
            &options(PrimaryKey::Field("u_pk".into())),
            false,
            false,
            incoming,
            vec![],
            &Quiet,
        );
        // invariant: creates + updates + matched = incoming − duplicates
        assert_eq!(plan.creates.len(), 1);
        assert_eq!(plan.creates[0].get("u_name"), Some(&json!("first")));
    }

    #[test]
    fn duplicate_existing_rows_always_delete() {
        let incoming = vec![wire(&[("u_pk", "a1"), ("u_name", "n1")])];
        let existing = vec![
            wire(&[
                ("u_pk", "a1"),
                ("u_name", "n1"),
                ("sys_id", "1111111111111111111111111111aaaa"),
            ]),
            wire(&[
                ("u_pk", "a1"),
                ("u_name", "n1"),
                ("sys_id", "3333333333333333333333333333cccc"),
            ]),
        ];
        let mut opts = options(PrimaryKey::Field("u_pk".into()));
        opts.allow_deletes = true;
        let plan = build_plan(&opts, false, false, incoming, existing, &Quiet);
        assert_eq!(plan.matched, 1);
        assert_eq!(
            plan.hard_deletes,
            vec!["3333333333333333333333333333cccc".to_string()]
        );
    }

    #[test]
    fn creates_stamp_first_discovered_when_the_column_exists() {
        let incoming = vec![wire(&[("u_pk", "a1")])];
        let plan = build_plan(
            &options(PrimaryKey::Field("u_pk".into())),
            false,
            true,
            incoming,
            vec![],
            &Quiet,
        );
        assert!(plan.creates[0].contains_key("first_discovered"));
    }
}
