//! Column diffing.
//!
//! Compares a desired column set against the flattened descriptor and
//! plans one action per column: create, update, delete, or an error entry
//! naming the rule that blocks the change.

use serde_json::json;

use crate::descriptor::{ColumnDescriptor, TableDescriptor};
use crate::spec::{ActionKind, ColumnSpec, PendingAction, PlannedOp, TableSpec};

/// Prefix of columns this client is allowed to own.
pub(crate) const USER_COLUMN_PREFIX: &str = "u_";

/// Plan actions for every desired column plus deletions of abandoned ones.
pub(crate) fn plan_columns(
    desired: &TableSpec,
    existing: &TableDescriptor,
    acting_user: &str,
) -> Vec<PendingAction> {
    let mut actions = Vec::new();

    for spec in &desired.columns {
        if let Some(action) = plan_one(desired, existing, spec) {
            actions.push(action);
        }
    }

    // deletions: user-owned columns on this table the desired set dropped
    for (name, column) in &existing.columns {
        let wanted = desired.columns.iter().any(|spec| &spec.name == name);
        if wanted
            || !name.starts_with(USER_COLUMN_PREFIX)
            || !existing.owns(column)
            || column.created_by != acting_user
        {
            continue;
        }
        actions.push(PendingAction::new(
            name.clone(),
            ActionKind::Delete,
            format!("drop column {name} from {}", existing.name),
            PlannedOp::DeleteColumn {
                sys_id: column.sys_id.clone(),
            },
        ));
    }

    actions
}

/// Plan actions for a table that does not exist yet: every column is a
/// create, subject to the same naming rule.
pub(crate) fn plan_columns_for_new_table(desired: &TableSpec) -> Vec<PendingAction> {
    desired
        .columns
        .iter()
        .map(|spec| match validate_new(desired, spec) {
            Some(error) => error,
            None => create_action(desired, spec),
        })
        .collect()
}

fn plan_one(
    desired: &TableSpec,
    existing: &TableDescriptor,
    spec: &ColumnSpec,
) -> Option<PendingAction> {
    // an id pointing at an existing column under a different name is a
    // rename, which the dictionary does not support
    if spec.id() != spec.name && existing.columns.contains_key(spec.id()) {
        return Some(PendingAction::error(
            spec.name.clone(),
            format!(
                "cannot rename column {} to {}: renames are not supported",
                spec.id(),
                spec.name
            ),
        ));
    }

    match existing.columns.get(&spec.name) {
        None => Some(match validate_new(desired, spec) {
            Some(error) => error,
            None => create_action(desired, spec),
        }),
        Some(current) => plan_update(desired, existing, spec, current),
    }
}

fn validate_new(desired: &TableSpec, spec: &ColumnSpec) -> Option<PendingAction> {
    if !spec.name.starts_with(USER_COLUMN_PREFIX) {
        return Some(PendingAction::error(
            spec.name.clone(),
            format!(
                "cannot create {}: user-defined columns must begin with {USER_COLUMN_PREFIX}",
                spec.name
            ),
        ));
    }
    if spec.kind.is_reference() && spec.reference_table.is_none() {
        return Some(PendingAction::error(
            spec.name.clone(),
            format!(
                "cannot create {} on {}: {} columns need a reference table",
                spec.name,
                desired.name,
                spec.kind.internal_type()
            ),
        ));
    }
    None
}

fn create_action(desired: &TableSpec, spec: &ColumnSpec) -> PendingAction {
    PendingAction::new(
        spec.name.clone(),
        ActionKind::Create,
        format!(
            "create {} column {} on {}",
            spec.kind.internal_type(),
            spec.name,
            desired.name
        ),
        PlannedOp::CreateColumn {
            table: desired.name.clone(),
            spec: spec.clone(),
        },
    )
}

fn plan_update(
    desired: &TableSpec,
    existing: &TableDescriptor,
    spec: &ColumnSpec,
    current: &ColumnDescriptor,
) -> Option<PendingAction> {
    // immutable once created
    if spec.kind.internal_type() != current.internal_type {
        return Some(PendingAction::error(
            spec.name.clone(),
            format!(
                "cannot change the type of {}: it is {} and would become {}",
                spec.name,
                current.internal_type,
                spec.kind.internal_type()
            ),
        ));
    }
    if spec.kind.is_reference() && spec.reference_table != current.reference_table {
        return Some(PendingAction::error(
            spec.name.clone(),
            format!(
                "cannot change the reference table of {}: it is {} and would become {}",
                spec.name,
                current.reference_table.as_deref().unwrap_or("(none)"),
                spec.reference_table.as_deref().unwrap_or("(none)")
            ),
        ));
    }

    let mut patch = serde_json::Map::new();
    if let Some(label) = &spec.label {
        if label != &current.label {
            patch.insert("column_label".to_string(), json!(label));
        }
    }
    if let Some(max_length) = spec.max_length {
        if Some(max_length) != current.max_length {
            patch.insert("max_length".to_string(), json!(max_length.to_string()));
        }
    }
    if spec.choice != current.choice {
        patch.insert("choice".to_string(), json!(spec.choice.as_remote()));
    }

    let choices_changed = match &spec.choices {
        Some(choices) => choices != &current.choice_map,
        None => false,
    };
    let policy_changed = match spec.data_policy {
        Some(mode) => Some(mode) != current.data_policy,
        None => false,
    };

    if patch.is_empty() && !choices_changed && !policy_changed {
        return None;
    }

    // something differs: check who may change it
    if !existing.owns(current) {
        return Some(PendingAction::error(
            spec.name.clone(),
            format!(
                "cannot update {}: it is inherited from {}",
                spec.name, current.table
            ),
        ));
    }
    if !spec.name.starts_with(USER_COLUMN_PREFIX) {
        return Some(PendingAction::error(
            spec.name.clone(),
            format!(
                "cannot update {}: out-of-the-box columns are read-only to this client",
                spec.name
            ),
        ));
    }

    let mut changed: Vec<&str> = patch.keys().map(String::as_str).collect();
    if choices_changed {
        changed.push("choices");
    }
    if policy_changed {
        changed.push("data_policy");
    }

    Some(PendingAction::new(
        spec.name.clone(),
        ActionKind::Update,
        format!("update {} ({})", spec.name, changed.join(", ")),
        PlannedOp::UpdateColumn {
            table: desired.name.clone(),
            sys_id: current.sys_id.clone(),
            patch: serde_json::Value::Object(patch),
            spec: spec.clone(),
        },
    ))
}
