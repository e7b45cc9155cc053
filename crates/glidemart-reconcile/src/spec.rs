//! Desired-state model.
//!
//! Callers describe the table they want declaratively; reconcilers compare
//! that description against the instance and emit pending actions.

use std::collections::BTreeMap;

use glidemart_client::{Error, Result};

/// The closed set of column types this client manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Boolean,
    Integer,
    Long,
    Float,
    Decimal,
    DateTime,
    String,
    Text,
    Html,
    Url,
    Reference,
    /// List of references (`glide_list`).
    List,
}

impl ColumnKind {
    /// The remote type tag for this kind.
    #[must_use]
    pub fn internal_type(self) -> &'static str {
        match self {
            ColumnKind::Boolean => "boolean",
            ColumnKind::Integer => "integer",
            ColumnKind::Long => "long",
            ColumnKind::Float => "float",
            ColumnKind::Decimal => "decimal",
            ColumnKind::DateTime => "glide_date_time",
            ColumnKind::String => "string",
            ColumnKind::Text => "text",
            ColumnKind::Html => "html",
            ColumnKind::Url => "url",
            ColumnKind::Reference => "reference",
            ColumnKind::List => "glide_list",
        }
    }

    /// Parse a remote type tag.
    pub fn parse(tag: &str) -> Result<Self> {
        match tag {
            "boolean" => Ok(ColumnKind::Boolean),
            "integer" => Ok(ColumnKind::Integer),
            "long" => Ok(ColumnKind::Long),
            "float" => Ok(ColumnKind::Float),
            "decimal" => Ok(ColumnKind::Decimal),
            "glide_date_time" => Ok(ColumnKind::DateTime),
            "string" => Ok(ColumnKind::String),
            "text" => Ok(ColumnKind::Text),
            "html" => Ok(ColumnKind::Html),
            "url" => Ok(ColumnKind::Url),
            "reference" => Ok(ColumnKind::Reference),
            "glide_list" => Ok(ColumnKind::List),
            other => Err(Error::plan(format!("unknown column type '{other}'"))),
        }
    }

    /// Whether this kind points at another table.
    #[must_use]
    pub fn is_reference(self) -> bool {
        matches!(self, ColumnKind::Reference | ColumnKind::List)
    }
}

/// Choice-list enforcement mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChoiceRule {
    #[default]
    Off,
    Nullable,
    Suggestion,
    Required,
}

impl ChoiceRule {
    /// The remote integer encoding of this mode.
    #[must_use]
    pub fn as_remote(self) -> &'static str {
        match self {
            ChoiceRule::Off => "",
            ChoiceRule::Nullable => "1",
            ChoiceRule::Suggestion => "2",
            ChoiceRule::Required => "3",
        }
    }

    /// Parse the remote integer encoding.
    #[must_use]
    pub fn from_remote(value: &str) -> Self {
        match value {
            "1" => ChoiceRule::Nullable,
            "2" => ChoiceRule::Suggestion,
            "3" => ChoiceRule::Required,
            _ => ChoiceRule::Off,
        }
    }
}

/// Column-level data-policy constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataPolicyMode {
    ReadOnly,
    Writable,
}

/// One desired column.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    /// Stable caller-side identifier; defaults to the column name. A spec
    /// whose id names an existing column while `name` differs is a rename,
    /// which the instance does not support.
    pub id: Option<String>,
    pub name: String,
    pub kind: ColumnKind,
    pub label: Option<String>,
    pub max_length: Option<usize>,
    pub reference_table: Option<String>,
    /// Choice list: value → label.
    pub choices: Option<BTreeMap<String, String>>,
    pub choice: ChoiceRule,
    pub data_policy: Option<DataPolicyMode>,
    /// Whether changes on the instance flow back into the source system.
    pub syncback: bool,
}

impl ColumnSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            id: None,
            name: name.into(),
            kind,
            label: None,
            max_length: None,
            reference_table: None,
            choices: None,
            choice: ChoiceRule::Off,
            data_policy: None,
            syncback: false,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    #[must_use]
    pub fn with_reference_table(mut self, table: impl Into<String>) -> Self {
        self.reference_table = Some(table.into());
        self
    }

    #[must_use]
    pub fn with_choices(mut self, choices: BTreeMap<String, String>) -> Self {
        self.choices = Some(choices);
        self
    }

    #[must_use]
    pub fn with_choice_rule(mut self, rule: ChoiceRule) -> Self {
        self.choice = rule;
        self
    }

    #[must_use]
    pub fn with_data_policy(mut self, mode: DataPolicyMode) -> Self {
        self.data_policy = Some(mode);
        self
    }

    /// Caller-side identifier, falling back to the name.
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }

    /// A choice map implies the list is at least nullable.
    pub(crate) fn normalize(&mut self) {
        if self.choices.is_some() && self.choice == ChoiceRule::Off {
            self.choice = ChoiceRule::Nullable;
        }
    }
}

/// One desired table.
#[derive(Debug, Clone)]
pub struct TableSpec {
    pub name: String,
    pub label: Option<String>,
    /// Parent table name; the lineage forms single-inheritance ancestry.
    pub parent: Option<String>,
    pub extendable: bool,
    /// Columns in the caller's iteration order.
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: None,
            parent: None,
            extendable: false,
            columns: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    #[must_use]
    pub fn extendable(mut self) -> Self {
        self.extendable = true;
        self
    }

    #[must_use]
    pub fn with_column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    pub(crate) fn normalized(&self) -> TableSpec {
        let mut spec = self.clone();
        for column in &mut spec.columns {
            column.normalize();
        }
        spec
    }
}

/// What a planned action will do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Create,
    Update,
    Delete,
    Error,
}

/// One entry of a reconciliation plan, executed in order on commit.
#[derive(Debug)]
pub struct PendingAction {
    /// The table or column the action targets.
    pub name: String,
    pub kind: ActionKind,
    /// Human-readable summary of what will happen (or what is wrong).
    pub description: String,
    pub(crate) op: Option<PlannedOp>,
}

impl PendingAction {
    pub(crate) fn new(
        name: impl Into<String>,
        kind: ActionKind,
        description: impl Into<String>,
        op: PlannedOp,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            description: description.into(),
            op: Some(op),
        }
    }

    /// An error entry: carries no operation and blocks the commit.
    pub(crate) fn error(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ActionKind::Error,
            description: description.into(),
            op: None,
        }
    }
}

/// The concrete operation behind a pending action.
#[derive(Debug, Clone)]
pub(crate) enum PlannedOp {
    CreateTable {
        spec: TableSpec,
        parent_sys_id: Option<String>,
    },
    CreateColumn {
        table: String,
        spec: ColumnSpec,
    },
    UpdateColumn {
        table: String,
        sys_id: String,
        patch: serde_json::Value,
        spec: ColumnSpec,
    },
    DeleteColumn {
        sys_id: String,
    },
}

/// Result of a table sync: the plan, and whether it was committed.
#[derive(Debug)]
pub struct SyncReport {
    pub actions: Vec<PendingAction>,
    pub committed: bool,
}

impl SyncReport {
    /// Error entries in the plan.
    #[must_use]
    pub fn errors(&self) -> Vec<&PendingAction> {
        self.actions
            .iter()
            .filter(|a| a.kind == ActionKind::Error)
            .collect()
    }

    /// Actions that would change the instance.
    #[must_use]
    pub fn changes(&self) -> usize {
        self.actions
            .iter()
            .filter(|a| a.kind != ActionKind::Error)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_kind_tags_round_trip() {
        for kind in [
            ColumnKind::Boolean,
            ColumnKind::Integer,
            ColumnKind::Long,
            ColumnKind::Float,
            ColumnKind::Decimal,
            ColumnKind::DateTime,
            ColumnKind::String,
            ColumnKind::Text,
            ColumnKind::Html,
            ColumnKind::Url,
            ColumnKind::Reference,
            ColumnKind::List,
        ] {
            assert_eq!(ColumnKind::parse(kind.internal_type()).unwrap(), kind);
        }
        assert!(ColumnKind::parse("journal").is_err());
    }

    #[test]
    fn choice_rule_remote_encoding() {
        assert_eq!(ChoiceRule::Nullable.as_remote(), "1");
        assert_eq!(ChoiceRule::Suggestion.as_remote(), "2");
        assert_eq!(ChoiceRule::Required.as_remote(), "3");
        assert_eq!(ChoiceRule::from_remote("3"), ChoiceRule::Required);
        assert_eq!(ChoiceRule::from_remote(""), ChoiceRule::Off);
        assert_eq!(ChoiceRule::from_remote("0"), ChoiceRule::Off);
    }

    #[test]
    fn choice_map_implies_nullable() {
        let mut choices = BTreeMap::new();
        choices.insert("1".to_string(), "One".to_string());

        let mut spec = ColumnSpec::new("u_state", ColumnKind::Integer).with_choices(choices);
        assert_eq!(spec.choice, ChoiceRule::Off);
        spec.normalize();
        assert_eq!(spec.choice, ChoiceRule::Nullable);

        // an explicit rule is kept
        let mut spec = ColumnSpec::new("u_state", ColumnKind::Integer)
            .with_choices(BTreeMap::new())
            .with_choice_rule(ChoiceRule::Required);
        spec.normalize();
        assert_eq!(spec.choice, ChoiceRule::Required);
    }

    #[test]
    fn column_id_falls_back_to_name() {
        let spec = ColumnSpec::new("u_name", ColumnKind::String);
        assert_eq!(spec.id(), "u_name");
        let spec = spec.with_id("legacy_name");
        assert_eq!(spec.id(), "legacy_name");
    }
}
