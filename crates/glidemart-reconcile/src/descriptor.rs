//! Flattened table descriptors.
//!
//! A descriptor is the merged view of a table and its ancestors: every
//! column the table carries, each annotated with the deepest table that
//! defines it, its choice list, and its data-policy constraint.

use std::collections::{BTreeMap, HashMap, HashSet};

use glidemart_client::{Error, GetRecordsOptions, Result, ServiceNowClient, TypedRow};

use crate::fields::{flag, number, opt_text, text};
use crate::spec::{ChoiceRule, DataPolicyMode};

/// One column of a flattened descriptor.
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    pub name: String,
    pub sys_id: String,
    /// Remote type tag.
    pub internal_type: String,
    pub label: String,
    pub max_length: Option<usize>,
    pub reference_table: Option<String>,
    pub choice: ChoiceRule,
    pub choice_map: BTreeMap<String, String>,
    pub data_policy: Option<DataPolicyMode>,
    pub created_by: String,
    /// The deepest (most specific) table defining this column.
    pub table: String,
    /// The column appears in more than one table of the ancestry.
    pub overridden: bool,
}

/// The merged view of a table hierarchy.
#[derive(Debug, Clone)]
pub struct TableDescriptor {
    pub name: String,
    pub sys_id: String,
    pub label: String,
    /// Direct parent table name, when the table extends one.
    pub parent: Option<String>,
    pub extendable: bool,
    pub columns: BTreeMap<String, ColumnDescriptor>,
}

impl TableDescriptor {
    /// Whether `column` is defined on this table itself rather than
    /// inherited from an ancestor.
    #[must_use]
    pub fn owns(&self, column: &ColumnDescriptor) -> bool {
        column.table == self.name
    }
}

/// One level of the ancestry walk, before merging.
struct Level {
    name: String,
    sys_id: String,
    label: String,
    extendable: bool,
    columns: Vec<ColumnDescriptor>,
}

/// Fetch the `sys_db_object` record for a table by name or sys_id.
pub(crate) async fn fetch_table_record(
    client: &ServiceNowClient,
    name_or_id: &str,
) -> Result<Option<TypedRow>> {
    let field = if glidemart_client::is_sys_id(name_or_id) {
        "sys_id"
    } else {
        "name"
    };
    let rows = client
        .get_records(
            "sys_db_object",
            GetRecordsOptions::new()
                .with_query(format!("{field}={name_or_id}"))
                .with_column("name")
                .with_column("label")
                .with_column("super_class")
                .with_column("is_extendable")
                .with_column("sys_id")
                .with_max_records(1),
        )
        .await?;
    Ok(rows.into_iter().next())
}

/// Load and flatten the descriptor for `name_or_id`, walking the ancestry.
///
/// Returns `None` when the table does not exist. Merge rules: the first
/// (deepest) occurrence of a column wins; a repeat occurrence higher up
/// marks it `overridden` and can only contribute a missing label.
pub(crate) async fn load(
    client: &ServiceNowClient,
    name_or_id: &str,
) -> Result<Option<TableDescriptor>> {
    let me = client.acting_user().await?.user_name;

    let Some(mut record) = fetch_table_record(client, name_or_id).await? else {
        return Ok(None);
    };

    let mut levels: Vec<Level> = Vec::new();
    let mut parent_names: Vec<Option<String>> = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();

    loop {
        let sys_id = text(&record, "sys_id");
        if !visited.insert(sys_id.clone()) {
            return Err(Error::operational(format!(
                "inheritance cycle at table {}",
                text(&record, "name")
            )));
        }

        let parent_id = opt_text(&record, "super_class");
        levels.push(load_level(client, &record, &me).await?);

        match parent_id {
            None => {
                parent_names.push(None);
                break;
            }
            Some(id) => match fetch_table_record(client, &id).await? {
                Some(parent) => {
                    parent_names.push(Some(text(&parent, "name")));
                    record = parent;
                }
                // parent not visible to this user: stop the walk
                None => {
                    parent_names.push(None);
                    break;
                }
            },
        }
    }

    let mut columns: BTreeMap<String, ColumnDescriptor> = BTreeMap::new();
    for level in &levels {
        for column in &level.columns {
            match columns.get_mut(&column.name) {
                None => {
                    columns.insert(column.name.clone(), column.clone());
                }
                Some(existing) => {
                    existing.overridden = true;
                    if existing.label.is_empty() && !column.label.is_empty() {
                        existing.label = column.label.clone();
                    }
                }
            }
        }
    }

    let root = &levels[0];
    Ok(Some(TableDescriptor {
        name: root.name.clone(),
        sys_id: root.sys_id.clone(),
        label: root.label.clone(),
        parent: parent_names[0].clone(),
        extendable: root.extendable,
        columns,
    }))
}

/// Fetch one table's own dictionary, choices, policy rules, and docs.
async fn load_level(
    client: &ServiceNowClient,
    record: &TypedRow,
    acting_user: &str,
) -> Result<Level> {
    let table = text(record, "name");

    let dictionary = client.get_records(
        "sys_dictionary",
        GetRecordsOptions::new()
            .with_query(format!("name={table}"))
            .with_column("element")
            .with_column("column_label")
            .with_column("internal_type")
            .with_column("max_length")
            .with_column("reference")
            .with_column("choice")
            .with_column("sys_created_by")
            .with_column("sys_update_name")
            .with_column("sys_id"),
    );
    let choices = client.get_records(
        "sys_choice",
        GetRecordsOptions::new()
            .with_query(format!("name={table}^inactive=false"))
            .with_column("element")
            .with_column("value")
            .with_column("label"),
    );
    let rules = client.get_records(
        "sys_data_policy_rule",
        GetRecordsOptions::new()
            .with_query(format!("table={table}^sys_created_by={acting_user}"))
            .with_column("field")
            .with_column("disabled"),
    );
    let docs = client.get_records(
        "sys_documentation",
        GetRecordsOptions::new()
            .with_query(format!("name={table}"))
            .with_column("element")
            .with_column("label"),
    );

    let (dictionary, choices, rules, docs) = tokio::try_join!(dictionary, choices, rules, docs)?;

    let mut choice_maps: HashMap<String, BTreeMap<String, String>> = HashMap::new();
    for row in &choices {
        choice_maps
            .entry(text(row, "element"))
            .or_default()
            .insert(text(row, "value"), text(row, "label"));
    }

    let mut policies: HashMap<String, DataPolicyMode> = HashMap::new();
    for row in &rules {
        let mode = if flag(row, "disabled") {
            DataPolicyMode::ReadOnly
        } else {
            DataPolicyMode::Writable
        };
        policies.insert(text(row, "field"), mode);
    }

    let mut doc_labels: HashMap<String, String> = HashMap::new();
    for row in &docs {
        if let Some(label) = opt_text(row, "label") {
            doc_labels.insert(text(row, "element"), label);
        }
    }

    let synthetic_null = format!("sys_dictionary_{table}_null");
    let mut columns = Vec::new();
    for row in &dictionary {
        let element = text(row, "element");
        // the collection row and server-generated null columns are noise
        if element.is_empty() || text(row, "sys_update_name") == synthetic_null {
            continue;
        }

        let label = doc_labels
            .get(&element)
            .cloned()
            .or_else(|| opt_text(row, "column_label"))
            .unwrap_or_default();

        columns.push(ColumnDescriptor {
            name: element.clone(),
            sys_id: text(row, "sys_id"),
            internal_type: text(row, "internal_type"),
            label,
            max_length: number(row, "max_length"),
            reference_table: opt_text(row, "reference"),
            choice: ChoiceRule::from_remote(&text(row, "choice")),
            choice_map: choice_maps.remove(&element).unwrap_or_default(),
            data_policy: policies.get(&element).copied(),
            created_by: text(row, "sys_created_by"),
            table: table.clone(),
            overridden: false,
        });
    }

    Ok(Level {
        name: table,
        sys_id: text(record, "sys_id"),
        label: text(record, "label"),
        extendable: flag(record, "is_extendable"),
        columns,
    })
}
