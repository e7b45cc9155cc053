//! API request model and URL validation.
//!
//! The gateway accepts two path shapes:
//! `/{v1,v2}/(import|table|stats|attachment)/{tableOrId}[/{id}]` for the
//! JSON APIs under `/api/now`, and `{table}.do?SCHEMA` for the XML schema
//! endpoint at the instance root.

use serde_json::Value;

use crate::error::{Error, Result};
use crate::transport::Method;
use crate::value::is_sys_id;

/// Prefix required of import-set staging tables.
pub const IMPORT_TABLE_PREFIX: &str = "u_imp_dm_";

/// A validated, classified API path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiPath {
    Table {
        version: u8,
        table: String,
        sys_id: Option<String>,
    },
    Import {
        version: u8,
        table: String,
    },
    Stats {
        version: u8,
        table: String,
    },
    Attachment {
        version: u8,
        sys_id: Option<String>,
        /// `/{sys_id}/file`: download the attachment bytes.
        file: bool,
    },
    Schema {
        table: String,
    },
}

impl ApiPath {
    /// Parse and validate a caller-supplied path.
    pub fn parse(path: &str) -> Result<ApiPath> {
        if let Some(table) = path.strip_suffix(".do?SCHEMA") {
            if table.is_empty() || table.contains('/') {
                return Err(Error::validation(format!(
                    "'{path}' is not a valid schema path"
                )));
            }
            return Ok(ApiPath::Schema {
                table: table.to_string(),
            });
        }

        let segments: Vec<&str> = path
            .strip_prefix('/')
            .unwrap_or(path)
            .split('/')
            .collect();

        if !(3..=4).contains(&segments.len()) {
            return Err(Error::validation(format!(
                "'{path}' does not match /{{version}}/{{api}}/{{table}}[/{{sys_id}}]"
            )));
        }

        let version = match segments[0] {
            "v1" => 1,
            "v2" => 2,
            other => {
                return Err(Error::validation(format!(
                    "unknown API version '{other}' in '{path}'"
                )))
            }
        };

        let family = segments[1];
        let name = segments[2].to_string();
        let id = segments.get(3).map(|s| (*s).to_string());

        if name.is_empty() {
            return Err(Error::validation(format!("'{path}' has an empty table slot")));
        }

        match family {
            "table" => {
                if let Some(ref id) = id {
                    check_sys_id(path, id)?;
                }
                Ok(ApiPath::Table {
                    version,
                    table: name,
                    sys_id: id,
                })
            }
            "import" => {
                if !name.starts_with(IMPORT_TABLE_PREFIX) {
                    return Err(Error::validation(format!(
                        "import table '{name}' must begin with {IMPORT_TABLE_PREFIX}"
                    )));
                }
                if id.is_some() {
                    return Err(Error::validation(format!(
                        "'{path}': the import API takes no record id"
                    )));
                }
                Ok(ApiPath::Import {
                    version,
                    table: name,
                })
            }
            "stats" => {
                if id.is_some() {
                    return Err(Error::validation(format!(
                        "'{path}': the stats API takes no record id"
                    )));
                }
                Ok(ApiPath::Stats {
                    version,
                    table: name,
                })
            }
            "attachment" => {
                // /v1/attachment/{sys_id} or /v1/attachment/{sys_id}/file
                let file = id.as_deref() == Some("file");
                if id.is_some() && !file {
                    return Err(Error::validation(format!(
                        "'{path}': trailing attachment segment must be 'file'"
                    )));
                }
                check_sys_id(path, &name)?;
                Ok(ApiPath::Attachment {
                    version,
                    sys_id: Some(name),
                    file,
                })
            }
            other => Err(Error::validation(format!(
                "unknown API family '{other}' in '{path}'"
            ))),
        }
    }

    /// Absolute URL for this path on the given instance root.
    #[must_use]
    pub fn url(&self, instance_url: &str) -> String {
        match self {
            ApiPath::Table {
                version,
                table,
                sys_id,
            } => match sys_id {
                Some(id) => format!("{instance_url}/api/now/v{version}/table/{table}/{id}"),
                None => format!("{instance_url}/api/now/v{version}/table/{table}"),
            },
            ApiPath::Import { version, table } => {
                format!("{instance_url}/api/now/v{version}/import/{table}")
            }
            ApiPath::Stats { version, table } => {
                format!("{instance_url}/api/now/v{version}/stats/{table}")
            }
            ApiPath::Attachment {
                version,
                sys_id,
                file,
            } => {
                let id = sys_id.as_deref().unwrap_or_default();
                if *file {
                    format!("{instance_url}/api/now/v{version}/attachment/{id}/file")
                } else {
                    format!("{instance_url}/api/now/v{version}/attachment/{id}")
                }
            }
            // the schema endpoint lives at the instance root, not /api/now
            ApiPath::Schema { table } => format!("{instance_url}/{table}.do?SCHEMA"),
        }
    }

    /// Table-API path without a record id: a list query.
    #[must_use]
    pub fn is_table_list(&self) -> bool {
        matches!(self, ApiPath::Table { sys_id: None, .. })
    }

    /// The table this path addresses, when it addresses one.
    #[must_use]
    pub fn table(&self) -> Option<&str> {
        match self {
            ApiPath::Table { table, .. }
            | ApiPath::Import { table, .. }
            | ApiPath::Stats { table, .. }
            | ApiPath::Schema { table } => Some(table),
            ApiPath::Attachment { .. } => None,
        }
    }
}

fn check_sys_id(path: &str, id: &str) -> Result<()> {
    if is_sys_id(id) {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "'{id}' in '{path}' is not a 32-character sys_id"
        )))
    }
}

/// One request as callers hand it to the gateway.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    #[must_use]
    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Put,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            method: Method::Delete,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}
