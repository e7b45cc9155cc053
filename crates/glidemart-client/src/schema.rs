//! Table schemas and the schema cache.
//!
//! A table's column schema comes from the instance-root `{table}.do?SCHEMA`
//! endpoint as XML. Parsed schemas drive type coercion and are memoized for
//! five minutes, with concurrent misses for the same table coalescing onto
//! a single fetch.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;

use crate::error::{Error, Result};

/// How long a fetched schema stays usable.
pub const SCHEMA_TTL: Duration = Duration::from_secs(5 * 60);

/// One column as the SCHEMA endpoint describes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaElement {
    pub name: String,
    /// Remote type tag (`boolean`, `integer`, `glide_date_time`, …).
    pub internal_type: String,
    pub max_length: Option<usize>,
    /// Target table for `reference`/`glide_list` columns.
    pub reference_table: Option<String>,
    /// Whether the column carries a choice list.
    pub choice_list: bool,
}

/// A table's parsed column schema, sorted by column name.
#[derive(Debug, Clone)]
pub struct TableSchema {
    pub table: String,
    pub elements: BTreeMap<String, SchemaElement>,
}

impl TableSchema {
    /// Look up a column.
    #[must_use]
    pub fn element(&self, name: &str) -> Option<&SchemaElement> {
        self.elements.get(name)
    }

    /// Whether the table has a column of this name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.elements.contains_key(name)
    }

    /// Parse the XML document the SCHEMA endpoint returns.
    ///
    /// The root element is named after the table and contains one
    /// `<element name=… internal_type=… max_length=…/>` child per column.
    pub fn parse_xml(table: &str, xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        let mut elements = BTreeMap::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(tag)) | Ok(Event::Empty(tag)) => {
                    if tag.name().as_ref() != b"element" {
                        continue;
                    }

                    let mut name = None;
                    let mut internal_type = None;
                    let mut max_length = None;
                    let mut reference_table = None;
                    let mut choice_list = false;

                    for attr in tag.attributes() {
                        let attr = attr.map_err(|e| {
                            Error::protocol(format!("malformed schema XML attribute: {e}"))
                        })?;
                        let value = attr
                            .unescape_value()
                            .map_err(|e| {
                                Error::protocol(format!("malformed schema XML attribute: {e}"))
                            })?
                            .into_owned();
                        match attr.key.as_ref() {
                            b"name" => name = Some(value),
                            b"internal_type" => internal_type = Some(value),
                            b"max_length" => max_length = value.parse::<usize>().ok(),
                            b"reference_table" => {
                                if !value.is_empty() {
                                    reference_table = Some(value);
                                }
                            }
                            b"choice_list" => choice_list = value == "true",
                            _ => {}
                        }
                    }

                    let name = name.ok_or_else(|| {
                        Error::schema(table, "schema element without a name attribute")
                    })?;
                    let internal_type = internal_type.ok_or_else(|| {
                        Error::schema(table, format!("column {name} has no internal_type"))
                    })?;

                    elements.insert(
                        name.clone(),
                        SchemaElement {
                            name,
                            internal_type,
                            max_length,
                            reference_table,
                            choice_list,
                        },
                    );
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::protocol(format!(
                        "malformed schema XML for {table}: {e}"
                    )))
                }
                _ => {}
            }
        }

        if elements.is_empty() {
            return Err(Error::schema(
                table,
                "SCHEMA endpoint returned no element entries",
            ));
        }

        Ok(Self {
            table: table.to_string(),
            elements,
        })
    }
}

#[derive(Clone)]
struct Published {
    schema: Arc<TableSchema>,
    fetched_at: Instant,
}

/// Per-table schema cache with single-flight fetches.
///
/// An entry is either pending (its `OnceCell` is initializing; waiters
/// suspend on it) or ready (published schema plus fetch time). Expired
/// entries are replaced with a fresh cell on the next lookup.
pub struct SchemaCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, Arc<OnceCell<Published>>>>,
}

impl SchemaCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Read the cached schema for `table`, fetching it with `fetch` on a
    /// miss. Concurrent callers for the same cold table share one fetch and
    /// observe the same published schema.
    pub async fn get_or_fetch<F, Fut>(&self, table: &str, fetch: F) -> Result<Arc<TableSchema>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<TableSchema>>,
    {
        let cell = {
            let mut entries = self.entries.lock().expect("schema cache poisoned");
            let replace = entries
                .get(table)
                .and_then(|cell| cell.get())
                .is_some_and(|published| published.fetched_at.elapsed() >= self.ttl);
            if replace {
                entries.remove(table);
            }
            entries
                .entry(table.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let published = cell
            .get_or_try_init(|| async {
                let schema = fetch().await?;
                Ok::<_, Error>(Published {
                    schema: Arc::new(schema),
                    fetched_at: Instant::now(),
                })
            })
            .await?;

        Ok(published.schema.clone())
    }

    /// Drop the cached entry for `table`, forcing the next read to fetch.
    pub fn invalidate(&self, table: &str) {
        self.entries
            .lock()
            .expect("schema cache poisoned")
            .remove(table);
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        self.entries.lock().expect("schema cache poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const HOST_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<u_dm_host>
  <element name="sys_id" internal_type="GUID" max_length="32"/>
  <element name="u_name" internal_type="string" max_length="40"/>
  <element name="u_count" internal_type="integer" max_length="40"/>
  <element name="u_owner" internal_type="reference" max_length="32" reference_table="u_dm_user"/>
  <element name="u_state" internal_type="integer" max_length="40" choice_list="true"/>
</u_dm_host>"#;

    #[test]
    fn parses_schema_xml() {
        let schema = TableSchema::parse_xml("u_dm_host", HOST_XML).unwrap();
        assert_eq!(schema.elements.len(), 5);

        let owner = schema.element("u_owner").unwrap();
        assert_eq!(owner.internal_type, "reference");
        assert_eq!(owner.reference_table.as_deref(), Some("u_dm_user"));
        assert_eq!(owner.max_length, Some(32));
        assert!(!owner.choice_list);

        assert!(schema.element("u_state").unwrap().choice_list);
        // sorted map: iteration order is by name
        let names: Vec<_> = schema.elements.keys().collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn empty_schema_is_an_error() {
        let err = TableSchema::parse_xml("u_foo", "<u_foo></u_foo>").unwrap_err();
        assert!(matches!(err, Error::Schema { .. }));
    }

    #[test]
    fn element_without_name_is_an_error() {
        let xml = r#"<u_foo><element internal_type="string"/></u_foo>"#;
        assert!(TableSchema::parse_xml("u_foo", xml).is_err());
    }

    #[test]
    fn malformed_xml_is_a_protocol_error() {
        let err = TableSchema::parse_xml("u_foo", "<u_foo><element").unwrap_err();
        assert!(matches!(err, Error::Protocol { .. } | Error::Schema { .. }));
    }

    fn host_schema() -> TableSchema {
        TableSchema::parse_xml("u_dm_host", HOST_XML).unwrap()
    }

    #[tokio::test]
    async fn concurrent_misses_share_one_fetch() {
        let cache = Arc::new(SchemaCache::new(SCHEMA_TTL));
        let fetches = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let cache = cache.clone();
            let fetches = fetches.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_fetch("u_dm_host", || async move {
                        fetches.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(host_schema())
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut schemas = Vec::new();
        for handle in handles {
            schemas.push(handle.await.unwrap());
        }

        assert_eq!(fetches.load(Ordering::SeqCst), 1);
        // every waiter observes the same published instance
        for schema in &schemas[1..] {
            assert!(Arc::ptr_eq(schema, &schemas[0]));
        }
    }

    #[tokio::test]
    async fn expired_entries_refetch() {
        let cache = SchemaCache::new(Duration::from_millis(10));
        let fetches = AtomicUsize::new(0);

        for _ in 0..2 {
            cache
                .get_or_fetch("u_dm_host", || async {
                    fetches.fetch_add(1, Ordering::SeqCst);
                    Ok(host_schema())
                })
                .await
                .unwrap();
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(15)).await;
        cache
            .get_or_fetch("u_dm_host", || async {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok(host_schema())
            })
            .await
            .unwrap();
        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let cache = SchemaCache::new(SCHEMA_TTL);
        let fetches = AtomicUsize::new(0);

        cache
            .get_or_fetch("u_dm_host", || async {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok(host_schema())
            })
            .await
            .unwrap();
        cache.invalidate("u_dm_host");
        cache
            .get_or_fetch("u_dm_host", || async {
                fetches.fetch_add(1, Ordering::SeqCst);
                Ok(host_schema())
            })
            .await
            .unwrap();

        assert_eq!(fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_fetch_is_not_published() {
        let cache = SchemaCache::new(SCHEMA_TTL);

        let err = cache
            .get_or_fetch("u_dm_host", || async {
                Err(Error::schema("u_dm_host", "boom"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Schema { .. }));

        // the failure did not poison the entry
        let schema = cache
            .get_or_fetch("u_dm_host", || async { Ok(host_schema()) })
            .await
            .unwrap();
        assert_eq!(schema.table, "u_dm_host");
    }
}
