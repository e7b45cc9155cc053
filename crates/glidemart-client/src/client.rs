//! The client aggregate and request gateway.
//!
//! [`ServiceNowClient`] is the single entry point every higher layer talks
//! through: it validates the request, takes a limiter permit, runs the
//! transport, decodes the response, and coerces table-API rows through the
//! table's schema.

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::coerce::{self, SchemaSource};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::limits::ReadWriteLimiter;
use crate::record_cache::{parse_ttl, RecordCache};
use crate::request::{ApiPath, ApiRequest};
use crate::schema::{SchemaCache, TableSchema, SCHEMA_TTL};
use crate::transport::{HttpTransport, Method, Payload, PreparedRequest, Transport};
use crate::value::{FieldValue, TypedRow};

/// Hard cap on rows a single query may address.
pub const MAX_QUERY_ROWS: u64 = 100_000;

/// Rows per page when paginating a large read.
const DEFAULT_PAGE_SIZE: usize = 500;

/// Pages fetched in parallel.
const PAGE_CONCURRENCY: usize = 4;

/// The authenticated user, as the instance knows it.
#[derive(Debug, Clone)]
pub struct ActingUser {
    pub sys_id: String,
    pub user_name: String,
}

/// A decoded gateway response.
#[derive(Debug, Clone)]
pub enum ApiResponse {
    /// Table-API list read, coerced through the table schema.
    Rows(Vec<TypedRow>),
    /// Table-API single-record read, coerced.
    Row(TypedRow),
    /// Any other JSON body (stats, import, …).
    Json(Value),
    /// Raw XML text (schema endpoint).
    Xml(String),
    /// Attachment bytes.
    Bytes(Vec<u8>),
    /// 201/204 success.
    Empty,
}

impl ApiResponse {
    /// Unwrap a list read.
    pub fn into_rows(self) -> Result<Vec<TypedRow>> {
        match self {
            ApiResponse::Rows(rows) => Ok(rows),
            other => Err(Error::protocol(format!(
                "expected a row list, got {}",
                other.kind_name()
            ))),
        }
    }

    /// Unwrap a JSON body.
    pub fn into_json(self) -> Result<Value> {
        match self {
            ApiResponse::Json(value) => Ok(value),
            ApiResponse::Empty => Ok(Value::Null),
            other => Err(Error::protocol(format!(
                "expected a JSON body, got {}",
                other.kind_name()
            ))),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            ApiResponse::Rows(_) => "a row list",
            ApiResponse::Row(_) => "a single row",
            ApiResponse::Json(_) => "raw JSON",
            ApiResponse::Xml(_) => "XML",
            ApiResponse::Bytes(_) => "binary data",
            ApiResponse::Empty => "an empty response",
        }
    }
}

/// Column projection entry for [`ServiceNowClient::get_records`].
#[derive(Debug, Clone)]
pub enum ColumnSelect {
    Name(String),
    /// Fetch `from`, return it as `to`.
    Renamed { from: String, to: String },
}

impl ColumnSelect {
    fn from_name(&self) -> &str {
        match self {
            ColumnSelect::Name(name) => name,
            ColumnSelect::Renamed { from, .. } => from,
        }
    }
}

impl From<&str> for ColumnSelect {
    fn from(name: &str) -> Self {
        ColumnSelect::Name(name.to_string())
    }
}

/// Options for [`ServiceNowClient::get_records`].
#[derive(Debug, Clone, Default)]
pub struct GetRecordsOptions {
    /// Columns to project; empty fetches everything.
    pub columns: Vec<ColumnSelect>,
    /// Encoded query filter (`sysparm_query`).
    pub query: Option<String>,
    /// Stop after this many rows.
    pub max_records: Option<usize>,
    /// Page size override; defaults to 500.
    pub page_size: Option<usize>,
    /// Opt into the record cache with this human-readable TTL (`"3d"`).
    pub cache_ttl: Option<String>,
}

impl GetRecordsOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_column(mut self, name: impl Into<String>) -> Self {
        self.columns.push(ColumnSelect::Name(name.into()));
        self
    }

    #[must_use]
    pub fn with_renamed_column(
        mut self,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.columns.push(ColumnSelect::Renamed {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    #[must_use]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    #[must_use]
    pub fn with_max_records(mut self, max: usize) -> Self {
        self.max_records = Some(max);
        self
    }

    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: impl Into<String>) -> Self {
        self.cache_ttl = Some(ttl.into());
        self
    }
}

/// Outcome counters for an import-set insertion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub ignored: usize,
}

struct Inner {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    limiter: ReadWriteLimiter,
    schemas: SchemaCache,
    acting_user: OnceCell<ActingUser>,
    record_cache: Option<Arc<dyn RecordCache>>,
}

/// Client for one instance. Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct ServiceNowClient {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ServiceNowClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceNowClient")
            .field("config", &self.inner.config)
            .finish()
    }
}

impl ServiceNowClient {
    /// Build a client over the production HTTP transport.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        if config.is_demo() {
            return Err(Error::configuration(
                "the demo instance needs a scripted transport; use with_transport",
            ));
        }
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self::build(config, transport))
    }

    /// Build a client over a caller-supplied transport (scripted demo
    /// transports, test doubles).
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, transport))
    }

    fn build(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let limiter = ReadWriteLimiter::new(config.read_concurrency, config.write_concurrency);
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                limiter,
                schemas: SchemaCache::new(SCHEMA_TTL),
                acting_user: OnceCell::new(),
                record_cache: None,
            }),
        }
    }

    /// Attach a record cache. Only queries that opt in via
    /// [`GetRecordsOptions::cache_ttl`] use it.
    #[must_use]
    pub fn with_record_cache(mut self, cache: Arc<dyn RecordCache>) -> Self {
        let inner = Arc::get_mut(&mut self.inner)
            .expect("attach the record cache before cloning the client");
        inner.record_cache = Some(cache);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Live in-flight request counts `(read, write)`.
    #[must_use]
    pub fn in_flight(&self) -> (usize, usize) {
        self.inner.limiter.in_flight()
    }

    // ── gateway ──────────────────────────────────────────────────────────

    /// Execute one API request.
    pub async fn request(&self, request: ApiRequest) -> Result<ApiResponse> {
        let (api, prepared) = self.prepare(&request)?;
        let payload = self.execute_limited(prepared).await?;

        match payload {
            Payload::Empty => Ok(ApiResponse::Empty),
            Payload::Bytes(bytes) => Ok(ApiResponse::Bytes(bytes)),
            Payload::Xml(text) => Ok(ApiResponse::Xml(text)),
            Payload::Json(body) => {
                raise_embedded_error(&body)?;

                if request.method == Method::Get {
                    if let ApiPath::Table { table, sys_id, .. } = &api {
                        return self.coerce_table_read(table, sys_id.is_none(), body).await;
                    }
                }
                Ok(ApiResponse::Json(body))
            }
        }
    }

    fn prepare(&self, request: &ApiRequest) -> Result<(ApiPath, PreparedRequest)> {
        let api = ApiPath::parse(&request.path)?;

        if request.method.is_write() {
            if self.inner.config.read_only {
                return Err(Error::ReadOnly {
                    method: request.method.to_string(),
                    url: request.path.clone(),
                });
            }
            if let ApiPath::Schema { .. } = api {
                return Err(Error::validation("the schema endpoint is read-only"));
            }
        }

        // table-API PUT/DELETE address exactly one record
        if let ApiPath::Table { sys_id: None, .. } = &api {
            if matches!(request.method, Method::Put | Method::Delete) {
                return Err(Error::validation(format!(
                    "{} on the table API requires a sys_id",
                    request.method
                )));
            }
        }

        let mut prepared = PreparedRequest::new(
            request.method,
            api.url(&self.inner.config.instance_url()),
        );
        prepared.query = request.query.clone();
        prepared.body = request.body.clone();

        // reads never follow reference links
        if request.method == Method::Get && matches!(api, ApiPath::Table { .. }) {
            prepared
                .query
                .push(("sysparm_exclude_reference_link".into(), "true".into()));
        }

        Ok((api, prepared))
    }

    async fn execute_limited(&self, prepared: PreparedRequest) -> Result<Payload> {
        let _guard = self
            .inner
            .limiter
            .acquire(prepared.method.direction())
            .await?;
        self.inner.transport.execute(prepared).await
    }

    async fn coerce_table_read(
        &self,
        table: &str,
        expect_list: bool,
        body: Value,
    ) -> Result<ApiResponse> {
        let result = body
            .get("result")
            .ok_or_else(|| Error::protocol(format!("table read of {table} returned no result")))?;

        let schema = ServiceNowClient::schema(self, table).await?;

        if expect_list {
            let rows = result.as_array().ok_or_else(|| {
                Error::protocol(format!(
                    "list query on {table} returned an object where an array was expected"
                ))
            })?;
            let wire = rows
                .iter()
                .map(|row| {
                    row.as_object().cloned().ok_or_else(|| {
                        Error::protocol(format!("non-object row in {table} result"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            let typed = coerce::decode_rows(&schema, self, &wire).await?;
            Ok(ApiResponse::Rows(typed))
        } else {
            let row = result.as_object().ok_or_else(|| {
                Error::protocol(format!("record read of {table} returned a non-object result"))
            })?;
            let typed = coerce::decode_row(&schema, self, row).await?;
            Ok(ApiResponse::Row(typed))
        }
    }

    // ── schemas ──────────────────────────────────────────────────────────

    /// The cached schema for `table`, fetching on a miss.
    pub async fn schema(&self, table: &str) -> Result<Arc<TableSchema>> {
        self.inner
            .schemas
            .get_or_fetch(table, || async {
                let path = ApiPath::Schema {
                    table: table.to_string(),
                };
                debug!(table, "fetching schema");
                let prepared = PreparedRequest::new(
                    Method::Get,
                    path.url(&self.inner.config.instance_url()),
                );
                let payload = self.execute_limited(prepared).await?;
                TableSchema::parse_xml(table, &payload.into_xml()?)
            })
            .await
    }

    /// Drop the cached schema for `table`.
    pub fn invalidate_schema(&self, table: &str) {
        self.inner.schemas.invalidate(table);
    }

    // ── convenience record operations ────────────────────────────────────

    /// Count rows matching `query` via the stats API.
    pub async fn count(&self, table: &str, query: Option<&str>) -> Result<u64> {
        let mut request =
            ApiRequest::get(format!("/v1/stats/{table}")).with_param("sysparm_count", "true");
        if let Some(query) = query {
            request = request.with_param("sysparm_query", query);
        }

        let body = self.request(request).await?.into_json()?;
        body.pointer("/result/stats/count")
            .and_then(|count| match count {
                Value::String(s) => s.parse::<u64>().ok(),
                Value::Number(n) => n.as_u64(),
                _ => None,
            })
            .ok_or_else(|| {
                Error::protocol(format!("stats response for {table} carried no count"))
            })
    }

    /// Read one record by sys_id, coerced through the table schema.
    pub async fn get_record(&self, table: &str, sys_id: &str) -> Result<TypedRow> {
        match self
            .request(ApiRequest::get(format!("/v2/table/{table}/{sys_id}")))
            .await?
        {
            ApiResponse::Row(row) => Ok(row),
            other => Err(Error::protocol(format!(
                "record read of {table} returned {}",
                other.kind_name()
            ))),
        }
    }

    /// Download an attachment's bytes.
    pub async fn download_attachment(&self, sys_id: &str) -> Result<Vec<u8>> {
        match self
            .request(ApiRequest::get(format!("/v1/attachment/{sys_id}/file")))
            .await?
        {
            ApiResponse::Bytes(bytes) => Ok(bytes),
            other => Err(Error::protocol(format!(
                "attachment download returned {}",
                other.kind_name()
            ))),
        }
    }

    /// Create a record.
    pub async fn create_record(&self, table: &str, row: Value) -> Result<()> {
        self.request(ApiRequest::post(format!("/v2/table/{table}"), row))
            .await?;
        Ok(())
    }

    /// Update a record by sys_id.
    pub async fn update_record(&self, table: &str, sys_id: &str, patch: Value) -> Result<()> {
        self.request(ApiRequest::put(
            format!("/v2/table/{table}/{sys_id}"),
            patch,
        ))
        .await?;
        Ok(())
    }

    /// Delete a record by sys_id.
    pub async fn delete_record(&self, table: &str, sys_id: &str) -> Result<()> {
        self.request(ApiRequest::delete(format!("/v2/table/{table}/{sys_id}")))
            .await?;
        Ok(())
    }

    /// Insert one staged row through the import API.
    ///
    /// Transform rows whose error message begins with "Row transform
    /// ignored" count as ignored rather than failing the call.
    pub async fn import_row(&self, staging_table: &str, row: Value) -> Result<ImportOutcome> {
        let response = self
            .request(ApiRequest::post(format!("/v1/import/{staging_table}"), row))
            .await?;

        let body = match response {
            ApiResponse::Empty => return Ok(ImportOutcome::default()),
            other => other.into_json()?,
        };

        let results = body
            .get("result")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                Error::protocol(format!(
                    "import into {staging_table} returned no result array"
                ))
            })?;

        let mut outcome = ImportOutcome::default();
        for entry in results {
            let status = entry.get("status").and_then(Value::as_str).unwrap_or("");
            match status {
                "inserted" => outcome.inserted += 1,
                "updated" => outcome.updated += 1,
                "ignored" => outcome.ignored += 1,
                "error" => {
                    let message = entry
                        .get("error_message")
                        .or_else(|| entry.get("status_message"))
                        .and_then(Value::as_str)
                        .unwrap_or("unknown import error");
                    if message.starts_with("Row transform ignored") {
                        warn!(staging_table, message, "import row ignored by transform");
                        outcome.ignored += 1;
                    } else {
                        return Err(Error::operational(format!(
                            "import into {staging_table} failed: {message}"
                        )));
                    }
                }
                other => {
                    return Err(Error::protocol(format!(
                        "import into {staging_table} returned unknown status '{other}'"
                    )))
                }
            }
        }
        Ok(outcome)
    }

    /// The authenticated user, fetched once and cached for the client's
    /// lifetime.
    pub async fn acting_user(&self) -> Result<ActingUser> {
        self.inner
            .acting_user
            .get_or_try_init(|| async {
                let username = self.inner.config.username.clone();
                let rows = self
                    .fetch_table_page(
                        "sys_user",
                        Some(&format!("user_name={username}")),
                        &["sys_id".to_string(), "user_name".to_string()],
                        0,
                        1,
                    )
                    .await?;
                let row = rows.first().ok_or_else(|| {
                    Error::operational(format!("user {username} not found on the instance"))
                })?;
                let field = |name: &str| {
                    row.get(name)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                Ok::<_, Error>(ActingUser {
                    sys_id: field("sys_id"),
                    user_name: field("user_name"),
                })
            })
            .await
            .map(ActingUser::clone)
    }

    // ── bulk reads ───────────────────────────────────────────────────────

    /// Read a row set with projection, renames, optional caching, and
    /// adaptive parallel pagination.
    pub async fn get_records(
        &self,
        table: &str,
        options: GetRecordsOptions,
    ) -> Result<Vec<TypedRow>> {
        let query = options.query.as_deref();
        let total = self.count(table, query).await?;
        if total > MAX_QUERY_ROWS {
            return Err(Error::Quota {
                table: table.to_string(),
                count: total,
                limit: MAX_QUERY_ROWS,
            });
        }

        let fields: Vec<String> = options
            .columns
            .iter()
            .map(|c| c.from_name().to_string())
            .collect();
        let renames: Vec<(String, String)> = options
            .columns
            .iter()
            .filter_map(|c| match c {
                ColumnSelect::Renamed { from, to } => Some((from.clone(), to.clone())),
                ColumnSelect::Name(_) => None,
            })
            .collect();

        let limit = options
            .max_records
            .map_or(total as usize, |max| max.min(total as usize));

        let cache = match (&options.cache_ttl, &self.inner.record_cache) {
            (Some(ttl), Some(cache)) => Some((parse_ttl(ttl)?, cache.clone())),
            _ => None,
        };
        let cache_key = format!(
            "{}/{}?q={}&f={}&n={}",
            self.inner.config.instance,
            table,
            query.unwrap_or_default(),
            fields.join(","),
            limit,
        );

        if let Some((ttl, store)) = &cache {
            if let Some(wire) = self.usable_cached_rows(store.as_ref(), &cache_key, *ttl, table, query).await? {
                debug!(table, rows = wire.len(), "serving rows from the record cache");
                let schema = ServiceNowClient::schema(self, table).await?;
                let mut rows = coerce::decode_rows(&schema, self, &wire).await?;
                apply_renames(&mut rows, &renames);
                return Ok(rows);
            }
        }

        // page plan: fixed-size windows over the counted total
        let page_size = options.page_size.unwrap_or(DEFAULT_PAGE_SIZE).max(1);
        let mut pages = Vec::new();
        let mut offset = 0usize;
        while offset < limit {
            pages.push((offset, page_size.min(limit - offset)));
            offset += page_size;
        }

        let wire_pages: Vec<Vec<Map<String, Value>>> = stream::iter(pages)
            .map(|(offset, size)| self.fetch_table_page(table, query, &fields, offset, size))
            .buffered(PAGE_CONCURRENCY)
            .try_collect()
            .await?;
        let wire: Vec<Map<String, Value>> = wire_pages.into_iter().flatten().collect();

        if let Some((_, store)) = &cache {
            let cached: Vec<Value> = wire.iter().cloned().map(Value::Object).collect();
            store.put(&cache_key, Value::Array(cached)).await;
        }

        let schema = ServiceNowClient::schema(self, table).await?;
        let mut rows = coerce::decode_rows(&schema, self, &wire).await?;
        apply_renames(&mut rows, &renames);

        info!(table, rows = rows.len(), "record read complete");
        Ok(rows)
    }

    /// Fetch one page of wire rows, uncoerced.
    async fn fetch_table_page(
        &self,
        table: &str,
        query: Option<&str>,
        fields: &[String],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Map<String, Value>>> {
        let mut request = ApiRequest::get(format!("/v2/table/{table}"))
            .with_param("sysparm_limit", limit.to_string())
            .with_param("sysparm_offset", offset.to_string());
        if let Some(query) = query {
            request = request.with_param("sysparm_query", query);
        }
        if !fields.is_empty() {
            request = request.with_param("sysparm_fields", fields.join(","));
        }

        let (_, prepared) = self.prepare(&request)?;
        let body = self.execute_limited(prepared).await?.into_json()?;
        raise_embedded_error(&body)?;

        let rows = body
            .get("result")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                Error::protocol(format!(
                    "list query on {table} returned an object where an array was expected"
                ))
            })?;

        rows.iter()
            .map(|row| {
                row.as_object()
                    .cloned()
                    .ok_or_else(|| Error::protocol(format!("non-object row in {table} result")))
            })
            .collect()
    }

    /// Check whether a cached result is still current: no remote rows
    /// modified after the cache mtime, and the count up to the mtime equals
    /// the cached length.
    async fn usable_cached_rows(
        &self,
        store: &dyn RecordCache,
        key: &str,
        ttl: std::time::Duration,
        table: &str,
        query: Option<&str>,
    ) -> Result<Option<Vec<Map<String, Value>>>> {
        let Some(cached) = store.get(key, ttl).await else {
            return Ok(None);
        };
        let Some(mtime) = store.mtime(key).await else {
            return Ok(None);
        };
        let Some(rows) = cached.as_array() else {
            return Ok(None);
        };

        if !self.rows_unchanged_since(table, query, mtime, rows.len()).await? {
            debug!(table, "record cache is stale, refetching");
            return Ok(None);
        }

        let wire = rows
            .iter()
            .filter_map(|row| row.as_object().cloned())
            .collect();
        Ok(Some(wire))
    }

    async fn rows_unchanged_since(
        &self,
        table: &str,
        query: Option<&str>,
        mtime: DateTime<Utc>,
        cached_len: usize,
    ) -> Result<bool> {
        let stamp = mtime.format("%Y-%m-%d %H:%M:%S").to_string();
        let prefix = query.map_or_else(String::new, |q| format!("{q}^"));

        let newer = self
            .count(table, Some(&format!("{prefix}sys_updated_on>={stamp}")))
            .await?;
        if newer != 0 {
            return Ok(false);
        }

        let up_to = self
            .count(table, Some(&format!("{prefix}sys_updated_on<={stamp}")))
            .await?;
        Ok(up_to as usize == cached_len)
    }
}

impl SchemaSource for ServiceNowClient {
    fn schema<'a>(&'a self, table: &'a str) -> BoxFuture<'a, Result<Arc<TableSchema>>> {
        Box::pin(ServiceNowClient::schema(self, table))
    }
}

/// Surface a nested `{error:{message,detail}}` member as an error.
fn raise_embedded_error(body: &Value) -> Result<()> {
    if let Some(error) = body.get("error") {
        let message = error.get("message").and_then(Value::as_str).unwrap_or("");
        let detail = error.get("detail").and_then(Value::as_str).unwrap_or("");
        if !message.is_empty() || !detail.is_empty() {
            return Err(Error::protocol(format!("{message}: {detail}")));
        }
    }
    Ok(())
}

/// Apply `{from → to}` renames, walking dotted paths into nested records.
fn apply_renames(rows: &mut [TypedRow], renames: &[(String, String)]) {
    if renames.is_empty() {
        return;
    }
    for row in rows.iter_mut() {
        for (from, to) in renames {
            if let Some(value) = extract_path(row, from) {
                row.insert(to.clone(), value);
            }
        }
    }
}

/// Remove and return the value at a possibly-dotted path, pruning emptied
/// nested records on the way out.
fn extract_path(row: &mut TypedRow, path: &str) -> Option<FieldValue> {
    match path.split_once('.') {
        None => row.remove(path),
        Some((head, rest)) => {
            let FieldValue::Record(nested) = row.get_mut(head)? else {
                return None;
            };
            let value = extract_path(nested, rest);
            if nested.is_empty() {
                row.remove(head);
            }
            value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rename_extraction_walks_dots() {
        let mut nested = TypedRow::new();
        nested.insert("u_name".into(), FieldValue::Str("alice".into()));
        let mut row = TypedRow::new();
        row.insert("u_owner".into(), FieldValue::Record(nested));
        row.insert("u_count".into(), FieldValue::Int(2));

        let renames = vec![("u_owner.u_name".to_string(), "owner_name".to_string())];
        let mut rows = vec![row];
        apply_renames(&mut rows, &renames);

        let row = &rows[0];
        assert_eq!(row.get("owner_name"), Some(&FieldValue::Str("alice".into())));
        // the emptied nested record is pruned
        assert!(!row.contains_key("u_owner"));
        assert_eq!(row.get("u_count"), Some(&FieldValue::Int(2)));
    }

    #[test]
    fn embedded_errors_are_raised() {
        let body = serde_json::json!({"error": {"message": "No such record", "detail": "gone"}});
        let err = raise_embedded_error(&body).unwrap_err();
        assert!(err.to_string().contains("No such record"));
        assert!(err.to_string().contains("gone"));

        assert!(raise_embedded_error(&serde_json::json!({"result": []})).is_ok());
    }

    #[test]
    fn column_select_names() {
        assert_eq!(ColumnSelect::from("u_name").from_name(), "u_name");
        assert_eq!(
            ColumnSelect::Renamed {
                from: "u_owner.u_name".into(),
                to: "owner".into()
            }
            .from_name(),
            "u_owner.u_name"
        );
    }
}
