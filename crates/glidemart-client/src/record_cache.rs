//! Record cache interface.
//!
//! Query results can optionally be served from a persistent cache the
//! caller supplies. The cache is an opaque key→value store with a
//! modification time per key; the client decides freshness by comparing
//! remote modification counts against that mtime (see
//! [`ServiceNowClient::get_records`](crate::ServiceNowClient::get_records)).
//!
//! Cached values hold wire rows; decoding on load re-hydrates dates and
//! numbers from their string form.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{Error, Result};

/// Pluggable store for cached query results.
#[async_trait]
pub trait RecordCache: Send + Sync {
    /// Fetch a value no older than `ttl`, if present.
    async fn get(&self, key: &str, ttl: Duration) -> Option<Value>;

    /// Store a value under `key`, stamping its mtime.
    async fn put(&self, key: &str, value: Value);

    /// Wall-clock time the key was last written.
    async fn mtime(&self, key: &str) -> Option<DateTime<Utc>>;
}

/// Parse a human-readable TTL like `"1s"` or `"3d"`.
pub fn parse_ttl(ttl: &str) -> Result<Duration> {
    humantime::parse_duration(ttl)
        .map_err(|e| Error::configuration(format!("invalid cache TTL '{ttl}': {e}")))
}

/// Process-local cache, mainly for tests and short-lived tools.
#[derive(Default)]
pub struct InMemoryRecordCache {
    entries: Mutex<HashMap<String, (Value, DateTime<Utc>)>>,
}

impl InMemoryRecordCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordCache for InMemoryRecordCache {
    async fn get(&self, key: &str, ttl: Duration) -> Option<Value> {
        let entries = self.entries.lock().expect("record cache poisoned");
        let (value, written) = entries.get(key)?;
        let age = Utc::now().signed_duration_since(*written);
        if age.to_std().ok()? <= ttl {
            Some(value.clone())
        } else {
            None
        }
    }

    async fn put(&self, key: &str, value: Value) {
        self.entries
            .lock()
            .expect("record cache poisoned")
            .insert(key.to_string(), (value, Utc::now()));
    }

    async fn mtime(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries
            .lock()
            .expect("record cache poisoned")
            .get(key)
            .map(|(_, written)| *written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ttl_parsing() {
        assert_eq!(parse_ttl("1s").unwrap(), Duration::from_secs(1));
        assert_eq!(parse_ttl("3d").unwrap(), Duration::from_secs(3 * 24 * 3600));
        assert!(parse_ttl("sometime").is_err());
    }

    #[tokio::test]
    async fn memory_cache_round_trip() {
        let cache = InMemoryRecordCache::new();
        assert!(cache.get("k", Duration::from_secs(60)).await.is_none());
        assert!(cache.mtime("k").await.is_none());

        cache.put("k", json!([{"u_name": "n1"}])).await;
        assert_eq!(
            cache.get("k", Duration::from_secs(60)).await,
            Some(json!([{"u_name": "n1"}]))
        );
        assert!(cache.mtime("k").await.is_some());
    }

    #[tokio::test]
    async fn expired_entries_are_misses() {
        let cache = InMemoryRecordCache::new();
        cache.put("k", json!(1)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get("k", Duration::from_millis(1)).await.is_none());
    }
}
