//! External datastore access.
//!
//! The hosted store is a table-oriented REST service; the pipeline only
//! needs the narrow `select` / `insert` / `update` surface, so that is the
//! whole trait. `MemoryStore` backs dry runs and tests with the same
//! uniqueness semantics the hosted store enforces.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::error::StoreError;

pub const LISTINGS_TABLE: &str = "business_listings";

#[async_trait]
pub trait TableStore: Send + Sync {
    async fn select(
        &self,
        table: &str,
        filters: &[(&str, &str)],
        limit: usize,
    ) -> Result<Vec<Value>, StoreError>;

    /// Insert one row, returning it as stored (with generated id).
    async fn insert(&self, table: &str, row: Value) -> Result<Value, StoreError>;

    async fn update(&self, table: &str, id: &str, row: Value) -> Result<(), StoreError>;
}

// ── REST client ──

pub struct RestStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl RestStore {
    pub fn new(base_url: &str, api_key: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(RestStore {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn error_from(response: reqwest::Response) -> StoreError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        // Unique-key violations come back as 409 or as the store's
        // duplicate-key error code in the body.
        if status == 409 || body.contains("23505") || body.contains("duplicate key") {
            StoreError::Conflict(body)
        } else {
            StoreError::Api { status, body }
        }
    }
}

#[async_trait]
impl TableStore for RestStore {
    async fn select(
        &self,
        table: &str,
        filters: &[(&str, &str)],
        limit: usize,
    ) -> Result<Vec<Value>, StoreError> {
        let mut query: Vec<(String, String)> = filters
            .iter()
            .map(|(col, val)| (col.to_string(), format!("eq.{}", val)))
            .collect();
        query.push(("limit".to_string(), limit.to_string()));

        let response = self
            .authed(self.http.get(self.table_url(table)))
            .query(&query)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(response.json().await?)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, StoreError> {
        let response = self
            .authed(self.http.post(self.table_url(table)))
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        let mut rows: Vec<Value> = response.json().await?;
        if rows.is_empty() {
            return Err(StoreError::Api {
                status: 200,
                body: "insert returned no representation".to_string(),
            });
        }
        Ok(rows.remove(0))
    }

    async fn update(&self, table: &str, id: &str, row: Value) -> Result<(), StoreError> {
        let response = self
            .authed(self.http.patch(self.table_url(table)))
            .query(&[("id", format!("eq.{}", id))])
            .json(&row)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from(response).await);
        }
        Ok(())
    }
}

// ── In-memory store ──

/// Table store with the hosted store's uniqueness rules, for dry runs and
/// tests. Uniqueness: non-empty `original_url`, else (`name`, `source`).
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    next_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(|rows| rows.len())
            .unwrap_or(0)
    }

    fn field<'a>(row: &'a Value, key: &str) -> Option<&'a str> {
        row.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
    }

    fn conflicts(existing: &Value, incoming: &Value) -> bool {
        if let (Some(a), Some(b)) = (
            Self::field(existing, "original_url"),
            Self::field(incoming, "original_url"),
        ) {
            if a == b {
                return true;
            }
        }
        Self::field(existing, "name") == Self::field(incoming, "name")
            && Self::field(existing, "source") == Self::field(incoming, "source")
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn select(
        &self,
        table: &str,
        filters: &[(&str, &str)],
        limit: usize,
    ) -> Result<Vec<Value>, StoreError> {
        let tables = self.tables.lock().unwrap();
        let rows = match tables.get(table) {
            Some(rows) => rows,
            None => return Ok(Vec::new()),
        };

        let matched = rows
            .iter()
            .filter(|row| {
                filters.iter().all(|(col, val)| match row.get(*col) {
                    Some(Value::String(s)) => s.as_str() == *val,
                    Some(other) => other.to_string() == *val,
                    None => false,
                })
            })
            .take(limit)
            .cloned()
            .collect();
        Ok(matched)
    }

    async fn insert(&self, table: &str, mut row: Value) -> Result<Value, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_string()).or_default();

        if let Some(existing) = rows.iter().find(|r| Self::conflicts(r, &row)) {
            return Err(StoreError::Conflict(format!(
                "duplicate key: {}",
                Self::field(existing, "original_url")
                    .or_else(|| Self::field(existing, "name"))
                    .unwrap_or("?")
            )));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(obj) = row.as_object_mut() {
            obj.insert("id".to_string(), json!(id.to_string()));
            obj.insert("created_at".to_string(), json!(Utc::now().to_rfc3339()));
        }
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_string()).or_default();

        let row = rows
            .iter_mut()
            .find(|r| Self::field(r, "id") == Some(id))
            .ok_or_else(|| StoreError::Api {
                status: 404,
                body: format!("no row with id {}", id),
            })?;

        if let (Some(target), Some(source)) = (row.as_object_mut(), patch.as_object()) {
            for (k, v) in source {
                target.insert(k.clone(), v.clone());
            }
        }
        Ok(())
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, url: Option<&str>) -> Value {
        json!({
            "name": name,
            "source": "flippa",
            "original_url": url,
            "asking_price": 100_000,
        })
    }

    #[tokio::test]
    async fn memory_insert_assigns_id() {
        let store = MemoryStore::new();
        let stored = store
            .insert(LISTINGS_TABLE, row("Site A business", Some("https://a.example/1")))
            .await
            .unwrap();
        assert!(stored.get("id").is_some());
        assert!(stored.get("created_at").is_some());
        assert_eq!(store.row_count(LISTINGS_TABLE), 1);
    }

    #[tokio::test]
    async fn memory_conflict_on_url() {
        let store = MemoryStore::new();
        store
            .insert(LISTINGS_TABLE, row("Site A business", Some("https://a.example/1")))
            .await
            .unwrap();
        let second = store
            .insert(LISTINGS_TABLE, row("Renamed listing", Some("https://a.example/1")))
            .await;
        assert!(matches!(second, Err(StoreError::Conflict(_))));
        assert_eq!(store.row_count(LISTINGS_TABLE), 1);
    }

    #[tokio::test]
    async fn memory_conflict_on_name_source_without_url() {
        let store = MemoryStore::new();
        store.insert(LISTINGS_TABLE, row("Same name", None)).await.unwrap();
        let second = store.insert(LISTINGS_TABLE, row("Same name", None)).await;
        assert!(matches!(second, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn memory_select_filters_and_limits() {
        let store = MemoryStore::new();
        for i in 0..3 {
            store
                .insert(
                    LISTINGS_TABLE,
                    row(&format!("Listing number {}", i), Some(&format!("https://a.example/{}", i))),
                )
                .await
                .unwrap();
        }
        let hits = store
            .select(LISTINGS_TABLE, &[("original_url", "https://a.example/1")], 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0]["name"], "Listing number 1");

        let all = store.select(LISTINGS_TABLE, &[("source", "flippa")], 2).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn memory_update_merges_patch() {
        let store = MemoryStore::new();
        let stored = store
            .insert(LISTINGS_TABLE, row("Patchable listing", Some("https://a.example/9")))
            .await
            .unwrap();
        let id = stored["id"].as_str().unwrap().to_string();

        store
            .update(LISTINGS_TABLE, &id, json!({"description": "now longer"}))
            .await
            .unwrap();
        let hits = store.select(LISTINGS_TABLE, &[("id", id.as_str())], 1).await.unwrap();
        assert_eq!(hits[0]["description"], "now longer");
        assert_eq!(hits[0]["asking_price"], 100_000);
    }
}
