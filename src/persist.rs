//! Duplicate-aware persistence: look up the natural key, then insert,
//! update, or skip. Store races are resolved by the store's own uniqueness
//! constraint, never by an application-level lock.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::listing::ListingCandidate;
use crate::store::{TableStore, LISTINGS_TABLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Created,
    Updated,
    Duplicate,
    Error,
}

pub struct Persister {
    store: Arc<dyn TableStore>,
}

impl Persister {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Persister { store }
    }

    pub async fn persist(&self, candidate: &ListingCandidate) -> PersistOutcome {
        let existing = match self.find_existing(candidate).await {
            Ok(row) => row,
            Err(e) => {
                warn!(listing = %candidate.name, error = %e, "dedup lookup failed");
                return PersistOutcome::Error;
            }
        };

        match existing {
            Some(row) => self.update_or_skip(candidate, &row).await,
            None => self.insert(candidate).await,
        }
    }

    async fn find_existing(
        &self,
        candidate: &ListingCandidate,
    ) -> Result<Option<Value>, StoreError> {
        if let Some(url) = candidate.original_url.as_deref().filter(|u| !u.is_empty()) {
            let rows = self
                .store
                .select(LISTINGS_TABLE, &[("original_url", url)], 1)
                .await?;
            if let Some(row) = rows.into_iter().next() {
                return Ok(Some(row));
            }
        }

        let (name, source) = candidate.name_source_key();
        let rows = self
            .store
            .select(LISTINGS_TABLE, &[("name", name), ("source", source)], 1)
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, candidate: &ListingCandidate) -> PersistOutcome {
        let row = match serde_json::to_value(candidate) {
            Ok(v) => v,
            Err(e) => {
                warn!(listing = %candidate.name, error = %e, "row serialization failed");
                return PersistOutcome::Error;
            }
        };

        match self.store.insert(LISTINGS_TABLE, row).await {
            Ok(_) => {
                info!(listing = %candidate.name, source = %candidate.source, "saved listing");
                PersistOutcome::Created
            }
            // Lost a race to an identical row. Idempotent, not an error.
            Err(StoreError::Conflict(_)) => PersistOutcome::Duplicate,
            Err(e) => {
                warn!(listing = %candidate.name, error = %e, "insert failed");
                PersistOutcome::Error
            }
        }
    }

    async fn update_or_skip(&self, candidate: &ListingCandidate, stored: &Value) -> PersistOutcome {
        if !carries_more_information(candidate, stored) {
            return PersistOutcome::Duplicate;
        }

        let id = match row_id(stored) {
            Some(id) => id,
            None => {
                warn!(listing = %candidate.name, "stored row has no id, cannot update");
                return PersistOutcome::Error;
            }
        };

        let patch = match serde_json::to_value(candidate) {
            Ok(v) => v,
            Err(e) => {
                warn!(listing = %candidate.name, error = %e, "row serialization failed");
                return PersistOutcome::Error;
            }
        };

        match self.store.update(LISTINGS_TABLE, &id, patch).await {
            Ok(()) => {
                info!(listing = %candidate.name, "updated listing with richer data");
                PersistOutcome::Updated
            }
            Err(e) => {
                warn!(listing = %candidate.name, error = %e, "update failed");
                PersistOutcome::Error
            }
        }
    }
}

/// A candidate beats the stored row only when it is materially richer:
/// a longer description, or a price where the stored row has none.
fn carries_more_information(candidate: &ListingCandidate, stored: &Value) -> bool {
    let stored_desc_len = stored
        .get("description")
        .and_then(Value::as_str)
        .map_or(0, str::len);
    let candidate_desc_len = candidate.description.as_deref().map_or(0, str::len);
    if candidate_desc_len > stored_desc_len {
        return true;
    }

    let stored_price = stored.get("asking_price").and_then(Value::as_i64).unwrap_or(0);
    candidate.asking_price > 0 && stored_price == 0
}

fn row_id(row: &Value) -> Option<String> {
    match row.get("id")? {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn candidate(name: &str, url: Option<&str>) -> ListingCandidate {
        let mut c = ListingCandidate::new(name, "quietlight");
        c.original_url = url.map(String::from);
        c.asking_price = 450_000;
        c
    }

    #[tokio::test]
    async fn second_persist_is_duplicate() {
        let persister = Persister::new(Arc::new(MemoryStore::new()));
        let c = candidate("Amazon FBA brand for sale", Some("https://quietlight.com/listings/1"));

        assert_eq!(persister.persist(&c).await, PersistOutcome::Created);
        assert_eq!(persister.persist(&c).await, PersistOutcome::Duplicate);
    }

    #[tokio::test]
    async fn richer_candidate_updates() {
        let store = Arc::new(MemoryStore::new());
        let persister = Persister::new(store.clone());

        let bare = candidate("Content site portfolio", Some("https://quietlight.com/listings/2"));
        assert_eq!(persister.persist(&bare).await, PersistOutcome::Created);

        let mut richer = bare.clone();
        richer.set_description("A long description with traffic, financials and growth levers.");
        assert_eq!(persister.persist(&richer).await, PersistOutcome::Updated);

        // Re-persisting the richer record is a plain duplicate.
        assert_eq!(persister.persist(&richer).await, PersistOutcome::Duplicate);
    }

    #[tokio::test]
    async fn name_source_key_used_without_url() {
        let persister = Persister::new(Arc::new(MemoryStore::new()));
        let c = candidate("Regional HVAC service route", None);

        assert_eq!(persister.persist(&c).await, PersistOutcome::Created);
        assert_eq!(persister.persist(&c).await, PersistOutcome::Duplicate);
    }
}
