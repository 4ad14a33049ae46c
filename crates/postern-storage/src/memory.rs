use std::collections::HashSet;

use async_trait::async_trait;
use dashmap::DashMap;
use postern_core::{DeleteRequest, Result, Store, StoreError, UrlRecord};

/// In-memory implementation of the `Store` contract using DashMap.
///
/// Sharded locks let deletion-pipeline workers flip records concurrently
/// without an outer mutex. Nothing is persisted; the store lives and
/// dies with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Every record ever inserted, keyed by short code. Soft-deleted
    /// records stay here until a fresh insert re-derives the same code.
    by_short: DashMap<String, UrlRecord>,
    /// Live records only: original URL -> short code.
    by_original: DashMap<String, String>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn check_unique(&self, record: &UrlRecord) -> Result<()> {
        if self.by_original.contains_key(&record.original) {
            return Err(StoreError::AlreadyExists(record.original.clone()));
        }
        if self
            .by_short
            .get(&record.short)
            .is_some_and(|existing| existing.is_live())
        {
            return Err(StoreError::AlreadyExists(record.short.clone()));
        }
        Ok(())
    }

    fn insert_unchecked(&self, record: UrlRecord) {
        self.by_original
            .insert(record.original.clone(), record.short.clone());
        self.by_short.insert(record.short.clone(), record);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<()> {
        Err(StoreError::Unsupported(
            "memory store has no backend to probe".into(),
        ))
    }

    async fn insert_one(&self, record: UrlRecord) -> Result<()> {
        self.check_unique(&record)?;
        self.insert_unchecked(record);
        Ok(())
    }

    async fn insert_batch(&self, records: Vec<UrlRecord>) -> Result<()> {
        // validate the whole call first so a conflicting row leaves
        // nothing visible
        let mut originals = HashSet::new();
        let mut shorts = HashSet::new();
        for record in &records {
            self.check_unique(record)?;
            if !originals.insert(record.original.as_str()) || !shorts.insert(record.short.as_str())
            {
                return Err(StoreError::AlreadyExists(record.original.clone()));
            }
        }
        for record in records {
            self.insert_unchecked(record);
        }
        Ok(())
    }

    async fn select_original(&self, short: &str) -> Result<String> {
        let Some(record) = self.by_short.get(short) else {
            return Err(StoreError::NotExist(short.to_string()));
        };
        if record.deleted {
            return Err(StoreError::AlreadyDeleted(short.to_string()));
        }
        Ok(record.original.clone())
    }

    async fn select_short(&self, original: &str) -> Result<String> {
        self.by_original
            .get(original)
            .map(|short| short.value().clone())
            .ok_or_else(|| StoreError::NotExist(original.to_string()))
    }

    async fn select_all(&self, owner: &str) -> Result<Vec<UrlRecord>> {
        Ok(self
            .by_short
            .iter()
            .filter(|entry| entry.owner == owner && entry.is_live())
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn delete_batch(&self, requests: &[DeleteRequest]) -> Result<()> {
        if requests.is_empty() {
            return Err(StoreError::NoData("empty delete batch".into()));
        }
        for request in requests {
            if let Some(mut entry) = self.by_short.get_mut(&request.short) {
                if entry.is_live() && entry.owner == request.owner {
                    entry.deleted = true;
                    self.by_original.remove(&entry.original);
                }
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn record(owner: &str, original: &str, short: &str) -> UrlRecord {
        UrlRecord::new(owner, original, short)
    }

    #[tokio::test]
    async fn insert_and_select() {
        let store = MemoryStore::new();

        store
            .insert_one(record("u1", "https://example.com/a", "abc12345"))
            .await
            .unwrap();

        assert_eq!(
            store.select_original("abc12345").await.unwrap(),
            "https://example.com/a"
        );
        assert_eq!(
            store.select_short("https://example.com/a").await.unwrap(),
            "abc12345"
        );
    }

    #[tokio::test]
    async fn duplicate_original_rejected() {
        let store = MemoryStore::new();

        store
            .insert_one(record("u1", "https://example.com/a", "abc12345"))
            .await
            .unwrap();

        let err = store
            .insert_one(record("u2", "https://example.com/a", "zzz99999"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));

        // only one live record for the URL exists afterwards
        assert_eq!(store.select_all("u1").await.unwrap().len(), 1);
        assert!(store.select_all("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_short_rejected() {
        let store = MemoryStore::new();

        store
            .insert_one(record("u1", "https://example.com/a", "abc12345"))
            .await
            .unwrap();

        let err = store
            .insert_one(record("u1", "https://example.com/b", "abc12345"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn batch_conflict_leaves_nothing_visible() {
        let store = MemoryStore::new();

        store
            .insert_one(record("u1", "https://example.com/a", "abc12345"))
            .await
            .unwrap();

        let err = store
            .insert_batch(vec![
                record("u1", "https://example.com/b", "bbb11111"),
                record("u1", "https://example.com/a", "abc12345"),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));

        let err = store.select_short("https://example.com/b").await.unwrap_err();
        assert!(matches!(err, StoreError::NotExist(_)));
    }

    #[tokio::test]
    async fn batch_rejects_internal_duplicates() {
        let store = MemoryStore::new();

        let err = store
            .insert_batch(vec![
                record("u1", "https://example.com/a", "abc12345"),
                record("u1", "https://example.com/a", "abc12345"),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
        assert!(store.select_all("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_flips_flag_and_frees_original() {
        let store = MemoryStore::new();

        store
            .insert_one(record("u1", "https://example.com/a", "abc12345"))
            .await
            .unwrap();
        store
            .delete_batch(&[DeleteRequest::new("abc12345", "u1")])
            .await
            .unwrap();

        let err = store.select_original("abc12345").await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyDeleted(_)));
        let err = store.select_short("https://example.com/a").await.unwrap_err();
        assert!(matches!(err, StoreError::NotExist(_)));

        // the original is free again for a fresh live record
        store
            .insert_one(record("u1", "https://example.com/a", "abc12345"))
            .await
            .unwrap();
        assert_eq!(
            store.select_original("abc12345").await.unwrap(),
            "https://example.com/a"
        );
    }

    #[tokio::test]
    async fn delete_skips_foreign_and_unknown_pairs() {
        let store = MemoryStore::new();

        store
            .insert_one(record("u1", "https://example.com/a", "abc12345"))
            .await
            .unwrap();

        store
            .delete_batch(&[
                DeleteRequest::new("abc12345", "someone-else"),
                DeleteRequest::new("missing0", "u1"),
            ])
            .await
            .unwrap();

        // the record survived both non-matching pairs
        assert_eq!(store.select_all("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_delete_batch_rejected() {
        let store = MemoryStore::new();

        let err = store.delete_batch(&[]).await.unwrap_err();
        assert!(matches!(err, StoreError::NoData(_)));
    }

    #[tokio::test]
    async fn ping_is_unsupported() {
        let store = MemoryStore::new();

        let err = store.ping().await.unwrap_err();
        assert!(matches!(err, StoreError::Unsupported(_)));
    }

    #[tokio::test]
    async fn concurrent_deletes() {
        let store = Arc::new(MemoryStore::new());

        for i in 0..100u32 {
            store
                .insert_one(record(
                    "u1",
                    &format!("https://example.com/{i}"),
                    &format!("code{i:04}"),
                ))
                .await
                .unwrap();
        }

        let mut handles = vec![];
        for w in 0..4u32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let requests: Vec<_> = (0..100)
                    .filter(|i| i % 4 == w)
                    .map(|i| DeleteRequest::new(format!("code{i:04}"), "u1"))
                    .collect();
                store.delete_batch(&requests).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert!(store.select_all("u1").await.unwrap().is_empty());
    }
}
