use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use postern_core::{DeleteRequest, Result, Store, StoreError, UrlRecord};
use tokio::sync::Mutex;
use tracing::info;

/// Append-only file-backed implementation of the `Store` contract.
///
/// Every insert appends one JSON object per line and syncs the file
/// before the call reports success; opening a journal replays the log
/// sequentially until EOF to rebuild the in-memory index. Deletes flip
/// index entries only and are never appended, so the log is the insert
/// history and the index carries the live view.
///
/// Deletion-pipeline workers call [`delete_batch`](Store::delete_batch)
/// concurrently, so the whole inner state sits behind one async mutex.
#[derive(Debug)]
pub struct JournalStore {
    inner: Mutex<JournalInner>,
    path: PathBuf,
}

#[derive(Debug)]
struct JournalInner {
    file: File,
    /// Every replayed or appended record, keyed by short code.
    by_short: HashMap<String, UrlRecord>,
    /// Live records only: original URL -> short code.
    by_original: HashMap<String, String>,
}

fn map_io_error(err: std::io::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

impl JournalStore {
    /// Opens (or creates) the journal at `path` and replays it into the
    /// in-memory index.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .map_err(map_io_error)?;

        let mut by_short: HashMap<String, UrlRecord> = HashMap::new();
        let mut by_original: HashMap<String, String> = HashMap::new();

        let reader = BufReader::new(file.try_clone().map_err(map_io_error)?);
        for (number, line) in reader.lines().enumerate() {
            let line = line.map_err(map_io_error)?;
            if line.is_empty() {
                continue;
            }
            let record: UrlRecord = serde_json::from_str(&line).map_err(|e| {
                StoreError::InvalidData(format!("journal line {}: {}", number + 1, e))
            })?;
            // a later entry with the same short supersedes the earlier one
            if let Some(previous) = by_short.insert(record.short.clone(), record.clone()) {
                by_original.remove(&previous.original);
            }
            if record.is_live() {
                by_original.insert(record.original.clone(), record.short.clone());
            }
        }

        info!(path = %path.display(), records = by_short.len(), "journal replayed");

        Ok(Self {
            inner: Mutex::new(JournalInner {
                file,
                by_short,
                by_original,
            }),
            path,
        })
    }

    /// The journal's file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl JournalInner {
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

    /// Appends one line and updates the index. The write reaches the
    /// file before the index changes; the caller syncs at the end of the
    /// store call.
    fn append(&mut self, record: UrlRecord) -> Result<()> {
        let mut line = serde_json::to_string(&record)
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        line.push('\n');
        self.file
            .write_all(line.as_bytes())
            .map_err(map_io_error)?;

        self.by_original
            .insert(record.original.clone(), record.short.clone());
        self.by_short.insert(record.short.clone(), record);
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.file.sync_all().map_err(map_io_error)
    }
}

#[async_trait]
impl Store for JournalStore {
    async fn ping(&self) -> Result<()> {
        Err(StoreError::Unsupported(
            "journal store has no backend to probe".into(),
        ))
    }

    async fn insert_one(&self, record: UrlRecord) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.check_unique(&record)?;
        inner.append(record)?;
        inner.sync()
    }

    async fn insert_batch(&self, records: Vec<UrlRecord>) -> Result<()> {
        // ordered sequential appends; a failing row leaves the log
        // truncated at the last durable record and the call fails
        let mut inner = self.inner.lock().await;
        for record in records {
            inner.check_unique(&record)?;
            inner.append(record)?;
        }
        inner.sync()
    }

    async fn select_original(&self, short: &str) -> Result<String> {
        let inner = self.inner.lock().await;
        let Some(record) = inner.by_short.get(short) else {
            return Err(StoreError::NotExist(short.to_string()));
        };
        if record.deleted {
            return Err(StoreError::AlreadyDeleted(short.to_string()));
        }
        Ok(record.original.clone())
    }

    async fn select_short(&self, original: &str) -> Result<String> {
        let inner = self.inner.lock().await;
        inner
            .by_original
            .get(original)
            .cloned()
            .ok_or_else(|| StoreError::NotExist(original.to_string()))
    }

    async fn select_all(&self, owner: &str) -> Result<Vec<UrlRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .by_short
            .values()
            .filter(|record| record.owner == owner && record.is_live())
            .cloned()
            .collect())
    }

    async fn delete_batch(&self, requests: &[DeleteRequest]) -> Result<()> {
        if requests.is_empty() {
            return Err(StoreError::NoData("empty delete batch".into()));
        }
        let mut inner = self.inner.lock().await;
        for request in requests {
            let Some(record) = inner.by_short.get_mut(&request.short) else {
                continue;
            };
            if record.is_live() && record.owner == request.owner {
                record.deleted = true;
                let original = record.original.clone();
                inner.by_original.remove(&original);
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let inner = self.inner.lock().await;
        inner.sync()
    }
}
