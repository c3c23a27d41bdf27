//! In-process document store.
//!
//! Keeps every collection as an insertion-ordered list of documents behind a lock and
//! enforces a unique `_id` per collection, so it behaves like the network store for the
//! operations the pipelines use.

use super::filter::{eval_filter, project, validate_filter};
use super::{DocumentCursor, DocumentStore, FindOptions, StoreCollection};
use crate::errors::StoreError;
use async_trait::async_trait;
use bson::Document;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

const DEFAULT_CURSOR_BATCH: usize = 101;

type Namespace = (String, String);

#[derive(Default)]
struct CallCounters {
    insert_calls: AtomicU64,
    delete_calls: AtomicU64,
    find_calls: AtomicU64,
    drop_calls: AtomicU64,
}

/// Point-in-time copy of how many calls each operation received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub insert_calls: u64,
    pub delete_calls: u64,
    pub find_calls: u64,
    pub drop_calls: u64,
}

#[derive(Clone)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<Namespace, Vec<Document>>>>,
    counters: Arc<CallCounters>,
    cursor_batch: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
            counters: Arc::new(CallCounters::default()),
            cursor_batch: DEFAULT_CURSOR_BATCH,
        }
    }

    /// Number of documents a cursor returns per batch when the caller does not choose.
    #[must_use]
    pub fn with_cursor_batch(mut self, size: usize) -> Self {
        self.cursor_batch = size.max(1);
        self
    }

    /// Insert documents directly, bypassing the call counters. Documents without `_id`
    /// are stored as given.
    pub fn seed(&self, database: &str, collection: &str, docs: impl IntoIterator<Item = Document>) {
        let mut cols = self.collections.write();
        cols.entry(ns(database, collection)).or_default().extend(docs);
    }

    /// Copy of the documents currently in a collection, in insertion order.
    pub fn documents(&self, database: &str, collection: &str) -> Vec<Document> {
        self.collections.read().get(&ns(database, collection)).cloned().unwrap_or_default()
    }

    pub fn count(&self, database: &str, collection: &str) -> usize {
        self.collections.read().get(&ns(database, collection)).map_or(0, Vec::len)
    }

    pub fn collection_exists(&self, database: &str, collection: &str) -> bool {
        self.collections.read().contains_key(&ns(database, collection))
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            insert_calls: self.counters.insert_calls.load(Ordering::Relaxed),
            delete_calls: self.counters.delete_calls.load(Ordering::Relaxed),
            find_calls: self.counters.find_calls.load(Ordering::Relaxed),
            drop_calls: self.counters.drop_calls.load(Ordering::Relaxed),
        }
    }
}

fn ns(database: &str, collection: &str) -> Namespace {
    (database.to_string(), collection.to_string())
}

impl DocumentStore for MemoryStore {
    fn collection(&self, database: &str, name: &str) -> Box<dyn StoreCollection> {
        Box::new(MemoryCollection {
            store: self.clone(),
            namespace: ns(database, name),
        })
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

struct MemoryCollection {
    store: MemoryStore,
    namespace: Namespace,
}

#[async_trait]
impl StoreCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.namespace.1
    }

    async fn insert_many(&self, docs: Vec<Document>) -> Result<u64, StoreError> {
        self.store.counters.insert_calls.fetch_add(1, Ordering::Relaxed);
        if docs.is_empty() {
            return Err(StoreError::Command("insert_many requires at least one document".into()));
        }
        let mut cols = self.store.collections.write();
        let stored = cols.entry(self.namespace.clone()).or_default();
        let mut inserted = 0u64;
        // Ordered insert: stop at the first duplicate, keeping what was already written.
        for doc in docs {
            if let Some(id) = doc.get("_id")
                && stored.iter().any(|d| d.get("_id") == Some(id))
            {
                return Err(StoreError::DuplicateKey(format!(
                    "E11000 duplicate key error collection: {}.{} dup key: {{ _id: {id} }} ({inserted} inserted before the conflict)",
                    self.namespace.0, self.namespace.1
                )));
            }
            stored.push(doc);
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn delete_many(&self, filter: Document) -> Result<u64, StoreError> {
        self.store.counters.delete_calls.fetch_add(1, Ordering::Relaxed);
        validate_filter(&filter).map_err(StoreError::Command)?;
        let mut cols = self.store.collections.write();
        let Some(stored) = cols.get_mut(&self.namespace) else { return Ok(0) };
        let before = stored.len();
        stored.retain(|d| !eval_filter(d, &filter));
        Ok((before - stored.len()) as u64)
    }

    async fn find(
        &self,
        filter: Document,
        options: FindOptions,
    ) -> Result<Box<dyn DocumentCursor>, StoreError> {
        self.store.counters.find_calls.fetch_add(1, Ordering::Relaxed);
        validate_filter(&filter).map_err(StoreError::Command)?;
        let matched: VecDeque<Document> = {
            let cols = self.store.collections.read();
            cols.get(&self.namespace)
                .map(|docs| {
                    docs.iter()
                        .filter(|d| eval_filter(d, &filter))
                        .map(|d| match &options.projection {
                            Some(p) => project(d, p),
                            None => d.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default()
        };
        let batch = options.batch_size.map_or(self.store.cursor_batch, |b| (b as usize).max(1));
        Ok(Box::new(MemoryCursor { remaining: matched, batch }))
    }

    async fn drop(&self) -> Result<(), StoreError> {
        self.store.counters.drop_calls.fetch_add(1, Ordering::Relaxed);
        self.store.collections.write().remove(&self.namespace);
        Ok(())
    }
}

/// Cursor over a snapshot taken when the query ran.
struct MemoryCursor {
    remaining: VecDeque<Document>,
    batch: usize,
}

#[async_trait]
impl DocumentCursor for MemoryCursor {
    async fn next_batch(&mut self) -> Result<Option<Vec<Document>>, StoreError> {
        if self.remaining.is_empty() {
            return Ok(None);
        }
        let n = self.batch.min(self.remaining.len());
        Ok(Some(self.remaining.drain(..n).collect()))
    }
}
