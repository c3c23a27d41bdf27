//! Document store seam used by the import and export pipelines.
//!
//! The pipelines only see these traits. `memory` is an in-process backend; `mongo`
//! talks to a MongoDB deployment over the network.

mod filter;
pub mod memory;
#[cfg(feature = "mongo")]
pub mod mongo;

use crate::errors::StoreError;
use async_trait::async_trait;
use bson::{Bson, Document, doc};

pub use filter::{eval_filter, project, validate_filter};
pub use memory::{MemoryStore, StoreStats};
#[cfg(feature = "mongo")]
pub use mongo::MongoStore;

/// Which replica members a read may be served from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadPreference {
    #[default]
    Primary,
    /// Read from a secondary when one is available, keeping load off the primary.
    SecondaryPreferred,
}

#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub projection: Option<Document>,
    /// Documents per cursor batch; `None` leaves it to the store.
    pub batch_size: Option<u32>,
    pub read_preference: ReadPreference,
}

pub trait DocumentStore: Send + Sync {
    /// Handle to `database.name`. Creating a handle performs no I/O.
    fn collection(&self, database: &str, name: &str) -> Box<dyn StoreCollection>;

    /// Short human-readable description of the backend for logs.
    fn describe(&self) -> String;
}

#[async_trait]
pub trait StoreCollection: Send + Sync {
    fn name(&self) -> &str;

    /// Insert documents in order. Returns the number inserted.
    async fn insert_many(&self, docs: Vec<Document>) -> Result<u64, StoreError>;

    /// Delete every document matching `filter`. Returns the number deleted.
    async fn delete_many(&self, filter: Document) -> Result<u64, StoreError>;

    async fn find(
        &self,
        filter: Document,
        options: FindOptions,
    ) -> Result<Box<dyn DocumentCursor>, StoreError>;

    /// Drop the collection including its indexes. Dropping a missing collection succeeds.
    async fn drop(&self) -> Result<(), StoreError>;
}

/// Server-side iterator advanced one batch at a time.
#[async_trait]
pub trait DocumentCursor: Send {
    /// Next batch of results, `None` once the cursor is exhausted.
    async fn next_batch(&mut self) -> Result<Option<Vec<Document>>, StoreError>;
}

/// `{ "_id": { "$in": [ids...] } }`
pub fn id_in_filter(ids: Vec<Bson>) -> Document {
    doc! { "_id": { "$in": ids } }
}
