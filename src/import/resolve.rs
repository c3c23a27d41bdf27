//! Applies the existing-entry policy to a collection and to each batch before it is
//! inserted.

use super::options::ExistingEntryBehavior;
use crate::errors::StoreError;
use crate::store::{FindOptions, StoreCollection, id_in_filter};
use bson::{Bson, Document, doc};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub inserted: u64,
    pub skipped: u64,
}

/// Once-per-file work done before the first batch: empty or drop the collection.
///
/// # Errors
/// Propagates store failures.
pub async fn prepare_collection(
    collection: &dyn StoreCollection,
    behavior: ExistingEntryBehavior,
) -> Result<(), StoreError> {
    match behavior {
        ExistingEntryBehavior::Truncate => {
            let deleted = collection.delete_many(doc! {}).await?;
            log::info!("truncated {}: {deleted} document(s) removed", collection.name());
        }
        ExistingEntryBehavior::Drop => {
            collection.drop().await?;
            log::info!("dropped {}", collection.name());
        }
        ExistingEntryBehavior::None | ExistingEntryBehavior::Ignore | ExistingEntryBehavior::Replace => {}
    }
    Ok(())
}

/// Filter or clear conflicts for one batch, then insert what is left with a single call.
///
/// # Errors
/// Propagates store failures. With `None`, `Truncate` or `Drop` an `_id` collision comes
/// back as `StoreError::DuplicateKey`.
pub async fn resolve_batch(
    collection: &dyn StoreCollection,
    batch: Vec<Document>,
    behavior: ExistingEntryBehavior,
) -> Result<BatchOutcome, StoreError> {
    let total = batch.len() as u64;
    let to_insert = match behavior {
        ExistingEntryBehavior::Ignore => {
            let existing = existing_ids(collection, ids_of(&batch)).await?;
            batch
                .into_iter()
                .filter(|d| d.get("_id").is_none_or(|id| !existing.contains(id)))
                .collect()
        }
        ExistingEntryBehavior::Replace => {
            // Issued even when nothing collides.
            let removed = collection.delete_many(id_in_filter(ids_of(&batch))).await?;
            log::debug!("replace in {}: {removed} existing document(s) removed", collection.name());
            batch
        }
        ExistingEntryBehavior::None | ExistingEntryBehavior::Truncate | ExistingEntryBehavior::Drop => batch,
    };
    let skipped = total - to_insert.len() as u64;
    if to_insert.is_empty() {
        return Ok(BatchOutcome { inserted: 0, skipped });
    }
    let inserted = collection.insert_many(to_insert).await?;
    Ok(BatchOutcome { inserted, skipped })
}

fn ids_of(docs: &[Document]) -> Vec<Bson> {
    docs.iter().filter_map(|d| d.get("_id").cloned()).collect()
}

async fn existing_ids(collection: &dyn StoreCollection, ids: Vec<Bson>) -> Result<Vec<Bson>, StoreError> {
    let opts = FindOptions { projection: Some(doc! { "_id": 1 }), ..FindOptions::default() };
    let mut cursor = collection.find(id_in_filter(ids), opts).await?;
    let mut found = Vec::new();
    while let Some(batch) = cursor.next_batch().await? {
        found.extend(batch.into_iter().filter_map(|mut d| d.remove("_id")));
    }
    Ok(found)
}
