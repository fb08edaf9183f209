#[cfg(feature = "mongodb")]
use segid::MongoRangeStore;
use segid::{MemoryRangeStore, RangeStore, StoreError};

use crate::server::config::StoreTarget;

/// The store backing the server, chosen at startup from [`StoreTarget`].
///
/// `RangeStore` returns `impl Future` and is not object safe, so stores are
/// dispatched through this enum.
#[derive(Debug)]
pub enum AnyStore {
    Memory(MemoryRangeStore),
    #[cfg(feature = "mongodb")]
    Mongo(MongoRangeStore),
}

impl AnyStore {
    /// Opens the store described by `target`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connect`] if a remote store cannot be reached, or
    /// if `target` names a store this build does not support.
    pub async fn connect(target: &StoreTarget) -> Result<Self, StoreError> {
        match target {
            StoreTarget::Memory => Ok(Self::Memory(MemoryRangeStore::new())),
            #[cfg(feature = "mongodb")]
            StoreTarget::Mongo {
                uri,
                database,
                collection,
            } => MongoRangeStore::connect_with(uri, database, collection)
                .await
                .map(Self::Mongo),
            #[cfg(not(feature = "mongodb"))]
            StoreTarget::Mongo { .. } => Err(StoreError::Connect {
                reason: "built without the `mongodb` feature".to_string(),
            }),
        }
    }
}

impl RangeStore for AnyStore {
    async fn increment_and_fetch(&self, tag: &str, step: i64) -> Result<i64, StoreError> {
        match self {
            Self::Memory(store) => store.increment_and_fetch(tag, step).await,
            #[cfg(feature = "mongodb")]
            Self::Mongo(store) => store.increment_and_fetch(tag, step).await,
        }
    }

    async fn close(&self) -> Result<(), StoreError> {
        match self {
            Self::Memory(store) => store.close().await,
            #[cfg(feature = "mongodb")]
            Self::Mongo(store) => store.close().await,
        }
    }
}
