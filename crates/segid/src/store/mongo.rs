use mongodb::{
    Client, Collection,
    bson::{Bson, DateTime, Document, doc},
    options::ReturnDocument,
};

use crate::{error::StoreError, store::RangeStore};

/// Default database holding the counter collection.
pub const DEFAULT_DATABASE: &str = "test";

/// Default collection holding one counter document per business tag.
pub const DEFAULT_COLLECTION: &str = "segments";

/// Name of the counter field inside each document.
const MAX_ID_FIELD: &str = "maxId";

/// A durable [`RangeStore`] backed by a MongoDB collection.
///
/// Each business tag maps to one document `{ _id: <tag>, maxId: <i64>,
/// initTime: <date> }`. Ranges are reserved with a single `findOneAndUpdate`
/// that `$inc`s `maxId` with `upsert: true` and returns the updated document,
/// which makes the reservation atomic across any number of processes sharing
/// the collection.
#[derive(Clone, Debug)]
pub struct MongoRangeStore {
    client: Client,
    collection: Collection<Document>,
}

impl MongoRangeStore {
    /// Connects to `uri` and uses the default `test.segments` collection.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connect`] if the URI is invalid or the client
    /// cannot be created.
    pub async fn connect(uri: &str) -> Result<Self, StoreError> {
        Self::connect_with(uri, DEFAULT_DATABASE, DEFAULT_COLLECTION).await
    }

    /// Connects to `uri` and uses `database.collection` for counters.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Connect`] if the URI is invalid or the client
    /// cannot be created.
    pub async fn connect_with(
        uri: &str,
        database: &str,
        collection: &str,
    ) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| StoreError::Connect {
                reason: e.to_string(),
            })?;
        Ok(Self::from_client(client, database, collection))
    }

    /// Wraps an existing client.
    pub fn from_client(client: Client, database: &str, collection: &str) -> Self {
        let collection = client.database(database).collection::<Document>(collection);
        Self { client, collection }
    }
}

fn read_max_id(document: &Document) -> Result<i64, StoreError> {
    match document.get(MAX_ID_FIELD) {
        Some(Bson::Int64(value)) => Ok(*value),
        Some(Bson::Int32(value)) => Ok(i64::from(*value)),
        Some(other) => Err(StoreError::Malformed {
            reason: format!("`{MAX_ID_FIELD}` has unexpected type {:?}", other.element_type()),
        }),
        None => Err(StoreError::Malformed {
            reason: format!("`{MAX_ID_FIELD}` is missing"),
        }),
    }
}

impl RangeStore for MongoRangeStore {
    async fn increment_and_fetch(&self, tag: &str, step: i64) -> Result<i64, StoreError> {
        let document = self
            .collection
            .find_one_and_update(
                doc! { "_id": tag },
                doc! {
                    "$inc": { "maxId": step },
                    "$setOnInsert": { "initTime": DateTime::now() },
                },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| StoreError::Unavailable {
                reason: e.to_string(),
            })?
            .ok_or_else(|| StoreError::Malformed {
                reason: format!("upsert for `{tag}` returned no document"),
            })?;

        read_max_id(&document)
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_both_integer_widths() {
        assert_eq!(read_max_id(&doc! { "maxId": 2000_i64 }), Ok(2000));
        assert_eq!(read_max_id(&doc! { "maxId": 1000_i32 }), Ok(1000));
    }

    #[test]
    fn rejects_missing_or_non_integer_counter() {
        assert!(matches!(
            read_max_id(&doc! { "other": 1_i64 }),
            Err(StoreError::Malformed { .. })
        ));
        assert!(matches!(
            read_max_id(&doc! { "maxId": "1000" }),
            Err(StoreError::Malformed { .. })
        ));
    }
}
