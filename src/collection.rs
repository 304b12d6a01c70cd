//! Collection - a named bucket of records inside a `Database`.

use std::sync::Arc;

use serde_json::Value;

use crate::document::{self, Document, ID_KEY};
use crate::driver::{BackendCollection, BackendError, Driver, FindSpec};
use crate::error::{OrmError, Result};
use crate::query::Query;
use crate::record::Record;

/// A view onto one collection of a connected database.
///
/// Stateless beyond its name; cheap to create. A collection obtained before
/// `Database::connect` succeeded is unusable: every operation fails with
/// [`OrmError::NotConnected`].
#[derive(Clone)]
pub struct Collection {
    name: String,
    inner: Option<Arc<dyn BackendCollection>>,
    driver: Arc<dyn Driver>,
}

impl Collection {
    pub(crate) fn new(
        name: &str,
        inner: Option<Arc<dyn BackendCollection>>,
        driver: Arc<dyn Driver>,
    ) -> Self {
        Self {
            name: name.to_string(),
            inner,
            driver,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// False for collections obtained while disconnected.
    pub fn is_connected(&self) -> bool {
        self.inner.is_some()
    }

    fn backend(&self) -> Result<&Arc<dyn BackendCollection>> {
        self.inner.as_ref().ok_or(OrmError::NotConnected)
    }

    /// Number of documents in the collection.
    pub fn count(&self) -> Result<usize> {
        Ok(self.backend()?.count()?)
    }

    /// Drops the whole collection. Dropping a collection that does not exist
    /// succeeds.
    pub fn drop(&self) -> Result<()> {
        match self.backend()?.drop_collection() {
            Ok(()) | Err(BackendError::NamespaceNotFound(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Inserts a new record or merges a stored one.
    ///
    /// A record without identity is inserted in full and receives a new
    /// identity once the insert succeeds. A record with identity is
    /// merge-updated: only its set (non-null) fields are written, every
    /// other stored field survives. A record carrying nothing but its
    /// identity is a successful no-op.
    pub fn save<R: Record>(&self, record: &mut R) -> Result<()> {
        let backend = self.backend()?;

        match record.storage_id() {
            None => {
                let id = self.driver.new_id();
                let doc = document::insert_document(record, &id)?;
                backend.insert(doc)?;
                record.set_storage_id(id);
                Ok(())
            }
            Some(id) => {
                let patch = document::patch_document(record)?;
                match backend.upsert_set(id, patch) {
                    Ok(()) | Err(BackendError::EmptyUpdate) => Ok(()),
                    Err(err) => Err(err.into()),
                }
            }
        }
    }

    /// Looks up the first document matching the record's populated fields and
    /// loads it into the record.
    pub fn find<R: Record>(&self, record: &mut R) -> Result<()> {
        let backend = self.backend()?;
        let filter = document::filter_document(record)?;
        let doc = backend.find_one(&FindSpec::new(filter))?;
        *record = document::from_document(doc)?;
        Ok(())
    }

    /// Removes the first document matching the record's populated fields.
    pub fn remove<R: Record>(&self, record: &R) -> Result<()> {
        let backend = self.backend()?;
        let filter = document::filter_document(record)?;
        Ok(backend.remove(&filter)?)
    }

    /// Inserts a raw document, assigning an `_id` when it has none.
    pub fn insert_document(&self, mut doc: Document) -> Result<()> {
        let backend = self.backend()?;
        if !doc.contains_key(ID_KEY) {
            let id = self.driver.new_id();
            doc.insert(ID_KEY.to_string(), Value::String(id.to_string()));
        }
        Ok(backend.insert(doc)?)
    }

    /// A query matching documents equal to `filter` on each of its keys.
    pub fn query(&self, filter: Document) -> Query {
        Query::new(self.inner.clone(), Ok(filter), None)
    }

    /// A query matching the populated fields of `record`.
    pub fn query_record<R: Record>(&self, record: &R) -> Query {
        Query::new(
            self.inner.clone(),
            document::filter_document(record),
            Some(R::ID_FIELD),
        )
    }
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("connected", &self.inner.is_some())
            .finish()
    }
}
