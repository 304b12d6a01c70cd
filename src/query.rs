//! Query - a deferred, chainable read.
//!
//! Building a query and chaining `select`/`exclude`/`skip`/`limit` performs
//! no I/O. The backend is contacted only by `count`, `one` and `all`.
//!
//! ```ignore
//! let names: Vec<Profile> = db
//!     .query(&Profile { city: Some("Oslo".into()), ..Default::default() })
//!     .select(["name"])
//!     .limit(10)
//!     .all()?;
//! ```

use std::sync::Arc;

use crate::document::{self, Document, ID_KEY};
use crate::driver::{BackendCollection, FindSpec, Projection};
use crate::error::{OrmError, Result};
use crate::record::Record;

#[derive(Clone)]
pub struct Query {
    collection: Option<Arc<dyn BackendCollection>>,
    filter: Result<Document>,
    id_field: Option<&'static str>,
    projection: Projection,
    skip: usize,
    limit: Option<usize>,
}

impl Query {
    pub(crate) fn new(
        collection: Option<Arc<dyn BackendCollection>>,
        filter: Result<Document>,
        id_field: Option<&'static str>,
    ) -> Self {
        Self {
            collection,
            filter,
            id_field,
            projection: Projection::All,
            skip: 0,
            limit: None,
        }
    }

    /// Return only these fields (and the identity). Replaces any earlier
    /// `select` or `exclude`; an empty list clears the projection.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields = self.storage_keys(fields);
        self.projection = if fields.is_empty() {
            Projection::All
        } else {
            Projection::Include(fields)
        };
        self
    }

    /// Return every field except these. Replaces any earlier `select` or
    /// `exclude`; an empty list clears the projection.
    pub fn exclude<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields = self.storage_keys(fields);
        self.projection = if fields.is_empty() {
            Projection::All
        } else {
            Projection::Exclude(fields)
        };
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.skip = n;
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Number of matching documents, after skip and limit.
    pub fn count(&self) -> Result<usize> {
        let (backend, spec) = self.prepare()?;
        Ok(backend.count_matching(&spec)?)
    }

    /// The first matching record. Fails with [`OrmError::NotFound`] when
    /// nothing matches.
    pub fn one<R: Record>(&self) -> Result<R> {
        document::from_document(self.one_document()?)
    }

    /// Every matching record; empty when nothing matches.
    pub fn all<R: Record>(&self) -> Result<Vec<R>> {
        self.all_documents()?
            .into_iter()
            .map(document::from_document::<R>)
            .collect()
    }

    pub fn one_document(&self) -> Result<Document> {
        let (backend, spec) = self.prepare()?;
        Ok(backend.find_one(&spec)?)
    }

    pub fn all_documents(&self) -> Result<Vec<Document>> {
        let (backend, spec) = self.prepare()?;
        Ok(backend.find(&spec)?)
    }

    fn prepare(&self) -> Result<(&Arc<dyn BackendCollection>, FindSpec)> {
        let backend = self.collection.as_ref().ok_or(OrmError::NotConnected)?;
        let filter = self.filter.as_ref().map_err(|err| err.clone())?;

        Ok((
            backend,
            FindSpec {
                filter: filter.clone(),
                projection: self.projection.clone(),
                skip: self.skip,
                limit: self.limit,
            },
        ))
    }

    /// Maps the record's identity key onto the backend's `_id`.
    fn storage_keys<I, S>(&self, fields: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        fields
            .into_iter()
            .map(Into::into)
            .map(|field| match self.id_field {
                Some(id_field) if field == id_field => ID_KEY.to_string(),
                _ => field,
            })
            .collect()
    }
}

impl std::fmt::Debug for Query {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("filter", &self.filter)
            .field("projection", &self.projection)
            .field("skip", &self.skip)
            .field("limit", &self.limit)
            .finish()
    }
}
