//! Driver contracts - the seam between the mapper and a concrete backend.
//!
//! A backend implements three object-safe traits and registers a factory
//! with the [`Registry`](crate::Registry):
//!
//! - [`Driver`]: opens sessions and generates identities.
//! - [`Session`]: one live connection to one logical database.
//! - [`BackendCollection`]: document-level operations on one collection.
//!
//! Drivers report failures with [`BackendError`]. The mapper translates the
//! sentinel variants (`NotFound`, `NamespaceNotFound`, `EmptyUpdate`) into
//! its canonical behavior; drivers never need to know about `OrmError`.
//!
//! [`MongoDriver`] is the production backend. [`MemoryServer`] reproduces its
//! semantics in process for tests.

mod memory;
mod mongo;

use std::sync::Arc;

use thiserror::Error;

use crate::document::Document;
use crate::record::StorageId;

pub use memory::{MemoryCollection, MemoryDriver, MemoryServer, MemorySession};
pub use mongo::{MongoCollection, MongoDriver, MongoSession};

/// Errors raised by backends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// No document matched.
    #[error("not found")]
    NotFound,

    /// The collection does not exist.
    #[error("ns not found: {0}")]
    NamespaceNotFound(String),

    /// An update carried no fields to set.
    #[error("'$set' is empty")]
    EmptyUpdate,

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("no reachable servers: {0}")]
    Unreachable(String),

    #[error("authentication failed for user '{0}'")]
    AuthFailed(String),

    /// The session was closed by `Database::disconnect`.
    #[error("session closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

/// Server metadata cached by `Database::connect`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Product name, e.g. `"Memory"`.
    pub server: String,
    pub version: String,
    pub system: String,
}

/// Everything a driver needs to open a session, taken from the connection
/// string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub host: String,
    pub port: Option<u16>,
    pub database: String,
    /// Percent-encoded, as written in the connection string.
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ConnectTarget {
    /// `host[:port]`, the address form most drivers dial.
    pub fn address(&self) -> String {
        match self.port {
            Some(port) => format!("{}:{}", self.host, port),
            None => self.host.clone(),
        }
    }
}

/// Field selection applied to the documents a query returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Projection {
    #[default]
    All,
    /// Only these fields (plus `_id`).
    Include(Vec<String>),
    /// Every field except these.
    Exclude(Vec<String>),
}

/// A deferred read: filter, projection and paging.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindSpec {
    pub filter: Document,
    pub projection: Projection,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl FindSpec {
    pub fn new(filter: Document) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }
}

/// A document-store backend.
pub trait Driver: Send + Sync {
    /// Product name used in `Database::version`.
    fn server_name(&self) -> &str;

    /// Opens a session to the target database.
    fn connect(&self, target: &ConnectTarget) -> Result<Arc<dyn Session>, BackendError>;

    /// Generates a backend-native identity. Must not require a connection and
    /// must be unique across threads.
    fn new_id(&self) -> StorageId;
}

/// A live connection to one logical database.
pub trait Session: Send + Sync {
    fn server_info(&self) -> Result<ServerInfo, BackendError>;

    fn collection(&self, name: &str) -> Arc<dyn BackendCollection>;

    /// Toggles verbose operation logging.
    fn set_debug(&self, on: bool);

    fn close(&self);
}

/// Document-level operations on one collection.
pub trait BackendCollection: Send + Sync {
    fn name(&self) -> &str;

    fn count(&self) -> Result<usize, BackendError>;

    /// Fails with `NamespaceNotFound` when the collection does not exist.
    fn drop_collection(&self) -> Result<(), BackendError>;

    fn insert(&self, doc: Document) -> Result<(), BackendError>;

    /// Sets the patch fields on the document with this id, inserting it when
    /// absent. Fails with `EmptyUpdate` when the patch is empty.
    fn upsert_set(&self, id: &StorageId, patch: Document) -> Result<(), BackendError>;

    fn find(&self, spec: &FindSpec) -> Result<Vec<Document>, BackendError>;

    /// Fails with `NotFound` when nothing matches.
    fn find_one(&self, spec: &FindSpec) -> Result<Document, BackendError> {
        let mut spec = spec.clone();
        spec.limit = Some(1);
        self.find(&spec)?
            .into_iter()
            .next()
            .ok_or(BackendError::NotFound)
    }

    fn count_matching(&self, spec: &FindSpec) -> Result<usize, BackendError> {
        Ok(self.find(spec)?.len())
    }

    /// Removes the first matching document. Fails with `NotFound` when
    /// nothing matches.
    fn remove(&self, filter: &Document) -> Result<(), BackendError>;
}
