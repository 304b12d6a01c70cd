//! MemoryServer - in-process document store for tests and offline use.
//!
//! Mirrors the MongoDB backend's observable behavior: ordered collections of
//! documents keyed by `_id`, equality filters on top-level keys, `$set`-style
//! upserts, projections, per-database users. Clone-friendly via Arc; every
//! clone and every session opened through it see the same data.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;

use super::{
    BackendCollection, BackendError, ConnectTarget, Driver, FindSpec, Projection, ServerInfo,
    Session,
};
use crate::document::{Document, ID_KEY};
use crate::record::StorageId;

const SERVER_NAME: &str = "Memory";

type Collections = HashMap<String, Vec<Document>>;

struct ServerState {
    databases: RwLock<HashMap<String, Collections>>,
    users: RwLock<HashMap<String, HashMap<String, String>>>,
    reachable: AtomicBool,
    connections: AtomicUsize,
}

/// Shared state of an in-memory document server.
#[derive(Clone)]
pub struct MemoryServer {
    state: Arc<ServerState>,
}

impl Default for MemoryServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryServer {
    /// Create a new empty, reachable server.
    pub fn new() -> Self {
        Self {
            state: Arc::new(ServerState {
                databases: RwLock::new(HashMap::new()),
                users: RwLock::new(HashMap::new()),
                reachable: AtomicBool::new(true),
                connections: AtomicUsize::new(0),
            }),
        }
    }

    /// A driver whose sessions operate on this server.
    pub fn driver(&self) -> Arc<dyn Driver> {
        Arc::new(MemoryDriver::new(self.clone()))
    }

    /// Adds or replaces a user allowed to authenticate against `database`.
    pub fn add_user(
        &self,
        database: &str,
        username: &str,
        password: &str,
    ) -> Result<(), BackendError> {
        let mut users = self.state.users.write().map_err(|_| poisoned())?;
        users
            .entry(database.to_string())
            .or_default()
            .insert(username.to_string(), password.to_string());
        Ok(())
    }

    /// Removes a user. Returns true if it existed.
    pub fn remove_user(&self, database: &str, username: &str) -> Result<bool, BackendError> {
        let mut users = self.state.users.write().map_err(|_| poisoned())?;
        Ok(users
            .get_mut(database)
            .map(|db| db.remove(username).is_some())
            .unwrap_or(false))
    }

    /// When false, every `connect` fails with `Unreachable`.
    pub fn set_reachable(&self, reachable: bool) {
        self.state.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Number of sessions opened so far.
    pub fn connection_count(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    fn authenticate(&self, target: &ConnectTarget) -> Result<(), BackendError> {
        let Some(username) = &target.username else {
            return Ok(());
        };

        let users = self.state.users.read().map_err(|_| poisoned())?;
        let expected = users.get(&target.database).and_then(|db| db.get(username));
        match expected {
            Some(password) if Some(password) == target.password.as_ref() => Ok(()),
            _ => Err(BackendError::AuthFailed(username.clone())),
        }
    }
}

/// Driver for [`MemoryServer`].
pub struct MemoryDriver {
    server: MemoryServer,
}

impl MemoryDriver {
    pub fn new(server: MemoryServer) -> Self {
        Self { server }
    }
}

impl Driver for MemoryDriver {
    fn server_name(&self) -> &str {
        SERVER_NAME
    }

    fn connect(&self, target: &ConnectTarget) -> Result<Arc<dyn Session>, BackendError> {
        if !self.server.state.reachable.load(Ordering::SeqCst) {
            return Err(BackendError::Unreachable(target.address()));
        }
        self.server.authenticate(target)?;
        self.server.state.connections.fetch_add(1, Ordering::SeqCst);

        Ok(Arc::new(MemorySession {
            server: self.server.clone(),
            database: target.database.clone(),
            debug: Arc::new(AtomicBool::new(false)),
            closed: Arc::new(AtomicBool::new(false)),
        }))
    }

    fn new_id(&self) -> StorageId {
        StorageId::new(bson::oid::ObjectId::new().to_hex())
    }
}

/// A session bound to one database of a [`MemoryServer`].
pub struct MemorySession {
    server: MemoryServer,
    database: String,
    debug: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl Session for MemorySession {
    fn server_info(&self) -> Result<ServerInfo, BackendError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BackendError::Closed);
        }

        Ok(ServerInfo {
            server: SERVER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            system: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
        })
    }

    fn collection(&self, name: &str) -> Arc<dyn BackendCollection> {
        Arc::new(MemoryCollection {
            server: self.server.clone(),
            database: self.database.clone(),
            name: name.to_string(),
            debug: Arc::clone(&self.debug),
            closed: Arc::clone(&self.closed),
        })
    }

    fn set_debug(&self, on: bool) {
        self.debug.store(on, Ordering::SeqCst);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// One collection of a [`MemorySession`].
pub struct MemoryCollection {
    server: MemoryServer,
    database: String,
    name: String,
    debug: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl MemoryCollection {
    fn ensure_open(&self) -> Result<(), BackendError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(BackendError::Closed)
        } else {
            Ok(())
        }
    }

    fn trace(&self, op: &str, detail: impl FnOnce() -> String) {
        if self.debug.load(Ordering::Relaxed) {
            tracing::debug!(
                target: "record_orm::memory",
                database = %self.database,
                collection = %self.name,
                "{} {}",
                op,
                detail()
            );
        }
    }

    /// Runs `f` against this collection's documents, creating the collection
    /// on first write.
    fn write<T>(
        &self,
        f: impl FnOnce(&mut Vec<Document>) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        self.ensure_open()?;
        let mut databases = self.server.state.databases.write().map_err(|_| poisoned())?;
        let docs = databases
            .entry(self.database.clone())
            .or_default()
            .entry(self.name.clone())
            .or_default();
        f(docs)
    }

    fn read<T>(&self, f: impl FnOnce(&[Document]) -> T) -> Result<T, BackendError> {
        self.ensure_open()?;
        let databases = self.server.state.databases.read().map_err(|_| poisoned())?;
        let docs = databases
            .get(&self.database)
            .and_then(|db| db.get(&self.name))
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        Ok(f(docs))
    }
}

impl BackendCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn count(&self) -> Result<usize, BackendError> {
        self.read(|docs| docs.len())
    }

    fn drop_collection(&self) -> Result<(), BackendError> {
        self.ensure_open()?;
        self.trace("drop", || self.name.clone());

        let mut databases = self.server.state.databases.write().map_err(|_| poisoned())?;
        databases
            .get_mut(&self.database)
            .and_then(|db| db.remove(&self.name))
            .map(|_| ())
            .ok_or_else(|| {
                BackendError::NamespaceNotFound(format!("{}.{}", self.database, self.name))
            })
    }

    fn insert(&self, mut doc: Document) -> Result<(), BackendError> {
        if !doc.contains_key(ID_KEY) {
            doc.insert(ID_KEY.to_string(), Value::String(bson::oid::ObjectId::new().to_hex()));
        }
        self.trace("insert", || Value::Object(doc.clone()).to_string());

        self.write(|docs| {
            let id = &doc[ID_KEY];
            if docs.iter().any(|d| d.get(ID_KEY) == Some(id)) {
                return Err(BackendError::DuplicateKey(id.to_string()));
            }
            docs.push(doc);
            Ok(())
        })
    }

    fn upsert_set(&self, id: &StorageId, patch: Document) -> Result<(), BackendError> {
        if patch.is_empty() {
            return Err(BackendError::EmptyUpdate);
        }
        self.trace("upsert", || format!("{} {}", id, Value::Object(patch.clone())));

        let id = Value::String(id.as_str().to_string());
        self.write(|docs| {
            match docs.iter_mut().find(|d| d.get(ID_KEY) == Some(&id)) {
                Some(existing) => existing.extend(patch),
                None => {
                    let mut doc = Document::new();
                    doc.insert(ID_KEY.to_string(), id);
                    doc.extend(patch);
                    docs.push(doc);
                }
            }
            Ok(())
        })
    }

    fn find(&self, spec: &FindSpec) -> Result<Vec<Document>, BackendError> {
        self.trace("find", || Value::Object(spec.filter.clone()).to_string());

        self.read(|docs| {
            docs.iter()
                .filter(|d| matches_filter(d, &spec.filter))
                .skip(spec.skip)
                .take(spec.limit.unwrap_or(usize::MAX))
                .map(|d| project(d, &spec.projection))
                .collect()
        })
    }

    fn count_matching(&self, spec: &FindSpec) -> Result<usize, BackendError> {
        self.read(|docs| {
            docs.iter()
                .filter(|d| matches_filter(d, &spec.filter))
                .skip(spec.skip)
                .take(spec.limit.unwrap_or(usize::MAX))
                .count()
        })
    }

    fn remove(&self, filter: &Document) -> Result<(), BackendError> {
        self.trace("remove", || Value::Object(filter.clone()).to_string());

        self.write(|docs| {
            let index = docs
                .iter()
                .position(|d| matches_filter(d, filter))
                .ok_or(BackendError::NotFound)?;
            docs.remove(index);
            Ok(())
        })
    }
}

fn poisoned() -> BackendError {
    BackendError::Other("lock poisoned".into())
}

/// Equality on every top-level filter key. An empty filter matches anything.
fn matches_filter(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, value)| doc.get(key) == Some(value))
}

fn project(doc: &Document, projection: &Projection) -> Document {
    match projection {
        Projection::All => doc.clone(),
        Projection::Include(fields) => doc
            .iter()
            .filter(|(key, _)| key.as_str() == ID_KEY || fields.iter().any(|f| f == *key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        Projection::Exclude(fields) => doc
            .iter()
            .filter(|(key, _)| !fields.iter().any(|f| f == *key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    }
}
