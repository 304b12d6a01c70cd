//! Database - the storage handle owning one backend session.

use std::borrow::Cow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use url::Url;

use crate::collection::Collection;
use crate::driver::{ConnectTarget, Driver, ServerInfo, Session};
use crate::error::{OrmError, Result};
use crate::logger::CollectionLogger;
use crate::query::Query;
use crate::record::{self, Record};

/// A handle on one logical database.
///
/// Owns its session exclusively: the connection is established lazily by
/// [`Database::connect`] and shared by every [`Collection`] derived from the
/// handle. `Database` is `Send + Sync`; share it across threads with `Arc`.
///
/// The record verbs (`save`, `find`, `remove`, `query`) pick the collection
/// from the record type, see [`record::collection_name`].
pub struct Database {
    url: Url,
    name: String,
    driver: Arc<dyn Driver>,
    session: Mutex<Option<Arc<dyn Session>>>,
    info: RwLock<Option<ServerInfo>>,
    debug: AtomicBool,
}

impl Database {
    /// Creates a disconnected handle. `name` overrides the database named in
    /// the URL path.
    pub fn new(mut url: Url, name: Option<&str>, driver: Arc<dyn Driver>) -> Result<Self> {
        let name = match name.filter(|n| !n.is_empty()) {
            Some(name) => name.to_string(),
            None => url.path().trim_start_matches('/').to_string(),
        };
        if name.is_empty() {
            return Err(OrmError::InvalidUrl(format!(
                "no database name in '{}://{}'",
                url.scheme(),
                url.host_str().unwrap_or_default()
            )));
        }
        url.set_path(&format!("/{}", name));

        Ok(Self {
            url,
            name,
            driver,
            session: Mutex::new(None),
            info: RwLock::new(None),
            debug: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn target(&self) -> ConnectTarget {
        let username = self.url.username();
        ConnectTarget {
            host: self.url.host_str().unwrap_or("localhost").to_string(),
            port: self.url.port(),
            database: self.name.clone(),
            username: (!username.is_empty()).then(|| username.to_string()),
            password: self.url.password().map(str::to_string),
        }
    }

    /// Establishes the session, or reuses the one already established, and
    /// refreshes the cached server information.
    ///
    /// Concurrent callers are serialized: the first opens the session, the
    /// others observe it.
    pub fn connect(&self) -> Result<()> {
        let mut session = self.session();

        let (live, fresh) = match session.as_ref() {
            Some(live) => (Arc::clone(live), false),
            None => {
                let target = self.target();
                let live = self.driver.connect(&target)?;
                live.set_debug(self.debug());
                if self.debug() {
                    tracing::debug!(
                        target: "record_orm::db",
                        database = %self.name,
                        address = %target.address(),
                        "connected"
                    );
                }
                (live, true)
            }
        };

        let info = match live.server_info() {
            Ok(info) => info,
            Err(err) => {
                if fresh {
                    live.close();
                }
                return Err(err.into());
            }
        };
        *self.info.write().unwrap_or_else(PoisonError::into_inner) = Some(info);
        *session = Some(live);

        Ok(())
    }

    /// Closes the session. Does nothing when never connected.
    pub fn disconnect(&self) -> Result<()> {
        if let Some(live) = self.session().take() {
            live.close();
            if self.debug() {
                tracing::debug!(target: "record_orm::db", database = %self.name, "disconnected");
            }
        }
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.session().is_some()
    }

    /// The session slot. A panic while it was held cannot leave it half
    /// written, so a poisoned lock is recovered.
    fn session(&self) -> MutexGuard<'_, Option<Arc<dyn Session>>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Server system description; empty when never connected.
    pub fn system_information(&self) -> String {
        self.cached_info(|info| info.system.clone())
    }

    /// Server product and version, e.g. `"Memory 0.1.0"`; empty when never
    /// connected.
    pub fn version(&self) -> String {
        self.cached_info(|info| format!("{} {}", info.server, info.version))
    }

    fn cached_info(&self, f: impl FnOnce(&ServerInfo) -> String) -> String {
        self.info
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(f)
            .unwrap_or_default()
    }

    /// The collection called `name`. Before `connect` the returned collection
    /// fails every operation with `NotConnected`.
    pub fn c(&self, name: &str) -> Collection {
        let session = self.session().clone();
        Collection::new(
            name,
            session.map(|live| live.collection(name)),
            Arc::clone(&self.driver),
        )
    }

    /// The collection records of type `R` live in.
    pub fn collection_name<R: Record>(&self) -> Cow<'static, str> {
        record::collection_name::<R>()
    }

    /// A fresh backend-native unique token, usable as a public identifier.
    /// Does not need a connection.
    pub fn unique_id(&self) -> String {
        self.driver.new_id().to_string()
    }

    /// Toggles verbose backend logging. Applies to the live session and to
    /// sessions opened later.
    pub fn set_debug(&self, on: bool) {
        self.debug.store(on, Ordering::SeqCst);
        if let Some(live) = self.session().as_ref() {
            live.set_debug(on);
        }
    }

    pub fn debug(&self) -> bool {
        self.debug.load(Ordering::SeqCst)
    }

    pub fn save<R: Record>(&self, record: &mut R) -> Result<()> {
        self.c(&record::collection_name::<R>()).save(record)
    }

    pub fn find<R: Record>(&self, record: &mut R) -> Result<()> {
        self.c(&record::collection_name::<R>()).find(record)
    }

    pub fn remove<R: Record>(&self, record: &R) -> Result<()> {
        self.c(&record::collection_name::<R>()).remove(record)
    }

    pub fn query<R: Record>(&self, record: &R) -> Query {
        self.c(&record::collection_name::<R>()).query_record(record)
    }

    /// Drops the collection of record type `R`.
    pub fn drop_collection<R: Record>(&self) -> Result<()> {
        self.c(&record::collection_name::<R>()).drop()
    }

    /// A writer storing each write as a timestamped message in `collection`.
    pub fn new_logger(&self, collection: &str, prefix: &str) -> CollectionLogger {
        CollectionLogger::new(self.c(collection), prefix)
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        let session = self.session.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(live) = session.take() {
            live.close();
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("scheme", &self.url.scheme())
            .field("host", &self.url.host_str())
            .field("name", &self.name)
            .field("connected", &self.is_connected())
            .finish()
    }
}
