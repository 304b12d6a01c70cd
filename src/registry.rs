//! Registry - maps connection-string schemes to driver factories.
//!
//! ## Example
//!
//! ```ignore
//! use record_orm::Registry;
//!
//! let db = Registry::default().resolve("mongodb://localhost/app")?;
//! db.connect()?;
//!
//! // other backends plug in by scheme
//! let mut registry = Registry::default();
//! registry.register("couch", |url| couch_driver(url));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use url::Url;

use crate::config::DatabaseConfig;
use crate::database::Database;
use crate::driver::{Driver, MemoryServer, MongoDriver};
use crate::error::{OrmError, Result};

/// Scheme of the MongoDB backend.
pub const MONGODB_SCHEME: &str = "mongodb";

/// Scheme of the in-process test backend, see [`Registry::with_memory`].
pub const MEMORY_SCHEME: &str = "memory";

/// Builds a driver for a parsed connection string.
pub type DriverFactory = Arc<dyn Fn(&Url) -> Result<Arc<dyn Driver>> + Send + Sync>;

/// Scheme-to-factory table. Populate it at startup, then resolve
/// connection strings into [`Database`] handles.
#[derive(Clone)]
pub struct Registry {
    factories: HashMap<String, DriverFactory>,
}

impl Registry {
    /// An empty registry with no schemes at all.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry with the MongoDB driver registered under
    /// [`MONGODB_SCHEME`].
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(MONGODB_SCHEME, |url: &Url| {
            let driver: Arc<dyn Driver> = Arc::new(MongoDriver::from_url(url));
            Ok(driver)
        });
        registry
    }

    /// The built-in registry plus a fresh [`MemoryServer`] under
    /// [`MEMORY_SCHEME`]. Every handle resolved from it shares that server.
    pub fn with_memory() -> Self {
        let mut registry = Self::with_builtin();
        let server = MemoryServer::new();
        registry.register(MEMORY_SCHEME, move |_url: &Url| Ok(server.driver()));
        registry
    }

    /// Adds a factory for `scheme`, replacing any previous one.
    pub fn register<F>(&mut self, scheme: &str, factory: F) -> &mut Self
    where
        F: Fn(&Url) -> Result<Arc<dyn Driver>> + Send + Sync + 'static,
    {
        self.factories
            .insert(scheme.to_ascii_lowercase(), Arc::new(factory));
        self
    }

    pub fn is_registered(&self, scheme: &str) -> bool {
        self.factories.contains_key(&scheme.to_ascii_lowercase())
    }

    /// Registered schemes, sorted.
    pub fn schemes(&self) -> Vec<&str> {
        let mut schemes: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        schemes
    }

    /// Builds a disconnected handle for `url`, naming the database after the
    /// URL path.
    pub fn resolve(&self, url: &str) -> Result<Database> {
        self.resolve_with_name(url, None)
    }

    /// Like [`Registry::resolve`]; a non-empty `name` overrides the database
    /// in the URL path.
    pub fn resolve_with_name(&self, url: &str, name: Option<&str>) -> Result<Database> {
        let url = Url::parse(url).map_err(|e| OrmError::InvalidUrl(format!("{}: {}", url, e)))?;

        let factory = self
            .factories
            .get(url.scheme())
            .ok_or_else(|| OrmError::UnsupportedScheme(url.scheme().to_string()))?;

        let driver = factory(&url)?;
        Database::new(url, name, driver)
    }

    /// Resolves the configured URL and applies the configured debug flag.
    pub fn open(&self, config: &DatabaseConfig) -> Result<Database> {
        let db = self.resolve_with_name(&config.url, config.name.as_deref())?;
        db.set_debug(config.debug);
        Ok(db)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_builtin()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("schemes", &self.schemes())
            .finish()
    }
}
