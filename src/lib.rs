//! Record-oriented object mapper for document stores.
//!
//! Application structs become [`Record`]s by embedding a [`StorageIdentity`]
//! and deriving `Record`. A [`Database`] handle, resolved from a connection
//! string through the [`Registry`], stores them in collections named after
//! their type, and saves them with merge semantics: a record with an
//! identity only writes the fields it has set.
//!
//! ```ignore
//! use record_orm::{Record, Registry, StorageIdentity};
//!
//! #[derive(Default, Serialize, Deserialize, Record)]
//! #[serde(default)]
//! struct Session {
//!     id: StorageIdentity,
//!     authenticated: Option<bool>,
//!     values: Option<HashMap<String, String>>,
//! }
//!
//! let db = Registry::default().resolve("mongodb://localhost/app")?;
//! db.connect()?;
//!
//! let mut session = Session { values: Some(values), ..Default::default() };
//! db.save(&mut session)?; // insert, assigns the identity
//!
//! let mut login = Session {
//!     id: session.id.clone(),
//!     authenticated: Some(true),
//!     ..Default::default()
//! };
//! db.save(&mut login)?; // merge: `values` survives
//! ```

#[allow(unused_extern_crates)]
extern crate self as record_orm;

mod collection;
mod config;
mod database;
pub mod document;
pub mod driver;
mod error;
mod logger;
mod query;
mod record;
mod registry;

pub use collection::Collection;
pub use config::DatabaseConfig;
pub use database::Database;
pub use document::{Document, ID_KEY};
pub use driver::{BackendError, MemoryServer, MongoDriver};
pub use error::{OrmError, Result};
pub use logger::CollectionLogger;
pub use query::Query;
pub use record::{collection_name, infer_collection_name, Record, StorageId, StorageIdentity};
pub use registry::{DriverFactory, Registry, MEMORY_SCHEME, MONGODB_SCHEME};

// Derive macro, same name as the trait (they live in different namespaces)
pub use record_orm_macros::Record;
