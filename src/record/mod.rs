//! Records - application structs that can be stored in a document collection.
//!
//! A record owns a [`StorageIdentity`] field and exposes it through the
//! [`Record`] trait. The identity is absent until the first successful save,
//! which assigns a backend-generated [`StorageId`].
//!
//! ## Example
//!
//! ```ignore
//! use record_orm::{Record, StorageIdentity};
//!
//! #[derive(Default, Serialize, Deserialize, Record)]
//! #[serde(default)]
//! struct Invoice {
//!     id: StorageIdentity,
//!     number: Option<u32>,
//!     customer: Option<String>,
//! }
//!
//! let mut invoice = Invoice { number: Some(7), ..Default::default() };
//! db.save(&mut invoice)?;
//! assert!(invoice.storage_id().is_some());
//! ```

mod naming;

use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub use naming::{collection_name, infer_collection_name};

/// Opaque, backend-generated document identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageId(String);

impl StorageId {
    /// Wraps a driver-produced token. Drivers call this; applications
    /// normally receive ids from `save`.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The identity field embedded in every storable struct.
///
/// Absent at construction; set by the collection on first save.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageIdentity(Option<StorageId>);

impl StorageIdentity {
    pub fn new(id: StorageId) -> Self {
        Self(Some(id))
    }

    pub fn get(&self) -> Option<&StorageId> {
        self.0.as_ref()
    }

    pub fn set(&mut self, id: StorageId) {
        self.0 = Some(id);
    }

    /// Resets the identity, so the next save inserts a new document.
    pub fn clear(&mut self) {
        self.0 = None;
    }

    pub fn is_present(&self) -> bool {
        self.0.is_some()
    }
}

impl From<StorageId> for StorageIdentity {
    fn from(id: StorageId) -> Self {
        Self::new(id)
    }
}

/// Trait for types that can be stored in a collection.
///
/// Usually derived with `#[derive(Record)]`.
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    /// The serde key the identity field serializes under. It is mapped onto
    /// the backend's `_id` key on the way in and back on the way out.
    const ID_FIELD: &'static str = "id";

    /// Explicit collection name. When `None` the name is inferred from
    /// [`Record::type_name`].
    const COLLECTION: Option<&'static str> = None;

    /// Bare type name used for collection-name inference.
    fn type_name() -> &'static str {
        let full = std::any::type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base)
    }

    fn storage_id(&self) -> Option<&StorageId>;

    fn set_storage_id(&mut self, id: StorageId);
}
