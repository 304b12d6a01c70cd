//! Document mapping between records and the backend's key/value documents.
//!
//! Every write and lookup goes through one of these pure functions, so the
//! in-memory record is never mutated to shape a backend payload:
//!
//! - [`insert_document`]: the full record, identity stored under `_id`.
//! - [`patch_document`]: only the set fields, identity removed.
//! - [`filter_document`]: the populated fields, identity mapped to `_id`.
//! - [`from_document`]: a stored document back into a record.
//!
//! A field is "set" when it serializes to a non-null value. `Option<T>` is
//! therefore the presence flag: `Some(0)` is written, `None` never is.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{OrmError, Result};
use crate::record::{Record, StorageId};

/// A stored document: top-level keys mapped to JSON values.
pub type Document = Map<String, Value>;

/// The backend's implicit identity key.
pub const ID_KEY: &str = "_id";

/// Serializes any value that maps to a key/value object.
pub fn to_document<T: Serialize + ?Sized>(value: &T) -> Result<Document> {
    match serde_json::to_value(value)? {
        Value::Object(doc) => Ok(doc),
        other => Err(OrmError::Serde(format!(
            "expected a struct or map, got {}",
            kind_of(&other)
        ))),
    }
}

/// Builds the document inserted for a record that has no identity yet.
pub fn insert_document<R: Record>(record: &R, id: &StorageId) -> Result<Document> {
    let mut doc = to_document(record)?;
    doc.remove(R::ID_FIELD);
    doc.insert(ID_KEY.to_string(), Value::String(id.as_str().to_string()));
    Ok(doc)
}

/// Builds the `$set` payload for a merge-update: identity and unset fields
/// removed.
pub fn patch_document<R: Record>(record: &R) -> Result<Document> {
    let mut doc = to_document(record)?;
    doc.remove(R::ID_FIELD);
    doc.remove(ID_KEY);
    Ok(strip_unset(doc))
}

/// Builds an equality filter from the populated fields of a record.
pub fn filter_document<R: Record>(record: &R) -> Result<Document> {
    let mut doc = to_document(record)?;
    let id = doc.remove(R::ID_FIELD);

    let mut doc = strip_unset(doc);
    if let Some(id) = id.filter(|v| !v.is_null()) {
        doc.insert(ID_KEY.to_string(), id);
    }
    Ok(doc)
}

/// Deserializes a stored document into a record, moving `_id` back onto the
/// record's identity field.
pub fn from_document<R: Record>(mut doc: Document) -> Result<R> {
    if R::ID_FIELD != ID_KEY {
        if let Some(id) = doc.remove(ID_KEY) {
            doc.insert(R::ID_FIELD.to_string(), id);
        }
    }
    Ok(serde_json::from_value(Value::Object(doc))?)
}

/// Removes top-level `null` values.
pub fn strip_unset(mut doc: Document) -> Document {
    doc.retain(|_, v| !v.is_null());
    doc
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
