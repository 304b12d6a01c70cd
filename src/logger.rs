//! CollectionLogger - an `io::Write` sink that stores log lines as documents.

use std::io;

use chrono::Utc;
use serde_json::Value;

use crate::collection::Collection;
use crate::document::Document;
use crate::error::OrmError;

/// Stores every write as `{ timestamp, message }` in a collection.
///
/// The collection is resolved when the logger is created, so create it after
/// `Database::connect`; a logger created earlier fails every write with
/// `io::ErrorKind::NotConnected`.
#[derive(Debug, Clone)]
pub struct CollectionLogger {
    collection: Collection,
    prefix: String,
}

impl CollectionLogger {
    pub fn new(collection: Collection, prefix: &str) -> Self {
        Self {
            collection,
            prefix: prefix.to_string(),
        }
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }
}

impl io::Write for CollectionLogger {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.collection.is_connected() {
            return Err(io::Error::new(io::ErrorKind::NotConnected, OrmError::NotConnected));
        }

        let mut doc = Document::new();
        doc.insert("timestamp".into(), Value::String(Utc::now().to_rfc3339()));
        doc.insert(
            "message".into(),
            Value::String(format!("{} {}", self.prefix, String::from_utf8_lossy(buf))),
        );

        self.collection.insert_document(doc).map_err(io::Error::other)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
