//! MongoDriver - the MongoDB backend, on the official driver's blocking API.
//!
//! Documents cross the boundary as relaxed extended JSON, so plain values map
//! to their natural BSON types and back. Identities are ObjectId hex strings
//! stored as `_id`; documents written by other applications with a native
//! ObjectId `_id` are read back as the same hex string.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ::mongodb::bson::{self, doc, oid::ObjectId, Bson};
use ::mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use ::mongodb::sync::{Client, Collection as MongoHandle, Database as MongoDatabase};
use serde_json::Value;
use url::Url;

use super::{
    BackendCollection, BackendError, ConnectTarget, Driver, FindSpec, Projection, ServerInfo,
    Session,
};
use crate::document::{Document, ID_KEY};
use crate::record::StorageId;

const SERVER_NAME: &str = "MongoDB";

/// Server selection timeout applied unless the connection string sets one,
/// so an unreachable server fails `connect` quickly.
const FAIL_FAST_TIMEOUT_MS: u32 = 5000;

const CODE_AUTH_FAILED: i32 = 18;
const CODE_NAMESPACE_NOT_FOUND: i32 = 26;
const CODE_DUPLICATE_KEY: i32 = 11000;

/// Driver for `mongodb://` connection strings.
#[derive(Debug, Clone, Default)]
pub struct MongoDriver {
    options: Option<String>,
}

impl MongoDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the query options of the connection string (`authSource`,
    /// `replicaSet`, timeouts and so on) for every session it opens.
    pub fn from_url(url: &Url) -> Self {
        Self {
            options: url.query().filter(|q| !q.is_empty()).map(str::to_string),
        }
    }

    /// The connection string handed to the client. Credentials are passed
    /// through as they appear in the original URL (percent-encoded).
    fn uri(&self, target: &ConnectTarget) -> String {
        let mut uri = String::from("mongodb://");
        if let Some(username) = &target.username {
            uri.push_str(username);
            if let Some(password) = &target.password {
                uri.push(':');
                uri.push_str(password);
            }
            uri.push('@');
        }
        uri.push_str(&target.address());
        uri.push('/');
        uri.push_str(&target.database);

        let mut options: Vec<String> = self.options.iter().cloned().collect();
        let has_timeout = self
            .options
            .as_deref()
            .is_some_and(|o| o.to_ascii_lowercase().contains("serverselectiontimeoutms"));
        if !has_timeout {
            options.push(format!("serverSelectionTimeoutMS={}", FAIL_FAST_TIMEOUT_MS));
        }
        uri.push('?');
        uri.push_str(&options.join("&"));
        uri
    }
}

impl Driver for MongoDriver {
    fn server_name(&self) -> &str {
        SERVER_NAME
    }

    /// Opens a client and pings the target database, so bad credentials and
    /// unreachable servers fail here rather than on first use.
    fn connect(&self, target: &ConnectTarget) -> Result<Arc<dyn Session>, BackendError> {
        let client = Client::with_uri_str(self.uri(target)).map_err(classify)?;
        let database = client.database(&target.database);
        database.run_command(doc! { "ping": 1 }).run().map_err(classify)?;

        Ok(Arc::new(MongoSession {
            database,
            debug: Arc::new(AtomicBool::new(false)),
            closed: Arc::new(AtomicBool::new(false)),
        }))
    }

    fn new_id(&self) -> StorageId {
        StorageId::new(ObjectId::new().to_hex())
    }
}

/// A client bound to one database.
pub struct MongoSession {
    database: MongoDatabase,
    debug: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl Session for MongoSession {
    fn server_info(&self) -> Result<ServerInfo, BackendError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BackendError::Closed);
        }
        let build_info = self
            .database
            .run_command(doc! { "buildInfo": 1 })
            .run()
            .map_err(classify)?;
        Ok(server_info_from(&build_info))
    }

    fn collection(&self, name: &str) -> Arc<dyn BackendCollection> {
        Arc::new(MongoCollection {
            inner: self.database.collection::<bson::Document>(name),
            database: self.database.name().to_string(),
            name: name.to_string(),
            debug: Arc::clone(&self.debug),
            closed: Arc::clone(&self.closed),
        })
    }

    fn set_debug(&self, on: bool) {
        self.debug.store(on, Ordering::SeqCst);
    }

    fn close(&self) {
        // the client pool is released once the last collection handle drops
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// One collection of a [`MongoSession`].
pub struct MongoCollection {
    inner: MongoHandle<bson::Document>,
    database: String,
    name: String,
    debug: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl MongoCollection {
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
                target: "record_orm::mongo",
                database = %self.database,
                collection = %self.name,
                "{} {}",
                op,
                detail()
            );
        }
    }
}

impl BackendCollection for MongoCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn count(&self) -> Result<usize, BackendError> {
        self.ensure_open()?;
        let n = self
            .inner
            .count_documents(doc! {})
            .run()
            .map_err(classify)?;
        Ok(n as usize)
    }

    fn drop_collection(&self) -> Result<(), BackendError> {
        self.ensure_open()?;
        self.trace("drop", || self.name.clone());
        self.inner.drop().run().map_err(classify)
    }

    fn insert(&self, doc: Document) -> Result<(), BackendError> {
        self.ensure_open()?;
        self.trace("insert", || Value::Object(doc.clone()).to_string());

        let doc = to_bson(doc)?;
        self.inner.insert_one(doc).run().map_err(classify)?;
        Ok(())
    }

    fn upsert_set(&self, id: &StorageId, patch: Document) -> Result<(), BackendError> {
        self.ensure_open()?;
        if patch.is_empty() {
            return Err(BackendError::EmptyUpdate);
        }
        self.trace("upsert", || format!("{} {}", id, Value::Object(patch.clone())));

        let update = doc! { "$set": to_bson(patch)? };
        self.inner
            .update_one(id_filter(id), update)
            .upsert(true)
            .run()
            .map_err(classify)?;
        Ok(())
    }

    fn find(&self, spec: &FindSpec) -> Result<Vec<Document>, BackendError> {
        self.ensure_open()?;
        self.trace("find", || Value::Object(spec.filter.clone()).to_string());

        let mut find = self
            .inner
            .find(to_bson(spec.filter.clone())?)
            .skip(spec.skip as u64);
        if let Some(limit) = spec.limit {
            find = find.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        if let Some(projection) = projection_document(&spec.projection) {
            find = find.projection(projection);
        }

        find.run()
            .map_err(classify)?
            .map(|doc| doc.map_err(classify).and_then(from_bson))
            .collect()
    }

    fn count_matching(&self, spec: &FindSpec) -> Result<usize, BackendError> {
        self.ensure_open()?;
        let mut count = self
            .inner
            .count_documents(to_bson(spec.filter.clone())?)
            .skip(spec.skip as u64);
        if let Some(limit) = spec.limit {
            count = count.limit(limit as u64);
        }
        Ok(count.run().map_err(classify)? as usize)
    }

    fn remove(&self, filter: &Document) -> Result<(), BackendError> {
        self.ensure_open()?;
        self.trace("remove", || Value::Object(filter.clone()).to_string());

        let result = self
            .inner
            .delete_one(to_bson(filter.clone())?)
            .run()
            .map_err(classify)?;
        if result.deleted_count == 0 {
            return Err(BackendError::NotFound);
        }
        Ok(())
    }
}

fn id_filter(id: &StorageId) -> bson::Document {
    let mut filter = bson::Document::new();
    filter.insert(ID_KEY, id.as_str());
    filter
}

/// Folds a driver error into the backend sentinels the mapper understands.
fn classify(err: MongoError) -> BackendError {
    match err.kind.as_ref() {
        ErrorKind::Command(command) => from_code(command.code, &command.message),
        ErrorKind::Write(WriteFailure::WriteError(write)) => from_code(write.code, &write.message),
        ErrorKind::Authentication { message, .. } => BackendError::AuthFailed(message.clone()),
        ErrorKind::ServerSelection { message, .. } => BackendError::Unreachable(message.clone()),
        _ => BackendError::Other(err.to_string()),
    }
}

fn from_code(code: i32, message: &str) -> BackendError {
    match code {
        CODE_NAMESPACE_NOT_FOUND => BackendError::NamespaceNotFound(message.to_string()),
        CODE_DUPLICATE_KEY => BackendError::DuplicateKey(message.to_string()),
        CODE_AUTH_FAILED => BackendError::AuthFailed(message.to_string()),
        // older servers report these by message only
        _ if message.starts_with("ns not found") => {
            BackendError::NamespaceNotFound(message.to_string())
        }
        _ if message.starts_with("'$set' is empty") => BackendError::EmptyUpdate,
        _ => BackendError::Other(format!("{} (code {})", message, code)),
    }
}

fn server_info_from(build_info: &bson::Document) -> ServerInfo {
    let version = build_info.get_str("version").unwrap_or_default().to_string();

    let system = match build_info.get_str("sysInfo") {
        Ok(sys_info) if !sys_info.is_empty() && sys_info != "deprecated" => sys_info.to_string(),
        _ => build_info
            .get_document("buildEnvironment")
            .map(|env| {
                let os = env.get_str("target_os").unwrap_or_default();
                let arch = env.get_str("target_arch").unwrap_or_default();
                format!("{} {}", os, arch).trim().to_string()
            })
            .unwrap_or_default(),
    };

    ServerInfo {
        server: SERVER_NAME.to_string(),
        version,
        system,
    }
}

fn projection_document(projection: &Projection) -> Option<bson::Document> {
    let (fields, flag) = match projection {
        Projection::All => return None,
        Projection::Include(fields) => (fields, 1),
        Projection::Exclude(fields) => (fields, 0),
    };
    Some(
        fields
            .iter()
            .map(|field| (field.clone(), Bson::Int32(flag)))
            .collect(),
    )
}

fn to_bson(doc: Document) -> Result<bson::Document, BackendError> {
    match Bson::try_from(Value::Object(doc)) {
        Ok(Bson::Document(doc)) => Ok(doc),
        Ok(other) => Err(BackendError::Other(format!(
            "expected a document, got {:?}",
            other.element_type()
        ))),
        Err(err) => Err(BackendError::Other(err.to_string())),
    }
}

fn from_bson(mut doc: bson::Document) -> Result<Document, BackendError> {
    if let Some(Bson::ObjectId(oid)) = doc.get(ID_KEY) {
        let hex = oid.to_hex();
        doc.insert(ID_KEY, hex);
    }
    match Bson::Document(doc).into_relaxed_extjson() {
        Value::Object(doc) => Ok(doc),
        other => Err(BackendError::Other(format!("expected a document, got {}", other))),
    }
}
