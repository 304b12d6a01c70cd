//! Record verbs against a live MongoDB server.
//!
//! Runs only when `DBURL` names a `mongodb://` server, for example
//! `DBURL=mongodb://localhost/record_orm_test cargo test --test mongodb`.
//! Without it every test returns early.

use record_orm::{Database, DatabaseConfig, OrmError, Record, Registry, StorageIdentity};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Record)]
#[serde(default, rename_all = "camelCase")]
#[record(collection = "record_orm_live_tickets")]
struct Ticket {
    #[record(id)]
    ticket_id: StorageIdentity,
    title: Option<String>,
    open: Option<bool>,
}

fn live_db() -> Option<Database> {
    let config = DatabaseConfig::from_env().ok()?;
    if !config.url.starts_with("mongodb://") {
        return None;
    }
    let db = Registry::default().open(&config).unwrap();
    db.connect().unwrap();
    Some(db)
}

#[test]
fn connect_reports_build_info() {
    let Some(db) = live_db() else { return };
    assert!(db.version().starts_with("MongoDB "));
    assert!(!db.system_information().is_empty());
    db.disconnect().unwrap();
}

#[test]
fn save_merge_find_remove() {
    let Some(db) = live_db() else { return };

    let mut ticket = Ticket {
        title: Some("flaky build".into()),
        open: Some(true),
        ..Default::default()
    };
    db.save(&mut ticket).unwrap();
    let id = ticket.storage_id().cloned().unwrap();

    let mut close = Ticket {
        ticket_id: StorageIdentity::new(id.clone()),
        open: Some(false),
        ..Default::default()
    };
    db.save(&mut close).unwrap();

    let mut loaded = Ticket {
        ticket_id: StorageIdentity::new(id),
        ..Default::default()
    };
    db.find(&mut loaded).unwrap();
    assert_eq!(loaded.title.as_deref(), Some("flaky build"));
    assert_eq!(loaded.open, Some(false));

    db.remove(&loaded).unwrap();
    assert_eq!(db.find(&mut loaded), Err(OrmError::NotFound));
    assert_eq!(db.remove(&loaded), Err(OrmError::NotFound));
}

#[test]
fn identity_only_save_is_a_noop() {
    let Some(db) = live_db() else { return };

    let mut ticket = Ticket {
        title: Some("noop".into()),
        ..Default::default()
    };
    db.save(&mut ticket).unwrap();
    let mut bare = Ticket {
        ticket_id: ticket.ticket_id.clone(),
        ..Default::default()
    };
    db.save(&mut bare).unwrap();
    db.remove(&ticket).unwrap();
}

#[test]
fn dropping_a_missing_collection() {
    let Some(db) = live_db() else { return };

    let missing = db.c("record_orm_live_never_created");
    missing.drop().unwrap();
    assert_eq!(missing.count().unwrap(), 0);
}
