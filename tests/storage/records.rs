//! Record types shared by the storage tests.

use std::collections::HashMap;

use record_orm::{Record, StorageIdentity};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Record)]
#[serde(default)]
pub struct Invoice {
    pub id: StorageIdentity,
    pub number: Option<u32>,
    pub customer: Option<String>,
    pub total: Option<i64>,
}

impl Invoice {
    pub fn new(number: u32, customer: &str, total: i64) -> Self {
        Self {
            number: Some(number),
            customer: Some(customer.to_string()),
            total: Some(total),
            ..Default::default()
        }
    }

    /// A record carrying only the identity of `other`.
    pub fn with_id_of(other: &Invoice) -> Self {
        Self {
            id: other.id.clone(),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Record)]
#[serde(default)]
pub struct Status {
    pub id: StorageIdentity,
    pub code: Option<String>,
}

/// Stored under an explicit name instead of the inferred `bus`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Record)]
#[record(collection = "buses")]
#[serde(default)]
pub struct Bus {
    pub id: StorageIdentity,
    pub route: Option<String>,
}

/// A web session: the login flow flips `authenticated` without touching
/// `values`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Record)]
#[serde(default)]
pub struct Session {
    pub id: StorageIdentity,
    pub authenticated: Option<bool>,
    pub values: Option<HashMap<String, String>>,
}

/// Identity under a custom field and key.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Record)]
#[serde(default)]
pub struct Credential {
    #[record(id)]
    #[serde(rename = "ref")]
    pub storage: StorageIdentity,
    pub username: Option<String>,
    pub provider: Option<String>,
}

/// A document with three plain fields, for projection tests.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Record)]
#[serde(default)]
pub struct Triple {
    pub id: StorageIdentity,
    pub a: Option<String>,
    pub b: Option<i32>,
    pub c: Option<bool>,
}

/// camelCase keys, identity included.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Record)]
#[serde(default, rename_all = "camelCase")]
pub struct Account {
    #[record(id)]
    pub storage_id: StorageIdentity,
    pub display_name: Option<String>,
    pub plan: Option<String>,
}
