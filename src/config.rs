//! DatabaseConfig - connection settings, from the environment or any serde
//! source.

use serde::{Deserialize, Serialize};

use crate::error::{OrmError, Result};

const DEFAULT_URL: &str = "mongodb://localhost/test1";

/// Connection settings for [`Registry::open`](crate::Registry::open).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `<scheme>://[user[:password]@]host[:port]/<database-name>`
    pub url: String,
    /// Overrides the database named in `url`.
    pub name: Option<String>,
    pub debug: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            name: None,
            debug: false,
        }
    }
}

impl DatabaseConfig {
    /// Reads `DBURL`, `DBNAME` and `DBDEBUG`. Unset variables keep their
    /// defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup("DBURL").filter(|v| !v.is_empty()) {
            config.url = url;
        }
        config.name = lookup("DBNAME").filter(|v| !v.is_empty());
        if let Some(debug) = lookup("DBDEBUG") {
            config.debug = parse_flag(&debug).ok_or_else(|| {
                OrmError::Config(format!("DBDEBUG: expected a boolean, got '{}'", debug))
            })?;
        }

        Ok(config)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
