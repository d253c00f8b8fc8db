//! Configuration handling
//!
//! Loads the declarative document: the `[[tables]]` list becomes the desired
//! schema and a `[database]`/`[database_<env>]` section becomes the
//! connection profile.

use serde::{Deserialize, Deserializer, Serialize};
use std::fs;

use crate::error::{Error, Result};
use crate::schema::document::{Scalar, SchemaDocument, TableDocument};
use crate::schema::types::DatabaseSchema;

const DEFAULT_CHARSET: &str = "utf8mb4,utf8";
const DEFAULT_COLLATION: &str = "utf8mb4_general_ci";

/// Desired schema plus the profile used to reach the live database
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub profile: ConnectionProfile,
    pub schema: DatabaseSchema,
}

/// Database connection profile
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ConnectionProfile {
    pub name: String,
    pub user: String,
    pub pass: String,
    pub host: String,
    #[serde(deserialize_with = "string_or_number")]
    pub port: String,
    #[serde(default = "default_charset")]
    pub charset: String,
    #[serde(default = "default_collation")]
    pub collation: String,
    pub timeout_seconds: Option<u64>,
}

fn default_charset() -> String {
    DEFAULT_CHARSET.to_string()
}

fn default_collation() -> String {
    DEFAULT_COLLATION.to_string()
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Scalar::deserialize(deserializer).map(Scalar::into_string)
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub format: String,
    /// Log to stderr when no file is set
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            format: "text".to_string(),
            console: true,
        }
    }
}

/// Top level of the declarative document
#[derive(Debug, Deserialize)]
struct RawDocument {
    tables: Option<Vec<TableDocument>>,
    #[serde(flatten)]
    sections: toml::Table,
}

/// Section holding the connection profile for an environment
pub fn profile_key(env: Option<&str>) -> String {
    match env {
        Some(env) if !env.is_empty() => format!("database_{}", env),
        _ => "database".to_string(),
    }
}

/// Load configuration from a TOML file.
///
/// With `connection_path` the profile is read from that file instead.
pub fn load_from_file(
    path: &str,
    env: Option<&str>,
    connection_path: Option<&str>,
) -> Result<LoadedConfig> {
    let config_str = read(path)?;
    let connection_str = connection_path.map(read).transpose()?;
    load_from_str(&config_str, env, connection_str.as_deref())
}

fn read(path: &str) -> Result<String> {
    fs::read_to_string(path)
        .map_err(|e| Error::ConfigError(format!("Failed to read config file {}: {}", path, e)))
}

/// Load configuration from document text
pub fn load_from_str(
    config_str: &str,
    env: Option<&str>,
    connection_str: Option<&str>,
) -> Result<LoadedConfig> {
    let document: RawDocument = toml::from_str(config_str)
        .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?;

    let key = profile_key(env);
    let profile = match connection_str {
        Some(text) => {
            let sections: toml::Table = toml::from_str(text).map_err(|e| {
                Error::ConfigError(format!("Failed to parse connection file: {}", e))
            })?;
            find_profile(&sections, &key)?
        }
        None => find_profile(&document.sections, &key)?,
    };

    let tables = document
        .tables
        .ok_or_else(|| Error::ConfigError("tables are not found".to_string()))?;
    let schema = SchemaDocument { tables }.into_schema()?;

    tracing::debug!(
        profile = %key,
        database = %profile.name,
        tables = schema.tables.len(),
        "Loaded declarative schema"
    );

    Ok(LoadedConfig { profile, schema })
}

fn find_profile(sections: &toml::Table, key: &str) -> Result<ConnectionProfile> {
    let section = sections
        .get(key)
        .ok_or_else(|| Error::ConfigError(format!("database setting {} are not found", key)))?;
    section
        .clone()
        .try_into()
        .map_err(|e| Error::ConfigError(format!("{}: {}", key, e)))
}
