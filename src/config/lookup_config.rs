//! Lookup configuration parsing
//!
//! Loads the entity declarations and runtime settings from YAML and provides
//! strongly-typed access to them. The registry is built from `entities`;
//! nothing in here is consulted per request.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::types::{KeyType, Scalar};

/// Default configuration path
pub const DEFAULT_CONFIG_PATH: &str = "config/lookup.yaml";

/// Env var overriding the configuration path
pub const CONFIG_PATH_ENV: &str = "CHAINED_SELECT_CONFIG";

/// Env var overriding `server.bind_addr`
pub const ADDR_ENV: &str = "CHAINED_SELECT_ADDR";

/// Errors raised while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct LookupConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub entities: Vec<EntityConfig>,
}

/// HTTP server settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

/// Which record store backs the lookups
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Records loaded from a YAML fixture file at startup
    Memory,
    /// Records queried from Postgres (requires the `database` feature)
    Postgres,
}

/// Record store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Fixture file for the memory backend
    #[serde(default)]
    pub fixtures: Option<String>,
    /// Env var holding the Postgres connection string
    #[serde(default = "default_connection_env")]
    pub connection_string_env: String,
}

fn default_connection_env() -> String {
    "DATABASE_URL".to_string()
}

/// Declaration of a single entity type
#[derive(Debug, Clone, Deserialize)]
pub struct EntityConfig {
    pub namespace: String,
    pub name: String,
    #[serde(default)]
    pub key_type: KeyType,
    /// Template for display value (e.g., "{first_name} {last_name}")
    #[serde(default)]
    pub display_template: Option<String>,
    /// Natural ordering, `-` prefix for descending (e.g., ["-year", "name"])
    #[serde(default)]
    pub ordering: Vec<String>,
    /// Fully qualified table name for the Postgres backend
    #[serde(default)]
    pub table: Option<String>,
    /// Primary key column for the Postgres backend
    #[serde(default)]
    pub key_column: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

/// Declared field kind
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FieldKindConfig {
    #[default]
    Scalar,
    ForeignKey,
    OneToOne,
    ManyToMany,
    /// Relationship-typed field without a fixed target (polymorphic link)
    GenericRelation,
}

/// Declaration of a single field
#[derive(Debug, Clone, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(default)]
    pub kind: FieldKindConfig,
    /// Related entity in `namespace.Name` form
    #[serde(default)]
    pub to: Option<String>,
    /// Column name override for the Postgres backend
    #[serde(default)]
    pub column: Option<String>,
    /// Join table for many-to-many fields on the Postgres backend
    #[serde(default)]
    pub through: Option<ThroughConfig>,
    /// Marks this field as a chained (dependent) selection
    #[serde(default)]
    pub chain: Option<ChainConfig>,
}

/// Join table mapping of a many-to-many field
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ThroughConfig {
    pub table: String,
    /// Column referencing the owning entity
    pub source_column: String,
    /// Column referencing the related entity
    pub target_column: String,
}

/// Chained selection declaration on a dependent field
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// Field on the same entity whose value drives this one
    pub parent_field: String,
    /// Field on the related entity compared against the parent value
    pub target_field: String,
    /// Static equality filters applied to the related entity
    #[serde(default)]
    pub limit_choices_to: BTreeMap<String, Scalar>,
    /// Whether the UI should use the inclusive route
    #[serde(default)]
    pub show_all: bool,
}

impl LookupConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply environment overrides on top of the file settings
    pub fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var(ADDR_ENV) {
            self.server.bind_addr = addr;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
store:
  backend: memory
  fixtures: "config/fixtures.yaml"

entities:
  - namespace: test_app
    name: Continent
    display_template: "{name}"
    ordering: [name]
    fields:
      - name: name
  - namespace: test_app
    name: Location
    fields:
      - name: continent
        kind: foreign_key
        to: test_app.Continent
      - name: country
        kind: foreign_key
        to: test_app.Country
        chain:
          parent_field: continent
          target_field: continent
          limit_choices_to:
            active: true
"#;

        let config = LookupConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.store.connection_string_env, "DATABASE_URL");
        assert_eq!(config.entities.len(), 2);

        let continent = &config.entities[0];
        assert_eq!(continent.key_type, KeyType::Integer);
        assert_eq!(continent.ordering, vec!["name".to_string()]);
        assert_eq!(continent.fields[0].kind, FieldKindConfig::Scalar);

        let country = &config.entities[1].fields[1];
        assert_eq!(country.kind, FieldKindConfig::ForeignKey);
        let chain = country.chain.as_ref().unwrap();
        assert_eq!(chain.parent_field, "continent");
        assert!(!chain.show_all);
        assert_eq!(chain.limit_choices_to.get("active"), Some(&Scalar::Bool(true)));
    }

    #[test]
    fn test_parse_postgres_mapping() {
        let yaml = r#"
server:
  bind_addr: "127.0.0.1:8080"
store:
  backend: postgres
  connection_string_env: LOOKUP_DB
entities:
  - namespace: test_app
    name: Writer
    key_type: integer
    table: '"library".writers'
    key_column: writer_id
    fields:
      - name: publications
        kind: many_to_many
        to: test_app.Publication
        through:
          table: '"library".writer_publications'
          source_column: writer_id
          target_column: publication_id
"#;
        let config = LookupConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.store.backend, StoreBackend::Postgres);
        assert_eq!(config.store.connection_string_env, "LOOKUP_DB");

        let writer = &config.entities[0];
        assert_eq!(writer.key_column.as_deref(), Some("writer_id"));
        assert_eq!(
            writer.fields[0].through.as_ref().unwrap().target_column,
            "publication_id"
        );
    }

    #[test]
    fn test_rejects_unknown_kind() {
        let yaml = r#"
store:
  backend: memory
entities:
  - namespace: a
    name: B
    fields:
      - name: c
        kind: one_to_many
"#;
        assert!(matches!(
            LookupConfig::from_yaml(yaml),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = LookupConfig::from_file("does/not/exist.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
