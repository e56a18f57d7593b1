//! Service configuration
//!
//! Entity declarations, store backend and server settings loaded from YAML.

mod lookup_config;

pub use lookup_config::{
    ChainConfig, ConfigError, EntityConfig, FieldConfig, FieldKindConfig, LookupConfig,
    ServerConfig, StoreBackend, StoreConfig, ThroughConfig, ADDR_ENV, CONFIG_PATH_ENV,
    DEFAULT_CONFIG_PATH,
};
