//! Chained Select - Dependent Dropdown Lookup Service
//!
//! Resolves the options of a dependent ("chained") dropdown: given the
//! selected parent record and a relationship descriptor, returns the ordered
//! `{value, display}` list of child records linked to that parent. UI widgets
//! re-query whenever the parent control changes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Consumers: dependent dropdown widgets (HTTP + JSON)            │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 axum Router (/lookup, /lookup-all)              │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │        Resolver ──► Formatter        Registry (read-only)       │
//! │   (descriptor, parent) -> MatchResult -> [{value, display}]     │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │            RecordStore: MemoryStore (fixtures) | PgStore        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use chained_select::{build_router, AppState, LookupConfig, MemoryStore, Registry};
//!
//! let config = LookupConfig::from_file("config/lookup.yaml")?;
//! let registry = Arc::new(Registry::from_config(&config.entities)?);
//! let store = MemoryStore::from_fixture_file(&registry, "config/fixtures.yaml")?;
//!
//! let app = build_router(AppState::new(registry, Arc::new(store)));
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod formatter;
pub mod registry;
pub mod resolver;
pub mod server;
pub mod store;
pub mod types;

// Re-export main types
pub use config::{ConfigError, LookupConfig, StoreBackend};
pub use error::LookupError;
pub use formatter::{format_options, PLACEHOLDER_DISPLAY};
pub use registry::{Arity, EntityType, FieldKind, Registry, RegistryError};
pub use resolver::{LookupDescriptor, LookupMode, MatchResult, Resolver};
pub use server::{build_router, AppState};
pub use store::{MemoryStore, RecordStore, StoreError};
pub use types::{EntityTypeRef, KeyType, OptionEntry, OptionValue, Record, RecordId, Scalar};
