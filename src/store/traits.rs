//! Core traits and types for the record store abstraction

use async_trait::async_trait;
use std::collections::BTreeMap;

use crate::registry::{Arity, EntityType, FieldDescriptor};
use crate::types::{Record, RecordId, Scalar};

/// A "records linked to this parent" query
#[derive(Debug, Clone, Copy)]
pub struct LinkQuery<'a> {
    /// Entity whose records are returned
    pub entity: &'a EntityType,
    /// Relation field on `entity` compared against `parent`
    pub field: &'a FieldDescriptor,
    pub arity: Arity,
    pub parent: &'a RecordId,
    /// Extra scalar equality filters
    pub limit_choices_to: &'a BTreeMap<String, Scalar>,
}

/// Read-only record access
///
/// Implementations must be Send + Sync for use in async contexts. Results
/// are returned in the entity's natural ordering, falling back to
/// definition order.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Records whose relation field equals (single) or contains (multi) the parent id
    async fn filter_by_link(&self, query: &LinkQuery<'_>) -> Result<Vec<Record>, StoreError>;

    /// Records with the given ids; unknown ids are skipped
    async fn fetch_by_ids(
        &self,
        entity: &EntityType,
        ids: &[RecordId],
        limit_choices_to: &BTreeMap<String, Scalar>,
    ) -> Result<Vec<Record>, StoreError>;
}

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read fixtures {path}: {source}")]
    FixtureIo {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid fixtures: {0}")]
    Fixture(String),
    #[error("Query failed: {0}")]
    Query(String),
    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
