//! In-memory record store
//!
//! Holds fixture records per entity type in definition order. Immutable once
//! built, so concurrent lookups need no locking.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::registry::{Arity, EntityType, Registry};
use crate::store::fixtures::parse_fixtures;
use crate::store::traits::{LinkQuery, RecordStore, StoreError};
use crate::types::{EntityTypeRef, Record, RecordId, Scalar};

/// Record store backed by in-process vectors
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<EntityTypeRef, Vec<Record>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record; definition order is insertion order
    pub fn insert(&mut self, type_ref: EntityTypeRef, record: Record) {
        self.records.entry(type_ref).or_default().push(record);
    }

    /// Build a store from fixture YAML
    pub fn from_fixtures(registry: &Registry, yaml: &str) -> Result<Self, StoreError> {
        let mut store = Self::new();
        for (type_ref, record) in parse_fixtures(registry, yaml)? {
            store.insert(type_ref, record);
        }
        tracing::debug!(
            types = store.records.len(),
            records = store.len(),
            "Fixtures loaded"
        );
        Ok(store)
    }

    /// Build a store from a fixture file
    pub fn from_fixture_file(
        registry: &Registry,
        path: impl AsRef<Path>,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| StoreError::FixtureIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_fixtures(registry, &content)
    }

    /// Total number of records across all types
    pub fn len(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn records_of(&self, entity: &EntityType) -> &[Record] {
        self.records
            .get(entity.type_ref())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn passes_limits(record: &Record, limit_choices_to: &BTreeMap<String, Scalar>) -> bool {
    limit_choices_to
        .iter()
        .all(|(field, expected)| record.scalar(field).unwrap_or(&Scalar::Null) == expected)
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn filter_by_link(&self, query: &LinkQuery<'_>) -> Result<Vec<Record>, StoreError> {
        let field = query.field.name.as_str();
        let mut matched: Vec<Record> = self
            .records_of(query.entity)
            .iter()
            .filter(|record| match query.arity {
                Arity::Single => record.links(field).first() == Some(query.parent),
                Arity::Multi => record.links(field).contains(query.parent),
            })
            .filter(|record| passes_limits(record, query.limit_choices_to))
            .cloned()
            .collect();

        query.entity.sort_records(&mut matched);
        Ok(matched)
    }

    async fn fetch_by_ids(
        &self,
        entity: &EntityType,
        ids: &[RecordId],
        limit_choices_to: &BTreeMap<String, Scalar>,
    ) -> Result<Vec<Record>, StoreError> {
        let mut found: Vec<Record> = self
            .records_of(entity)
            .iter()
            .filter(|record| ids.contains(&record.id))
            .filter(|record| passes_limits(record, limit_choices_to))
            .cloned()
            .collect();

        entity.sort_records(&mut found);
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LookupConfig;

    fn registry() -> Registry {
        let config = LookupConfig::from_yaml(
            r#"
store:
  backend: memory
entities:
  - namespace: shop
    name: Category
  - namespace: shop
    name: Product
    display_template: "{name}"
    ordering: [name]
    fields:
      - name: name
      - name: active
      - name: category
        kind: foreign_key
        to: shop.Category
      - name: tags
        kind: many_to_many
        to: shop.Category
"#,
        )
        .unwrap();
        Registry::from_config(&config.entities).unwrap()
    }

    fn store(registry: &Registry) -> MemoryStore {
        MemoryStore::from_fixtures(
            registry,
            r#"
- model: shop.Category
  pk: 1
- model: shop.Category
  pk: 2
- model: shop.Product
  pk: 10
  fields: { name: Spade, active: true, category: 1, tags: [2] }
- model: shop.Product
  pk: 11
  fields: { name: Rake, active: false, category: 1, tags: [1, 2] }
- model: shop.Product
  pk: 12
  fields: { name: Hoe, active: true, category: 2, tags: [] }
"#,
        )
        .unwrap()
    }

    fn ids(records: &[Record]) -> Vec<RecordId> {
        records.iter().map(|r| r.id.clone()).collect()
    }

    #[tokio::test]
    async fn test_filter_single_sorted() {
        let registry = registry();
        let store = store(&registry);
        let product = registry.lookup("shop", "Product").unwrap();
        let parent = RecordId::Int(1);
        let no_limits = BTreeMap::new();

        let matched = store
            .filter_by_link(&LinkQuery {
                entity: product,
                field: product.field("category").unwrap(),
                arity: Arity::Single,
                parent: &parent,
                limit_choices_to: &no_limits,
            })
            .await
            .unwrap();
        assert_eq!(ids(&matched), vec![RecordId::Int(11), RecordId::Int(10)]);
    }

    #[tokio::test]
    async fn test_filter_multi_with_limits() {
        let registry = registry();
        let store = store(&registry);
        let product = registry.lookup("shop", "Product").unwrap();
        let parent = RecordId::Int(2);
        let mut limits = BTreeMap::new();
        limits.insert("active".to_string(), Scalar::Bool(true));

        let matched = store
            .filter_by_link(&LinkQuery {
                entity: product,
                field: product.field("tags").unwrap(),
                arity: Arity::Multi,
                parent: &parent,
                limit_choices_to: &limits,
            })
            .await
            .unwrap();
        assert_eq!(ids(&matched), vec![RecordId::Int(10)]);
    }

    #[tokio::test]
    async fn test_fetch_by_ids_skips_unknown() {
        let registry = registry();
        let store = store(&registry);
        let product = registry.lookup("shop", "Product").unwrap();

        let found = store
            .fetch_by_ids(
                product,
                &[RecordId::Int(12), RecordId::Int(99), RecordId::Int(10)],
                &BTreeMap::new(),
            )
            .await
            .unwrap();
        assert_eq!(ids(&found), vec![RecordId::Int(12), RecordId::Int(10)]);
        assert_eq!(store.len(), 5);
    }

    #[tokio::test]
    async fn test_fetch_by_ids_applies_limits() {
        let registry = registry();
        let store = store(&registry);
        let product = registry.lookup("shop", "Product").unwrap();
        let mut limits = BTreeMap::new();
        limits.insert("active".to_string(), Scalar::Bool(true));

        let found = store
            .fetch_by_ids(
                product,
                &[RecordId::Int(11), RecordId::Int(12), RecordId::Int(10)],
                &limits,
            )
            .await
            .unwrap();
        assert_eq!(ids(&found), vec![RecordId::Int(12), RecordId::Int(10)]);
    }

    #[tokio::test]
    async fn test_missing_scalar_sorts_first() {
        let registry = registry();
        let mut store = store(&registry);
        store.insert(
            EntityTypeRef::new("shop", "Product"),
            Record::new(13).with_links("category", vec![RecordId::Int(1)]),
        );
        let product = registry.lookup("shop", "Product").unwrap();
        let parent = RecordId::Int(1);

        let matched = store
            .filter_by_link(&LinkQuery {
                entity: product,
                field: product.field("category").unwrap(),
                arity: Arity::Single,
                parent: &parent,
                limit_choices_to: &BTreeMap::new(),
            })
            .await
            .unwrap();
        assert_eq!(
            ids(&matched),
            vec![RecordId::Int(13), RecordId::Int(11), RecordId::Int(10)]
        );
    }
}
