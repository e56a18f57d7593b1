//! Fixture loading
//!
//! Fixtures are a YAML list of records in the familiar
//! `model` / `pk` / `fields` shape:
//!
//! ```yaml
//! - model: test_app.Country
//!   pk: 1
//!   fields:
//!     name: Czech republic
//!     continent: 1
//! ```
//!
//! Every entry is typed against the registry: unknown models or fields are
//! load errors, relation values are converted to ids of the related type.

use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};

use crate::registry::{Arity, FieldKind, Registry};
use crate::store::StoreError;
use crate::types::{EntityTypeRef, KeyType, Record, RecordId, Scalar};

#[derive(Debug, Deserialize)]
struct FixtureEntry {
    model: String,
    pk: serde_yaml::Value,
    #[serde(default)]
    fields: BTreeMap<String, serde_yaml::Value>,
}

/// Parse fixture YAML into typed records, in file order
pub fn parse_fixtures(
    registry: &Registry,
    yaml: &str,
) -> Result<Vec<(EntityTypeRef, Record)>, StoreError> {
    let entries: Vec<FixtureEntry> =
        serde_yaml::from_str(yaml).map_err(|e| StoreError::Fixture(e.to_string()))?;

    let mut seen: HashSet<(EntityTypeRef, RecordId)> = HashSet::new();
    let mut records = Vec::with_capacity(entries.len());

    for entry in entries {
        let type_ref = EntityTypeRef::parse(&entry.model)
            .ok_or_else(|| StoreError::Fixture(format!("malformed model '{}'", entry.model)))?;
        let entity = registry
            .get(&type_ref)
            .ok_or_else(|| StoreError::Fixture(format!("unknown model {type_ref}")))?;

        let id = id_from_yaml(entity.key_type(), &entry.pk).ok_or_else(|| {
            StoreError::Fixture(format!("{type_ref}: invalid pk {:?}", entry.pk))
        })?;
        if !seen.insert((type_ref.clone(), id.clone())) {
            return Err(StoreError::Fixture(format!("{type_ref}: duplicate pk {id}")));
        }

        let mut record = Record::new(id);
        for (name, value) in entry.fields {
            let field = entity.field(&name).ok_or_else(|| {
                StoreError::Fixture(format!("{type_ref}: unknown field '{name}'"))
            })?;
            match &field.kind {
                FieldKind::Scalar => {
                    let scalar: Scalar = serde_yaml::from_value(value).map_err(|e| {
                        StoreError::Fixture(format!("{type_ref}.{name}: {e}"))
                    })?;
                    record.scalars.insert(name, scalar);
                }
                FieldKind::Relation { target, arity } => {
                    let target_key = registry
                        .get(target)
                        .map(|t| t.key_type())
                        .unwrap_or_default();
                    let ids = relation_ids(target_key, *arity, &value).ok_or_else(|| {
                        StoreError::Fixture(format!("{type_ref}.{name}: invalid link {value:?}"))
                    })?;
                    record.links.insert(name, ids);
                }
                FieldKind::GenericRelation => {
                    return Err(StoreError::Fixture(format!(
                        "{type_ref}.{name}: generic relations cannot be loaded from fixtures"
                    )))
                }
            }
        }

        records.push((type_ref, record));
    }

    Ok(records)
}

fn relation_ids(key_type: KeyType, arity: Arity, value: &serde_yaml::Value) -> Option<Vec<RecordId>> {
    match (arity, value) {
        (_, serde_yaml::Value::Null) => Some(Vec::new()),
        (Arity::Single, single) => id_from_yaml(key_type, single).map(|id| vec![id]),
        (Arity::Multi, serde_yaml::Value::Sequence(items)) => items
            .iter()
            .map(|item| id_from_yaml(key_type, item))
            .collect(),
        (Arity::Multi, _) => None,
    }
}

fn id_from_yaml(key_type: KeyType, value: &serde_yaml::Value) -> Option<RecordId> {
    match (key_type, value) {
        (KeyType::Integer, serde_yaml::Value::Number(n)) => n.as_i64().map(RecordId::Int),
        (KeyType::Integer, serde_yaml::Value::String(s)) => key_type.parse(s),
        (KeyType::String, serde_yaml::Value::String(s)) => key_type.parse(s),
        (KeyType::String, serde_yaml::Value::Number(n)) => Some(RecordId::Str(n.to_string())),
        _ => None,
    }
}
