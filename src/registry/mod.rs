//! Registry of entity types keyed by `(namespace, name)`
//!
//! Built once from configuration at startup and shared read-only (behind an
//! `Arc`) by every request. All cross-type validation happens here so the
//! resolver never has to re-check relation targets at request time.

mod entity;

pub use entity::{
    Arity, ChainSpec, DisplayTemplate, EntityType, FieldDescriptor, FieldKind, OrderKey,
};

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::config::{EntityConfig, FieldConfig, FieldKindConfig, ThroughConfig};
use crate::types::EntityTypeRef;

/// Errors raised while building the registry
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Duplicate entity type {0}")]
    DuplicateType(EntityTypeRef),
    #[error("Duplicate field '{field}' on {entity}")]
    DuplicateField { entity: EntityTypeRef, field: String },
    #[error("Relation field {entity}.{field} must declare `to`")]
    MissingTarget { entity: EntityTypeRef, field: String },
    #[error("Relation field {entity}.{field} has malformed target '{target}'")]
    InvalidTarget {
        entity: EntityTypeRef,
        field: String,
        target: String,
    },
    #[error("Relation field {entity}.{field} targets unregistered type {target}")]
    UnknownTarget {
        entity: EntityTypeRef,
        field: String,
        target: EntityTypeRef,
    },
    #[error("Ordering on {entity} names unknown field '{field}'")]
    UnknownOrderingField { entity: EntityTypeRef, field: String },
    #[error("Ordering on {entity} names '{field}', which is not a scalar or single-valued relation")]
    UnorderableField { entity: EntityTypeRef, field: String },
    #[error("Display template on {entity} names unknown scalar field '{field}'")]
    UnknownDisplayField { entity: EntityTypeRef, field: String },
    #[error("Chain on {entity}.{field} is invalid: {reason}")]
    InvalidChain {
        entity: EntityTypeRef,
        field: String,
        reason: String,
    },
}

/// A declared chained pair, as exposed to UI collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainInfo {
    /// Entity owning the dependent field
    pub source: EntityTypeRef,
    pub source_field: String,
    /// Form field the dependent field follows
    pub parent_field: String,
    /// Entity whose records populate the dependent field
    pub target: EntityTypeRef,
    pub target_field: String,
    pub show_all: bool,
}

/// Registry of all known entity types
#[derive(Debug, Default)]
pub struct Registry {
    types: HashMap<EntityTypeRef, EntityType>,
}

impl Registry {
    /// Build and validate the registry from entity declarations
    pub fn from_config(entities: &[EntityConfig]) -> Result<Self, RegistryError> {
        let mut known = HashSet::new();
        for config in entities {
            let type_ref = EntityTypeRef::new(&config.namespace, &config.name);
            if !known.insert(type_ref.clone()) {
                return Err(RegistryError::DuplicateType(type_ref));
            }
        }

        let mut types = HashMap::with_capacity(entities.len());
        for config in entities {
            let entity = build_entity(config, &known)?;
            types.insert(entity.type_ref.clone(), entity);
        }

        let registry = Self { types };
        for entity in registry.types.values() {
            registry.validate_chains(entity)?;
        }

        tracing::debug!(types = registry.types.len(), "Entity registry built");
        Ok(registry)
    }

    pub fn get(&self, type_ref: &EntityTypeRef) -> Option<&EntityType> {
        self.types.get(type_ref)
    }

    pub fn lookup(&self, namespace: &str, name: &str) -> Option<&EntityType> {
        self.get(&EntityTypeRef::new(namespace, name))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// All declared chained pairs, sorted by source type and field
    pub fn chains(&self) -> Vec<ChainInfo> {
        let mut chains: Vec<ChainInfo> = self
            .types
            .values()
            .flat_map(|entity| {
                entity.fields().iter().filter_map(move |field| {
                    let chain = field.chain.as_ref()?;
                    let FieldKind::Relation { target, .. } = &field.kind else {
                        return None;
                    };
                    Some(ChainInfo {
                        source: entity.type_ref().clone(),
                        source_field: field.name.clone(),
                        parent_field: chain.parent_field.clone(),
                        target: target.clone(),
                        target_field: chain.target_field.clone(),
                        show_all: chain.show_all,
                    })
                })
            })
            .collect();
        chains.sort_by(|a, b| {
            (&a.source, a.source_field.as_str()).cmp(&(&b.source, b.source_field.as_str()))
        });
        chains
    }

    fn validate_chains(&self, entity: &EntityType) -> Result<(), RegistryError> {
        for field in entity.fields() {
            let Some(chain) = &field.chain else {
                continue;
            };
            let invalid = |reason: String| RegistryError::InvalidChain {
                entity: entity.type_ref().clone(),
                field: field.name.clone(),
                reason,
            };

            let FieldKind::Relation { target, .. } = &field.kind else {
                return Err(invalid("only relation fields can be chained".to_string()));
            };

            match entity.field(&chain.parent_field).map(|f| &f.kind) {
                Some(FieldKind::Relation { .. }) => {}
                _ => {
                    return Err(invalid(format!(
                        "parent field '{}' is not a relation on {}",
                        chain.parent_field,
                        entity.type_ref()
                    )))
                }
            }

            // Targets were checked during build, so the lookup cannot miss.
            let Some(target_type) = self.get(target) else {
                return Err(invalid(format!("unregistered target {target}")));
            };
            if !target_type
                .field(&chain.target_field)
                .is_some_and(|f| f.kind.is_relation())
            {
                return Err(invalid(format!(
                    "target field '{}' is not a relation on {}",
                    chain.target_field, target
                )));
            }
            for key in chain.limit_choices_to.keys() {
                if !target_type
                    .field(key)
                    .is_some_and(|f| f.kind == FieldKind::Scalar)
                {
                    return Err(invalid(format!(
                        "limit_choices_to names unknown scalar field '{key}' on {target}"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn build_entity(
    config: &EntityConfig,
    known: &HashSet<EntityTypeRef>,
) -> Result<EntityType, RegistryError> {
    let type_ref = EntityTypeRef::new(&config.namespace, &config.name);

    let mut fields: Vec<FieldDescriptor> = Vec::with_capacity(config.fields.len());
    for field_config in &config.fields {
        if fields.iter().any(|f| f.name == field_config.name) {
            return Err(RegistryError::DuplicateField {
                entity: type_ref,
                field: field_config.name.clone(),
            });
        }
        fields.push(build_field(&type_ref, field_config, known)?);
    }

    let ordering: Vec<OrderKey> = config.ordering.iter().map(|o| OrderKey::parse(o)).collect();
    for key in ordering.iter().filter(|k| !k.is_key()) {
        match fields.iter().find(|f| f.name == key.field).map(|f| &f.kind) {
            None => {
                return Err(RegistryError::UnknownOrderingField {
                    entity: type_ref,
                    field: key.field.clone(),
                })
            }
            Some(FieldKind::Scalar)
            | Some(FieldKind::Relation {
                arity: Arity::Single,
                ..
            }) => {}
            Some(_) => {
                return Err(RegistryError::UnorderableField {
                    entity: type_ref,
                    field: key.field.clone(),
                })
            }
        }
    }

    let display = config.display_template.as_deref().map(DisplayTemplate::parse);
    if let Some(template) = &display {
        for name in template.fields() {
            let is_scalar = fields
                .iter()
                .any(|f| f.name == name && f.kind == FieldKind::Scalar);
            if !is_scalar && name != "id" && name != "pk" {
                return Err(RegistryError::UnknownDisplayField {
                    entity: type_ref,
                    field: name.to_string(),
                });
            }
        }
    }

    Ok(EntityType {
        table: config
            .table
            .clone()
            .unwrap_or_else(|| default_table(&type_ref)),
        key_column: config.key_column.clone().unwrap_or_else(|| "id".to_string()),
        key_type: config.key_type,
        type_ref,
        fields,
        ordering,
        display,
    })
}

fn build_field(
    entity: &EntityTypeRef,
    config: &FieldConfig,
    known: &HashSet<EntityTypeRef>,
) -> Result<FieldDescriptor, RegistryError> {
    let arity = match config.kind {
        FieldKindConfig::Scalar => {
            return Ok(FieldDescriptor {
                name: config.name.clone(),
                kind: FieldKind::Scalar,
                column: config.column.clone().unwrap_or_else(|| config.name.clone()),
                through: None,
                chain: None,
            })
        }
        FieldKindConfig::GenericRelation => {
            return Ok(FieldDescriptor {
                name: config.name.clone(),
                kind: FieldKind::GenericRelation,
                column: config.column.clone().unwrap_or_else(|| config.name.clone()),
                through: None,
                chain: None,
            })
        }
        FieldKindConfig::ForeignKey | FieldKindConfig::OneToOne => Arity::Single,
        FieldKindConfig::ManyToMany => Arity::Multi,
    };

    let raw_target = config
        .to
        .as_deref()
        .ok_or_else(|| RegistryError::MissingTarget {
            entity: entity.clone(),
            field: config.name.clone(),
        })?;
    let target = EntityTypeRef::parse(raw_target).ok_or_else(|| RegistryError::InvalidTarget {
        entity: entity.clone(),
        field: config.name.clone(),
        target: raw_target.to_string(),
    })?;
    if !known.contains(&target) {
        return Err(RegistryError::UnknownTarget {
            entity: entity.clone(),
            field: config.name.clone(),
            target,
        });
    }

    let through = match arity {
        Arity::Single => None,
        Arity::Multi => Some(
            config
                .through
                .clone()
                .unwrap_or_else(|| default_through(entity, &config.name, &target)),
        ),
    };
    let column = config.column.clone().unwrap_or_else(|| match arity {
        Arity::Single => format!("{}_id", config.name),
        Arity::Multi => config.name.clone(),
    });

    Ok(FieldDescriptor {
        name: config.name.clone(),
        chain: config.chain.as_ref().map(|c| ChainSpec {
            parent_field: c.parent_field.clone(),
            target_field: c.target_field.clone(),
            limit_choices_to: c.limit_choices_to.clone(),
            show_all: c.show_all,
        }),
        kind: FieldKind::Relation { target, arity },
        column,
        through,
    })
}

/// `<namespace>_<name>` in lowercase
fn default_table(type_ref: &EntityTypeRef) -> String {
    format!("{}_{}", type_ref.namespace, type_ref.name.to_lowercase())
}

/// `<namespace>_<name>_<field>` with `<name>_id` / `<target>_id` columns
fn default_through(entity: &EntityTypeRef, field: &str, target: &EntityTypeRef) -> ThroughConfig {
    let source = entity.name.to_lowercase();
    let mut target_column = format!("{}_id", target.name.to_lowercase());
    if target_column == format!("{source}_id") {
        target_column = format!("to_{target_column}");
    }
    ThroughConfig {
        table: format!("{}_{}_{}", entity.namespace, source, field),
        source_column: format!("{source}_id"),
        target_column,
    }
}
