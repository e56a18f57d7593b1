//! Chained selection resolver
//!
//! Given a relationship descriptor and the selected parent id, computes the
//! ordered set of target records whose relation field matches the parent.
//!
//! # Flow
//!
//! ```text
//! descriptor ──► validate (registry) ──► parse parent ──► store query
//!                                                            │
//!                        all mode: ordered union with ◄──────┘
//!                        the current selection
//! ```
//!
//! Each call is independent and read-only: no caching, no shared mutable
//! state, one bounded store query (two in "all" mode).

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::LookupError;
use crate::formatter::format_options;
use crate::registry::{Arity, EntityType, FieldDescriptor, FieldKind, Registry};
use crate::store::{LinkQuery, RecordStore};
use crate::types::{EntityTypeRef, KeyType, OptionEntry, Record, RecordId, Scalar};

static NO_LIMITS: BTreeMap<String, Scalar> = BTreeMap::new();

/// The four identifiers naming a chained pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupDescriptor {
    /// Type whose records populate the dependent field
    pub target: EntityTypeRef,
    /// Relation field on `target` compared against the parent id
    pub target_field: String,
    /// Type owning the dependent field
    pub source: EntityTypeRef,
    /// The dependent field itself
    pub source_field: String,
}

impl LookupDescriptor {
    pub fn new(
        target: EntityTypeRef,
        target_field: impl Into<String>,
        source: EntityTypeRef,
        source_field: impl Into<String>,
    ) -> Self {
        Self {
            target,
            target_field: target_field.into(),
            source,
            source_field: source_field.into(),
        }
    }
}

impl fmt::Display for LookupDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} <- {}.{}",
            self.target, self.target_field, self.source, self.source_field
        )
    }
}

/// Query mode, selected by the calling endpoint
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LookupMode {
    /// Exactly the filtered set
    #[default]
    Strict,
    /// Filtered set plus the dependent field's current value(s)
    All {
        /// Raw current values; unparsable entries are ignored
        selected: Vec<String>,
    },
}

impl LookupMode {
    pub fn is_all(&self) -> bool {
        matches!(self, LookupMode::All { .. })
    }
}

/// Outcome of a lookup, in output order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchResult {
    /// Records linked to the parent, in natural order
    pub matched: Vec<Record>,
    /// Currently selected records outside `matched` ("all" mode only)
    pub retained: Vec<Record>,
}

impl MatchResult {
    pub fn len(&self) -> usize {
        self.matched.len() + self.retained.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All record ids, matched first
    pub fn ids(&self) -> impl Iterator<Item = &RecordId> {
        self.matched.iter().chain(&self.retained).map(|r| &r.id)
    }
}

/// A descriptor checked against the registry
#[derive(Debug, Clone, Copy)]
pub struct ResolvedChain<'a> {
    pub target: &'a EntityType,
    pub field: &'a FieldDescriptor,
    pub arity: Arity,
    /// Key type of the parent entity, used to parse the parent id
    pub parent_key: KeyType,
    pub limit_choices_to: &'a BTreeMap<String, Scalar>,
}

/// Ordered set union: `matched` first, then `selected` records not already
/// present. Each id appears at most once, first occurrence wins.
pub fn ordered_union(matched: Vec<Record>, selected: Vec<Record>) -> MatchResult {
    let mut seen: HashSet<RecordId> = HashSet::with_capacity(matched.len() + selected.len());
    let matched: Vec<Record> = matched
        .into_iter()
        .filter(|r| seen.insert(r.id.clone()))
        .collect();
    let retained: Vec<Record> = selected
        .into_iter()
        .filter(|r| seen.insert(r.id.clone()))
        .collect();
    MatchResult { matched, retained }
}

/// Resolves chained lookups against a registry and a record store
#[derive(Clone)]
pub struct Resolver {
    registry: Arc<Registry>,
    store: Arc<dyn RecordStore>,
}

impl Resolver {
    pub fn new(registry: Arc<Registry>, store: Arc<dyn RecordStore>) -> Self {
        Self { registry, store }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Check a descriptor against the registry.
    ///
    /// Both types must be registered, the target field must be a single- or
    /// multi-valued relation, and the source field must be a chained relation
    /// to the target type.
    pub fn validate(&self, descriptor: &LookupDescriptor) -> Result<ResolvedChain<'_>, LookupError> {
        let target = self
            .registry
            .get(&descriptor.target)
            .ok_or_else(|| LookupError::UnknownType(descriptor.target.clone()))?;
        let source = self
            .registry
            .get(&descriptor.source)
            .ok_or_else(|| LookupError::UnknownType(descriptor.source.clone()))?;

        let field = target
            .field(&descriptor.target_field)
            .ok_or_else(|| LookupError::UnknownField {
                entity: descriptor.target.clone(),
                field: descriptor.target_field.clone(),
            })?;
        let (parent_type, arity) = match &field.kind {
            FieldKind::Relation { target, arity } => (target, *arity),
            FieldKind::GenericRelation => {
                return Err(LookupError::InvalidFieldArity {
                    entity: descriptor.target.clone(),
                    field: descriptor.target_field.clone(),
                })
            }
            FieldKind::Scalar => {
                return Err(LookupError::UnknownField {
                    entity: descriptor.target.clone(),
                    field: descriptor.target_field.clone(),
                })
            }
        };

        let source_field = source
            .field(&descriptor.source_field)
            .filter(|f| f.kind.is_relation())
            .ok_or_else(|| LookupError::UnknownField {
                entity: descriptor.source.clone(),
                field: descriptor.source_field.clone(),
            })?;
        let chained = source.has_chained_fields()
            && matches!(&source_field.kind, FieldKind::Relation { target, .. } if *target == descriptor.target);
        if !chained {
            return Err(LookupError::ChainNotDeclared {
                source_type: descriptor.source.clone(),
                source_field: descriptor.source_field.clone(),
                target: descriptor.target.clone(),
            });
        }

        let parent_key = self
            .registry
            .get(parent_type)
            .map(EntityType::key_type)
            .unwrap_or_default();
        let limit_choices_to = source_field
            .chain
            .as_ref()
            .map(|c| &c.limit_choices_to)
            .unwrap_or(&NO_LIMITS);

        Ok(ResolvedChain {
            target,
            field,
            arity,
            parent_key,
            limit_choices_to,
        })
    }

    /// Resolve the ordered match result for a descriptor
    pub async fn resolve(
        &self,
        descriptor: &LookupDescriptor,
        parent: Option<&str>,
        mode: &LookupMode,
    ) -> Result<MatchResult, LookupError> {
        let chain = self.validate(descriptor)?;
        self.run(&chain, parent, mode).await
    }

    /// Resolve and format as dropdown options; "all" mode includes the placeholder
    pub async fn lookup_options(
        &self,
        descriptor: &LookupDescriptor,
        parent: Option<&str>,
        mode: &LookupMode,
    ) -> Result<Vec<OptionEntry>, LookupError> {
        let chain = self.validate(descriptor)?;
        let result = self.run(&chain, parent, mode).await?;

        tracing::debug!(
            descriptor = %descriptor,
            parent = parent.unwrap_or(""),
            all = mode.is_all(),
            matched = result.matched.len(),
            retained = result.retained.len(),
            "Resolved chained lookup"
        );

        Ok(format_options(chain.target, &result, mode.is_all()))
    }

    async fn run(
        &self,
        chain: &ResolvedChain<'_>,
        parent: Option<&str>,
        mode: &LookupMode,
    ) -> Result<MatchResult, LookupError> {
        let matched = match parent.and_then(|raw| chain.parent_key.parse(raw)) {
            Some(parent_id) => {
                let query = LinkQuery {
                    entity: chain.target,
                    field: chain.field,
                    arity: chain.arity,
                    parent: &parent_id,
                    limit_choices_to: chain.limit_choices_to,
                };
                self.store.filter_by_link(&query).await?
            }
            None => Vec::new(),
        };

        let LookupMode::All { selected } = mode else {
            return Ok(MatchResult {
                matched,
                retained: Vec::new(),
            });
        };

        let key_type = chain.target.key_type();
        let mut wanted: Vec<RecordId> = Vec::new();
        for id in selected.iter().filter_map(|raw| key_type.parse(raw)) {
            if !wanted.contains(&id) && !matched.iter().any(|r| r.id == id) {
                wanted.push(id);
            }
        }

        let selected_records = if wanted.is_empty() {
            Vec::new()
        } else {
            self.store
                .fetch_by_ids(chain.target, &wanted, chain.limit_choices_to)
                .await?
        };

        Ok(ordered_union(matched, selected_records))
    }
}
