//! Entity type descriptors
//!
//! An `EntityType` is the resolved, immutable form of an `EntityConfig`:
//! fields carry their relationship arity, ordering is pre-parsed and the
//! display template is split into segments once at startup.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::config::ThroughConfig;
use crate::types::{EntityTypeRef, KeyType, Record, Scalar};

/// Whether a relation links to one parent or many
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// Foreign key / one-to-one: the field equals the parent id
    Single,
    /// Many-to-many: the field's collection contains the parent id
    Multi,
}

/// Resolved field kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Scalar,
    Relation { target: EntityTypeRef, arity: Arity },
    /// Relationship-typed but without a single/multi arity to filter on
    GenericRelation,
}

impl FieldKind {
    pub fn is_relation(&self) -> bool {
        !matches!(self, FieldKind::Scalar)
    }
}

/// Chained selection metadata of a dependent field
#[derive(Debug, Clone, PartialEq)]
pub struct ChainSpec {
    pub parent_field: String,
    pub target_field: String,
    pub limit_choices_to: BTreeMap<String, Scalar>,
    pub show_all: bool,
}

/// A single field of an entity type
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    /// Storage column (scalars and single-valued relations)
    pub column: String,
    /// Join table (multi-valued relations)
    pub through: Option<ThroughConfig>,
    pub chain: Option<ChainSpec>,
}

/// One key of an entity's natural ordering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderKey {
    pub field: String,
    pub descending: bool,
}

impl OrderKey {
    /// Parse `name` / `-name`
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix('-') {
            Some(field) => Self {
                field: field.to_string(),
                descending: true,
            },
            None => Self {
                field: raw.to_string(),
                descending: false,
            },
        }
    }

    /// `id` and `pk` order by the primary key
    pub fn is_key(&self) -> bool {
        self.field == "id" || self.field == "pk"
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// Parsed `display_template`, e.g. `"{city} ({street})"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayTemplate {
    segments: Vec<Segment>,
}

impl DisplayTemplate {
    pub fn parse(template: &str) -> Self {
        let mut segments = Vec::new();
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}') else {
                break;
            };
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            segments.push(Segment::Field(rest[open + 1..open + close].to_string()));
            rest = &rest[open + close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Self { segments }
    }

    /// Field names referenced by the template
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn render(&self, record: &Record) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) if name == "id" || name == "pk" => {
                    out.push_str(&record.id.to_string())
                }
                Segment::Field(name) => {
                    if let Some(value) = record.scalar(name) {
                        out.push_str(&value.to_string());
                    }
                }
            }
        }
        out
    }
}

/// Resolved entity type
#[derive(Debug, Clone)]
pub struct EntityType {
    pub(crate) type_ref: EntityTypeRef,
    pub(crate) key_type: KeyType,
    pub(crate) table: String,
    pub(crate) key_column: String,
    pub(crate) fields: Vec<FieldDescriptor>,
    pub(crate) ordering: Vec<OrderKey>,
    pub(crate) display: Option<DisplayTemplate>,
}

impl EntityType {
    pub fn type_ref(&self) -> &EntityTypeRef {
        &self.type_ref
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn ordering(&self) -> &[OrderKey] {
        &self.ordering
    }

    pub fn has_chained_fields(&self) -> bool {
        self.fields.iter().any(|f| f.chain.is_some())
    }

    /// Human-readable representation of a record of this type
    pub fn display(&self, record: &Record) -> String {
        match &self.display {
            Some(template) => template.render(record),
            None => format!("{} object ({})", self.type_ref.name, record.id),
        }
    }

    /// Compare two records by natural ordering.
    ///
    /// Returns `Equal` when no key distinguishes them, so a stable sort keeps
    /// definition order for ties and for types without an ordering.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        for key in &self.ordering {
            let ord = if key.is_key() {
                a.id.cmp(&b.id)
            } else {
                match self.field(&key.field).map(|f| &f.kind) {
                    Some(FieldKind::Scalar) => {
                        let left = a.scalar(&key.field).unwrap_or(&Scalar::Null);
                        let right = b.scalar(&key.field).unwrap_or(&Scalar::Null);
                        left.natural_cmp(right)
                    }
                    Some(_) => a.links(&key.field).first().cmp(&b.links(&key.field).first()),
                    None => Ordering::Equal,
                }
            };
            let ord = if key.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Stable sort into natural order
    pub fn sort_records(&self, records: &mut [Record]) {
        records.sort_by(|a, b| self.compare(a, b));
    }

    /// Scalar fields a store must load to render and order records
    pub fn projected_fields(&self) -> Vec<&FieldDescriptor> {
        let mut names: Vec<&str> = Vec::new();
        if let Some(template) = &self.display {
            names.extend(template.fields());
        }
        names.extend(self.ordering.iter().map(|k| k.field.as_str()));

        let mut projected: Vec<&FieldDescriptor> = Vec::new();
        for name in names {
            if let Some(field) = self.field(name) {
                if field.kind == FieldKind::Scalar
                    && !projected.iter().any(|p| p.name == field.name)
                {
                    projected.push(field);
                }
            }
        }
        projected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordId;

    fn scalar_field(name: &str) -> FieldDescriptor {
        FieldDescriptor {
            name: name.to_string(),
            kind: FieldKind::Scalar,
            column: name.to_string(),
            through: None,
            chain: None,
        }
    }

    fn location_type(ordering: &[&str], template: Option<&str>) -> EntityType {
        EntityType {
            type_ref: EntityTypeRef::new("test_app", "Location"),
            key_type: KeyType::Integer,
            table: "test_app_location".to_string(),
            key_column: "id".to_string(),
            fields: vec![scalar_field("city"), scalar_field("street")],
            ordering: ordering.iter().map(|o| OrderKey::parse(o)).collect(),
            display: template.map(DisplayTemplate::parse),
        }
    }

    fn location(id: i64, city: &str, street: &str) -> Record {
        Record::new(id)
            .with_scalar("city", Scalar::Text(city.to_string()))
            .with_scalar("street", Scalar::Text(street.to_string()))
    }

    #[test]
    fn test_template_render() {
        let template = DisplayTemplate::parse("{city}, {street} #{id}");
        let fields: Vec<&str> = template.fields().collect();
        assert_eq!(fields, vec!["city", "street", "id"]);
        assert_eq!(
            template.render(&location(2, "New York", "Wallstreet")),
            "New York, Wallstreet #2"
        );
    }

    #[test]
    fn test_template_unclosed_brace_is_literal() {
        let template = DisplayTemplate::parse("{city} {oops");
        assert_eq!(template.render(&location(1, "Prague", "x")), "Prague {oops");
    }

    #[test]
    fn test_default_display() {
        let entity = location_type(&[], None);
        assert_eq!(
            entity.display(&location(7, "Brno", "Main")),
            "Location object (7)"
        );
    }

    #[test]
    fn test_ordering_with_tie_break_on_definition_order() {
        let entity = location_type(&["city"], Some("{city}"));
        let mut records = vec![
            location(3, "Prague", "b"),
            location(1, "Brno", "a"),
            location(2, "Prague", "a"),
        ];
        entity.sort_records(&mut records);
        let ids: Vec<RecordId> = records.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![RecordId::Int(1), RecordId::Int(3), RecordId::Int(2)]);
    }

    #[test]
    fn test_descending_and_key_ordering() {
        let entity = location_type(&["-city", "pk"], None);
        let mut records = vec![
            location(4, "Brno", "a"),
            location(2, "Prague", "a"),
            location(1, "Prague", "b"),
        ];
        entity.sort_records(&mut records);
        let ids: Vec<RecordId> = records.into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![RecordId::Int(1), RecordId::Int(2), RecordId::Int(4)]);
    }

    #[test]
    fn test_projected_fields_deduplicated() {
        let entity = location_type(&["city"], Some("{city} {street}"));
        let names: Vec<&str> = entity
            .projected_fields()
            .into_iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["city", "street"]);
    }
}
