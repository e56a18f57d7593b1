//! Core value types shared by the registry, stores, resolver and formatter
//!
//! Records are read-only snapshots: an identifier, a bag of scalar values and
//! the identifiers each relation field links to.

use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Identifies a record type by `(namespace, name)`, e.g. `test_app.Country`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityTypeRef {
    pub namespace: String,
    pub name: String,
}

impl EntityTypeRef {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parse the dotted `namespace.Name` form used in configuration
    pub fn parse(dotted: &str) -> Option<Self> {
        let (namespace, name) = dotted.split_once('.')?;
        if namespace.is_empty() || name.is_empty() || name.contains('.') {
            return None;
        }
        Some(Self::new(namespace, name))
    }
}

impl fmt::Display for EntityTypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// Serialized in the dotted `namespace.Name` form
impl Serialize for EntityTypeRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Primary key of a record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Str(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(value) => write!(f, "{value}"),
            RecordId::Str(value) => f.write_str(value),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        RecordId::Int(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        RecordId::Str(value.to_string())
    }
}

/// Declared primary key type of an entity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    #[default]
    Integer,
    String,
}

impl KeyType {
    /// Parse a raw identifier as received from a URL or query string.
    ///
    /// Returns `None` for empty or malformed input; callers treat that as
    /// "nothing selected", not as an error.
    pub fn parse(self, raw: &str) -> Option<RecordId> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        match self {
            KeyType::Integer => raw.parse::<i64>().ok().map(RecordId::Int),
            KeyType::String => Some(RecordId::Str(raw.to_string())),
        }
    }
}

/// A non-relation field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn rank(&self) -> u8 {
        match self {
            Scalar::Null => 0,
            Scalar::Bool(_) => 1,
            Scalar::Int(_) | Scalar::Float(_) => 2,
            Scalar::Text(_) => 3,
        }
    }

    /// Total order used for natural ordering: nulls first, then booleans,
    /// numbers and text.
    pub fn natural_cmp(&self, other: &Scalar) -> Ordering {
        match (self, other) {
            (Scalar::Bool(a), Scalar::Bool(b)) => a.cmp(b),
            (Scalar::Int(a), Scalar::Int(b)) => a.cmp(b),
            (Scalar::Int(a), Scalar::Float(b)) => (*a as f64).total_cmp(b),
            (Scalar::Float(a), Scalar::Int(b)) => a.total_cmp(&(*b as f64)),
            (Scalar::Float(a), Scalar::Float(b)) => a.total_cmp(b),
            (Scalar::Text(a), Scalar::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(value) => write!(f, "{value}"),
            Scalar::Int(value) => write!(f, "{value}"),
            Scalar::Float(value) => write!(f, "{value}"),
            Scalar::Text(value) => f.write_str(value),
        }
    }
}

/// A read-only record snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: RecordId,
    /// Scalar field values by field name
    pub scalars: BTreeMap<String, Scalar>,
    /// Linked record ids by relation field name (single-valued fields hold at most one)
    pub links: BTreeMap<String, Vec<RecordId>>,
}

impl Record {
    pub fn new(id: impl Into<RecordId>) -> Self {
        Self {
            id: id.into(),
            scalars: BTreeMap::new(),
            links: BTreeMap::new(),
        }
    }

    pub fn with_scalar(mut self, field: &str, value: Scalar) -> Self {
        self.scalars.insert(field.to_string(), value);
        self
    }

    pub fn with_links(mut self, field: &str, ids: Vec<RecordId>) -> Self {
        self.links.insert(field.to_string(), ids);
        self
    }

    pub fn scalar(&self, field: &str) -> Option<&Scalar> {
        self.scalars.get(field)
    }

    /// Ids linked through `field`; empty when the field is unset
    pub fn links(&self, field: &str) -> &[RecordId] {
        self.links.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Value half of an option entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Id(RecordId),
    /// The unselected placeholder, serialized as `""`
    Empty,
}

impl Serialize for OptionValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            OptionValue::Id(id) => id.serialize(serializer),
            OptionValue::Empty => serializer.serialize_str(""),
        }
    }
}

/// One `{value, display}` pair of a dependent dropdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionEntry {
    pub value: OptionValue,
    pub display: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_type_ref() {
        let parsed = EntityTypeRef::parse("test_app.Country").unwrap();
        assert_eq!(parsed, EntityTypeRef::new("test_app", "Country"));
        assert_eq!(parsed.to_string(), "test_app.Country");

        assert!(EntityTypeRef::parse("Country").is_none());
        assert!(EntityTypeRef::parse(".Country").is_none());
        assert!(EntityTypeRef::parse("a.b.c").is_none());
    }

    #[test]
    fn test_type_ref_serializes_dotted() {
        let json = serde_json::to_value(EntityTypeRef::new("acme.sales", "Region")).unwrap();
        assert_eq!(json, serde_json::json!("acme.sales.Region"));
    }

    #[test]
    fn test_key_type_parse() {
        assert_eq!(KeyType::Integer.parse("42"), Some(RecordId::Int(42)));
        assert_eq!(KeyType::Integer.parse(" 7 "), Some(RecordId::Int(7)));
        assert_eq!(KeyType::Integer.parse("abc"), None);
        assert_eq!(KeyType::Integer.parse(""), None);
        assert_eq!(KeyType::Integer.parse("null"), None);
        assert_eq!(KeyType::String.parse("GB"), Some(RecordId::from("GB")));
        assert_eq!(KeyType::String.parse("   "), None);
    }

    #[test]
    fn test_natural_cmp_mixed() {
        assert_eq!(
            Scalar::Null.natural_cmp(&Scalar::Text("a".into())),
            Ordering::Less
        );
        assert_eq!(Scalar::Int(2).natural_cmp(&Scalar::Float(1.5)), Ordering::Greater);
        assert_eq!(
            Scalar::Text("Germany".into()).natural_cmp(&Scalar::Text("Great Britain".into())),
            Ordering::Less
        );
    }

    #[test]
    fn test_option_entry_json() {
        let entries = vec![
            OptionEntry {
                value: OptionValue::Id(RecordId::Int(2)),
                display: "New York".to_string(),
            },
            OptionEntry {
                value: OptionValue::Empty,
                display: "---------".to_string(),
            },
        ];
        let json = serde_json::to_value(&entries).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"value": 2, "display": "New York"},
                {"value": "", "display": "---------"}
            ])
        );
    }

    #[test]
    fn test_scalar_from_yaml() {
        let value: Scalar = serde_yaml::from_str("~").unwrap();
        assert_eq!(value, Scalar::Null);
        let value: Scalar = serde_yaml::from_str("12").unwrap();
        assert_eq!(value, Scalar::Int(12));
        let value: Scalar = serde_yaml::from_str("Wallstreet").unwrap();
        assert_eq!(value, Scalar::Text("Wallstreet".into()));
    }
}
