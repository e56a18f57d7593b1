//! SQL generation for relational stores
//!
//! Builds parameterised `SELECT` statements from entity descriptors. Table
//! names come from trusted configuration and are emitted verbatim (they may
//! be schema-qualified); column names are always quoted.

use std::collections::BTreeMap;

use crate::registry::{Arity, EntityType, FieldDescriptor, FieldKind};
use crate::store::traits::{LinkQuery, StoreError};
use crate::types::{KeyType, RecordId, Scalar};

/// A value bound to a `$n` placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Id(RecordId),
    /// Homogeneous id list for `= ANY($n)`
    Ids(KeyType, Vec<RecordId>),
    Scalar(Scalar),
}

/// A generated statement and its bind values, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct SelectStatement {
    pub sql: String,
    pub binds: Vec<BindValue>,
    /// Field names of the projected scalar columns, after the key column
    pub projected: Vec<String>,
}

/// Quote an identifier, doubling embedded quotes
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

struct Builder<'a> {
    entity: &'a EntityType,
    conditions: Vec<String>,
    binds: Vec<BindValue>,
}

impl<'a> Builder<'a> {
    fn new(entity: &'a EntityType) -> Self {
        Self {
            entity,
            conditions: Vec::new(),
            binds: Vec::new(),
        }
    }

    fn bind(&mut self, value: BindValue) -> String {
        self.binds.push(value);
        format!("${}", self.binds.len())
    }

    fn key(&self) -> String {
        format!("t.{}", quote_ident(self.entity.key_column()))
    }

    fn column(&self, name: &str) -> Result<String, StoreError> {
        let field = self
            .entity
            .field(name)
            .ok_or_else(|| StoreError::Query(format!("unknown column for field '{name}'")))?;
        Ok(format!("t.{}", quote_ident(&field.column)))
    }

    fn limit_choices_to(&mut self, limits: &BTreeMap<String, Scalar>) -> Result<(), StoreError> {
        for (name, value) in limits {
            let column = self.column(name)?;
            let condition = match value {
                Scalar::Null => format!("{column} IS NULL"),
                other => {
                    let placeholder = self.bind(BindValue::Scalar(other.clone()));
                    format!("{column} = {placeholder}")
                }
            };
            self.conditions.push(condition);
        }
        Ok(())
    }

    fn finish(self) -> Result<SelectStatement, StoreError> {
        let entity = self.entity;
        let key_cast = match entity.key_type() {
            KeyType::Integer => "bigint",
            KeyType::String => "text",
        };

        let projected: Vec<&FieldDescriptor> = entity.projected_fields();
        let mut select = vec![format!("{}::{key_cast}", self.key())];
        for field in &projected {
            select.push(format!("t.{}::text", quote_ident(&field.column)));
        }

        let mut order_by = Vec::with_capacity(entity.ordering().len() + 1);
        // Nulls sort lowest, as in `Scalar::natural_cmp`
        for key in entity.ordering() {
            let direction = if key.descending { "DESC" } else { "ASC" };
            if key.is_key() {
                order_by.push(format!("{} {direction}", self.key()));
                continue;
            }
            let nulls = if key.descending { "NULLS LAST" } else { "NULLS FIRST" };
            order_by.push(format!("{} {direction} {nulls}", self.column(&key.field)?));
        }
        order_by.push(format!("{} ASC", self.key()));

        let mut sql = format!("SELECT {} FROM {} t", select.join(", "), entity.table());
        if !self.conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&order_by.join(", "));

        Ok(SelectStatement {
            sql,
            binds: self.binds,
            projected: projected.iter().map(|f| f.name.clone()).collect(),
        })
    }
}

/// Statement for `RecordStore::filter_by_link`
pub fn link_query(query: &LinkQuery<'_>) -> Result<SelectStatement, StoreError> {
    let mut builder = Builder::new(query.entity);
    let placeholder = builder.bind(BindValue::Id(query.parent.clone()));

    match (query.arity, &query.field.kind) {
        (Arity::Single, FieldKind::Relation { .. }) => {
            let column = builder.column(&query.field.name)?;
            builder.conditions.push(format!("{column} = {placeholder}"));
        }
        (Arity::Multi, FieldKind::Relation { .. }) => {
            let through = query.field.through.as_ref().ok_or_else(|| {
                StoreError::Query(format!("field '{}' has no join table", query.field.name))
            })?;
            let key = builder.key();
            builder.conditions.push(format!(
                "{key} IN (SELECT j.{} FROM {} j WHERE j.{} = {placeholder})",
                quote_ident(&through.source_column),
                through.table,
                quote_ident(&through.target_column),
            ));
        }
        _ => {
            return Err(StoreError::Query(format!(
                "field '{}' is not a relation",
                query.field.name
            )))
        }
    }

    builder.limit_choices_to(query.limit_choices_to)?;
    builder.finish()
}

/// Statement for `RecordStore::fetch_by_ids`
pub fn ids_query(
    entity: &EntityType,
    ids: &[RecordId],
    limit_choices_to: &BTreeMap<String, Scalar>,
) -> Result<SelectStatement, StoreError> {
    let mut builder = Builder::new(entity);
    let placeholder = builder.bind(BindValue::Ids(entity.key_type(), ids.to_vec()));
    let key = builder.key();
    builder.conditions.push(format!("{key} = ANY({placeholder})"));
    builder.limit_choices_to(limit_choices_to)?;
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LookupConfig;
    use crate::registry::Registry;

    fn registry() -> Registry {
        let config = LookupConfig::from_yaml(
            r#"
store:
  backend: postgres
entities:
  - namespace: test_app
    name: Continent
  - namespace: test_app
    name: Publication
  - namespace: test_app
    name: Country
    display_template: "{name}"
    ordering: [name]
    fields:
      - name: name
      - name: active
      - name: continent
        kind: foreign_key
        to: test_app.Continent
  - namespace: test_app
    name: Writer
    table: '"library".writers'
    key_column: writer_id
    display_template: "{first} {last}"
    ordering: ["-last"]
    fields:
      - name: first
        column: first_name
      - name: last
        column: last_name
      - name: publications
        kind: many_to_many
        to: test_app.Publication
"#,
        )
        .unwrap();
        Registry::from_config(&config.entities).unwrap()
    }

    #[test]
    fn test_single_link_query() {
        let registry = registry();
        let country = registry.lookup("test_app", "Country").unwrap();
        let parent = RecordId::Int(1);
        let mut limits = BTreeMap::new();
        limits.insert("active".to_string(), Scalar::Bool(true));

        let stmt = link_query(&LinkQuery {
            entity: country,
            field: country.field("continent").unwrap(),
            arity: Arity::Single,
            parent: &parent,
            limit_choices_to: &limits,
        })
        .unwrap();

        assert_eq!(
            stmt.sql,
            r#"SELECT t."id"::bigint, t."name"::text FROM test_app_country t WHERE t."continent_id" = $1 AND t."active" = $2 ORDER BY t."name" ASC NULLS FIRST, t."id" ASC"#
        );
        assert_eq!(
            stmt.binds,
            vec![
                BindValue::Id(RecordId::Int(1)),
                BindValue::Scalar(Scalar::Bool(true))
            ]
        );
        assert_eq!(stmt.projected, vec!["name".to_string()]);
    }

    #[test]
    fn test_multi_link_query() {
        let registry = registry();
        let writer = registry.lookup("test_app", "Writer").unwrap();
        let parent = RecordId::Int(1);

        let stmt = link_query(&LinkQuery {
            entity: writer,
            field: writer.field("publications").unwrap(),
            arity: Arity::Multi,
            parent: &parent,
            limit_choices_to: &BTreeMap::new(),
        })
        .unwrap();

        assert_eq!(
            stmt.sql,
            r#"SELECT t."writer_id"::bigint, t."first_name"::text, t."last_name"::text FROM "library".writers t WHERE t."writer_id" IN (SELECT j."writer_id" FROM test_app_writer_publications j WHERE j."publication_id" = $1) ORDER BY t."last_name" DESC NULLS LAST, t."writer_id" ASC"#
        );
        assert_eq!(stmt.projected, vec!["first".to_string(), "last".to_string()]);
    }

    #[test]
    fn test_ids_query_with_null_limit() {
        let registry = registry();
        let country = registry.lookup("test_app", "Country").unwrap();
        let mut limits = BTreeMap::new();
        limits.insert("active".to_string(), Scalar::Null);

        let stmt = ids_query(country, &[RecordId::Int(2), RecordId::Int(5)], &limits).unwrap();
        assert_eq!(
            stmt.sql,
            r#"SELECT t."id"::bigint, t."name"::text FROM test_app_country t WHERE t."id" = ANY($1) AND t."active" IS NULL ORDER BY t."name" ASC NULLS FIRST, t."id" ASC"#
        );
        assert_eq!(stmt.binds.len(), 1);
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("name"), "\"name\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }
}
