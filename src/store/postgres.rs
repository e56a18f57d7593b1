//! Postgres record store
//!
//! Runs the statements built in `store::sql` against a `PgPool`. Ordering is
//! done by the database; projected scalar columns come back as text, which is
//! all the display templates need.

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use std::collections::BTreeMap;

use crate::registry::EntityType;
use crate::store::sql::{self, BindValue, SelectStatement};
use crate::store::traits::{LinkQuery, RecordStore, StoreError};
use crate::types::{KeyType, Record, RecordId, Scalar};

/// Record store backed by Postgres
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    async fn run(
        &self,
        entity: &EntityType,
        stmt: SelectStatement,
    ) -> Result<Vec<Record>, StoreError> {
        tracing::debug!(sql = %stmt.sql, binds = stmt.binds.len(), "Running lookup query");

        let mut query = sqlx::query(&stmt.sql);
        for value in &stmt.binds {
            query = bind_value(query, value);
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| decode_row(entity, &stmt.projected, row))
            .collect()
    }
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &BindValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        BindValue::Id(RecordId::Int(id)) => query.bind(*id),
        BindValue::Id(RecordId::Str(id)) => query.bind(id.clone()),
        BindValue::Ids(KeyType::Integer, ids) => query.bind(
            ids.iter()
                .filter_map(|id| match id {
                    RecordId::Int(v) => Some(*v),
                    RecordId::Str(_) => None,
                })
                .collect::<Vec<i64>>(),
        ),
        BindValue::Ids(KeyType::String, ids) => {
            query.bind(ids.iter().map(ToString::to_string).collect::<Vec<String>>())
        }
        BindValue::Scalar(Scalar::Null) => query.bind(Option::<String>::None),
        BindValue::Scalar(Scalar::Bool(v)) => query.bind(*v),
        BindValue::Scalar(Scalar::Int(v)) => query.bind(*v),
        BindValue::Scalar(Scalar::Float(v)) => query.bind(*v),
        BindValue::Scalar(Scalar::Text(v)) => query.bind(v.clone()),
    }
}

fn decode_row(entity: &EntityType, projected: &[String], row: &PgRow) -> Result<Record, StoreError> {
    let id = match entity.key_type() {
        KeyType::Integer => RecordId::Int(row.try_get::<i64, _>(0)?),
        KeyType::String => RecordId::Str(row.try_get::<String, _>(0)?),
    };

    let mut record = Record::new(id);
    for (idx, name) in projected.iter().enumerate() {
        let value: Option<String> = row.try_get(idx + 1)?;
        record
            .scalars
            .insert(name.clone(), value.map(Scalar::Text).unwrap_or(Scalar::Null));
    }
    Ok(record)
}

#[async_trait]
impl RecordStore for PgStore {
    async fn filter_by_link(&self, query: &LinkQuery<'_>) -> Result<Vec<Record>, StoreError> {
        let stmt = sql::link_query(query)?;
        self.run(query.entity, stmt).await
    }

    async fn fetch_by_ids(
        &self,
        entity: &EntityType,
        ids: &[RecordId],
        limit_choices_to: &BTreeMap<String, Scalar>,
    ) -> Result<Vec<Record>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let stmt = sql::ids_query(entity, ids, limit_choices_to)?;
        self.run(entity, stmt).await
    }
}
