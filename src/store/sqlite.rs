use std::{str::FromStr, time::Duration};

use async_trait::async_trait;
use futures::TryStreamExt;
use serde_json::{Map, Value};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteArguments, SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    query::QueryAs,
    Sqlite,
};
use time::OffsetDateTime;
use tracing::info;

use super::{DocumentStore, Predicate, as_object, merge_partial, new_id, stamp};
use crate::{error::StoreError, utils::now_utc};

const MIGRATIONS: &[&str] = &[
    r#"create table if not exists documents (
        collection text not null,
        id text not null,
        body text not null,
        updated_at text not null,
        primary key (collection, id)
    )"#,
    // one record per student per class
    r#"create unique index if not exists students_identity
        on documents (json_extract(body, '$.name'), json_extract(body, '$.classCode'))
        where collection = 'students'"#,
    r#"create table if not exists accounts (
        email text primary key,
        password text not null,
        created_at text not null
    )"#,
];

/// How long a writer waits for another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Document store over one flat SQLite table of JSON bodies.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pub database: SqlitePool,
}

fn map_write_error(collection: &str, e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict {
            collection: collection.to_string(),
        },
        _ => StoreError::Database(e),
    }
}

fn parse_body(body: &str) -> Result<Map<String, Value>, StoreError> {
    as_object(serde_json::from_str(body)?)
}

type Row = (String,);

fn bind_value<'q>(
    query: QueryAs<'q, Sqlite, Row, SqliteArguments<'q>>,
    value: &Value,
) -> QueryAs<'q, Sqlite, Row, SqliteArguments<'q>> {
    match value {
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

impl SqliteStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);
        let database = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;
        let store = Self { database };
        store.migrate().await?;
        info!("connected document store at {url}");
        Ok(store)
    }

    /// Private in-memory database. A single connection keeps it alive and shared.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let database = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { database };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for statement in MIGRATIONS {
            sqlx::query(statement).execute(&self.database).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn create(&self, collection: &str, document: Value) -> Result<String, StoreError> {
        let mut document = as_object(document)?;
        let id = new_id();
        let now = now_utc();
        stamp(&mut document, &id, now)?;
        let body = serde_json::to_string(&document)?;
        sqlx::query("insert into documents (collection, id, body, updated_at) values (?, ?, ?, ?)")
            .bind(collection)
            .bind(&id)
            .bind(body)
            .bind(now)
            .execute(&self.database)
            .await
            .map_err(|e| map_write_error(collection, e))?;
        Ok(id)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let body: Option<(String,)> =
            sqlx::query_as("select body from documents where collection = ? and id = ?")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.database)
                .await?;
        body.map(|(body,)| parse_body(&body).map(Value::Object))
            .transpose()
    }

    async fn query(&self, collection: &str, predicates: &[Predicate]) -> Result<Vec<Value>, StoreError> {
        let mut sql = String::from("select body from documents where collection = ?");
        for _ in predicates {
            sql.push_str(" and json_extract(body, ?) = ?");
        }
        sql.push_str(" order by rowid");
        let mut query = sqlx::query_as::<_, Row>(&sql).bind(collection.to_string());
        for Predicate::Eq(field, value) in predicates {
            query = query.bind(format!("$.{field}"));
            query = bind_value(query, value);
        }
        let mut rows = query.fetch(&self.database);
        let mut documents = Vec::new();
        while let Some((body,)) = rows.try_next().await? {
            documents.push(Value::Object(parse_body(&body)?));
        }
        Ok(documents)
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        partial: Value,
    ) -> Result<OffsetDateTime, StoreError> {
        let now = now_utc();
        // take the write lock before reading, so concurrent read-merge-writes
        // queue on the busy timeout instead of failing the lock upgrade
        let mut tx = self.database.begin_with("BEGIN IMMEDIATE").await?;
        let existing: Option<(String,)> =
            sqlx::query_as("select body from documents where collection = ? and id = ?")
                .bind(collection)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        let mut document = match &existing {
            Some((body,)) => parse_body(body)?,
            None => Map::new(),
        };
        merge_partial(&mut document, partial)?;
        stamp(&mut document, id, now)?;
        let body = serde_json::to_string(&document)?;
        sqlx::query(
            "insert into documents (collection, id, body, updated_at) values (?, ?, ?, ?)
             on conflict (collection, id) do update set body = excluded.body, updated_at = excluded.updated_at",
        )
        .bind(collection)
        .bind(id)
        .bind(body)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_write_error(collection, e))?;
        tx.commit().await?;
        Ok(now)
    }
}
