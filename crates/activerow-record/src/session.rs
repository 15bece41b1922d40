//! Sessions: configuration plus the execution scope records run in.
//!
//! A [`Session`] is cheap to clone. Every record operation takes one and
//! resolves its connection through it: the connection bound in the scope
//! when there is one, the pool's global connection otherwise.

use crate::lifecycle::LocalBoxFuture;
use crate::record::Record;
use crate::relationships::{InstanceRelationship, RelationshipValue};
use activerow_core::{
    ConfigErrorKind, Cx, Error, Outcome, RecordNotFoundError, Registry, RelationshipDefinition,
    Result, Value, try_outcome, try_result,
};
use activerow_pool::{Configuration, Connection, ExecutionScope};
use activerow_query::{Expr, JoinSpec, Query};
use std::collections::HashSet;
use std::sync::Arc;

/// Configuration and execution scope for record operations.
#[derive(Debug, Clone)]
pub struct Session {
    configuration: Arc<Configuration>,
    scope: ExecutionScope,
}

impl Session {
    /// Session with an empty scope; operations use global connections.
    pub fn new(configuration: Arc<Configuration>) -> Self {
        Self::with_scope(configuration, ExecutionScope::new())
    }

    pub fn with_scope(configuration: Arc<Configuration>, scope: ExecutionScope) -> Self {
        Self {
            configuration,
            scope,
        }
    }

    pub fn configuration(&self) -> &Arc<Configuration> {
        &self.configuration
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.configuration.registry()
    }

    pub fn scope(&self) -> &ExecutionScope {
        &self.scope
    }

    /// Locale lookup order for translated attributes.
    pub fn locale_chain(&self, locale: &str) -> Vec<String> {
        self.configuration.locale_chain(locale)
    }

    /// The connection this session uses for `database`: the scoped one,
    /// else the pool's global connection, opened on first use.
    pub async fn connection(&self, cx: &Cx, database: &str) -> Outcome<Arc<Connection>, Error> {
        let pool = try_result!(self.configuration.get_database_pool(database));
        if let Some(connection) = pool.get_current_context_connection(&self.scope) {
            return Outcome::Ok(connection);
        }
        pool.ensure_global_connection(cx).await
    }

    /// Run `body` with a connection of every database bound.
    pub async fn with_connections<T, F>(&self, cx: &Cx, body: F) -> Outcome<T, Error>
    where
        F: AsyncFnOnce(Session) -> Outcome<T, Error>,
    {
        let configuration = Arc::clone(&self.configuration);
        self.configuration
            .with_connections(cx, &self.scope, async move |scope: ExecutionScope| {
                body(Session::with_scope(configuration, scope)).await
            })
            .await
    }

    /// Like [`with_connections`](Self::with_connections), reusing this
    /// session as-is when every database is already bound.
    pub async fn ensure_connections<T, F>(&self, cx: &Cx, body: F) -> Outcome<T, Error>
    where
        F: AsyncFnOnce(Session) -> Outcome<T, Error>,
    {
        let configuration = Arc::clone(&self.configuration);
        self.configuration
            .ensure_connections(cx, &self.scope, async move |scope: ExecutionScope| {
                body(Session::with_scope(configuration, scope)).await
            })
            .await
    }

    /// Run `body` in a transaction on `database`. Nested calls on the
    /// session passed to `body` become savepoints.
    pub async fn transaction<T, F>(&self, cx: &Cx, database: &str, body: F) -> Outcome<T, Error>
    where
        F: AsyncFnOnce(Session) -> Outcome<T, Error>,
    {
        let pool = try_result!(self.configuration.get_database_pool(database));
        let configuration = Arc::clone(&self.configuration);
        pool.transaction(cx, &self.scope, async move |scope: ExecutionScope| {
            body(Session::with_scope(configuration, scope)).await
        })
        .await
    }

    /// A new record of `entity`.
    pub fn build(&self, entity: &str) -> Result<Record> {
        Record::new(Arc::clone(self.registry()), entity)
    }

    /// A query on `entity`, to be run with [`load_all`](Self::load_all),
    /// [`first`](Self::first) or [`count`](Self::count).
    pub fn where_query(&self, entity: &str) -> Result<Query> {
        Query::new(Arc::clone(self.registry()), entity)
    }

    /// Every record matching `query`. Joined queries return each root row
    /// once.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = %query.entity().name()))]
    pub async fn load_all(&self, cx: &Cx, query: &Query) -> Outcome<Vec<Record>, Error> {
        let schema = Arc::clone(query.entity());
        let connection = try_outcome!(self.connection(cx, schema.database()).await);
        let driver = connection.driver();
        let joined = !try_result!(query.tracker()).joins().is_empty();
        let (sql, params) = try_result!(query.to_sql(&*driver));
        let rows = try_outcome!(connection.query(cx, &sql, &params).await);

        let mut seen = HashSet::new();
        let records: Vec<Record> = rows
            .iter()
            .map(|row| Record::from_row(Arc::clone(query.registry()), Arc::clone(&schema), row))
            .filter(|record| !joined || record.id().is_null() || seen.insert(record.id().to_string()))
            .collect();
        tracing::debug!(rows = rows.len(), records = records.len(), "Records loaded");
        Outcome::Ok(records)
    }

    /// First record matching `query`.
    pub async fn first(&self, cx: &Cx, query: &Query) -> Outcome<Option<Record>, Error> {
        let records = try_outcome!(self.load_all(cx, &query.clone().limit(1)).await);
        Outcome::Ok(records.into_iter().next())
    }

    /// Number of root records matching `query`.
    pub async fn count(&self, cx: &Cx, query: &Query) -> Outcome<u64, Error> {
        let connection = try_outcome!(self.connection(cx, query.entity().database()).await);
        let driver = connection.driver();
        let (sql, params) = try_result!(query.count_sql(&*driver));
        let row = try_outcome!(connection.query_one(cx, &sql, &params).await);
        let count = row
            .as_ref()
            .and_then(|row| row.get(0))
            .and_then(Value::as_i64)
            .unwrap_or(0);
        Outcome::Ok(u64::try_from(count).unwrap_or(0))
    }

    /// The record of `entity` whose primary key is `id`.
    pub async fn find(&self, cx: &Cx, entity: &str, id: impl Into<Value>) -> Outcome<Record, Error> {
        let id = id.into();
        let query = try_result!(self.where_query(entity));
        let primary_key = query.entity().primary_key().to_string();
        let found = try_outcome!(
            self.first(cx, &query.where_eq(&primary_key, id.clone()))
                .await
        );
        match found {
            Some(record) => Outcome::Ok(record),
            None => Outcome::Err(Error::RecordNotFound(RecordNotFoundError {
                entity: entity.to_string(),
                primary_key,
                value: id,
            })),
        }
    }

    /// First record of `entity` matching every `(attribute, value)` pair.
    /// NULL values match NULL columns.
    pub async fn find_by(
        &self,
        cx: &Cx,
        entity: &str,
        conditions: &[(&str, Value)],
    ) -> Outcome<Option<Record>, Error> {
        let mut query = try_result!(self.where_query(entity));
        let table = query.entity().table().to_string();
        for (attribute, value) in conditions {
            if !query.entity().has_attribute(attribute) {
                return Outcome::Err(Error::config(
                    ConfigErrorKind::UnknownAttribute,
                    format!("Unknown attribute \"{}\" on {}", attribute, entity),
                ));
            }
            query = if value.is_null() {
                query.where_expr(Expr::qualified(table.as_str(), *attribute).is_null())
            } else {
                query.where_eq(attribute, value.clone())
            };
        }
        self.first(cx, &query).await
    }

    /// Re-read `record` from the database, dropping pending changes and
    /// cached relationships.
    pub async fn reload(&self, cx: &Cx, record: &mut Record) -> Outcome<(), Error> {
        try_result!(record.ensure_usable());
        if record.is_new_record() {
            return Outcome::Err(Error::config(
                ConfigErrorKind::InvalidState,
                format!("Cannot reload a new {} record", record.entity()),
            ));
        }
        let primary_key = record.schema().primary_key().to_string();
        let id = record
            .persisted
            .get(&primary_key)
            .cloned()
            .unwrap_or(Value::Null);
        let fresh = try_outcome!(self.find(cx, record.entity(), id).await);
        record.replace_persisted(fresh);
        Outcome::Ok(())
    }

    /// Load the relationships named by `spec` into `records` with one
    /// `IN (...)` query per relationship and level, applying relationship
    /// scopes. `records` must all be of one entity.
    pub fn preload<'a>(
        &'a self,
        cx: &'a Cx,
        records: &'a mut [Record],
        spec: &'a JoinSpec,
    ) -> LocalBoxFuture<'a, Outcome<(), Error>> {
        Box::pin(async move {
            let Some(first) = records.first() else {
                return Outcome::Ok(());
            };
            let schema = Arc::clone(first.schema());
            if let Some(other) = records.iter().find(|r| r.entity() != schema.name()) {
                return Outcome::Err(Error::config(
                    ConfigErrorKind::Invalid,
                    format!(
                        "Cannot preload a mix of {} and {} records",
                        schema.name(),
                        other.entity()
                    ),
                ));
            }

            for (name, nested) in spec.children() {
                let (definition, target) =
                    try_result!(self.registry().relationship(schema.name(), name));
                let definition = definition.clone();
                let (target_column, owner_column) = definition.join_columns();
                let from_owner_rows = matches!(definition, RelationshipDefinition::BelongsTo { .. });

                let mut seen = HashSet::new();
                let mut keys = Vec::new();
                for record in records.iter() {
                    if !from_owner_rows && !record.is_persisted() {
                        continue;
                    }
                    let key = try_result!(record.get(owner_column));
                    if !key.is_null() && seen.insert(key.to_string()) {
                        keys.push(key.clone());
                    }
                }

                let mut fetched = if keys.is_empty() {
                    Vec::new()
                } else {
                    let mut query = try_result!(Query::new(
                        Arc::clone(self.registry()),
                        target.name()
                    ))
                    .where_in(target_column, keys);
                    if let Some(scope) = definition.scope() {
                        query = query.apply_scope(scope);
                    }
                    try_outcome!(self.load_all(cx, &query).await)
                };
                tracing::debug!(
                    entity = %schema.name(),
                    relationship = %name,
                    owners = records.len(),
                    loaded = fetched.len(),
                    "Preloaded relationship"
                );
                if !nested.is_empty() {
                    try_outcome!(self.preload(cx, &mut fetched, nested).await);
                }

                for record in records.iter_mut() {
                    let key = try_result!(record.get(owner_column)).clone();
                    let matches = fetched.iter().filter(|candidate| {
                        !key.is_null()
                            && (from_owner_rows || record.is_persisted())
                            && candidate.get(target_column).ok() == Some(&key)
                    });
                    let value = if definition.is_collection() {
                        RelationshipValue::Many(matches.cloned().collect())
                    } else {
                        RelationshipValue::One(matches.cloned().next().map(Box::new))
                    };
                    record.relationships.insert(
                        name.to_string(),
                        InstanceRelationship::loaded(value, definition.options().auto_save),
                    );
                }
            }
            Outcome::Ok(())
        })
    }
}
