//! Application-wide data layer configuration.

use crate::config::DatabaseIdentifier;
use crate::pool::ConnectionPool;
use crate::scope::ExecutionScope;
use activerow_core::{ConfigErrorKind, Cx, Error, Outcome, Registry, try_outcome};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Databases, entity registry and locale settings, built once at startup.
pub struct Configuration {
    pools: BTreeMap<String, Arc<ConnectionPool>>,
    registry: Arc<Registry>,
    default_locale: String,
    locale_fallbacks: HashMap<String, Vec<String>>,
}

impl Configuration {
    /// Start building a configuration.
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    /// The entity registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Pool of a database identifier.
    pub fn get_database_pool(&self, identifier: &str) -> Result<&Arc<ConnectionPool>, Error> {
        self.pools.get(identifier).ok_or_else(|| {
            Error::config(
                ConfigErrorKind::NotInitialized,
                format!("Unknown database identifier \"{}\"", identifier),
            )
        })
    }

    /// Settings of a database identifier.
    pub fn get_database_identifier(&self, identifier: &str) -> Result<&DatabaseIdentifier, Error> {
        self.get_database_pool(identifier).map(|pool| pool.identifier())
    }

    /// Every configured pool, ordered by identifier.
    pub fn pools(&self) -> impl Iterator<Item = &Arc<ConnectionPool>> {
        self.pools.values()
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// Locales to try, in order, when reading a translation for `locale`:
    /// the locale itself, its configured fallbacks, then the default locale.
    pub fn locale_chain(&self, locale: &str) -> Vec<String> {
        let mut chain = vec![locale.to_string()];
        let fallbacks = self.locale_fallbacks.get(locale).into_iter().flatten();
        for candidate in fallbacks.chain(std::iter::once(&self.default_locale)) {
            if !chain.contains(candidate) {
                chain.push(candidate.clone());
            }
        }
        chain
    }

    /// Run `body` with a connection of every pool bound in its scope.
    ///
    /// Pools already bound in `scope` keep their connection. All connections
    /// checked out here go back to their pools when `body` ends.
    pub async fn with_connections<T, F>(
        &self,
        cx: &Cx,
        scope: &ExecutionScope,
        body: F,
    ) -> Outcome<T, Error>
    where
        F: AsyncFnOnce(ExecutionScope) -> Outcome<T, Error>,
    {
        let mut current = scope.clone();
        let mut checkins = Vec::with_capacity(self.pools.len());
        for pool in self.pools.values() {
            let (bound, checkin) = try_outcome!(pool.bind(cx, &current).await);
            current = bound;
            checkins.extend(checkin);
        }
        tracing::debug!(bound = current.len(), checked_out = checkins.len(), "Connections bound");
        body(current).await
    }

    /// Like [`with_connections`](Self::with_connections), but when `scope`
    /// already binds every pool `body` runs directly on it.
    pub async fn ensure_connections<T, F>(
        &self,
        cx: &Cx,
        scope: &ExecutionScope,
        body: F,
    ) -> Outcome<T, Error>
    where
        F: AsyncFnOnce(ExecutionScope) -> Outcome<T, Error>,
    {
        if self.pools.keys().all(|name| scope.is_bound(name)) {
            return body(scope.clone()).await;
        }
        self.with_connections(cx, scope, body).await
    }

    /// Close every pool.
    pub async fn close(&self, cx: &Cx) -> Outcome<(), Error> {
        for pool in self.pools.values() {
            try_outcome!(pool.close(cx).await);
        }
        Outcome::Ok(())
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("databases", &self.pools.keys().collect::<Vec<_>>())
            .field("entities", &self.registry.entities().count())
            .field("default_locale", &self.default_locale)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Configuration`].
#[derive(Default)]
pub struct ConfigurationBuilder {
    databases: Vec<DatabaseIdentifier>,
    registry: Option<Arc<Registry>>,
    default_locale: Option<String>,
    locale_fallbacks: HashMap<String, Vec<String>>,
}

impl ConfigurationBuilder {
    /// Register a database.
    pub fn database(mut self, identifier: DatabaseIdentifier) -> Self {
        self.databases.push(identifier);
        self
    }

    /// Set the entity registry.
    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Default locale (`"en"` unless set).
    pub fn default_locale(mut self, locale: impl Into<String>) -> Self {
        self.default_locale = Some(locale.into());
        self
    }

    /// Fallback locales tried after `locale`.
    pub fn locale_fallbacks(mut self, locale: impl Into<String>, fallbacks: &[&str]) -> Self {
        self.locale_fallbacks.insert(
            locale.into(),
            fallbacks.iter().map(|l| (*l).to_string()).collect(),
        );
        self
    }

    /// Build the configuration.
    ///
    /// Fails on duplicate database identifiers, and when an entity of the
    /// registry names a database that was not registered.
    pub fn build(self) -> Result<Arc<Configuration>, Error> {
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(Registry::default()));

        let mut pools = BTreeMap::new();
        for identifier in self.databases {
            let name = identifier.name.clone();
            if pools.contains_key(&name) {
                return Err(Error::config(
                    ConfigErrorKind::Invalid,
                    format!("Database \"{}\" is configured twice", name),
                ));
            }
            pools.insert(name, Arc::new(ConnectionPool::new(identifier)));
        }

        for schema in registry.entities() {
            if !pools.contains_key(schema.database()) {
                return Err(Error::config(
                    ConfigErrorKind::NotInitialized,
                    format!(
                        "Entity {} uses database \"{}\", which is not configured",
                        schema.name(),
                        schema.database()
                    ),
                ));
            }
        }

        Ok(Arc::new(Configuration {
            pools,
            registry,
            default_locale: self.default_locale.unwrap_or_else(|| "en".to_string()),
            locale_fallbacks: self.locale_fallbacks,
        }))
    }
}
