//! Execution scopes.

use crate::connection::Connection;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Connections bound to one logical call chain, keyed by database
/// identifier.
///
/// A scope is an immutable value passed down explicitly. Binding a
/// connection yields a child scope; the parent is unaffected, so a
/// binding never leaks into a sibling call chain.
#[derive(Clone, Default)]
pub struct ExecutionScope {
    bindings: Arc<HashMap<String, Arc<Connection>>>,
}

impl ExecutionScope {
    /// A scope with no bound connections.
    pub fn new() -> Self {
        Self::default()
    }

    /// The connection bound for `identifier`, if any.
    pub fn get(&self, identifier: &str) -> Option<&Arc<Connection>> {
        self.bindings.get(identifier)
    }

    /// Whether `identifier` has a bound connection.
    pub fn is_bound(&self, identifier: &str) -> bool {
        self.bindings.contains_key(identifier)
    }

    /// Child scope additionally binding `connection` under `identifier`.
    pub fn with_binding(&self, identifier: impl Into<String>, connection: Arc<Connection>) -> Self {
        let mut bindings = (*self.bindings).clone();
        bindings.insert(identifier.into(), connection);
        Self {
            bindings: Arc::new(bindings),
        }
    }

    /// Number of bound connections.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl fmt::Debug for ExecutionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (identifier, connection) in self.bindings.iter() {
            map.entry(identifier, &connection.id());
        }
        map.finish()
    }
}
