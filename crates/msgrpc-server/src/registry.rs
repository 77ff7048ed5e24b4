use crate::handler::Handler;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Name → handler table shared by every connection of a server.
///
/// Lookups take the read lock just long enough to clone the handler's `Arc`,
/// so a `bind` never waits on a running handler and a running handler keeps
/// the binding it started with even if the name is rebound meanwhile.
#[derive(Default)]
pub struct FunctionRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn Handler>>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `handler` under `name`, returning the handler it replaced.
    pub fn insert(&self, name: impl Into<String>, handler: Arc<dyn Handler>) -> Option<Arc<dyn Handler>> {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), handler)
    }

    /// Removes the binding for `name`. Returns `true` if it existed.
    pub fn remove(&self, name: &str) -> bool {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Handler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Bound names in lexicographic order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.handlers.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("methods", &self.names())
            .finish()
    }
}
