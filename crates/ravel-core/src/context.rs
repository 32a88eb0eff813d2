//! Shared application resources handed to request handlers.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// A name → resource map shared read-only across handlers.
///
/// Resources are registered during router construction and never mutated
/// afterwards, so the map can be read concurrently from every worker thread
/// without locking.
#[derive(Default)]
pub struct Context {
    resources: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shared resource under a name. Last write wins.
    pub fn set<T: Any + Send + Sync>(&mut self, name: impl Into<String>, resource: Arc<T>) {
        self.resources.insert(name.into(), resource);
    }

    /// Look up a resource by name and concrete type.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.resources
            .get(name)
            .and_then(|r| Arc::clone(r).downcast::<T>().ok())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("resources", &self.resources.keys().collect::<Vec<_>>())
            .finish()
    }
}
