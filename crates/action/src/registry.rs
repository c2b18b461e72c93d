//! Name-keyed registry for discovering action definitions.
//!
//! Callers that resolve actions dynamically (job runners, routers)
//! populate one of these at startup. Definitions are stored as
//! `Arc<ActionDefinition>` for shared ownership across concurrent
//! invocations.

use std::collections::HashMap;
use std::sync::Arc;

use crate::definition::ActionDefinition;

/// A registry of action definitions, keyed by name.
#[derive(Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<ActionDefinition>>,
}

impl ActionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition under its name. Overwrites any existing
    /// entry with the same name.
    pub fn register(&mut self, definition: Arc<ActionDefinition>) {
        self.actions
            .insert(definition.name().to_owned(), definition);
    }

    /// Look up a definition by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<ActionDefinition>> {
        self.actions.get(name).cloned()
    }

    /// Whether a definition with the given name is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Remove a definition by name, returning it if present.
    pub fn unregister(&mut self, name: &str) -> Option<Arc<ActionDefinition>> {
        self.actions.remove(name)
    }

    /// Names of every registered definition, unordered.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.actions.keys().map(String::as_str).collect()
    }

    /// Number of registered definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl std::fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names = self.names();
        names.sort_unstable();
        f.debug_struct("ActionRegistry")
            .field("count", &self.actions.len())
            .field("names", &names)
            .finish()
    }
}
