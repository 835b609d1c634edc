use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::types::typedef::TypeDef;

/// Shared table of declared types keyed by qualified name.
///
/// Interning is idempotent: the first definition registered under a name
/// wins, so collection element references always alias the same entry.
pub struct TypeRegistry {
    types: DashMap<String, Arc<TypeDef>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            types: DashMap::new(),
        }
    }

    /// Register a definition, returning the shared entry for its name
    pub fn intern(&self, def: TypeDef) -> Arc<TypeDef> {
        let entry = self
            .types
            .entry(def.name().to_string())
            .or_insert_with(|| {
                debug!(name = %def.name(), "interned type");
                Arc::new(def)
            });
        entry.clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<TypeDef>> {
        self.types.get(name).map(|entry| entry.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn list(&self) -> Vec<String> {
        self.types.iter().map(|entry| entry.key().clone()).collect()
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
