use std::collections::HashMap;
use std::sync::Arc;

use crate::effect::EffectDefinition;
use crate::error::{Error, Result};

/// Lookup of effect definitions by id, built once at startup
#[derive(Debug, Default, Clone)]
pub struct DefinitionRegistry {
    definitions: HashMap<String, Arc<EffectDefinition>>,
    order: Vec<String>,
}

impl DefinitionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry, failing on the first duplicate id
    pub fn from_definitions(definitions: impl IntoIterator<Item = EffectDefinition>) -> Result<Self> {
        let mut registry = Self::new();
        for definition in definitions {
            registry.register(definition)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, definition: EffectDefinition) -> Result<()> {
        let id = definition.id().to_string();
        if self.definitions.contains_key(&id) {
            return Err(Error::DuplicateEffect(id));
        }
        self.order.push(id.clone());
        self.definitions.insert(id, Arc::new(definition));
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Arc<EffectDefinition>> {
        self.definitions.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.definitions.contains_key(id)
    }

    /// Definitions in registration order
    pub fn iter(&self) -> impl Iterator<Item = &Arc<EffectDefinition>> {
        self.order.iter().filter_map(|id| self.definitions.get(id))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
