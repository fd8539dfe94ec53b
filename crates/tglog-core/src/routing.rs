use std::collections::HashMap;

use crate::domain::Destination;

/// Category → destination map with a mandatory default.
#[derive(Clone, Debug)]
pub struct RoutingTable {
    default: Destination,
    overrides: HashMap<String, Destination>,
}

impl RoutingTable {
    pub fn new(default: Destination) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    pub fn with_override(mut self, category: impl Into<String>, dest: Destination) -> Self {
        self.overrides.insert(category.into(), dest);
        self
    }

    pub fn default_destination(&self) -> &Destination {
        &self.default
    }

    /// Destination for `category`; unmapped categories go to the default.
    pub fn resolve(&self, category: &str) -> &Destination {
        self.overrides.get(category).unwrap_or(&self.default)
    }
}
