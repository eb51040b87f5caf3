use crate::core::Attributes;
use serde_json::Value;
use std::sync::Arc;

/// Attributes as they were at the last successful sync.
///
/// Snapshots are shared and never edited; a sync installs a new one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot(Arc<Attributes>);

impl Snapshot {
    pub fn capture(attributes: &Attributes) -> Self {
        Self(Arc::new(attributes.clone()))
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
