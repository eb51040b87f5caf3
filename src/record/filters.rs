use serde_json::Value;
use std::fmt;
use std::sync::Arc;

pub type FieldFilter = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Declarative field transforms keyed by a dotted path (`"author.name"`, `"tags.0"`).
///
/// Used as read filters (after parsing a response) and write filters (on the outbound
/// copy of a payload). A filter only runs where its path resolves to a value.
#[derive(Clone, Default)]
pub struct FieldFilters {
    entries: Vec<(String, FieldFilter)>,
}

impl FieldFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F>(mut self, path: impl Into<String>, filter: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.entries.push((path.into(), Arc::new(filter)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn apply(&self, target: &mut Value) {
        for (path, filter) in &self.entries {
            if let Some(slot) = resolve_path_mut(target, path) {
                let current = std::mem::take(slot);
                *slot = filter(current);
            }
        }
    }
}

impl fmt::Debug for FieldFilters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|(path, _)| path))
            .finish()
    }
}

fn resolve_path_mut<'a>(target: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    let mut cursor = target;
    for segment in path.split('.') {
        cursor = match cursor {
            Value::Object(map) => map.get_mut(segment)?,
            Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(cursor)
}
