use super::Snapshot;
use crate::core::{Attributes, deep_equal, is_reserved};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldChange {
    Set(Value),
    /// Present in the snapshot, absent now.
    Removed,
}

impl FieldChange {
    pub fn value(&self) -> Option<&Value> {
        match self {
            FieldChange::Set(value) => Some(value),
            FieldChange::Removed => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet(BTreeMap<String, FieldChange>);

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.0.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldChange)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Update payload: changed values only. Removed fields have no JSON form and are omitted.
    pub fn to_payload(&self) -> Attributes {
        self.0
            .iter()
            .filter_map(|(field, change)| change.value().map(|v| (field.clone(), v.clone())))
            .collect()
    }
}

/// Computes the fields that differ from `snapshot`.
///
/// Without `compare`, `current` is diffed and snapshot fields missing from it are reported
/// as [`FieldChange::Removed`]. With `compare`, only the fields of `compare` are diffed
/// against the snapshot and removals are not detected.
pub fn changed_attributes(
    current: &Attributes,
    snapshot: &Snapshot,
    compare: Option<&Attributes>,
) -> ChangeSet {
    let mut changed = BTreeMap::new();
    let target = compare.unwrap_or(current);

    if compare.is_none() {
        for field in snapshot.attributes().keys() {
            if !is_reserved(field) && !target.contains_key(field) {
                changed.insert(field.clone(), FieldChange::Removed);
            }
        }
    }

    for (field, value) in target {
        if is_reserved(field) {
            continue;
        }
        let unchanged = snapshot
            .get(field)
            .is_some_and(|previous| deep_equal(value, previous));
        if !unchanged {
            changed.insert(field.clone(), FieldChange::Set(value.clone()));
        }
    }

    ChangeSet(changed)
}
