pub mod diff;
pub mod filters;
pub mod snapshot;

use crate::core::{Attributes, Result, is_reserved};
use crate::schema::RecordType;
use crate::transport::url::record_url;
use crate::validation::ErrorMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub use diff::{ChangeSet, FieldChange, changed_attributes};
pub use filters::{FieldFilter, FieldFilters};
pub use snapshot::Snapshot;

/// Handle of a record inside a [`RecordSession`](crate::RecordSession).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey(pub(crate) u64);

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Construction options.
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Run the type's parser over the initial properties.
    pub parse: bool,
    /// Run the type's read filters over the initial properties.
    pub read_filters: bool,
    /// Fixed URL for this instance, bypassing URL derivation.
    pub url: Option<String>,
    /// Per-instance URL root.
    pub url_root: Option<String>,
}

impl InitOptions {
    pub fn parsed() -> Self {
        Self {
            parse: true,
            read_filters: true,
            ..Self::default()
        }
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn url_root(mut self, url_root: impl Into<String>) -> Self {
        self.url_root = Some(url_root.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct Record {
    record_type: Arc<RecordType>,
    attributes: Attributes,
    snapshot: Snapshot,
    errors: ErrorMap,
    belongs_to: BTreeMap<String, RecordKey>,
    has_many: BTreeMap<String, Vec<RecordKey>>,
    url: Option<String>,
    url_root: Option<String>,
    synced_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn new(record_type: Arc<RecordType>) -> Self {
        Self::with_options(record_type, None, &InitOptions::default())
    }

    pub fn with_attributes(record_type: Arc<RecordType>, attributes: Attributes) -> Self {
        Self::with_options(record_type, Some(attributes), &InitOptions::default())
    }

    /// Defaults are applied first, then `properties`. When properties are given they also
    /// seed the snapshot, so a freshly constructed record reports no changes for them.
    pub fn with_options(
        record_type: Arc<RecordType>,
        properties: Option<Attributes>,
        init: &InitOptions,
    ) -> Self {
        let mut attributes = record_type.resolve_defaults();
        let mut snapshot = Snapshot::empty();

        if let Some(properties) = properties {
            let mut properties = Value::Object(properties);
            if init.parse {
                properties = record_type.parse(properties, &Default::default());
            }
            if init.read_filters {
                record_type.read_filter_spec().apply(&mut properties);
            }
            if let Value::Object(properties) = properties {
                for (field, value) in &properties {
                    attributes.insert(field.clone(), value.clone());
                }
                snapshot = Snapshot::capture(&properties);
            }
        }

        Self {
            record_type,
            attributes,
            snapshot,
            errors: ErrorMap::new(),
            belongs_to: BTreeMap::new(),
            has_many: BTreeMap::new(),
            url: init.url.clone(),
            url_root: init.url_root.clone(),
            synced_at: None,
        }
    }

    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.record_type
    }

    pub fn type_name(&self) -> &str {
        self.record_type.name()
    }

    // ========================================
    // Attributes
    // ========================================

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.attributes.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.attributes.shift_remove(field)
    }

    /// Assigns every field of `values`, leaving other fields untouched.
    pub fn assign(&mut self, values: Attributes) {
        for (field, value) in values {
            self.attributes.insert(field, value);
        }
    }

    /// Identifier value, `None` when absent or `null`.
    pub fn id(&self) -> Option<&Value> {
        self.attributes
            .get(self.record_type.id_field())
            .filter(|value| !value.is_null())
    }

    pub fn set_id(&mut self, id: Value) {
        let field = self.record_type.id_field().to_string();
        self.attributes.insert(field, id);
    }

    /// A record is new until it has an identifier.
    pub fn is_new(&self) -> bool {
        self.id().is_none()
    }

    /// Full outbound representation: the type's serializer over the non-reserved attributes.
    pub fn to_json(&self) -> Attributes {
        let visible: Attributes = self
            .attributes
            .iter()
            .filter(|(field, _)| !is_reserved(field))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect();
        self.record_type.serialize(&visible)
    }

    // ========================================
    // Change tracking
    // ========================================

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn previous(&self, field: &str) -> Option<&Value> {
        self.snapshot.get(field)
    }

    pub fn previous_attributes(&self) -> &Attributes {
        self.snapshot.attributes()
    }

    pub fn changed_attributes(&self, compare: Option<&Attributes>) -> ChangeSet {
        changed_attributes(&self.attributes, &self.snapshot, compare)
    }

    pub fn has_changed(&self, field: Option<&str>) -> bool {
        let changed = self.changed_attributes(None);
        match field {
            Some(field) => changed.contains(field),
            None => !changed.is_empty(),
        }
    }

    /// Installs the current attributes as the new sync baseline.
    pub fn mark_synced(&mut self) {
        self.snapshot = Snapshot::capture(&self.attributes);
        self.synced_at = Some(Utc::now());
    }

    pub fn synced_at(&self) -> Option<DateTime<Utc>> {
        self.synced_at
    }

    // ========================================
    // Validation
    // ========================================

    /// Validates one field (keeping other fields' errors) or, without a field, rebuilds the
    /// whole error map. Returns whether the validated scope is error free.
    pub fn validate(&mut self, field: Option<&str>) -> bool {
        let validations = self.record_type.validations();
        match field {
            Some(field) => validations.validate_field(&self.attributes, field, &mut self.errors),
            None => validations.validate_all(&self.attributes, &mut self.errors),
        }
    }

    pub fn is_valid(&self, field: Option<&str>) -> bool {
        if self.errors.is_empty() {
            return true;
        }
        field.is_some_and(|field| !self.errors.contains(field))
    }

    pub fn errors(&self) -> &ErrorMap {
        &self.errors
    }

    // ========================================
    // Associations
    // ========================================

    pub fn related(&self, reference: &str) -> Option<RecordKey> {
        self.belongs_to.get(reference).copied()
    }

    pub fn related_many(&self, reference: &str) -> &[RecordKey] {
        self.has_many
            .get(reference)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub(crate) fn link_one(&mut self, reference: String, related: RecordKey) {
        self.belongs_to.insert(reference, related);
    }

    pub(crate) fn link_many(&mut self, reference: String, related: RecordKey) {
        self.has_many.entry(reference).or_default().push(related);
    }

    pub(crate) fn replace_many(&mut self, reference: String, related: Vec<RecordKey>) {
        self.has_many.insert(reference, related);
    }

    // ========================================
    // URL
    // ========================================

    pub fn url(&self) -> Result<String> {
        record_url(self)
    }

    pub fn url_override(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn url_root_override(&self) -> Option<&str> {
        self.url_root.as_deref()
    }
}
