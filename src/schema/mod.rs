//! Record types: declared schemas that instances point at.
//!
//! A [`RecordType`] bundles the per-type settings shared by its instances: identifier
//! attribute, URL settings, defaults, payload hooks, filters, validations and association
//! descriptors. Subtypes are derived with [`RecordType::extend`]. Types are assembled with builder methods, collected in a [`TypeRegistry`]
//! and frozen once the registry is handed to a [`RecordSession`](crate::RecordSession).

pub mod association;
pub mod registry;

use crate::core::{Attributes, Resolvable};
use crate::record::FieldFilters;
use crate::transport::SyncOptions;
use crate::validation::{ErrorMessage, FieldRules, Validations, Validator, builtin};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub use association::{AssociationDescriptor, AssociationKind, AssociationOptions};
pub use registry::TypeRegistry;

pub const DEFAULT_ID_ATTRIBUTE: &str = "id";

/// Turns a raw response body into record attributes.
pub type PayloadParser = Arc<dyn Fn(Value, &SyncOptions) -> Value + Send + Sync>;
/// Turns record attributes into the outbound body of a full write.
pub type PayloadSerializer = Arc<dyn Fn(&Attributes) -> Attributes + Send + Sync>;

#[derive(Clone)]
pub struct RecordType {
    name: String,
    id_attribute: String,
    url_root: Option<Resolvable<String>>,
    url_resource: Option<Resolvable<String>>,
    defaults: Option<Resolvable<Attributes>>,
    read_filters: FieldFilters,
    write_filters: FieldFilters,
    parser: Option<PayloadParser>,
    serializer: Option<PayloadSerializer>,
    validations: Validations,
    associations: BTreeMap<String, AssociationDescriptor>,
}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordType")
            .field("name", &self.name)
            .field("id_attribute", &self.id_attribute)
            .field("url_root", &self.url_root)
            .field("url_resource", &self.url_resource)
            .field("read_filters", &self.read_filters)
            .field("write_filters", &self.write_filters)
            .field("has_parser", &self.parser.is_some())
            .field("has_serializer", &self.serializer.is_some())
            .field("validations", &self.validations)
            .field("associations", &self.associations)
            .finish()
    }
}

impl RecordType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id_attribute: DEFAULT_ID_ATTRIBUTE.to_string(),
            url_root: None,
            url_resource: None,
            defaults: None,
            read_filters: FieldFilters::new(),
            write_filters: FieldFilters::new(),
            parser: None,
            serializer: None,
            validations: Validations::default(),
            associations: BTreeMap::new(),
        }
    }

    /// Derives a subtype that inherits every setting, rule and association of `self`.
    pub fn extend(&self, name: impl Into<String>) -> Self {
        let mut child = self.clone();
        child.name = name.into();
        child
    }

    pub fn id_attribute(mut self, id_attribute: impl Into<String>) -> Self {
        self.id_attribute = id_attribute.into();
        self
    }

    pub fn url_root(mut self, url_root: impl Into<Resolvable<String>>) -> Self {
        self.url_root = Some(url_root.into());
        self
    }

    pub fn url_resource(mut self, url_resource: impl Into<Resolvable<String>>) -> Self {
        self.url_resource = Some(url_resource.into());
        self
    }

    pub fn defaults(mut self, defaults: impl Into<Resolvable<Attributes>>) -> Self {
        self.defaults = Some(defaults.into());
        self
    }

    pub fn read_filters(mut self, filters: FieldFilters) -> Self {
        self.read_filters = filters;
        self
    }

    pub fn write_filters(mut self, filters: FieldFilters) -> Self {
        self.write_filters = filters;
        self
    }

    pub fn parser<F>(mut self, parser: F) -> Self
    where
        F: Fn(Value, &SyncOptions) -> Value + Send + Sync + 'static,
    {
        self.parser = Some(Arc::new(parser));
        self
    }

    pub fn serializer<F>(mut self, serializer: F) -> Self
    where
        F: Fn(&Attributes) -> Attributes + Send + Sync + 'static,
    {
        self.serializer = Some(Arc::new(serializer));
        self
    }

    pub fn validates(mut self, rules: FieldRules) -> Self {
        self.validations.add_rules(rules);
        self
    }

    pub fn validator<F>(mut self, name: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.validations.add_validator(name, Arc::new(predicate) as Validator);
        self
    }

    pub fn with_standard_validators(mut self) -> Self {
        for (name, validator) in builtin::standard() {
            if !self.validations.has_validator(name) {
                self.validations.add_validator(name, validator);
            }
        }
        self
    }

    /// Type-level default message for a rule name (including `required`).
    pub fn validation_message(mut self, rule: impl Into<String>, message: impl Into<ErrorMessage>) -> Self {
        self.validations.set_message(rule, message.into());
        self
    }

    pub fn field_translation(mut self, field: impl Into<String>, label: impl Into<String>) -> Self {
        self.validations.translate_field(field, label);
        self
    }

    // ========================================
    // Accessors
    // ========================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_field(&self) -> &str {
        &self.id_attribute
    }

    pub fn resolve_url_root(&self) -> Option<String> {
        self.url_root.as_ref().map(Resolvable::resolve)
    }

    pub fn resolve_url_resource(&self) -> Option<String> {
        self.url_resource.as_ref().map(Resolvable::resolve)
    }

    pub fn resolve_defaults(&self) -> Attributes {
        self.defaults
            .as_ref()
            .map(Resolvable::resolve)
            .unwrap_or_default()
    }

    pub fn read_filter_spec(&self) -> &FieldFilters {
        &self.read_filters
    }

    pub fn write_filter_spec(&self) -> &FieldFilters {
        &self.write_filters
    }

    pub fn validations(&self) -> &Validations {
        &self.validations
    }

    pub fn parse(&self, raw: Value, options: &SyncOptions) -> Value {
        match &self.parser {
            Some(parser) => parser(raw, options),
            None => raw,
        }
    }

    pub fn serialize(&self, attributes: &Attributes) -> Attributes {
        match &self.serializer {
            Some(serializer) => serializer(attributes),
            None => attributes.clone(),
        }
    }

    // ========================================
    // Associations
    // ========================================

    pub fn associations(&self) -> impl Iterator<Item = &AssociationDescriptor> {
        self.associations.values()
    }

    /// Descriptor keyed by related type name.
    pub fn association(&self, related: &str) -> Option<&AssociationDescriptor> {
        self.associations.get(related)
    }

    /// Descriptor by related type name or by its singular alias.
    pub fn find_association(&self, name: &str) -> Option<&AssociationDescriptor> {
        self.association(name).or_else(|| {
            self.associations.values().find(|descriptor| {
                descriptor
                    .options()
                    .singular
                    .as_deref()
                    .is_some_and(|singular| singular.eq_ignore_ascii_case(name))
            })
        })
    }

    pub fn belongs_to_associations(&self) -> impl Iterator<Item = &AssociationDescriptor> {
        self.associations().filter(|descriptor| descriptor.is_belongs_to())
    }

    pub fn has_many_associations(&self) -> impl Iterator<Item = &AssociationDescriptor> {
        self.associations().filter(|descriptor| descriptor.is_has_many())
    }

    pub(crate) fn attach_association(&mut self, descriptor: AssociationDescriptor) {
        self.associations
            .insert(descriptor.related().to_string(), descriptor);
    }
}
