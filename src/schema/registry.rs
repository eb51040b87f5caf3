use super::{AssociationDescriptor, AssociationKind, AssociationOptions, RecordType};
use crate::core::{Attributes, RecordError, Result};
use crate::record::{InitOptions, Record};
use log::debug;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Type name -> record type. Resolves related types by name for associations and
/// constructs their instances.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: BTreeMap<String, Arc<RecordType>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) a type under its own name.
    pub fn register(&mut self, record_type: RecordType) -> &mut Self {
        self.types
            .insert(record_type.name().to_string(), Arc::new(record_type));
        self
    }

    /// Registers `name` as a subtype of the already registered `parent`.
    pub fn register_subtype(
        &mut self,
        name: &str,
        parent: &str,
        customize: impl FnOnce(RecordType) -> RecordType,
    ) -> Result<&mut Self> {
        let child = customize(self.resolve(parent)?.extend(name));
        Ok(self.register(child))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<RecordType>> {
        self.types
            .get(name)
            .cloned()
            .ok_or_else(|| RecordError::UnknownType(name.to_string()))
    }

    pub fn instantiate(&self, name: &str, attributes: Option<Attributes>, init: &InitOptions) -> Result<Record> {
        let record_type = self.resolve(name)?;
        Ok(Record::with_options(record_type, attributes, init))
    }

    /// Declares a to-one association. Returns `false` without changing anything when either
    /// type is not registered yet.
    pub fn declare_belongs_to(&mut self, owner: &str, related: &str, options: AssociationOptions) -> bool {
        self.declare(owner, related, AssociationKind::BelongsTo, options)
    }

    /// Declares a to-many association. Returns `false` without changing anything when either
    /// type is not registered yet.
    pub fn declare_has_many(&mut self, owner: &str, related: &str, options: AssociationOptions) -> bool {
        self.declare(owner, related, AssociationKind::HasMany, options)
    }

    fn declare(
        &mut self,
        owner: &str,
        related: &str,
        kind: AssociationKind,
        options: AssociationOptions,
    ) -> bool {
        if !self.types.contains_key(related) {
            debug!("association {owner} -> {related} ignored: '{related}' is not registered");
            return false;
        }
        let Some(owner_type) = self.types.get_mut(owner) else {
            debug!("association {owner} -> {related} ignored: '{owner}' is not registered");
            return false;
        };
        Arc::make_mut(owner_type).attach_association(AssociationDescriptor::new(related, kind, options));
        true
    }
}
