use crate::core::{lcfirst, to_camel_case, to_snake_case};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssociationKind {
    BelongsTo,
    HasMany,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationOptions {
    /// Join type used by a many-to-many `HasMany`.
    pub through: Option<String>,
    /// Alias used instead of the related type name for the reference.
    pub singular: Option<String>,
    /// Foreign-key field.
    pub key: Option<String>,
}

impl AssociationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn through(mut self, through: impl Into<String>) -> Self {
        self.through = Some(through.into());
        self
    }

    pub fn singular(mut self, singular: impl Into<String>) -> Self {
        self.singular = Some(singular.into());
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationDescriptor {
    related: String,
    kind: AssociationKind,
    options: AssociationOptions,
}

impl AssociationDescriptor {
    pub fn new(related: impl Into<String>, kind: AssociationKind, options: AssociationOptions) -> Self {
        Self {
            related: related.into(),
            kind,
            options,
        }
    }

    pub fn related(&self) -> &str {
        &self.related
    }

    pub fn kind(&self) -> AssociationKind {
        self.kind
    }

    pub fn options(&self) -> &AssociationOptions {
        &self.options
    }

    pub fn is_belongs_to(&self) -> bool {
        self.kind == AssociationKind::BelongsTo
    }

    pub fn is_has_many(&self) -> bool {
        self.kind == AssociationKind::HasMany
    }

    /// Name under which related records are stored on the owner.
    pub fn reference_name(&self) -> String {
        let base = match self.kind {
            AssociationKind::BelongsTo => self.options.singular.as_deref(),
            AssociationKind::HasMany => self.options.through.as_deref(),
        };
        lcfirst(base.unwrap_or(&self.related))
    }

    /// Type instantiated for the records on this side of the association.
    pub fn target_type(&self) -> &str {
        match (self.kind, self.options.through.as_deref()) {
            (AssociationKind::HasMany, Some(through)) => through,
            _ => &self.related,
        }
    }

    pub fn foreign_key(&self) -> String {
        self.options
            .key
            .clone()
            .unwrap_or_else(|| default_foreign_key(&self.related))
    }

    /// Whether a payload key names this association; returns the reference name and the
    /// type to instantiate when it does.
    pub(crate) fn match_payload_key(&self, key: &str) -> Option<(String, String)> {
        let normalized = to_camel_case(key).to_lowercase();
        if normalized == self.related.to_lowercase() {
            return Some((lcfirst(&self.related), self.related.clone()));
        }
        let matches = |name: &&String| normalized == name.to_lowercase();
        if let Some(through) = self.options.through.as_ref().filter(matches) {
            return Some((lcfirst(through), through.clone()));
        }
        if let Some(singular) = self.options.singular.as_ref().filter(matches) {
            return Some((lcfirst(singular), self.related.clone()));
        }
        None
    }
}

/// `Author` -> `author_id`
pub fn default_foreign_key(type_name: &str) -> String {
    format!("{}_id", to_snake_case(type_name))
}
