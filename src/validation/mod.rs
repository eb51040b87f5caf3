//! Declarative per-field validation.
//!
//! A [`RuleSet`] maps fields to ordered [`Rule`]s. Each rule names a predicate registered on
//! the record type (a [`Validator`]) and carries the parameter passed to it. The special
//! `required` rule is handled by the engine itself and short-circuits the other rules of the
//! field when the value is falsy.

pub mod builtin;
mod engine;

use crate::core::is_truthy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub use engine::Validations;

pub const REQUIRED_RULE: &str = "required";
pub const DEFAULT_REQUIRED_MESSAGE: &str = "is required";
pub const DEFAULT_INVALID_MESSAGE: &str = "is invalid";

/// Predicate behind a named rule: `(field value, rule parameter) -> passed`.
pub type Validator = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Field name -> ordered list of error messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMap(BTreeMap<String, Vec<String>>);

impl ErrorMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn set(&mut self, field: impl Into<String>, messages: Vec<String>) {
        self.0.insert(field.into(), messages);
    }

    pub fn clear_field(&mut self, field: &str) {
        self.0.remove(field);
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl fmt::Display for ErrorMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            first = false;
            write!(f, "{} {}", field, messages.join(", "))?;
        }
        Ok(())
    }
}

/// Literal message, or one computed from `(field, value, parameter)`.
#[derive(Clone)]
pub enum ErrorMessage {
    Text(String),
    Computed(Arc<dyn Fn(&str, &Value, &Value) -> String + Send + Sync>),
}

impl ErrorMessage {
    pub fn computed<F>(render: F) -> Self
    where
        F: Fn(&str, &Value, &Value) -> String + Send + Sync + 'static,
    {
        ErrorMessage::Computed(Arc::new(render))
    }

    pub fn render(&self, field: &str, value: &Value, parameter: &Value) -> String {
        match self {
            ErrorMessage::Text(text) => text.clone(),
            ErrorMessage::Computed(render) => render(field, value, parameter),
        }
    }
}

impl fmt::Debug for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorMessage::Text(text) => f.debug_tuple("Text").field(text).finish(),
            ErrorMessage::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<&str> for ErrorMessage {
    fn from(text: &str) -> Self {
        ErrorMessage::Text(text.to_string())
    }
}

impl From<String> for ErrorMessage {
    fn from(text: String) -> Self {
        ErrorMessage::Text(text)
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    parameter: Value,
    message: Option<ErrorMessage>,
}

impl Rule {
    pub fn new(name: impl Into<String>, parameter: Value) -> Self {
        Self {
            name: name.into(),
            parameter,
            message: None,
        }
    }

    pub fn required() -> Self {
        Self::new(REQUIRED_RULE, Value::Bool(true))
    }

    /// Builds a rule from its declarative form: a scalar parameter, or an object with
    /// optional `value` and `message` overrides.
    pub fn from_json(name: impl Into<String>, declaration: Value) -> Self {
        match declaration {
            Value::Object(mut overrides)
                if overrides.contains_key("value") || overrides.contains_key("message") =>
            {
                let message = match overrides.remove("message") {
                    Some(Value::String(text)) => Some(ErrorMessage::Text(text)),
                    _ => None,
                };
                let parameter = overrides.remove("value").unwrap_or(Value::Bool(true));
                Self {
                    name: name.into(),
                    parameter,
                    message,
                }
            }
            parameter => Self::new(name, parameter),
        }
    }

    pub fn with_message(mut self, message: impl Into<ErrorMessage>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameter(&self) -> &Value {
        &self.parameter
    }

    pub fn message(&self) -> Option<&ErrorMessage> {
        self.message.as_ref()
    }

    pub fn is_required(&self) -> bool {
        self.name == REQUIRED_RULE
    }
}

#[derive(Debug, Clone)]
pub struct FieldRules {
    field: String,
    rules: Vec<Rule>,
}

impl FieldRules {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            rules: Vec::new(),
        }
    }

    /// `{"required": true, "min_length": {"value": 3, "message": "too short"}}`
    pub fn from_json(field: impl Into<String>, declaration: &serde_json::Map<String, Value>) -> Self {
        let mut rules = Self::new(field);
        for (name, rule) in declaration {
            rules.rules.push(Rule::from_json(name.clone(), rule.clone()));
        }
        rules
    }

    pub fn required(self) -> Self {
        self.with(Rule::required())
    }

    pub fn required_with_message(self, message: impl Into<ErrorMessage>) -> Self {
        self.with(Rule::required().with_message(message))
    }

    pub fn rule(self, name: impl Into<String>, parameter: Value) -> Self {
        self.with(Rule::new(name, parameter))
    }

    pub fn rule_with_message(
        self,
        name: impl Into<String>,
        parameter: Value,
        message: impl Into<ErrorMessage>,
    ) -> Self {
        self.with(Rule::new(name, parameter).with_message(message))
    }

    pub fn with(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The `required` rule when it is switched on; `{"required": false}` leaves the field optional.
    pub fn required_rule(&self) -> Option<&Rule> {
        self.rules
            .iter()
            .find(|rule| rule.is_required() && is_truthy(Some(rule.parameter())))
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    fields: Vec<FieldRules>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds rules for a field, replacing any rules previously declared for it.
    pub fn insert(&mut self, rules: FieldRules) {
        match self.fields.iter_mut().find(|existing| existing.field == rules.field) {
            Some(existing) => *existing = rules,
            None => self.fields.push(rules),
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldRules> {
        self.fields.iter().find(|rules| rules.field == field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldRules> {
        self.fields.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
