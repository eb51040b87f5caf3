use super::{
    DEFAULT_INVALID_MESSAGE, DEFAULT_REQUIRED_MESSAGE, ErrorMap, ErrorMessage, FieldRules,
    REQUIRED_RULE, RuleSet, Validator,
};
use crate::core::{Attributes, is_truthy};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{Level, event};

/// Everything a record type knows about validating its fields.
#[derive(Clone, Default)]
pub struct Validations {
    rules: RuleSet,
    validators: BTreeMap<String, Validator>,
    messages: BTreeMap<String, ErrorMessage>,
    field_translations: BTreeMap<String, String>,
}

impl fmt::Debug for Validations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validations")
            .field("rules", &self.rules)
            .field("validators", &self.validators.keys().collect::<Vec<_>>())
            .field("messages", &self.messages)
            .field("field_translations", &self.field_translations)
            .finish()
    }
}

impl Validations {
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn add_rules(&mut self, rules: FieldRules) {
        self.rules.insert(rules);
    }

    pub fn add_validator(&mut self, name: impl Into<String>, validator: Validator) {
        self.validators.insert(name.into(), validator);
    }

    pub fn has_validator(&self, name: &str) -> bool {
        self.validators.contains_key(name)
    }

    pub fn set_message(&mut self, rule: impl Into<String>, message: ErrorMessage) {
        self.messages.insert(rule.into(), message);
    }

    pub fn translate_field(&mut self, field: impl Into<String>, label: impl Into<String>) {
        self.field_translations.insert(field.into(), label.into());
    }

    /// Validates one field, replacing only that field's entry in `errors`.
    pub fn validate_field(&self, attributes: &Attributes, field: &str, errors: &mut ErrorMap) -> bool {
        errors.clear_field(field);

        let Some(field_rules) = self.rules.get(field) else {
            return true;
        };

        let value = attributes.get(field);
        let mut messages = Vec::new();

        if is_truthy(value) {
            let value = value.unwrap_or(&Value::Null);
            for rule in field_rules.rules().iter().filter(|rule| !rule.is_required()) {
                let Some(validator) = self.validators.get(rule.name()) else {
                    event!(Level::TRACE, field = %field, rule = %rule.name(), "no validator registered, rule skipped");
                    continue;
                };
                if validator(value, rule.parameter()) {
                    continue;
                }
                let message = match rule.message().or_else(|| self.messages.get(rule.name())) {
                    Some(message) => message.render(field, value, rule.parameter()),
                    None => DEFAULT_INVALID_MESSAGE.to_string(),
                };
                messages.push(self.interpolate(&message, field, value, rule.parameter()));
            }
        } else if let Some(required) = field_rules.required_rule() {
            let value = value.unwrap_or(&Value::Null);
            let message = match required.message().or_else(|| self.messages.get(REQUIRED_RULE)) {
                Some(message) => message.render(field, value, required.parameter()),
                None => DEFAULT_REQUIRED_MESSAGE.to_string(),
            };
            messages.push(self.interpolate(&message, field, value, required.parameter()));
        }

        if !messages.is_empty() {
            errors.set(field, messages);
        }
        !errors.contains(field)
    }

    /// Rebuilds the whole error map.
    pub fn validate_all(&self, attributes: &Attributes, errors: &mut ErrorMap) -> bool {
        errors.clear();
        for field_rules in self.rules.fields() {
            self.validate_field(attributes, field_rules.field(), errors);
        }
        errors.is_empty()
    }

    fn interpolate(&self, message: &str, field: &str, value: &Value, parameter: &Value) -> String {
        if !message.contains("%(") {
            return message.to_string();
        }
        let label = self
            .field_translations
            .get(field)
            .map(String::as_str)
            .unwrap_or(field);
        message
            .replace("%(fieldName)s", label)
            .replace("%(fieldValue)s", &render_value(value))
            .replace("%(validationValue)s", &render_value(parameter))
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
