use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

pub type Attributes = Map<String, Value>;

/// Attribute names starting with this prefix are internal markers and never diffed.
pub const RESERVED_PREFIX: char = '$';

pub fn is_reserved(field: &str) -> bool {
    field.starts_with(RESERVED_PREFIX)
}

/// JavaScript-style truthiness: absent, `null`, `false`, `0`, NaN and `""` are falsy.
/// Arrays and objects are truthy even when empty.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Structural equality that skips `$`-prefixed keys inside objects.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(left), Value::Object(right)) => {
            let visible = |map: &Attributes| map.keys().filter(|k| !is_reserved(k)).count();
            if visible(left) != visible(right) {
                return false;
            }
            left.iter()
                .filter(|(key, _)| !is_reserved(key))
                .all(|(key, value)| right.get(key).is_some_and(|other| deep_equal(value, other)))
        }
        (Value::Array(left), Value::Array(right)) => {
            left.len() == right.len() && left.iter().zip(right).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Number(left), Value::Number(right)) => match (left.as_f64(), right.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => left == right,
        },
        _ => a == b,
    }
}

/// Render an identifier the way it appears in URLs and foreign keys.
pub fn id_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn lcfirst(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn ucfirst(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `post_tags` / `post-tags` -> `PostTags`
pub fn to_camel_case(name: &str) -> String {
    name.split(['_', '-'])
        .filter(|part| !part.is_empty())
        .map(ucfirst)
        .collect()
}

/// `PostTag` -> `post_tag`
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (idx, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if idx > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// A setting that is either a fixed value or computed on demand.
pub enum Resolvable<T> {
    Value(T),
    Provider(Arc<dyn Fn() -> T + Send + Sync>),
}

impl<T: Clone> Resolvable<T> {
    pub fn provider<F>(provider: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Resolvable::Provider(Arc::new(provider))
    }

    pub fn resolve(&self) -> T {
        match self {
            Resolvable::Value(value) => value.clone(),
            Resolvable::Provider(provider) => provider(),
        }
    }
}

impl<T: Clone> Clone for Resolvable<T> {
    fn clone(&self) -> Self {
        match self {
            Resolvable::Value(value) => Resolvable::Value(value.clone()),
            Resolvable::Provider(provider) => Resolvable::Provider(provider.clone()),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Resolvable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolvable::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Resolvable::Provider(_) => f.write_str("Provider(..)"),
        }
    }
}

impl From<&str> for Resolvable<String> {
    fn from(value: &str) -> Self {
        Resolvable::Value(value.to_string())
    }
}

impl From<String> for Resolvable<String> {
    fn from(value: String) -> Self {
        Resolvable::Value(value)
    }
}

impl From<Attributes> for Resolvable<Attributes> {
    fn from(value: Attributes) -> Self {
        Resolvable::Value(value)
    }
}
