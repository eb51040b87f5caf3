//! Standard validators a record type can opt into with
//! [`RecordType::with_standard_validators`](crate::schema::RecordType::with_standard_validators).

use super::Validator;
use lazy_static::lazy_static;
use lru::LruCache;
use regex::Regex;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

const PATTERN_CACHE_CAPACITY: usize = 64;

lazy_static! {
    static ref PATTERN_CACHE: Mutex<LruCache<String, Regex>> = Mutex::new(LruCache::new(
        NonZeroUsize::new(PATTERN_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN)
    ));
}

pub fn standard() -> Vec<(&'static str, Validator)> {
    vec![
        ("min_length", Arc::new(min_length) as Validator),
        ("max_length", Arc::new(max_length) as Validator),
        ("minimum", Arc::new(minimum) as Validator),
        ("maximum", Arc::new(maximum) as Validator),
        ("pattern", Arc::new(pattern) as Validator),
        ("one_of", Arc::new(one_of) as Validator),
    ]
}

fn length_of(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        Value::Object(map) => Some(map.len()),
        _ => None,
    }
}

pub fn min_length(value: &Value, parameter: &Value) -> bool {
    match (length_of(value), parameter.as_u64()) {
        (Some(len), Some(min)) => len as u64 >= min,
        _ => false,
    }
}

pub fn max_length(value: &Value, parameter: &Value) -> bool {
    match (length_of(value), parameter.as_u64()) {
        (Some(len), Some(max)) => len as u64 <= max,
        _ => false,
    }
}

pub fn minimum(value: &Value, parameter: &Value) -> bool {
    match (value.as_f64(), parameter.as_f64()) {
        (Some(v), Some(min)) => v >= min,
        _ => false,
    }
}

pub fn maximum(value: &Value, parameter: &Value) -> bool {
    match (value.as_f64(), parameter.as_f64()) {
        (Some(v), Some(max)) => v <= max,
        _ => false,
    }
}

pub fn one_of(value: &Value, parameter: &Value) -> bool {
    parameter
        .as_array()
        .is_some_and(|allowed| allowed.contains(value))
}

/// Matches string values against the regex given as parameter. Invalid patterns never match.
pub fn pattern(value: &Value, parameter: &Value) -> bool {
    let (Some(text), Some(source)) = (value.as_str(), parameter.as_str()) else {
        return false;
    };

    let Ok(mut cache) = PATTERN_CACHE.lock() else {
        return Regex::new(source).is_ok_and(|re| re.is_match(text));
    };
    if let Some(re) = cache.get(source) {
        return re.is_match(text);
    }
    match Regex::new(source) {
        Ok(re) => {
            let matched = re.is_match(text);
            cache.put(source.to_string(), re);
            matched
        }
        Err(_) => false,
    }
}
