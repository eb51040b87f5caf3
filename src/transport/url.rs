use crate::core::{RecordError, Result, id_to_string};
use crate::record::Record;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Characters left as-is by JavaScript's `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// `root` for new records, `root/<encoded id>` otherwise.
///
/// The root is the instance override or the type's root, followed by the type's resource
/// suffix. A record without any resolvable root is a configuration error.
pub fn record_url(record: &Record) -> Result<String> {
    if let Some(url) = record.url_override() {
        return Ok(url.to_string());
    }

    let record_type = record.record_type();
    let root = record
        .url_root_override()
        .map(str::to_string)
        .or_else(|| record_type.resolve_url_root())
        .map(|root| match record_type.resolve_url_resource() {
            Some(resource) => root + &resource,
            None => root,
        })
        .ok_or_else(|| {
            RecordError::Configuration(format!(
                "record type '{}' needs a url or a url root",
                record_type.name()
            ))
        })?;

    match record.id() {
        None => Ok(root),
        Some(id) => Ok(join_id(&root, &id_to_string(id))),
    }
}

pub fn join_id(root: &str, id: &str) -> String {
    let separator = if root.ends_with('/') { "" } else { "/" };
    format!("{}{}{}", root, separator, utf8_percent_encode(id, COMPONENT))
}
