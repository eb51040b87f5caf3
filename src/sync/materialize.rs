use super::session::RecordStore;
use crate::core::{Attributes, Result};
use crate::record::{Record, RecordKey};
use crate::schema::TypeRegistry;
use serde_json::Value;

/// Merges `payload` into the record at `key`.
///
/// Keys naming one of the record type's associations become related records: arrays replace
/// the to-many list, objects the to-one reference. Nested payloads are materialized the same
/// way and the records created for them start out synced. Other keys are plain attributes.
pub(crate) fn materialize(
    registry: &TypeRegistry,
    store: &mut RecordStore,
    key: RecordKey,
    payload: Attributes,
) -> Result<()> {
    let record_type = store.get(key)?.record_type().clone();

    for (field, value) in payload {
        let association = record_type
            .associations()
            .find_map(|descriptor| descriptor.match_payload_key(&field));

        match (association, value) {
            (Some((reference, type_name)), Value::Array(items)) => {
                let mut related = Vec::with_capacity(items.len());
                for item in items {
                    related.push(materialize_nested(registry, store, &type_name, item)?);
                }
                store.get_mut(key)?.replace_many(reference, related);
            }
            (Some((reference, type_name)), item @ Value::Object(_)) => {
                let related = materialize_nested(registry, store, &type_name, item)?;
                store.get_mut(key)?.link_one(reference, related);
            }
            (_, value) => {
                store.get_mut(key)?.set(field, value);
            }
        }
    }

    Ok(())
}

fn materialize_nested(
    registry: &TypeRegistry,
    store: &mut RecordStore,
    type_name: &str,
    item: Value,
) -> Result<RecordKey> {
    let key = store.insert(Record::new(registry.resolve(type_name)?));
    if let Value::Object(payload) = item {
        materialize(registry, store, key, payload)?;
    }
    store.get_mut(key)?.mark_synced();
    Ok(key)
}
