use crate::core::{Attributes, RecordError, Result};
use crate::record::{ChangeSet, InitOptions, Record, RecordKey};
use crate::schema::TypeRegistry;
use crate::transport::Transport;
use crate::validation::ErrorMap;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{Level, event};

/// Arena owning every record of a session. Associations hold [`RecordKey`]s into it.
#[derive(Debug, Default)]
pub(crate) struct RecordStore {
    records: HashMap<RecordKey, Record>,
    next_key: u64,
}

impl RecordStore {
    pub(crate) fn insert(&mut self, record: Record) -> RecordKey {
        self.next_key += 1;
        let key = RecordKey(self.next_key);
        self.records.insert(key, record);
        key
    }

    pub(crate) fn get(&self, key: RecordKey) -> Result<&Record> {
        self.records
            .get(&key)
            .ok_or_else(|| RecordError::RecordNotFound(key.to_string()))
    }

    pub(crate) fn get_mut(&mut self, key: RecordKey) -> Result<&mut Record> {
        self.records
            .get_mut(&key)
            .ok_or_else(|| RecordError::RecordNotFound(key.to_string()))
    }

    pub(crate) fn remove(&mut self, key: RecordKey) -> Option<Record> {
        self.records.remove(&key)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }
}

/// Entry point: owns the records, the frozen type registry and the transport.
///
/// Cloning is cheap and clones share the same store. The store lock is only held for
/// synchronous sections, never across a transport call.
#[derive(Clone)]
pub struct RecordSession {
    pub(crate) registry: Arc<TypeRegistry>,
    pub(crate) store: Arc<Mutex<RecordStore>>,
    pub(crate) transport: Arc<dyn Transport>,
}

impl fmt::Debug for RecordSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordSession")
            .field("registry", &self.registry)
            .field("records", &self.len())
            .finish()
    }
}

impl RecordSession {
    pub fn new(registry: TypeRegistry, transport: impl Transport + 'static) -> Self {
        Self::from_shared(Arc::new(registry), Arc::new(transport))
    }

    pub fn from_shared(registry: Arc<TypeRegistry>, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry,
            store: Arc::new(Mutex::new(RecordStore::default())),
            transport,
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    pub(crate) fn store(&self) -> Result<MutexGuard<'_, RecordStore>> {
        Ok(self.store.lock()?)
    }

    /// Number of records currently held.
    pub fn len(&self) -> usize {
        self.store().map(|store| store.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ========================================
    // Construction
    // ========================================

    pub fn new_record(&self, type_name: &str, attributes: Option<Attributes>) -> Result<RecordKey> {
        self.new_record_with(type_name, attributes, &InitOptions::default())
    }

    pub fn new_record_with(
        &self,
        type_name: &str,
        attributes: Option<Attributes>,
        init: &InitOptions,
    ) -> Result<RecordKey> {
        let record = self.registry.instantiate(type_name, attributes, init)?;
        self.insert(record)
    }

    /// Adopts a record built outside the session.
    pub fn insert(&self, record: Record) -> Result<RecordKey> {
        Ok(self.store()?.insert(record))
    }

    /// Drops a record from the store. References to it from other records dangle and are
    /// skipped by later cascades.
    pub fn release(&self, key: RecordKey) -> Result<Option<Record>> {
        Ok(self.store()?.remove(key))
    }

    // ========================================
    // Record access
    // ========================================

    pub fn with_record<T>(&self, key: RecordKey, f: impl FnOnce(&Record) -> T) -> Result<T> {
        let store = self.store()?;
        Ok(f(store.get(key)?))
    }

    pub fn with_record_mut<T>(&self, key: RecordKey, f: impl FnOnce(&mut Record) -> T) -> Result<T> {
        let mut store = self.store()?;
        Ok(f(store.get_mut(key)?))
    }

    /// Detached copy of a record.
    pub fn record(&self, key: RecordKey) -> Result<Record> {
        self.with_record(key, Record::clone)
    }

    pub fn get(&self, key: RecordKey, field: &str) -> Result<Option<Value>> {
        self.with_record(key, |record| record.get(field).cloned())
    }

    pub fn set(&self, key: RecordKey, field: &str, value: Value) -> Result<()> {
        self.with_record_mut(key, |record| {
            record.set(field, value);
        })
    }

    pub fn assign(&self, key: RecordKey, values: Attributes) -> Result<()> {
        self.with_record_mut(key, |record| record.assign(values))
    }

    pub fn id(&self, key: RecordKey) -> Result<Option<Value>> {
        self.with_record(key, |record| record.id().cloned())
    }

    pub fn is_new(&self, key: RecordKey) -> Result<bool> {
        self.with_record(key, Record::is_new)
    }

    pub fn to_json(&self, key: RecordKey) -> Result<Attributes> {
        self.with_record(key, Record::to_json)
    }

    pub fn url(&self, key: RecordKey) -> Result<String> {
        self.with_record(key, Record::url)?
    }

    // ========================================
    // Change tracking
    // ========================================

    pub fn changed_attributes(&self, key: RecordKey, compare: Option<&Attributes>) -> Result<ChangeSet> {
        self.with_record(key, |record| record.changed_attributes(compare))
    }

    pub fn has_changed(&self, key: RecordKey, field: Option<&str>) -> Result<bool> {
        self.with_record(key, |record| record.has_changed(field))
    }

    pub fn previous(&self, key: RecordKey, field: &str) -> Result<Option<Value>> {
        self.with_record(key, |record| record.previous(field).cloned())
    }

    // ========================================
    // Validation
    // ========================================

    pub fn validate(&self, key: RecordKey, field: Option<&str>) -> Result<bool> {
        self.with_record_mut(key, |record| record.validate(field))
    }

    pub fn is_valid(&self, key: RecordKey, field: Option<&str>) -> Result<bool> {
        self.with_record(key, |record| record.is_valid(field))
    }

    pub fn errors(&self, key: RecordKey) -> Result<ErrorMap> {
        self.with_record(key, |record| record.errors().clone())
    }

    // ========================================
    // Associations
    // ========================================

    /// Attaches `related` as the to-one record of `owner` for the association declared
    /// against `related_type` (or its singular alias). Returns `related`.
    pub fn add_belongs_to(&self, owner: RecordKey, related_type: &str, related: RecordKey) -> Result<RecordKey> {
        let mut store = self.store()?;
        store.get(related)?;
        let owner_record = store.get_mut(owner)?;
        let reference = owner_record
            .record_type()
            .find_association(related_type)
            .filter(|descriptor| descriptor.is_belongs_to())
            .map(|descriptor| descriptor.reference_name())
            .ok_or_else(|| {
                RecordError::UnknownAssociation(owner_record.type_name().to_string(), related_type.to_string())
            })?;
        owner_record.link_one(reference, related);
        Ok(related)
    }

    /// Creates a record on the to-many side of `owner`'s association with `entity`.
    ///
    /// The created record is of the join type when the association goes `through` one,
    /// otherwise of `entity` itself. With a join type, `target` becomes the join record's
    /// to-one reference for `entity`. The created record also points back at `owner` when
    /// its type declares a to-one association with the owner's type. Returns its key.
    pub fn add_has_many(
        &self,
        owner: RecordKey,
        entity: &str,
        target: Option<RecordKey>,
        related_attributes: Option<Attributes>,
    ) -> Result<RecordKey> {
        let mut store = self.store()?;
        let owner_type = store.get(owner)?.record_type().clone();
        let descriptor = owner_type
            .association(entity)
            .filter(|descriptor| descriptor.is_has_many())
            .ok_or_else(|| RecordError::UnknownAssociation(owner_type.name().to_string(), entity.to_string()))?;

        let mut instance = self.registry.instantiate(
            descriptor.target_type(),
            Some(related_attributes.unwrap_or_default()),
            &InitOptions::default(),
        )?;

        if let (Some(_), Some(target)) = (descriptor.options().through.as_ref(), target) {
            store.get(target)?;
            let reference = instance
                .record_type()
                .find_association(entity)
                .filter(|join| join.is_belongs_to())
                .map(|join| join.reference_name())
                .ok_or_else(|| {
                    RecordError::UnknownAssociation(instance.type_name().to_string(), entity.to_string())
                })?;
            instance.link_one(reference, target);
        }

        let back_reference = instance
            .record_type()
            .association(owner_type.name())
            .filter(|back| back.is_belongs_to())
            .map(|back| back.reference_name());
        if let Some(reference) = back_reference {
            instance.link_one(reference, owner);
        }

        let key = store.insert(instance);
        store.get_mut(owner)?.link_many(descriptor.reference_name(), key);
        event!(Level::DEBUG, owner = %owner, related = %key, entity, "to-many record added");
        Ok(key)
    }

    /// To-one record stored under `reference`.
    pub fn belongs_to(&self, owner: RecordKey, reference: &str) -> Result<Option<RecordKey>> {
        self.with_record(owner, |record| record.related(reference))
    }

    /// To-many records stored under `reference`.
    pub fn has_many(&self, owner: RecordKey, reference: &str) -> Result<Vec<RecordKey>> {
        self.with_record(owner, |record| record.related_many(reference).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AssociationOptions, RecordType};
    use crate::transport::MemoryTransport;
    use serde_json::json;

    fn attrs(value: Value) -> Attributes {
        match value {
            Value::Object(map) => map,
            _ => Attributes::new(),
        }
    }

    fn session() -> RecordSession {
        let mut registry = TypeRegistry::new();
        registry
            .register(RecordType::new("Post").url_root("/posts"))
            .register(RecordType::new("Person").url_root("/people"))
            .register(RecordType::new("Tag").url_root("/tags"))
            .register(RecordType::new("PostTag").url_root("/post_tags"));
        registry.declare_belongs_to("Post", "Person", AssociationOptions::new().singular("Author"));
        registry.declare_has_many("Post", "Tag", AssociationOptions::new().through("PostTag"));
        registry.declare_belongs_to("PostTag", "Post", AssociationOptions::new());
        registry.declare_belongs_to("PostTag", "Tag", AssociationOptions::new());
        RecordSession::new(registry, MemoryTransport::new())
    }

    #[test]
    fn test_store_keys_are_unique() {
        let session = session();
        let a = session.new_record("Post", None).unwrap();
        let b = session.new_record("Post", None).unwrap();
        assert_ne!(a, b);
        assert_eq!(session.len(), 2);

        session.release(a).unwrap();
        assert!(matches!(session.get(a, "title"), Err(RecordError::RecordNotFound(_))));
    }

    #[test]
    fn test_unknown_type() {
        let session = session();
        assert!(matches!(
            session.new_record("Comment", None),
            Err(RecordError::UnknownType(name)) if name == "Comment"
        ));
    }

    #[test]
    fn test_add_belongs_to_by_singular() {
        let session = session();
        let post = session.new_record("Post", None).unwrap();
        let person = session.new_record("Person", Some(attrs(json!({"name": "Ann"})))).unwrap();

        assert_eq!(session.add_belongs_to(post, "Author", person).unwrap(), person);
        assert_eq!(session.belongs_to(post, "author").unwrap(), Some(person));

        let err = session.add_belongs_to(post, "Tag", person).unwrap_err();
        assert!(matches!(err, RecordError::UnknownAssociation(_, _)));
    }

    #[test]
    fn test_add_has_many_through_join_type() {
        let session = session();
        let post = session.new_record("Post", None).unwrap();
        let tag = session.new_record("Tag", Some(attrs(json!({"label": "rust"})))).unwrap();

        let join = session.add_has_many(post, "Tag", Some(tag), None).unwrap();

        assert_eq!(session.has_many(post, "postTag").unwrap(), vec![join]);
        assert_eq!(session.record(join).unwrap().type_name(), "PostTag");
        assert_eq!(session.belongs_to(join, "tag").unwrap(), Some(tag));
        assert_eq!(session.belongs_to(join, "post").unwrap(), Some(post));
    }
}
