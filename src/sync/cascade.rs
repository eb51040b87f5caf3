//! Cascading save.
//!
//! `save` runs in three phases. Unsaved to-one dependencies are saved first and concurrently,
//! then the owner is committed, then new or changed to-many dependents are saved
//! concurrently. Every phase settles once through [`settle_all`].
//!
//! A [`CascadeScope`] is shared by the whole call. Each record gets at most one running save
//! in it, and a record that needs a dependency already being saved elsewhere in the cascade
//! joins that save instead of writing the dependency again. A wait that would close a cycle
//! is skipped, so the record is committed without that foreign key.

use super::session::RecordSession;
use super::settle::settle_all;
use crate::core::{Attributes, RecordError, Result};
use crate::record::RecordKey;
use crate::schema::association::default_foreign_key;
use crate::transport::{Operation, SyncOptions, prepare_request};
use async_recursion::async_recursion;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::{Instrument, Level, event, info_span};

pub(crate) type SaveHandle = Shared<BoxFuture<'static, Result<RecordKey>>>;

/// Records taking part in one cascading save.
pub(crate) struct CascadeScope {
    state: Mutex<ScopeState>,
}

#[derive(Default)]
struct ScopeState {
    members: HashSet<RecordKey>,
    running: HashMap<RecordKey, SaveHandle>,
    /// save -> saves it waits on
    waits: HashMap<RecordKey, HashSet<RecordKey>>,
}

impl ScopeState {
    fn reaches(&self, from: RecordKey, to: RecordKey) -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(key) = stack.pop() {
            if key == to {
                return true;
            }
            if !seen.insert(key) {
                continue;
            }
            if let Some(next) = self.waits.get(&key) {
                stack.extend(next.iter().copied());
            }
        }
        false
    }
}

impl CascadeScope {
    pub(crate) fn rooted(root: RecordKey) -> Self {
        let mut state = ScopeState::default();
        state.members.insert(root);
        Self {
            state: Mutex::new(state),
        }
    }

    pub(crate) fn contains(&self, key: RecordKey) -> Result<bool> {
        Ok(self.state.lock()?.members.contains(&key))
    }

    /// Records that the save of `waiter` waits on the save of `key`.
    ///
    /// Returns `false`, recording nothing, when `key` already waits on `waiter` directly or
    /// through other saves of this cascade.
    pub(crate) fn wait_on(&self, waiter: RecordKey, key: RecordKey) -> Result<bool> {
        let mut state = self.state.lock()?;
        if state.reaches(key, waiter) {
            return Ok(false);
        }
        state.waits.entry(waiter).or_default().insert(key);
        Ok(true)
    }

    /// The running save of `key`, started with `start` when there is none yet.
    pub(crate) fn join_or_start<F>(&self, key: RecordKey, start: F) -> Result<SaveHandle>
    where
        F: FnOnce() -> BoxFuture<'static, Result<RecordKey>>,
    {
        let mut state = self.state.lock()?;
        if let Some(running) = state.running.get(&key) {
            return Ok(running.clone());
        }
        state.members.insert(key);
        let handle = start().shared();
        state.running.insert(key, handle.clone());
        Ok(handle)
    }

    fn abandon(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.running.clear();
        }
    }
}

/// Drops the running saves of a cascade whose caller stopped polling it.
struct AbandonGuard(Option<Arc<CascadeScope>>);

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        if let Some(scope) = self.0.take() {
            scope.abandon();
        }
    }
}

impl RecordSession {
    /// Validates and persists `key` together with its unsaved associations.
    ///
    /// `overrides` are assigned before validation. Resolves with `key` once the record and
    /// every cascaded dependency are persisted; the first failure of any phase is returned.
    pub async fn save(
        &self,
        key: RecordKey,
        overrides: Option<Attributes>,
        options: SyncOptions,
    ) -> Result<RecordKey> {
        let scope = Arc::new(CascadeScope::rooted(key));
        let mut guard = AbandonGuard(Some(scope.clone()));
        let outcome = self.save_in_scope(key, overrides, options, &scope).await;
        guard.0 = None;
        outcome
    }

    /// Assigns one field and saves.
    pub async fn save_field(
        &self,
        key: RecordKey,
        field: &str,
        value: Value,
        options: SyncOptions,
    ) -> Result<RecordKey> {
        let mut overrides = Attributes::new();
        overrides.insert(field.to_string(), value);
        self.save(key, Some(overrides), options).await
    }

    #[async_recursion]
    async fn save_in_scope(
        &self,
        key: RecordKey,
        overrides: Option<Attributes>,
        options: SyncOptions,
        scope: &Arc<CascadeScope>,
    ) -> Result<RecordKey> {
        let span = info_span!("record.save", record = %key);
        self.save_phases(key, overrides, options, scope)
            .instrument(span)
            .await
    }

    async fn save_phases(
        &self,
        key: RecordKey,
        overrides: Option<Attributes>,
        options: SyncOptions,
        scope: &Arc<CascadeScope>,
    ) -> Result<RecordKey> {
        {
            let mut store = self.store()?;
            let record = store.get_mut(key)?;
            if let Some(overrides) = overrides {
                record.assign(overrides);
            }
            if !record.validate(None) {
                event!(Level::DEBUG, errors = %record.errors(), "validation failed, nothing sent");
                return Err(RecordError::Validation(record.errors().clone()));
            }
        }

        loop {
            let dependencies = self.prepare_dependencies(key, scope)?;
            if dependencies.is_empty() {
                break;
            }
            event!(Level::DEBUG, count = dependencies.len(), "waiting for to-one dependencies");
            settle_all(dependencies).await?;
        }

        self.commit(key, &options).await?;

        let dependents = self.prepare_dependents(key, scope)?;
        if !dependents.is_empty() {
            event!(Level::DEBUG, count = dependents.len(), "saving to-many dependents");
            settle_all(dependents).await?;
        }

        Ok(key)
    }

    fn start_save(&self, key: RecordKey, scope: &Arc<CascadeScope>) -> BoxFuture<'static, Result<RecordKey>> {
        let session = self.clone();
        let scope = Arc::clone(scope);
        async move { session.save_dependency(key, &scope).await }.boxed()
    }

    /// Saves a cascaded record and requires it to come back with an identifier.
    async fn save_dependency(&self, key: RecordKey, scope: &Arc<CascadeScope>) -> Result<RecordKey> {
        self.save_in_scope(key, None, SyncOptions::default(), scope).await?;

        let (still_new, type_name) =
            self.with_record(key, |record| (record.is_new(), record.type_name().to_string()))?;
        if still_new {
            event!(Level::ERROR, record = %key, type_name = %type_name, "dependency has no identifier after save");
            return Err(RecordError::Cascade {
                type_name,
                reason: "record is still new after its save".to_string(),
            });
        }
        Ok(key)
    }

    /// Copies persisted to-one identifiers into the owner's foreign keys and returns the
    /// saves of the dependencies that are still new.
    fn prepare_dependencies(&self, key: RecordKey, scope: &Arc<CascadeScope>) -> Result<Vec<SaveHandle>> {
        let mut store = self.store()?;
        let record_type = store.get(key)?.record_type().clone();
        let mut waiting_on = Vec::new();
        let mut pending = Vec::new();

        for descriptor in record_type.belongs_to_associations() {
            let reference = descriptor.reference_name();
            let Some(related) = store.get(key)?.related(&reference) else {
                continue;
            };
            let Ok(dependency) = store.get(related) else {
                event!(Level::DEBUG, reference = %reference, "to-one record was released, skipped");
                continue;
            };

            match dependency.id().cloned() {
                Some(id) => {
                    store.get_mut(key)?.set(descriptor.foreign_key(), id);
                }
                None if waiting_on.contains(&related) => {}
                None => {
                    if !scope.wait_on(key, related)? {
                        event!(Level::DEBUG, reference = %reference, related = %related, "to-one record waits on this one, committed without its key");
                        continue;
                    }
                    waiting_on.push(related);
                    pending.push(scope.join_or_start(related, || self.start_save(related, scope))?);
                }
            }
        }

        Ok(pending)
    }

    /// Points new or changed to-many records at the committed owner and returns their saves.
    fn prepare_dependents(&self, key: RecordKey, scope: &Arc<CascadeScope>) -> Result<Vec<SaveHandle>> {
        let mut store = self.store()?;
        let owner = store.get(key)?;
        let owner_type = owner.record_type().clone();
        let Some(owner_id) = owner.id().cloned() else {
            return Ok(Vec::new());
        };
        let mut collected = Vec::new();
        let mut dependents = Vec::new();

        for descriptor in owner_type.has_many_associations() {
            let children = store.get(key)?.related_many(&descriptor.reference_name()).to_vec();
            for child_key in children {
                if collected.contains(&child_key) {
                    continue;
                }
                if scope.contains(child_key)? {
                    event!(Level::DEBUG, child = %child_key, "to-many record already in this cascade");
                    continue;
                }
                let Ok(child) = store.get_mut(child_key) else {
                    continue;
                };
                if !child.is_new() && !child.has_changed(None) {
                    continue;
                }
                let foreign_key = child
                    .record_type()
                    .association(owner_type.name())
                    .map(|back| back.foreign_key())
                    .unwrap_or_else(|| default_foreign_key(owner_type.name()));
                child.set(foreign_key, owner_id.clone());

                if !scope.wait_on(key, child_key)? {
                    continue;
                }
                collected.push(child_key);
                dependents.push(scope.join_or_start(child_key, || self.start_save(child_key, scope))?);
            }
        }

        Ok(dependents)
    }

    /// Writes the record and installs the response as the new baseline.
    async fn commit(&self, key: RecordKey, options: &SyncOptions) -> Result<()> {
        let (request, record_type) = {
            let store = self.store()?;
            let record = store.get(key)?;
            let (operation, payload) = if record.is_new() {
                (Operation::Create, record.to_json())
            } else {
                (Operation::Update, record.changed_attributes(None).to_payload())
            };

            let mut body = Value::Object(payload);
            record.record_type().write_filter_spec().apply(&mut body);
            let data = match body {
                Value::Object(data) => data,
                _ => Attributes::new(),
            };
            (
                prepare_request(operation, record, options, Some(data))?,
                record.record_type().clone(),
            )
        };

        event!(Level::DEBUG, operation = %request.operation, url = %request.url, "committing record");
        let response = self.transport.perform(request).await.map_err(|err| {
            event!(Level::WARN, error = %err, "record write failed");
            RecordError::Transport(err)
        })?;

        let mut body = record_type.parse(response.body, options);
        record_type.read_filter_spec().apply(&mut body);

        let mut store = self.store()?;
        let record = store.get_mut(key)?;
        if let Value::Object(attributes) = body {
            record.assign(attributes);
        }
        record.mark_synced();
        event!(Level::INFO, record = %key, id = ?record.id(), "record saved");
        Ok(())
    }
}
