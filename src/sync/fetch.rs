use super::materialize::materialize;
use super::session::RecordSession;
use crate::core::{RecordError, Result};
use crate::record::{Record, RecordKey};
use crate::transport::{Operation, SyncOptions, prepare_request};
use serde_json::Value;
use tracing::{Instrument, Level, event, info_span};

impl RecordSession {
    /// Reloads `key` from its resource and replaces its snapshot.
    ///
    /// Response keys naming an association become related records. A response that is not
    /// an object is rejected with [`RecordError::InvalidResponse`].
    pub async fn fetch(&self, key: RecordKey, options: SyncOptions) -> Result<RecordKey> {
        let span = info_span!("record.fetch", record = %key);
        self.fetch_record(key, options).instrument(span).await
    }

    async fn fetch_record(&self, key: RecordKey, options: SyncOptions) -> Result<RecordKey> {
        let (request, record_type) = {
            let store = self.store()?;
            let record = store.get(key)?;
            (
                prepare_request(Operation::Read, record, &options, None)?,
                record.record_type().clone(),
            )
        };

        let response = self.transport.perform(request).await?;
        let mut body = record_type.parse(response.body, &options);
        record_type.read_filter_spec().apply(&mut body);
        let Value::Object(payload) = body else {
            event!(Level::WARN, "fetch response is not an object");
            return Err(RecordError::InvalidResponse("Not a valid response type".to_string()));
        };

        let mut store = self.store()?;
        materialize(&self.registry, &mut store, key, payload)?;
        store.get_mut(key)?.mark_synced();
        event!(Level::DEBUG, "record fetched");
        Ok(key)
    }

    /// Creates a record of `type_name` with identifier `id` and fetches it.
    pub async fn fetch_one(&self, type_name: &str, id: Value, options: SyncOptions) -> Result<RecordKey> {
        let key = self.new_record(type_name, None)?;
        self.with_record_mut(key, |record| record.set_id(id))?;
        match self.fetch(key, options).await {
            Ok(key) => Ok(key),
            Err(err) => {
                self.release(key)?;
                Err(err)
            }
        }
    }

    /// Lists the collection of `type_name`. Every element becomes a synced record.
    pub async fn fetch_all(&self, type_name: &str, options: SyncOptions) -> Result<Vec<RecordKey>> {
        let span = info_span!("record.fetch_all", type_name);
        self.fetch_collection(type_name, options).instrument(span).await
    }

    async fn fetch_collection(&self, type_name: &str, options: SyncOptions) -> Result<Vec<RecordKey>> {
        let record_type = self.registry.resolve(type_name)?;
        let request = prepare_request(Operation::Read, &Record::new(record_type.clone()), &options, None)?;

        let response = self.transport.perform(request).await?;
        let Value::Array(items) = record_type.parse(response.body, &options) else {
            event!(Level::WARN, "fetch_all response is not an array");
            return Err(RecordError::InvalidResponse("expecting an array".to_string()));
        };

        let mut store = self.store()?;
        let mut keys = Vec::with_capacity(items.len());
        for mut item in items {
            record_type.read_filter_spec().apply(&mut item);
            let Value::Object(attributes) = item else {
                event!(Level::DEBUG, "fetch_all skipped a non-object element");
                continue;
            };
            let mut record = Record::with_attributes(record_type.clone(), attributes);
            record.mark_synced();
            keys.push(store.insert(record));
        }
        event!(Level::DEBUG, count = keys.len(), "collection fetched");
        Ok(keys)
    }

    /// Deletes the resource behind `key`. A new record has no resource and resolves at once.
    pub async fn destroy(&self, key: RecordKey, options: SyncOptions) -> Result<()> {
        let span = info_span!("record.destroy", record = %key);
        self.destroy_record(key, options).instrument(span).await
    }

    async fn destroy_record(&self, key: RecordKey, options: SyncOptions) -> Result<()> {
        let request = {
            let store = self.store()?;
            let record = store.get(key)?;
            if record.is_new() {
                event!(Level::DEBUG, "record is new, nothing to delete");
                return Ok(());
            }
            prepare_request(Operation::Delete, record, &options, None)?
        };

        self.transport.perform(request).await?;
        event!(Level::DEBUG, "record destroyed");
        Ok(())
    }
}
