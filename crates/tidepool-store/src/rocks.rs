//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.
//!
//! Read-modify-write operations (state patches, supersession, claims) run under
//! a single store-wide write lock and commit through one `WriteBatch`, so the
//! queue's select-and-mark steps cannot interleave inside this process. `RocksDB`
//! itself refuses a second process opening the same directory.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};
use tidepool_core::{CommandId, DeviceId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::types::{Command, CommandKind, CommandValue, DeviceState, DeviceStatePatch, SensorReading};
use crate::Store;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn write(&self, batch: WriteBatch) -> Result<()> {
        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Collect the pending-index keys of a device, oldest first.
    fn pending_keys(&self, device_id: &DeviceId) -> Result<Vec<Box<[u8]>>> {
        let cf_pending = self.cf(cf::COMMANDS_PENDING)?;
        let prefix = keys::device_prefix(device_id);

        let mut found = Vec::new();
        let iter = self
            .db
            .iterator_cf(&cf_pending, IteratorMode::From(&prefix, Direction::Forward));

        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            // Stop if we're past the prefix
            if !key.starts_with(&prefix) {
                break;
            }

            found.push(key);
        }

        Ok(found)
    }

    /// Stage an insert of a fresh command into `batch`.
    fn stage_insert(&self, batch: &mut WriteBatch, command: &Command) -> Result<()> {
        let cf_commands = self.cf(cf::COMMANDS)?;
        let cf_pending = self.cf(cf::COMMANDS_PENDING)?;
        let cf_by_device = self.cf(cf::COMMANDS_BY_DEVICE)?;

        let index_key = keys::device_command_key(&command.device_id, command.created_at, &command.id);
        let value = Self::serialize(command)?;

        batch.put_cf(&cf_commands, keys::command_key(&command.id), &value);
        batch.put_cf(&cf_by_device, &index_key, []);
        if !command.processed {
            batch.put_cf(&cf_pending, &index_key, []);
        }
        Ok(())
    }

    /// Stage "mark processed" for a command found through `pending_key`.
    fn stage_processed(
        &self,
        batch: &mut WriteBatch,
        pending_key: &[u8],
        command: &mut Command,
        processed_at: DateTime<Utc>,
    ) -> Result<()> {
        let cf_commands = self.cf(cf::COMMANDS)?;
        let cf_pending = self.cf(cf::COMMANDS_PENDING)?;

        command.mark_processed(processed_at);
        batch.put_cf(&cf_commands, keys::command_key(&command.id), Self::serialize(&*command)?);
        batch.delete_cf(&cf_pending, pending_key);
        Ok(())
    }

    /// Stage supersession of every pending command of `kind`.
    ///
    /// Caller must hold the write lock.
    fn stage_supersede(
        &self,
        batch: &mut WriteBatch,
        device_id: &DeviceId,
        kind: CommandKind,
        processed_at: DateTime<Utc>,
    ) -> Result<usize> {
        let cf_pending = self.cf(cf::COMMANDS_PENDING)?;
        let mut superseded = 0;

        for key in self.pending_keys(device_id)? {
            let command_id = keys::extract_command_id(&key);
            match self.get_command(&command_id)? {
                Some(mut command) if command.kind() == kind => {
                    self.stage_processed(batch, &key, &mut command, processed_at)?;
                    superseded += 1;
                }
                Some(_) => {}
                None => {
                    tracing::warn!(command_id = %command_id, "Dropping dangling pending index entry");
                    batch.delete_cf(&cf_pending, &key);
                }
            }
        }

        Ok(superseded)
    }

    fn new_command(device_id: &DeviceId, value: CommandValue, created_at: DateTime<Utc>) -> Command {
        Command {
            id: CommandId::generate(),
            device_id: *device_id,
            value,
            created_at,
            processed: false,
            processed_at: None,
        }
    }
}

impl Store for RocksStore {
    // =========================================================================
    // Device State Operations
    // =========================================================================

    fn put_device_state(&self, state: &DeviceState) -> Result<()> {
        let cf = self.cf(cf::DEVICE_STATE)?;
        let key = keys::device_key(&state.device_id);
        let value = Self::serialize(state)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_device_state(&self, device_id: &DeviceId) -> Result<Option<DeviceState>> {
        let cf = self.cf(cf::DEVICE_STATE)?;
        let key = keys::device_key(device_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn update_device_state(
        &self,
        device_id: &DeviceId,
        patch: &DeviceStatePatch,
    ) -> Result<DeviceState> {
        let _guard = self.write_lock.lock();

        let mut state = self
            .get_device_state(device_id)?
            .ok_or(StoreError::NotFound("device state"))?;
        patch.apply(&mut state, Utc::now());
        self.put_device_state(&state)?;

        Ok(state)
    }

    // =========================================================================
    // Telemetry Operations
    // =========================================================================

    fn insert_sensor_reading(&self, reading: &SensorReading) -> Result<()> {
        let cf = self.cf(cf::SENSOR_READINGS)?;
        let nonce = *uuid::Uuid::new_v4().as_bytes();
        let key = keys::reading_key(&reading.device_id, reading.created_at, &nonce);
        let value = Self::serialize(reading)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn latest_sensor_reading(&self, device_id: &DeviceId) -> Result<Option<SensorReading>> {
        let cf = self.cf(cf::SENSOR_READINGS)?;
        let prefix = keys::device_prefix(device_id);
        let upper = keys::device_upper_bound(device_id);

        let mut iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&upper, Direction::Reverse));

        match iter.next() {
            Some(item) => {
                let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
                if key.starts_with(&prefix) {
                    Ok(Some(Self::deserialize(&value)?))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    fn list_sensor_readings_since(
        &self,
        device_id: &DeviceId,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<SensorReading>> {
        let cf = self.cf(cf::SENSOR_READINGS)?;
        let prefix = keys::device_prefix(device_id);
        let seek = keys::device_time_seek(device_id, since);

        let mut readings = Vec::new();
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&seek, Direction::Forward));

        for item in iter {
            if readings.len() >= limit {
                break;
            }

            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            if !key.starts_with(&prefix) {
                break;
            }

            readings.push(Self::deserialize(&value)?);
        }

        Ok(readings)
    }

    // =========================================================================
    // Command Queue Operations
    // =========================================================================

    fn insert_command(
        &self,
        device_id: &DeviceId,
        value: CommandValue,
        created_at: DateTime<Utc>,
    ) -> Result<Command> {
        let command = Self::new_command(device_id, value, created_at);

        let mut batch = WriteBatch::default();
        self.stage_insert(&mut batch, &command)?;
        self.write(batch)?;

        Ok(command)
    }

    fn get_command(&self, command_id: &CommandId) -> Result<Option<Command>> {
        let cf = self.cf(cf::COMMANDS)?;
        let key = keys::command_key(command_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn mark_pending_processed_by_kind(
        &self,
        device_id: &DeviceId,
        kind: CommandKind,
        processed_at: DateTime<Utc>,
    ) -> Result<usize> {
        let _guard = self.write_lock.lock();

        let mut batch = WriteBatch::default();
        let superseded = self.stage_supersede(&mut batch, device_id, kind, processed_at)?;
        self.write(batch)?;

        Ok(superseded)
    }

    fn oldest_unprocessed_command(&self, device_id: &DeviceId) -> Result<Option<Command>> {
        for key in self.pending_keys(device_id)? {
            if let Some(command) = self.get_command(&keys::extract_command_id(&key))? {
                if !command.processed {
                    return Ok(Some(command));
                }
            }
        }
        Ok(None)
    }

    fn mark_command_processed(
        &self,
        command_id: &CommandId,
        processed_at: DateTime<Utc>,
    ) -> Result<()> {
        let _guard = self.write_lock.lock();

        let mut command = self
            .get_command(command_id)?
            .ok_or(StoreError::NotFound("command"))?;
        if command.processed {
            return Ok(());
        }

        let pending_key = keys::device_command_key(&command.device_id, command.created_at, &command.id);
        let mut batch = WriteBatch::default();
        self.stage_processed(&mut batch, &pending_key, &mut command, processed_at)?;
        self.write(batch)
    }

    fn claim_oldest_unprocessed_command(
        &self,
        device_id: &DeviceId,
        processed_at: DateTime<Utc>,
    ) -> Result<Option<Command>> {
        let _guard = self.write_lock.lock();
        let cf_pending = self.cf(cf::COMMANDS_PENDING)?;

        let mut batch = WriteBatch::default();
        let mut claimed = None;

        for key in self.pending_keys(device_id)? {
            match self.get_command(&keys::extract_command_id(&key))? {
                Some(mut command) if !command.processed => {
                    self.stage_processed(&mut batch, &key, &mut command, processed_at)?;
                    claimed = Some(command);
                    break;
                }
                // Stale index entry; clean it up on the way.
                _ => batch.delete_cf(&cf_pending, &key),
            }
        }

        self.write(batch)?;
        Ok(claimed)
    }

    fn replace_pending_command(
        &self,
        device_id: &DeviceId,
        value: CommandValue,
        created_at: DateTime<Utc>,
    ) -> Result<(Command, usize)> {
        let _guard = self.write_lock.lock();

        let mut batch = WriteBatch::default();
        let superseded = self.stage_supersede(&mut batch, device_id, value.kind(), created_at)?;
        let command = Self::new_command(device_id, value, created_at);
        self.stage_insert(&mut batch, &command)?;
        self.write(batch)?;

        Ok((command, superseded))
    }

    fn list_unprocessed_commands(&self, device_id: &DeviceId) -> Result<Vec<Command>> {
        let mut commands = Vec::new();
        for key in self.pending_keys(device_id)? {
            if let Some(command) = self.get_command(&keys::extract_command_id(&key))? {
                if !command.processed {
                    commands.push(command);
                }
            }
        }
        Ok(commands)
    }

    fn latest_command_of_kind(
        &self,
        device_id: &DeviceId,
        kind: CommandKind,
    ) -> Result<Option<Command>> {
        let cf_by_device = self.cf(cf::COMMANDS_BY_DEVICE)?;
        let prefix = keys::device_prefix(device_id);
        let upper = keys::device_upper_bound(device_id);

        let iter = self
            .db
            .iterator_cf(&cf_by_device, IteratorMode::From(&upper, Direction::Reverse));

        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(&prefix) {
                break;
            }

            if let Some(command) = self.get_command(&keys::extract_command_id(&key))? {
                if command.kind() == kind {
                    return Ok(Some(command));
                }
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FeedTrigger, FeedingConfig};
    use chrono::Duration;
    use tempfile::TempDir;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn provisioned_store() -> (RocksStore, TempDir, DeviceId) {
        let (store, dir) = create_test_store();
        let device_id = DeviceId::DEFAULT;
        store
            .put_device_state(&DeviceState::provisioned(device_id, Utc::now()))
            .unwrap();
        (store, dir, device_id)
    }

    #[test]
    fn device_state_crud() {
        let (store, _dir, device_id) = provisioned_store();

        let retrieved = store.get_device_state(&device_id).unwrap().unwrap();
        assert!(!retrieved.pump_active);
        assert_eq!(retrieved.feeding_interval, "4h");

        let patch = DeviceStatePatch {
            pump_active: Some(true),
            brightness: Some(80),
            ..Default::default()
        };
        let updated = store.update_device_state(&device_id, &patch).unwrap();
        assert!(updated.pump_active);
        assert_eq!(updated.brightness, 80);

        let reread = store.get_device_state(&device_id).unwrap().unwrap();
        assert_eq!(reread, updated);
    }

    #[test]
    fn update_missing_device_is_not_found() {
        let (store, _dir) = create_test_store();
        let result = store.update_device_state(&DeviceId::generate(), &DeviceStatePatch::default());
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn inserted_commands_are_pending_in_creation_order() {
        let (store, _dir, device_id) = provisioned_store();
        let now = Utc::now();

        let light = store
            .insert_command(&device_id, CommandValue::Light(20), now)
            .unwrap();
        let pump = store
            .insert_command(&device_id, CommandValue::Pump(true), now - Duration::seconds(30))
            .unwrap();

        let pending = store.list_unprocessed_commands(&device_id).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, pump.id);
        assert_eq!(pending[1].id, light.id);

        let oldest = store.oldest_unprocessed_command(&device_id).unwrap().unwrap();
        assert_eq!(oldest.id, pump.id);
        assert!(!oldest.processed);
    }

    #[test]
    fn supersede_only_touches_matching_kind() {
        let (store, _dir, device_id) = provisioned_store();
        let now = Utc::now();

        store.insert_command(&device_id, CommandValue::Pump(true), now).unwrap();
        store.insert_command(&device_id, CommandValue::Pump(false), now).unwrap();
        let feed = store
            .insert_command(&device_id, CommandValue::Feed(FeedTrigger::Now), now)
            .unwrap();

        let superseded = store
            .mark_pending_processed_by_kind(&device_id, CommandKind::Pump, now)
            .unwrap();
        assert_eq!(superseded, 2);

        let pending = store.list_unprocessed_commands(&device_id).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, feed.id);
    }

    #[test]
    fn claim_marks_and_returns_once() {
        let (store, _dir, device_id) = provisioned_store();
        let now = Utc::now();

        let command = store
            .insert_command(&device_id, CommandValue::Light(55), now)
            .unwrap();

        let claimed = store
            .claim_oldest_unprocessed_command(&device_id, now)
            .unwrap()
            .unwrap();
        assert_eq!(claimed.id, command.id);
        assert!(claimed.processed);
        assert_eq!(claimed.processed_at, Some(now));

        assert!(store
            .claim_oldest_unprocessed_command(&device_id, now)
            .unwrap()
            .is_none());

        let stored = store.get_command(&command.id).unwrap().unwrap();
        assert!(stored.processed);
    }

    #[test]
    fn concurrent_claims_never_share_a_command() {
        let (store, _dir, device_id) = provisioned_store();
        let store = Arc::new(store);
        let now = Utc::now();

        for i in 0..20u8 {
            store
                .insert_command(&device_id, CommandValue::Light(i), now + Duration::milliseconds(i.into()))
                .unwrap();
        }

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let mut ids = Vec::new();
                    while let Some(command) = store
                        .claim_oldest_unprocessed_command(&device_id, Utc::now())
                        .unwrap()
                    {
                        ids.push(command.id);
                    }
                    ids
                })
            })
            .collect();

        let mut all: Vec<CommandId> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(all.len(), 20);
        all.sort_by_key(|id| *id.as_bytes());
        all.dedup();
        assert_eq!(all.len(), 20);
    }

    #[test]
    fn replace_pending_supersedes_and_inserts() {
        let (store, _dir, device_id) = provisioned_store();
        let now = Utc::now();

        let old = store
            .insert_command(&device_id, CommandValue::Pump(false), now)
            .unwrap();
        let (new, superseded) = store
            .replace_pending_command(&device_id, CommandValue::Pump(true), now + Duration::seconds(1))
            .unwrap();
        assert_eq!(superseded, 1);

        let pending = store.list_unprocessed_commands(&device_id).unwrap();
        assert_eq!(pending, vec![new]);

        let old = store.get_command(&old.id).unwrap().unwrap();
        assert!(old.processed);
    }

    #[test]
    fn mark_command_processed_is_idempotent() {
        let (store, _dir, device_id) = provisioned_store();
        let now = Utc::now();

        let command = store
            .insert_command(
                &device_id,
                CommandValue::Config(FeedingConfig {
                    interval: Some("6h".into()),
                    quantity: Some(2),
                }),
                now,
            )
            .unwrap();

        store.mark_command_processed(&command.id, now).unwrap();
        store
            .mark_command_processed(&command.id, now + Duration::seconds(9))
            .unwrap();

        let stored = store.get_command(&command.id).unwrap().unwrap();
        assert_eq!(stored.processed_at, Some(now));
        assert!(store.list_unprocessed_commands(&device_id).unwrap().is_empty());

        let missing = store.mark_command_processed(&CommandId::generate(), now);
        assert!(matches!(missing, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn latest_command_of_kind_includes_processed() {
        let (store, _dir, device_id) = provisioned_store();
        let now = Utc::now();

        store.insert_command(&device_id, CommandValue::Pump(true), now).unwrap();
        let latest_pump = store
            .insert_command(&device_id, CommandValue::Pump(false), now + Duration::seconds(5))
            .unwrap();
        store
            .insert_command(&device_id, CommandValue::Light(3), now + Duration::seconds(10))
            .unwrap();
        store
            .claim_oldest_unprocessed_command(&device_id, now)
            .unwrap();

        let found = store
            .latest_command_of_kind(&device_id, CommandKind::Pump)
            .unwrap()
            .unwrap();
        assert_eq!(found.id, latest_pump.id);
        assert!(store
            .latest_command_of_kind(&device_id, CommandKind::Feed)
            .unwrap()
            .is_none());
    }

    #[test]
    fn queues_are_per_device() {
        let (store, _dir) = create_test_store();
        let first = DeviceId::generate();
        let second = DeviceId::generate();
        let now = Utc::now();

        store.insert_command(&first, CommandValue::Pump(true), now).unwrap();

        assert!(store
            .claim_oldest_unprocessed_command(&second, now)
            .unwrap()
            .is_none());
        assert!(store
            .claim_oldest_unprocessed_command(&first, now)
            .unwrap()
            .is_some());
    }

    #[test]
    fn sensor_readings_window() {
        let (store, _dir, device_id) = provisioned_store();
        let now = Utc::now();

        for hours_ago in [30i32, 20, 10, 1] {
            store
                .insert_sensor_reading(&SensorReading {
                    device_id,
                    temperature: 25.0 + f64::from(hours_ago),
                    water_level: Some(80.0),
                    created_at: now - Duration::hours(i64::from(hours_ago)),
                })
                .unwrap();
        }

        let recent = store
            .list_sensor_readings_since(&device_id, now - Duration::hours(24), 500)
            .unwrap();
        assert_eq!(recent.len(), 3);
        assert!(recent.windows(2).all(|w| w[0].created_at <= w[1].created_at));

        let capped = store
            .list_sensor_readings_since(&device_id, now - Duration::hours(48), 2)
            .unwrap();
        assert_eq!(capped.len(), 2);

        let latest = store.latest_sensor_reading(&device_id).unwrap().unwrap();
        assert_eq!(latest.created_at, now - Duration::hours(1));

        assert!(store
            .latest_sensor_reading(&DeviceId::generate())
            .unwrap()
            .is_none());
    }
}
