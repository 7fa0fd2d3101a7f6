use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDateTime;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{reminder::notifier::Permission, utils::progress::Progress};

use super::{
    entities::{HabitEntity, HabitId},
    key_value::{FileStore, KeyValueStore},
};

const HABITS_KEY: &str = "habits";
const PERMISSION_KEY: &str = "notificationPermission";

fn last_progress_key(id: HabitId) -> String {
    format!("lastProgressUpdate-{id}")
}

fn reminder_key(id: HabitId) -> String {
    format!("reminder-{id}")
}

fn record_id(record: &Value) -> Option<HabitId> {
    record.get("id").and_then(Value::as_u64)
}

/// Owns every read and write of persisted habit data. Nothing else in the application touches
/// the keys directly.
///
/// The habit collection is read fully and rewritten fully on every mutation.
pub struct HabitRepository<S> {
    store: S,
}

impl HabitRepository<FileStore> {
    /// Repository over json files in `store_dir`.
    pub fn open(store_dir: PathBuf) -> Result<Self> {
        Ok(Self::new(FileStore::new(store_dir)?))
    }
}

impl<S: KeyValueStore> HabitRepository<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Every habit that can be read. Records that don't parse are skipped with a warning.
    pub async fn get_all(&self) -> Result<Vec<HabitEntity>> {
        Ok(self
            .read_records()
            .await?
            .into_iter()
            .filter_map(|record| match serde_json::from_value::<HabitEntity>(record) {
                Ok(habit) => Some(habit),
                Err(e) => {
                    warn!("Skipping habit record that is not valid: {e}");
                    None
                }
            })
            .collect())
    }

    pub async fn get_by_id(&self, id: HabitId) -> Result<Option<HabitEntity>> {
        Ok(self.get_all().await?.into_iter().find(|h| h.id == id))
    }

    /// Replaces the habit with the same id, or appends it if it's new. Records that can't be read
    /// are written back untouched.
    pub async fn upsert(&self, habit: HabitEntity) -> Result<()> {
        let mut records = self.read_records().await?;
        let id = habit.id;
        let habit = serde_json::to_value(habit)?;
        match records.iter_mut().find(|record| record_id(record) == Some(id)) {
            Some(existing) => *existing = habit,
            None => records.push(habit),
        }
        self.write_json(HABITS_KEY, &records).await
    }

    /// Deletes a habit together with its cached progress and reminder bookkeeping. Returns
    /// whether the habit existed.
    pub async fn delete(&self, id: HabitId) -> Result<bool> {
        let mut records = self.read_records().await?;
        let before = records.len();
        records.retain(|record| record_id(record) != Some(id));
        let existed = records.len() != before;
        if existed {
            self.write_json(HABITS_KEY, &records).await?;
        }
        self.store.remove(&last_progress_key(id)).await?;
        self.store.remove(&reminder_key(id)).await?;
        Ok(existed)
    }

    pub async fn last_progress_update(&self, id: HabitId) -> Result<Option<Progress>> {
        self.read_json(&last_progress_key(id)).await
    }

    pub async fn set_last_progress_update(&self, id: HabitId, progress: Progress) -> Result<()> {
        self.write_json(&last_progress_key(id), &progress).await
    }

    pub async fn next_reminder(&self, id: HabitId) -> Result<Option<NaiveDateTime>> {
        self.read_json(&reminder_key(id)).await
    }

    pub async fn set_next_reminder(&self, id: HabitId, fire_at: NaiveDateTime) -> Result<()> {
        self.write_json(&reminder_key(id), &fire_at).await
    }

    pub async fn clear_next_reminder(&self, id: HabitId) -> Result<()> {
        self.store.remove(&reminder_key(id)).await
    }

    /// What the user decided about notifications. Never asked means [Permission::Default].
    pub async fn notification_permission(&self) -> Result<Permission> {
        Ok(self.read_json(PERMISSION_KEY).await?.unwrap_or_default())
    }

    pub async fn set_notification_permission(&self, permission: Permission) -> Result<()> {
        match permission {
            Permission::Default => self.store.remove(PERMISSION_KEY).await,
            permission => self.write_json(PERMISSION_KEY, &permission).await,
        }
    }

    async fn read_records(&self) -> Result<Vec<Value>> {
        Ok(self.read_json(HABITS_KEY).await?.unwrap_or_default())
    }

    /// Malformed values are treated the same as missing ones.
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.store.get(key).await? else {
            debug!("No value stored for {key}");
            return Ok(None);
        };
        match serde_json::from_str::<T>(&raw) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                warn!("Value stored for {key} is not valid, ignoring it: {e}");
                Ok(None)
            }
        }
    }

    async fn write_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.store.set(key, serde_json::to_string(value)?).await
    }
}
