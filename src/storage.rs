use crate::identity::UserId;
use crate::models::UserRecord;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("record store serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Remote per-user document store.
///
/// `set` overwrites the whole record. Subscribers see every successful
/// write for their id; the receiver's initial value is the record at
/// subscription time and counts as already seen.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get(&self, id: &UserId) -> Result<Option<UserRecord>, StoreError>;

    async fn set(&self, id: &UserId, record: &UserRecord) -> Result<(), StoreError>;

    async fn subscribe(&self, id: &UserId) -> watch::Receiver<Option<UserRecord>>;
}

/// Every record in one JSON file, rewritten on each write.
pub struct JsonRecordStore {
    path: PathBuf,
    records: Mutex<BTreeMap<String, UserRecord>>,
    watchers: Mutex<HashMap<String, watch::Sender<Option<UserRecord>>>>,
}

impl JsonRecordStore {
    pub async fn open(path: PathBuf) -> Self {
        let records = load_records(&path).await;
        Self {
            path,
            records: Mutex::new(records),
            watchers: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RecordStore for JsonRecordStore {
    async fn get(&self, id: &UserId) -> Result<Option<UserRecord>, StoreError> {
        let records = self.records.lock().await;
        Ok(records.get(id.as_str()).cloned())
    }

    async fn set(&self, id: &UserId, record: &UserRecord) -> Result<(), StoreError> {
        {
            let mut records = self.records.lock().await;
            let mut next = records.clone();
            next.insert(id.as_str().to_owned(), record.clone());
            persist_records(&self.path, &next).await?;
            *records = next;
        }
        debug!(uid = %id, days = record.completed_days.len(), "record written");

        let watchers = self.watchers.lock().await;
        if let Some(sender) = watchers.get(id.as_str()) {
            sender.send_replace(Some(record.clone()));
        }
        Ok(())
    }

    async fn subscribe(&self, id: &UserId) -> watch::Receiver<Option<UserRecord>> {
        let current = self.records.lock().await.get(id.as_str()).cloned();
        let mut watchers = self.watchers.lock().await;
        watchers.retain(|_, sender| sender.receiver_count() > 0);
        watchers
            .entry(id.as_str().to_owned())
            .or_insert_with(|| watch::channel(current).0)
            .subscribe()
    }
}

pub async fn load_records(path: &Path) -> BTreeMap<String, UserRecord> {
    match fs::read(path).await {
        Ok(bytes) => match serde_json::from_slice(&bytes) {
            Ok(records) => records,
            Err(err) => {
                error!("failed to parse records file: {err}");
                BTreeMap::new()
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
        Err(err) => {
            error!("failed to read records file: {err}");
            BTreeMap::new()
        }
    }
}

pub async fn persist_records(path: &Path, records: &BTreeMap<String, UserRecord>) -> Result<(), StoreError> {
    let payload = serde_json::to_vec_pretty(records)?;
    fs::write(path, payload).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::PlanDay;

    fn temp_path(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!("daily_reader_{name}_{}_{nanos}.json", std::process::id()))
    }

    fn record(days: &[i64]) -> UserRecord {
        UserRecord {
            completed_days: days.iter().filter_map(|day| PlanDay::new(*day)).collect(),
            start_date: None,
        }
    }

    #[tokio::test]
    async fn missing_record_is_absent() {
        let store = JsonRecordStore::open(temp_path("absent")).await;
        let uid = UserId::new("nobody");
        assert_eq!(store.get(&uid).await.unwrap(), None);
    }

    #[tokio::test]
    async fn writes_survive_reopen() {
        let path = temp_path("reopen");
        let uid = UserId::new("reader");
        {
            let store = JsonRecordStore::open(path.clone()).await;
            store.set(&uid, &record(&[1, 2])).await.unwrap();
            store.set(&uid, &record(&[7])).await.unwrap();
        }

        let store = JsonRecordStore::open(path.clone()).await;
        assert_eq!(store.get(&uid).await.unwrap(), Some(record(&[7])));
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn subscribers_see_later_writes() {
        let path = temp_path("subscribe");
        let store = JsonRecordStore::open(path.clone()).await;
        let uid = UserId::new("reader");
        store.set(&uid, &record(&[1])).await.unwrap();

        let mut rx = store.subscribe(&uid).await;
        assert_eq!(*rx.borrow(), Some(record(&[1])));

        store.set(&uid, &record(&[1, 2])).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Some(record(&[1, 2])));

        let other = UserId::new("someone-else");
        store.set(&other, &record(&[3])).await.unwrap();
        assert!(!rx.has_changed().unwrap());
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn dropped_subscriptions_are_released() {
        let path = temp_path("released");
        let store = JsonRecordStore::open(path.clone()).await;
        let first = UserId::new("first");
        let second = UserId::new("second");

        let rx = store.subscribe(&first).await;
        drop(rx);
        let mut rx = store.subscribe(&second).await;
        assert_eq!(store.watchers.lock().await.len(), 1);

        store.set(&first, &record(&[1])).await.unwrap();
        let mut again = store.subscribe(&first).await;
        assert_eq!(*again.borrow_and_update(), Some(record(&[1])));
        assert_eq!(store.watchers.lock().await.len(), 2);

        store.set(&second, &record(&[2])).await.unwrap();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), Some(record(&[2])));
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn failed_write_leaves_records_untouched() {
        let dir = temp_path("not_a_dir");
        let store = JsonRecordStore::open(dir.join("nested").join("records.json")).await;
        let uid = UserId::new("reader");
        assert!(store.set(&uid, &record(&[1])).await.is_err());
        assert_eq!(store.get(&uid).await.unwrap(), None);
    }
}
