//! SQLite-backed implementation of the core repository trait.

use async_trait::async_trait;
use hygrobot_core::{Error, Repository, Result};
use hygrobot_store::Store;
use hygrobot_types::{AlertState, Reading, Recipient, RecipientId};
use tokio::sync::Mutex;

/// Repository adapter over a [`Store`].
///
/// Store calls are short synchronous SQLite statements, so they run under a
/// single async mutex rather than a blocking pool.
pub struct SqliteRepository {
    store: Mutex<Store>,
}

impl SqliteRepository {
    pub fn new(store: Store) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn get_recipient(&self, id: RecipientId) -> Result<Option<Recipient>> {
        self.store
            .lock()
            .await
            .get_recipient(id)
            .map_err(Error::storage)
    }

    async fn create_recipient(&self, recipient: &Recipient) -> Result<()> {
        self.store
            .lock()
            .await
            .create_recipient(recipient)
            .map_err(Error::storage)
    }

    async fn update_recipient(&self, recipient: &Recipient) -> Result<()> {
        self.store
            .lock()
            .await
            .update_recipient(recipient)
            .map_err(Error::storage)
    }

    async fn delete_recipient(&self, id: RecipientId) -> Result<()> {
        self.store
            .lock()
            .await
            .delete_recipient(id)
            .map_err(Error::storage)
    }

    async fn list_recipients(&self) -> Result<Vec<Recipient>> {
        self.store
            .lock()
            .await
            .list_recipients()
            .map_err(Error::storage)
    }

    async fn get_alert_state(&self, id: RecipientId) -> Result<Option<AlertState>> {
        self.store
            .lock()
            .await
            .get_alert_state(id)
            .map_err(Error::storage)
    }

    async fn set_alert_state(&self, state: &AlertState) -> Result<()> {
        self.store
            .lock()
            .await
            .set_alert_state(state)
            .map_err(Error::storage)
    }

    async fn insert_reading(&self, reading: &Reading) -> Result<()> {
        self.store
            .lock()
            .await
            .insert_reading(reading)
            .map_err(Error::storage)
    }

    async fn latest_stored_reading(&self) -> Result<Option<Reading>> {
        self.store
            .lock()
            .await
            .latest_reading()
            .map_err(Error::storage)
    }

    async fn recent_readings(&self, minutes: u32, limit: u32) -> Result<Vec<Reading>> {
        self.store
            .lock()
            .await
            .recent_readings(minutes, limit)
            .map_err(Error::storage)
    }

    async fn purge_readings_older_than(&self, days: u32) -> Result<u64> {
        self.store
            .lock()
            .await
            .purge_readings_older_than(days)
            .map_err(Error::storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn repo() -> SqliteRepository {
        SqliteRepository::new(Store::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn recipient_round_trips_through_sqlite() {
        let repo = repo();
        let id = RecipientId::new(42).unwrap();
        let now = OffsetDateTime::now_utc();
        let recipient = Recipient::new(
            id,
            hygrobot_types::DEFAULT_HUMIDITY_MIN,
            hygrobot_types::DEFAULT_HUMIDITY_MAX,
            now,
            now,
        )
        .unwrap();

        repo.create_recipient(&recipient).await.unwrap();
        let loaded = repo.get_recipient(id).await.unwrap().unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.humidity_min, recipient.humidity_min);

        repo.delete_recipient(id).await.unwrap();
        assert!(repo.get_recipient(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn readings_flow_through_the_adapter() {
        let repo = repo();
        let reading = Reading::new(
            55.0,
            22.0,
            22.1,
            21.9,
            OffsetDateTime::now_utc() - time::Duration::seconds(30),
        )
        .unwrap();
        repo.insert_reading(&reading).await.unwrap();

        let latest = repo.latest_stored_reading().await.unwrap().unwrap();
        assert_eq!(latest.humidity, 55.0);
        assert_eq!(repo.recent_readings(60, 300).await.unwrap().len(), 1);
    }
}
