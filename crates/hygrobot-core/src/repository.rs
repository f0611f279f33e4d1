//! Storage seam for recipients, alert states, and reading history.
//!
//! The alerting pipeline only ever sees this trait. The service wires in a
//! SQLite-backed implementation; tests and embedded use get
//! [`MemoryRepository`].

use std::collections::HashMap;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;

use hygrobot_types::{AlertState, Reading, Recipient, RecipientId};

use crate::error::Result;

/// Typed storage operations the pipeline needs.
///
/// Implementations return domain entities, never raw rows. Deleting a
/// recipient also removes its alert state.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn get_recipient(&self, id: RecipientId) -> Result<Option<Recipient>>;

    /// Insert a new recipient. The caller creates the matching alert state
    /// via [`Repository::set_alert_state`].
    async fn create_recipient(&self, recipient: &Recipient) -> Result<()>;

    /// Persist changed thresholds for an existing recipient.
    async fn update_recipient(&self, recipient: &Recipient) -> Result<()>;

    /// Remove a recipient and its alert state. Removing an unknown id is
    /// not an error.
    async fn delete_recipient(&self, id: RecipientId) -> Result<()>;

    async fn list_recipients(&self) -> Result<Vec<Recipient>>;

    async fn get_alert_state(&self, id: RecipientId) -> Result<Option<AlertState>>;

    /// Insert or replace the alert state for its recipient.
    async fn set_alert_state(&self, state: &AlertState) -> Result<()>;

    /// Append a reading to history.
    async fn insert_reading(&self, reading: &Reading) -> Result<()>;

    /// Most recently recorded reading, if any.
    async fn latest_stored_reading(&self) -> Result<Option<Reading>>;

    /// Readings recorded within the last `minutes`, newest first, capped at
    /// `limit`.
    async fn recent_readings(&self, minutes: u32, limit: u32) -> Result<Vec<Reading>>;

    /// Delete readings older than `days`; returns how many were removed.
    async fn purge_readings_older_than(&self, days: u32) -> Result<u64>;
}

/// In-memory [`Repository`] used by tests and embedded deployments.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    recipients: RwLock<HashMap<RecipientId, Recipient>>,
    alert_states: RwLock<HashMap<RecipientId, AlertState>>,
    readings: RwLock<Vec<Reading>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_recipient(&self, id: RecipientId) -> Result<Option<Recipient>> {
        Ok(self.recipients.read().await.get(&id).cloned())
    }

    async fn create_recipient(&self, recipient: &Recipient) -> Result<()> {
        self.recipients
            .write()
            .await
            .insert(recipient.id, recipient.clone());
        Ok(())
    }

    async fn update_recipient(&self, recipient: &Recipient) -> Result<()> {
        self.recipients
            .write()
            .await
            .insert(recipient.id, recipient.clone());
        Ok(())
    }

    async fn delete_recipient(&self, id: RecipientId) -> Result<()> {
        self.recipients.write().await.remove(&id);
        self.alert_states.write().await.remove(&id);
        Ok(())
    }

    async fn list_recipients(&self) -> Result<Vec<Recipient>> {
        let mut all: Vec<_> = self.recipients.read().await.values().cloned().collect();
        all.sort_by_key(|r| r.id);
        Ok(all)
    }

    async fn get_alert_state(&self, id: RecipientId) -> Result<Option<AlertState>> {
        Ok(self.alert_states.read().await.get(&id).cloned())
    }

    async fn set_alert_state(&self, state: &AlertState) -> Result<()> {
        self.alert_states
            .write()
            .await
            .insert(state.recipient_id, state.clone());
        Ok(())
    }

    async fn insert_reading(&self, reading: &Reading) -> Result<()> {
        self.readings.write().await.push(reading.clone());
        Ok(())
    }

    async fn latest_stored_reading(&self) -> Result<Option<Reading>> {
        Ok(self.readings.read().await.last().cloned())
    }

    async fn recent_readings(&self, minutes: u32, limit: u32) -> Result<Vec<Reading>> {
        let cutoff = OffsetDateTime::now_utc() - Duration::minutes(i64::from(minutes));
        let readings = self.readings.read().await;
        let recent = readings
            .iter()
            .rev()
            .filter(|r| r.timestamp >= cutoff)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok(recent)
    }

    async fn purge_readings_older_than(&self, days: u32) -> Result<u64> {
        let cutoff = OffsetDateTime::now_utc() - Duration::days(i64::from(days));
        let mut readings = self.readings.write().await;
        let before = readings.len();
        readings.retain(|r| r.timestamp >= cutoff);
        Ok((before - readings.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hygrobot_types::{DEFAULT_HUMIDITY_MAX, DEFAULT_HUMIDITY_MIN};

    fn recipient(raw: i64) -> Recipient {
        let now = OffsetDateTime::now_utc();
        Recipient::new(
            RecipientId::new(raw).unwrap(),
            DEFAULT_HUMIDITY_MIN,
            DEFAULT_HUMIDITY_MAX,
            now,
            now,
        )
        .unwrap()
    }

    fn reading_at(timestamp: OffsetDateTime) -> Reading {
        Reading::new(50.0, 22.0, 22.0, 22.0, timestamp).unwrap()
    }

    #[tokio::test]
    async fn delete_removes_alert_state_too() {
        let repo = MemoryRepository::new();
        let user = recipient(1);
        repo.create_recipient(&user).await.unwrap();
        repo.set_alert_state(&AlertState::new(user.id)).await.unwrap();

        repo.delete_recipient(user.id).await.unwrap();
        assert!(repo.get_recipient(user.id).await.unwrap().is_none());
        assert!(repo.get_alert_state(user.id).await.unwrap().is_none());

        // Deleting again is a no-op.
        repo.delete_recipient(user.id).await.unwrap();
    }

    #[tokio::test]
    async fn recent_readings_are_newest_first_and_windowed() {
        let repo = MemoryRepository::new();
        let now = OffsetDateTime::now_utc();
        for minutes_ago in [90, 30, 10, 1] {
            repo.insert_reading(&reading_at(now - Duration::minutes(minutes_ago)))
                .await
                .unwrap();
        }

        let recent = repo.recent_readings(60, 10).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert!(recent.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));

        let capped = repo.recent_readings(60, 2).await.unwrap();
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[0].timestamp, now - Duration::minutes(1));
    }

    #[tokio::test]
    async fn purge_reports_deleted_count() {
        let repo = MemoryRepository::new();
        let now = OffsetDateTime::now_utc();
        repo.insert_reading(&reading_at(now - Duration::days(10))).await.unwrap();
        repo.insert_reading(&reading_at(now - Duration::days(3))).await.unwrap();
        repo.insert_reading(&reading_at(now)).await.unwrap();

        assert_eq!(repo.purge_readings_older_than(7).await.unwrap(), 1);
        assert_eq!(repo.purge_readings_older_than(7).await.unwrap(), 0);
        assert_eq!(repo.recent_readings(60, 10).await.unwrap().len(), 1);
    }
}
