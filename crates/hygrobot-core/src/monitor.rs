//! Background monitoring loop.
//!
//! One task owns the telemetry cadence: read a frame, notice connectivity
//! edges, fan the reading out to every recipient, reconnect with backoff
//! when the link drops. The loop never exits on its own; only the
//! cancellation token stops it.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::alerts::AlertEngine;
use crate::error::Result;
use crate::link::LinkReader;
use crate::messenger::Messenger;
use crate::repository::Repository;

const RESTORED_MESSAGE: &str = "✅ Sensor connection restored!\n\nSensor monitoring resumed.";
const LOST_MESSAGE: &str = "⚠️ Sensor connection lost!\n\nAttempting to reconnect...";

/// Loop pacing knobs.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Pause between ticks; the sensor emits roughly once a second.
    pub tick: Duration,
    /// Pause after an unexpected tick error before trying again.
    pub error_pause: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            error_pause: Duration::from_secs(5),
        }
    }
}

/// Drives the sensor link and the alert engine.
pub struct Monitor {
    reader: Arc<LinkReader>,
    engine: AlertEngine,
    repo: Arc<dyn Repository>,
    messenger: Arc<dyn Messenger>,
    config: MonitorConfig,
}

impl Monitor {
    pub fn new(
        reader: Arc<LinkReader>,
        engine: AlertEngine,
        repo: Arc<dyn Repository>,
        messenger: Arc<dyn Messenger>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            reader,
            engine,
            repo,
            messenger,
            config,
        }
    }

    /// Run until cancelled, then disconnect the link.
    pub async fn run(&self, cancel: CancellationToken) {
        info!("starting monitoring loop");
        let mut was_connected = self.reader.is_connected().await;

        loop {
            let pause = match self.tick(&mut was_connected).await {
                Ok(pause) => pause,
                Err(err) => {
                    error!(error = %err, "error in monitoring loop");
                    self.config.error_pause
                }
            };

            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(pause) => {}
            }
        }

        info!("monitoring loop cancelled");
        self.reader.disconnect().await;
    }

    /// One cadence step. Returns how long to pause before the next one.
    async fn tick(&self, was_connected: &mut bool) -> Result<Duration> {
        let reading = self.reader.read_sensor_data().await;
        let is_connected = self.reader.is_connected().await;

        if is_connected && !*was_connected {
            info!("sensor connection restored");
            self.notify_all(RESTORED_MESSAGE).await?;
            *was_connected = true;
        } else if !is_connected && *was_connected {
            warn!("sensor connection lost");
            self.notify_all(LOST_MESSAGE).await?;
            *was_connected = false;
        }

        if let Some(reading) = reading {
            self.repo.insert_reading(&reading).await?;
            for recipient in self.repo.list_recipients().await? {
                if let Err(err) = self.engine.process_reading(&reading, recipient.id).await {
                    error!(
                        recipient = %recipient.id,
                        error = %err,
                        "failed to process reading for recipient"
                    );
                }
            }
            return Ok(self.config.tick);
        }

        if !is_connected {
            debug!("attempting to reconnect to sensor");
            if self.reader.connect().await {
                if !*was_connected {
                    info!("sensor reconnected");
                    self.notify_all(RESTORED_MESSAGE).await?;
                    *was_connected = true;
                }
            } else {
                return Ok(self.reader.backoff_delay().await);
            }
        }

        Ok(self.config.tick)
    }

    /// Broadcast a connectivity notice to every recipient; one failed send
    /// never blocks the rest.
    async fn notify_all(&self, message: &str) -> Result<()> {
        for recipient in self.repo.list_recipients().await? {
            if let Err(err) = self.messenger.send(recipient.id, message).await {
                error!(recipient = %recipient.id, error = %err, "failed to notify recipient");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::DEFAULT_COOLDOWN;
    use crate::link::{LinkConfig, MockTransport};
    use crate::messenger::MockMessenger;
    use crate::repository::MemoryRepository;
    use hygrobot_types::{AlertState, Recipient, RecipientId};
    use time::OffsetDateTime;

    const HIGH_FRAME: &str =
        r#"{"humidity":72.5,"dht_temp":24.0,"lm35_temp":23.5,"therm_temp":24.2}"#;

    struct Rig {
        transport: Arc<MockTransport>,
        repo: Arc<MemoryRepository>,
        messenger: Arc<MockMessenger>,
        reader: Arc<LinkReader>,
    }

    async fn rig() -> Rig {
        let transport = Arc::new(MockTransport::new());
        let repo = Arc::new(MemoryRepository::new());
        let messenger = Arc::new(MockMessenger::new());
        let reader = Arc::new(LinkReader::new(transport.clone(), LinkConfig::default()));

        let now = OffsetDateTime::now_utc();
        let id = RecipientId::new(1).unwrap();
        let recipient = Recipient::new(id, 40.0, 60.0, now, now).unwrap();
        repo.create_recipient(&recipient).await.unwrap();
        repo.set_alert_state(&AlertState::new(id)).await.unwrap();

        Rig {
            transport,
            repo,
            messenger,
            reader,
        }
    }

    fn monitor(rig: &Rig) -> Monitor {
        let engine = AlertEngine::with_cooldown(
            rig.repo.clone(),
            rig.messenger.clone(),
            DEFAULT_COOLDOWN,
        );
        Monitor::new(
            rig.reader.clone(),
            engine,
            rig.repo.clone(),
            rig.messenger.clone(),
            MonitorConfig::default(),
        )
    }

    async fn wait_for_sends(messenger: &MockMessenger, count: usize) {
        for _ in 0..1000 {
            if messenger.sent_count().await >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        panic!("expected {count} sends, got {}", messenger.sent_count().await);
    }

    #[tokio::test(start_paused = true)]
    async fn reading_is_stored_and_fanned_out() {
        let rig = rig().await;
        rig.transport.push_line(HIGH_FRAME).await;
        assert!(rig.reader.connect().await);

        let cancel = CancellationToken::new();
        let monitor = monitor(&rig);
        let guard = cancel.clone();
        let handle = tokio::spawn(async move { monitor.run(guard).await });

        wait_for_sends(&rig.messenger, 1).await;
        cancel.cancel();
        handle.await.unwrap();

        assert!(rig.repo.latest_stored_reading().await.unwrap().is_some());
        let sent = rig.messenger.sent().await;
        assert!(sent[0].1.contains("HIGH HUMIDITY ALERT"));
        // The loop disconnected cleanly on cancel.
        assert!(!rig.reader.is_connected().await);
    }

    #[tokio::test(start_paused = true)]
    async fn lost_connection_is_broadcast_and_recovered() {
        let rig = rig().await;
        rig.transport.push_fault().await;
        assert!(rig.reader.connect().await);

        let cancel = CancellationToken::new();
        let monitor = monitor(&rig);
        let guard = cancel.clone();
        let handle = tokio::spawn(async move { monitor.run(guard).await });

        // Fault triggers the lost notice, the next tick reconnects.
        wait_for_sends(&rig.messenger, 2).await;
        cancel.cancel();
        handle.await.unwrap();

        let sent = rig.messenger.sent().await;
        assert!(sent[0].1.contains("connection lost"));
        assert!(sent[1].1.contains("connection restored"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_reconnect_backs_off_then_recovers() {
        let rig = rig().await;
        rig.transport.fail_connects(3);

        let cancel = CancellationToken::new();
        let monitor = monitor(&rig);
        let guard = cancel.clone();
        let handle = tokio::spawn(async move { monitor.run(guard).await });

        // Starts disconnected, so the only send is the restored notice.
        wait_for_sends(&rig.messenger, 1).await;
        cancel.cancel();
        handle.await.unwrap();

        let sent = rig.messenger.sent().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("connection restored"));
        assert_eq!(rig.transport.open_count(), 1);
    }
}
