//! Integration tests for hygrobot-core
//!
//! Exercises the full alerting pipeline against in-memory doubles: telemetry
//! frames go in through a mock link, alerts come out through a mock
//! messenger, with the real parser, threshold logic, cooldown handling, and
//! repository in between.

use std::sync::Arc;

use time::{Duration, OffsetDateTime};

use hygrobot_core::alerts::{AlertEngine, AlertKind, DEFAULT_COOLDOWN};
use hygrobot_core::link::{LinkConfig, LinkReader, MockTransport};
use hygrobot_core::messenger::{MockFailure, MockMessenger};
use hygrobot_core::parse_frame;
use hygrobot_core::repository::{MemoryRepository, Repository};
use hygrobot_types::{AlertState, AlertType, HumidityState, Reading, Recipient, RecipientId};

fn id(raw: i64) -> RecipientId {
    RecipientId::new(raw).unwrap()
}

fn reading(humidity: f64) -> Reading {
    Reading::new(humidity, 23.4, 24.93, 22.73, OffsetDateTime::now_utc()).unwrap()
}

async fn register(repo: &MemoryRepository, raw_id: i64, min: f64, max: f64) {
    let now = OffsetDateTime::now_utc();
    let recipient = Recipient::new(id(raw_id), min, max, now, now).unwrap();
    repo.create_recipient(&recipient).await.unwrap();
    repo.set_alert_state(&AlertState::new(id(raw_id))).await.unwrap();
}

#[tokio::test]
async fn alert_cooldown_recovery_cycle() {
    let repo = Arc::new(MemoryRepository::new());
    let messenger = Arc::new(MockMessenger::new());
    register(&repo, 1, 40.0, 60.0).await;
    let engine = AlertEngine::new(repo.clone(), messenger.clone());

    // Out of range: alert goes out and state flips to high.
    let kind = engine.process_reading(&reading(72.5), id(1)).await.unwrap();
    assert_eq!(kind, Some(AlertKind::High));
    let state = repo.get_alert_state(id(1)).await.unwrap().unwrap();
    assert_eq!(state.current_state, HumidityState::HighHumidity);
    assert_eq!(state.last_alert_type, Some(AlertType::High));

    // Still high within the cooldown: suppressed.
    let kind = engine.process_reading(&reading(75.0), id(1)).await.unwrap();
    assert_eq!(kind, None);
    assert_eq!(messenger.sent_count().await, 1);

    // Backdate the last alert past the cooldown: the repeat goes out.
    let mut stale = repo.get_alert_state(id(1)).await.unwrap().unwrap();
    stale.last_alert_time =
        Some(OffsetDateTime::now_utc() - DEFAULT_COOLDOWN - Duration::seconds(1));
    repo.set_alert_state(&stale).await.unwrap();
    let kind = engine.process_reading(&reading(75.0), id(1)).await.unwrap();
    assert_eq!(kind, Some(AlertKind::High));

    // Back in range: recovery notification and a clean state.
    let kind = engine.process_reading(&reading(52.0), id(1)).await.unwrap();
    assert_eq!(kind, Some(AlertKind::Recovery));
    let state = repo.get_alert_state(id(1)).await.unwrap().unwrap();
    assert_eq!(state.current_state, HumidityState::Normal);
    assert!(state.last_alert_time.is_none());
    assert!(state.last_alert_type.is_none());

    // Staying normal stays quiet.
    let kind = engine.process_reading(&reading(50.0), id(1)).await.unwrap();
    assert_eq!(kind, None);
    assert_eq!(messenger.sent_count().await, 3);
}

#[tokio::test]
async fn recipients_judge_the_same_reading_independently() {
    let repo = Arc::new(MemoryRepository::new());
    let messenger = Arc::new(MockMessenger::new());
    register(&repo, 1, 40.0, 60.0).await;
    register(&repo, 2, 30.0, 80.0).await;
    let engine = AlertEngine::new(repo.clone(), messenger.clone());

    let sample = reading(72.5);
    assert_eq!(
        engine.process_reading(&sample, id(1)).await.unwrap(),
        Some(AlertKind::High)
    );
    assert_eq!(engine.process_reading(&sample, id(2)).await.unwrap(), None);

    let wide = repo.get_alert_state(id(2)).await.unwrap().unwrap();
    assert_eq!(wide.current_state, HumidityState::Normal);
    assert_eq!(messenger.sent_count().await, 1);
}

#[tokio::test]
async fn blocked_recipient_is_removed_without_a_second_send() {
    let repo = Arc::new(MemoryRepository::new());
    let messenger = Arc::new(MockMessenger::new());
    register(&repo, 1, 40.0, 60.0).await;
    let engine = AlertEngine::new(repo.clone(), messenger.clone());
    messenger.push_failure(MockFailure::Forbidden).await;

    assert_eq!(engine.process_reading(&reading(72.5), id(1)).await.unwrap(), None);
    assert!(repo.get_recipient(id(1)).await.unwrap().is_none());
    assert!(repo.get_alert_state(id(1)).await.unwrap().is_none());

    assert_eq!(engine.process_reading(&reading(80.0), id(1)).await.unwrap(), None);
    assert_eq!(messenger.sent_count().await, 0);
}

#[tokio::test]
async fn frames_from_the_wire_drive_alerts() {
    let repo = Arc::new(MemoryRepository::new());
    let messenger = Arc::new(MockMessenger::new());
    register(&repo, 1, 40.0, 60.0).await;
    let engine = AlertEngine::new(repo.clone(), messenger.clone());

    let transport = Arc::new(MockTransport::new());
    transport
        .push_line(r#"{"humidity":"72.5","dht_temp":24.0,"lm35_temp":23.5,"therm_temp":24.2}"#)
        .await;
    let reader = LinkReader::new(transport, LinkConfig::default());
    assert!(reader.connect().await);

    let wire_reading = reader.read_sensor_data().await.unwrap();
    let kind = engine.process_reading(&wire_reading, id(1)).await.unwrap();
    assert_eq!(kind, Some(AlertKind::High));
    assert!(messenger.sent().await[0].1.contains("72.50%"));
}

#[test]
fn parser_round_trips_the_reference_frame() {
    let frame = r#"{"humidity":56.00,"dht_temperature":23.40,"lm35_temperature":24.93,"thermistor_temperature":22.73}"#;
    let reading = parse_frame(frame).unwrap();
    assert_eq!(reading.humidity, 56.0);
    assert_eq!(reading.dht_temperature, 23.4);
    assert_eq!(reading.lm35_temperature, 24.93);
    assert_eq!(reading.thermistor_temperature, 22.73);
}
