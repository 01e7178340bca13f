use chrono::DateTime;
use staffpass_core::{ManualClock, ScanHook, Subject, TokenIssuer, TokenRotation};
use std::sync::Arc;
use std::time::Duration;

const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";

fn rotation() -> TokenRotation {
    let clock = Arc::new(ManualClock::new(
        DateTime::parse_from_rfc3339("2026-10-12T08:00:00-03:00").unwrap(),
    ));
    let issuer = Arc::new(TokenIssuer::new(KEY, Duration::from_secs(90), clock).unwrap());
    TokenRotation::start(issuer, "s-1", Duration::from_secs(60))
}

fn subject(id: &str) -> Subject {
    Subject {
        id: id.to_string(),
        display_name: "Ana Souza".to_string(),
        matricula: "M-001".to_string(),
        unit_id: "unit-a".to_string(),
    }
}

fn current_text(rotation: &TokenRotation) -> String {
    rotation.current().unwrap().text
}

#[tokio::test(start_paused = true)]
async fn code_is_reissued_every_interval() {
    let rotation = rotation();
    let mut issued = rotation.subscribe();

    issued.changed().await.unwrap();
    let first = current_text(&rotation);

    tokio::time::advance(Duration::from_secs(59)).await;
    tokio::task::yield_now().await;
    assert!(!issued.has_changed().unwrap());
    assert_eq!(current_text(&rotation), first);

    tokio::time::advance(Duration::from_secs(1)).await;
    issued.changed().await.unwrap();
    assert_ne!(current_text(&rotation), first);
}

#[tokio::test(start_paused = true)]
async fn refresh_reissues_immediately_and_stop_ends_rotation() {
    let rotation = rotation();
    let mut issued = rotation.subscribe();
    issued.changed().await.unwrap();
    let first = current_text(&rotation);

    rotation.refresh_now();
    issued.changed().await.unwrap();
    let refreshed = current_text(&rotation);
    assert_ne!(refreshed, first);

    rotation.stop();
    assert!(issued.changed().await.is_err());
    assert_eq!(current_text(&rotation), refreshed);
}

#[tokio::test(start_paused = true)]
async fn recorded_scan_refreshes_only_the_owner_code() {
    let rotation = rotation();
    let mut issued = rotation.subscribe();
    issued.changed().await.unwrap();
    let first = current_text(&rotation);

    rotation.on_recorded(&subject("s-2")).await;
    tokio::task::yield_now().await;
    assert!(!issued.has_changed().unwrap());

    rotation.on_recorded(&subject("s-1")).await;
    issued.changed().await.unwrap();
    assert_ne!(current_text(&rotation), first);
}
