use std::{sync::Arc, time::Duration};

use shared::domain::Severity;
use tokio::time::Instant;

use super::*;
use crate::test_support::{FakeBackend, RecordingNavigator, RecordingNotifier};

type Harness = (
    Arc<LivenessMonitor>,
    Arc<FakeBackend>,
    Arc<RecordingNotifier>,
    Arc<RecordingNavigator>,
);

fn monitor_with(interval: Duration) -> Harness {
    let backend = Arc::new(FakeBackend::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let navigator = Arc::new(RecordingNavigator::default());
    let monitor = LivenessMonitor::new(
        backend.clone(),
        notifier.clone(),
        navigator.clone(),
        "/auth/login",
    )
    .with_timing(interval, Duration::from_secs(2));
    (Arc::new(monitor), backend, notifier, navigator)
}

fn monitor() -> Harness {
    monitor_with(Duration::from_secs(5 * 60))
}

#[tokio::test(start_paused = true)]
async fn valid_session_does_nothing() {
    let (monitor, backend, notifier, navigator) = monitor();

    assert_eq!(monitor.check_once().await, LivenessStatus::Alive);
    assert_eq!(backend.auth_checks(), 1);
    assert!(notifier.entries().is_empty());
    assert!(navigator.targets().is_empty());
}

#[tokio::test(start_paused = true)]
async fn expired_session_warns_then_redirects_after_delay() {
    let (monitor, backend, notifier, navigator) = monitor();
    backend.expire_session();

    let started = Instant::now();
    let check = tokio::spawn({
        let monitor = Arc::clone(&monitor);
        async move { monitor.check_once().await }
    });

    tokio::time::sleep(Duration::from_millis(1999)).await;
    assert_eq!(
        notifier.entries(),
        vec![(SESSION_EXPIRED.to_string(), Severity::Warning)]
    );
    assert!(navigator.targets().is_empty());

    assert_eq!(check.await.expect("check task"), LivenessStatus::Expired);
    assert_eq!(navigator.targets(), vec!["/auth/login".to_string()]);
    let redirected = navigator.navigated_at()[0];
    let waited = redirected - started;
    assert!(waited >= Duration::from_secs(2));
    assert!(waited < Duration::from_millis(2010));
}

#[tokio::test(start_paused = true)]
async fn polling_stops_once_the_session_expires() {
    let (monitor, backend, _, navigator) = monitor_with(Duration::from_secs(60));

    let task = monitor.spawn();

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(backend.auth_checks(), 0);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(backend.auth_checks(), 1);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(backend.auth_checks(), 2);

    backend.expire_session();
    task.await.expect("poll task");

    assert_eq!(backend.auth_checks(), 3);
    assert_eq!(navigator.targets(), vec!["/auth/login".to_string()]);
}
