//! Transient status messages ("toasts").

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{DateTime, Utc};
use shared::domain::Severity;
use tracing::{debug, error, info, warn};

/// Renders a transient status message. Implementations must never fail
/// outward: a notification that cannot be shown is logged and dropped.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str, severity: Severity);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: u64,
    pub message: String,
    pub severity: Severity,
    pub raised_at: DateTime<Utc>,
}

#[derive(Default)]
struct ToastBoard {
    next_id: u64,
    toasts: Vec<Toast>,
}

/// Keeps the currently visible toasts and dismisses each one after the
/// display duration, or earlier through [`ToastNotifier::dismiss`].
#[derive(Clone)]
pub struct ToastNotifier {
    board: Arc<Mutex<ToastBoard>>,
    display: Duration,
}

impl ToastNotifier {
    pub fn new(display: Duration) -> Self {
        Self {
            board: Arc::new(Mutex::new(ToastBoard::default())),
            display,
        }
    }

    pub fn visible(&self) -> Vec<Toast> {
        match self.board.lock() {
            Ok(board) => board.toasts.clone(),
            Err(_) => Vec::new(),
        }
    }

    pub fn dismiss(&self, id: u64) -> bool {
        dismiss_from(&self.board, id)
    }

    fn push(&self, message: &str, severity: Severity) -> Option<u64> {
        let mut board = self.board.lock().ok()?;
        board.next_id += 1;
        let id = board.next_id;
        board.toasts.push(Toast {
            id,
            message: message.to_string(),
            severity,
            raised_at: Utc::now(),
        });
        Some(id)
    }
}

fn dismiss_from(board: &Mutex<ToastBoard>, id: u64) -> bool {
    let Ok(mut board) = board.lock() else {
        return false;
    };
    let before = board.toasts.len();
    board.toasts.retain(|toast| toast.id != id);
    board.toasts.len() != before
}

impl Notifier for ToastNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        let Some(id) = self.push(message, severity) else {
            warn!(?severity, "toast board unavailable; dropping notification: {message}");
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let board = Arc::clone(&self.board);
                let display = self.display;
                handle.spawn(async move {
                    tokio::time::sleep(display).await;
                    if dismiss_from(&board, id) {
                        debug!(toast = id, "toast auto-dismissed");
                    }
                });
            }
            Err(_) => warn!(toast = id, "no runtime for auto-dismiss; toast stays until dismissed"),
        }
    }
}

/// Writes notifications to the log; used by headless front ends.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Info | Severity::Success => info!(?severity, "{message}"),
            Severity::Warning => warn!(?severity, "{message}"),
            Severity::Error => error!(?severity, "{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn toast_is_dismissed_after_display_duration() {
        let notifier = ToastNotifier::new(Duration::from_secs(5));
        notifier.notify("Saved", Severity::Success);
        assert_eq!(notifier.visible().len(), 1);

        tokio::time::sleep(Duration::from_millis(4900)).await;
        assert_eq!(notifier.visible().len(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(notifier.visible().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_dismiss_removes_only_that_toast() {
        let notifier = ToastNotifier::new(Duration::from_secs(5));
        notifier.notify("first", Severity::Info);
        notifier.notify("second", Severity::Error);
        let first = notifier.visible()[0].id;

        assert!(notifier.dismiss(first));
        assert!(!notifier.dismiss(first));
        let visible = notifier.visible();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].message, "second");
        assert_eq!(visible[0].severity, Severity::Error);
    }

    #[test]
    fn tracing_notifier_accepts_every_severity() {
        for severity in [
            Severity::Info,
            Severity::Success,
            Severity::Warning,
            Severity::Error,
        ] {
            TracingNotifier.notify("logged", severity);
        }
    }

    #[test]
    fn toast_outside_runtime_is_kept_until_dismissed() {
        let notifier = ToastNotifier::new(Duration::from_millis(1));
        notifier.notify("offline", Severity::Warning);
        let visible = notifier.visible();
        assert_eq!(visible.len(), 1);
        assert!(notifier.dismiss(visible[0].id));
    }
}
