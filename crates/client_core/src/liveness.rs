//! Periodic check that the login session is still valid.

use std::{sync::Arc, time::Duration};

use shared::domain::Severity;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::{error::ClientError, notifier::Notifier, transport::Backend, Navigator};

pub const SESSION_EXPIRED: &str = "Session expired. Please log in again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessStatus {
    Alive,
    Expired,
    /// The check itself failed; nothing is concluded from it.
    Unknown,
}

pub struct LivenessMonitor {
    backend: Arc<dyn Backend>,
    notifier: Arc<dyn Notifier>,
    navigator: Arc<dyn Navigator>,
    login_path: String,
    interval: Duration,
    redirect_delay: Duration,
}

impl LivenessMonitor {
    pub fn new(
        backend: Arc<dyn Backend>,
        notifier: Arc<dyn Notifier>,
        navigator: Arc<dyn Navigator>,
        login_path: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            notifier,
            navigator,
            login_path: login_path.into(),
            interval: Duration::from_secs(5 * 60),
            redirect_delay: Duration::from_secs(2),
        }
    }

    pub fn with_timing(mut self, interval: Duration, redirect_delay: Duration) -> Self {
        self.interval = interval;
        self.redirect_delay = redirect_delay;
        self
    }

    /// On expiry the user is warned first and sent to the login page once
    /// the redirect delay has passed.
    pub async fn check_once(&self) -> LivenessStatus {
        match self.backend.auth_status().await {
            Ok(()) => LivenessStatus::Alive,
            Err(ClientError::Unauthorized) => {
                warn!(login = %self.login_path, "session expired; redirecting to login");
                self.notifier.notify(SESSION_EXPIRED, Severity::Warning);
                tokio::time::sleep(self.redirect_delay).await;
                self.navigator.navigate(&self.login_path);
                LivenessStatus::Expired
            }
            Err(err) => {
                debug!("auth status check failed: {err}");
                LivenessStatus::Unknown
            }
        }
    }

    /// Polls every interval until the session expires.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval_at(
                tokio::time::Instant::now() + self.interval,
                self.interval,
            );
            loop {
                ticks.tick().await;
                if self.check_once().await == LivenessStatus::Expired {
                    break;
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "tests/liveness_tests.rs"]
mod tests;
