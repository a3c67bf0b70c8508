//! The submit pipeline shared by every controller: gate, optimistic render,
//! one request, remote render or error toast, unconditional cleanup.

use std::{future::Future, sync::Arc};

use shared::domain::Severity;
use tracing::{debug, info, warn};

use crate::{
    error::ClientError,
    gate::{ActionGate, GatePass},
    notifier::Notifier,
    Affordance,
};

pub const ACTION_IN_PROGRESS: &str = "Please wait, the previous request is still in progress.";

/// Payloads that can be rejected as empty before anything else happens.
pub trait ActionPayload {
    fn is_blank(&self) -> bool;
}

impl ActionPayload for String {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

impl ActionPayload for &str {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

#[derive(Debug)]
pub enum SubmitOutcome {
    /// Blank payload; nothing was touched.
    Empty,
    /// Another action of the same controller is still in flight.
    Busy,
    Completed,
    Failed(ClientError),
}

impl SubmitOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }

    pub fn error(&self) -> Option<&ClientError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }
}

pub struct SessionActionController {
    name: &'static str,
    gate: ActionGate,
    notifier: Arc<dyn Notifier>,
    affordance: Arc<dyn Affordance>,
    failure_message: String,
}

impl SessionActionController {
    pub fn new(
        name: &'static str,
        notifier: Arc<dyn Notifier>,
        affordance: Arc<dyn Affordance>,
    ) -> Self {
        Self {
            name,
            gate: ActionGate::new(),
            notifier,
            affordance,
            failure_message: "Request failed. Please try again.".to_string(),
        }
    }

    pub fn with_failure_message(mut self, message: impl Into<String>) -> Self {
        self.failure_message = message.into();
        self
    }

    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Acquires the gate and disables the affordance. Both are restored when
    /// the returned scope is dropped, whichever way the caller exits.
    pub fn begin(&self) -> Option<BusyScope<'_>> {
        let Some(pass) = self.gate.try_enter() else {
            debug!(action = self.name, "action already in flight");
            self.notifier.notify(ACTION_IN_PROGRESS, Severity::Info);
            return None;
        };
        self.affordance.set_enabled(false);
        Some(BusyScope {
            affordance: self.affordance.as_ref(),
            _pass: pass,
        })
    }

    pub fn report_failure(&self, err: &ClientError) {
        warn!(action = self.name, kind = ?err.kind(), "action failed: {err}");
        self.notifier
            .notify(&err.user_message(&self.failure_message), Severity::Error);
    }

    pub async fn submit<P, T, Fut>(
        &self,
        payload: P,
        optimistic: impl FnOnce(&P),
        request: impl FnOnce(P) -> Fut,
        render: impl FnOnce(T),
    ) -> SubmitOutcome
    where
        P: ActionPayload,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        if payload.is_blank() {
            debug!(action = self.name, "ignoring blank submission");
            return SubmitOutcome::Empty;
        }

        let Some(scope) = self.begin() else {
            return SubmitOutcome::Busy;
        };

        optimistic(&payload);
        self.finish(scope, request(payload), render).await
    }

    /// Second half of [`submit`](Self::submit) for callers that had to take
    /// the gate with [`begin`](Self::begin) before building the payload.
    pub async fn finish<T, Fut>(
        &self,
        _scope: BusyScope<'_>,
        request: Fut,
        render: impl FnOnce(T),
    ) -> SubmitOutcome
    where
        Fut: Future<Output = Result<T, ClientError>>,
    {
        match request.await {
            Ok(response) => {
                render(response);
                info!(action = self.name, "action completed");
                SubmitOutcome::Completed
            }
            Err(err) => {
                self.report_failure(&err);
                SubmitOutcome::Failed(err)
            }
        }
    }
}

#[must_use = "the action is finished as soon as the scope is dropped"]
pub struct BusyScope<'a> {
    affordance: &'a dyn Affordance,
    _pass: GatePass<'a>,
}

impl Drop for BusyScope<'_> {
    fn drop(&mut self) {
        self.affordance.set_enabled(true);
    }
}

#[cfg(test)]
#[path = "tests/action_tests.rs"]
mod tests;
