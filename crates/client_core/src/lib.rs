//! Client-side controllers for the sheetchat web front end.
//!
//! Every browser capability (render targets, buttons, navigation, the
//! microphone, the card tokenizer) is an injected trait object, and every
//! backend call goes through [`transport::Backend`].

use shared::domain::SessionId;

pub mod action;
pub mod audio;
pub mod chat;
pub mod config;
pub mod error;
pub mod gate;
pub mod liveness;
pub mod locale;
pub mod notifier;
pub mod payment;
pub mod table;
pub mod transport;
pub mod upload;

pub use action::{ActionPayload, SessionActionController, SubmitOutcome};
pub use audio::{AudioCapture, AudioChunk, AudioPayload, CaptureDevice, CaptureEvent, CaptureState};
pub use chat::{ChatController, Message, TranscriptView};
pub use config::{load_settings, ClientSettings};
pub use error::{ClientError, ClientResult, ErrorKind, ValidationError};
pub use gate::ActionGate;
pub use liveness::{LivenessMonitor, LivenessStatus};
pub use locale::LocaleSwitcher;
pub use notifier::{Notifier, ToastNotifier, TracingNotifier};
pub use payment::{PaymentFormController, PaymentOutcome, PaymentView, Tokenizer};
pub use table::{PagedTableController, Pagination, TableView};
pub use transport::{Backend, HttpBackend};
pub use upload::{DragEvent, DropZone, FileSelection};

/// Values the hosting page provides once, at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContext {
    pub session_id: Option<SessionId>,
    pub csrf_token: String,
    pub language: String,
}

impl PageContext {
    pub fn new(csrf_token: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            session_id: None,
            csrf_token: csrf_token.into(),
            language: language.into(),
        }
    }

    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }
}

/// A control that is disabled while its action runs (submit button,
/// record button, payment button).
pub trait Affordance: Send + Sync {
    fn set_enabled(&self, enabled: bool);
}

/// Control with nothing to toggle.
pub struct NoAffordance;

impl Affordance for NoAffordance {
    fn set_enabled(&self, _enabled: bool) {}
}

pub trait Navigator: Send + Sync {
    fn navigate(&self, target: &str);
    fn reload(&self);
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
