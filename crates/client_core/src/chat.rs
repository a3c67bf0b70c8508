//! Text and voice chat bound to one server-side conversation.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use shared::{
    domain::{MessageOrigin, Modality, SessionId, Severity},
    protocol::AssistantMessagePayload,
};
use tracing::{debug, info};

use crate::{
    action::{SessionActionController, SubmitOutcome, ACTION_IN_PROGRESS},
    audio::{AudioCapture, CaptureState, StartOutcome, StopOutcome},
    error::{ClientError, ClientResult, ValidationError},
    notifier::Notifier,
    transport::{Backend, VoiceExchange},
    Affordance, PageContext,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub content: String,
    pub origin: MessageOrigin,
    pub modality: Modality,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(content: impl Into<String>, modality: Modality) -> Self {
        Self {
            content: content.into(),
            origin: MessageOrigin::User,
            modality,
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            origin: MessageOrigin::Assistant,
            modality: Modality::Text,
            timestamp: Utc::now(),
        }
    }
}

pub trait TranscriptView: Send + Sync {
    fn append(&self, message: &Message);
}

#[derive(Debug)]
pub enum VoiceOutcome {
    NotRecording,
    TooShort { bytes: usize },
    /// Another request of this chat is still in flight; nothing was stopped.
    Busy,
    Submitted(SubmitOutcome),
}

pub struct ChatController {
    page: PageContext,
    session_id: SessionId,
    backend: Arc<dyn Backend>,
    view: Arc<dyn TranscriptView>,
    actions: SessionActionController,
    capture: AudioCapture,
    transcript: Mutex<Vec<Message>>,
}

impl ChatController {
    pub fn new(
        page: PageContext,
        backend: Arc<dyn Backend>,
        view: Arc<dyn TranscriptView>,
        notifier: Arc<dyn Notifier>,
        composer: Arc<dyn Affordance>,
        capture: AudioCapture,
    ) -> ClientResult<Self> {
        let session_id = page
            .session_id
            .clone()
            .ok_or(ClientError::Validation(ValidationError::MissingSession))?;
        info!(session = %session_id, "chat controller ready");

        Ok(Self {
            page,
            session_id,
            backend,
            view,
            actions: SessionActionController::new("chat", notifier, composer)
                .with_failure_message("Failed to send message. Please try again."),
            capture,
            transcript: Mutex::new(Vec::new()),
        })
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn transcript(&self) -> Vec<Message> {
        self.transcript
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    pub fn capture(&self) -> &AudioCapture {
        &self.capture
    }

    pub fn is_busy(&self) -> bool {
        self.actions.is_busy()
    }

    fn append(&self, message: Message) {
        self.view.append(&message);
        if let Ok(mut messages) = self.transcript.lock() {
            messages.push(message);
        }
    }

    pub async fn send_text(&self, text: &str) -> SubmitOutcome {
        let text = text.trim().to_string();
        self.actions
            .submit(
                text,
                |text| self.append(Message::user(text.as_str(), Modality::Text)),
                |text| async move { self.backend.send_chat_message(&self.page, &text).await },
                |reply: AssistantMessagePayload| self.append(Message::assistant(reply.content)),
            )
            .await
    }

    pub async fn start_recording(&self) -> ClientResult<StartOutcome> {
        if self.actions.is_busy() {
            debug!(session = %self.session_id, "voice upload in flight; not recording");
            self.actions
                .notifier()
                .notify(ACTION_IN_PROGRESS, Severity::Info);
            return Ok(StartOutcome::AlreadyActive);
        }
        self.capture.start().await
    }

    /// Stops the microphone and, if the recording is long enough, uploads it.
    /// The transcript gains the server's transcription and the reply. While
    /// another request is in flight the recording keeps running.
    pub async fn stop_recording(&self) -> ClientResult<VoiceOutcome> {
        if self.capture.state() != CaptureState::Recording {
            return Ok(VoiceOutcome::NotRecording);
        }
        let Some(scope) = self.actions.begin() else {
            debug!(session = %self.session_id, "request in flight; recording kept");
            return Ok(VoiceOutcome::Busy);
        };

        let payload = match self.capture.stop().await? {
            StopOutcome::Accepted(payload) => payload,
            StopOutcome::TooShort { bytes } => return Ok(VoiceOutcome::TooShort { bytes }),
            StopOutcome::NotRecording => return Ok(VoiceOutcome::NotRecording),
        };

        let outcome = self
            .actions
            .finish(
                scope,
                self.backend.send_voice_message(&self.page, &payload),
                |exchange: VoiceExchange| {
                    self.append(Message::user(exchange.transcription, Modality::Voice));
                    self.append(Message::assistant(exchange.reply));
                },
            )
            .await;
        Ok(VoiceOutcome::Submitted(outcome))
    }
}

#[cfg(test)]
#[path = "tests/chat_tests.rs"]
mod tests;
