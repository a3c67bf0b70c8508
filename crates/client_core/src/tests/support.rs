//! Test doubles for the capability traits.

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use serde_json::{json, Map};
use shared::{
    domain::{FileId, Severity},
    protocol::{
        AssistantMessagePayload, LocaleResponse, PaymentResponse, PaymentSubmission,
        TablePageQuery, TablePageResponse,
    },
};
use tokio::{sync::mpsc, sync::Notify, time::Instant};

use crate::{
    audio::{AudioChunk, AudioPayload, CaptureDevice, CaptureEvent, CaptureState, RecordingIndicator},
    chat::{Message, TranscriptView},
    error::{ClientError, ClientResult},
    notifier::Notifier,
    table::{Pagination, TablePage, TableView},
    transport::{Backend, VoiceExchange},
    Affordance, Navigator, PageContext,
};

#[derive(Default)]
pub struct RecordingNotifier {
    entries: Mutex<Vec<(String, Severity)>>,
}

impl RecordingNotifier {
    pub fn entries(&self) -> Vec<(String, Severity)> {
        self.entries.lock().expect("notifier").clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries()
            .iter()
            .filter(|(_, s)| *s == severity)
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, severity: Severity) {
        self.entries
            .lock()
            .expect("notifier")
            .push((message.to_string(), severity));
    }
}

#[derive(Default)]
pub struct CountingAffordance {
    disabled: AtomicUsize,
    enabled: AtomicUsize,
}

impl CountingAffordance {
    pub fn disabled(&self) -> usize {
        self.disabled.load(Ordering::SeqCst)
    }

    pub fn enabled(&self) -> usize {
        self.enabled.load(Ordering::SeqCst)
    }
}

impl Affordance for CountingAffordance {
    fn set_enabled(&self, enabled: bool) {
        if enabled {
            self.enabled.fetch_add(1, Ordering::SeqCst);
        } else {
            self.disabled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    navigations: Mutex<Vec<(String, Instant)>>,
    reloads: AtomicUsize,
}

impl RecordingNavigator {
    pub fn targets(&self) -> Vec<String> {
        self.navigations
            .lock()
            .expect("navigator")
            .iter()
            .map(|(target, _)| target.clone())
            .collect()
    }

    pub fn navigated_at(&self) -> Vec<Instant> {
        self.navigations
            .lock()
            .expect("navigator")
            .iter()
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, target: &str) {
        self.navigations
            .lock()
            .expect("navigator")
            .push((target.to_string(), Instant::now()));
    }

    fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct RecordingTranscript {
    messages: Mutex<Vec<Message>>,
}

impl RecordingTranscript {
    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().expect("transcript").clone()
    }
}

impl TranscriptView for RecordingTranscript {
    fn append(&self, message: &Message) {
        self.messages.lock().expect("transcript").push(message.clone());
    }
}

#[derive(Default)]
pub struct RecordingTableView {
    tables: Mutex<Vec<TablePage>>,
    pagers: Mutex<Vec<Pagination>>,
}

impl RecordingTableView {
    pub fn tables(&self) -> Vec<TablePage> {
        self.tables.lock().expect("tables").clone()
    }

    pub fn pagers(&self) -> Vec<Pagination> {
        self.pagers.lock().expect("pagers").clone()
    }
}

impl TableView for RecordingTableView {
    fn render_table(&self, page: &TablePage) {
        self.tables.lock().expect("tables").push(page.clone());
    }

    fn render_pagination(&self, pagination: &Pagination) {
        self.pagers.lock().expect("pagers").push(pagination.clone());
    }
}

#[derive(Default)]
pub struct RecordingIndicatorLog {
    states: Mutex<Vec<CaptureState>>,
    labels: Mutex<Vec<String>>,
}

impl RecordingIndicatorLog {
    pub fn states(&self) -> Vec<CaptureState> {
        self.states.lock().expect("states").clone()
    }

    pub fn labels(&self) -> Vec<String> {
        self.labels.lock().expect("labels").clone()
    }
}

impl RecordingIndicator for RecordingIndicatorLog {
    fn state_changed(&self, state: CaptureState) {
        self.states.lock().expect("states").push(state);
    }

    fn elapsed(&self, label: &str) {
        self.labels.lock().expect("labels").push(label.to_string());
    }
}

/// Capture device that replays scripted chunks: `initial` right after
/// acquisition, `trailing` between the stop request and the stop event.
#[derive(Default)]
pub struct ScriptedDevice {
    initial: Vec<AudioChunk>,
    trailing: Vec<AudioChunk>,
    deny: bool,
    stall: bool,
    sender: Mutex<Option<mpsc::Sender<CaptureEvent>>>,
    acquires: AtomicUsize,
    releases: AtomicUsize,
}

impl ScriptedDevice {
    pub fn with_chunks(initial: Vec<AudioChunk>, trailing: Vec<AudioChunk>) -> Self {
        Self {
            initial,
            trailing,
            ..Self::default()
        }
    }

    pub fn denied() -> Self {
        Self {
            deny: true,
            ..Self::default()
        }
    }

    /// Never answers the permission prompt.
    pub fn stalled() -> Self {
        Self {
            stall: true,
            ..Self::default()
        }
    }

    pub fn acquires(&self) -> usize {
        self.acquires.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

pub fn chunk(len: usize, mime: &str) -> AudioChunk {
    AudioChunk {
        bytes: vec![7u8; len],
        mime_type: Some(mime.to_string()),
    }
}

#[async_trait]
impl CaptureDevice for ScriptedDevice {
    async fn acquire(&self) -> ClientResult<mpsc::Receiver<CaptureEvent>> {
        self.acquires.fetch_add(1, Ordering::SeqCst);
        if self.deny {
            return Err(ClientError::Permission("NotAllowedError".to_string()));
        }
        if self.stall {
            std::future::pending::<()>().await;
        }
        let (tx, rx) = mpsc::channel(64);
        for chunk in &self.initial {
            tx.try_send(CaptureEvent::Chunk(chunk.clone()))
                .expect("initial chunk");
        }
        *self.sender.lock().expect("sender") = Some(tx);
        Ok(rx)
    }

    fn request_stop(&self) {
        if let Some(tx) = self.sender.lock().expect("sender").take() {
            for chunk in &self.trailing {
                tx.try_send(CaptureEvent::Chunk(chunk.clone()))
                    .expect("trailing chunk");
            }
            tx.try_send(CaptureEvent::Stopped).expect("stop event");
        }
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// In-memory backend. Chat requests can be held open with [`FakeBackend::hold_chat`].
#[derive(Default)]
pub struct FakeBackend {
    chat_messages: Mutex<Vec<String>>,
    chat_reply: Mutex<Option<String>>,
    chat_error: Mutex<Option<String>>,
    chat_hold: Mutex<Option<Arc<Notify>>>,
    voice_uploads: Mutex<Vec<AudioPayload>>,
    voice_reply: Mutex<Option<VoiceExchange>>,
    table_total: Mutex<u64>,
    table_fail: AtomicBool,
    table_queries: Mutex<Vec<TablePageQuery>>,
    languages: Mutex<Vec<String>>,
    reject_languages: AtomicBool,
    unauthorized: AtomicBool,
    auth_checks: AtomicUsize,
    payments: Mutex<Vec<PaymentSubmission>>,
    payment_response: Mutex<PaymentResponse>,
}

impl FakeBackend {
    pub fn reply_with(&self, content: &str) {
        *self.chat_reply.lock().expect("reply") = Some(content.to_string());
    }

    pub fn fail_chat_with(&self, message: &str) {
        *self.chat_error.lock().expect("error") = Some(message.to_string());
    }

    pub fn hold_chat(&self) -> Arc<Notify> {
        let notify = Arc::new(Notify::new());
        *self.chat_hold.lock().expect("hold") = Some(Arc::clone(&notify));
        notify
    }

    pub fn chat_messages(&self) -> Vec<String> {
        self.chat_messages.lock().expect("chat").clone()
    }

    pub fn voice_reply_with(&self, transcription: &str, reply: &str) {
        *self.voice_reply.lock().expect("voice") = Some(VoiceExchange {
            transcription: transcription.to_string(),
            reply: reply.to_string(),
        });
    }

    pub fn voice_uploads(&self) -> Vec<AudioPayload> {
        self.voice_uploads.lock().expect("uploads").clone()
    }

    pub fn set_table_rows(&self, total: u64) {
        *self.table_total.lock().expect("total") = total;
    }

    pub fn fail_table(&self, fail: bool) {
        self.table_fail.store(fail, Ordering::SeqCst);
    }

    pub fn table_queries(&self) -> Vec<TablePageQuery> {
        self.table_queries.lock().expect("queries").clone()
    }

    pub fn languages(&self) -> Vec<String> {
        self.languages.lock().expect("languages").clone()
    }

    pub fn reject_languages(&self) {
        self.reject_languages.store(true, Ordering::SeqCst);
    }

    pub fn expire_session(&self) {
        self.unauthorized.store(true, Ordering::SeqCst);
    }

    pub fn auth_checks(&self) -> usize {
        self.auth_checks.load(Ordering::SeqCst)
    }

    pub fn payment_responds(&self, response: PaymentResponse) {
        *self.payment_response.lock().expect("payment") = response;
    }

    pub fn payments(&self) -> Vec<PaymentSubmission> {
        self.payments.lock().expect("payments").clone()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn send_chat_message(
        &self,
        _page: &PageContext,
        message: &str,
    ) -> ClientResult<AssistantMessagePayload> {
        self.chat_messages
            .lock()
            .expect("chat")
            .push(message.to_string());
        let hold = self.chat_hold.lock().expect("hold").clone();
        if let Some(hold) = hold {
            hold.notified().await;
        }
        if let Some(error) = self.chat_error.lock().expect("error").clone() {
            return Err(ClientError::Server {
                status: 500,
                message: Some(error),
            });
        }
        let content = self
            .chat_reply
            .lock()
            .expect("reply")
            .clone()
            .unwrap_or_else(|| "ok".to_string());
        Ok(AssistantMessagePayload {
            content,
            timestamp: None,
        })
    }

    async fn send_voice_message(
        &self,
        _page: &PageContext,
        audio: &AudioPayload,
    ) -> ClientResult<VoiceExchange> {
        self.voice_uploads
            .lock()
            .expect("uploads")
            .push(audio.clone());
        self.voice_reply
            .lock()
            .expect("voice")
            .clone()
            .ok_or_else(|| ClientError::protocol("no voice reply scripted"))
    }

    async fn fetch_table_page(
        &self,
        _file_id: FileId,
        query: &TablePageQuery,
    ) -> ClientResult<TablePageResponse> {
        self.table_queries
            .lock()
            .expect("queries")
            .push(query.clone());
        if self.table_fail.load(Ordering::SeqCst) {
            return Err(ClientError::Server {
                status: 500,
                message: Some("Error loading file data".to_string()),
            });
        }
        let total = *self.table_total.lock().expect("total");
        let start = u64::from(query.page.saturating_sub(1)) * u64::from(query.per_page);
        let end = (start + u64::from(query.per_page)).min(total);
        let data = (start..end)
            .map(|index| {
                let mut row = Map::new();
                row.insert("id".to_string(), json!(index + 1));
                row.insert(
                    "sheet".to_string(),
                    json!(query.sheet.clone().unwrap_or_default()),
                );
                row
            })
            .collect();
        Ok(TablePageResponse {
            columns: vec!["id".to_string(), "sheet".to_string()],
            data,
            total_rows: total,
        })
    }

    async fn set_language(&self, language: &str) -> ClientResult<LocaleResponse> {
        self.languages
            .lock()
            .expect("languages")
            .push(language.to_string());
        let status = if self.reject_languages.load(Ordering::SeqCst) {
            "error"
        } else {
            "success"
        };
        Ok(LocaleResponse {
            status: status.to_string(),
            language: Some(language.to_string()),
            message: None,
        })
    }

    async fn auth_status(&self) -> ClientResult<()> {
        self.auth_checks.fetch_add(1, Ordering::SeqCst);
        if self.unauthorized.load(Ordering::SeqCst) {
            Err(ClientError::Unauthorized)
        } else {
            Ok(())
        }
    }

    async fn submit_payment(
        &self,
        submission: &PaymentSubmission,
    ) -> ClientResult<PaymentResponse> {
        self.payments
            .lock()
            .expect("payments")
            .push(submission.clone());
        Ok(self.payment_response.lock().expect("payment").clone())
    }
}
