//! Terminal stand-ins for the page capabilities the controllers expect.

use std::{
    fs,
    path::PathBuf,
    sync::Mutex,
};

use async_trait::async_trait;
use client_core::{
    audio::{AudioChunk, CaptureDevice, CaptureEvent, CaptureState, RecordingIndicator},
    chat::{Message, TranscriptView},
    error::{ClientError, ClientResult},
    payment::{PaymentView, Tokenizer},
    table::{Pagination, TablePage, TableView},
    Navigator,
};
use shared::domain::{MessageOrigin, PlanId, PlanInfo};
use tokio::sync::mpsc;
use tracing::{debug, info};

const FILE_CHUNK_BYTES: usize = 4096;

pub struct ConsoleTranscript;

impl TranscriptView for ConsoleTranscript {
    fn append(&self, message: &Message) {
        let who = match message.origin {
            MessageOrigin::User => "you",
            MessageOrigin::Assistant => "assistant",
        };
        println!("[{}] {who}: {}", message.timestamp.format("%H:%M:%S"), message.content);
    }
}

pub struct ConsoleTable;

impl TableView for ConsoleTable {
    fn render_table(&self, page: &TablePage) {
        if let Some(sheet) = &page.sheet {
            println!("sheet: {sheet}");
        }
        println!("{}", page.columns.join("\t"));
        for row in &page.rows {
            println!("{}", row.join("\t"));
        }
    }

    fn render_pagination(&self, pagination: &Pagination) {
        let window: Vec<String> = pagination
            .window
            .iter()
            .map(|page| {
                if *page == pagination.current {
                    format!("[{page}]")
                } else {
                    page.to_string()
                }
            })
            .collect();
        println!(
            "{} {} {}  (page {} of {})",
            if pagination.has_previous { "<" } else { " " },
            window.join(" "),
            if pagination.has_next { ">" } else { " " },
            pagination.current,
            pagination.total_pages
        );
    }
}

pub struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn navigate(&self, target: &str) {
        println!("-> {target}");
    }

    fn reload(&self) {
        println!("-> (reload)");
    }
}

pub struct ConsoleIndicator;

impl RecordingIndicator for ConsoleIndicator {
    fn state_changed(&self, state: CaptureState) {
        debug!(?state, "capture state");
    }

    fn elapsed(&self, label: &str) {
        println!("recording {label}");
    }
}

/// Plays a recorded file back as if it came from a microphone.
pub struct FileCaptureDevice {
    path: PathBuf,
    mime_type: String,
    sender: Mutex<Option<mpsc::Sender<CaptureEvent>>>,
}

impl FileCaptureDevice {
    pub fn new(path: PathBuf, mime_type: impl Into<String>) -> Self {
        Self {
            path,
            mime_type: mime_type.into(),
            sender: Mutex::new(None),
        }
    }
}

#[async_trait]
impl CaptureDevice for FileCaptureDevice {
    async fn acquire(&self) -> ClientResult<mpsc::Receiver<CaptureEvent>> {
        let bytes = fs::read(&self.path).map_err(|err| {
            ClientError::Permission(format!("{}: {err}", self.path.display()))
        })?;
        let chunks: Vec<&[u8]> = bytes.chunks(FILE_CHUNK_BYTES).collect();
        let (tx, rx) = mpsc::channel(chunks.len() + 1);
        for chunk in chunks {
            let event = CaptureEvent::Chunk(AudioChunk {
                bytes: chunk.to_vec(),
                mime_type: Some(self.mime_type.clone()),
            });
            if tx.try_send(event).is_err() {
                return Err(ClientError::Capture("chunk buffer full".to_string()));
            }
        }
        info!(path = %self.path.display(), bytes = bytes.len(), "audio file opened");
        if let Ok(mut sender) = self.sender.lock() {
            *sender = Some(tx);
        }
        Ok(rx)
    }

    fn request_stop(&self) {
        let sender = self.sender.lock().ok().and_then(|mut sender| sender.take());
        if let Some(tx) = sender {
            let _ = tx.try_send(CaptureEvent::Stopped);
        }
    }

    fn release(&self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// Hands out a token obtained elsewhere, e.g. a provider test token.
pub struct StaticTokenizer {
    token: String,
}

impl StaticTokenizer {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl Tokenizer for StaticTokenizer {
    async fn create_token(&self) -> ClientResult<String> {
        if self.token.trim().is_empty() {
            return Err(ClientError::Tokenization(
                "No card token supplied.".to_string(),
            ));
        }
        Ok(self.token.clone())
    }

    async fn confirm_payment(&self, client_secret: &str, billing_name: &str) -> ClientResult<()> {
        println!("confirm payment {client_secret} for {billing_name:?} with the billing provider");
        Ok(())
    }
}

pub struct ConsolePaymentView;

impl PaymentView for ConsolePaymentView {
    fn show_plan(&self, plan_id: &PlanId, info: Option<&PlanInfo>) {
        match info {
            Some(info) => println!("plan {plan_id}: {} ({})", info.name, info.features.join(", ")),
            None => println!("plan {plan_id}"),
        }
    }

    fn show_inline_error(&self, message: &str) {
        eprintln!("payment: {message}");
    }

    fn clear_inline_error(&self) {}
}
