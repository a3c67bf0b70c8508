//! Microphone capture: permission, chunk buffering, payload assembly.

use std::{
    mem,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use shared::domain::Severity;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{interval_at, timeout, Instant},
};
use tracing::{debug, info, warn};

use crate::{
    error::{ClientError, ClientResult},
    notifier::Notifier,
};

pub const DEFAULT_MIME_TYPE: &str = "audio/webm";
pub const RECORDING_TOO_SHORT: &str = "Recording is too short";
const STOP_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    Chunk(AudioChunk),
    /// Final event of a capture, sent after [`CaptureDevice::request_stop`].
    Stopped,
}

/// Platform capture capability (the browser's `MediaRecorder`, a sound card,
/// a file in tests).
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Asks for permission and starts capturing. Events arrive in capture
    /// order; chunks may still arrive after `request_stop` and before
    /// [`CaptureEvent::Stopped`].
    async fn acquire(&self) -> ClientResult<mpsc::Receiver<CaptureEvent>>;

    fn request_stop(&self);

    /// Gives the underlying device handle back. Must be safe to call twice.
    fn release(&self);

    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Acquiring,
    Recording,
    Finalizing,
}

/// Record button, status line and timer of the recording UI.
pub trait RecordingIndicator: Send + Sync {
    fn state_changed(&self, state: CaptureState);
    fn elapsed(&self, label: &str);
}

pub struct NoIndicator;

impl RecordingIndicator for NoIndicator {
    fn state_changed(&self, _state: CaptureState) {}
    fn elapsed(&self, _label: &str) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
}

impl AudioPayload {
    /// Concatenates chunks in order, tagging the result with the first
    /// reported encoding.
    pub fn assemble(chunks: Vec<AudioChunk>) -> Self {
        let mime_type = chunks
            .iter()
            .find_map(|chunk| chunk.mime_type.clone().filter(|mime| !mime.is_empty()))
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
        let bytes = chunks.into_iter().flat_map(|chunk| chunk.bytes).collect();
        let file_name = format!(
            "recording_{}.{}",
            Utc::now().timestamp_millis(),
            extension_for(&mime_type)
        );
        Self {
            bytes,
            mime_type,
            file_name,
        }
    }
}

pub fn extension_for(mime_type: &str) -> &'static str {
    if mime_type.contains("ogg") {
        "ogg"
    } else if mime_type.contains("mp3") || mime_type.contains("mpeg") {
        "mp3"
    } else if mime_type.contains("wav") {
        "wav"
    } else {
        "webm"
    }
}

pub fn format_elapsed(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A recording is already being acquired, recorded or finalized.
    AlreadyActive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    Accepted(AudioPayload),
    TooShort { bytes: usize },
    NotRecording,
}

struct RecordingSession {
    state: CaptureState,
    chunks: Arc<Mutex<Vec<AudioChunk>>>,
    collector: Option<JoinHandle<bool>>,
    ticker: Option<JoinHandle<()>>,
}

/// Owns the single recording session of a page.
pub struct AudioCapture {
    device: Arc<dyn CaptureDevice>,
    notifier: Arc<dyn Notifier>,
    indicator: Arc<dyn RecordingIndicator>,
    min_bytes: usize,
    elapsed: Arc<AtomicU64>,
    session: Mutex<RecordingSession>,
}

impl AudioCapture {
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        notifier: Arc<dyn Notifier>,
        indicator: Arc<dyn RecordingIndicator>,
        min_bytes: usize,
    ) -> Self {
        Self {
            device,
            notifier,
            indicator,
            min_bytes,
            elapsed: Arc::new(AtomicU64::new(0)),
            session: Mutex::new(RecordingSession {
                state: CaptureState::Idle,
                chunks: Arc::new(Mutex::new(Vec::new())),
                collector: None,
                ticker: None,
            }),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.lock_session().state
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.elapsed.load(Ordering::Relaxed)
    }

    pub fn buffered_bytes(&self) -> usize {
        let chunks = Arc::clone(&self.lock_session().chunks);
        let total = lock_chunks(&chunks).iter().map(|chunk| chunk.bytes.len()).sum();
        total
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, RecordingSession> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: CaptureState) {
        self.lock_session().state = state;
        self.indicator.state_changed(state);
    }

    pub async fn start(&self) -> ClientResult<StartOutcome> {
        {
            let mut session = self.lock_session();
            if session.state != CaptureState::Idle {
                debug!(state = ?session.state, "recording already active; ignoring start");
                return Ok(StartOutcome::AlreadyActive);
            }
            session.state = CaptureState::Acquiring;
        }
        self.indicator.state_changed(CaptureState::Acquiring);
        info!(device = self.device.name(), "requesting capture device");
        let acquiring = AcquireScope {
            capture: self,
            armed: true,
        };

        let events = match self.device.acquire().await {
            Ok(events) => events,
            Err(err) => {
                warn!(device = self.device.name(), "capture device unavailable: {err}");
                drop(acquiring);
                self.notifier.notify(
                    &err.user_message("Could not access the microphone"),
                    Severity::Error,
                );
                return Err(err);
            }
        };

        let chunks = Arc::new(Mutex::new(Vec::new()));
        let collector = tokio::spawn(collect_chunks(events, Arc::clone(&chunks)));

        self.elapsed.store(0, Ordering::Relaxed);
        self.indicator.elapsed(&format_elapsed(0));
        let ticker = tokio::spawn(tick_elapsed(
            Arc::clone(&self.elapsed),
            Arc::clone(&self.indicator),
        ));

        {
            let mut session = self.lock_session();
            session.chunks = chunks;
            session.collector = Some(collector);
            session.ticker = Some(ticker);
            session.state = CaptureState::Recording;
        }
        acquiring.disarm();
        self.indicator.state_changed(CaptureState::Recording);
        info!(device = self.device.name(), "recording started");
        Ok(StartOutcome::Started)
    }

    /// Stops the capture, waits for the device's stop confirmation and
    /// assembles the payload. Payloads under the minimum size are rejected
    /// with a warning toast.
    pub async fn stop(&self) -> ClientResult<StopOutcome> {
        let (collector, ticker, chunks) = {
            let mut session = self.lock_session();
            if session.state != CaptureState::Recording {
                debug!(state = ?session.state, "not recording; ignoring stop");
                return Ok(StopOutcome::NotRecording);
            }
            session.state = CaptureState::Finalizing;
            (
                session.collector.take(),
                session.ticker.take(),
                Arc::clone(&session.chunks),
            )
        };
        self.indicator.state_changed(CaptureState::Finalizing);
        let _finalizing = FinalizeScope { capture: self };

        if let Some(ticker) = ticker {
            ticker.abort();
        }

        self.device.request_stop();
        if let Some(mut collector) = collector {
            match timeout(STOP_CONFIRMATION_TIMEOUT, &mut collector).await {
                Ok(Ok(true)) => debug!("capture stop confirmed"),
                Ok(Ok(false)) => warn!("capture stream closed without stop confirmation"),
                Ok(Err(err)) => {
                    return Err(ClientError::Capture(format!("chunk collector failed: {err}")))
                }
                Err(_) => {
                    collector.abort();
                    warn!("timed out waiting for capture stop confirmation");
                }
            }
        }

        let buffered = mem::take(&mut *lock_chunks(&chunks));
        info!(
            chunks = buffered.len(),
            seconds = self.elapsed_secs(),
            "recording finalized"
        );
        let payload = AudioPayload::assemble(buffered);

        if payload.bytes.len() < self.min_bytes {
            let bytes = payload.bytes.len();
            warn!(bytes, min = self.min_bytes, "recording too short; discarding");
            self.notifier.notify(RECORDING_TOO_SHORT, Severity::Warning);
            return Ok(StopOutcome::TooShort { bytes });
        }

        Ok(StopOutcome::Accepted(payload))
    }
}

fn lock_chunks(chunks: &Mutex<Vec<AudioChunk>>) -> std::sync::MutexGuard<'_, Vec<AudioChunk>> {
    chunks
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Returns to idle and releases the device unless acquisition completed,
/// including when the `start` future is dropped mid-prompt.
struct AcquireScope<'a> {
    capture: &'a AudioCapture,
    armed: bool,
}

impl AcquireScope<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AcquireScope<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!(device = self.capture.device.name(), "capture acquisition abandoned");
            self.capture.device.release();
            self.capture.set_state(CaptureState::Idle);
        }
    }
}

/// Clears the buffer, releases the device and returns to idle on every exit
/// from `stop`.
struct FinalizeScope<'a> {
    capture: &'a AudioCapture,
}

impl Drop for FinalizeScope<'_> {
    fn drop(&mut self) {
        let chunks = Arc::clone(&self.capture.lock_session().chunks);
        lock_chunks(&chunks).clear();
        self.capture.device.release();
        self.capture.set_state(CaptureState::Idle);
    }
}

async fn collect_chunks(
    mut events: mpsc::Receiver<CaptureEvent>,
    chunks: Arc<Mutex<Vec<AudioChunk>>>,
) -> bool {
    while let Some(event) = events.recv().await {
        match event {
            CaptureEvent::Chunk(chunk) => {
                debug!(bytes = chunk.bytes.len(), mime = ?chunk.mime_type, "audio chunk available");
                lock_chunks(&chunks).push(chunk);
            }
            CaptureEvent::Stopped => return true,
        }
    }
    false
}

async fn tick_elapsed(elapsed: Arc<AtomicU64>, indicator: Arc<dyn RecordingIndicator>) {
    let period = Duration::from_secs(1);
    let mut ticks = interval_at(Instant::now() + period, period);
    loop {
        ticks.tick().await;
        let seconds = elapsed.fetch_add(1, Ordering::Relaxed) + 1;
        indicator.elapsed(&format_elapsed(seconds));
    }
}

#[cfg(test)]
#[path = "tests/audio_tests.rs"]
mod tests;
