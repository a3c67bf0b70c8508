mod console;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client_core::{
    audio::{StartOutcome, DEFAULT_MIME_TYPE},
    chat::VoiceOutcome,
    load_settings, AudioCapture, Backend, ChatController, HttpBackend, LivenessMonitor,
    LivenessStatus, LocaleSwitcher, NoAffordance, PageContext, PagedTableController,
    PaymentFormController, PaymentOutcome, SubmitOutcome, TracingNotifier,
};
use shared::domain::{FileId, PlanId, SessionId};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::console::{
    ConsoleIndicator, ConsoleNavigator, ConsolePaymentView, ConsoleTable, ConsoleTranscript,
    FileCaptureDevice, StaticTokenizer,
};

#[derive(Parser, Debug)]
#[command(name = "sheetchat", about = "Drive the sheetchat backend from a terminal")]
struct Args {
    /// Overrides `base_url` from client.toml / APP__BASE_URL.
    #[arg(long, global = true)]
    server_url: Option<String>,
    #[arg(long, global = true, default_value = "")]
    csrf_token: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send one text message to a chat session.
    Chat {
        #[arg(long)]
        session: String,
        message: String,
    },
    /// Upload an audio file as a voice message.
    Voice {
        #[arg(long)]
        session: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value = DEFAULT_MIME_TYPE)]
        mime_type: String,
        /// How long the "recording" stays open before it is stopped.
        #[arg(long, default_value_t = 1)]
        seconds: u64,
    },
    /// Print one page of an uploaded spreadsheet.
    Table {
        #[arg(long)]
        file_id: i64,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        per_page: Option<u32>,
        #[arg(long)]
        sheet: Option<String>,
    },
    /// Switch the interface language.
    Locale { language: String },
    /// Check the login session once, or keep polling with --watch.
    AuthStatus {
        #[arg(long)]
        watch: bool,
    },
    /// Subscribe to a plan with an already-issued card token.
    Pay {
        #[arg(long)]
        plan: String,
        #[arg(long)]
        token: String,
        #[arg(long, default_value = "")]
        billing_name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(server_url) = args.server_url {
        settings.base_url = server_url;
    }
    info!(base_url = %settings.base_url, "using backend");

    let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(settings.clone()));
    let notifier = Arc::new(TracingNotifier);
    let navigator = Arc::new(ConsoleNavigator);
    let page = PageContext::new(args.csrf_token, settings.language.clone());

    match args.command {
        Command::Chat { session, message } => {
            let capture = AudioCapture::new(
                Arc::new(FileCaptureDevice::new(PathBuf::new(), DEFAULT_MIME_TYPE)),
                notifier.clone(),
                Arc::new(ConsoleIndicator),
                settings.min_recording_bytes,
            );
            let chat = ChatController::new(
                page.with_session(SessionId::new(session)),
                backend,
                Arc::new(ConsoleTranscript),
                notifier,
                Arc::new(NoAffordance),
                capture,
            )?;
            finish(chat.send_text(&message).await)?;
        }
        Command::Voice {
            session,
            file,
            mime_type,
            seconds,
        } => {
            let capture = AudioCapture::new(
                Arc::new(FileCaptureDevice::new(file, mime_type)),
                notifier.clone(),
                Arc::new(ConsoleIndicator),
                settings.min_recording_bytes,
            );
            let chat = ChatController::new(
                page.with_session(SessionId::new(session)),
                backend,
                Arc::new(ConsoleTranscript),
                notifier,
                Arc::new(NoAffordance),
                capture,
            )?;
            if chat.start_recording().await? != StartOutcome::Started {
                bail!("recording did not start");
            }
            tokio::time::sleep(Duration::from_secs(seconds)).await;
            match chat.stop_recording().await? {
                VoiceOutcome::Submitted(outcome) => finish(outcome)?,
                VoiceOutcome::TooShort { bytes } => bail!("recording too short ({bytes} bytes)"),
                VoiceOutcome::NotRecording => bail!("recording was not active"),
                VoiceOutcome::Busy => bail!("a request is already in progress"),
            }
        }
        Command::Table {
            file_id,
            page: page_index,
            per_page,
            sheet,
        } => {
            let page_size = per_page.unwrap_or(settings.page_size);
            let table = PagedTableController::new(
                FileId(file_id),
                page_size,
                backend,
                Arc::new(ConsoleTable),
                notifier,
            );
            finish(table.load_page(page_index, page_size, sheet).await)?;
        }
        Command::Locale { language } => {
            if !LocaleSwitcher::new(backend, navigator)
                .set_language(&language)
                .await
            {
                bail!("language {language} was not accepted");
            }
        }
        Command::AuthStatus { watch } => {
            let monitor = LivenessMonitor::new(backend, notifier, navigator, settings.login_path)
                .with_timing(settings.liveness_interval, settings.expiry_redirect_delay);
            if watch {
                Arc::new(monitor).spawn().await?;
            } else {
                let status = monitor.check_once().await;
                println!("session: {status:?}");
                if status == LivenessStatus::Expired {
                    bail!("session expired");
                }
            }
        }
        Command::Pay {
            plan,
            token,
            billing_name,
        } => {
            let form = PaymentFormController::new(
                page,
                backend,
                Arc::new(StaticTokenizer::new(token)),
                Arc::new(ConsolePaymentView),
                navigator,
                notifier,
                Arc::new(NoAffordance),
                settings.payment_success_url,
            )
            .with_billing_name(billing_name);
            form.select_plan(PlanId::new(plan));
            match form.submit().await {
                PaymentOutcome::Completed { destination } => info!(%destination, "subscribed"),
                PaymentOutcome::NoPlanSelected => bail!("no plan selected"),
                PaymentOutcome::Busy => bail!("payment already in progress"),
                PaymentOutcome::TokenizationFailed(err) | PaymentOutcome::Failed(err) => {
                    return Err(err.into())
                }
            }
        }
    }

    Ok(())
}

fn finish(outcome: SubmitOutcome) -> Result<()> {
    match outcome {
        SubmitOutcome::Completed => Ok(()),
        SubmitOutcome::Empty => bail!("nothing to send"),
        SubmitOutcome::Busy => bail!("a request is already in progress"),
        SubmitOutcome::Failed(err) => Err(err.into()),
    }
}
