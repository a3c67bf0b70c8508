//! Backend endpoints consumed by the controllers.

use async_trait::async_trait;
use reqwest::{multipart, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{FileId, SessionId},
    error::ErrorBody,
    protocol::{
        AssistantMessagePayload, ChatSendRequest, ChatSendResponse, LocaleResponse,
        PaymentResponse, PaymentSubmission, TablePageQuery, TablePageResponse,
        VoiceMessageResponse,
    },
};
use tracing::{debug, info};

use crate::{
    audio::AudioPayload,
    config::ClientSettings,
    error::{ClientError, ClientResult, ValidationError},
    PageContext,
};

const CSRF_HEADER: &str = "X-CSRFToken";

/// The server's answer to an uploaded voice message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceExchange {
    pub transcription: String,
    pub reply: String,
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn send_chat_message(
        &self,
        page: &PageContext,
        message: &str,
    ) -> ClientResult<AssistantMessagePayload>;

    async fn send_voice_message(
        &self,
        page: &PageContext,
        audio: &AudioPayload,
    ) -> ClientResult<VoiceExchange>;

    async fn fetch_table_page(
        &self,
        file_id: FileId,
        query: &TablePageQuery,
    ) -> ClientResult<TablePageResponse>;

    async fn set_language(&self, language: &str) -> ClientResult<LocaleResponse>;

    /// `Err(ClientError::Unauthorized)` on HTTP 401; other statuses are not
    /// treated as expiry.
    async fn auth_status(&self) -> ClientResult<()>;

    async fn submit_payment(&self, submission: &PaymentSubmission)
        -> ClientResult<PaymentResponse>;
}

pub struct HttpBackend {
    http: Client,
    settings: ClientSettings,
}

impl HttpBackend {
    pub fn new(settings: ClientSettings) -> Self {
        Self::with_client(Client::new(), settings)
    }

    pub fn with_client(http: Client, settings: ClientSettings) -> Self {
        Self { http, settings }
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    fn session(page: &PageContext) -> ClientResult<&SessionId> {
        page.session_id
            .as_ref()
            .ok_or(ClientError::Validation(ValidationError::MissingSession))
    }
}

async fn read_json<T: DeserializeOwned>(res: Response) -> ClientResult<(StatusCode, T)> {
    let status = res.status();
    let body = res.bytes().await?;
    if !status.is_success() {
        return Err(ClientError::Server {
            status: status.as_u16(),
            message: ErrorBody::message_from(&body),
        });
    }
    let parsed = serde_json::from_slice(&body)
        .map_err(|err| ClientError::protocol(format!("invalid JSON body: {err}")))?;
    Ok((status, parsed))
}

/// A 2xx body that still names an error is reported like a rejected request.
pub(crate) fn embedded_error(
    status: StatusCode,
    error: Option<String>,
    missing: &str,
) -> ClientError {
    match error.filter(|message| !message.trim().is_empty()) {
        Some(message) => ClientError::Server {
            status: status.as_u16(),
            message: Some(message),
        },
        None => ClientError::protocol(format!("response is missing {missing}")),
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn send_chat_message(
        &self,
        page: &PageContext,
        message: &str,
    ) -> ClientResult<AssistantMessagePayload> {
        let session_id = Self::session(page)?;
        let url = self.settings.url(&self.settings.chat_send_path);
        debug!(session = %session_id, %url, "sending chat message");

        let res = self
            .http
            .post(url)
            .header(CSRF_HEADER, &page.csrf_token)
            .json(&ChatSendRequest {
                session_id: session_id.clone(),
                message: message.to_string(),
            })
            .send()
            .await?;
        let (status, body): (_, ChatSendResponse) = read_json(res).await?;

        body.assistant_message
            .ok_or_else(|| embedded_error(status, body.error, "assistant_message"))
    }

    async fn send_voice_message(
        &self,
        page: &PageContext,
        audio: &AudioPayload,
    ) -> ClientResult<VoiceExchange> {
        let session_id = Self::session(page)?;
        let url = self.settings.url(&self.settings.chat_voice_path);
        info!(
            session = %session_id,
            bytes = audio.bytes.len(),
            mime = %audio.mime_type,
            file = %audio.file_name,
            "uploading voice message"
        );

        let part = multipart::Part::bytes(audio.bytes.clone())
            .file_name(audio.file_name.clone())
            .mime_str(&audio.mime_type)?;
        let form = multipart::Form::new()
            .part("audio", part)
            .text("session_id", session_id.to_string())
            .text("language", page.language.clone())
            .text("csrf_token", page.csrf_token.clone());

        let res = self.http.post(url).multipart(form).send().await?;
        let (status, body): (_, VoiceMessageResponse) = read_json(res).await?;

        let transcription = body
            .user_message
            .and_then(|user| user.transcription.or(user.content));
        match (transcription, body.assistant_message) {
            (Some(transcription), Some(assistant)) => Ok(VoiceExchange {
                transcription,
                reply: assistant.content,
            }),
            (None, _) => Err(embedded_error(status, body.error, "user_message.transcription")),
            (Some(_), None) => Err(embedded_error(status, body.error, "assistant_message")),
        }
    }

    async fn fetch_table_page(
        &self,
        file_id: FileId,
        query: &TablePageQuery,
    ) -> ClientResult<TablePageResponse> {
        let path = self
            .settings
            .file_data_path
            .replace("{file_id}", &file_id.to_string());
        let url = self.settings.url(&path);
        debug!(file = %file_id, page = query.page, per_page = query.per_page, sheet = ?query.sheet, "fetching table page");

        let res = self.http.get(url).query(query).send().await?;
        let (_, body) = read_json(res).await?;
        Ok(body)
    }

    async fn set_language(&self, language: &str) -> ClientResult<LocaleResponse> {
        let path = self.settings.language_path.replace("{language}", language);
        let res = self.http.get(self.settings.url(&path)).send().await?;
        let (_, body) = read_json(res).await?;
        Ok(body)
    }

    async fn auth_status(&self) -> ClientResult<()> {
        let res = self
            .http
            .get(self.settings.url(&self.settings.auth_status_path))
            .send()
            .await?;
        match res.status() {
            StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
            status if status.is_success() => Ok(()),
            status => {
                debug!(status = status.as_u16(), "auth status check returned non-success");
                Ok(())
            }
        }
    }

    async fn submit_payment(
        &self,
        submission: &PaymentSubmission,
    ) -> ClientResult<PaymentResponse> {
        let res = self
            .http
            .post(self.settings.url(&self.settings.payment_path))
            .header(CSRF_HEADER, &submission.csrf_token)
            .form(submission)
            .send()
            .await?;
        let (_, body) = read_json(res).await?;
        Ok(body)
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
