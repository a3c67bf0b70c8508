use serde::{Deserialize, Serialize};

/// Failure body returned by every backend endpoint: `{"error": "..."}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
        }
    }

    /// Extracts the server-provided message from a raw response body, if any.
    pub fn message_from(raw: &[u8]) -> Option<String> {
        serde_json::from_slice::<ErrorBody>(raw)
            .ok()
            .and_then(|body| body.error)
            .map(|message| message.trim().to_string())
            .filter(|message| !message.is_empty())
    }
}
