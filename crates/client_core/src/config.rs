use std::{collections::HashMap, fs, path::Path, time::Duration};

use tracing::warn;

pub const DEFAULT_SETTINGS_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub base_url: String,
    pub chat_send_path: String,
    pub chat_voice_path: String,
    pub file_data_path: String,
    pub language_path: String,
    pub auth_status_path: String,
    pub payment_path: String,
    pub login_path: String,
    pub payment_success_url: String,
    pub language: String,
    pub page_size: u32,
    pub min_recording_bytes: usize,
    pub liveness_interval: Duration,
    pub expiry_redirect_delay: Duration,
    pub toast_display: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".into(),
            chat_send_path: "/api/chat/send".into(),
            chat_voice_path: "/api/chat/voice".into(),
            file_data_path: "/api/files/{file_id}/data".into(),
            language_path: "/api/language/{language}".into(),
            auth_status_path: "/api/auth/status".into(),
            payment_path: "/auth/subscribe".into(),
            login_path: "/auth/login".into(),
            payment_success_url: "/".into(),
            language: "en".into(),
            page_size: 100,
            min_recording_bytes: 1000,
            liveness_interval: Duration::from_secs(5 * 60),
            expiry_redirect_delay: Duration::from_millis(2000),
            toast_display: Duration::from_millis(5000),
        }
    }
}

impl ClientSettings {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Defaults, then `client.toml` in the working directory, then `APP__*` variables.
pub fn load_settings() -> ClientSettings {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            Ok(file_cfg) => {
                for (key, value) in file_cfg {
                    let value = match value {
                        toml::Value::String(s) => s,
                        other => other.to_string(),
                    };
                    apply(&mut settings, &key, &value);
                }
            }
            Err(err) => warn!(path = %path.display(), "ignoring unreadable settings file: {err}"),
        }
    }

    for key in KEYS {
        if let Some(value) = env(&format!("APP__{}", key.to_ascii_uppercase())) {
            apply(&mut settings, key, &value);
        }
    }

    settings
}

const KEYS: &[&str] = &[
    "base_url",
    "chat_send_path",
    "chat_voice_path",
    "file_data_path",
    "language_path",
    "auth_status_path",
    "payment_path",
    "login_path",
    "payment_success_url",
    "language",
    "page_size",
    "min_recording_bytes",
    "liveness_interval_secs",
    "expiry_redirect_delay_ms",
    "toast_display_ms",
];

fn apply(settings: &mut ClientSettings, key: &str, value: &str) {
    let value = value.trim();
    match key {
        "base_url" => settings.base_url = value.to_string(),
        "chat_send_path" => settings.chat_send_path = value.to_string(),
        "chat_voice_path" => settings.chat_voice_path = value.to_string(),
        "file_data_path" => settings.file_data_path = value.to_string(),
        "language_path" => settings.language_path = value.to_string(),
        "auth_status_path" => settings.auth_status_path = value.to_string(),
        "payment_path" => settings.payment_path = value.to_string(),
        "login_path" => settings.login_path = value.to_string(),
        "payment_success_url" => settings.payment_success_url = value.to_string(),
        "language" => settings.language = value.to_string(),
        "page_size" => match value.parse::<u32>() {
            Ok(parsed) if parsed > 0 => settings.page_size = parsed,
            _ => warn!(key, value, "ignoring invalid setting"),
        },
        "min_recording_bytes" => match value.parse::<usize>() {
            Ok(parsed) => settings.min_recording_bytes = parsed,
            Err(_) => warn!(key, value, "ignoring invalid setting"),
        },
        "liveness_interval_secs" => match value.parse::<u64>() {
            Ok(parsed) if parsed > 0 => settings.liveness_interval = Duration::from_secs(parsed),
            _ => warn!(key, value, "ignoring invalid setting"),
        },
        "expiry_redirect_delay_ms" => match value.parse::<u64>() {
            Ok(parsed) => settings.expiry_redirect_delay = Duration::from_millis(parsed),
            Err(_) => warn!(key, value, "ignoring invalid setting"),
        },
        "toast_display_ms" => match value.parse::<u64>() {
            Ok(parsed) => settings.toast_display = Duration::from_millis(parsed),
            Err(_) => warn!(key, value, "ignoring invalid setting"),
        },
        _ => warn!(key, "ignoring unknown setting"),
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
