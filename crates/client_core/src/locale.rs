use std::sync::Arc;

use tracing::{info, warn};

use crate::{transport::Backend, Navigator};

pub struct LocaleSwitcher {
    backend: Arc<dyn Backend>,
    navigator: Arc<dyn Navigator>,
}

impl LocaleSwitcher {
    pub fn new(backend: Arc<dyn Backend>, navigator: Arc<dyn Navigator>) -> Self {
        Self { backend, navigator }
    }

    /// Returns `true` when the server accepted the language and the page was
    /// reloaded. Failures are only logged.
    pub async fn set_language(&self, language: &str) -> bool {
        match self.backend.set_language(language).await {
            Ok(response) if response.status == "success" => {
                info!(language, "language changed; reloading");
                self.navigator.reload();
                true
            }
            Ok(response) => {
                warn!(language, status = %response.status, message = ?response.message, "language change rejected");
                false
            }
            Err(err) => {
                warn!(language, "error setting language: {err}");
                false
            }
        }
    }
}
