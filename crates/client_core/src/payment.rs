//! Subscription payment: card tokenization, then submission of the token.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use reqwest::StatusCode;
use shared::{
    domain::{PlanId, PlanInfo},
    protocol::PaymentSubmission,
};
use tracing::{info, warn};

use crate::{
    action::SessionActionController,
    error::{ClientError, ClientResult, ValidationError},
    notifier::Notifier,
    transport::{embedded_error, Backend},
    Affordance, Navigator, PageContext,
};

/// Third-party card tokenizer. Card fields live inside the implementation and
/// never pass through this crate.
#[async_trait]
pub trait Tokenizer: Send + Sync {
    /// Returns an opaque token, or `ClientError::Tokenization`.
    async fn create_token(&self) -> ClientResult<String>;

    /// Second round-trip required when the server answers with a client secret.
    async fn confirm_payment(&self, client_secret: &str, billing_name: &str) -> ClientResult<()>;
}

pub trait PaymentView: Send + Sync {
    fn show_plan(&self, plan_id: &PlanId, info: Option<&PlanInfo>);
    fn show_inline_error(&self, message: &str);
    fn clear_inline_error(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanSelection {
    pub plan_id: PlanId,
    pub token: String,
}

#[derive(Debug)]
pub enum PaymentOutcome {
    NoPlanSelected,
    Busy,
    TokenizationFailed(ClientError),
    Failed(ClientError),
    Completed { destination: String },
}

pub struct PaymentFormController {
    page: PageContext,
    backend: Arc<dyn Backend>,
    tokenizer: Arc<dyn Tokenizer>,
    view: Arc<dyn PaymentView>,
    navigator: Arc<dyn Navigator>,
    actions: SessionActionController,
    success_url: String,
    billing_name: String,
    plans: Mutex<HashMap<PlanId, PlanInfo>>,
    selected: Mutex<Option<PlanId>>,
}

impl PaymentFormController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        page: PageContext,
        backend: Arc<dyn Backend>,
        tokenizer: Arc<dyn Tokenizer>,
        view: Arc<dyn PaymentView>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
        submit_button: Arc<dyn Affordance>,
        success_url: impl Into<String>,
    ) -> Self {
        Self {
            page,
            backend,
            tokenizer,
            view,
            navigator,
            actions: SessionActionController::new("payment", notifier, submit_button)
                .with_failure_message("Payment setup failed. Please try again."),
            success_url: success_url.into(),
            billing_name: String::new(),
            plans: Mutex::new(HashMap::new()),
            selected: Mutex::new(None),
        }
    }

    pub fn with_billing_name(mut self, name: impl Into<String>) -> Self {
        self.billing_name = name.into();
        self
    }

    pub fn set_plans(&self, plans: HashMap<PlanId, PlanInfo>) {
        if let Ok(mut current) = self.plans.lock() {
            *current = plans;
        }
    }

    pub fn select_plan(&self, plan_id: PlanId) {
        let info = self
            .plans
            .lock()
            .ok()
            .and_then(|plans| plans.get(&plan_id).cloned());
        self.view.show_plan(&plan_id, info.as_ref());
        info!(plan = %plan_id, "plan selected");
        if let Ok(mut selected) = self.selected.lock() {
            *selected = Some(plan_id);
        }
    }

    pub fn selected_plan(&self) -> Option<PlanId> {
        self.selected.lock().ok().and_then(|selected| selected.clone())
    }

    /// Tokenizes the card, submits the token with the selected plan and
    /// follows the server's confirmation or redirect. The submit button is
    /// disabled for the whole sequence.
    pub async fn submit(&self) -> PaymentOutcome {
        let Some(plan_id) = self.selected_plan() else {
            self.view
                .show_inline_error(&ValidationError::NoPlanSelected.to_string());
            return PaymentOutcome::NoPlanSelected;
        };

        let Some(_scope) = self.actions.begin() else {
            return PaymentOutcome::Busy;
        };
        self.view.clear_inline_error();

        let token = match self.tokenizer.create_token().await {
            Ok(token) => token,
            Err(err) => {
                warn!(plan = %plan_id, "card tokenization failed: {err}");
                self.view
                    .show_inline_error(&err.user_message("Card details could not be verified."));
                return PaymentOutcome::TokenizationFailed(err);
            }
        };

        match self.complete(PlanSelection { plan_id, token }).await {
            Ok(destination) => {
                info!(%destination, "payment completed");
                self.navigator.navigate(&destination);
                PaymentOutcome::Completed { destination }
            }
            Err(err) => {
                self.actions.report_failure(&err);
                self.view
                    .show_inline_error(&err.user_message("Payment setup failed. Please try again."));
                PaymentOutcome::Failed(err)
            }
        }
    }

    async fn complete(&self, selection: PlanSelection) -> ClientResult<String> {
        let response = self
            .backend
            .submit_payment(&PaymentSubmission {
                plan_type: selection.plan_id,
                stripe_token: selection.token,
                csrf_token: self.page.csrf_token.clone(),
            })
            .await?;

        if let Some(client_secret) = response.client_secret.filter(|s| !s.is_empty()) {
            self.tokenizer
                .confirm_payment(&client_secret, &self.billing_name)
                .await?;
            return Ok(self.success_url.clone());
        }
        if let Some(redirect) = response.redirect.filter(|r| !r.is_empty()) {
            return Ok(redirect);
        }
        Err(embedded_error(StatusCode::OK, response.error, "client_secret"))
    }
}

#[cfg(test)]
#[path = "tests/payment_tests.rs"]
mod tests;
