//! Mock payment gateway for testing.
//!
//! Configurable stand-in for a provider gateway. Supports:
//! - Pre-configured checkout sessions and webhook translations
//! - Error injection per method
//! - Call tracking

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::domain::foundation::Timestamp;
use crate::domain::subscription::{BillingEvent, ProviderKind};
use crate::ports::{
    CancelRequest, CancelledSubscription, CheckoutRequest, CheckoutSession, CustomerRequest,
    PaymentError, PaymentGateway, TranslatedEvent, WebhookTranslation,
};

/// Mock payment gateway.
///
/// ```ignore
/// let mock = MockPaymentGateway::new(ProviderKind::Stripe);
/// mock.set_method_error("cancel_subscription", PaymentError::network("down"));
/// mock.push_webhook(translation);
/// ```
#[derive(Clone)]
pub struct MockPaymentGateway {
    kind: ProviderKind,
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    /// Number of customers created so far, used to mint ids.
    customers_created: usize,

    next_checkout: Option<CheckoutSession>,

    /// Period end reported by `cancel_subscription`.
    period_end: Option<Timestamp>,

    /// Subscriptions created by `complete_checkout`.
    subscriptions_created: usize,

    /// Translations returned by successive `translate_webhook` calls.
    webhooks: Vec<WebhookTranslation>,

    method_errors: HashMap<String, PaymentError>,
    call_log: Vec<MethodCall>,

    checkouts: Vec<CheckoutRequest>,
    cancellations: Vec<CancelRequest>,
}

/// Recorded method call for assertions.
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub method: String,
    pub args: Vec<String>,
}

impl MockPaymentGateway {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            inner: Arc::new(Mutex::new(MockState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Configuration Methods
    // ════════════════════════════════════════════════════════════════════════════

    /// Set the session returned by the next `create_checkout` call.
    pub fn set_checkout(&self, session: CheckoutSession) {
        self.state().next_checkout = Some(session);
    }

    /// Report `period_end` from every `cancel_subscription` call.
    pub fn set_period_end(&self, period_end: Timestamp) {
        self.state().period_end = Some(period_end);
    }

    /// Queue a translation for the next `translate_webhook` call.
    pub fn push_webhook(&self, translation: WebhookTranslation) {
        self.state().webhooks.push(translation);
    }

    /// Fail every call to `method` with `error`.
    pub fn set_method_error(&self, method: &str, error: PaymentError) {
        self.state().method_errors.insert(method.to_string(), error);
    }

    pub fn clear_errors(&self) {
        self.state().method_errors.clear();
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Assertion Helpers
    // ════════════════════════════════════════════════════════════════════════════

    pub fn calls(&self) -> Vec<MethodCall> {
        self.state().call_log.clone()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.state().call_log.iter().any(|c| c.method == method)
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.state()
            .call_log
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    pub fn checkouts(&self) -> Vec<CheckoutRequest> {
        self.state().checkouts.clone()
    }

    pub fn cancellations(&self) -> Vec<CancelRequest> {
        self.state().cancellations.clone()
    }

    fn record(&self, method: &str, args: Vec<String>) -> Result<(), PaymentError> {
        let mut state = self.state();
        state.call_log.push(MethodCall {
            method: method.to_string(),
            args,
        });
        match state.method_errors.get(method) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn ensure_customer(&self, request: CustomerRequest) -> Result<String, PaymentError> {
        self.record(
            "ensure_customer",
            vec![request.user_id.to_string(), request.email.clone()],
        )?;

        if let Some(existing) = request.existing_customer_id {
            return Ok(existing);
        }

        let mut state = self.state();
        state.customers_created += 1;
        Ok(format!("cus_mock_{}", state.customers_created))
    }

    async fn create_checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        self.record(
            "create_checkout",
            vec![
                request.page_id.to_string(),
                request.plan.to_string(),
                request.amount_due().to_string(),
            ],
        )?;

        let mut state = self.state();
        let session = state.next_checkout.take().unwrap_or_else(|| CheckoutSession {
            id: format!("cs_mock_{}", state.checkouts.len() + 1),
            url: format!("https://checkout.example.com/{}", request.page_id),
        });
        state.checkouts.push(request);
        Ok(session)
    }

    async fn cancel_subscription(
        &self,
        request: CancelRequest,
    ) -> Result<CancelledSubscription, PaymentError> {
        self.record(
            "cancel_subscription",
            vec![
                request.subscription_id.clone(),
                request.at_period_end.to_string(),
            ],
        )?;
        let mut state = self.state();
        state.cancellations.push(request);
        Ok(CancelledSubscription {
            period_end: state.period_end,
        })
    }

    async fn translate_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookTranslation, PaymentError> {
        self.record(
            "translate_webhook",
            vec![
                String::from_utf8_lossy(payload).into_owned(),
                signature.unwrap_or_default().to_string(),
            ],
        )?;

        let mut state = self.state();
        if state.webhooks.is_empty() {
            return Err(PaymentError::invalid_webhook("no webhook configured"));
        }
        Ok(state.webhooks.remove(0))
    }

    /// Mints `sub_mock_N` for pending checkouts.
    async fn complete_checkout(
        &self,
        mut translated: TranslatedEvent,
    ) -> Result<TranslatedEvent, PaymentError> {
        self.record("complete_checkout", vec![translated.event.event_id.clone()])?;
        if !translated.subscription_pending {
            return Ok(translated);
        }

        let mut state = self.state();
        state.subscriptions_created += 1;
        if let BillingEvent::CheckoutCompleted {
            provider_subscription_id,
            ..
        } = &mut translated.event.kind
        {
            *provider_subscription_id = format!("sub_mock_{}", state.subscriptions_created);
        }
        translated.subscription_pending = false;
        Ok(translated)
    }
}
