//! Payment gateway registry.
//!
//! New checkouts go to the configured primary provider. Cancellations and
//! webhooks go to the provider that owns the subscription, so pages bought
//! through a provider keep working after the primary is switched.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::subscription::{BillingError, ProviderKind};
use crate::ports::PaymentGateway;

#[derive(Clone)]
pub struct PaymentGateways {
    primary: ProviderKind,
    gateways: HashMap<ProviderKind, Arc<dyn PaymentGateway>>,
}

impl PaymentGateways {
    /// Registry with a single gateway, which is also the primary.
    pub fn single(gateway: Arc<dyn PaymentGateway>) -> Self {
        let primary = gateway.kind();
        let mut gateways = HashMap::new();
        gateways.insert(primary, gateway);
        Self { primary, gateways }
    }

    /// Registers an additional provider. Replaces any gateway of the same kind.
    pub fn with(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.gateways.insert(gateway.kind(), gateway);
        self
    }

    pub fn primary_kind(&self) -> ProviderKind {
        self.primary
    }

    pub fn primary(&self) -> Arc<dyn PaymentGateway> {
        // `single` always registers the primary and `with` only adds.
        self.gateways[&self.primary].clone()
    }

    /// Gateway for `provider`.
    ///
    /// # Errors
    ///
    /// `Provider` if no gateway is configured for it.
    pub fn get(&self, provider: ProviderKind) -> Result<Arc<dyn PaymentGateway>, BillingError> {
        self.gateways.get(&provider).cloned().ok_or_else(|| {
            BillingError::provider(format!("payment provider {} is not configured", provider))
        })
    }
}
