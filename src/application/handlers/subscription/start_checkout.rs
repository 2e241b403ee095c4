//! StartCheckoutHandler - Begins a paid plan purchase for a page.

use std::sync::Arc;

use crate::application::PaymentGateways;
use crate::domain::discount::{evaluate_discount_code, AppliedDiscount, DiscountDecision, NormalizedCode};
use crate::domain::foundation::{PageId, Timestamp, UserId};
use crate::domain::subscription::{
    BillingError, PlanCatalog, PlanPrice, ProviderKind, SubscriptionPhase, SubscriptionPlan,
};
use crate::ports::{
    CheckoutRequest, CustomerRequest, DiscountCodeRepository, PageRepository, UserRepository,
};

/// Command to start a checkout.
#[derive(Debug, Clone)]
pub struct StartCheckoutCommand {
    pub user_id: UserId,
    pub page_id: PageId,
    pub plan: SubscriptionPlan,
    pub discount_code: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
}

/// Hosted checkout the client should redirect to.
#[derive(Debug, Clone)]
pub struct StartCheckoutResult {
    pub provider: ProviderKind,
    pub session_id: String,
    pub checkout_url: String,
    pub price: PlanPrice,
    pub discount: Option<AppliedDiscount>,
    pub amount_due: i64,
}

/// Handler for starting checkouts.
///
/// The page does not change here. It becomes active when the provider
/// reports the completed checkout through a webhook.
pub struct StartCheckoutHandler {
    pages: Arc<dyn PageRepository>,
    users: Arc<dyn UserRepository>,
    discount_codes: Arc<dyn DiscountCodeRepository>,
    gateways: PaymentGateways,
    catalog: PlanCatalog,
}

impl StartCheckoutHandler {
    pub fn new(
        pages: Arc<dyn PageRepository>,
        users: Arc<dyn UserRepository>,
        discount_codes: Arc<dyn DiscountCodeRepository>,
        gateways: PaymentGateways,
        catalog: PlanCatalog,
    ) -> Self {
        Self {
            pages,
            users,
            discount_codes,
            gateways,
            catalog,
        }
    }

    pub async fn handle(
        &self,
        cmd: StartCheckoutCommand,
    ) -> Result<StartCheckoutResult, BillingError> {
        // 1. Validate input
        if !cmd.plan.is_paid() {
            return Err(BillingError::invalid_input(
                "plan",
                "checkout requires a paid plan",
            ));
        }
        if cmd.success_url.trim().is_empty() {
            return Err(BillingError::invalid_input("success_url", "must not be empty"));
        }
        if cmd.cancel_url.trim().is_empty() {
            return Err(BillingError::invalid_input("cancel_url", "must not be empty"));
        }

        // 2. Load page and check ownership
        let page = self
            .pages
            .find_by_id(&cmd.page_id)
            .await?
            .ok_or_else(|| BillingError::not_found("page", cmd.page_id))?;

        if !page.is_owned_by(&cmd.user_id) {
            return Err(BillingError::forbidden("only the page owner can buy a plan"));
        }

        let state = page.state()?;
        if !matches!(
            state.phase(),
            SubscriptionPhase::Free | SubscriptionPhase::Cancelled
        ) {
            return Err(BillingError::conflict(format!(
                "page {} already has a subscription ({})",
                page.page_id, state
            )));
        }

        // 3. Price and optional discount
        let price = self
            .catalog
            .price_for(cmd.plan)
            .cloned()
            .ok_or_else(|| BillingError::invalid_input("plan", "no price for plan"))?;

        let discount = match cmd.discount_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => Some(self.apply_discount(code, cmd.plan, &price).await?),
            _ => None,
        };

        // 4. Provider customer
        let mut user = self
            .users
            .find_by_id(&cmd.user_id)
            .await?
            .ok_or_else(|| BillingError::not_found("user", &cmd.user_id))?;

        let gateway = self.gateways.primary();
        let provider = gateway.kind();
        let existing_customer_id = user.customer_id(provider).map(str::to_string);

        let customer_id = gateway
            .ensure_customer(CustomerRequest {
                user_id: user.id.clone(),
                email: user.email.clone(),
                existing_customer_id: existing_customer_id.clone(),
            })
            .await?;

        if existing_customer_id.as_deref() != Some(customer_id.as_str()) {
            user.set_customer_id(provider, customer_id.clone());
            self.users.update(&user).await?;
        }

        // 5. Checkout session
        let request = CheckoutRequest {
            page_id: page.page_id,
            user_id: cmd.user_id,
            customer_id,
            plan: cmd.plan,
            price: price.clone(),
            discount,
            success_url: cmd.success_url,
            cancel_url: cmd.cancel_url,
        };
        let amount_due = request.amount_due();
        let discount = request.discount.clone();

        let session = gateway.create_checkout(request).await?;

        tracing::info!(
            page_id = %page.page_id,
            plan = %cmd.plan,
            provider = %provider,
            session_id = %session.id,
            amount_due,
            discount_code = discount.as_ref().map(|d| d.code.as_str()),
            "Checkout session created"
        );

        Ok(StartCheckoutResult {
            provider,
            session_id: session.id,
            checkout_url: session.url,
            price,
            discount,
            amount_due,
        })
    }

    async fn apply_discount(
        &self,
        code: &str,
        plan: SubscriptionPlan,
        price: &PlanPrice,
    ) -> Result<AppliedDiscount, BillingError> {
        let lookup = NormalizedCode::for_lookup(code)?;
        let stored = self.discount_codes.find_by_code(&lookup).await?;

        match evaluate_discount_code(code, plan, price.amount, Timestamp::now(), stored.iter())? {
            DiscountDecision::Valid(applied) => Ok(applied),
            DiscountDecision::Invalid { reason } => {
                Err(BillingError::invalid_input("discount_code", reason.as_str()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryDiscountCodeRepository, InMemoryPageRepository, InMemoryUserRepository,
        MockPaymentGateway,
    };
    use crate::domain::account::User;
    use crate::domain::discount::{DiscountCode, DiscountType, NewDiscountCode};
    use crate::domain::subscription::{PageSubscription, SubscriptionState};
    use crate::ports::PaymentError;

    // ════════════════════════════════════════════════════════════════════════════
    // Fixtures
    // ════════════════════════════════════════════════════════════════════════════

    struct Fixture {
        pages: Arc<InMemoryPageRepository>,
        users: Arc<InMemoryUserRepository>,
        codes: Arc<InMemoryDiscountCodeRepository>,
        gateway: MockPaymentGateway,
        handler: StartCheckoutHandler,
        page: PageSubscription,
    }

    fn catalog() -> PlanCatalog {
        PlanCatalog {
            start: PlanPrice {
                amount: 500,
                currency: "EUR".to_string(),
            },
            pro: PlanPrice {
                amount: 1200,
                currency: "EUR".to_string(),
            },
        }
    }

    fn owner() -> UserId {
        UserId::new("owner").unwrap()
    }

    async fn fixture() -> Fixture {
        let pages = Arc::new(InMemoryPageRepository::new());
        let users = Arc::new(InMemoryUserRepository::new());
        let codes = Arc::new(InMemoryDiscountCodeRepository::new());
        let gateway = MockPaymentGateway::new(ProviderKind::Stripe);

        let page = PageSubscription::new_free(PageId::new(), owner());
        pages.insert(page.clone()).await;
        users.insert(User::new(owner(), "owner@example.com")).await;

        let handler = StartCheckoutHandler::new(
            pages.clone(),
            users.clone(),
            codes.clone(),
            PaymentGateways::single(Arc::new(gateway.clone())),
            catalog(),
        );

        Fixture {
            pages,
            users,
            codes,
            gateway,
            handler,
            page,
        }
    }

    fn command(page_id: PageId, plan: SubscriptionPlan) -> StartCheckoutCommand {
        StartCheckoutCommand {
            user_id: owner(),
            page_id,
            plan,
            discount_code: None,
            success_url: "https://app.example.com/ok".to_string(),
            cancel_url: "https://app.example.com/cancel".to_string(),
        }
    }

    async fn seed_code(codes: &InMemoryDiscountCodeRepository, text: &str, value: i64) {
        let code = DiscountCode::create(
            NewDiscountCode {
                code: text.to_string(),
                description: None,
                discount_type: DiscountType::Percentage,
                discount_value: value,
                applicable_plans: vec![SubscriptionPlan::Pro],
                max_redemptions: None,
                expires_at: None,
                active: true,
            },
            Timestamp::now(),
        )
        .unwrap();
        codes.insert(code).await;
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Tests
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn creates_checkout_at_full_price() {
        let f = fixture().await;

        let result = f
            .handler
            .handle(command(f.page.page_id, SubscriptionPlan::Pro))
            .await
            .unwrap();

        assert_eq!(result.provider, ProviderKind::Stripe);
        assert_eq!(result.amount_due, 1200);
        assert!(result.discount.is_none());
        assert!(!result.checkout_url.is_empty());

        let checkouts = f.gateway.checkouts();
        assert_eq!(checkouts.len(), 1);
        assert_eq!(checkouts[0].page_id, f.page.page_id);
        assert_eq!(checkouts[0].plan, SubscriptionPlan::Pro);
    }

    #[tokio::test]
    async fn checkout_does_not_change_the_page() {
        let f = fixture().await;

        f.handler
            .handle(command(f.page.page_id, SubscriptionPlan::Start))
            .await
            .unwrap();

        let stored = f.pages.get(&f.page.page_id).await.unwrap();
        assert_eq!(stored.state().unwrap(), SubscriptionState::Free);
        assert_eq!(stored.version, 0);
    }

    #[tokio::test]
    async fn new_customer_id_is_saved_on_user() {
        let f = fixture().await;

        f.handler
            .handle(command(f.page.page_id, SubscriptionPlan::Pro))
            .await
            .unwrap();

        let user = f.users.get(&owner()).await.unwrap();
        assert!(user.stripe_customer_id.is_some());
        assert!(user.mollie_customer_id.is_none());
    }

    #[tokio::test]
    async fn valid_discount_reduces_amount_due() {
        let f = fixture().await;
        seed_code(&f.codes, "HALF", 50).await;

        let mut cmd = command(f.page.page_id, SubscriptionPlan::Pro);
        cmd.discount_code = Some("half".to_string());
        let result = f.handler.handle(cmd).await.unwrap();

        assert_eq!(result.amount_due, 600);
        let discount = result.discount.unwrap();
        assert_eq!(discount.code, "HALF");
        assert_eq!(discount.effective_discount, 600);
    }

    #[tokio::test]
    async fn validation_does_not_redeem_the_code() {
        let f = fixture().await;
        seed_code(&f.codes, "HALF", 50).await;

        let mut cmd = command(f.page.page_id, SubscriptionPlan::Pro);
        cmd.discount_code = Some("HALF".to_string());
        f.handler.handle(cmd).await.unwrap();

        let stored = f
            .codes
            .find_by_code(&NormalizedCode::for_lookup("HALF").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.redemption_count, 0);
    }

    #[tokio::test]
    async fn blank_discount_code_is_ignored() {
        let f = fixture().await;

        let mut cmd = command(f.page.page_id, SubscriptionPlan::Pro);
        cmd.discount_code = Some("   ".to_string());
        let result = f.handler.handle(cmd).await.unwrap();

        assert!(result.discount.is_none());
    }

    #[tokio::test]
    async fn discount_for_other_plan_is_rejected() {
        let f = fixture().await;
        seed_code(&f.codes, "PROONLY", 20).await;

        let mut cmd = command(f.page.page_id, SubscriptionPlan::Start);
        cmd.discount_code = Some("PROONLY".to_string());
        let err = f.handler.handle(cmd).await.unwrap_err();

        assert_eq!(
            err,
            BillingError::invalid_input("discount_code", "not applicable to plan")
        );
        assert!(!f.gateway.was_called("create_checkout"));
    }

    #[tokio::test]
    async fn unknown_discount_code_is_rejected() {
        let f = fixture().await;

        let mut cmd = command(f.page.page_id, SubscriptionPlan::Pro);
        cmd.discount_code = Some("NOPE".to_string());
        let err = f.handler.handle(cmd).await.unwrap_err();

        assert_eq!(err, BillingError::invalid_input("discount_code", "not found"));
    }

    #[tokio::test]
    async fn free_plan_is_rejected() {
        let f = fixture().await;

        let err = f
            .handler
            .handle(command(f.page.page_id, SubscriptionPlan::Free))
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn non_owner_is_forbidden() {
        let f = fixture().await;

        let mut cmd = command(f.page.page_id, SubscriptionPlan::Pro);
        cmd.user_id = UserId::new("intruder").unwrap();
        let err = f.handler.handle(cmd).await.unwrap_err();

        assert!(matches!(err, BillingError::Forbidden(_)));
    }

    #[tokio::test]
    async fn missing_page_is_not_found() {
        let f = fixture().await;

        let err = f
            .handler
            .handle(command(PageId::new(), SubscriptionPlan::Pro))
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::NotFound { resource: "page", .. }));
    }

    #[tokio::test]
    async fn active_page_cannot_check_out_again() {
        let f = fixture().await;
        let mut page = f.page.clone();
        page.set_state(SubscriptionState::Active(SubscriptionPlan::Start));
        f.pages.insert(page).await;

        let err = f
            .handler
            .handle(command(f.page.page_id, SubscriptionPlan::Pro))
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::Conflict(_)));
    }

    #[tokio::test]
    async fn cancelled_page_can_buy_again() {
        let f = fixture().await;
        let mut page = f.page.clone();
        page.set_state(SubscriptionState::Cancelled(SubscriptionPlan::Start));
        f.pages.insert(page).await;

        let result = f
            .handler
            .handle(command(f.page.page_id, SubscriptionPlan::Pro))
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn provider_failure_is_surfaced() {
        let f = fixture().await;
        f.gateway
            .set_method_error("create_checkout", PaymentError::network("timeout"));

        let err = f
            .handler
            .handle(command(f.page.page_id, SubscriptionPlan::Pro))
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::Provider(_)));
    }
}
