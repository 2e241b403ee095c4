//! Integration tests for page subscription and webhook HTTP endpoints.
//!
//! Drives the full router over in-memory repositories and a scripted
//! payment gateway:
//! 1. Owner checks out, provider confirms, owner cancels
//! 2. Redelivered and out-of-order webhooks leave the page untouched
//! 3. Identity and ownership failures map to the right status codes

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use biolink_billing::adapters::http::{billing_router, BillingAppState, USER_ID_HEADER};
use biolink_billing::adapters::memory::{
    InMemoryDiscountCodeRepository, InMemoryPageRepository, InMemoryUserRepository,
    InMemoryWebhookEventRepository, MockPaymentGateway,
};
use biolink_billing::application::PaymentGateways;
use biolink_billing::domain::account::User;
use biolink_billing::domain::discount::{DiscountCode, DiscountType, NewDiscountCode, NormalizedCode};
use biolink_billing::domain::foundation::{PageId, Timestamp, UserId};
use biolink_billing::domain::subscription::{
    BillingEvent, PageSubscription, PlanCatalog, PlanPrice, ProviderKind, SubscriptionEvent,
    SubscriptionPlan, SubscriptionStatus,
};
use biolink_billing::ports::{
    DiscountCodeRepository, PageLocator, PaymentError, TranslatedEvent, WebhookTranslation,
};

// =============================================================================
// Test Infrastructure
// =============================================================================

const OWNER: &str = "owner-1";

struct Fixture {
    app: Router,
    pages: Arc<InMemoryPageRepository>,
    users: Arc<InMemoryUserRepository>,
    discount_codes: Arc<InMemoryDiscountCodeRepository>,
    webhook_events: Arc<InMemoryWebhookEventRepository>,
    gateway: MockPaymentGateway,
    page_id: PageId,
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

async fn fixture() -> Fixture {
    let pages = Arc::new(InMemoryPageRepository::new());
    let users = Arc::new(InMemoryUserRepository::new());
    let discount_codes = Arc::new(InMemoryDiscountCodeRepository::new());
    let webhook_events = Arc::new(InMemoryWebhookEventRepository::new());
    let gateway = MockPaymentGateway::new(ProviderKind::Stripe);

    let owner = UserId::new(OWNER).unwrap();
    users.insert(User::new(owner.clone(), "owner@example.com")).await;

    let page_id = PageId::new();
    pages.insert(PageSubscription::new_free(page_id, owner)).await;

    let state = BillingAppState {
        pages: pages.clone(),
        users: users.clone(),
        discount_codes: discount_codes.clone(),
        webhook_events: webhook_events.clone(),
        gateways: PaymentGateways::single(Arc::new(gateway.clone())),
        catalog: catalog(),
    };

    Fixture {
        app: billing_router(state),
        pages,
        users,
        discount_codes,
        webhook_events,
        gateway,
        page_id,
    }
}

async fn insert_code(repo: &InMemoryDiscountCodeRepository, code: &str, percent: i64) {
    let code = DiscountCode::create(
        NewDiscountCode {
            code: code.to_string(),
            description: None,
            discount_type: DiscountType::Percentage,
            discount_value: percent,
            applicable_plans: vec![SubscriptionPlan::Start, SubscriptionPlan::Pro],
            max_redemptions: Some(10),
            expires_at: None,
            active: true,
        },
        Timestamp::now(),
    )
    .unwrap();
    repo.insert(code).await;
}

fn checkout_completed(page_id: PageId, event_id: &str, sequence: i64) -> WebhookTranslation {
    WebhookTranslation::Event(TranslatedEvent {
        event_type: "checkout.session.completed".to_string(),
        locator: PageLocator::Page(page_id),
        event: SubscriptionEvent::new(
            event_id,
            sequence,
            ProviderKind::Stripe,
            BillingEvent::CheckoutCompleted {
                plan: SubscriptionPlan::Pro,
                provider_subscription_id: "sub_1".to_string(),
                checkout_session_id: Some("cs_1".to_string()),
                discount_code: Some("spring".to_string()),
            },
        ),
        payload: json!({ "id": event_id }),
        subscription_pending: false,
    })
}

fn payment_failed(event_id: &str, sequence: i64) -> WebhookTranslation {
    WebhookTranslation::Event(TranslatedEvent {
        event_type: "invoice.payment_failed".to_string(),
        locator: PageLocator::ProviderSubscription("sub_1".to_string()),
        event: SubscriptionEvent::new(
            event_id,
            sequence,
            ProviderKind::Stripe,
            BillingEvent::PaymentFailed,
        ),
        payload: json!({ "id": event_id }),
        subscription_pending: false,
    })
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn stripe_webhook() -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/webhooks/stripe")
        .header("Stripe-Signature", "t=1,v1=abc")
        .body(Body::from("{}"))
        .unwrap()
}

fn checkout_body() -> Value {
    json!({
        "plan": "pro",
        "discount_code": "spring",
        "success_url": "https://biolink.example/ok",
        "cancel_url": "https://biolink.example/cancel"
    })
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn new_page_reports_free_plan() {
    let f = fixture().await;

    let (status, body) = send(
        &f.app,
        get(&format!("/api/pages/{}/subscription", f.page_id), Some(OWNER)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["plan"], "free");
    assert_eq!(body["state"], "free");
    assert_eq!(body["has_access"], false);
}

#[tokio::test]
async fn checkout_applies_discount_and_stores_customer() {
    let f = fixture().await;
    insert_code(&f.discount_codes, "SPRING", 25).await;

    let (status, body) = send(
        &f.app,
        post_json(
            &format!("/api/pages/{}/subscription/checkout", f.page_id),
            Some(OWNER),
            checkout_body(),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["provider"], "stripe");
    assert_eq!(body["base_price"], 1200);
    assert_eq!(body["amount_due"], 900);
    assert_eq!(body["discount"]["code"], "SPRING");

    let owner = f.users.get(&UserId::new(OWNER).unwrap()).await.unwrap();
    assert!(owner.stripe_customer_id.is_some());
    assert_eq!(f.gateway.checkouts().len(), 1);

    // Checkout alone changes nothing until the provider confirms.
    let page = f.pages.get(&f.page_id).await.unwrap();
    assert_eq!(page.plan, SubscriptionPlan::Free);
}

#[tokio::test]
async fn confirmed_checkout_activates_page_and_redeems_discount() {
    let f = fixture().await;
    insert_code(&f.discount_codes, "SPRING", 25).await;
    f.gateway.push_webhook(checkout_completed(f.page_id, "evt_1", 100));

    let (status, body) = send(&f.app, stripe_webhook()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "applied");
    assert_eq!(body["plan"], "pro");
    assert_eq!(body["phase"], "active");

    let page = f.pages.get(&f.page_id).await.unwrap();
    assert_eq!(page.plan, SubscriptionPlan::Pro);
    assert_eq!(page.status, SubscriptionStatus::Active);
    assert_eq!(page.provider_subscription_id.as_deref(), Some("sub_1"));

    let code = f
        .discount_codes
        .find_by_code(&NormalizedCode::for_lookup("spring").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(code.redemption_count, 1);
    assert_eq!(f.webhook_events.len().await, 1);
}

#[tokio::test]
async fn redelivered_webhook_is_acknowledged_once() {
    let f = fixture().await;
    insert_code(&f.discount_codes, "SPRING", 25).await;
    f.gateway.push_webhook(checkout_completed(f.page_id, "evt_1", 100));
    f.gateway.push_webhook(checkout_completed(f.page_id, "evt_1", 100));

    send(&f.app, stripe_webhook()).await;
    let version = f.pages.get(&f.page_id).await.unwrap().version;

    let (status, body) = send(&f.app, stripe_webhook()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "already_processed");
    assert_eq!(f.pages.get(&f.page_id).await.unwrap().version, version);

    let code = f
        .discount_codes
        .find_by_code(&NormalizedCode::for_lookup("SPRING").unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(code.redemption_count, 1);
}

#[tokio::test]
async fn out_of_order_webhook_is_ignored() {
    let f = fixture().await;
    insert_code(&f.discount_codes, "SPRING", 25).await;
    f.gateway.push_webhook(checkout_completed(f.page_id, "evt_2", 200));
    f.gateway.push_webhook(payment_failed("evt_1", 100));

    send(&f.app, stripe_webhook()).await;
    let (status, body) = send(&f.app, stripe_webhook()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ignored");
    assert_eq!(body["reason"], "stale event");

    let page = f.pages.get(&f.page_id).await.unwrap();
    assert_eq!(page.status, SubscriptionStatus::Active);
}

#[tokio::test]
async fn failed_renewal_lapses_page() {
    let f = fixture().await;
    insert_code(&f.discount_codes, "SPRING", 25).await;
    f.gateway.push_webhook(checkout_completed(f.page_id, "evt_1", 100));
    f.gateway.push_webhook(payment_failed("evt_2", 200));

    send(&f.app, stripe_webhook()).await;
    let (status, body) = send(&f.app, stripe_webhook()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["phase"], "lapsed");

    let (_, view) = send(
        &f.app,
        get(&format!("/api/pages/{}/subscription", f.page_id), Some(OWNER)),
    )
    .await;
    assert_eq!(view["status"], "past_due");
    assert_eq!(view["state"], "lapsed");
}

#[tokio::test]
async fn owner_cancels_at_period_end() {
    let f = fixture().await;
    insert_code(&f.discount_codes, "SPRING", 25).await;
    f.gateway.push_webhook(checkout_completed(f.page_id, "evt_1", 100));
    send(&f.app, stripe_webhook()).await;

    let (status, body) = send(
        &f.app,
        post_json(
            &format!("/api/pages/{}/subscription/cancel", f.page_id),
            Some(OWNER),
            json!({}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "cancelling");
    assert_eq!(body["cancel_at_period_end"], true);
    assert_eq!(body["has_access"], true);

    let cancellations = f.gateway.cancellations();
    assert_eq!(cancellations.len(), 1);
    assert_eq!(cancellations[0].subscription_id, "sub_1");
    assert!(cancellations[0].at_period_end);
}

#[tokio::test]
async fn admin_sweep_ends_cancellation_after_period_end() {
    let f = fixture().await;
    let mut admin = User::new(UserId::new("admin-1").unwrap(), "admin@example.com");
    admin.is_admin = true;
    f.users.insert(admin).await;

    f.gateway.push_webhook(checkout_completed(f.page_id, "evt_1", 100));
    send(&f.app, stripe_webhook()).await;
    f.gateway.set_period_end(Timestamp::now().add_days(-1));

    let (_, cancelled) = send(
        &f.app,
        post_json(
            &format!("/api/pages/{}/subscription/cancel", f.page_id),
            Some(OWNER),
            json!({}),
        ),
    )
    .await;
    assert_eq!(cancelled["state"], "cancelling");
    assert!(cancelled["current_period_end"].is_string());

    let (forbidden, _) = send(
        &f.app,
        post_json("/api/admin/subscriptions/expire-cancelled", Some(OWNER), json!({})),
    )
    .await;
    assert_eq!(forbidden, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &f.app,
        post_json("/api/admin/subscriptions/expire-cancelled", Some("admin-1"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expired"], json!([f.page_id.to_string()]));
    assert_eq!(body["skipped"], json!([]));

    let (_, view) = send(
        &f.app,
        get(&format!("/api/pages/{}/subscription", f.page_id), Some(OWNER)),
    )
    .await;
    assert_eq!(view["state"], "cancelled");
    assert_eq!(view["has_access"], false);
}

#[tokio::test]
async fn admin_sweep_keeps_cancellation_inside_paid_period() {
    let f = fixture().await;
    let mut admin = User::new(UserId::new("admin-1").unwrap(), "admin@example.com");
    admin.is_admin = true;
    f.users.insert(admin).await;

    f.gateway.push_webhook(checkout_completed(f.page_id, "evt_1", 100));
    send(&f.app, stripe_webhook()).await;
    f.gateway.set_period_end(Timestamp::now().add_days(10));
    send(
        &f.app,
        post_json(
            &format!("/api/pages/{}/subscription/cancel", f.page_id),
            Some(OWNER),
            json!({}),
        ),
    )
    .await;

    let (_, body) = send(
        &f.app,
        post_json("/api/admin/subscriptions/expire-cancelled", Some("admin-1"), json!({})),
    )
    .await;

    assert_eq!(body["expired"], json!([]));
    let page = f.pages.get(&f.page_id).await.unwrap();
    assert!(page.cancel_at_period_end);
    assert_eq!(page.status, SubscriptionStatus::Active);
}

#[tokio::test]
async fn checkout_on_active_page_conflicts() {
    let f = fixture().await;
    insert_code(&f.discount_codes, "SPRING", 25).await;
    f.gateway.push_webhook(checkout_completed(f.page_id, "evt_1", 100));
    send(&f.app, stripe_webhook()).await;

    let (status, body) = send(
        &f.app,
        post_json(
            &format!("/api/pages/{}/subscription/checkout", f.page_id),
            Some(OWNER),
            checkout_body(),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
    assert!(!f.gateway.was_called("create_checkout"));
}

#[tokio::test]
async fn cancelling_free_page_is_invalid_transition() {
    let f = fixture().await;

    let (status, body) = send(
        &f.app,
        post_json(
            &format!("/api/pages/{}/subscription/cancel", f.page_id),
            Some(OWNER),
            json!({ "immediate": true }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_TRANSITION");
    assert!(!f.gateway.was_called("cancel_subscription"));
}

// =============================================================================
// Failure Mapping
// =============================================================================

#[tokio::test]
async fn missing_identity_is_unauthorized() {
    let f = fixture().await;

    let (status, body) = send(
        &f.app,
        get(&format!("/api/pages/{}/subscription", f.page_id), None),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "AUTHENTICATION_REQUIRED");
}

#[tokio::test]
async fn other_users_page_is_forbidden() {
    let f = fixture().await;

    let (status, _) = send(
        &f.app,
        get(
            &format!("/api/pages/{}/subscription", f.page_id),
            Some("intruder"),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn malformed_page_id_is_bad_request() {
    let f = fixture().await;

    let (status, body) = send(&f.app, get("/api/pages/not-a-uuid/subscription", Some(OWNER))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_INPUT");
}

#[tokio::test]
async fn unknown_page_is_not_found() {
    let f = fixture().await;

    let (status, _) = send(
        &f.app,
        get(&format!("/api/pages/{}/subscription", PageId::new()), Some(OWNER)),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rejected_signature_is_unauthorized_and_not_logged() {
    let f = fixture().await;
    f.gateway.set_method_error(
        "translate_webhook",
        PaymentError::invalid_webhook("signature mismatch"),
    );

    let (status, body) = send(&f.app, stripe_webhook()).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_WEBHOOK_SIGNATURE");
    assert_eq!(f.webhook_events.len().await, 0);
}

#[tokio::test]
async fn webhook_for_unconfigured_provider_is_bad_gateway() {
    let f = fixture().await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/webhooks/mollie")
        .body(Body::from("id=tr_123"))
        .unwrap();
    let (status, body) = send(&f.app, request).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "PROVIDER_ERROR");
}

// =============================================================================
// Deprecated Route
// =============================================================================

#[tokio::test]
async fn legacy_plan_update_is_gone_and_writes_nothing() {
    let f = fixture().await;
    let before = f.users.get(&UserId::new(OWNER).unwrap()).await.unwrap();

    let (status, body) = send(
        &f.app,
        post_json(
            "/api/subscription/update",
            Some(OWNER),
            json!({ "email": "owner@example.com", "plan": "pro" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["code"], "GONE");
    assert_eq!(body["replacement"], "/api/pages/{page_id}/subscription/checkout");
    assert_eq!(f.users.get(&UserId::new(OWNER).unwrap()).await.unwrap(), before);
    assert_eq!(f.pages.get(&f.page_id).await.unwrap().plan, SubscriptionPlan::Free);
}

#[tokio::test]
async fn health_check_responds() {
    let f = fixture().await;

    let response = f.app.clone().oneshot(get("/health", None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
