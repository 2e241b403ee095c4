//! Biolink billing server.
//!
//! Loads `BIOLINK__*` configuration, connects to Postgres, wires the
//! configured payment gateways and serves the billing API until SIGINT or
//! SIGTERM.

use std::error::Error;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use biolink_billing::adapters::http::{billing_router, BillingAppState};
use biolink_billing::adapters::mollie::{MollieConfig, MolliePaymentAdapter};
use biolink_billing::adapters::postgres::{
    PostgresDiscountCodeRepository, PostgresPageRepository, PostgresUserRepository,
    PostgresWebhookEventRepository,
};
use biolink_billing::adapters::stripe::{StripeConfig, StripePaymentAdapter};
use biolink_billing::application::PaymentGateways;
use biolink_billing::config::{AppConfig, PaymentConfig, ServerConfig, ValidationError};
use biolink_billing::domain::subscription::ProviderKind;
use biolink_billing::ports::PaymentGateway;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    tracing::info!(
        environment = ?config.server.environment,
        provider = %config.payment.provider,
        "Starting biolink billing"
    );

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await?;
    tracing::info!("Database pool created");

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Migrations applied");
    }

    let state = build_state(pool, &config.payment)?;
    let app = with_middleware(billing_router(state), &config.server);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(server.log_level.as_str()));

    if server.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

fn build_state(pool: PgPool, payment: &PaymentConfig) -> Result<BillingAppState, ValidationError> {
    let catalog = payment.catalog();

    let mut gateways = PaymentGateways::single(build_gateway(payment.provider, payment)?);
    for other in [ProviderKind::Stripe, ProviderKind::Mollie] {
        if other != payment.provider && payment.is_enabled(other) {
            gateways = gateways.with(build_gateway(other, payment)?);
        }
    }

    Ok(BillingAppState {
        pages: Arc::new(PostgresPageRepository::new(pool.clone())),
        users: Arc::new(PostgresUserRepository::new(pool.clone())),
        discount_codes: Arc::new(PostgresDiscountCodeRepository::new(pool.clone())),
        webhook_events: Arc::new(PostgresWebhookEventRepository::new(pool)),
        gateways,
        catalog,
    })
}

fn build_gateway(
    kind: ProviderKind,
    payment: &PaymentConfig,
) -> Result<Arc<dyn PaymentGateway>, ValidationError> {
    let gateway: Arc<dyn PaymentGateway> = match kind {
        ProviderKind::Stripe => {
            let config = StripeConfig::new(
                payment.stripe_api_key.clone(),
                payment.stripe_webhook_secret.clone(),
            )
            .with_prices(
                payment.stripe_price_start.clone(),
                payment.stripe_price_pro.clone(),
            )
            .with_require_livemode(payment.stripe_require_livemode);
            Arc::new(StripePaymentAdapter::new(config))
        }
        ProviderKind::Mollie => {
            let webhook_url = payment
                .mollie_webhook_url()
                .ok_or(ValidationError::MissingRequired("PAYMENT__WEBHOOK_BASE_URL"))?;
            let config = MollieConfig::new(
                payment.mollie_api_key.clone(),
                webhook_url,
                payment.catalog(),
            );
            Arc::new(MolliePaymentAdapter::new(config))
        }
    };

    tracing::info!(provider = %kind, "Payment gateway configured");
    Ok(gateway)
}

fn with_middleware(app: Router, server: &ServerConfig) -> Router {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins)
    };

    let middleware = ServiceBuilder::new()
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(allow_origin)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TimeoutLayer::new(server.request_timeout()));

    app.layer(middleware)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
