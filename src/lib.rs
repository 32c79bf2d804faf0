//! # vouch: Signed Usage Receipts for LLM Applications
//!
//! `vouch` issues cryptographically signed receipts over LLM usage logs. A receipt
//! certifies a set of usage and conversation records: it carries their aggregated
//! token and cost totals, an issuance timestamp, and an Ed25519 signature over a
//! canonical JSON rendering of its content. Anyone holding the service's public key
//! can verify a receipt offline, long after it was issued.
//!
//! ## Overview
//!
//! Applications that meter LLM usage accumulate two kinds of records: raw usage
//! records (one per model call, with provider, model, token counts, and cost) and
//! conversation records (roll-ups of a multi-turn exchange). Billing disputes,
//! audits, and customer-facing invoices all need a tamper-evident statement of
//! "these records, these totals, at this time". That statement is a receipt.
//!
//! A receipt is generated on demand over a *selection* of records. Exactly one
//! selection mode is given per request: a single conversation, an explicit list of
//! record ids, an inclusive time range, or everything never certified before.
//! The selected records are aggregated deterministically (fixed-point cost sums,
//! sorted breakdown keys), serialized to canonical JSON, and signed. The receipt
//! and a ledger of which records it covers are stored atomically; the ledger is
//! what makes "never certified before" meaningful.
//!
//! ## Architecture
//!
//! The service is built on [Axum](https://github.com/tokio-rs/axum) for the HTTP
//! layer and uses PostgreSQL for all persistence.
//!
//! The **receipt core** ([`receipts`]) is pure: selection validation, aggregation,
//! canonical JSON, and Ed25519 signing have no knowledge of HTTP or SQL, and are
//! tested in isolation.
//!
//! The **database layer** ([`db`]) wraps connections in small repository structs.
//! Usage and conversation records are flattened into one uniform projection, so
//! every selection mode yields the same ordered record shape.
//!
//! The **API layer** ([`api`]) exposes the REST surface at `/api/v1/*`: receipt
//! generation, preview, verification, listings, and the public verification key.
//! Owners are identified by the opaque `X-API-Key` header ([`auth`]); all data is
//! partitioned by owner.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use vouch::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = vouch::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     vouch::telemetry::init_telemetry()?;
//!
//!     let app = Application::new(config).await?;
//!
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Database Setup
//!
//! The application requires a PostgreSQL database and automatically runs migrations
//! on startup:
//!
//! ```no_run
//! # use sqlx::PgPool;
//! # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
//! vouch::migrator().run(&pool).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
mod openapi;
pub mod receipts;
pub mod telemetry;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::openapi::ApiDoc;
use crate::receipts::signing::ReceiptSigner;
use axum::{
    Router,
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use sqlx::{Executor, PgPool};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, info};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{ConversationId, OwnerId, ReceiptId, RecordId};

/// Application state shared across all request handlers.
///
/// # Fields
///
/// - `db`: PostgreSQL connection pool
/// - `config`: Application configuration loaded from environment/files
/// - `signer`: The service's Ed25519 signing key
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub signer: Arc<ReceiptSigner>,
}

/// Get the vouch database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Connect to PostgreSQL, apply pool settings, and run migrations.
async fn setup_database(config: &Config) -> anyhow::Result<PgPool> {
    let statement_timeout_ms = config.database.pool.statement_timeout_ms;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database.pool.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.pool.acquire_timeout_secs))
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                // Bound every statement so a wedged store surfaces as
                // store_timeout instead of a hung request.
                conn.execute(format!("SET statement_timeout = {statement_timeout_ms}").as_str())
                    .await?;
                Ok(())
            })
        })
        .connect(&config.database.url)
        .await?;

    migrator().run(&pool).await?;

    Ok(pool)
}

/// Assemble the service router.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/receipts/generate", post(api::handlers::receipts::generate_receipt))
        .route("/receipts/preview", post(api::handlers::receipts::preview_receipt))
        .route("/receipts", get(api::handlers::receipts::list_receipts))
        .route("/receipts/public-key", get(api::handlers::receipts::get_public_key))
        .route("/receipts/{receipt_id}", get(api::handlers::receipts::get_receipt))
        .route("/receipts/{receipt_id}/verify", get(api::handlers::receipts::verify_receipt))
        .route(
            "/receipts/{receipt_id}/records",
            get(api::handlers::receipts::list_receipt_records),
        )
        .route(
            "/records/uncertified",
            get(api::handlers::records::list_uncertified_records),
        )
        .with_state(state);

    Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}

/// Main application struct that owns all resources and lifecycle.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] connects to the database, runs migrations,
///    and builds the signing key from configuration
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling
///    requests
/// 3. **Shutdown**: When the shutdown signal resolves, the server drains and the
///    pool is closed
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let pool = setup_database(&config).await?;

        let signer = Arc::new(config.signing.build_signer()?);
        info!(
            public_key = %signer.verifier().public_key_base64url(),
            "Receipt signing key loaded"
        );

        let state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .signer(signer)
            .build();

        let router = build_router(state);

        Ok(Self { router, config, pool })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Receipt service listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        Ok(())
    }
}
