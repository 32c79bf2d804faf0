//! Test utilities for integration testing (available with `test-utils` feature).

use crate::receipts::signing::ReceiptSigner;
use crate::types::{ConversationId, RecordId};
use crate::{AppState, Config, auth::OWNER_HEADER, build_router};
use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;

/// Build a test server over an already-migrated pool, with a fresh
/// ephemeral signing key.
pub async fn create_test_app(pool: PgPool) -> TestServer {
    create_test_app_with(pool, false).await
}

/// Like [`create_test_app`], but with empty receipts enabled.
pub async fn create_test_app_allowing_empty(pool: PgPool) -> TestServer {
    create_test_app_with(pool, true).await
}

async fn create_test_app_with(pool: PgPool, allow_empty: bool) -> TestServer {
    let mut config = Config::default();
    config.receipts.allow_empty = allow_empty;

    let state = AppState::builder()
        .db(pool)
        .config(config)
        .signer(Arc::new(ReceiptSigner::generate()))
        .build();

    TestServer::new(build_router(state)).expect("Failed to create test server")
}

/// Owner identity header for test requests.
pub fn auth_header(owner_id: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static(OWNER_HEADER),
        HeaderValue::from_str(owner_id).expect("owner id is not a valid header value"),
    )
}

/// Insert a conversation record with fixed token totals.
pub async fn seed_conversation(
    pool: &PgPool,
    owner_id: &str,
    alias: &str,
    total_cost: &str,
) -> ConversationId {
    sqlx::query_scalar::<_, ConversationId>(
        r#"
        INSERT INTO conversation_records
            (owner_id, model_alias, total_input_tokens, total_output_tokens, total_cost, message_count)
        VALUES ($1, $2, 120, 80, $3, 4)
        RETURNING id
        "#,
    )
    .bind(owner_id)
    .bind(alias)
    .bind(Decimal::from_str(total_cost).expect("Invalid decimal cost"))
    .fetch_one(pool)
    .await
    .expect("Failed to seed conversation record")
}

/// Insert a usage record with fixed token counts (100 in, 50 out).
pub async fn seed_usage(
    pool: &PgPool,
    owner_id: &str,
    provider: &str,
    model: &str,
    alias: Option<&str>,
    conversation_id: Option<ConversationId>,
    cost: &str,
) -> RecordId {
    sqlx::query_scalar::<_, RecordId>(
        r#"
        INSERT INTO usage_records
            (owner_id, conversation_id, provider, model, alias, origin,
             input_tokens, output_tokens, cached_input_tokens, cost)
        VALUES ($1, $2, $3, $4, $5, 'test', 100, 50, 0, $6)
        RETURNING id
        "#,
    )
    .bind(owner_id)
    .bind(conversation_id)
    .bind(provider)
    .bind(model)
    .bind(alias)
    .bind(Decimal::from_str(cost).expect("Invalid decimal cost"))
    .fetch_one(pool)
    .await
    .expect("Failed to seed usage record")
}
