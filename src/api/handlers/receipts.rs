use crate::{
    api::models::{
        pagination::{PaginatedResponse, Pagination},
        receipts::{
            GenerateReceiptRequest, GenerateReceiptResponse, PreviewReceiptResponse,
            PublicKeyResponse, VerifyReceiptResponse,
        },
        records::CertifiableRecordResponse,
    },
    auth::CurrentOwner,
    db::handlers::{Receipts, Records},
    errors::{Error, Result},
    receipts::{
        aggregate, selector::Selection, signing::SIGNATURE_ALGORITHM, CertifiableRecord, Receipt,
        VerifyError,
    },
    types::{RecordId, RecordKind},
    AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use std::collections::HashSet;

/// Resolve a validated selection into its ordered record set.
///
/// The second element is the shortfall for explicit-id mode: requested ids
/// that don't exist or belong to another owner. Other modes never miss.
async fn resolve_selection(
    repo: &mut Records<'_>,
    owner_id: &str,
    selection: &Selection,
) -> Result<(Vec<CertifiableRecord>, i64)> {
    match selection {
        Selection::Conversation(id) => {
            let records = repo.select_conversation(owner_id, *id).await?;
            if records.is_empty() {
                return Err(Error::NotFound {
                    resource: "Conversation".to_string(),
                    id: id.to_string(),
                });
            }
            Ok((records, 0))
        }
        Selection::TimeRange { start, end } => {
            Ok((repo.select_time_range(owner_id, *start, *end).await?, 0))
        }
        Selection::Records(ids) => {
            let records = repo.select_by_ids(owner_id, ids).await?;
            let requested: HashSet<RecordId> = ids.iter().copied().collect();
            let missing = requested.len() as i64 - records.len() as i64;
            Ok((records, missing))
        }
        Selection::Uncertified => Ok((repo.select_uncertified(owner_id).await?, 0)),
    }
}

/// Generate and store a signed receipt
#[utoipa::path(
    post,
    path = "/receipts/generate",
    tag = "receipts",
    summary = "Generate a signed receipt",
    description = "Select records with exactly one selection mode, aggregate them, sign the \
                   result, and record which records the receipt certifies",
    responses(
        (status = 201, description = "Receipt generated and stored", body = GenerateReceiptResponse),
        (status = 400, description = "Ambiguous selection, invalid range, or empty selection"),
        (status = 401, description = "Missing owner identity"),
        (status = 404, description = "Conversation not found"),
        (status = 503, description = "Store unavailable"),
    ),
    security(
        ("X-API-Key" = [])
    )
)]
pub async fn generate_receipt(
    State(state): State<AppState>,
    owner: CurrentOwner,
    Json(payload): Json<GenerateReceiptRequest>,
) -> Result<(StatusCode, Json<GenerateReceiptResponse>)> {
    let selection = Selection::try_new(
        payload.conversation_id,
        payload.start_date,
        payload.end_date,
        payload.record_ids,
        payload.since_last_receipt,
    )?;

    // Selection, signing, and the ledger write share one transaction, so a
    // receipt and its links land together or not at all.
    let mut tx = state.db.begin().await.map_err(|e| Error::Database(e.into()))?;

    let (records, missing_count) = {
        let mut repo = Records::new(&mut tx);
        resolve_selection(&mut repo, &owner.id, &selection).await?
    };

    if records.is_empty() && !state.config.receipts.allow_empty {
        return Err(Error::NoRecords);
    }

    let receipt = Receipt::issue(
        &owner.id,
        &records,
        selection.single_eligible(),
        payload.description,
        payload.tags,
        &state.signer,
    )
    .map_err(|e| anyhow::anyhow!("receipt content does not canonicalize: {e}"))?;

    let links: Vec<(RecordId, RecordKind)> = records.iter().map(|r| (r.id, r.kind)).collect();
    let stored = Receipts::new(&mut tx).store(&receipt, &links).await?;

    tx.commit().await.map_err(|e| Error::Database(e.into()))?;

    tracing::info!(
        "Issued {} receipt {} certifying {} records for owner {}",
        stored.kind,
        stored.receipt_id,
        records.len(),
        owner.id
    );

    Ok((
        StatusCode::CREATED,
        Json(GenerateReceiptResponse {
            receipt: stored,
            certified_count: records.len() as i64,
            missing_count,
        }),
    ))
}

/// Preview what a receipt would certify
#[utoipa::path(
    post,
    path = "/receipts/preview",
    tag = "receipts",
    summary = "Preview a receipt without generating it",
    description = "Resolve and aggregate a selection exactly as generation would, but sign \
                   nothing and store nothing",
    responses(
        (status = 200, description = "Aggregated view of the selection", body = PreviewReceiptResponse),
        (status = 400, description = "Ambiguous selection, invalid range, or empty selection"),
        (status = 401, description = "Missing owner identity"),
        (status = 404, description = "Conversation not found"),
    ),
    security(
        ("X-API-Key" = [])
    )
)]
pub async fn preview_receipt(
    State(state): State<AppState>,
    owner: CurrentOwner,
    Json(payload): Json<GenerateReceiptRequest>,
) -> Result<Json<PreviewReceiptResponse>> {
    let selection = Selection::try_new(
        payload.conversation_id,
        payload.start_date,
        payload.end_date,
        payload.record_ids,
        payload.since_last_receipt,
    )?;

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Records::new(&mut pool_conn);
    let (records, missing_count) = resolve_selection(&mut repo, &owner.id, &selection).await?;

    if records.is_empty() && !state.config.receipts.allow_empty {
        return Err(Error::NoRecords);
    }

    let (kind, _) = Receipt::content_for(&records, selection.single_eligible());

    Ok(Json(PreviewReceiptResponse {
        kind,
        summary: aggregate::summarize(&records),
        certified_count: records.len() as i64,
        missing_count,
    }))
}

/// List receipts for the current owner
#[utoipa::path(
    get,
    path = "/receipts",
    tag = "receipts",
    summary = "List receipts",
    description = "Page through the current owner's receipts, newest first",
    params(
        Pagination
    ),
    responses(
        (status = 200, description = "Page of receipts", body = PaginatedResponse<Receipt>),
        (status = 401, description = "Missing owner identity"),
    ),
    security(
        ("X-API-Key" = [])
    )
)]
pub async fn list_receipts(
    State(state): State<AppState>,
    owner: CurrentOwner,
    Query(pagination): Query<Pagination>,
) -> Result<Json<PaginatedResponse<Receipt>>> {
    let (skip, limit) = pagination.params();

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Receipts::new(&mut pool_conn);

    let receipts = repo.list(&owner.id, skip, limit).await?;
    let total_count = repo.count(&owner.id).await?;

    Ok(Json(PaginatedResponse::new(receipts, total_count, skip, limit)))
}

/// Get a single receipt
#[utoipa::path(
    get,
    path = "/receipts/{receipt_id}",
    tag = "receipts",
    summary = "Get a receipt",
    params(
        ("receipt_id" = String, Path, description = "Receipt ID"),
    ),
    responses(
        (status = 200, description = "The receipt", body = Receipt),
        (status = 401, description = "Missing owner identity"),
        (status = 404, description = "Receipt not found"),
    ),
    security(
        ("X-API-Key" = [])
    )
)]
pub async fn get_receipt(
    State(state): State<AppState>,
    owner: CurrentOwner,
    Path(receipt_id): Path<String>,
) -> Result<Json<Receipt>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Receipts::new(&mut pool_conn);

    let receipt = repo
        .get(&owner.id, &receipt_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Receipt".to_string(),
            id: receipt_id.clone(),
        })?;

    Ok(Json(receipt))
}

/// Verify a stored receipt's signature
#[utoipa::path(
    get,
    path = "/receipts/{receipt_id}/verify",
    tag = "receipts",
    summary = "Verify a receipt",
    description = "Rebuild the receipt's canonical content from storage and check its Ed25519 \
                   signature against the service key",
    params(
        ("receipt_id" = String, Path, description = "Receipt ID"),
    ),
    responses(
        (status = 200, description = "Signature verified", body = VerifyReceiptResponse),
        (status = 400, description = "Signature does not match the stored content"),
        (status = 401, description = "Missing owner identity"),
        (status = 404, description = "Receipt not found"),
    ),
    security(
        ("X-API-Key" = [])
    )
)]
pub async fn verify_receipt(
    State(state): State<AppState>,
    owner: CurrentOwner,
    Path(receipt_id): Path<String>,
) -> Result<Json<VerifyReceiptResponse>> {
    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Receipts::new(&mut pool_conn);

    let receipt = repo
        .get(&owner.id, &receipt_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            resource: "Receipt".to_string(),
            id: receipt_id.clone(),
        })?;

    receipt
        .verify_with(&state.signer.verifier())
        .map_err(|err| match err {
            VerifyError::Signature(_) => Error::InvalidSignature {
                receipt_id: receipt.receipt_id.clone(),
            },
            VerifyError::Canonical(_) => Error::Internal {
                operation: "canonicalize stored receipt".to_string(),
            },
        })?;

    Ok(Json(VerifyReceiptResponse {
        receipt_id: receipt.receipt_id,
        verified: true,
    }))
}

/// List the records a receipt certifies
#[utoipa::path(
    get,
    path = "/receipts/{receipt_id}/records",
    tag = "receipts",
    summary = "List certified records",
    description = "Page through the records a receipt certifies, in the order they were \
                   aggregated",
    params(
        ("receipt_id" = String, Path, description = "Receipt ID"),
        Pagination
    ),
    responses(
        (status = 200, description = "Page of certified records", body = PaginatedResponse<CertifiableRecordResponse>),
        (status = 401, description = "Missing owner identity"),
        (status = 404, description = "Receipt not found"),
    ),
    security(
        ("X-API-Key" = [])
    )
)]
pub async fn list_receipt_records(
    State(state): State<AppState>,
    owner: CurrentOwner,
    Path(receipt_id): Path<String>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<PaginatedResponse<CertifiableRecordResponse>>> {
    let (skip, limit) = pagination.params();

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Receipts::new(&mut pool_conn);

    // Ownership check first, so a foreign receipt id 404s instead of
    // leaking an empty page.
    if repo.get(&owner.id, &receipt_id).await?.is_none() {
        return Err(Error::NotFound {
            resource: "Receipt".to_string(),
            id: receipt_id.clone(),
        });
    }

    let records = repo.records_for(&receipt_id, skip, limit).await?;
    let total_count = repo.count_records_for(&receipt_id).await?;

    Ok(Json(PaginatedResponse::new(
        records.into_iter().map(CertifiableRecordResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}

/// Get the service's public verification key
#[utoipa::path(
    get,
    path = "/receipts/public-key",
    tag = "receipts",
    summary = "Get the verification key",
    description = "The Ed25519 public key receipts are signed with, for offline verification",
    responses(
        (status = 200, description = "Verification key", body = PublicKeyResponse),
    )
)]
pub async fn get_public_key(State(state): State<AppState>) -> Json<PublicKeyResponse> {
    Json(PublicKeyResponse {
        algorithm: SIGNATURE_ALGORITHM.to_string(),
        public_key: state.signer.verifier().public_key_base64url(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receipts::ReceiptKind;
    use crate::test_utils::{
        auth_header, create_test_app, create_test_app_allowing_empty, seed_conversation,
        seed_usage,
    };
    use rust_decimal::Decimal;
    use serde_json::{json, Value};
    use sqlx::PgPool;
    use std::str::FromStr;
    use uuid::Uuid;

    const OWNER: &str = "owner-alpha";
    const OTHER_OWNER: &str = "owner-beta";

    #[sqlx::test]
    #[test_log::test]
    async fn generate_conversation_receipt_is_single(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let conversation = seed_conversation(&pool, OWNER, "summarizer", "0.05").await;
        seed_usage(&pool, OWNER, "openai", "gpt-4o", None, Some(conversation), "0.02").await;
        seed_usage(&pool, OWNER, "openai", "gpt-4o", None, Some(conversation), "0.03").await;

        let (name, value) = auth_header(OWNER);
        let response = app
            .post("/api/v1/receipts/generate")
            .add_header(name, value)
            .json(&json!({ "conversation_id": conversation }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: GenerateReceiptResponse = response.json();
        assert_eq!(body.certified_count, 3);
        assert_eq!(body.missing_count, 0);
        assert_eq!(body.receipt.kind, ReceiptKind::Single);
        assert!(body.receipt.receipt_id.starts_with("rcpt_"));
        assert!(body.receipt.signature.starts_with("ed25519:"));
        assert!(body.receipt.stored_at.is_some());

        match &body.receipt.content {
            crate::receipts::ReceiptContent::Single { provider, model, cost, .. } => {
                assert_eq!(provider, "openai");
                assert_eq!(model, "gpt-4o");
                // Sum of usage costs only; the conversation roll-up is not
                // added on top.
                assert_eq!(*cost, Decimal::from_str("0.05").unwrap());
            }
            other => panic!("expected single content, got {other:?}"),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn conversation_spanning_models_falls_back_to_batch(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let conversation = seed_conversation(&pool, OWNER, "router", "0.09").await;
        seed_usage(&pool, OWNER, "openai", "gpt-4o", None, Some(conversation), "0.04").await;
        seed_usage(&pool, OWNER, "anthropic", "claude-3-5-sonnet", None, Some(conversation), "0.05")
            .await;

        let (name, value) = auth_header(OWNER);
        let response = app
            .post("/api/v1/receipts/generate")
            .add_header(name, value)
            .json(&json!({ "conversation_id": conversation }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: GenerateReceiptResponse = response.json();
        assert_eq!(body.receipt.kind, ReceiptKind::Batch);
        match &body.receipt.content {
            crate::receipts::ReceiptContent::Batch { batch_summary } => {
                assert_eq!(batch_summary.total_conversations, 1);
                assert_eq!(batch_summary.by_model.len(), 2);
            }
            other => panic!("expected batch content, got {other:?}"),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn selection_modes_are_mutually_exclusive(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (name, value) = auth_header(OWNER);

        // No mode at all.
        let response = app
            .post("/api/v1/receipts/generate")
            .add_header(name.clone(), value.clone())
            .json(&json!({}))
            .await;
        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["kind"], "ambiguous_selection");

        // Two modes at once.
        let response = app
            .post("/api/v1/receipts/generate")
            .add_header(name, value)
            .json(&json!({
                "conversation_id": Uuid::new_v4(),
                "since_last_receipt": true,
            }))
            .await;
        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["kind"], "ambiguous_selection");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn inverted_range_is_rejected_before_any_query(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (name, value) = auth_header(OWNER);

        let response = app
            .post("/api/v1/receipts/generate")
            .add_header(name, value)
            .json(&json!({
                "start_date": "2025-06-01T00:00:00Z",
                "end_date": "2025-01-01T00:00:00Z",
            }))
            .await;

        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["kind"], "invalid_range");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn empty_selection_is_no_records_by_default(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (name, value) = auth_header(OWNER);

        let response = app
            .post("/api/v1/receipts/generate")
            .add_header(name, value)
            .json(&json!({
                "start_date": "1990-01-01T00:00:00Z",
                "end_date": "1990-12-31T00:00:00Z",
            }))
            .await;

        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["kind"], "no_records");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn empty_receipts_can_be_enabled(pool: PgPool) {
        let app = create_test_app_allowing_empty(pool.clone()).await;
        let (name, value) = auth_header(OWNER);

        let response = app
            .post("/api/v1/receipts/generate")
            .add_header(name, value)
            .json(&json!({
                "start_date": "1990-01-01T00:00:00Z",
                "end_date": "1990-12-31T00:00:00Z",
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: GenerateReceiptResponse = response.json();
        assert_eq!(body.certified_count, 0);
        assert_eq!(body.receipt.kind, ReceiptKind::Batch);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn explicit_ids_tolerate_missing_records(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let first = seed_usage(&pool, OWNER, "openai", "gpt-4o", None, None, "0.01").await;
        let second = seed_usage(&pool, OWNER, "openai", "gpt-4o-mini", None, None, "0.02").await;
        let foreign = seed_usage(&pool, OTHER_OWNER, "openai", "gpt-4o", None, None, "9.99").await;

        let (name, value) = auth_header(OWNER);
        let response = app
            .post("/api/v1/receipts/generate")
            .add_header(name, value)
            .json(&json!({ "record_ids": [first, second, foreign, Uuid::new_v4()] }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: GenerateReceiptResponse = response.json();
        // Another owner's record and an unknown id are both just absent.
        assert_eq!(body.certified_count, 2);
        assert_eq!(body.missing_count, 2);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn explicit_ids_accept_conversation_records(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let standalone = seed_usage(&pool, OWNER, "openai", "gpt-4o", None, None, "0.01").await;
        let conversation = seed_conversation(&pool, OWNER, "summarizer", "0.05").await;

        let (name, value) = auth_header(OWNER);
        let response = app
            .post("/api/v1/receipts/generate")
            .add_header(name, value)
            .json(&json!({ "record_ids": [standalone, conversation] }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: GenerateReceiptResponse = response.json();
        assert_eq!(body.certified_count, 2);
        assert_eq!(body.missing_count, 0);
        match &body.receipt.content {
            crate::receipts::ReceiptContent::Batch { batch_summary } => {
                assert_eq!(batch_summary.total_conversations, 1);
                assert_eq!(batch_summary.record_ids, vec![standalone]);
                assert_eq!(batch_summary.conversation_ids, vec![conversation]);
            }
            other => panic!("expected batch content, got {other:?}"),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn unknown_conversation_is_not_found(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (name, value) = auth_header(OWNER);

        let response = app
            .post("/api/v1/receipts/generate")
            .add_header(name, value)
            .json(&json!({ "conversation_id": Uuid::new_v4() }))
            .await;

        response.assert_status_not_found();
        let body: Value = response.json();
        assert_eq!(body["kind"], "not_found");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn since_last_receipt_skips_already_certified_records(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        seed_usage(&pool, OWNER, "openai", "gpt-4o", None, None, "0.01").await;
        seed_usage(&pool, OWNER, "openai", "gpt-4o", None, None, "0.02").await;

        let (name, value) = auth_header(OWNER);
        let response = app
            .post("/api/v1/receipts/generate")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "since_last_receipt": true }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: GenerateReceiptResponse = response.json();
        assert_eq!(body.certified_count, 2);

        // With everything certified, an immediate re-run finds nothing.
        let response = app
            .post("/api/v1/receipts/generate")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "since_last_receipt": true }))
            .await;
        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["kind"], "no_records");

        // New traffic after the receipt.
        seed_usage(&pool, OWNER, "openai", "gpt-4o", None, None, "0.04").await;

        let response = app
            .post("/api/v1/receipts/generate")
            .add_header(name, value)
            .json(&json!({ "since_last_receipt": true }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: GenerateReceiptResponse = response.json();
        assert_eq!(body.certified_count, 1);
        match &body.receipt.content {
            crate::receipts::ReceiptContent::Batch { batch_summary } => {
                assert_eq!(batch_summary.total_cost, Decimal::from_str("0.04").unwrap());
            }
            other => panic!("expected batch content, got {other:?}"),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn explicit_ids_may_recertify_records(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let record = seed_usage(&pool, OWNER, "openai", "gpt-4o", None, None, "0.01").await;

        let (name, value) = auth_header(OWNER);
        let first = app
            .post("/api/v1/receipts/generate")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "record_ids": [record] }))
            .await;
        first.assert_status(StatusCode::CREATED);

        let second = app
            .post("/api/v1/receipts/generate")
            .add_header(name, value)
            .json(&json!({ "record_ids": [record] }))
            .await;
        second.assert_status(StatusCode::CREATED);

        let first_body: GenerateReceiptResponse = first.json();
        let second_body: GenerateReceiptResponse = second.json();
        assert_ne!(first_body.receipt.receipt_id, second_body.receipt.receipt_id);
        assert_eq!(second_body.certified_count, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn range_mode_counts_attached_usage_through_its_conversation(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let conversation = seed_conversation(&pool, OWNER, "summarizer", "0.10").await;
        seed_usage(&pool, OWNER, "openai", "gpt-4o", None, Some(conversation), "0.10").await;
        seed_usage(&pool, OWNER, "openai", "gpt-4o", None, None, "0.05").await;

        let (name, value) = auth_header(OWNER);
        let response = app
            .post("/api/v1/receipts/generate")
            .add_header(name, value)
            .json(&json!({
                "start_date": "2000-01-01T00:00:00Z",
                "end_date": "2100-01-01T00:00:00Z",
            }))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: GenerateReceiptResponse = response.json();
        // The conversation and the standalone record; attached usage is
        // represented by its conversation roll-up.
        assert_eq!(body.certified_count, 2);
        match &body.receipt.content {
            crate::receipts::ReceiptContent::Batch { batch_summary } => {
                assert_eq!(batch_summary.total_records, 2);
                assert_eq!(batch_summary.total_conversations, 1);
                assert_eq!(batch_summary.total_cost, Decimal::from_str("0.15").unwrap());
            }
            other => panic!("expected batch content, got {other:?}"),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn preview_matches_generation_without_persisting(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let conversation = seed_conversation(&pool, OWNER, "summarizer", "0.05").await;
        seed_usage(&pool, OWNER, "openai", "gpt-4o", None, Some(conversation), "0.05").await;

        let (name, value) = auth_header(OWNER);
        let response = app
            .post("/api/v1/receipts/preview")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "conversation_id": conversation }))
            .await;

        response.assert_status_ok();
        let preview: PreviewReceiptResponse = response.json();
        assert_eq!(preview.kind, ReceiptKind::Single);
        assert_eq!(preview.certified_count, 2);

        // Nothing was stored, so everything is still uncertified.
        let response = app
            .post("/api/v1/receipts/generate")
            .add_header(name, value)
            .json(&json!({ "since_last_receipt": true }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: GenerateReceiptResponse = response.json();
        assert_eq!(body.certified_count, 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn stored_receipts_verify(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let record = seed_usage(&pool, OWNER, "openai", "gpt-4o", None, None, "0.01").await;

        let (name, value) = auth_header(OWNER);
        let response = app
            .post("/api/v1/receipts/generate")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "record_ids": [record] }))
            .await;
        let body: GenerateReceiptResponse = response.json();

        let response = app
            .get(&format!("/api/v1/receipts/{}/verify", body.receipt.receipt_id))
            .add_header(name, value)
            .await;

        response.assert_status_ok();
        let verified: VerifyReceiptResponse = response.json();
        assert!(verified.verified);
        assert_eq!(verified.receipt_id, body.receipt.receipt_id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn tampered_receipts_fail_verification(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let record = seed_usage(&pool, OWNER, "openai", "gpt-4o", None, None, "0.01").await;

        let (name, value) = auth_header(OWNER);
        let response = app
            .post("/api/v1/receipts/generate")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "record_ids": [record], "description": "march invoice" }))
            .await;
        let body: GenerateReceiptResponse = response.json();

        sqlx::query("UPDATE receipts SET description = 'april invoice' WHERE receipt_id = $1")
            .bind(&body.receipt.receipt_id)
            .execute(&pool)
            .await
            .expect("Failed to tamper with receipt");

        let response = app
            .get(&format!("/api/v1/receipts/{}/verify", body.receipt.receipt_id))
            .add_header(name, value)
            .await;

        response.assert_status_bad_request();
        let error: Value = response.json();
        assert_eq!(error["kind"], "invalid_signature");
    }

    #[sqlx::test]
    #[test_log::test]
    async fn foreign_receipts_are_indistinguishable_from_absent_ones(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let record = seed_usage(&pool, OWNER, "openai", "gpt-4o", None, None, "0.01").await;

        let (name, value) = auth_header(OWNER);
        let response = app
            .post("/api/v1/receipts/generate")
            .add_header(name, value)
            .json(&json!({ "record_ids": [record] }))
            .await;
        let body: GenerateReceiptResponse = response.json();

        let (name, value) = auth_header(OTHER_OWNER);
        let foreign = app
            .get(&format!("/api/v1/receipts/{}", body.receipt.receipt_id))
            .add_header(name.clone(), value.clone())
            .await;
        foreign.assert_status_not_found();

        let absent = app
            .get("/api/v1/receipts/rcpt_0000000000000000")
            .add_header(name, value)
            .await;
        absent.assert_status_not_found();

        // Same body shape either way.
        let foreign_body: Value = foreign.json();
        let absent_body: Value = absent.json();
        assert_eq!(foreign_body["kind"], absent_body["kind"]);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn listing_pages_newest_first(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let (name, value) = auth_header(OWNER);

        for cost in ["0.01", "0.02", "0.03"] {
            let record = seed_usage(&pool, OWNER, "openai", "gpt-4o", None, None, cost).await;
            app.post("/api/v1/receipts/generate")
                .add_header(name.clone(), value.clone())
                .json(&json!({ "record_ids": [record] }))
                .await
                .assert_status(StatusCode::CREATED);
        }

        let response = app
            .get("/api/v1/receipts?limit=2")
            .add_header(name, value)
            .await;

        response.assert_status_ok();
        let page: PaginatedResponse<Receipt> = response.json();
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.total_count, 3);
        assert!(page.data[0].issued_at >= page.data[1].issued_at);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn certified_records_listing_preserves_aggregation_order(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;
        let conversation = seed_conversation(&pool, OWNER, "summarizer", "0.05").await;
        seed_usage(&pool, OWNER, "openai", "gpt-4o", None, Some(conversation), "0.02").await;
        seed_usage(&pool, OWNER, "openai", "gpt-4o", None, Some(conversation), "0.03").await;

        let (name, value) = auth_header(OWNER);
        let response = app
            .post("/api/v1/receipts/generate")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "conversation_id": conversation }))
            .await;
        let body: GenerateReceiptResponse = response.json();

        let response = app
            .get(&format!("/api/v1/receipts/{}/records", body.receipt.receipt_id))
            .add_header(name, value)
            .await;

        response.assert_status_ok();
        let page: PaginatedResponse<CertifiableRecordResponse> = response.json();
        assert_eq!(page.total_count, 3);
        for pair in page.data.windows(2) {
            assert!(pair[0].created_at <= pair[1].created_at);
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn public_key_needs_no_authentication(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;

        let response = app.get("/api/v1/receipts/public-key").await;

        response.assert_status_ok();
        let key: PublicKeyResponse = response.json();
        assert_eq!(key.algorithm, "ed25519");
        assert!(!key.public_key.is_empty());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn missing_owner_identity_is_unauthenticated(pool: PgPool) {
        let app = create_test_app(pool.clone()).await;

        let response = app
            .post("/api/v1/receipts/generate")
            .json(&json!({ "since_last_receipt": true }))
            .await;

        response.assert_status_unauthorized();
        let body: Value = response.json();
        assert_eq!(body["kind"], "unauthenticated");
    }
}
