//! API request and response models for receipt endpoints.

use crate::receipts::{BatchSummary, Receipt, ReceiptKind};
use crate::types::{ConversationId, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Request body for receipt generation and preview.
///
/// Exactly one selection mode must be set: `conversation_id`,
/// `start_date`+`end_date`, `record_ids`, or `since_last_receipt`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct GenerateReceiptRequest {
    /// Certify one conversation and its usage records.
    #[schema(value_type = Option<Uuid>)]
    pub conversation_id: Option<ConversationId>,

    /// Inclusive window start. Requires `end_date`.
    pub start_date: Option<DateTime<Utc>>,

    /// Inclusive window end. Requires `start_date`.
    pub end_date: Option<DateTime<Utc>>,

    /// Certify an explicit list of usage or conversation record ids.
    /// Unknown ids are tolerated and reported back as `missing_count`.
    #[schema(value_type = Option<Vec<Uuid>>)]
    pub record_ids: Option<Vec<RecordId>>,

    /// Certify every record no receipt has ever covered.
    #[serde(default)]
    pub since_last_receipt: bool,

    /// Free-text note carried in the signed content.
    pub description: Option<String>,

    /// Caller labels carried in the signed content.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Response for `POST /receipts/generate`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GenerateReceiptResponse {
    pub receipt: Receipt,
    /// Number of records the new receipt certifies.
    pub certified_count: i64,
    /// Requested ids that were absent or not ours (explicit-id mode only).
    pub missing_count: i64,
}

/// Response for `POST /receipts/preview`: what generation would produce,
/// without signing or persisting anything.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PreviewReceiptResponse {
    pub kind: ReceiptKind,
    pub summary: BatchSummary,
    pub certified_count: i64,
    pub missing_count: i64,
}

/// Response for `GET /receipts/{receipt_id}/verify`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifyReceiptResponse {
    pub receipt_id: String,
    pub verified: bool,
}

/// Response for `GET /receipts/public-key`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicKeyResponse {
    /// Signature algorithm the key belongs to.
    pub algorithm: String,
    /// Base64url-encoded Ed25519 verification key.
    pub public_key: String,
}
