//! Receipt construction, canonical content, and signing.
//!
//! A receipt certifies a set of usage and conversation records. Its content
//! is deterministic: the same records always produce byte-identical canonical
//! content, which is what the Ed25519 signature covers. Verification
//! reconstructs those bytes from the stored receipt alone, so a receipt is
//! checkable without access to the records it certifies.
//!
//! Two content shapes exist. A `single` receipt covers one conversation
//! whose usage collapses to one provider+model pair and carries the usage
//! fields inline. Everything else is a `batch` receipt carrying a
//! [`BatchSummary`].
//!
//! # Timestamp convention
//!
//! All timestamps that enter signed content are truncated to microseconds
//! and rendered as RFC 3339 with exactly six fractional digits and a `Z`
//! suffix. Postgres `TIMESTAMPTZ` stores microseconds, so a stored receipt
//! reproduces the exact bytes that were signed.

pub mod aggregate;
pub mod canonical;
pub mod selector;
pub mod signing;

pub use aggregate::{BatchSummary, BreakdownEntry};

use crate::types::{OwnerId, ReceiptId, RecordKind, new_receipt_id};
use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use utoipa::ToSchema;

use canonical::CanonicalError;
use signing::{ReceiptSigner, ReceiptVerifier, SigningError};

/// Version tag baked into every receipt's signed content.
pub const SCHEMA_VERSION: &str = "v1";

/// A record eligible for certification, as the selection queries return it.
/// Conversation rows carry no provider or model; their alias is the
/// conversation's model alias.
#[derive(Debug, Clone, PartialEq)]
pub struct CertifiableRecord {
    pub id: uuid::Uuid,
    pub kind: RecordKind,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub alias: Option<String>,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cached_input_tokens: i64,
    pub cost: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReceiptKind {
    Single,
    Batch,
}

impl std::fmt::Display for ReceiptKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReceiptKind::Single => write!(f, "single"),
            ReceiptKind::Batch => write!(f, "batch"),
        }
    }
}

/// Usage payload of a receipt. `Single` inlines one cost center's usage,
/// `Batch` wraps the aggregated summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ReceiptContent {
    Single {
        provider: String,
        model: String,
        alias: Option<String>,
        input_tokens: i64,
        output_tokens: i64,
        cached_input_tokens: i64,
        cost: Decimal,
    },
    Batch {
        batch_summary: BatchSummary,
    },
}

/// A signed receipt. `stored_at` is set by the store and never enters the
/// signed content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Receipt {
    pub receipt_id: ReceiptId,
    pub owner_id: OwnerId,
    pub kind: ReceiptKind,
    pub schema_version: String,
    #[serde(flatten)]
    pub content: ReceiptContent,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub issued_at: DateTime<Utc>,
    pub signature: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_at: Option<DateTime<Utc>>,
}

/// Truncate a timestamp to microsecond precision, the resolution Postgres
/// round-trips.
pub fn truncate_to_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    let nanos = ts.nanosecond();
    ts.with_nanosecond(nanos - nanos % 1_000)
        .unwrap_or(ts)
}

/// Fixed wire format for timestamps inside signed content.
pub fn canonical_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl Receipt {
    /// Build and sign a receipt over an already-selected, ordered record
    /// set. `single_eligible` is true only for conversation-mode selection;
    /// the receipt still falls back to `batch` when the conversation spans
    /// more than one provider+model pair.
    pub fn issue(
        owner_id: &str,
        records: &[CertifiableRecord],
        single_eligible: bool,
        description: Option<String>,
        tags: Vec<String>,
        signer: &ReceiptSigner,
    ) -> Result<Self, CanonicalError> {
        let (kind, content) = Self::content_for(records, single_eligible);
        let mut receipt = Receipt {
            receipt_id: new_receipt_id(),
            owner_id: owner_id.to_string(),
            kind,
            schema_version: SCHEMA_VERSION.to_string(),
            content,
            description,
            tags,
            issued_at: truncate_to_micros(Utc::now()),
            signature: String::new(),
            stored_at: None,
        };
        receipt.signature = signer.sign(&receipt.canonical_bytes()?);
        Ok(receipt)
    }

    /// Decide the receipt shape for a record set. Shared with preview so a
    /// preview always reports the kind generation would produce.
    pub fn content_for(
        records: &[CertifiableRecord],
        single_eligible: bool,
    ) -> (ReceiptKind, ReceiptContent) {
        if single_eligible {
            let centers = aggregate::cost_centers(records);
            if centers.len() == 1 {
                let (provider, model) = centers.into_iter().next().unwrap_or_default();
                let usage: Vec<&CertifiableRecord> = records
                    .iter()
                    .filter(|r| r.kind == RecordKind::Usage)
                    .collect();
                let alias = records
                    .iter()
                    .find(|r| r.kind == RecordKind::Conversation)
                    .and_then(|r| r.alias.clone())
                    .or_else(|| usage.iter().find_map(|r| r.alias.clone()));
                return (
                    ReceiptKind::Single,
                    ReceiptContent::Single {
                        provider,
                        model,
                        alias,
                        input_tokens: usage.iter().map(|r| r.input_tokens).sum(),
                        output_tokens: usage.iter().map(|r| r.output_tokens).sum(),
                        cached_input_tokens: usage.iter().map(|r| r.cached_input_tokens).sum(),
                        cost: usage.iter().map(|r| r.cost).sum(),
                    },
                );
            }
        }
        (
            ReceiptKind::Batch,
            ReceiptContent::Batch {
                batch_summary: aggregate::summarize(records),
            },
        )
    }

    /// Every field except `signature` and `stored_at`, with the fixed
    /// timestamp rendering. This is the exact structure the signature
    /// covers.
    pub fn signable_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("receipt_id".into(), json!(self.receipt_id));
        map.insert("owner_id".into(), json!(self.owner_id));
        map.insert("kind".into(), json!(self.kind));
        map.insert("schema_version".into(), json!(self.schema_version));
        map.insert("description".into(), json!(self.description));
        map.insert("tags".into(), json!(self.tags));
        map.insert(
            "issued_at".into(),
            Value::String(canonical_timestamp(&self.issued_at)),
        );
        match &self.content {
            ReceiptContent::Single {
                provider,
                model,
                alias,
                input_tokens,
                output_tokens,
                cached_input_tokens,
                cost,
            } => {
                map.insert("provider".into(), json!(provider));
                map.insert("model".into(), json!(model));
                map.insert("alias".into(), json!(alias));
                map.insert("input_tokens".into(), json!(input_tokens));
                map.insert("output_tokens".into(), json!(output_tokens));
                map.insert("cached_input_tokens".into(), json!(cached_input_tokens));
                map.insert("cost".into(), json!(cost));
            }
            ReceiptContent::Batch { batch_summary } => {
                map.insert("batch_summary".into(), json!(batch_summary));
            }
        }
        Value::Object(map)
    }

    pub fn canonical_bytes(&self) -> Result<Vec<u8>, CanonicalError> {
        canonical::to_canonical_bytes(&self.signable_value())
    }

    /// Recompute canonical bytes from stored fields and check the stored
    /// signature against them.
    pub fn verify_with(&self, verifier: &ReceiptVerifier) -> Result<(), VerifyError> {
        let bytes = self.canonical_bytes()?;
        verifier.verify(&bytes, &self.signature)?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error(transparent)]
    Canonical(#[from] CanonicalError),
    #[error(transparent)]
    Signature(#[from] SigningError),
}
