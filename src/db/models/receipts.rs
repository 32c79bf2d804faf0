//! Row models for the receipts table.

use crate::receipts::{BatchSummary, Receipt, ReceiptContent, ReceiptKind};
use crate::types::{OwnerId, ReceiptId};
use anyhow::Context;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// A stored receipt row. Single-content fields and the batch summary are
/// mutually exclusive; `kind` says which side is populated.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReceiptRow {
    pub receipt_id: ReceiptId,
    pub owner_id: OwnerId,
    pub kind: ReceiptKind,
    pub schema_version: String,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub alias: Option<String>,
    pub input_tokens: Option<i64>,
    pub output_tokens: Option<i64>,
    pub cached_input_tokens: Option<i64>,
    pub cost: Option<Decimal>,
    pub batch_summary: Option<serde_json::Value>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub signature: String,
    pub issued_at: DateTime<Utc>,
    pub stored_at: DateTime<Utc>,
}

impl TryFrom<ReceiptRow> for Receipt {
    type Error = anyhow::Error;

    fn try_from(row: ReceiptRow) -> Result<Self, Self::Error> {
        let content = match row.kind {
            ReceiptKind::Single => ReceiptContent::Single {
                provider: row
                    .provider
                    .context("single receipt row is missing provider")?,
                model: row.model.context("single receipt row is missing model")?,
                alias: row.alias,
                input_tokens: row
                    .input_tokens
                    .context("single receipt row is missing input_tokens")?,
                output_tokens: row
                    .output_tokens
                    .context("single receipt row is missing output_tokens")?,
                cached_input_tokens: row
                    .cached_input_tokens
                    .context("single receipt row is missing cached_input_tokens")?,
                cost: row.cost.context("single receipt row is missing cost")?,
            },
            ReceiptKind::Batch => {
                let summary: BatchSummary = serde_json::from_value(
                    row.batch_summary
                        .context("batch receipt row is missing batch_summary")?,
                )
                .context("batch summary does not deserialize")?;
                ReceiptContent::Batch {
                    batch_summary: summary,
                }
            }
        };

        Ok(Receipt {
            receipt_id: row.receipt_id,
            owner_id: row.owner_id,
            kind: row.kind,
            schema_version: row.schema_version,
            content,
            description: row.description,
            tags: row.tags,
            issued_at: row.issued_at,
            signature: row.signature,
            stored_at: Some(row.stored_at),
        })
    }
}
