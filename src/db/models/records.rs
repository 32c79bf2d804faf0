//! Row models for usage and conversation records.
//!
//! Both tables are written by the ingestion path; this service only reads
//! them. Selection queries flatten the two shapes into [`CertifiableRecord`]
//! via a UNION with uniform columns, which is what [`CertifiableRow`] maps.

use crate::receipts::CertifiableRecord;
use crate::types::{RecordId, RecordKind};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Uniform row shape produced by the selection UNION queries.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CertifiableRow {
    pub id: RecordId,
    pub record_kind: RecordKind,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub alias: Option<String>,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cached_input_tokens: i64,
    pub cost: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<CertifiableRow> for CertifiableRecord {
    fn from(row: CertifiableRow) -> Self {
        CertifiableRecord {
            id: row.id,
            kind: row.record_kind,
            provider: row.provider,
            model: row.model,
            alias: row.alias,
            input_tokens: row.input_tokens,
            output_tokens: row.output_tokens,
            cached_input_tokens: row.cached_input_tokens,
            cost: row.cost,
            created_at: row.created_at,
        }
    }
}
