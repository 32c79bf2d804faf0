//! API views of certifiable records.

use crate::receipts::CertifiableRecord;
use crate::types::{RecordId, RecordKind};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A usage or conversation record as returned by the listing endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CertifiableRecordResponse {
    #[schema(value_type = Uuid)]
    pub id: RecordId,
    pub record_kind: RecordKind,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub alias: Option<String>,
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub cached_input_tokens: i64,
    #[schema(value_type = String)]
    pub cost: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<CertifiableRecord> for CertifiableRecordResponse {
    fn from(record: CertifiableRecord) -> Self {
        Self {
            id: record.id,
            record_kind: record.kind,
            provider: record.provider,
            model: record.model,
            alias: record.alias,
            input_tokens: record.input_tokens,
            output_tokens: record.output_tokens,
            cached_input_tokens: record.cached_input_tokens,
            cost: record.cost,
            created_at: record.created_at,
        }
    }
}
