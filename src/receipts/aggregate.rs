//! Deterministic aggregation of selected records into a batch summary.
//!
//! One pass over the record set produces every total and breakdown. Sums use
//! fixed-point [`Decimal`] arithmetic, which is associative and commutative,
//! and breakdowns live in [`BTreeMap`]s, so the summary is identical for any
//! permutation of the same records.

use super::{CertifiableRecord, canonical_timestamp};
use crate::types::RecordKind;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use utoipa::ToSchema;
use uuid::Uuid;

/// Per-key slice of a breakdown (one model or one alias).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BreakdownEntry {
    pub records: i64,
    pub tokens: i64,
    pub cost: Decimal,
}

/// Aggregated content of a batch receipt. Span timestamps are stored
/// pre-rendered in the canonical format so the summary round-trips through
/// JSON storage byte-for-byte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BatchSummary {
    pub total_records: i64,
    pub total_conversations: i64,
    pub total_tokens: i64,
    pub total_cost: Decimal,
    /// Earliest `created_at` in the set, canonical RFC 3339. Null only for
    /// an empty receipt.
    pub span_start: Option<String>,
    /// Latest `created_at` in the set.
    pub span_end: Option<String>,
    pub by_model: BTreeMap<String, BreakdownEntry>,
    pub by_alias: BTreeMap<String, BreakdownEntry>,
    pub conversation_ids: Vec<Uuid>,
    pub record_ids: Vec<Uuid>,
}

/// Aggregate an ordered record set into its batch summary. Input order is
/// preserved in the id lists; everything else is order-independent.
pub fn summarize(records: &[CertifiableRecord]) -> BatchSummary {
    let mut summary = BatchSummary {
        total_records: 0,
        total_conversations: 0,
        total_tokens: 0,
        total_cost: Decimal::ZERO,
        span_start: None,
        span_end: None,
        by_model: BTreeMap::new(),
        by_alias: BTreeMap::new(),
        conversation_ids: Vec::new(),
        record_ids: Vec::new(),
    };

    let mut span: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
    for record in records {
        summary.total_records += 1;
        let tokens = record.input_tokens + record.output_tokens;
        summary.total_tokens += tokens;
        summary.total_cost += record.cost;

        span = Some(match span {
            None => (record.created_at, record.created_at),
            Some((lo, hi)) => (lo.min(record.created_at), hi.max(record.created_at)),
        });

        match record.kind {
            RecordKind::Conversation => {
                summary.total_conversations += 1;
                summary.conversation_ids.push(record.id);
            }
            RecordKind::Usage => {
                summary.record_ids.push(record.id);
            }
        }

        if let Some(model) = &record.model {
            let entry = summary.by_model.entry(model.clone()).or_default();
            entry.records += 1;
            entry.tokens += tokens;
            entry.cost += record.cost;
        }
        if let Some(alias) = &record.alias {
            let entry = summary.by_alias.entry(alias.clone()).or_default();
            entry.records += 1;
            entry.tokens += tokens;
            entry.cost += record.cost;
        }
    }

    if let Some((lo, hi)) = span {
        summary.span_start = Some(canonical_timestamp(&lo));
        summary.span_end = Some(canonical_timestamp(&hi));
    }
    summary
}

/// Distinct provider+model pairs among the usage records in a set.
/// Conversation rows carry neither and do not contribute.
pub fn cost_centers(records: &[CertifiableRecord]) -> BTreeSet<(String, String)> {
    records
        .iter()
        .filter(|r| r.kind == RecordKind::Usage)
        .filter_map(|r| Some((r.provider.clone()?, r.model.clone()?)))
        .collect()
}
