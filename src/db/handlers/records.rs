//! Read-only store adapter for usage and conversation records.
//!
//! Every selection mode resolves here. The two record shapes are flattened
//! into one uniform projection (a UNION ALL), so selection output is a single
//! ordered list regardless of mode. Results are always ordered by
//! `created_at ASC, id ASC`; equal content therefore produces equal
//! aggregation input.
//!
//! Conversation-attached usage is represented by its conversation in the
//! range and uncertified modes, so one call's tokens never count twice
//! inside a receipt.

use crate::db::errors::Result;
use crate::db::models::records::CertifiableRow;
use crate::receipts::CertifiableRecord;
use crate::types::{ConversationId, RecordId};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

pub(crate) const CONVERSATION_PROJECTION: &str = r#"
    SELECT id,
           'conversation' AS record_kind,
           NULL::text AS provider,
           NULL::text AS model,
           model_alias AS alias,
           total_input_tokens AS input_tokens,
           total_output_tokens AS output_tokens,
           0::bigint AS cached_input_tokens,
           total_cost AS cost,
           created_at
    FROM conversation_records
"#;

pub(crate) const USAGE_PROJECTION: &str = r#"
    SELECT id,
           'usage' AS record_kind,
           provider,
           model,
           alias,
           input_tokens,
           output_tokens,
           cached_input_tokens,
           cost,
           created_at
    FROM usage_records
"#;

pub struct Records<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Records<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Conversation mode: the conversation row plus its usage records.
    /// Returns an empty vec when the conversation does not exist for this
    /// owner.
    pub async fn select_conversation(
        &mut self,
        owner_id: &str,
        id: ConversationId,
    ) -> Result<Vec<CertifiableRecord>> {
        let sql = format!(
            "SELECT * FROM ({CONVERSATION_PROJECTION} WHERE owner_id = $1 AND id = $2 \
             UNION ALL {USAGE_PROJECTION} WHERE owner_id = $1 AND conversation_id = $2) r \
             ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, CertifiableRow>(&sql)
            .bind(owner_id)
            .bind(id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Time-range mode: conversations and standalone usage created inside
    /// the inclusive window. Range sanity is checked before this query runs.
    pub async fn select_time_range(
        &mut self,
        owner_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<CertifiableRecord>> {
        let sql = format!(
            "SELECT * FROM ({CONVERSATION_PROJECTION} \
               WHERE owner_id = $1 AND created_at >= $2 AND created_at <= $3 \
             UNION ALL {USAGE_PROJECTION} \
               WHERE owner_id = $1 AND conversation_id IS NULL \
                 AND created_at >= $2 AND created_at <= $3) r \
             ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, CertifiableRow>(&sql)
            .bind(owner_id)
            .bind(start)
            .bind(end)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Explicit-id mode: the usage and conversation records from `ids` that
    /// exist and belong to this owner. Missing or foreign ids simply don't
    /// come back; the caller reports the shortfall.
    pub async fn select_by_ids(
        &mut self,
        owner_id: &str,
        ids: &[RecordId],
    ) -> Result<Vec<CertifiableRecord>> {
        let sql = format!(
            "SELECT * FROM ({CONVERSATION_PROJECTION} WHERE owner_id = $1 AND id = ANY($2) \
             UNION ALL {USAGE_PROJECTION} WHERE owner_id = $1 AND id = ANY($2)) r \
             ORDER BY created_at ASC, id ASC"
        );
        let rows = sqlx::query_as::<_, CertifiableRow>(&sql)
            .bind(owner_id)
            .bind(ids)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Uncertified mode: every record of this owner that no receipt has
    /// ever covered. Membership in the ledger is the only criterion; a
    /// record certified once stays excluded forever.
    pub async fn select_uncertified(&mut self, owner_id: &str) -> Result<Vec<CertifiableRecord>> {
        let sql = format!(
            "SELECT * FROM ({}) r ORDER BY created_at ASC, id ASC",
            Self::uncertified_union()
        );
        let rows = sqlx::query_as::<_, CertifiableRow>(&sql)
            .bind(owner_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Page of uncertified records, for the listing endpoint.
    pub async fn list_uncertified(
        &mut self,
        owner_id: &str,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<CertifiableRecord>> {
        let sql = format!(
            "SELECT * FROM ({}) r ORDER BY created_at ASC, id ASC OFFSET $2 LIMIT $3",
            Self::uncertified_union()
        );
        let rows = sqlx::query_as::<_, CertifiableRow>(&sql)
            .bind(owner_id)
            .bind(skip)
            .bind(limit)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn count_uncertified(&mut self, owner_id: &str) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM ({}) r",
            Self::uncertified_union()
        );
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .bind(owner_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(count)
    }

    /// Anti-join against the ledger. "Uncertified" means no link row at
    /// all, never a timestamp comparison, so records backfilled with old
    /// timestamps still qualify.
    fn uncertified_union() -> String {
        format!(
            "{CONVERSATION_PROJECTION} c \
               WHERE owner_id = $1 AND NOT EXISTS \
                 (SELECT 1 FROM certification_links cl WHERE cl.record_id = c.id) \
             UNION ALL {USAGE_PROJECTION} u \
               WHERE owner_id = $1 AND conversation_id IS NULL AND NOT EXISTS \
                 (SELECT 1 FROM certification_links cl WHERE cl.record_id = u.id)"
        )
    }
}
