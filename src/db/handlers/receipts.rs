//! Certification ledger: receipt persistence and receipt-record links.
//!
//! `store` writes the receipt row and all of its link rows on the caller's
//! connection. Callers run it inside a transaction so a receipt and its
//! links land together or not at all. Link insertion is insert-if-absent on
//! the `(receipt_id, record_id)` key, so replaying a store is harmless.
//!
//! Receipts are immutable once stored. There is no update or delete here;
//! correcting a receipt means issuing a new one.

use crate::db::errors::Result;
use crate::db::handlers::records::{CONVERSATION_PROJECTION, USAGE_PROJECTION};
use crate::db::models::receipts::ReceiptRow;
use crate::db::models::records::CertifiableRow;
use crate::receipts::{CertifiableRecord, Receipt, ReceiptContent};
use crate::types::{RecordId, RecordKind};
use sqlx::PgConnection;

pub struct Receipts<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Receipts<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Persist a signed receipt and its certification links. Run inside a
    /// transaction. Returns the receipt with `stored_at` set.
    pub async fn store(
        &mut self,
        receipt: &Receipt,
        links: &[(RecordId, RecordKind)],
    ) -> Result<Receipt> {
        let (provider, model, alias, input_tokens, output_tokens, cached_input_tokens, cost) =
            match &receipt.content {
                ReceiptContent::Single {
                    provider,
                    model,
                    alias,
                    input_tokens,
                    output_tokens,
                    cached_input_tokens,
                    cost,
                } => (
                    Some(provider.clone()),
                    Some(model.clone()),
                    alias.clone(),
                    Some(*input_tokens),
                    Some(*output_tokens),
                    Some(*cached_input_tokens),
                    Some(*cost),
                ),
                ReceiptContent::Batch { .. } => (None, None, None, None, None, None, None),
            };
        let batch_summary = match &receipt.content {
            ReceiptContent::Batch { batch_summary } => Some(
                serde_json::to_value(batch_summary)
                    .map_err(|e| anyhow::anyhow!("batch summary does not serialize: {e}"))?,
            ),
            ReceiptContent::Single { .. } => None,
        };

        let row = sqlx::query_as::<_, ReceiptRow>(
            r#"
            INSERT INTO receipts (
                receipt_id, owner_id, kind, schema_version,
                provider, model, alias, input_tokens, output_tokens,
                cached_input_tokens, cost, batch_summary,
                description, tags, signature, issued_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
            "#,
        )
        .bind(&receipt.receipt_id)
        .bind(&receipt.owner_id)
        .bind(receipt.kind)
        .bind(&receipt.schema_version)
        .bind(provider)
        .bind(model)
        .bind(alias)
        .bind(input_tokens)
        .bind(output_tokens)
        .bind(cached_input_tokens)
        .bind(cost)
        .bind(batch_summary)
        .bind(&receipt.description)
        .bind(&receipt.tags)
        .bind(&receipt.signature)
        .bind(receipt.issued_at)
        .fetch_one(&mut *self.db)
        .await?;

        let (record_ids, record_kinds): (Vec<RecordId>, Vec<String>) = links
            .iter()
            .map(|(id, kind)| (*id, kind.to_string()))
            .unzip();

        sqlx::query(
            r#"
            INSERT INTO certification_links (receipt_id, record_id, record_kind)
            SELECT $1, record_id, record_kind
            FROM UNNEST($2::uuid[], $3::text[]) AS links (record_id, record_kind)
            ON CONFLICT (receipt_id, record_id) DO NOTHING
            "#,
        )
        .bind(&receipt.receipt_id)
        .bind(&record_ids)
        .bind(&record_kinds)
        .execute(&mut *self.db)
        .await?;

        Ok(row.try_into()?)
    }

    /// Fetch a receipt by id, scoped to its owner. A foreign owner's
    /// receipt comes back as `None`, indistinguishable from absence.
    pub async fn get(&mut self, owner_id: &str, receipt_id: &str) -> Result<Option<Receipt>> {
        let row = sqlx::query_as::<_, ReceiptRow>(
            "SELECT * FROM receipts WHERE owner_id = $1 AND receipt_id = $2",
        )
        .bind(owner_id)
        .bind(receipt_id)
        .fetch_optional(&mut *self.db)
        .await?;

        row.map(Receipt::try_from).transpose().map_err(Into::into)
    }

    /// Page of the owner's receipts, newest first.
    pub async fn list(&mut self, owner_id: &str, skip: i64, limit: i64) -> Result<Vec<Receipt>> {
        let rows = sqlx::query_as::<_, ReceiptRow>(
            r#"
            SELECT * FROM receipts
            WHERE owner_id = $1
            ORDER BY issued_at DESC, receipt_id DESC
            OFFSET $2 LIMIT $3
            "#,
        )
        .bind(owner_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(&mut *self.db)
        .await?;

        rows.into_iter()
            .map(|row| Receipt::try_from(row).map_err(Into::into))
            .collect()
    }

    pub async fn count(&mut self, owner_id: &str) -> Result<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM receipts WHERE owner_id = $1")
                .bind(owner_id)
                .fetch_one(&mut *self.db)
                .await?;

        Ok(count)
    }

    /// Page of the records a receipt certifies, resolved back to record
    /// content through the ledger.
    pub async fn records_for(
        &mut self,
        receipt_id: &str,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<CertifiableRecord>> {
        let sql = format!(
            "SELECT * FROM ({}) r ORDER BY created_at ASC, id ASC OFFSET $2 LIMIT $3",
            Self::certified_union()
        );
        let rows = sqlx::query_as::<_, CertifiableRow>(&sql)
            .bind(receipt_id)
            .bind(skip)
            .bind(limit)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn count_records_for(&mut self, receipt_id: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM certification_links WHERE receipt_id = $1",
        )
        .bind(receipt_id)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(count)
    }

    fn certified_union() -> String {
        format!(
            "{CONVERSATION_PROJECTION} c \
               WHERE EXISTS (SELECT 1 FROM certification_links cl \
                 WHERE cl.receipt_id = $1 AND cl.record_id = c.id) \
             UNION ALL {USAGE_PROJECTION} u \
               WHERE EXISTS (SELECT 1 FROM certification_links cl \
                 WHERE cl.receipt_id = $1 AND cl.record_id = u.id)"
        )
    }
}
