//! Selection mode validation.
//!
//! A generation or preview request names its records in exactly one of four
//! ways. Validation is pure and happens before any store access, so an
//! ill-formed selection never costs a query.

use crate::types::{ConversationId, RecordId};
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SelectionError {
    #[error("{0}")]
    Ambiguous(String),

    #[error("start {start} is after end {end}")]
    InvalidRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// A validated selection, carrying exactly one mode.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// Certify one conversation and its usage.
    Conversation(ConversationId),
    /// Certify everything created inside an inclusive time window.
    TimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Certify an explicit list of usage record ids.
    Records(Vec<RecordId>),
    /// Certify every record that no receipt has ever covered.
    Uncertified,
}

impl Selection {
    /// Validate the raw request fields into a single selection mode.
    pub fn try_new(
        conversation_id: Option<ConversationId>,
        start_date: Option<DateTime<Utc>>,
        end_date: Option<DateTime<Utc>>,
        record_ids: Option<Vec<RecordId>>,
        since_last_receipt: bool,
    ) -> Result<Self, SelectionError> {
        // A half-open range is a malformed mode, not a missing one.
        if start_date.is_some() != end_date.is_some() {
            return Err(SelectionError::Ambiguous(
                "start_date and end_date must be provided together".to_string(),
            ));
        }

        let range = start_date.zip(end_date);
        let mode_count = [
            conversation_id.is_some(),
            range.is_some(),
            record_ids.is_some(),
            since_last_receipt,
        ]
        .iter()
        .filter(|set| **set)
        .count();

        match mode_count {
            0 => Err(SelectionError::Ambiguous(
                "exactly one selection mode must be provided: conversation_id, \
                 start_date/end_date, record_ids, or since_last_receipt"
                    .to_string(),
            )),
            1 => {
                if let Some(id) = conversation_id {
                    Ok(Selection::Conversation(id))
                } else if let Some((start, end)) = range {
                    if start > end {
                        return Err(SelectionError::InvalidRange { start, end });
                    }
                    Ok(Selection::TimeRange { start, end })
                } else if let Some(ids) = record_ids {
                    Ok(Selection::Records(ids))
                } else {
                    Ok(Selection::Uncertified)
                }
            }
            n => Err(SelectionError::Ambiguous(format!(
                "{n} selection modes provided, expected exactly one"
            ))),
        }
    }

    /// Only conversation mode can produce a `single` receipt.
    pub fn single_eligible(&self) -> bool {
        matches!(self, Selection::Conversation(_))
    }
}
