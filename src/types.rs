//! Common type definitions.
//!
//! This module defines:
//! - Type aliases for entity IDs (RecordId, ConversationId, ReceiptId)
//! - The opaque owner identity attached to every request
//! - [`RecordKind`]: whether a certified record is a usage call or a conversation
//!
//! # ID Types
//!
//! Usage and conversation records are identified by UUIDs; receipts use an
//! opaque `rcpt_`-prefixed string minted at generation time:
//!
//! - [`RecordId`]: usage record identifier
//! - [`ConversationId`]: conversation record identifier
//! - [`ReceiptId`]: receipt identifier (`rcpt_` + 16 hex chars)
//!
//! # Owner identity
//!
//! Tenant resolution happens upstream; requests arrive carrying an opaque
//! [`OwnerId`] string and every query is scoped by it. Nothing in this crate
//! interprets the value.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// Type aliases for IDs
pub type RecordId = Uuid;
pub type ConversationId = Uuid;
pub type ReceiptId = String;
pub type OwnerId = String;

/// Mint a fresh receipt identifier: `rcpt_` followed by 16 hex characters.
pub fn new_receipt_id() -> ReceiptId {
    let hex = Uuid::new_v4().simple().to_string();
    format!("rcpt_{}", &hex[..16])
}

/// What kind of record a certification link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, utoipa::ToSchema)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Usage,
    Conversation,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Usage => write!(f, "usage"),
            RecordKind::Conversation => write!(f, "conversation"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_ids_have_prefix_and_fixed_length() {
        let id = new_receipt_id();
        assert!(id.starts_with("rcpt_"));
        assert_eq!(id.len(), "rcpt_".len() + 16);
        assert!(id["rcpt_".len()..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn receipt_ids_are_unique() {
        assert_ne!(new_receipt_id(), new_receipt_id());
    }
}
