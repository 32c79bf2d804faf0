//! Repository implementations for database access.
//!
//! This module provides repository structs for the two data concerns of the
//! service: reading certifiable records and writing the certification
//! ledger.
//!
//! # Design Pattern
//!
//! Each repository:
//! - Wraps a SQLx connection or transaction
//! - Provides strongly-typed query methods
//! - Handles query construction and parameter binding
//! - Returns domain models from [`crate::db::models`]
//! - Uses the connection's transaction for ACID guarantees
//!
//! # Available Repositories
//!
//! - [`Records`]: read-only selection over usage and conversation records
//! - [`Receipts`]: receipt persistence and certification links
//!
//! # Common Pattern
//!
//! ```ignore
//! use vouch::db::handlers::Receipts;
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut tx = pool.begin().await?;
//!     let mut ledger = Receipts::new(&mut tx);
//!     let stored = ledger.store(&receipt, &links).await?;
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```

pub mod receipts;
pub mod records;

pub use receipts::Receipts;
pub use records::Records;
