//! Database layer for data persistence and access.
//!
//! This module implements the data access layer using SQLx with PostgreSQL.
//! It follows the Repository pattern to provide clean abstractions over database operations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries & ledger writes)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - database records)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │
//! └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: Repository implementations for record selection and the
//!   certification ledger
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types
//!
//! # Transactions
//!
//! Repositories wrap a SQLx connection. Ledger writes (a receipt row plus
//! its certification links) must run inside a transaction so they commit
//! together:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let mut ledger = Receipts::new(&mut tx);
//! let stored = ledger.store(&receipt, &links).await?;
//! tx.commit().await?;
//! ```
//!
//! Read-only selection can use a plain pool connection.
//!
//! # Migrations
//!
//! Database migrations are managed by SQLx and located in the `migrations/`
//! directory. The [`crate::migrator`] function provides access to the
//! migrator:
//!
//! ```ignore
//! vouch::migrator().run(&pool).await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod models;
