//! Database record models matching table schemas.
//!
//! This module contains struct definitions that directly correspond to database
//! table rows. These models are used by repositories to return query results
//! and accept insertion data.
//!
//! # Design Principles
//!
//! - **Schema Mapping**: Each model struct matches a database table schema
//! - **SQLx Integration**: Models derive `sqlx::FromRow` for query results
//! - **Separation**: Database models are distinct from API models to allow
//!   independent evolution of storage and API representations
//!
//! # Model Categories
//!
//! - [`records`]: the uniform projection the selection queries produce over
//!   the usage and conversation tables (read-only here)
//! - [`receipts`]: stored receipt rows

pub mod receipts;
pub mod records;
