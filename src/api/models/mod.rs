//! API request and response data models.
//!
//! This module contains the data structures used for HTTP request deserialization
//! and response serialization. These models define the public API contract.
//!
//! # Design Principles
//!
//! - **Separation of Concerns**: API models are distinct from database models,
//!   allowing independent evolution of API and storage representations
//! - **Validation**: Models use serde for deserialization and validation
//! - **OpenAPI**: All models are annotated with `utoipa` for automatic API docs
//!
//! # Model Categories
//!
//! - [`receipts`]: Receipt generation, preview, and verification payloads
//! - [`records`]: API views of certifiable usage and conversation records
//! - [`pagination`]: Offset pagination parameters shared by the listing endpoints

pub mod pagination;
pub mod receipts;
pub mod records;
