//! HTTP request handlers for all API endpoints.
//!
//! This module contains Axum route handlers organized by resource type.
//! Each handler is responsible for:
//! - Request validation and deserialization
//! - Owner identity extraction
//! - Business logic execution via database repositories
//! - Response serialization
//!
//! # Handler Modules
//!
//! - [`receipts`]: Receipt generation, preview, verification, and listings
//! - [`records`]: Uncertified record listings
//!
//! # Authentication
//!
//! Data-touching handlers take a [`crate::auth::CurrentOwner`] extractor,
//! which resolves the `X-API-Key` header and rejects requests without one.
//!
//! # Error Handling
//!
//! Handlers return [`crate::errors::Error`] which automatically converts to
//! appropriate HTTP status codes and JSON error responses.

pub mod receipts;
pub mod records;
