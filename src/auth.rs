//! Caller identity.
//!
//! Every data-touching endpoint is scoped to one owner, identified by the
//! opaque `X-API-Key` header. The key is not validated against a registry
//! here; it IS the owner id, and isolation comes from every query filtering
//! on it. Requests without the header are rejected before any handler runs.

use crate::{
    errors::{Error, Result},
    types::OwnerId,
    AppState,
};
use axum::{extract::FromRequestParts, http::request::Parts};

/// Header carrying the owner identity.
pub const OWNER_HEADER: &str = "x-api-key";

/// The authenticated owner of the current request.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentOwner {
    pub id: OwnerId,
}

impl FromRequestParts<AppState> for CurrentOwner {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &AppState) -> Result<Self> {
        let key = parts
            .headers
            .get(OWNER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|key| !key.is_empty());

        match key {
            Some(key) => Ok(CurrentOwner { id: key.to_string() }),
            None => Err(Error::Unauthenticated {
                message: Some("missing X-API-Key header".to_string()),
            }),
        }
    }
}
