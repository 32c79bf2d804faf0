//! OpenAPI documentation configuration.
//!
//! Defines the OpenAPI document for the receipt API at `/api/v1/*`. The interactive
//! reference is served at `/docs` when the server is running.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::api::{handlers, models};
use crate::receipts;

/// Security scheme for owner identification (X-API-Key header).
struct ApiKeySecurityAddon;

impl Modify for ApiKeySecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "X-API-Key".to_string(),
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "X-API-Key",
                    "Opaque owner key. Every record and receipt is scoped to the key that \
                     created it.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::receipts::generate_receipt,
        handlers::receipts::preview_receipt,
        handlers::receipts::list_receipts,
        handlers::receipts::get_receipt,
        handlers::receipts::verify_receipt,
        handlers::receipts::list_receipt_records,
        handlers::receipts::get_public_key,
        handlers::records::list_uncertified_records,
    ),
    components(
        schemas(
            models::receipts::GenerateReceiptRequest,
            models::receipts::GenerateReceiptResponse,
            models::receipts::PreviewReceiptResponse,
            models::receipts::VerifyReceiptResponse,
            models::receipts::PublicKeyResponse,
            models::records::CertifiableRecordResponse,
            receipts::Receipt,
            receipts::ReceiptContent,
            receipts::ReceiptKind,
            receipts::BatchSummary,
            receipts::BreakdownEntry,
        )
    ),
    modifiers(&ApiKeySecurityAddon),
    tags(
        (name = "receipts", description = "Generate, verify, and inspect signed usage receipts.

A receipt certifies a set of usage and conversation records: it carries their aggregated totals, \
an issuance timestamp, and an Ed25519 signature over the canonical JSON rendering of its content. \
Anyone holding the service's public key can verify a receipt offline."),
        (name = "records", description = "Inspect certifiable usage records.

Records enter through the usage log; these endpoints expose which of them no receipt has \
covered yet."),
    ),
    info(
        title = "Vouch API",
        version = "1.0.0",
        description = "Signed usage receipts for LLM applications.

## Authentication

Data-touching endpoints identify the owner via the `X-API-Key` header. Keys are opaque; all \
records and receipts are partitioned by key, and another owner's resources are \
indistinguishable from absent ones.

## Errors

Errors are JSON objects with a stable machine-readable `kind` and a human-readable `message`:

```json
{
  \"kind\": \"ambiguous_selection\",
  \"message\": \"exactly one selection mode must be provided\"
}
```",
    ),
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_builds_and_covers_every_route() {
        let spec = ApiDoc::openapi();
        let paths: Vec<&String> = spec.paths.paths.keys().collect();

        for expected in [
            "/receipts/generate",
            "/receipts/preview",
            "/receipts",
            "/receipts/{receipt_id}",
            "/receipts/{receipt_id}/verify",
            "/receipts/{receipt_id}/records",
            "/receipts/public-key",
            "/records/uncertified",
        ] {
            assert!(
                paths.iter().any(|p| *p == expected),
                "missing path {expected} in {paths:?}"
            );
        }
    }
}
