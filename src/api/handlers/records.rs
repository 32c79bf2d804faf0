use crate::{
    api::models::{
        pagination::{PaginatedResponse, Pagination},
        records::CertifiableRecordResponse,
    },
    auth::CurrentOwner,
    db::handlers::Records,
    errors::{Error, Result},
    AppState,
};
use axum::{
    extract::{Query, State},
    response::Json,
};

/// List records no receipt has covered yet
#[utoipa::path(
    get,
    path = "/records/uncertified",
    tag = "records",
    summary = "List uncertified records",
    description = "Page through the current owner's records that no receipt has ever \
                   certified, oldest first. This is exactly what a since_last_receipt \
                   generation would certify.",
    params(
        Pagination
    ),
    responses(
        (status = 200, description = "Page of uncertified records", body = PaginatedResponse<CertifiableRecordResponse>),
        (status = 401, description = "Missing owner identity"),
    ),
    security(
        ("X-API-Key" = [])
    )
)]
pub async fn list_uncertified_records(
    State(state): State<AppState>,
    owner: CurrentOwner,
    Query(pagination): Query<Pagination>,
) -> Result<Json<PaginatedResponse<CertifiableRecordResponse>>> {
    let (skip, limit) = pagination.params();

    let mut pool_conn = state.db.acquire().await.map_err(|e| Error::Database(e.into()))?;
    let mut repo = Records::new(&mut pool_conn);

    let records = repo.list_uncertified(&owner.id, skip, limit).await?;
    let total_count = repo.count_uncertified(&owner.id).await?;

    Ok(Json(PaginatedResponse::new(
        records.into_iter().map(CertifiableRecordResponse::from).collect(),
        total_count,
        skip,
        limit,
    )))
}
