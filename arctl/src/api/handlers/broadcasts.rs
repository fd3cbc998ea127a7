//! HTTP handlers for the broadcast archive.
//!
//! Listing and reading are open to anonymous callers. Each item carries an `editable` flag
//! telling the caller whether they hold `broadcast:update_partially`, so a UI can decide
//! whether to offer the edit affordance. The edit itself is enforced here as well.

use crate::{
    AppState,
    api::models::{
        broadcasts::{BroadcastResponse, BroadcastUpdate, ListBroadcastsQuery},
        pagination::PaginatedResponse,
    },
    auth::{
        current_user::CurrentUser,
        permissions::{RequiresPermission, has_permission, operation, resource},
    },
    db::{
        errors::DbError,
        handlers::{Broadcasts, Repository, broadcasts::BroadcastFilter},
        models::broadcasts::BroadcastUpdateDBRequest,
    },
    errors::{Error, Result},
    types::{BroadcastId, Operation, Resource, abbrev_uuid},
};
use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use tracing::info;

fn can_edit(user: Option<&CurrentUser>) -> bool {
    user.is_some_and(|user| has_permission(user, Resource::Broadcasts, Operation::UpdatePartially))
}

#[utoipa::path(
    get,
    path = "/broadcasts",
    tag = "broadcasts",
    summary = "List broadcasts",
    description = "The archive, newest first. Anonymous callers are allowed.",
    params(ListBroadcastsQuery),
    responses(
        (status = 200, description = "Paginated archive", body = PaginatedResponse<BroadcastResponse>),
        (status = 503, description = "Database unavailable", body = crate::errors::ErrorBody),
    ),
    security((), ("cookieAuth" = []))
)]
#[tracing::instrument(skip_all)]
pub async fn list_broadcasts(
    State(state): State<AppState>,
    Query(query): Query<ListBroadcastsQuery>,
    current_user: Option<CurrentUser>,
) -> Result<Json<PaginatedResponse<BroadcastResponse>>> {
    let editable = can_edit(current_user.as_ref());
    let (skip, limit) = query.pagination.params();

    let pool = state.pools.acquire().await;
    let mut conn = pool.acquire().await.map_err(|e| Error::Database(DbError::from(e)))?;
    let mut repo = Broadcasts::new(&mut conn);

    let total_count = repo.count().await?;
    let broadcasts = repo.list(&BroadcastFilter::new(skip, limit)).await?;

    let data = broadcasts.into_iter().map(|b| BroadcastResponse::new(b, editable)).collect();
    Ok(Json(PaginatedResponse::new(data, total_count, skip, limit)))
}

#[utoipa::path(
    get,
    path = "/broadcasts/{id}",
    tag = "broadcasts",
    summary = "Get a broadcast",
    params(("id" = uuid::Uuid, Path, description = "Broadcast ID")),
    responses(
        (status = 200, description = "The broadcast", body = BroadcastResponse),
        (status = 404, description = "No such broadcast", body = crate::errors::ErrorBody),
        (status = 503, description = "Database unavailable", body = crate::errors::ErrorBody),
    ),
    security((), ("cookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(broadcast_id = %abbrev_uuid(&id)))]
pub async fn get_broadcast(
    State(state): State<AppState>,
    Path(id): Path<BroadcastId>,
    current_user: Option<CurrentUser>,
) -> Result<Json<BroadcastResponse>> {
    let pool = state.pools.acquire().await;
    let mut conn = pool.acquire().await.map_err(|e| Error::Database(DbError::from(e)))?;

    let broadcast = Broadcasts::new(&mut conn).get_by_id(id).await?.ok_or_else(|| Error::NotFound {
        resource: "Broadcast".to_string(),
        id: id.to_string(),
    })?;

    Ok(Json(BroadcastResponse::new(broadcast, can_edit(current_user.as_ref()))))
}

#[utoipa::path(
    patch,
    path = "/broadcasts/{id}",
    tag = "broadcasts",
    summary = "Edit a broadcast",
    description = "Partially update a broadcast. Requires `broadcast:update_partially`.",
    params(("id" = uuid::Uuid, Path, description = "Broadcast ID")),
    request_body = BroadcastUpdate,
    responses(
        (status = 200, description = "The updated broadcast", body = BroadcastResponse),
        (status = 400, description = "Invalid title", body = crate::errors::ErrorBody),
        (status = 401, description = "No valid session", body = crate::errors::ErrorBody),
        (status = 403, description = "Missing `broadcast:update_partially`", body = crate::errors::ErrorBody),
        (status = 404, description = "No such broadcast", body = crate::errors::ErrorBody),
    ),
    security(("cookieAuth" = []))
)]
#[tracing::instrument(skip_all, fields(broadcast_id = %abbrev_uuid(&id)))]
pub async fn update_broadcast(
    State(state): State<AppState>,
    Path(id): Path<BroadcastId>,
    current: RequiresPermission<resource::Broadcasts, operation::UpdatePartially>,
    Json(update): Json<BroadcastUpdate>,
) -> Result<Json<BroadcastResponse>> {
    update.validate().map_err(|message| Error::BadRequest { message })?;

    let pool = state.pools.acquire().await;
    let mut tx = pool.begin().await.map_err(|e| Error::Database(DbError::from(e)))?;

    let updated = Broadcasts::new(&mut tx)
        .update(id, &BroadcastUpdateDBRequest::from(update))
        .await
        .map_err(|e| match e {
            DbError::NotFound => Error::NotFound {
                resource: "Broadcast".to_string(),
                id: id.to_string(),
            },
            other => Error::Database(other),
        })?;
    tx.commit().await.map_err(|e| Error::Database(DbError::from(e)))?;

    info!(user_id = %abbrev_uuid(&current.user.id), "Broadcast updated");
    Ok(Json(BroadcastResponse::new(updated, true)))
}
