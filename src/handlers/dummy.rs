// handlers/dummy.rs - CRUD for the sample resource

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::config::{app::scalar_u64, keys};
use crate::database::{Dummy, SharedRepository};
use crate::error::{ApiError, ApiResult};
use crate::middleware::{ApiResponse, HandlerResult};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    /// Zero-based page index
    pub page: Option<u32>,
    /// Rows per page, capped at `PAGE_SIZE_MAX`
    pub size: Option<u32>,
}

fn repository(state: &AppState) -> ApiResult<SharedRepository<Dummy>> {
    Ok(state.repository::<Dummy>(keys::DUMMY_REPOSITORY)?)
}

#[track_caller]
fn parse_id(id: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| ApiError::bad_request(format!("Invalid id '{}'", id)))
}

/// GET /dummy - One page of records
pub async fn list(State(state): State<AppState>, Query(query): Query<PageQuery>) -> HandlerResult<Vec<Dummy>> {
    let max = scalar_u64(keys::PAGE_SIZE_MAX, &state.container().get_value(keys::PAGE_SIZE_MAX)?)?;
    let max = u32::try_from(max).unwrap_or(u32::MAX).max(1);
    let size = query.size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, max);
    let page = query.page.unwrap_or(0);

    let rows = repository(&state)?.list(page, size).await?;
    Ok(ApiResponse::success(rows))
}

/// GET /dummy/:id - A single record, 404 if absent
pub async fn show(State(state): State<AppState>, Path(id): Path<String>) -> HandlerResult<Dummy> {
    let id = parse_id(&id)?;
    let dummy = repository(&state)?
        .get(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Dummy {} not found", id)))?;
    Ok(ApiResponse::success(dummy))
}

/// POST /dummy - Create a record; any client-supplied id is ignored
pub async fn create(State(state): State<AppState>, Json(mut dummy): Json<Dummy>) -> HandlerResult<Dummy> {
    dummy.id = None;
    let saved = repository(&state)?.save(dummy).await?;
    tracing::info!(id = ?saved.id, "Dummy created");
    Ok(ApiResponse::created(saved))
}

/// PUT /dummy/:id - Replace an existing record
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut dummy): Json<Dummy>,
) -> HandlerResult<Dummy> {
    let id = parse_id(&id)?;
    let repository = repository(&state)?;
    if repository.get(id).await?.is_none() {
        return Err(ApiError::not_found(format!("Dummy {} not found", id)));
    }

    dummy.id = Some(id);
    Ok(ApiResponse::success(repository.save(dummy).await?))
}

/// DELETE /dummy/:id
pub async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> HandlerResult<()> {
    let id = parse_id(&id)?;
    if !repository(&state)?.delete(id).await? {
        return Err(ApiError::not_found(format!("Dummy {} not found", id)));
    }
    tracing::info!(%id, "Dummy deleted");
    Ok(ApiResponse::no_content())
}
