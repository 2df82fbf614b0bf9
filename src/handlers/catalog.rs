//! Categories, districts and areas. Administrative data: every route here sits
//! behind the admin-only policy.

use axum::{Json, extract::State, http::StatusCode};

use super::{ItemId, ListParams, require_reference};
use crate::{
    AppState,
    error::{AppError, AppJson, AppQuery, AppResult},
    models::{Area, AreaPayload, Category, District, NamePayload},
};

// --- Categories ---

pub async fn list_categories(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<ListParams>,
) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(state.repo.list_categories(&params.into_query()).await?))
}

pub async fn get_category(
    State(state): State<AppState>,
    ItemId(id): ItemId,
) -> AppResult<Json<Category>> {
    state.repo.get_category(id).await?.map(Json).ok_or(AppError::NotFound)
}

pub async fn create_category(
    State(state): State<AppState>,
    AppJson(payload): AppJson<NamePayload>,
) -> AppResult<(StatusCode, Json<Category>)> {
    let name = payload.into_name()?;
    let category = state.repo.create_category(&name).await?;
    tracing::info!(category_id = category.id, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT replaces the name; PATCH may omit it, in which case nothing changes.
pub async fn update_category(
    State(state): State<AppState>,
    ItemId(id): ItemId,
    AppJson(payload): AppJson<NamePayload>,
) -> AppResult<Json<Category>> {
    state.repo.get_category(id).await?.ok_or(AppError::NotFound)?;
    let name = payload.into_name()?;
    state.repo.rename_category(id, &name).await?.map(Json).ok_or(AppError::NotFound)
}

pub async fn patch_category(
    State(state): State<AppState>,
    ItemId(id): ItemId,
    AppJson(payload): AppJson<NamePayload>,
) -> AppResult<Json<Category>> {
    let current = state.repo.get_category(id).await?.ok_or(AppError::NotFound)?;
    let updated = match payload.into_change()? {
        Some(name) => state.repo.rename_category(id, &name).await?,
        None => Some(current),
    };
    updated.map(Json).ok_or(AppError::NotFound)
}

pub async fn delete_category(
    State(state): State<AppState>,
    ItemId(id): ItemId,
) -> AppResult<StatusCode> {
    if state.repo.delete_category(id).await? {
        tracing::info!(category_id = id, "category deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

// --- Districts ---

pub async fn list_districts(
    State(state): State<AppState>,
    AppQuery(params): AppQuery<ListParams>,
) -> AppResult<Json<Vec<District>>> {
    Ok(Json(state.repo.list_districts(&params.into_query()).await?))
}

pub async fn get_district(
    State(state): State<AppState>,
    ItemId(id): ItemId,
) -> AppResult<Json<District>> {
    state.repo.get_district(id).await?.map(Json).ok_or(AppError::NotFound)
}

pub async fn create_district(
    State(state): State<AppState>,
    AppJson(payload): AppJson<NamePayload>,
) -> AppResult<(StatusCode, Json<District>)> {
    let name = payload.into_name()?;
    let district = state.repo.create_district(&name).await?;
    tracing::info!(district_id = district.id, "district created");
    Ok((StatusCode::CREATED, Json(district)))
}

pub async fn update_district(
    State(state): State<AppState>,
    ItemId(id): ItemId,
    AppJson(payload): AppJson<NamePayload>,
) -> AppResult<Json<District>> {
    state.repo.get_district(id).await?.ok_or(AppError::NotFound)?;
    let name = payload.into_name()?;
    state.repo.rename_district(id, &name).await?.map(Json).ok_or(AppError::NotFound)
}

pub async fn patch_district(
    State(state): State<AppState>,
    ItemId(id): ItemId,
    AppJson(payload): AppJson<NamePayload>,
) -> AppResult<Json<District>> {
    let current = state.repo.get_district(id).await?.ok_or(AppError::NotFound)?;
    let updated = match payload.into_change()? {
        Some(name) => state.repo.rename_district(id, &name).await?,
        None => Some(current),
    };
    updated.map(Json).ok_or(AppError::NotFound)
}

/// Removes the district together with its areas, their news and those news' comments.
pub async fn delete_district(
    State(state): State<AppState>,
    ItemId(id): ItemId,
) -> AppResult<StatusCode> {
    if state.repo.delete_district(id).await? {
        tracing::info!(district_id = id, "district deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

// --- Areas ---

pub async fn list_areas(State(state): State<AppState>) -> AppResult<Json<Vec<Area>>> {
    Ok(Json(state.repo.list_areas().await?))
}

pub async fn get_area(State(state): State<AppState>, ItemId(id): ItemId) -> AppResult<Json<Area>> {
    state.repo.get_area(id).await?.map(Json).ok_or(AppError::NotFound)
}

pub async fn create_area(
    State(state): State<AppState>,
    AppJson(payload): AppJson<AreaPayload>,
) -> AppResult<(StatusCode, Json<Area>)> {
    let area = payload.into_new()?;
    require_reference(state.repo.get_district(area.district_id).await?, "district_id", area.district_id)?;
    let area = state.repo.create_area(&area).await?;
    tracing::info!(area_id = area.id, district_id = area.district.id, "area created");
    Ok((StatusCode::CREATED, Json(area)))
}

pub async fn update_area(
    State(state): State<AppState>,
    ItemId(id): ItemId,
    AppJson(payload): AppJson<AreaPayload>,
) -> AppResult<Json<Area>> {
    state.repo.get_area(id).await?.ok_or(AppError::NotFound)?;
    let area = payload.into_new()?;
    require_reference(state.repo.get_district(area.district_id).await?, "district_id", area.district_id)?;
    state.repo.update_area(id, &area.into()).await?.map(Json).ok_or(AppError::NotFound)
}

pub async fn patch_area(
    State(state): State<AppState>,
    ItemId(id): ItemId,
    AppJson(payload): AppJson<AreaPayload>,
) -> AppResult<Json<Area>> {
    state.repo.get_area(id).await?.ok_or(AppError::NotFound)?;
    let changes = payload.into_changes()?;
    if let Some(district_id) = changes.district_id {
        require_reference(state.repo.get_district(district_id).await?, "district_id", district_id)?;
    }
    state.repo.update_area(id, &changes).await?.map(Json).ok_or(AppError::NotFound)
}

/// Removes the area together with its news and their comments.
pub async fn delete_area(State(state): State<AppState>, ItemId(id): ItemId) -> AppResult<StatusCode> {
    if state.repo.delete_area(id).await? {
        tracing::info!(area_id = id, "area deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}
