use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{ItemId, id_param, require_reference};
use crate::{
    AppState,
    error::{AppError, AppJson, AppQuery, AppResult, FieldErrors},
    models::{News, NewsPayload},
    repository::{NewsQuery, SortOrder, search_terms},
};

/// Uploads larger than this are rejected while the body is read.
pub const IMAGE_BODY_LIMIT: usize = 5 * 1024 * 1024;

/// Key prefix for uploaded news images.
const IMAGE_PREFIX: &str = "news_images";

const NOT_AN_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";

/// NewsFilter
///
/// Query parameters accepted by GET /news. Ids arrive as raw strings so that a
/// blank value can be treated as absent and a malformed one reported per field.
#[derive(Debug, Default, Deserialize)]
pub struct NewsFilter {
    pub category: Option<String>,
    pub area: Option<String>,
    pub district: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

impl NewsFilter {
    pub fn into_query(self) -> Result<NewsQuery, FieldErrors> {
        let mut errors = FieldErrors::new();
        let category = id_param(&mut errors, "category", self.category.as_deref());
        let area = id_param(&mut errors, "area", self.area.as_deref());
        let district = id_param(&mut errors, "district", self.district.as_deref());
        errors.into_result()?;
        Ok(NewsQuery {
            category,
            area,
            district,
            search: search_terms(self.search.as_deref()),
            ordering: SortOrder::parse(self.ordering.as_deref(), "created_at").unwrap_or_default(),
        })
    }
}

/// list_news
///
/// [Public Route] Filtered, searchable listing, newest first unless
/// `ordering=created_at`. A well-formed filter id naming nothing is a 404.
pub async fn list_news(
    State(state): State<AppState>,
    AppQuery(filter): AppQuery<NewsFilter>,
) -> AppResult<Json<Vec<News>>> {
    let query = filter.into_query()?;

    if let Some(id) = query.category {
        state.repo.get_category(id).await?.ok_or(AppError::NotFound)?;
    }
    if let Some(id) = query.area {
        state.repo.get_area(id).await?.ok_or(AppError::NotFound)?;
    }
    if let Some(id) = query.district {
        state.repo.get_district(id).await?.ok_or(AppError::NotFound)?;
    }

    Ok(Json(state.repo.list_news(&query).await?))
}

/// [Public Route]
pub async fn get_news(State(state): State<AppState>, ItemId(id): ItemId) -> AppResult<Json<News>> {
    state.repo.get_news(id).await?.map(Json).ok_or(AppError::NotFound)
}

/// Checks the category and area a write points at, reporting both at once.
async fn check_references(
    state: &AppState,
    category_id: Option<i64>,
    area_id: Option<i64>,
) -> AppResult<()> {
    let mut errors = FieldErrors::new();
    if let Some(id) = category_id {
        if let Err(AppError::Validation(e)) =
            require_reference(state.repo.get_category(id).await?, "category_id", id)
        {
            errors.merge(e);
        }
    }
    if let Some(id) = area_id {
        if let Err(AppError::Validation(e)) =
            require_reference(state.repo.get_area(id).await?, "area_id", id)
        {
            errors.merge(e);
        }
    }
    Ok(errors.into_result()?)
}

/// create_news
///
/// [Admin Route] Category and area must already exist.
pub async fn create_news(
    State(state): State<AppState>,
    AppJson(payload): AppJson<NewsPayload>,
) -> AppResult<(StatusCode, Json<News>)> {
    let news = payload.into_new()?;
    check_references(&state, Some(news.category_id), Some(news.area_id)).await?;
    let news = state.repo.create_news(&news).await?;
    tracing::info!(news_id = news.id, "news created");
    Ok((StatusCode::CREATED, Json(news)))
}

/// [Admin Route] Full replacement of the writable fields.
pub async fn update_news(
    State(state): State<AppState>,
    ItemId(id): ItemId,
    AppJson(payload): AppJson<NewsPayload>,
) -> AppResult<Json<News>> {
    state.repo.get_news(id).await?.ok_or(AppError::NotFound)?;
    let news = payload.into_new()?;
    check_references(&state, Some(news.category_id), Some(news.area_id)).await?;
    let updated = state.repo.update_news(id, &news.into()).await?.ok_or(AppError::NotFound)?;
    tracing::info!(news_id = id, "news updated");
    Ok(Json(updated))
}

/// [Admin Route] Only the fields present in the body change.
pub async fn patch_news(
    State(state): State<AppState>,
    ItemId(id): ItemId,
    AppJson(payload): AppJson<NewsPayload>,
) -> AppResult<Json<News>> {
    state.repo.get_news(id).await?.ok_or(AppError::NotFound)?;
    let changes = payload.into_changes()?;
    check_references(&state, changes.category_id, changes.area_id).await?;
    let updated = state.repo.update_news(id, &changes).await?.ok_or(AppError::NotFound)?;
    tracing::info!(news_id = id, "news updated");
    Ok(Json(updated))
}

/// [Admin Route] Also removes the item's comments.
pub async fn delete_news(State(state): State<AppState>, ItemId(id): ItemId) -> AppResult<StatusCode> {
    if state.repo.delete_news(id).await? {
        tracing::info!(news_id = id, "news deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

/// upload_image
///
/// [Admin Route] Accepts a multipart form with one `image` part of an `image/*`
/// type, stores it under a fresh key and records the key on the news item.
pub async fn upload_image(
    State(state): State<AppState>,
    ItemId(id): ItemId,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<News>> {
    state.repo.get_news(id).await?.ok_or(AppError::NotFound)?;
    let mut multipart = multipart.map_err(|e| AppError::field("image", e.body_text()))?;

    let mut upload = None;
    while let Some(field) =
        multipart.next_field().await.map_err(|e| AppError::field("image", e.body_text()))?
    {
        if field.name() != Some("image") {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_ascii_lowercase();
        if !content_type.starts_with("image/") {
            return Err(AppError::field("image", NOT_AN_IMAGE));
        }
        let extension = image_extension(field.file_name(), &content_type);
        let body = field.bytes().await.map_err(|e| AppError::field("image", e.body_text()))?;
        if body.is_empty() {
            return Err(AppError::field("image", "The submitted file is empty."));
        }
        upload = Some((content_type, extension, body.to_vec()));
        break;
    }

    let Some((content_type, extension, body)) = upload else {
        return Err(AppError::field("image", "No file was submitted."));
    };

    let key = format!("{IMAGE_PREFIX}/{}.{extension}", Uuid::new_v4());
    state
        .storage
        .put_object(&key, &content_type, body)
        .await
        .map_err(|e| AppError::Internal(format!("storage: {e}")))?;

    let news = state.repo.set_news_image(id, &key).await?.ok_or(AppError::NotFound)?;
    tracing::info!(news_id = id, %key, "news image stored");
    Ok(Json(news))
}

/// Extension for the stored object: the uploaded file's own extension when it
/// is a plain short token, otherwise derived from the MIME subtype.
pub fn image_extension(file_name: Option<&str>, content_type: &str) -> String {
    let from_name = file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    if let Some(ext) = from_name {
        return ext;
    }
    let subtype = content_type
        .strip_prefix("image/")
        .unwrap_or_default()
        .split(|c: char| c == '+' || c == ';')
        .next()
        .unwrap_or_default()
        .trim();
    match subtype {
        "jpeg" | "pjpeg" => "jpg".to_string(),
        other if !other.is_empty() && other.chars().all(|c| c.is_ascii_alphanumeric()) => {
            other.to_string()
        }
        _ => "bin".to_string(),
    }
}
