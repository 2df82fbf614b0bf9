use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use super::{ItemId, id_param, require_reference};
use crate::{
    AppState,
    auth::CurrentUser,
    error::{AppError, AppJson, AppQuery, AppResult, FieldErrors},
    models::{Comment, CommentChanges, CommentPayload},
};

#[derive(Debug, Default, Deserialize)]
pub struct CommentFilter {
    pub news: Option<String>,
}

/// list_comments
///
/// [Public Route] Most recent first; `?news=<id>` restricts to one news item,
/// which must exist.
pub async fn list_comments(
    State(state): State<AppState>,
    AppQuery(filter): AppQuery<CommentFilter>,
) -> AppResult<Json<Vec<Comment>>> {
    let mut errors = FieldErrors::new();
    let news_id = id_param(&mut errors, "news", filter.news.as_deref());
    errors.into_result()?;
    if let Some(id) = news_id {
        state.repo.get_news(id).await?.ok_or(AppError::NotFound)?;
    }
    Ok(Json(state.repo.list_comments(news_id).await?))
}

pub async fn get_comment(
    State(state): State<AppState>,
    ItemId(id): ItemId,
) -> AppResult<Json<Comment>> {
    state.repo.get_comment(id).await?.map(Json).ok_or(AppError::NotFound)
}

/// create_comment
///
/// [Authenticated Route] The author is always the caller; author fields in the
/// body are never read.
pub async fn create_comment(
    State(state): State<AppState>,
    author: CurrentUser,
    AppJson(payload): AppJson<CommentPayload>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    let comment = payload.into_new(author.id())?;
    require_reference(state.repo.get_news(comment.news_id).await?, "news", comment.news_id)?;
    let comment = state.repo.create_comment(&comment).await?;
    tracing::info!(comment_id = comment.id, news_id = comment.news, user_id = author.id(), "comment created");
    Ok((StatusCode::CREATED, Json(comment)))
}

/// [Authenticated Route] Full update of `news` and `content`; the author is kept.
pub async fn update_comment(
    State(state): State<AppState>,
    author: CurrentUser,
    ItemId(id): ItemId,
    AppJson(payload): AppJson<CommentPayload>,
) -> AppResult<Json<Comment>> {
    state.repo.get_comment(id).await?.ok_or(AppError::NotFound)?;
    let comment = payload.into_new(author.id())?;
    let changes = CommentChanges { news_id: Some(comment.news_id), content: Some(comment.content) };
    apply(&state, id, changes).await
}

/// [Authenticated Route]
pub async fn patch_comment(
    State(state): State<AppState>,
    ItemId(id): ItemId,
    AppJson(payload): AppJson<CommentPayload>,
) -> AppResult<Json<Comment>> {
    state.repo.get_comment(id).await?.ok_or(AppError::NotFound)?;
    let changes = payload.into_changes()?;
    apply(&state, id, changes).await
}

async fn apply(state: &AppState, id: i64, changes: CommentChanges) -> AppResult<Json<Comment>> {
    if let Some(news_id) = changes.news_id {
        require_reference(state.repo.get_news(news_id).await?, "news", news_id)?;
    }
    let comment = state.repo.update_comment(id, &changes).await?.ok_or(AppError::NotFound)?;
    tracing::info!(comment_id = id, "comment updated");
    Ok(Json(comment))
}

/// [Authenticated Route]
pub async fn delete_comment(
    State(state): State<AppState>,
    ItemId(id): ItemId,
) -> AppResult<StatusCode> {
    if state.repo.delete_comment(id).await? {
        tracing::info!(comment_id = id, "comment deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}
