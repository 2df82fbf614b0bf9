use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use serde::Deserialize;

use crate::{
    error::{AppError, AppResult, FieldErrors},
    repository::{NameQuery, SortOrder, search_terms},
};

pub mod auth;
pub mod catalog;
pub mod comments;
pub mod news;

pub const INVALID_INTEGER: &str = "A valid integer is required.";

/// ItemId
///
/// The `{id}` path segment of a single-record route. A segment that is not an
/// integer cannot name a record, so it is a 404 rather than a 400.
#[derive(Debug, Clone, Copy)]
pub struct ItemId(pub i64);

impl<S: Send + Sync> FromRequestParts<S> for ItemId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| AppError::NotFound)?;
        raw.trim().parse().map(ItemId).map_err(|_| AppError::NotFound)
    }
}

/// ListParams
///
/// `?search=...&ordering=name|-name` for the name-only listings.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub ordering: Option<String>,
}

impl ListParams {
    pub fn into_query(self) -> NameQuery {
        NameQuery {
            search: search_terms(self.search.as_deref()),
            ordering: SortOrder::parse(self.ordering.as_deref(), "name"),
        }
    }
}

/// Reads an optional integer query parameter. A blank value counts as absent;
/// anything else that is not an integer is recorded against `name`.
pub(crate) fn id_param(errors: &mut FieldErrors, name: &str, raw: Option<&str>) -> Option<i64> {
    let raw = raw.map(str::trim).filter(|value| !value.is_empty())?;
    match raw.parse() {
        Ok(id) => Some(id),
        Err(_) => {
            errors.add(name, INVALID_INTEGER);
            None
        }
    }
}

/// Field error for a write that references a record which does not exist.
pub(crate) fn missing_pk(field: &str, id: i64) -> AppError {
    AppError::field(field, format!("Invalid pk \"{id}\" - object does not exist."))
}

/// Fails with [`missing_pk`] unless the referenced record was found.
pub(crate) fn require_reference<T>(found: Option<T>, field: &str, id: i64) -> AppResult<()> {
    match found {
        Some(_) => Ok(()),
        None => Err(missing_pk(field, id)),
    }
}
