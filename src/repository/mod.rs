use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    Area, AreaChanges, Category, Comment, CommentChanges, District, NewArea, NewComment, NewNews,
    NewUser, News, NewsChanges, User,
};

mod memory;
mod postgres;

pub use memory::MemoryRepository;
pub use postgres::PostgresRepository;

/// RepoError
///
/// Store-level failures. Constraint violations are surfaced as their own variants
/// so the HTTP layer can turn them into field errors instead of leaking SQL.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{entity} with this {field} already exists")]
    Duplicate { entity: &'static str, field: &'static str },

    #[error("referenced {field} does not exist")]
    MissingReference { field: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// SortOrder
///
/// Direction for the single orderable field of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

impl SortOrder {
    /// Reads an `ordering` parameter such as `created_at` or `-created_at`.
    /// Comma-separated lists are scanned for the first term naming `field`;
    /// terms naming anything else are ignored.
    pub fn parse(raw: Option<&str>, field: &str) -> Option<SortOrder> {
        raw?.split(',').map(str::trim).find_map(|term| match term.strip_prefix('-') {
            Some(name) if name == field => Some(SortOrder::Descending),
            None if term == field => Some(SortOrder::Ascending),
            _ => None,
        })
    }
}

/// Splits a `search` parameter into terms on whitespace and commas.
pub fn search_terms(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|term| !term.is_empty())
        .map(|term| term.replace('\0', ""))
        .collect()
}

/// NameQuery
///
/// Listing options for name-only resources (categories, districts).
/// Without an ordering the listing is by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NameQuery {
    pub search: Vec<String>,
    pub ordering: Option<SortOrder>,
}

/// NewsQuery
///
/// Every filter is optional; `None`/empty means no constraint on that dimension.
/// Filters combine with AND. Each search term must match at least one of title,
/// content, category name, area name or district name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewsQuery {
    pub category: Option<i64>,
    pub area: Option<i64>,
    pub district: Option<i64>,
    pub search: Vec<String>,
    pub ordering: SortOrder,
}

/// Repository Trait
///
/// Abstract contract for all persistence. Handlers only see this trait, so the
/// Postgres store and the in-memory store are interchangeable behind
/// `Arc<dyn Repository>`. Every write is a single atomic unit of work.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Districts ---
    async fn list_districts(&self, query: &NameQuery) -> RepoResult<Vec<District>>;
    async fn get_district(&self, id: i64) -> RepoResult<Option<District>>;
    async fn create_district(&self, name: &str) -> RepoResult<District>;
    async fn rename_district(&self, id: i64, name: &str) -> RepoResult<Option<District>>;
    /// Cascades to the district's areas, their news and those news' comments.
    async fn delete_district(&self, id: i64) -> RepoResult<bool>;

    // --- Categories ---
    async fn list_categories(&self, query: &NameQuery) -> RepoResult<Vec<Category>>;
    async fn get_category(&self, id: i64) -> RepoResult<Option<Category>>;
    async fn create_category(&self, name: &str) -> RepoResult<Category>;
    async fn rename_category(&self, id: i64, name: &str) -> RepoResult<Option<Category>>;
    async fn delete_category(&self, id: i64) -> RepoResult<bool>;

    // --- Areas ---
    async fn list_areas(&self) -> RepoResult<Vec<Area>>;
    async fn get_area(&self, id: i64) -> RepoResult<Option<Area>>;
    async fn create_area(&self, area: &NewArea) -> RepoResult<Area>;
    async fn update_area(&self, id: i64, changes: &AreaChanges) -> RepoResult<Option<Area>>;
    async fn delete_area(&self, id: i64) -> RepoResult<bool>;

    // --- News ---
    async fn list_news(&self, query: &NewsQuery) -> RepoResult<Vec<News>>;
    async fn get_news(&self, id: i64) -> RepoResult<Option<News>>;
    async fn create_news(&self, news: &NewNews) -> RepoResult<News>;
    /// Applies the present fields and bumps `updated_at`.
    async fn update_news(&self, id: i64, changes: &NewsChanges) -> RepoResult<Option<News>>;
    async fn set_news_image(&self, id: i64, image_key: &str) -> RepoResult<Option<News>>;
    async fn delete_news(&self, id: i64) -> RepoResult<bool>;

    // --- Comments ---
    /// Most recent first, optionally scoped to one news item.
    async fn list_comments(&self, news_id: Option<i64>) -> RepoResult<Vec<Comment>>;
    async fn get_comment(&self, id: i64) -> RepoResult<Option<Comment>>;
    async fn create_comment(&self, comment: &NewComment) -> RepoResult<Comment>;
    async fn update_comment(&self, id: i64, changes: &CommentChanges) -> RepoResult<Option<Comment>>;
    async fn delete_comment(&self, id: i64) -> RepoResult<bool>;

    // --- Users ---
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    /// Inserts the user with its final role and staff flag in one write.
    async fn create_user(&self, user: &NewUser) -> RepoResult<User>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
