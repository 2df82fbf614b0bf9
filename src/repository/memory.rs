use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use super::{NameQuery, NewsQuery, RepoError, RepoResult, Repository, SortOrder};
use crate::models::{
    Area, AreaChanges, Category, Comment, CommentChanges, District, NewArea, NewComment, NewNews,
    NewUser, News, NewsChanges, User,
};

/// MemoryRepository
///
/// In-process implementation of [`Repository`] with the same constraint, cascade
/// and filtering behavior as the Postgres store. Each operation holds the table
/// lock for its whole duration, so writes are atomic. Used by the test-suite and
/// for running the router without a database.
#[derive(Default)]
pub struct MemoryRepository {
    tables: RwLock<Tables>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

struct AreaRecord {
    name: String,
    district_id: i64,
}

struct NewsRecord {
    title: String,
    content: String,
    image: Option<String>,
    category_id: i64,
    area_id: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

struct CommentRecord {
    news_id: i64,
    user_id: i64,
    content: String,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    last_id: i64,
    last_timestamp: Option<DateTime<Utc>>,
    districts: BTreeMap<i64, String>,
    categories: BTreeMap<i64, String>,
    areas: BTreeMap<i64, AreaRecord>,
    news: BTreeMap<i64, NewsRecord>,
    comments: BTreeMap<i64, CommentRecord>,
    users: BTreeMap<i64, User>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    /// Strictly increasing clock so creation order is always observable.
    fn now(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_timestamp {
            if now <= last {
                now = last + Duration::microseconds(1);
            }
        }
        self.last_timestamp = Some(now);
        now
    }

    fn area(&self, id: i64) -> Option<Area> {
        let record = self.areas.get(&id)?;
        let district = self.districts.get(&record.district_id)?;
        Some(Area {
            id,
            name: record.name.clone(),
            district: District { id: record.district_id, name: district.clone() },
        })
    }

    fn news_item(&self, id: i64) -> Option<News> {
        let record = self.news.get(&id)?;
        let category = self.categories.get(&record.category_id)?;
        Some(News {
            id,
            title: record.title.clone(),
            content: record.content.clone(),
            image: record.image.clone(),
            category: Category { id: record.category_id, name: category.clone() },
            area: self.area(record.area_id)?,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    fn comment(&self, id: i64) -> Option<Comment> {
        let record = self.comments.get(&id)?;
        let user = self.users.get(&record.user_id)?;
        Some(Comment {
            id,
            news: record.news_id,
            user: user.username.clone(),
            content: record.content.clone(),
            created_at: record.created_at,
        })
    }

    fn name_taken(names: &BTreeMap<i64, String>, name: &str, except: Option<i64>) -> bool {
        names.iter().any(|(id, existing)| existing == name && Some(*id) != except)
    }

    fn require(exists: bool, field: &str) -> RepoResult<()> {
        if exists {
            Ok(())
        } else {
            Err(RepoError::MissingReference { field: field.to_string() })
        }
    }

    fn remove_news(&mut self, id: i64) -> bool {
        self.comments.retain(|_, comment| comment.news_id != id);
        self.news.remove(&id).is_some()
    }

    fn remove_area(&mut self, id: i64) -> bool {
        let doomed: Vec<i64> =
            self.news.iter().filter(|(_, n)| n.area_id == id).map(|(id, _)| *id).collect();
        for news_id in doomed {
            self.remove_news(news_id);
        }
        self.areas.remove(&id).is_some()
    }
}

fn matches_terms(terms: &[String], fields: &[&str]) -> bool {
    let fields: Vec<String> = fields.iter().map(|f| f.to_lowercase()).collect();
    terms.iter().all(|term| {
        let term = term.to_lowercase();
        fields.iter().any(|field| field.contains(&term))
    })
}

fn list_names<T>(
    names: &BTreeMap<i64, String>,
    query: &NameQuery,
    build: impl Fn(i64, String) -> T,
) -> Vec<T> {
    let mut rows: Vec<(i64, &String)> = names
        .iter()
        .filter(|(_, name)| matches_terms(&query.search, &[name.as_str()]))
        .map(|(id, name)| (*id, name))
        .collect();
    match query.ordering {
        None => {}
        Some(SortOrder::Ascending) => rows.sort_by(|a, b| a.1.cmp(b.1).then(a.0.cmp(&b.0))),
        Some(SortOrder::Descending) => rows.sort_by(|a, b| b.1.cmp(a.1).then(b.0.cmp(&a.0))),
    }
    rows.into_iter().map(|(id, name)| build(id, name.clone())).collect()
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn list_districts(&self, query: &NameQuery) -> RepoResult<Vec<District>> {
        let tables = self.tables.read().await;
        Ok(list_names(&tables.districts, query, |id, name| District { id, name }))
    }

    async fn get_district(&self, id: i64) -> RepoResult<Option<District>> {
        let tables = self.tables.read().await;
        Ok(tables.districts.get(&id).map(|name| District { id, name: name.clone() }))
    }

    async fn create_district(&self, name: &str) -> RepoResult<District> {
        let mut tables = self.tables.write().await;
        if Tables::name_taken(&tables.districts, name, None) {
            return Err(RepoError::Duplicate { entity: "district", field: "name" });
        }
        let id = tables.next_id();
        tables.districts.insert(id, name.to_string());
        Ok(District { id, name: name.to_string() })
    }

    async fn rename_district(&self, id: i64, name: &str) -> RepoResult<Option<District>> {
        let mut tables = self.tables.write().await;
        if !tables.districts.contains_key(&id) {
            return Ok(None);
        }
        if Tables::name_taken(&tables.districts, name, Some(id)) {
            return Err(RepoError::Duplicate { entity: "district", field: "name" });
        }
        tables.districts.insert(id, name.to_string());
        Ok(Some(District { id, name: name.to_string() }))
    }

    async fn delete_district(&self, id: i64) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        let doomed: Vec<i64> =
            tables.areas.iter().filter(|(_, a)| a.district_id == id).map(|(id, _)| *id).collect();
        for area_id in doomed {
            tables.remove_area(area_id);
        }
        Ok(tables.districts.remove(&id).is_some())
    }

    async fn list_categories(&self, query: &NameQuery) -> RepoResult<Vec<Category>> {
        let tables = self.tables.read().await;
        Ok(list_names(&tables.categories, query, |id, name| Category { id, name }))
    }

    async fn get_category(&self, id: i64) -> RepoResult<Option<Category>> {
        let tables = self.tables.read().await;
        Ok(tables.categories.get(&id).map(|name| Category { id, name: name.clone() }))
    }

    async fn create_category(&self, name: &str) -> RepoResult<Category> {
        let mut tables = self.tables.write().await;
        if Tables::name_taken(&tables.categories, name, None) {
            return Err(RepoError::Duplicate { entity: "category", field: "name" });
        }
        let id = tables.next_id();
        tables.categories.insert(id, name.to_string());
        Ok(Category { id, name: name.to_string() })
    }

    async fn rename_category(&self, id: i64, name: &str) -> RepoResult<Option<Category>> {
        let mut tables = self.tables.write().await;
        if !tables.categories.contains_key(&id) {
            return Ok(None);
        }
        if Tables::name_taken(&tables.categories, name, Some(id)) {
            return Err(RepoError::Duplicate { entity: "category", field: "name" });
        }
        tables.categories.insert(id, name.to_string());
        Ok(Some(Category { id, name: name.to_string() }))
    }

    async fn delete_category(&self, id: i64) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        let doomed: Vec<i64> =
            tables.news.iter().filter(|(_, n)| n.category_id == id).map(|(id, _)| *id).collect();
        for news_id in doomed {
            tables.remove_news(news_id);
        }
        Ok(tables.categories.remove(&id).is_some())
    }

    async fn list_areas(&self) -> RepoResult<Vec<Area>> {
        let tables = self.tables.read().await;
        Ok(tables.areas.keys().filter_map(|id| tables.area(*id)).collect())
    }

    async fn get_area(&self, id: i64) -> RepoResult<Option<Area>> {
        Ok(self.tables.read().await.area(id))
    }

    async fn create_area(&self, area: &NewArea) -> RepoResult<Area> {
        let mut tables = self.tables.write().await;
        Tables::require(tables.districts.contains_key(&area.district_id), "district_id")?;
        if tables.areas.values().any(|a| a.name == area.name) {
            return Err(RepoError::Duplicate { entity: "area", field: "name" });
        }
        let id = tables.next_id();
        tables
            .areas
            .insert(id, AreaRecord { name: area.name.clone(), district_id: area.district_id });
        tables.area(id).ok_or(RepoError::MissingReference { field: "district_id".into() })
    }

    async fn update_area(&self, id: i64, changes: &AreaChanges) -> RepoResult<Option<Area>> {
        let mut tables = self.tables.write().await;
        if !tables.areas.contains_key(&id) {
            return Ok(None);
        }
        if let Some(district_id) = changes.district_id {
            Tables::require(tables.districts.contains_key(&district_id), "district_id")?;
        }
        if let Some(name) = &changes.name {
            if tables.areas.iter().any(|(other, a)| *other != id && &a.name == name) {
                return Err(RepoError::Duplicate { entity: "area", field: "name" });
            }
        }
        if let Some(record) = tables.areas.get_mut(&id) {
            if let Some(name) = &changes.name {
                record.name = name.clone();
            }
            if let Some(district_id) = changes.district_id {
                record.district_id = district_id;
            }
        }
        Ok(tables.area(id))
    }

    async fn delete_area(&self, id: i64) -> RepoResult<bool> {
        Ok(self.tables.write().await.remove_area(id))
    }

    async fn list_news(&self, query: &NewsQuery) -> RepoResult<Vec<News>> {
        let tables = self.tables.read().await;
        let mut items: Vec<News> = tables
            .news
            .keys()
            .filter_map(|id| tables.news_item(*id))
            .filter(|n| query.category.is_none_or(|c| n.category.id == c))
            .filter(|n| query.area.is_none_or(|a| n.area.id == a))
            .filter(|n| query.district.is_none_or(|d| n.area.district.id == d))
            .filter(|n| {
                matches_terms(
                    &query.search,
                    &[
                        n.title.as_str(),
                        n.content.as_str(),
                        n.category.name.as_str(),
                        n.area.name.as_str(),
                        n.area.district.name.as_str(),
                    ],
                )
            })
            .collect();
        items.sort_by(|a, b| match query.ordering {
            SortOrder::Ascending => a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)),
            SortOrder::Descending => b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)),
        });
        Ok(items)
    }

    async fn get_news(&self, id: i64) -> RepoResult<Option<News>> {
        Ok(self.tables.read().await.news_item(id))
    }

    async fn create_news(&self, news: &NewNews) -> RepoResult<News> {
        let mut tables = self.tables.write().await;
        Tables::require(tables.categories.contains_key(&news.category_id), "category_id")?;
        Tables::require(tables.areas.contains_key(&news.area_id), "area_id")?;
        let id = tables.next_id();
        let now = tables.now();
        tables.news.insert(
            id,
            NewsRecord {
                title: news.title.clone(),
                content: news.content.clone(),
                image: None,
                category_id: news.category_id,
                area_id: news.area_id,
                created_at: now,
                updated_at: now,
            },
        );
        tables.news_item(id).ok_or(RepoError::MissingReference { field: "area_id".into() })
    }

    async fn update_news(&self, id: i64, changes: &NewsChanges) -> RepoResult<Option<News>> {
        let mut tables = self.tables.write().await;
        if !tables.news.contains_key(&id) {
            return Ok(None);
        }
        if let Some(category_id) = changes.category_id {
            Tables::require(tables.categories.contains_key(&category_id), "category_id")?;
        }
        if let Some(area_id) = changes.area_id {
            Tables::require(tables.areas.contains_key(&area_id), "area_id")?;
        }
        let now = tables.now();
        if let Some(record) = tables.news.get_mut(&id) {
            if let Some(title) = &changes.title {
                record.title = title.clone();
            }
            if let Some(content) = &changes.content {
                record.content = content.clone();
            }
            if let Some(category_id) = changes.category_id {
                record.category_id = category_id;
            }
            if let Some(area_id) = changes.area_id {
                record.area_id = area_id;
            }
            record.updated_at = now;
        }
        Ok(tables.news_item(id))
    }

    async fn set_news_image(&self, id: i64, image_key: &str) -> RepoResult<Option<News>> {
        let mut tables = self.tables.write().await;
        let now = tables.now();
        match tables.news.get_mut(&id) {
            Some(record) => {
                record.image = Some(image_key.to_string());
                record.updated_at = now;
            }
            None => return Ok(None),
        }
        Ok(tables.news_item(id))
    }

    async fn delete_news(&self, id: i64) -> RepoResult<bool> {
        Ok(self.tables.write().await.remove_news(id))
    }

    async fn list_comments(&self, news_id: Option<i64>) -> RepoResult<Vec<Comment>> {
        let tables = self.tables.read().await;
        let mut items: Vec<Comment> = tables
            .comments
            .iter()
            .filter(|(_, c)| news_id.is_none_or(|n| c.news_id == n))
            .filter_map(|(id, _)| tables.comment(*id))
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(items)
    }

    async fn get_comment(&self, id: i64) -> RepoResult<Option<Comment>> {
        Ok(self.tables.read().await.comment(id))
    }

    async fn create_comment(&self, comment: &NewComment) -> RepoResult<Comment> {
        let mut tables = self.tables.write().await;
        Tables::require(tables.news.contains_key(&comment.news_id), "news")?;
        Tables::require(tables.users.contains_key(&comment.user_id), "user")?;
        let id = tables.next_id();
        let now = tables.now();
        tables.comments.insert(
            id,
            CommentRecord {
                news_id: comment.news_id,
                user_id: comment.user_id,
                content: comment.content.clone(),
                created_at: now,
            },
        );
        tables.comment(id).ok_or(RepoError::MissingReference { field: "news".into() })
    }

    async fn update_comment(&self, id: i64, changes: &CommentChanges) -> RepoResult<Option<Comment>> {
        let mut tables = self.tables.write().await;
        if !tables.comments.contains_key(&id) {
            return Ok(None);
        }
        if let Some(news_id) = changes.news_id {
            Tables::require(tables.news.contains_key(&news_id), "news")?;
        }
        if let Some(record) = tables.comments.get_mut(&id) {
            if let Some(news_id) = changes.news_id {
                record.news_id = news_id;
            }
            if let Some(content) = &changes.content {
                record.content = content.clone();
            }
        }
        Ok(tables.comment(id))
    }

    async fn delete_comment(&self, id: i64) -> RepoResult<bool> {
        Ok(self.tables.write().await.comments.remove(&id).is_some())
    }

    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn create_user(&self, user: &NewUser) -> RepoResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(RepoError::Duplicate { entity: "user", field: "username" });
        }
        let id = tables.next_id();
        let now = tables.now();
        let created = User {
            id,
            username: user.username.clone(),
            email: user.email.clone(),
            password: user.password_hash.clone(),
            role: user.role,
            is_staff: user.is_staff,
            is_active: true,
            last_login: None,
            date_joined: now,
        };
        tables.users.insert(id, created.clone());
        Ok(created)
    }
}
