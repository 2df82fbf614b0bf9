use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, postgres::PgRow, query_builder::QueryBuilder};

use super::{NameQuery, NewsQuery, RepoError, RepoResult, Repository, SortOrder};
use crate::models::{
    Area, AreaChanges, Category, Comment, CommentChanges, District, NewArea, NewComment, NewNews,
    NewUser, News, NewsChanges, User,
};

const USER_COLUMNS: &str =
    "id, username, email, password, role, is_staff, is_active, last_login, date_joined";

/// PostgresRepository
///
/// The production implementation of [`Repository`], backed by a PostgreSQL pool.
/// Writes that must return a joined view use a single `WITH ... RETURNING` statement,
/// so the write and the read-back are one atomic unit of work.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn list_named<T>(&self, table: &str, query: &NameQuery) -> RepoResult<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT id, name FROM {table} WHERE TRUE"));
        for term in &query.search {
            builder.push(" AND name ILIKE ").push_bind(like_pattern(term));
        }
        builder.push(match query.ordering {
            None => " ORDER BY id",
            Some(SortOrder::Ascending) => " ORDER BY name ASC, id ASC",
            Some(SortOrder::Descending) => " ORDER BY name DESC, id DESC",
        });
        Ok(builder.build_query_as::<T>().fetch_all(&self.pool).await?)
    }

    async fn get_named<T>(&self, table: &str, id: i64) -> RepoResult<Option<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let sql = format!("SELECT id, name FROM {table} WHERE id = $1");
        Ok(sqlx::query_as::<_, T>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn create_named<T>(&self, table: &'static str, entity: &'static str, name: &str) -> RepoResult<T>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let sql = format!("INSERT INTO {table} (name) VALUES ($1) RETURNING id, name");
        sqlx::query_as::<_, T>(&sql)
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| write_error(e, table, entity, "name"))
    }

    async fn rename_named<T>(
        &self,
        table: &'static str,
        entity: &'static str,
        id: i64,
        name: &str,
    ) -> RepoResult<Option<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let sql = format!("UPDATE {table} SET name = $2 WHERE id = $1 RETURNING id, name");
        sqlx::query_as::<_, T>(&sql)
            .bind(id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| write_error(e, table, entity, "name"))
    }

    async fn delete_row(&self, table: &str, id: i64) -> RepoResult<bool> {
        let sql = format!("DELETE FROM {table} WHERE id = $1");
        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_districts(&self, query: &NameQuery) -> RepoResult<Vec<District>> {
        self.list_named("districts", query).await
    }

    async fn get_district(&self, id: i64) -> RepoResult<Option<District>> {
        self.get_named("districts", id).await
    }

    async fn create_district(&self, name: &str) -> RepoResult<District> {
        self.create_named("districts", "district", name).await
    }

    async fn rename_district(&self, id: i64, name: &str) -> RepoResult<Option<District>> {
        self.rename_named("districts", "district", id, name).await
    }

    async fn delete_district(&self, id: i64) -> RepoResult<bool> {
        self.delete_row("districts", id).await
    }

    async fn list_categories(&self, query: &NameQuery) -> RepoResult<Vec<Category>> {
        self.list_named("categories", query).await
    }

    async fn get_category(&self, id: i64) -> RepoResult<Option<Category>> {
        self.get_named("categories", id).await
    }

    async fn create_category(&self, name: &str) -> RepoResult<Category> {
        self.create_named("categories", "category", name).await
    }

    async fn rename_category(&self, id: i64, name: &str) -> RepoResult<Option<Category>> {
        self.rename_named("categories", "category", id, name).await
    }

    async fn delete_category(&self, id: i64) -> RepoResult<bool> {
        self.delete_row("categories", id).await
    }

    async fn list_areas(&self) -> RepoResult<Vec<Area>> {
        let sql = format!("{} ORDER BY a.id", area_select("areas"));
        let rows = sqlx::query_as::<_, AreaRow>(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Area::from).collect())
    }

    async fn get_area(&self, id: i64) -> RepoResult<Option<Area>> {
        let sql = format!("{} WHERE a.id = $1", area_select("areas"));
        let row = sqlx::query_as::<_, AreaRow>(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(Area::from))
    }

    async fn create_area(&self, area: &NewArea) -> RepoResult<Area> {
        let sql = format!(
            "WITH written AS (INSERT INTO areas (name, district_id) VALUES ($1, $2) RETURNING *) {}",
            area_select("written")
        );
        let row = sqlx::query_as::<_, AreaRow>(&sql)
            .bind(&area.name)
            .bind(area.district_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| write_error(e, "areas", "area", "name"))?;
        Ok(row.into())
    }

    async fn update_area(&self, id: i64, changes: &AreaChanges) -> RepoResult<Option<Area>> {
        let sql = format!(
            r#"WITH written AS (
                UPDATE areas
                SET name = COALESCE($2, name),
                    district_id = COALESCE($3, district_id)
                WHERE id = $1
                RETURNING *
            ) {}"#,
            area_select("written")
        );
        let row = sqlx::query_as::<_, AreaRow>(&sql)
            .bind(id)
            .bind(changes.name.as_deref())
            .bind(changes.district_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| write_error(e, "areas", "area", "name"))?;
        Ok(row.map(Area::from))
    }

    async fn delete_area(&self, id: i64) -> RepoResult<bool> {
        self.delete_row("areas", id).await
    }

    /// list_news
    ///
    /// Builds the filter with `QueryBuilder` so every user-supplied value is bound,
    /// never interpolated.
    async fn list_news(&self, query: &NewsQuery) -> RepoResult<Vec<News>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(news_select("news"));
        builder.push(" WHERE TRUE");

        if let Some(category) = query.category {
            builder.push(" AND n.category_id = ").push_bind(category);
        }
        if let Some(area) = query.area {
            builder.push(" AND n.area_id = ").push_bind(area);
        }
        if let Some(district) = query.district {
            builder.push(" AND a.district_id = ").push_bind(district);
        }

        for term in &query.search {
            let pattern = like_pattern(term);
            builder.push(" AND (n.title ILIKE ").push_bind(pattern.clone());
            builder.push(" OR n.content ILIKE ").push_bind(pattern.clone());
            builder.push(" OR c.name ILIKE ").push_bind(pattern.clone());
            builder.push(" OR a.name ILIKE ").push_bind(pattern.clone());
            builder.push(" OR d.name ILIKE ").push_bind(pattern);
            builder.push(")");
        }

        builder.push(match query.ordering {
            SortOrder::Ascending => " ORDER BY n.created_at ASC, n.id ASC",
            SortOrder::Descending => " ORDER BY n.created_at DESC, n.id DESC",
        });

        let rows = builder.build_query_as::<NewsRow>().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(News::from).collect())
    }

    async fn get_news(&self, id: i64) -> RepoResult<Option<News>> {
        let sql = format!("{} WHERE n.id = $1", news_select("news"));
        let row = sqlx::query_as::<_, NewsRow>(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.map(News::from))
    }

    async fn create_news(&self, news: &NewNews) -> RepoResult<News> {
        let sql = format!(
            r#"WITH written AS (
                INSERT INTO news (title, content, category_id, area_id, created_at, updated_at)
                VALUES ($1, $2, $3, $4, NOW(), NOW())
                RETURNING *
            ) {}"#,
            news_select("written")
        );
        let row = sqlx::query_as::<_, NewsRow>(&sql)
            .bind(&news.title)
            .bind(&news.content)
            .bind(news.category_id)
            .bind(news.area_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| write_error(e, "news", "news", "title"))?;
        Ok(row.into())
    }

    /// update_news
    ///
    /// `COALESCE` keeps the stored value for every field left as `None`.
    async fn update_news(&self, id: i64, changes: &NewsChanges) -> RepoResult<Option<News>> {
        let sql = format!(
            r#"WITH written AS (
                UPDATE news
                SET title = COALESCE($2, title),
                    content = COALESCE($3, content),
                    category_id = COALESCE($4, category_id),
                    area_id = COALESCE($5, area_id),
                    updated_at = NOW()
                WHERE id = $1
                RETURNING *
            ) {}"#,
            news_select("written")
        );
        let row = sqlx::query_as::<_, NewsRow>(&sql)
            .bind(id)
            .bind(changes.title.as_deref())
            .bind(changes.content.as_deref())
            .bind(changes.category_id)
            .bind(changes.area_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| write_error(e, "news", "news", "title"))?;
        Ok(row.map(News::from))
    }

    async fn set_news_image(&self, id: i64, image_key: &str) -> RepoResult<Option<News>> {
        let sql = format!(
            "WITH written AS (UPDATE news SET image = $2, updated_at = NOW() WHERE id = $1 RETURNING *) {}",
            news_select("written")
        );
        let row = sqlx::query_as::<_, NewsRow>(&sql)
            .bind(id)
            .bind(image_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(News::from))
    }

    async fn delete_news(&self, id: i64) -> RepoResult<bool> {
        self.delete_row("news", id).await
    }

    async fn list_comments(&self, news_id: Option<i64>) -> RepoResult<Vec<Comment>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(comment_select("comments"));
        if let Some(news_id) = news_id {
            builder.push(" WHERE c.news_id = ").push_bind(news_id);
        }
        builder.push(" ORDER BY c.created_at DESC, c.id DESC");
        Ok(builder.build_query_as::<Comment>().fetch_all(&self.pool).await?)
    }

    async fn get_comment(&self, id: i64) -> RepoResult<Option<Comment>> {
        let sql = format!("{} WHERE c.id = $1", comment_select("comments"));
        Ok(sqlx::query_as::<_, Comment>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    /// create_comment
    ///
    /// Inserts and joins the author's username in one statement.
    async fn create_comment(&self, comment: &NewComment) -> RepoResult<Comment> {
        let sql = format!(
            r#"WITH written AS (
                INSERT INTO comments (news_id, user_id, content, created_at)
                VALUES ($1, $2, $3, NOW())
                RETURNING *
            ) {}"#,
            comment_select("written")
        );
        sqlx::query_as::<_, Comment>(&sql)
            .bind(comment.news_id)
            .bind(comment.user_id)
            .bind(&comment.content)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| write_error(e, "comments", "comment", "id"))
    }

    async fn update_comment(&self, id: i64, changes: &CommentChanges) -> RepoResult<Option<Comment>> {
        let sql = format!(
            r#"WITH written AS (
                UPDATE comments
                SET news_id = COALESCE($2, news_id),
                    content = COALESCE($3, content)
                WHERE id = $1
                RETURNING *
            ) {}"#,
            comment_select("written")
        );
        sqlx::query_as::<_, Comment>(&sql)
            .bind(id)
            .bind(changes.news_id)
            .bind(changes.content.as_deref())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| write_error(e, "comments", "comment", "id"))
    }

    async fn delete_comment(&self, id: i64) -> RepoResult<bool> {
        self.delete_row("comments", id).await
    }

    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql).bind(id).fetch_optional(&self.pool).await?)
    }

    async fn find_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        Ok(sqlx::query_as::<_, User>(&sql).bind(username).fetch_optional(&self.pool).await?)
    }

    /// create_user
    ///
    /// Role and staff flag are part of the insert itself; there is no follow-up
    /// write that could expose a half-elevated account.
    async fn create_user(&self, user: &NewUser) -> RepoResult<User> {
        let sql = format!(
            r#"INSERT INTO users (username, email, password, role, is_staff, is_active, date_joined)
               VALUES ($1, $2, $3, $4, $5, TRUE, NOW())
               RETURNING {USER_COLUMNS}"#
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.is_staff)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| write_error(e, "users", "user", "username"))
    }
}

// --- Row shapes and SQL fragments ---

#[derive(FromRow)]
struct AreaRow {
    id: i64,
    name: String,
    district_id: i64,
    district_name: String,
}

impl From<AreaRow> for Area {
    fn from(row: AreaRow) -> Self {
        Area {
            id: row.id,
            name: row.name,
            district: District { id: row.district_id, name: row.district_name },
        }
    }
}

#[derive(FromRow)]
struct NewsRow {
    id: i64,
    title: String,
    content: String,
    image: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    category_id: i64,
    category_name: String,
    area_id: i64,
    area_name: String,
    district_id: i64,
    district_name: String,
}

impl From<NewsRow> for News {
    fn from(row: NewsRow) -> Self {
        News {
            id: row.id,
            title: row.title,
            content: row.content,
            image: row.image,
            category: Category { id: row.category_id, name: row.category_name },
            area: Area {
                id: row.area_id,
                name: row.area_name,
                district: District { id: row.district_id, name: row.district_name },
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn area_select(source: &str) -> String {
    format!(
        "SELECT a.id, a.name, d.id AS district_id, d.name AS district_name \
         FROM {source} a JOIN districts d ON d.id = a.district_id"
    )
}

fn news_select(source: &str) -> String {
    format!(
        r#"SELECT n.id, n.title, n.content, n.image, n.created_at, n.updated_at,
               c.id AS category_id, c.name AS category_name,
               a.id AS area_id, a.name AS area_name,
               d.id AS district_id, d.name AS district_name
           FROM {source} n
           JOIN categories c ON c.id = n.category_id
           JOIN areas a ON a.id = n.area_id
           JOIN districts d ON d.id = a.district_id"#
    )
}

fn comment_select(source: &str) -> String {
    format!(
        r#"SELECT c.id, c.news_id AS news, u.username AS "user", c.content, c.created_at
           FROM {source} c JOIN users u ON u.id = c.user_id"#
    )
}

/// Case-insensitive substring pattern with LIKE metacharacters escaped.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

/// Translates constraint violations on a write into [`RepoError`] variants.
fn write_error(
    err: sqlx::Error,
    table: &str,
    entity: &'static str,
    unique_field: &'static str,
) -> RepoError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return RepoError::Duplicate { entity, field: unique_field };
        }
        if db.is_foreign_key_violation() {
            let field = db
                .constraint()
                .map(|constraint| reference_field(table, constraint))
                .unwrap_or_else(|| "non_field_errors".to_string());
            return RepoError::MissingReference { field };
        }
    }
    RepoError::Database(err)
}

/// `news_category_id_fkey` on `news` becomes `category_id`; the comment's
/// `news_id` column is exposed as `news`.
fn reference_field(table: &str, constraint: &str) -> String {
    let column = constraint
        .strip_suffix("_fkey")
        .and_then(|rest| rest.strip_prefix(table))
        .and_then(|rest| rest.strip_prefix('_'))
        .unwrap_or(constraint);
    match (table, column) {
        ("comments", "news_id") => "news".to_string(),
        _ => column.to_string(),
    }
}
