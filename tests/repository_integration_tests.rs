//! Runs against a real Postgres. Ignored by default:
//! `DATABASE_URL=postgres://... cargo test -- --ignored`

use news_portal::{
    models::{CommentChanges, NewArea, NewComment, NewNews, NewUser, NewsChanges, Role},
    repository::{NameQuery, NewsQuery, PostgresRepository, RepoError, Repository, SortOrder},
};
use sqlx::PgPool;
use tokio::test;
use uuid::Uuid;

// --- Test Context and Setup ---

struct DbTestContext {
    pool: PgPool,
}

impl DbTestContext {
    async fn setup() -> Self {
        dotenv::dotenv().ok();

        let db_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set to run integration tests");

        let pool = PgPool::connect(&db_url)
            .await
            .expect("Failed to connect to database for integration tests.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run database migrations.");

        DbTestContext { pool }
    }

    fn repository(&self) -> PostgresRepository {
        PostgresRepository::new(self.pool.clone())
    }
}

/// Names are unique per table, so every test works with its own suffix.
fn unique(prefix: &str) -> String {
    format!("{prefix}-{}", &Uuid::new_v4().simple().to_string()[..12])
}

struct Seeded {
    district: i64,
    area: i64,
    category: i64,
    news: i64,
    marker: String,
}

async fn seed(repo: &PostgresRepository) -> Seeded {
    let marker = unique("story");
    let district = repo.create_district(&unique("district")).await.unwrap();
    let area = repo
        .create_area(&NewArea { name: unique("area"), district_id: district.id })
        .await
        .unwrap();
    let category = repo.create_category(&unique("category")).await.unwrap();
    let news = repo
        .create_news(&NewNews {
            title: format!("Headline {marker}"),
            content: "Body text".into(),
            category_id: category.id,
            area_id: area.id,
        })
        .await
        .unwrap();
    Seeded { district: district.id, area: area.id, category: category.id, news: news.id, marker }
}

async fn seed_user(repo: &PostgresRepository, role: Role) -> i64 {
    repo.create_user(&NewUser {
        username: unique("user"),
        email: String::new(),
        password_hash: "unusable".into(),
        role,
        is_staff: role == Role::Admin,
    })
    .await
    .unwrap()
    .id
}

// --- Tests ---

#[test]
#[ignore]
async fn test_named_resources_enforce_uniqueness() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let name = unique("category");

    let created = repo.create_category(&name).await.unwrap();
    assert_eq!(repo.get_category(created.id).await.unwrap().unwrap().name, name);
    assert!(matches!(
        repo.create_category(&name).await,
        Err(RepoError::Duplicate { entity: "category", field: "name" })
    ));

    let found = repo
        .list_categories(&NameQuery { search: vec![name.to_uppercase()], ordering: None })
        .await
        .unwrap();
    assert_eq!(found.len(), 1);

    assert!(repo.delete_category(created.id).await.unwrap());
    assert!(repo.get_category(created.id).await.unwrap().is_none());
}

#[test]
#[ignore]
async fn test_search_treats_wildcards_literally() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let seeded = seed(&repo).await;

    let query = NewsQuery { search: vec!["%".into(), seeded.marker.clone()], ..Default::default() };
    assert!(repo.list_news(&query).await.unwrap().is_empty());
}

#[test]
#[ignore]
async fn test_foreign_keys_surface_as_missing_reference() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();

    let err = repo.create_area(&NewArea { name: unique("area"), district_id: -1 }).await;
    assert!(matches!(err, Err(RepoError::MissingReference { field }) if field == "district_id"));

    let seeded = seed(&repo).await;
    let err = repo
        .update_news(seeded.news, &NewsChanges { area_id: Some(-1), ..Default::default() })
        .await;
    assert!(matches!(err, Err(RepoError::MissingReference { field }) if field == "area_id"));
}

#[test]
#[ignore]
async fn test_news_view_and_filters() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let seeded = seed(&repo).await;

    let news = repo.get_news(seeded.news).await.unwrap().unwrap();
    assert_eq!(news.category.id, seeded.category);
    assert_eq!(news.area.id, seeded.area);
    assert_eq!(news.area.district.id, seeded.district);
    assert!(news.image.is_none());

    let filtered = repo
        .list_news(&NewsQuery { district: Some(seeded.district), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(filtered.iter().map(|n| n.id).collect::<Vec<_>>(), vec![seeded.news]);

    let searched = repo
        .list_news(&NewsQuery { search: vec![seeded.marker.to_uppercase()], ..Default::default() })
        .await
        .unwrap();
    assert_eq!(searched.len(), 1);

    let updated = repo.set_news_image(seeded.news, "news_images/x.png").await.unwrap().unwrap();
    assert_eq!(updated.image.as_deref(), Some("news_images/x.png"));
    assert!(updated.updated_at >= news.updated_at);
}

#[test]
#[ignore]
async fn test_news_ordering_by_created_at() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let seeded = seed(&repo).await;
    let second = repo
        .create_news(&NewNews {
            title: format!("Follow-up {}", seeded.marker),
            content: "More".into(),
            category_id: seeded.category,
            area_id: seeded.area,
        })
        .await
        .unwrap();

    let scoped = |ordering| NewsQuery { area: Some(seeded.area), ordering, ..Default::default() };
    let newest = repo.list_news(&scoped(SortOrder::Descending)).await.unwrap();
    let oldest = repo.list_news(&scoped(SortOrder::Ascending)).await.unwrap();
    assert_eq!(newest.iter().map(|n| n.id).collect::<Vec<_>>(), vec![second.id, seeded.news]);
    assert_eq!(oldest.iter().map(|n| n.id).collect::<Vec<_>>(), vec![seeded.news, second.id]);
}

#[test]
#[ignore]
async fn test_comments_join_author_and_cascade() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let seeded = seed(&repo).await;
    let author = seed_user(&repo, Role::User).await;

    let comment = repo
        .create_comment(&NewComment { news_id: seeded.news, user_id: author, content: "Hi".into() })
        .await
        .unwrap();
    let author_name = repo.get_user(author).await.unwrap().unwrap().username;
    assert_eq!(comment.user, author_name);
    assert_eq!(comment.news, seeded.news);

    let edited = repo
        .update_comment(comment.id, &CommentChanges { news_id: None, content: Some("Edited".into()) })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(edited.content, "Edited");
    assert_eq!(edited.user, author_name);

    assert!(repo.delete_district(seeded.district).await.unwrap());
    assert!(repo.get_area(seeded.area).await.unwrap().is_none());
    assert!(repo.get_news(seeded.news).await.unwrap().is_none());
    assert!(repo.get_comment(comment.id).await.unwrap().is_none());
}

#[test]
#[ignore]
async fn test_admin_user_is_created_in_one_write() {
    let ctx = DbTestContext::setup().await;
    let repo = ctx.repository();
    let id = seed_user(&repo, Role::Admin).await;

    let user = repo.get_user(id).await.unwrap().unwrap();
    assert_eq!(user.role, Role::Admin);
    assert!(user.is_staff);
    assert!(user.is_active);
    assert!(repo.find_user_by_username(&user.username).await.unwrap().is_some());

    let again = repo
        .create_user(&NewUser {
            username: user.username.clone(),
            email: String::new(),
            password_hash: "unusable".into(),
            role: Role::User,
            is_staff: false,
        })
        .await;
    assert!(matches!(again, Err(RepoError::Duplicate { entity: "user", field: "username" })));
}
