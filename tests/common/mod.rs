#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use news_portal::{
    AppConfig, AppState, MemoryRepository, MockStorageService, create_router,
    auth::{TokenKind, issue_token},
    models::{Area, Category, District, NewArea, NewNews, NewUser, News, Role, User},
    repository::{Repository, RepositoryState},
    storage::StorageState,
};
use serde_json::Value;
use std::sync::Arc;
use tower::util::ServiceExt;

/// Everything a router-level test needs: the router plus direct handles on the
/// store and storage behind it.
pub struct TestContext {
    pub repo: Arc<MemoryRepository>,
    pub storage: MockStorageService,
    pub config: AppConfig,
    pub router: Router,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_storage(MockStorageService::new())
    }

    pub fn with_storage(storage: MockStorageService) -> Self {
        let repo = Arc::new(MemoryRepository::new());
        let config = AppConfig::default();
        let state = AppState {
            repo: repo.clone() as RepositoryState,
            storage: Arc::new(storage.clone()) as StorageState,
            config: config.clone(),
        };
        Self { repo, storage, config, router: create_router(state) }
    }

    /// Seeds a user directly in the store. The stored hash is a placeholder,
    /// so these users cannot log in with a password.
    pub async fn user(&self, username: &str, role: Role) -> User {
        self.repo
            .create_user(&NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password_hash: "unusable".to_string(),
                role,
                is_staff: role == Role::Admin,
            })
            .await
            .expect("seed user")
    }

    /// `Cookie` header value carrying a fresh access token for `user`.
    pub fn cookie_for(&self, user: &User) -> String {
        let token = issue_token(&self.config, user.id, TokenKind::Access).expect("sign token");
        format!("{}={}", self.config.auth_cookie, token)
    }

    pub async fn admin_cookie(&self) -> String {
        let admin = self.user("editor", Role::Admin).await;
        self.cookie_for(&admin)
    }

    pub async fn reader_cookie(&self) -> String {
        let reader = self.user("reader", Role::User).await;
        self.cookie_for(&reader)
    }

    pub async fn district(&self, name: &str) -> District {
        self.repo.create_district(name).await.expect("seed district")
    }

    pub async fn category(&self, name: &str) -> Category {
        self.repo.create_category(name).await.expect("seed category")
    }

    pub async fn area(&self, name: &str, district: &District) -> Area {
        self.repo
            .create_area(&NewArea { name: name.to_string(), district_id: district.id })
            .await
            .expect("seed area")
    }

    pub async fn news(&self, title: &str, content: &str, category: &Category, area: &Area) -> News {
        self.repo
            .create_news(&NewNews {
                title: title.to_string(),
                content: content.to_string(),
                category_id: category.id,
                area_id: area.id,
            })
            .await
            .expect("seed news")
    }

    /// One district, area and category ready for news.
    pub async fn catalog(&self) -> (District, Area, Category) {
        let district = self.district("Kathmandu").await;
        let area = self.area("Thamel", &district).await;
        let category = self.category("Politics").await;
        (district, area, category)
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        send(self.router.clone(), request).await
    }
}

/// Runs one request through the router and decodes the JSON body
/// (`Value::Null` for an empty body).
pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

pub fn request(method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("build request"),
        None => builder.body(Body::empty()).expect("build request"),
    }
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    request("GET", uri, cookie, None)
}
