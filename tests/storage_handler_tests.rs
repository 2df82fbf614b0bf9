mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{TestContext, send};
use news_portal::{MockStorageService, repository::Repository};

const BOUNDARY: &str = "news-portal-test-boundary";

fn multipart_body(field: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload(uri: &str, cookie: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("PUT")
        .uri(uri)
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"));
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}

#[tokio::test]
async fn test_image_upload_stores_and_records_key() {
    let ctx = TestContext::new();
    let admin = ctx.admin_cookie().await;
    let (_, area, category) = ctx.catalog().await;
    let news = ctx.news("Flood", "Rivers rising", &category, &area).await;

    let body = multipart_body("image", "river.png", "image/png", b"\x89PNG fake bytes");
    let (status, json) =
        send(ctx.router.clone(), upload(&format!("/news/{}/image/", news.id), Some(&admin), body)).await;

    assert_eq!(status, StatusCode::OK);
    let key = json["image"].as_str().unwrap().to_string();
    assert!(key.starts_with("news_images/"));
    assert!(key.ends_with(".png"));
    assert_eq!(ctx.storage.stored_keys(), vec![key.clone()]);

    let stored = ctx.repo.get_news(news.id).await.unwrap().unwrap();
    assert_eq!(stored.image.as_deref(), Some(key.as_str()));
}

#[tokio::test]
async fn test_image_upload_rejects_non_images() {
    let ctx = TestContext::new();
    let admin = ctx.admin_cookie().await;
    let (_, area, category) = ctx.catalog().await;
    let news = ctx.news("Flood", "Rivers rising", &category, &area).await;

    let body = multipart_body("image", "notes.txt", "text/plain", b"hello");
    let (status, json) =
        send(ctx.router.clone(), upload(&format!("/news/{}/image", news.id), Some(&admin), body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["image"][0].as_str().unwrap().starts_with("Upload a valid image."));
    assert!(ctx.storage.stored_keys().is_empty());
}

#[tokio::test]
async fn test_image_upload_requires_image_part() {
    let ctx = TestContext::new();
    let admin = ctx.admin_cookie().await;
    let (_, area, category) = ctx.catalog().await;
    let news = ctx.news("Flood", "Rivers rising", &category, &area).await;

    let body = multipart_body("attachment", "river.png", "image/png", b"bytes");
    let (status, json) =
        send(ctx.router.clone(), upload(&format!("/news/{}/image/", news.id), Some(&admin), body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["image"][0], "No file was submitted.");
}

#[tokio::test]
async fn test_image_upload_unknown_news_is_not_found() {
    let ctx = TestContext::new();
    let admin = ctx.admin_cookie().await;
    let body = multipart_body("image", "river.png", "image/png", b"bytes");
    let (status, _) = send(ctx.router.clone(), upload("/news/31337/image/", Some(&admin), body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_image_upload_requires_admin() {
    let ctx = TestContext::new();
    let reader = ctx.reader_cookie().await;
    let (_, area, category) = ctx.catalog().await;
    let news = ctx.news("Flood", "Rivers rising", &category, &area).await;

    let body = multipart_body("image", "river.png", "image/png", b"bytes");
    let (status, _) =
        send(ctx.router.clone(), upload(&format!("/news/{}/image/", news.id), Some(&reader), body)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_storage_failure_is_internal_error() {
    let ctx = TestContext::with_storage(MockStorageService::new_failing());
    let admin = ctx.admin_cookie().await;
    let (_, area, category) = ctx.catalog().await;
    let news = ctx.news("Flood", "Rivers rising", &category, &area).await;

    let body = multipart_body("image", "river.png", "image/png", b"bytes");
    let (status, json) =
        send(ctx.router.clone(), upload(&format!("/news/{}/image/", news.id), Some(&admin), body)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["detail"], "Internal server error");
    let stored = ctx.repo.get_news(news.id).await.unwrap().unwrap();
    assert!(stored.image.is_none(), "no key is recorded when the upload fails");
}

#[tokio::test]
async fn test_image_upload_without_multipart_body_is_field_error() {
    let ctx = TestContext::new();
    let admin = ctx.admin_cookie().await;
    let (_, area, category) = ctx.catalog().await;
    let news = ctx.news("Flood", "Rivers rising", &category, &area).await;

    let request = Request::builder()
        .method("PUT")
        .uri(format!("/news/{}/image/", news.id))
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, &admin)
        .body(Body::from(r#"{"image": "river.png"}"#))
        .unwrap();
    let (status, json) = send(ctx.router.clone(), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["image"][0].is_string());
    assert!(ctx.storage.stored_keys().is_empty());
}
