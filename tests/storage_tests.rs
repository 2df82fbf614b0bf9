use news_portal::{
    handlers::news::image_extension,
    storage::{MockStorageService, StorageService, sanitize_key},
};

#[test]
fn test_sanitize_key_strips_traversal() {
    assert_eq!(sanitize_key("news_images/../../etc/passwd"), "news_images/etc/passwd");
    assert_eq!(sanitize_key("/news_images//./a.png"), "news_images/a.png");
}

#[tokio::test]
async fn test_mock_records_written_keys() {
    let storage = MockStorageService::new();
    storage.put_object("news_images/a.png", "image/png", vec![1, 2, 3]).await.unwrap();
    storage.put_object("news_images/../b.png", "image/png", vec![4]).await.unwrap();
    assert_eq!(storage.stored_keys(), vec!["news_images/a.png", "news_images/b.png"]);
}

#[tokio::test]
async fn test_mock_failure_mode() {
    let storage = MockStorageService::new_failing();
    let result = storage.put_object("news_images/a.png", "image/png", vec![1]).await;
    assert!(result.is_err());
    assert!(storage.stored_keys().is_empty());
}

#[test]
fn test_image_extension_prefers_file_name() {
    assert_eq!(image_extension(Some("Photo.PNG"), "image/png"), "png");
    assert_eq!(image_extension(Some("scan.jpeg"), "image/jpeg"), "jpeg");
}

#[test]
fn test_image_extension_falls_back_to_mime_subtype() {
    assert_eq!(image_extension(None, "image/jpeg"), "jpg");
    assert_eq!(image_extension(Some("no-extension"), "image/webp"), "webp");
    assert_eq!(image_extension(Some("weird.tar/../x"), "image/svg+xml"), "svg");
    assert_eq!(image_extension(None, "image/"), "bin");
}
