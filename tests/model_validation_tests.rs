use news_portal::models::{
    AreaPayload, CommentPayload, LoginRequest, NamePayload, NewsPayload, RegisterRequest, Role,
};
use serde_json::json;

fn decode<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> T {
    serde_json::from_value(value).expect("payload decodes")
}

#[test]
fn test_role_serializes_lowercase() {
    assert_eq!(serde_json::to_value(Role::Admin).unwrap(), json!("admin"));
    assert_eq!(Role::try_from("user".to_string()).unwrap(), Role::User);
    assert!(Role::try_from("editor".to_string()).is_err());
    assert_eq!(Role::default(), Role::User);
}

#[test]
fn test_name_payload_trims_and_requires() {
    let payload: NamePayload = decode(json!({ "name": "  Sports  " }));
    assert_eq!(payload.into_name().unwrap(), "Sports");

    let missing: NamePayload = decode(json!({}));
    let errors = missing.into_name().unwrap_err();
    assert_eq!(errors.get("name").unwrap(), ["This field is required."]);

    let blank: NamePayload = decode(json!({ "name": "   " }));
    let errors = blank.into_name().unwrap_err();
    assert_eq!(errors.get("name").unwrap(), ["This field may not be blank."]);
}

#[test]
fn test_name_payload_length_limit() {
    let payload: NamePayload = decode(json!({ "name": "x".repeat(101) }));
    let errors = payload.into_name().unwrap_err();
    assert_eq!(errors.get("name").unwrap(), ["Ensure this field has no more than 100 characters."]);
}

#[test]
fn test_name_payload_partial_may_omit() {
    let payload: NamePayload = decode(json!({}));
    assert_eq!(payload.into_change().unwrap(), None);
}

#[test]
fn test_area_payload_requires_district() {
    let payload: AreaPayload = decode(json!({ "name": "Patan" }));
    let errors = payload.into_new().unwrap_err();
    assert_eq!(errors.get("district_id").unwrap(), ["This field is required."]);

    let partial: AreaPayload = decode(json!({ "district_id": 4 }));
    let changes = partial.into_changes().unwrap();
    assert_eq!(changes.name, None);
    assert_eq!(changes.district_id, Some(4));
}

#[test]
fn test_news_payload_reports_all_missing_fields() {
    let payload: NewsPayload = decode(json!({ "title": "" }));
    let errors = payload.into_new().unwrap_err();
    assert_eq!(errors.get("title").unwrap(), ["This field may not be blank."]);
    assert!(errors.get("content").is_some());
    assert!(errors.get("category_id").is_some());
    assert!(errors.get("area_id").is_some());
}

#[test]
fn test_news_payload_title_limit() {
    let payload: NewsPayload = decode(json!({
        "title": "t".repeat(201), "content": "body", "category_id": 1, "area_id": 2
    }));
    assert!(payload.into_new().unwrap_err().get("title").is_some());
}

#[test]
fn test_comment_payload_ignores_author_fields() {
    let payload: CommentPayload =
        decode(json!({ "news": 3, "content": "Nice", "user": "mallory", "author": 99 }));
    let comment = payload.into_new(7).unwrap();
    assert_eq!(comment.user_id, 7);
    assert_eq!(comment.news_id, 3);
}

#[test]
fn test_register_request_rejects_bad_username_characters() {
    let payload: RegisterRequest = decode(json!({
        "username": "with space", "password": "Tr1cky-Horse", "password2": "Tr1cky-Horse"
    }));
    let errors = payload.into_registration().unwrap_err();
    assert!(errors.get("username").unwrap()[0].starts_with("Enter a valid username."));
}

#[test]
fn test_register_request_blank_email_is_allowed() {
    let payload: RegisterRequest = decode(json!({
        "username": "a.b@c+d-e_f", "email": "", "password": "Tr1cky-Horse", "password2": "Tr1cky-Horse"
    }));
    let registration = payload.into_registration().unwrap();
    assert_eq!(registration.email, "");
    assert_eq!(registration.username, "a.b@c+d-e_f");
}

#[test]
fn test_register_request_password_mismatch() {
    let payload: RegisterRequest = decode(json!({
        "username": "sita", "password": "Tr1cky-Horse", "password2": "Tr1cky-Mouse"
    }));
    let errors = payload.into_registration().unwrap_err();
    assert_eq!(errors.get("password").unwrap(), ["Password fields didn't match."]);
}

#[test]
fn test_login_request_requires_both_fields() {
    let payload: LoginRequest = decode(json!({ "password": "x" }));
    let errors = payload.into_credentials().unwrap_err();
    assert_eq!(errors.get("username").unwrap(), ["This field is required."]);
    assert!(errors.get("password").is_none());
}
