use axum::http::Method;
use news_portal::{
    AppError,
    models::Role,
    policy::{Access, Action, POLICIES, Resource, authorize, requirement},
};

const ALL_ACTIONS: [Action; 6] = [
    Action::List,
    Action::Retrieve,
    Action::Create,
    Action::Update,
    Action::PartialUpdate,
    Action::Destroy,
];

#[test]
fn test_action_from_request() {
    assert_eq!(Action::from_request(&Method::GET, false), Some(Action::List));
    assert_eq!(Action::from_request(&Method::GET, true), Some(Action::Retrieve));
    assert_eq!(Action::from_request(&Method::POST, false), Some(Action::Create));
    assert_eq!(Action::from_request(&Method::PUT, true), Some(Action::Update));
    assert_eq!(Action::from_request(&Method::PATCH, true), Some(Action::PartialUpdate));
    assert_eq!(Action::from_request(&Method::DELETE, true), Some(Action::Destroy));
    assert_eq!(Action::from_request(&Method::TRACE, false), None);
}

#[test]
fn test_every_resource_has_a_policy() {
    for resource in [Resource::Category, Resource::Area, Resource::District, Resource::News, Resource::Comment] {
        assert!(POLICIES.iter().any(|(r, _)| *r == resource), "{resource:?} missing");
    }
}

#[test]
fn test_administrative_resources_are_admin_only() {
    for resource in [Resource::Category, Resource::Area, Resource::District] {
        for action in ALL_ACTIONS {
            assert_eq!(requirement(resource, action), Access::Admin);
            assert!(matches!(authorize(None, resource, action), Err(AppError::NotAuthenticated)));
            assert!(matches!(authorize(Some(Role::User), resource, action), Err(AppError::Forbidden)));
            assert!(authorize(Some(Role::Admin), resource, action).is_ok());
        }
    }
}

#[test]
fn test_news_is_public_read_admin_write() {
    assert!(authorize(None, Resource::News, Action::List).is_ok());
    assert!(authorize(None, Resource::News, Action::Retrieve).is_ok());
    assert!(matches!(authorize(None, Resource::News, Action::Create), Err(AppError::NotAuthenticated)));
    assert!(matches!(
        authorize(Some(Role::User), Resource::News, Action::PartialUpdate),
        Err(AppError::Forbidden)
    ));
    assert!(authorize(Some(Role::Admin), Resource::News, Action::Destroy).is_ok());
}

#[test]
fn test_comments_are_public_read_authenticated_write() {
    assert!(authorize(None, Resource::Comment, Action::List).is_ok());
    assert!(matches!(authorize(None, Resource::Comment, Action::Create), Err(AppError::NotAuthenticated)));
    for action in [Action::Create, Action::Update, Action::PartialUpdate, Action::Destroy] {
        assert!(authorize(Some(Role::User), Resource::Comment, action).is_ok());
        assert!(authorize(Some(Role::Admin), Resource::Comment, action).is_ok());
    }
}
