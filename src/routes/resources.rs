use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, put},
};

use super::with_slash;
use crate::{
    AppState,
    auth::{Guard, enforce},
    handlers::{catalog, comments, news},
    policy::Resource,
};

/// Resource Router Module
///
/// One sub-router per REST resource. Each is wrapped in the policy middleware
/// for its resource, so the access matrix is checked before any handler (and
/// any body parsing) runs.
pub fn resource_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(guarded(state, Resource::Category, category_routes()))
        .merge(guarded(state, Resource::District, district_routes()))
        .merge(guarded(state, Resource::Area, area_routes()))
        .merge(guarded(state, Resource::News, news_routes()))
        .merge(guarded(state, Resource::Comment, comment_routes()))
}

fn guarded(state: &AppState, resource: Resource, routes: Router<AppState>) -> Router<AppState> {
    routes.route_layer(middleware::from_fn_with_state(Guard::new(state.clone(), resource), enforce))
}

fn category_routes() -> Router<AppState> {
    let router = with_slash(
        Router::new(),
        "/categories",
        get(catalog::list_categories).post(catalog::create_category),
    );
    with_slash(
        router,
        "/categories/{id}",
        get(catalog::get_category)
            .put(catalog::update_category)
            .patch(catalog::patch_category)
            .delete(catalog::delete_category),
    )
}

fn district_routes() -> Router<AppState> {
    let router = with_slash(
        Router::new(),
        "/districts",
        get(catalog::list_districts).post(catalog::create_district),
    );
    with_slash(
        router,
        "/districts/{id}",
        get(catalog::get_district)
            .put(catalog::update_district)
            .patch(catalog::patch_district)
            .delete(catalog::delete_district),
    )
}

fn area_routes() -> Router<AppState> {
    let router =
        with_slash(Router::new(), "/areas", get(catalog::list_areas).post(catalog::create_area));
    with_slash(
        router,
        "/areas/{id}",
        get(catalog::get_area)
            .put(catalog::update_area)
            .patch(catalog::patch_area)
            .delete(catalog::delete_area),
    )
}

fn news_routes() -> Router<AppState> {
    let router = with_slash(Router::new(), "/news", get(news::list_news).post(news::create_news));
    let router = with_slash(
        router,
        "/news/{id}",
        get(news::get_news).put(news::update_news).patch(news::patch_news).delete(news::delete_news),
    );
    // PUT /news/{id}/image
    // Multipart upload, capped at the image body limit.
    with_slash(
        router,
        "/news/{id}/image",
        put(news::upload_image).layer(DefaultBodyLimit::max(news::IMAGE_BODY_LIMIT)),
    )
}

fn comment_routes() -> Router<AppState> {
    let router = with_slash(
        Router::new(),
        "/comments",
        get(comments::list_comments).post(comments::create_comment),
    );
    with_slash(
        router,
        "/comments/{id}",
        get(comments::get_comment)
            .put(comments::update_comment)
            .patch(comments::patch_comment)
            .delete(comments::delete_comment),
    )
}
