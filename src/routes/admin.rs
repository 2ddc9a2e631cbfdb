use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, put},
};

/// Admin Router Module
///
/// Management of categories and locations and moderation of posts. Each handler
/// extracts `AuthUser` (401 when missing) and then requires `role = 'admin'` (403).
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET/POST /admin/categories
        .route(
            "/categories",
            get(handlers::admin::list_categories).post(handlers::admin::create_category),
        )
        // PUT /admin/categories/{id}/status
        // Unpublishing a category hides all of its posts from public listings.
        .route(
            "/categories/{id}/status",
            put(handlers::admin::set_category_status),
        )
        // DELETE /admin/categories/{id}
        .route("/categories/{id}", delete(handlers::admin::delete_category))
        // GET/POST /admin/locations
        .route(
            "/locations",
            get(handlers::admin::list_locations).post(handlers::admin::create_location),
        )
        .route(
            "/locations/{id}/status",
            put(handlers::admin::set_location_status),
        )
        .route("/locations/{id}", delete(handlers::admin::delete_location))
        // PUT /admin/posts/{id}/status
        // Publishes or hides any post regardless of its author.
        .route("/posts/{id}/status", put(handlers::admin::set_post_status))
}
