use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Read views open to anonymous and logged-in clients, plus registration.
/// Listings only ever contain publicly visible posts; the detail and profile
/// pages widen that to the viewer's own posts when a valid identity is sent.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for the load balancer.
        .route("/health", get(|| async { "ok" }))
        // GET /?page=N
        // Newest visible posts, ten per page.
        .route("/", get(handlers::posts::index))
        // GET /category/{slug}/?page=N
        // Visible posts of one published category.
        .route("/category/{slug}/", get(handlers::posts::category_posts))
        // GET /posts/{id}/
        // One post with its comments, oldest first.
        .route("/posts/{id}/", get(handlers::posts::post_detail))
        // GET /profile/{username}/?page=N
        .route("/profile/{username}/", get(handlers::profile::profile))
        // POST /auth/registration/
        // Account creation through the identity provider.
        .route(
            "/auth/registration/",
            post(handlers::accounts::register_user),
        )
}
