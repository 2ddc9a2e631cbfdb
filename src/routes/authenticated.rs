use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Every route here sits behind the authentication layer, so handlers always
/// receive a resolved `AuthUser`. Ownership of the post or comment being changed
/// is checked inside the handlers; non-owners are redirected to the post.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET/POST /posts/create/
        // Blank form, then creation as the requesting user.
        .route(
            "/posts/create/",
            get(handlers::posts::create_post_form).post(handlers::posts::create_post),
        )
        // GET/POST /posts/{id}/edit/
        .route(
            "/posts/{id}/edit/",
            get(handlers::posts::edit_post_form).post(handlers::posts::edit_post),
        )
        // GET/POST /posts/{id}/delete/
        // Confirmation page, then deletion together with the post's comments.
        .route(
            "/posts/{id}/delete/",
            get(handlers::posts::delete_post_form).post(handlers::posts::delete_post),
        )
        // POST /posts/{id}/comment/
        .route("/posts/{id}/comment/", post(handlers::comments::add_comment))
        // GET/POST /posts/{id}/edit_comment/{comment_id}/
        .route(
            "/posts/{id}/edit_comment/{comment_id}/",
            get(handlers::comments::edit_comment_form).post(handlers::comments::edit_comment),
        )
        // GET/POST /posts/{id}/delete_comment/{comment_id}/
        .route(
            "/posts/{id}/delete_comment/{comment_id}/",
            get(handlers::comments::delete_comment_form)
                .post(handlers::comments::delete_comment),
        )
        // GET/POST /profile/edit_profile/
        // Always the requesting user's own profile.
        .route(
            "/profile/edit_profile/",
            get(handlers::profile::edit_profile_form).post(handlers::profile::edit_profile),
        )
        // POST /upload/presigned
        // Short-lived URL for uploading a post image straight to object storage.
        .route("/upload/presigned", post(handlers::media::get_presigned_url))
}
