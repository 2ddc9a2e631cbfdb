//! Request handlers.
//!
//! Each handler composes the query builder, the ownership rules and the repository
//! into one page response. Read views answer with a JSON page document; successful
//! mutations answer with a `303 See Other` to the page that shows the result.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::AppResult,
    forms::{FieldErrors, FormPage},
    models::Post,
    pagination::{POSTS_ON_PAGE, Page, PageQuery, Paginator},
    query::PostQuery,
    repository::RepositoryState,
    storage::StorageState,
};

pub mod accounts;
pub mod admin;
pub mod comments;
pub mod media;
pub mod posts;
pub mod profile;

pub fn index_url() -> String {
    "/".to_string()
}

pub fn post_detail_url(post_id: i64) -> String {
    format!("/posts/{post_id}/")
}

pub fn profile_url(username: &str) -> String {
    format!("/profile/{username}/")
}

/// See Other to `location`.
pub(crate) fn redirect(location: &str) -> Response {
    Redirect::to(location).into_response()
}

/// Non-owners are sent back to the read view of the post, untouched.
pub(crate) fn deny_to_post(user_id: Uuid, post_id: i64, action: &'static str) -> Response {
    tracing::warn!(user = %user_id, post_id, action, "mutation denied: not the owner");
    redirect(&post_detail_url(post_id))
}

/// Re-renders a rejected form with its messages.
pub(crate) fn invalid_form<F: Serialize>(form: F, errors: FieldErrors) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(FormPage { form, errors }),
    )
        .into_response()
}

/// Resolves the requested page of a post listing and fetches its rows.
pub(crate) async fn paginate(
    repo: &RepositoryState,
    query: PostQuery,
    page: &PageQuery,
) -> AppResult<Page<Post>> {
    let count = repo.count_posts(query).await?;
    let window = Paginator::new(count, POSTS_ON_PAGE).window(page.page.as_deref());
    let posts = repo.list_posts(query, window.limit, window.offset).await?;
    Ok(Page::new(window, posts))
}

/// Best-effort removal of an image no post references anymore.
pub(crate) async fn discard_image(storage: &StorageState, key: Option<&str>) {
    if let Some(key) = key {
        if let Err(e) = storage.delete_object(key).await {
            tracing::warn!(key, "failed to delete post image: {}", e);
        }
    }
}
