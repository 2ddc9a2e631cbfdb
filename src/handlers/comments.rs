use axum::{
    Form, Json,
    extract::{Path, State},
    response::{IntoResponse, Response},
};

use super::{deny_to_post, invalid_form, post_detail_url, posts::readable_post, redirect};
use crate::{
    AppState,
    auth::{AuthUser, Viewer},
    error::{AppError, AppResult},
    forms::{CommentForm, FormPage},
    models::{Comment, DeleteCommentPage},
    repository::RepositoryState,
};

/// Looks up a comment through the post it is addressed under.
async fn comment_on_post(
    repo: &RepositoryState,
    post_id: i64,
    comment_id: i64,
) -> AppResult<Comment> {
    repo.get_comment(comment_id)
        .await?
        .filter(|comment| comment.post_id == post_id)
        .ok_or(AppError::NotFound("comment"))
}

/// add_comment
///
/// [Authenticated Route] Comments on a post the user can read, as that user.
#[utoipa::path(
    post,
    path = "/posts/{id}/comment/",
    params(("id" = i64, Path, description = "Post ID")),
    request_body(content = CommentForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Added; redirect to the post"),
        (status = 404, description = "Post not found"),
        (status = 422, description = "Invalid form")
    )
)]
pub async fn add_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let viewer = Viewer(Some(user.clone()));
    let post = readable_post(&state.repo, &viewer, post_id).await?;

    let text = match form.validate() {
        Ok(text) => text,
        Err(errors) => return Ok(invalid_form(form, errors)),
    };
    let comment = state.repo.add_comment(post.id, user.id, text).await?;
    tracing::info!(comment_id = comment.id, post_id, author = %user.id, "comment added");
    Ok(redirect(&post_detail_url(post_id)))
}

/// edit_comment_form
///
/// [Authenticated Route] The comment's form, prefilled.
#[utoipa::path(
    get,
    path = "/posts/{id}/edit_comment/{comment_id}/",
    params(
        ("id" = i64, Path, description = "Post ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    responses(
        (status = 200, description = "Prefilled form", body = CommentForm),
        (status = 303, description = "Not the author; redirect to the post"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn edit_comment_form(
    user: AuthUser,
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(i64, i64)>,
) -> AppResult<Response> {
    let comment = comment_on_post(&state.repo, post_id, comment_id).await?;
    if !user.owns(comment.author_id) {
        return Ok(deny_to_post(user.id, post_id, "edit_comment"));
    }
    Ok(Json(FormPage::blank(CommentForm::from(&comment))).into_response())
}

/// edit_comment
///
/// [Authenticated Route] Saves the author's new text. Anyone else is redirected to
/// the post and the comment is left unchanged.
#[utoipa::path(
    post,
    path = "/posts/{id}/edit_comment/{comment_id}/",
    params(
        ("id" = i64, Path, description = "Post ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    request_body(content = CommentForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Saved, or not the author; redirect to the post"),
        (status = 404, description = "Not Found"),
        (status = 422, description = "Invalid form")
    )
)]
pub async fn edit_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(i64, i64)>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let comment = comment_on_post(&state.repo, post_id, comment_id).await?;
    if !user.owns(comment.author_id) {
        return Ok(deny_to_post(user.id, post_id, "edit_comment"));
    }

    let text = match form.validate() {
        Ok(text) => text,
        Err(errors) => return Ok(invalid_form(form, errors)),
    };
    state.repo.update_comment(comment.id, user.id, text).await?;
    Ok(redirect(&post_detail_url(post_id)))
}

/// delete_comment_form
///
/// [Authenticated Route] Confirmation page before deletion.
#[utoipa::path(
    get,
    path = "/posts/{id}/delete_comment/{comment_id}/",
    params(
        ("id" = i64, Path, description = "Post ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    responses(
        (status = 200, description = "Confirmation", body = DeleteCommentPage),
        (status = 303, description = "Not the author; redirect to the post"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_comment_form(
    user: AuthUser,
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(i64, i64)>,
) -> AppResult<Response> {
    let comment = comment_on_post(&state.repo, post_id, comment_id).await?;
    if !user.owns(comment.author_id) {
        return Ok(deny_to_post(user.id, post_id, "delete_comment"));
    }
    Ok(Json(DeleteCommentPage { comment }).into_response())
}

/// delete_comment
///
/// [Authenticated Route] Deletes the author's comment.
#[utoipa::path(
    post,
    path = "/posts/{id}/delete_comment/{comment_id}/",
    params(
        ("id" = i64, Path, description = "Post ID"),
        ("comment_id" = i64, Path, description = "Comment ID")
    ),
    responses(
        (status = 303, description = "Deleted, or not the author; redirect to the post"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_comment(
    user: AuthUser,
    State(state): State<AppState>,
    Path((post_id, comment_id)): Path<(i64, i64)>,
) -> AppResult<Response> {
    let comment = comment_on_post(&state.repo, post_id, comment_id).await?;
    if !user.owns(comment.author_id) {
        return Ok(deny_to_post(user.id, post_id, "delete_comment"));
    }

    if state.repo.delete_comment(comment.id, user.id).await? {
        tracing::info!(comment_id, post_id, author = %user.id, "comment deleted");
    }
    Ok(redirect(&post_detail_url(post_id)))
}
