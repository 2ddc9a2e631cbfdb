use axum::{
    Form, Json,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use uuid::Uuid;

use super::{
    deny_to_post, discard_image, index_url, invalid_form, paginate, post_detail_url, profile_url,
    redirect,
};
use crate::{
    AppState,
    auth::{AuthUser, Viewer},
    error::{AppError, AppResult},
    forms::{FieldErrors, FormPage, INVALID_CHOICE, INVALID_IMAGE, PostForm, PostInput},
    models::{CategoryPage, DeletePostPage, Post, PostDetailPage, PostListPage},
    pagination::PageQuery,
    query::{PostQuery, PostSource},
    repository::RepositoryState,
    storage::is_owned_image_key,
};

/// index
///
/// [Public Route] Newest visible posts across all categories.
#[utoipa::path(
    get,
    path = "/",
    params(PageQuery),
    responses((status = 200, description = "Post listing", body = PostListPage))
)]
pub async fn index(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<PostListPage>> {
    let page_obj = paginate(&state.repo, PostQuery::new(PostSource::All), &page).await?;
    Ok(Json(PostListPage { page_obj }))
}

/// category_posts
///
/// [Public Route] Visible posts of one category. Unpublished or unknown categories
/// are not found.
#[utoipa::path(
    get,
    path = "/category/{slug}/",
    params(("slug" = String, Path, description = "Category slug"), PageQuery),
    responses(
        (status = 200, description = "Category listing", body = CategoryPage),
        (status = 404, description = "Unknown or unpublished category")
    )
)]
pub async fn category_posts(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<CategoryPage>> {
    let category = state
        .repo
        .get_published_category(&slug)
        .await?
        .ok_or(AppError::NotFound("category"))?;

    let query = PostQuery::new(PostSource::Category(category.id));
    let page_obj = paginate(&state.repo, query, &page).await?;
    Ok(Json(CategoryPage { category, page_obj }))
}

/// post_detail
///
/// [Public Route] One post with its comments. Authors always see their own posts;
/// everyone else only sees publicly visible ones.
#[utoipa::path(
    get,
    path = "/posts/{id}/",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post detail", body = PostDetailPage),
        (status = 404, description = "Missing or not visible")
    )
)]
pub async fn post_detail(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<PostDetailPage>> {
    let post = readable_post(&state.repo, &viewer, id).await?;
    let comments = state.repo.get_comments(post.id).await?;
    Ok(Json(PostDetailPage { post, comments }))
}

/// Fetches a post the viewer is allowed to read.
pub(crate) async fn readable_post(
    repo: &RepositoryState,
    viewer: &Viewer,
    id: i64,
) -> AppResult<Post> {
    let post = repo.get_post(id).await?.ok_or(AppError::NotFound("post"))?;
    if viewer.is(post.author_id) || post.is_visible_at(Utc::now()) {
        Ok(post)
    } else {
        Err(AppError::NotFound("post"))
    }
}

/// Checks that the category and location a post points at exist.
async fn check_references(repo: &RepositoryState, input: &PostInput) -> AppResult<FieldErrors> {
    let mut errors = FieldErrors::new();
    if repo.get_category(input.category_id).await?.is_none() {
        errors.insert("category".into(), vec![INVALID_CHOICE.into()]);
    }
    if let Some(location_id) = input.location_id {
        if repo.get_location(location_id).await?.is_none() {
            errors.insert("location".into(), vec![INVALID_CHOICE.into()]);
        }
    }
    Ok(errors)
}

/// Validates the form and its references, or yields the re-rendered form.
///
/// `current_image` is the image the post already has. It is kept when the form
/// leaves `image` empty. A new image must have been uploaded by `author`.
async fn clean_post_form(
    repo: &RepositoryState,
    form: PostForm,
    author: Uuid,
    current_image: Option<&str>,
) -> AppResult<Result<PostInput, Response>> {
    let mut input = match form.validate() {
        Ok(input) => input,
        Err(errors) => return Ok(Err(invalid_form(form, errors))),
    };
    input.keep_image_unless_changed(current_image);

    let mut errors = check_references(repo, &input).await?;
    if let Some(key) = input.image.as_deref() {
        if current_image != Some(key) && !is_owned_image_key(key, author) {
            tracing::warn!(user = %author, key, "rejected image uploaded by someone else");
            errors.insert("image".into(), vec![INVALID_IMAGE.into()]);
        }
    }
    if errors.is_empty() {
        Ok(Ok(input))
    } else {
        Ok(Err(invalid_form(form, errors)))
    }
}

/// create_post_form
///
/// [Authenticated Route] Blank post form.
#[utoipa::path(
    get,
    path = "/posts/create/",
    responses((status = 200, description = "Blank form", body = PostForm))
)]
pub async fn create_post_form(_user: AuthUser) -> Json<FormPage<PostForm>> {
    Json(FormPage::blank(PostForm::blank()))
}

/// create_post
///
/// [Authenticated Route] Publishes a new post owned by the requesting user and
/// redirects to their profile.
#[utoipa::path(
    post,
    path = "/posts/create/",
    request_body(content = PostForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Created; redirect to the author's profile"),
        (status = 401, description = "Not authenticated"),
        (status = 422, description = "Invalid form")
    )
)]
pub async fn create_post(
    user: AuthUser,
    State(state): State<AppState>,
    Form(form): Form<PostForm>,
) -> AppResult<Response> {
    let input = match clean_post_form(&state.repo, form, user.id, None).await? {
        Ok(input) => input,
        Err(rerender) => return Ok(rerender),
    };

    let post = state.repo.create_post(user.id, input).await?;
    tracing::info!(post_id = post.id, author = %user.id, "post created");
    Ok(redirect(&profile_url(&user.username)))
}

/// edit_post_form
///
/// [Authenticated Route] The post's form, prefilled. Non-owners are redirected to
/// the post.
#[utoipa::path(
    get,
    path = "/posts/{id}/edit/",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Prefilled form", body = PostForm),
        (status = 303, description = "Not the author; redirect to the post"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn edit_post_form(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let post = state.repo.get_post(id).await?.ok_or(AppError::NotFound("post"))?;
    if !user.owns(post.author_id) {
        return Ok(deny_to_post(user.id, id, "edit_post"));
    }
    Ok(Json(FormPage::blank(PostForm::from(&post))).into_response())
}

/// edit_post
///
/// [Authenticated Route] Saves the author's changes. Anyone else is redirected to
/// the post without the post being touched. The current image survives unless a
/// new one is submitted or `image_clear` is ticked.
#[utoipa::path(
    post,
    path = "/posts/{id}/edit/",
    params(("id" = i64, Path, description = "Post ID")),
    request_body(content = PostForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Saved, or not the author; redirect to the post"),
        (status = 404, description = "Not Found"),
        (status = 422, description = "Invalid form")
    )
)]
pub async fn edit_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(form): Form<PostForm>,
) -> AppResult<Response> {
    let post = state.repo.get_post(id).await?.ok_or(AppError::NotFound("post"))?;
    if !user.owns(post.author_id) {
        return Ok(deny_to_post(user.id, id, "edit_post"));
    }

    let input = match clean_post_form(&state.repo, form, user.id, post.image.as_deref()).await? {
        Ok(input) => input,
        Err(rerender) => return Ok(rerender),
    };
    let replaced_image = post.image.clone().filter(|old| input.image.as_ref() != Some(old));

    if state.repo.update_post(id, user.id, input).await?.is_some() {
        discard_image(&state.storage, replaced_image.as_deref()).await;
    }
    Ok(redirect(&post_detail_url(id)))
}

/// delete_post_form
///
/// [Authenticated Route] Confirmation page before deletion.
#[utoipa::path(
    get,
    path = "/posts/{id}/delete/",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Confirmation", body = DeletePostPage),
        (status = 303, description = "Not the author; redirect to the post"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_post_form(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let post = state.repo.get_post(id).await?.ok_or(AppError::NotFound("post"))?;
    if !user.owns(post.author_id) {
        return Ok(deny_to_post(user.id, id, "delete_post"));
    }
    Ok(Json(DeletePostPage { post }).into_response())
}

/// delete_post
///
/// [Authenticated Route] Deletes the author's post (its comments go with it) and
/// redirects to the index.
#[utoipa::path(
    post,
    path = "/posts/{id}/delete/",
    params(("id" = i64, Path, description = "Post ID")),
    responses(
        (status = 303, description = "Deleted, or not the author; redirect"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_post(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let post = state.repo.get_post(id).await?.ok_or(AppError::NotFound("post"))?;
    if !user.owns(post.author_id) {
        return Ok(deny_to_post(user.id, id, "delete_post"));
    }

    if state.repo.delete_post(id, user.id).await? {
        tracing::info!(post_id = id, author = %user.id, "post deleted");
        discard_image(&state.storage, post.image.as_deref()).await;
    }
    Ok(redirect(&index_url()))
}
