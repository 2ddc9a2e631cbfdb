use axum::{
    Form, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::invalid_form;
use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, AppResult},
    forms::{CategoryForm, FieldErrors, LocationForm},
    models::{Category, Location, Post},
};

fn require_admin(user: &AuthUser) -> AppResult<()> {
    if user.is_admin() {
        Ok(())
    } else {
        tracing::warn!(user = %user.id, "admin route denied");
        Err(AppError::Forbidden)
    }
}

/// Maps a unique-constraint violation on `categories` to the offending field.
fn category_conflict(error: &sqlx::Error) -> Option<FieldErrors> {
    let db = error.as_database_error()?;
    if !db.is_unique_violation() {
        return None;
    }
    let field = match db.constraint() {
        Some(constraint) if constraint.contains("slug") => "slug",
        _ => "title",
    };
    Some(FieldErrors::from([(
        field.to_string(),
        vec![format!("Category with this {field} already exists.")],
    )]))
}

/// list_categories
///
/// [Admin Route] Every category, published or not.
#[utoipa::path(
    get,
    path = "/admin/categories",
    responses(
        (status = 200, description = "All categories", body = [Category]),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn list_categories(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Category>>> {
    require_admin(&user)?;
    Ok(Json(state.repo.list_categories().await?))
}

/// create_category
///
/// [Admin Route] Adds a category. Title and slug must be unique.
#[utoipa::path(
    post,
    path = "/admin/categories",
    request_body(content = CategoryForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 201, description = "Created", body = Category),
        (status = 422, description = "Invalid form or duplicate title/slug")
    )
)]
pub async fn create_category(
    user: AuthUser,
    State(state): State<AppState>,
    Form(form): Form<CategoryForm>,
) -> AppResult<Response> {
    require_admin(&user)?;
    let input = match form.validate() {
        Ok(input) => input,
        Err(errors) => return Ok(invalid_form(form, errors)),
    };

    match state.repo.create_category(input).await {
        Ok(category) => Ok((StatusCode::CREATED, Json(category)).into_response()),
        Err(e) => match category_conflict(&e) {
            Some(errors) => Ok(invalid_form(form, errors)),
            None => Err(e.into()),
        },
    }
}

/// set_category_status
///
/// [Admin Route] Publishes or hides a category. Hiding it hides its posts.
#[utoipa::path(
    put,
    path = "/admin/categories/{id}/status",
    params(("id" = i64, Path, description = "Category ID")),
    request_body = bool,
    responses((status = 200, description = "Updated", body = Category))
)]
pub async fn set_category_status(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(is_published): Json<bool>,
) -> AppResult<Json<Category>> {
    require_admin(&user)?;
    state
        .repo
        .set_category_published(id, is_published)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("category"))
}

/// delete_category
///
/// [Admin Route] Removes a category. Its posts remain, uncategorized.
#[utoipa::path(
    delete,
    path = "/admin/categories/{id}",
    params(("id" = i64, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_category(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    require_admin(&user)?;
    if state.repo.delete_category(id).await? {
        tracing::info!(category_id = id, "category deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("category"))
    }
}

/// list_locations
///
/// [Admin Route] Every location, published or not.
#[utoipa::path(
    get,
    path = "/admin/locations",
    responses((status = 200, description = "All locations", body = [Location]))
)]
pub async fn list_locations(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Location>>> {
    require_admin(&user)?;
    Ok(Json(state.repo.list_locations().await?))
}

/// create_location
#[utoipa::path(
    post,
    path = "/admin/locations",
    request_body(content = LocationForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 201, description = "Created", body = Location),
        (status = 422, description = "Invalid form")
    )
)]
pub async fn create_location(
    user: AuthUser,
    State(state): State<AppState>,
    Form(form): Form<LocationForm>,
) -> AppResult<Response> {
    require_admin(&user)?;
    let input = match form.validate() {
        Ok(input) => input,
        Err(errors) => return Ok(invalid_form(form, errors)),
    };
    let location = state.repo.create_location(input).await?;
    Ok((StatusCode::CREATED, Json(location)).into_response())
}

/// set_location_status
#[utoipa::path(
    put,
    path = "/admin/locations/{id}/status",
    params(("id" = i64, Path, description = "Location ID")),
    request_body = bool,
    responses((status = 200, description = "Updated", body = Location))
)]
pub async fn set_location_status(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(is_published): Json<bool>,
) -> AppResult<Json<Location>> {
    require_admin(&user)?;
    state
        .repo
        .set_location_published(id, is_published)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("location"))
}

/// delete_location
///
/// [Admin Route] Removes a location. Its posts remain without one.
#[utoipa::path(
    delete,
    path = "/admin/locations/{id}",
    params(("id" = i64, Path, description = "Location ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_location(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    require_admin(&user)?;
    if state.repo.delete_location(id).await? {
        tracing::info!(location_id = id, "location deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("location"))
    }
}

/// set_post_status
///
/// [Admin Route] Moderation: publishes or hides any post regardless of author.
#[utoipa::path(
    put,
    path = "/admin/posts/{id}/status",
    params(("id" = i64, Path, description = "Post ID")),
    request_body = bool,
    responses((status = 200, description = "Updated", body = Post))
)]
pub async fn set_post_status(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(is_published): Json<bool>,
) -> AppResult<Json<Post>> {
    require_admin(&user)?;
    state
        .repo
        .set_post_published(id, is_published)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound("post"))
}
