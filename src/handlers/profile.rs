use axum::{
    Form, Json,
    extract::{Path, Query, State},
    response::Response,
};

use super::{invalid_form, paginate, profile_url, redirect};
use crate::{
    AppState,
    auth::{AuthUser, Viewer},
    error::{AppError, AppResult, is_unique_violation},
    forms::{FieldErrors, FormPage, ProfileForm, USERNAME_TAKEN},
    models::ProfilePage,
    pagination::PageQuery,
    query::{PostQuery, PostSource},
};

/// profile
///
/// [Public Route] A user's page with their posts. The owner sees every post they
/// wrote, including hidden and scheduled ones; other viewers only visible ones.
#[utoipa::path(
    get,
    path = "/profile/{username}/",
    params(("username" = String, Path, description = "Username"), PageQuery),
    responses(
        (status = 200, description = "Profile", body = ProfilePage),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn profile(
    viewer: Viewer,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<ProfilePage>> {
    let profile = state
        .repo
        .get_user_by_username(&username)
        .await?
        .ok_or(AppError::NotFound("user"))?;

    let owner_viewing = viewer.is(profile.id);
    let query = PostQuery::new(PostSource::Author(profile.id)).visible_only(!owner_viewing);
    let page_obj = paginate(&state.repo, query, &page).await?;
    Ok(Json(ProfilePage { profile, page_obj }))
}

/// edit_profile_form
///
/// [Authenticated Route] The requesting user's profile form.
#[utoipa::path(
    get,
    path = "/profile/edit_profile/",
    responses((status = 200, description = "Prefilled form", body = ProfileForm))
)]
pub async fn edit_profile_form(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<FormPage<ProfileForm>>> {
    let current = state
        .repo
        .get_user(user.id)
        .await?
        .ok_or(AppError::NotFound("user"))?;
    Ok(Json(FormPage::blank(ProfileForm::from(&current))))
}

/// edit_profile
///
/// [Authenticated Route] Updates the requesting user's own profile and redirects to
/// the profile under its (possibly new) username.
#[utoipa::path(
    post,
    path = "/profile/edit_profile/",
    request_body(content = ProfileForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Saved; redirect to the profile"),
        (status = 422, description = "Invalid form or username taken")
    )
)]
pub async fn edit_profile(
    user: AuthUser,
    State(state): State<AppState>,
    Form(form): Form<ProfileForm>,
) -> AppResult<Response> {
    let input = match form.validate() {
        Ok(input) => input,
        Err(errors) => return Ok(invalid_form(form, errors)),
    };

    if let Some(existing) = state.repo.get_user_by_username(&input.username).await? {
        if existing.id != user.id {
            return Ok(invalid_form(form, username_taken()));
        }
    }

    match state.repo.update_profile(user.id, input).await {
        Ok(Some(updated)) => Ok(redirect(&profile_url(&updated.username))),
        Ok(None) => Err(AppError::NotFound("user")),
        // Lost a race for the username against another account.
        Err(e) if is_unique_violation(&e) => Ok(invalid_form(form, username_taken())),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn username_taken() -> FieldErrors {
    FieldErrors::from([("username".to_string(), vec![USERNAME_TAKEN.to_string()])])
}
