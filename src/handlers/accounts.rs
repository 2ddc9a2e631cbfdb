use axum::{
    Form,
    extract::State,
    response::Response,
};
use serde::Deserialize;
use uuid::Uuid;

use super::{index_url, invalid_form, profile::username_taken, redirect};
use crate::{
    AppState,
    error::{AppError, AppResult, is_unique_violation},
    forms::{FieldErrors, RegistrationForm},
    models::{ROLE_USER, User},
};

/// Minimal view of the identity provider's signup response: the new user's UUID.
#[derive(Deserialize)]
struct SignupResponse {
    id: Uuid,
}

/// register_user
///
/// [Public Route] Registers a new account with the identity provider and mirrors
/// it into the local `users` table under the same UUID, then redirects to the
/// index.
#[utoipa::path(
    post,
    path = "/auth/registration/",
    request_body(content = RegistrationForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Registered; redirect to the index"),
        (status = 422, description = "Invalid form, username taken or rejected by the provider"),
        (status = 503, description = "Registration not configured")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Form(form): Form<RegistrationForm>,
) -> AppResult<Response> {
    let input = match form.validate() {
        Ok(input) => input,
        Err(errors) => return Ok(invalid_form(form, errors)),
    };

    let (Some(provider_url), Some(provider_key)) = (
        state.config.auth_provider_url.as_deref(),
        state.config.auth_provider_key.as_deref(),
    ) else {
        return Err(AppError::Unavailable("registration"));
    };

    if state.repo.get_user_by_username(&input.username).await?.is_some() {
        return Ok(invalid_form(form, username_taken()));
    }

    let response = reqwest::Client::new()
        .post(format!("{provider_url}/auth/v1/signup"))
        .header("apikey", provider_key)
        .json(&serde_json::json!({ "email": input.email, "password": input.password }))
        .send()
        .await
        .map_err(|e| AppError::IdentityProvider(e.to_string()))?;

    if !response.status().is_success() {
        tracing::info!(status = %response.status(), "identity provider rejected signup");
        let errors = FieldErrors::from([(
            "email".to_string(),
            vec!["Registration was rejected for this email address.".to_string()],
        )]);
        return Ok(invalid_form(form, errors));
    }

    let signup = response
        .json::<SignupResponse>()
        .await
        .map_err(|e| AppError::IdentityProvider(e.to_string()))?;

    let provider_id = signup.id;
    let user = User {
        id: provider_id,
        username: input.username,
        email: input.email,
        role: ROLE_USER.to_string(),
        ..User::default()
    };
    match state.repo.create_user(user).await {
        Ok(created) => {
            tracing::info!(user = %created.id, "user registered");
            Ok(redirect(&index_url()))
        }
        Err(e) => {
            // The provider account now has no local user; reconcile by this id.
            tracing::warn!(
                provider_user = %provider_id,
                "signup left without a local user: {}",
                e
            );
            if is_unique_violation(&e) {
                Ok(invalid_form(form, username_taken()))
            } else {
                Err(e.into())
            }
        }
    }
}
