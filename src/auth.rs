use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    config::{AppConfig, Env},
    error::AppError,
    models::ROLE_ADMIN,
    repository::RepositoryState,
};

/// Claims
///
/// Payload of the identity token issued by the identity provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's UUID, primary key of the `users` table.
    pub sub: Uuid,
    /// Expiration time. Expired tokens are rejected.
    pub exp: usize,
    /// Issued at.
    pub iat: usize,
}

/// AuthUser
///
/// The resolved identity of an authenticated request. Ownership checks compare
/// `id` against the owner of the post or comment being mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }

    /// Whether this user owns an entity authored by `owner_id`.
    pub fn owns(&self, owner_id: Uuid) -> bool {
        self.id == owner_id
    }
}

/// AuthUser extractor
///
/// 1. In `Env::Local`, an `x-user-id` header naming an existing user is accepted.
/// 2. Otherwise a `Bearer` token is decoded and validated (signature and `exp`).
/// 3. The subject must still exist in the `users` table.
///
/// Rejects with `AppError::Unauthorized` on any authentication failure and with
/// `AppError::Database` if the lookup itself fails.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let repo = RepositoryState::from_ref(state);
        let config = AppConfig::from_ref(state);

        if config.env == Env::Local {
            let bypass_id = parts
                .headers
                .get("x-user-id")
                .and_then(|value| value.to_str().ok())
                .and_then(|value| Uuid::parse_str(value).ok());
            if let Some(user_id) = bypass_id {
                if let Some(user) = lookup(&repo, user_id).await? {
                    return Ok(user);
                }
            }
        }

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthorized)?;

        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let token_data = decode::<Claims>(token, &decoding_key, &validation).map_err(|e| {
            tracing::debug!("rejected identity token: {:?}", e.kind());
            AppError::Unauthorized
        })?;

        lookup(&repo, token_data.claims.sub)
            .await?
            .ok_or(AppError::Unauthorized)
    }
}

async fn lookup(repo: &RepositoryState, user_id: Uuid) -> Result<Option<AuthUser>, AppError> {
    let user = repo.get_user(user_id).await?;
    Ok(user.map(|user| AuthUser {
        id: user.id,
        username: user.username,
        role: user.role,
    }))
}

/// Viewer
///
/// Optional identity for public pages: anonymous readers get `Viewer(None)`
/// instead of a rejection. A failed user lookup is still a server error.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<AuthUser>);

impl Viewer {
    pub fn id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|user| user.id)
    }

    pub fn is(&self, user_id: Uuid) -> bool {
        self.id() == Some(user_id)
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
    RepositoryState: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match AuthUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(Viewer(Some(user))),
            Err(AppError::Unauthorized) => Ok(Viewer(None)),
            Err(e) => Err(e),
        }
    }
}
