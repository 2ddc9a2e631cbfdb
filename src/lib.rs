use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Domain model, persistence and storage.
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod storage;

// Listing and form machinery shared by the handlers.
pub mod forms;
pub mod pagination;
pub mod query;

pub mod handlers;

// Routing segregated by access level (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::{PostgresRepository, Repository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document for every page and mutation, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::posts::index, handlers::posts::category_posts, handlers::posts::post_detail,
        handlers::posts::create_post_form, handlers::posts::create_post,
        handlers::posts::edit_post_form, handlers::posts::edit_post,
        handlers::posts::delete_post_form, handlers::posts::delete_post,
        handlers::comments::add_comment, handlers::comments::edit_comment_form,
        handlers::comments::edit_comment, handlers::comments::delete_comment_form,
        handlers::comments::delete_comment,
        handlers::profile::profile, handlers::profile::edit_profile_form,
        handlers::profile::edit_profile,
        handlers::accounts::register_user, handlers::media::get_presigned_url,
        handlers::admin::list_categories, handlers::admin::create_category,
        handlers::admin::set_category_status, handlers::admin::delete_category,
        handlers::admin::list_locations, handlers::admin::create_location,
        handlers::admin::set_location_status, handlers::admin::delete_location,
        handlers::admin::set_post_status
    ),
    components(
        schemas(
            models::User, models::Category, models::Location, models::Post, models::Comment,
            models::PresignedUrlRequest, models::PresignedUrlResponse,
            models::PostListPage, models::CategoryPage, models::PostDetailPage,
            models::ProfilePage, models::DeletePostPage, models::DeleteCommentPage,
            forms::PostForm, forms::CommentForm, forms::ProfileForm, forms::RegistrationForm,
            forms::CategoryForm, forms::LocationForm, error::ErrorPage,
        )
    ),
    tags(
        (name = "blogicum", description = "Blogicum blogging platform")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared by every request: persistence, object storage and the loaded configuration.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub storage: StorageState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Guards the authenticated routes. Extracting `AuthUser` rejects unauthenticated
/// requests with 401 before any handler runs.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles public, authenticated and admin routes with the shared state, the
/// not-found fallback and the observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        // The admin role is checked inside each handler.
        .nest("/admin", admin::admin_routes())
        .fallback(error::page_not_found)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// Opens the per-request span, tagged with the request id so every log line of
/// one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
