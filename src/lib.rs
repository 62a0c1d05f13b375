pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::return_service::ReturnService;
use crate::services::storage::StorageService;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::auth::register,
        api::handlers::auth::login,
        api::handlers::auth::refresh,
        api::handlers::auth::profile,
        api::handlers::returns::list_returns,
        api::handlers::returns::create_return,
        api::handlers::returns::get_return,
        api::handlers::returns::update_status,
        api::handlers::returns::statistics,
        api::handlers::media::get_media,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::auth::RegisterRequest,
            api::handlers::auth::RegisterResponse,
            api::handlers::auth::UserResponse,
            api::handlers::auth::LoginRequest,
            api::handlers::auth::TokenPairResponse,
            api::handlers::auth::RefreshRequest,
            api::handlers::auth::AccessTokenResponse,
            api::handlers::returns::ReturnRequestResponse,
            api::handlers::returns::UserDetails,
            api::handlers::returns::MediaFileResponse,
            api::handlers::returns::UpdateStatusRequest,
            api::handlers::returns::StatisticsResponse,
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "auth", description = "Registration, login and token refresh"),
        (name = "returns", description = "Return request lifecycle"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub storage: Arc<dyn StorageService>,
    pub returns: Arc<ReturnService>,
    pub config: AppConfig,
}

pub fn create_app(state: AppState) -> Router {
    let cors = if state.config.allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check))
        .route("/register", post(api::handlers::auth::register))
        .route("/auth/login", post(api::handlers::auth::login))
        .route("/auth/refresh", post(api::handlers::auth::refresh))
        .route(
            "/profile",
            get(api::handlers::auth::profile).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::auth_middleware,
            )),
        )
        .route(
            "/return-requests",
            get(api::handlers::returns::list_returns)
                .post(api::handlers::returns::create_return)
                .layer(DefaultBodyLimit::max(
                    // Buffer for multipart framing overhead
                    state.config.max_upload_size + 1024 * 1024,
                ))
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::auth_middleware,
                )),
        )
        .route(
            "/return-requests/statistics",
            get(api::handlers::returns::statistics).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::auth_middleware,
            )),
        )
        .route(
            "/return-requests/:id",
            get(api::handlers::returns::get_return).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::auth_middleware,
            )),
        )
        .route(
            "/return-requests/:id/update_status",
            patch(api::handlers::returns::update_status).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::auth_middleware,
            )),
        )
        .route(
            "/media/*path",
            get(api::handlers::media::get_media).layer(from_fn_with_state(
                state.clone(),
                api::middleware::auth::auth_middleware,
            )),
        )
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(cors)
        .with_state(state)
}
