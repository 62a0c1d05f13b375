use crate::api::error::AppError;
use crate::entities::{prelude::*, users};
use crate::utils::auth::{
    Claims, TOKEN_TYPE_REFRESH, issue_access_token, issue_token_pair, validate_jwt,
};
use axum::Extension;
use crate::utils::hash::{hash_password, verify_password};
use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, SqlErr};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "This field is required."))]
    pub password: String,
    #[validate(email(message = "Enter a valid email address."))]
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl From<users::Model> for UserResponse {
    fn from(user: users::Model) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RegisterResponse {
    pub user: UserResponse,
    pub access: String,
    pub refresh: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct TokenPairResponse {
    pub access: String,
    pub refresh: String,
}

#[derive(Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh: String,
}

#[derive(Serialize, ToSchema)]
pub struct AccessTokenResponse {
    pub access: String,
}

#[utoipa::path(
    post,
    path = "/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = RegisterResponse),
        (status = 400, description = "Validation failure, field-keyed")
    )
)]
pub async fn register(
    State(state): State<crate::AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    payload.validate()?;

    let taken = Users::find()
        .filter(users::Column::Username.eq(&payload.username))
        .one(&state.db)
        .await?
        .is_some();
    if taken {
        return Err(AppError::field(
            "username",
            "A user with that username already exists.",
        ));
    }

    let password_hash =
        hash_password(&payload.password).map_err(|e| AppError::Internal(e.to_string()))?;

    let user = users::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        username: Set(payload.username),
        password_hash: Set(password_hash),
        email: Set(payload.email),
        first_name: Set(payload.first_name),
        last_name: Set(payload.last_name),
        // Staff rights are only ever granted through the create-staff binary
        is_staff: Set(false),
        is_superuser: Set(false),
        created_at: Set(Utc::now()),
    };

    // The unique index backs up the pre-check above under concurrent
    // registration; anything other than a duplicate is a real failure.
    let user = user.insert(&state.db).await.map_err(|e| match e.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => {
            AppError::field("username", "A user with that username already exists.")
        }
        _ => AppError::Database(e),
    })?;

    let tokens = issue_token_pair(
        &user,
        &state.config.jwt_secret,
        state.config.access_token_minutes,
        state.config.refresh_token_days,
    )
    .map_err(|e| AppError::Internal(e.to_string()))?;

    tracing::info!("👤 Registered user {}", user.username);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: user.into(),
            access: tokens.access,
            refresh: tokens.refresh,
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = TokenPairResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<crate::AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenPairResponse>, AppError> {
    let user = Users::find()
        .filter(users::Column::Username.eq(&payload.username))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

    let valid = verify_password(&payload.password, &user.password_hash)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    if !valid {
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    let tokens = issue_token_pair(
        &user,
        &state.config.jwt_secret,
        state.config.access_token_minutes,
        state.config.refresh_token_days,
    )
    .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(TokenPairResponse {
        access: tokens.access,
        refresh: tokens.refresh,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = AccessTokenResponse),
        (status = 401, description = "Invalid refresh token")
    )
)]
pub async fn refresh(
    State(state): State<crate::AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AccessTokenResponse>, AppError> {
    let claims = validate_jwt(&payload.refresh, &state.config.jwt_secret)
        .map_err(|_| AppError::Unauthorized("Invalid refresh token".to_string()))?;

    if claims.token_type != TOKEN_TYPE_REFRESH {
        return Err(AppError::Unauthorized("Invalid refresh token".to_string()));
    }

    // Re-read the account so staff flag changes and deletions take effect
    // on the next access token, not only at login.
    let user = Users::find_by_id(&claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid refresh token".to_string()))?;

    let access = issue_access_token(
        &user,
        &state.config.jwt_secret,
        state.config.access_token_minutes,
    )
    .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(AccessTokenResponse { access }))
}

#[utoipa::path(
    get,
    path = "/profile",
    responses(
        (status = 200, description = "The caller's own account", body = UserResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("jwt" = []))
)]
pub async fn profile(
    State(state): State<crate::AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UserResponse>, AppError> {
    let user = Users::find_by_id(&claims.sub)
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(user.into()))
}
