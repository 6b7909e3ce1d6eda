use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::application::auth_service::AuthResult;
use crate::domain::user::{LoginRequest, RegisterRequest, ResetPasswordRequest, User};
use crate::presentation::AppState;
use crate::presentation::app_error::AppResult;
use crate::presentation::extract::ApiJson;
use crate::presentation::middleware::auth::AuthenticatedUser;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub(crate) struct RegisterDto {
    #[validate(length(min = 3, max = 64))]
    pub(crate) username: String,
    #[validate(email)]
    pub(crate) email: String,
    #[validate(length(min = 8, max = 128))]
    pub(crate) password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub(crate) struct LoginDto {
    #[validate(length(min = 1, max = 254))]
    pub(crate) email: String,
    #[validate(length(min = 1))]
    pub(crate) password: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub(crate) struct ForgotPasswordDto {
    #[validate(length(min = 1, max = 254))]
    pub(crate) email: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub(crate) struct ResetPasswordDto {
    pub(crate) user_id: i64,
    #[validate(length(min = 1))]
    pub(crate) token: String,
    #[validate(length(min = 8, max = 128))]
    pub(crate) password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct AuthResponseDto {
    pub(crate) access_token: String,
    pub(crate) user: UserDto,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct SuccessDto {
    pub(crate) success: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct UserDto {
    pub(crate) id: i64,
    pub(crate) username: String,
    /// Present only when the caller is this user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) email: Option<String>,
    pub(crate) created_at: DateTime<Utc>,
}

impl UserDto {
    pub(crate) fn for_viewer(user: User, viewer: Option<i64>) -> Self {
        let email = (viewer == Some(user.id)).then_some(user.email);
        Self {
            id: user.id,
            username: user.username,
            email,
            created_at: user.created_at,
        }
    }
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        let viewer = Some(user.id);
        Self::for_viewer(user, viewer)
    }
}

impl From<AuthResult> for AuthResponseDto {
    fn from(result: AuthResult) -> Self {
        Self {
            access_token: result.access_token,
            user: result.user.into(),
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterDto,
    responses(
        (status = 201, description = "Registered successfully", body = AuthResponseDto),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Username or email already in use"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn register(
    State(state): State<AppState>,
    ApiJson(dto): ApiJson<RegisterDto>,
) -> AppResult<(StatusCode, Json<AuthResponseDto>)> {
    dto.validate()?;

    let req = RegisterRequest {
        username: dto.username,
        email: dto.email,
        password: dto.password,
    };

    let result = state.auth_service.register(req).await?;

    Ok((StatusCode::CREATED, Json(result.into())))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginDto,
    responses(
        (status = 200, description = "Login successful", body = AuthResponseDto),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn login(
    State(state): State<AppState>,
    ApiJson(dto): ApiJson<LoginDto>,
) -> AppResult<(StatusCode, Json<AuthResponseDto>)> {
    dto.validate()?;

    let req = LoginRequest {
        email: dto.email,
        password: dto.password,
    };

    let result = state.auth_service.login(req).await?;

    Ok((StatusCode::OK, Json(result.into())))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Current user", body = UserDto),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User no longer exists"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn me(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> AppResult<Json<UserDto>> {
    let user = state.auth_service.me(auth.user_id).await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    tag = "auth",
    request_body = ForgotPasswordDto,
    responses(
        (status = 200, description = "Reset link sent if the account exists", body = SuccessDto),
        (status = 400, description = "Validation error"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(dto): ApiJson<ForgotPasswordDto>,
) -> AppResult<Json<SuccessDto>> {
    dto.validate()?;
    state.auth_service.forgot_password(&dto.email).await?;
    Ok(Json(SuccessDto { success: true }))
}

#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    tag = "auth",
    request_body = ResetPasswordDto,
    responses(
        (status = 200, description = "Password changed", body = AuthResponseDto),
        (status = 400, description = "Validation error or invalid token"),
        (status = 500, description = "Internal error")
    )
)]
pub(crate) async fn reset_password(
    State(state): State<AppState>,
    ApiJson(dto): ApiJson<ResetPasswordDto>,
) -> AppResult<Json<AuthResponseDto>> {
    dto.validate()?;

    let req = ResetPasswordRequest {
        user_id: dto.user_id,
        token: dto.token,
        password: dto.password,
    };

    let result = state.auth_service.reset_password(req).await?;
    Ok(Json(result.into()))
}
