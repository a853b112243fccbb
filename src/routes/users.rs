/// User Routes
///
/// Registration, the session lifecycle (login, refresh, logout, password
/// change) and profile endpoints under `/api/v1/users`.

use actix_multipart::Multipart;
use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::accounts::{AccountService, Registration};
use crate::auth::{AuthenticatedUser, SessionManager, TokenPair};
use crate::configuration::ApplicationSettings;
use crate::cookies::{removal_cookie, session_cookie, ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};
use crate::error::{AppError, ErrorContext};
use crate::response::ApiResponse;
use crate::store::SanitizedUser;
use crate::uploads::{StagedForm, StagingArea};

/// Multipart file part names
pub const AVATAR_FIELD: &str = "avatar";
pub const COVER_IMAGE_FIELD: &str = "coverImage";

impl From<&StagedForm> for Registration {
    fn from(form: &StagedForm) -> Self {
        Self {
            full_name: form.text("fullName"),
            email: form.text("email"),
            username: form.text("username"),
            password: form.text("password"),
            avatar_local_path: form.file(AVATAR_FIELD),
            cover_image_local_path: form.file(COVER_IMAGE_FIELD),
        }
    }
}

/// Either `username` or `email` identifies the account
#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: SanitizedUser,
    pub access_token: String,
    pub refresh_token: String,
}

fn empty() -> serde_json::Value {
    serde_json::json!({})
}

fn with_session_cookies<T: Serialize>(
    body: ApiResponse<T>,
    tokens: &TokenPair,
    settings: &ApplicationSettings,
) -> HttpResponse {
    body.builder()
        .cookie(session_cookie(
            ACCESS_TOKEN_COOKIE,
            tokens.access_token.clone(),
            settings.cookie_secure,
        ))
        .cookie(session_cookie(
            REFRESH_TOKEN_COOKIE,
            tokens.refresh_token.clone(),
            settings.cookie_secure,
        ))
        .json(body)
}

/// POST /api/v1/users/register
///
/// `multipart/form-data` with text parts `fullName`, `email`, `username`,
/// `password` and file parts `avatar` (required) and `coverImage`.
///
/// # Errors
/// - 400: missing fields, invalid format, or avatar missing/failed to upload
/// - 409: username or email already taken
pub async fn register(
    payload: Multipart,
    staging: web::Data<StagingArea>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AppError> {
    let mut form = staging
        .receive(payload, &[AVATAR_FIELD, COVER_IMAGE_FIELD])
        .await?;
    let result = accounts.register(Registration::from(&form)).await;
    form.discard().await;

    let user = result?;
    Ok(ApiResponse::new(StatusCode::CREATED, user, "User registered successfully").into_response())
}

/// POST /api/v1/users/login
///
/// Sets `accessToken` and `refreshToken` cookies and returns both tokens in
/// the body for clients that cannot use cookies.
pub async fn login(
    form: web::Json<LoginRequest>,
    sessions: web::Data<SessionManager>,
    settings: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    let form = form.into_inner();
    let identifier = form
        .username
        .filter(|u| !u.trim().is_empty())
        .or(form.email)
        .unwrap_or_default();

    let outcome = sessions.login(&identifier, &form.password).await?;
    let tokens = outcome.tokens;

    let body = ApiResponse::ok(
        LoginResponse {
            user: outcome.user,
            access_token: tokens.access_token.clone(),
            refresh_token: tokens.refresh_token.clone(),
        },
        "User logged in successfully",
    );
    Ok(with_session_cookies(body, &tokens, &settings))
}

/// POST /api/v1/users/refresh-token
///
/// The `refreshToken` cookie wins over a `refreshToken` body field.
pub async fn refresh_token(
    req: HttpRequest,
    form: Option<web::Json<RefreshRequest>>,
    sessions: web::Data<SessionManager>,
    settings: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    let presented = req
        .cookie(REFRESH_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| form.and_then(|f| f.into_inner().refresh_token));

    let tokens = sessions.refresh(presented.as_deref()).await?;

    let body = ApiResponse::ok(tokens.clone(), "Access token refreshed");
    Ok(with_session_cookies(body, &tokens, &settings))
}

/// POST /api/v1/users/logout
pub async fn logout(
    user: web::ReqData<AuthenticatedUser>,
    sessions: web::Data<SessionManager>,
    settings: web::Data<ApplicationSettings>,
) -> Result<HttpResponse, AppError> {
    sessions.logout(user.id).await?;

    let body = ApiResponse::ok(empty(), "User logged out");
    Ok(body
        .builder()
        .cookie(removal_cookie(ACCESS_TOKEN_COOKIE, settings.cookie_secure))
        .cookie(removal_cookie(REFRESH_TOKEN_COOKIE, settings.cookie_secure))
        .json(body))
}

/// POST /api/v1/users/change-password
pub async fn change_password(
    user: web::ReqData<AuthenticatedUser>,
    form: web::Json<ChangePasswordRequest>,
    sessions: web::Data<SessionManager>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("change_password").with_user_id(user.id.to_string());

    sessions
        .change_password(user.id, &form.old_password, &form.new_password)
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    Ok(ApiResponse::ok(empty(), "Password changed successfully").into_response())
}

/// GET /api/v1/users/current-user
pub async fn current_user(user: web::ReqData<AuthenticatedUser>) -> HttpResponse {
    ApiResponse::ok(user.into_inner().user, "User fetched successfully").into_response()
}

/// PATCH /api/v1/users/update-account
pub async fn update_account(
    user: web::ReqData<AuthenticatedUser>,
    form: web::Json<UpdateAccountRequest>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AppError> {
    let updated = accounts
        .update_account(user.id, &form.full_name, &form.email)
        .await?;
    Ok(ApiResponse::ok(updated, "Account details updated successfully").into_response())
}

/// PATCH /api/v1/users/avatar (multipart file part `avatar`)
pub async fn update_avatar(
    user: web::ReqData<AuthenticatedUser>,
    payload: Multipart,
    staging: web::Data<StagingArea>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AppError> {
    let mut form = staging.receive(payload, &[AVATAR_FIELD]).await?;
    let result = accounts
        .update_avatar(user.id, form.file(AVATAR_FIELD).as_deref())
        .await;
    form.discard().await;

    Ok(ApiResponse::ok(result?, "Avatar image updated successfully").into_response())
}

/// PATCH /api/v1/users/cover-image (multipart file part `coverImage`)
pub async fn update_cover_image(
    user: web::ReqData<AuthenticatedUser>,
    payload: Multipart,
    staging: web::Data<StagingArea>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AppError> {
    let mut form = staging.receive(payload, &[COVER_IMAGE_FIELD]).await?;
    let result = accounts
        .update_cover_image(user.id, form.file(COVER_IMAGE_FIELD).as_deref())
        .await;
    form.discard().await;

    Ok(ApiResponse::ok(result?, "Cover image updated successfully").into_response())
}

/// GET /api/v1/users/c/{username}
pub async fn channel_profile(
    user: web::ReqData<AuthenticatedUser>,
    username: web::Path<String>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AppError> {
    let profile = accounts.channel_profile(&username, user.id).await?;
    Ok(ApiResponse::ok(profile, "User channel fetched successfully").into_response())
}

/// GET /api/v1/users/history
pub async fn watch_history(
    user: web::ReqData<AuthenticatedUser>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AppError> {
    let history = accounts.watch_history(user.id).await?;
    Ok(ApiResponse::ok(history, "Watch history fetched successfully").into_response())
}

/// POST /api/v1/users/history/{video_id}
pub async fn record_watch(
    user: web::ReqData<AuthenticatedUser>,
    video_id: web::Path<Uuid>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AppError> {
    accounts.record_watch(user.id, video_id.into_inner()).await?;
    Ok(ApiResponse::ok(empty(), "Video added to watch history").into_response())
}
