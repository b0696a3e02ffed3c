//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, logout, guest sessions and
//! guest conversion.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use vista_core::domain::{ProfileUpdate, User};

use crate::error::{ApiError, ApiResult, ErrorResponse};
use crate::web::middleware::{session_id_from_headers, SESSION_COOKIE};
use crate::web::state::AppState;
use crate::workflows::accounts;

const SESSION_DAYS: i64 = 30;
const GUEST_SESSION_DAYS: i64 = 7;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ConvertGuestRequest {
    pub email: String,
    pub password: String,
    /// Onboarding answers collected while the user was a guest.
    #[schema(value_type = Option<Object>)]
    pub profile: Option<ProfileUpdate>,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub is_guest: bool,
}

impl From<&User> for AuthResponse {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.user_id,
            email: user.email.clone(),
            is_guest: user.is_guest,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ConvertGuestResponse {
    #[serde(flatten)]
    pub user: AuthResponse,
    pub warnings: Vec<String>,
}

//=========================================================================================
// Helpers
//=========================================================================================

fn validate_credentials(email: &str, password: &str) -> ApiResult<()> {
    if !email.contains('@') || email.trim() != email || email.is_empty() {
        return Err(ApiError::BadRequest("A valid email is required".to_string()));
    }
    if password.len() < 8 {
        return Err(ApiError::BadRequest(
            "Password must be at least 8 characters".to_string(),
        ));
    }
    Ok(())
}

fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            ApiError::Internal("Failed to hash password".to_string())
        })
}

/// Creates an auth session row and returns the matching `Set-Cookie` value.
async fn start_session(state: &AppState, user_id: Uuid, days: i64) -> ApiResult<String> {
    let auth_session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(days);

    state
        .db
        .create_auth_session(&auth_session_id, user_id, expires_at)
        .await?;

    Ok(format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE,
        auth_session_id,
        Duration::days(days).num_seconds()
    ))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<impl IntoResponse> {
    // 1. Validate and hash the password
    validate_credentials(&req.email, &req.password)?;
    let password_hash = hash_password(&req.password)?;

    // 2. Create user, profile and vector store
    let user = state
        .db
        .create_user_with_email(&req.email, &password_hash)
        .await?;
    accounts::provision_account(&state, &user).await?;

    // 3. Open a session
    let cookie = start_session(&state, user.user_id, SESSION_DAYS).await?;
    info!("User {} signed up", user.user_id);

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse::from(&user)),
    ))
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    // 1. Get user by email
    let user_creds = state.db.get_user_by_email(&req.email).await.map_err(|e| {
        warn!("Login failed for {}: {}", req.email, e);
        ApiError::Unauthorized
    })?;

    // 2. Verify password
    let parsed_hash = PasswordHash::new(&user_creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        ApiError::Internal("Authentication error".to_string())
    })?;

    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();
    if !valid {
        return Err(ApiError::Unauthorized);
    }

    // 3. Open a session
    let cookie = start_session(&state, user_creds.user_id, SESSION_DAYS).await?;

    let response = AuthResponse {
        user_id: user_creds.user_id,
        email: Some(user_creds.email),
        is_guest: false,
    };
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session", body = ErrorResponse)
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let auth_session_id = session_id_from_headers(&headers).ok_or(ApiError::Unauthorized)?;
    state.db.delete_auth_session(auth_session_id).await?;

    let cookie = format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE
    );
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)]))
}

/// POST /auth/guest - Start an anonymous session
#[utoipa::path(
    post,
    path = "/auth/guest",
    responses(
        (status = 201, description = "Guest session created", body = AuthResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn guest_handler(State(state): State<Arc<AppState>>) -> ApiResult<impl IntoResponse> {
    let user = state.db.create_guest_user().await?;
    accounts::provision_account(&state, &user).await?;
    let cookie = start_session(&state, user.user_id, GUEST_SESSION_DAYS).await?;
    info!("Guest {} started a session", user.user_id);

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse::from(&user)),
    ))
}

/// POST /auth/convert_guest - Register the current guest account
#[utoipa::path(
    post,
    path = "/auth/convert_guest",
    request_body = ConvertGuestRequest,
    responses(
        (status = 200, description = "Guest converted", body = ConvertGuestResponse),
        (status = 207, description = "Guest converted, some follow-up steps failed", body = ConvertGuestResponse),
        (status = 400, description = "Caller is not a guest or the request is invalid", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse)
    )
)]
pub async fn convert_guest_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    headers: HeaderMap,
    Json(req): Json<ConvertGuestRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_credentials(&req.email, &req.password)?;
    let password_hash = hash_password(&req.password)?;

    let report =
        accounts::convert_guest(&state, user_id, &req.email, &password_hash, req.profile).await?;

    // The guest session is swapped for a regular one.
    if let Some(old_session) = session_id_from_headers(&headers) {
        if let Err(e) = state.db.delete_auth_session(old_session).await {
            warn!("Could not drop guest session for {}: {}", user_id, e);
        }
    }
    let cookie = start_session(&state, user_id, SESSION_DAYS).await?;

    let status = if report.warnings.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };
    let response = ConvertGuestResponse {
        user: AuthResponse::from(&report.user),
        warnings: report.warnings,
    };
    Ok((status, [(header::SET_COOKIE, cookie)], Json(response)))
}
