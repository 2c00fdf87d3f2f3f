use axum::{
    Extension, Json,
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_sessions::Session;

use super::{ApiError, ApiResponse, AppState, MessageResponse};
use crate::domain::{AccountId, AccountRecord, Password};
use crate::services::{AccountDto, AccountError};

const SESSION_ACCOUNT_KEY: &str = "account_id";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: Password,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub account: AccountDto,
    pub must_change_password: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: Password,
    pub new_password: Password,
}

/// The signed-in account, loaded fresh from the directory on every request.
#[derive(Debug, Clone)]
pub struct CurrentAccount(pub AccountRecord);

impl CurrentAccount {
    #[must_use]
    pub const fn id(&self) -> AccountId {
        self.0.id()
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.0.role().is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Administrator role required"))
        }
    }

    pub fn require_directory_viewer(&self) -> Result<(), ApiError> {
        if self.0.role().can_view_directory() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Administrator or manager role required"))
        }
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Resolves the session cookie to an active account.
///
/// Sessions whose account has since been deactivated or deleted are flushed
/// and rejected.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    session: Session,
    mut request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    let id = get_session_account(&session).await?;

    let account = match state.accounts().get(id).await {
        Ok(account) if account.is_active() => account,
        Ok(_) | Err(AccountError::NotFound(_)) => {
            let _ = session.flush().await;
            return Err(ApiError::Unauthorized("Session is no longer valid".to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::Span::current().record("account_id", id.value());
    request.extensions_mut().insert(CurrentAccount(account));

    Ok(next.run(request).await)
}

/// Blocks everything but the `/auth` routes until a mandated password change
/// has been made. Must run after [`auth_middleware`].
pub async fn password_change_guard(
    Extension(current): Extension<CurrentAccount>,
    request: Request,
    next: Next,
) -> Result<impl IntoResponse, ApiError> {
    if current.0.first_login() {
        return Err(ApiError::forbidden(
            "Password change required before continuing",
        ));
    }

    Ok(next.run(request).await)
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    if payload.username.trim().is_empty() {
        return Err(ApiError::validation("username: Username is required"));
    }
    if payload.password.is_empty() {
        return Err(ApiError::validation("password: Password is required"));
    }

    let account = state
        .accounts()
        .authenticate(payload.username.trim(), &payload.password)
        .await?;

    session
        .cycle_id()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))?;
    session
        .insert(SESSION_ACCOUNT_KEY, account.id().value())
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create session: {e}")))?;

    tracing::info!(account_id = %account.id(), username = %account.username(), "Login succeeded");

    Ok(Json(ApiResponse::success(LoginResponse {
        must_change_password: account.first_login(),
        account: account.into(),
    })))
}

/// POST /auth/logout
pub async fn logout(session: Session) -> Json<ApiResponse<MessageResponse>> {
    let _ = session.flush().await;
    Json(ApiResponse::success(MessageResponse::new("Logged out")))
}

/// GET /auth/me
pub async fn get_current_account(
    Extension(current): Extension<CurrentAccount>,
) -> Json<ApiResponse<AccountDto>> {
    Json(ApiResponse::success(AccountDto::from(current.0)))
}

/// PUT /auth/password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentAccount>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .accounts()
        .change_password(current.id(), payload.current_password, payload.new_password)
        .await?;

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Password updated successfully",
    ))))
}

/// GET /auth/manager
pub async fn get_my_manager(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentAccount>,
) -> Result<Json<ApiResponse<Option<AccountDto>>>, ApiError> {
    let manager = state.accounts().manager_of(current.id()).await?;
    Ok(Json(ApiResponse::success(manager.map(AccountDto::from))))
}

// ============================================================================
// Helpers
// ============================================================================

async fn get_session_account(session: &Session) -> Result<AccountId, ApiError> {
    session
        .get::<i32>(SESSION_ACCOUNT_KEY)
        .await
        .map_err(|e| ApiError::internal(format!("Session error: {e}")))?
        .map(AccountId::new)
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))
}
