use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Deserializer};
use std::sync::Arc;

use super::auth::CurrentAccount;
use super::validation::{parse_role, validate_account_id};
use super::{ApiError, ApiResponse, AppState, CycleCheckResponse, MessageResponse};
use crate::domain::{AccountId, AccountPatch, NewAccount, Password, Role};
use crate::services::AccountDto;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub mobile_no: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub password: Password,
    #[serde(default)]
    pub manager_id: Option<AccountId>,
}

impl CreateAccountRequest {
    fn into_new_account(self) -> Result<NewAccount, ApiError> {
        let role = match self.role.as_deref() {
            Some(tag) => parse_role(tag)?,
            None => Role::default(),
        };

        Ok(NewAccount {
            username: self.username,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            mobile_no: self.mobile_no,
            address: self.address,
            role,
            password: self.password,
            manager_id: self.manager_id,
        })
    }
}

/// Absent fields are left alone; an explicit `null` clears the clearable
/// ones (`mobileNo`, `address`, `managerId`).
#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UpdateAccountRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub mobile_no: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub manager_id: Option<Option<AccountId>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl UpdateAccountRequest {
    fn into_patch(self) -> Result<AccountPatch, ApiError> {
        let role = self.role.as_deref().map(parse_role).transpose()?;

        Ok(AccountPatch {
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            mobile_no: self.mobile_no,
            address: self.address,
            role,
            manager_id: self.manager_id,
            is_active: self.is_active,
        })
    }
}

fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Deserialize)]
pub struct PasswordResetRequest {
    pub password: Password,
}

#[derive(Deserialize)]
pub struct CycleCheckQuery {
    pub manager_id: i32,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /accounts
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentAccount>,
) -> Result<Json<ApiResponse<Vec<AccountDto>>>, ApiError> {
    current.require_directory_viewer()?;

    let accounts = state.accounts().list().await?;
    Ok(Json(ApiResponse::success(
        accounts.iter().map(AccountDto::from).collect(),
    )))
}

/// POST /accounts
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentAccount>,
    Json(payload): Json<CreateAccountRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AccountDto>>), ApiError> {
    current.require_admin()?;

    let account = state
        .accounts()
        .create(payload.into_new_account()?)
        .await?;

    tracing::info!(
        account_id = %account.id(),
        created_by = %current.id(),
        "Account created via API"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(account.into())),
    ))
}

/// GET /accounts/{id}
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentAccount>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<AccountDto>>, ApiError> {
    let id = validate_account_id(id)?;
    if current.id() != id {
        current.require_directory_viewer()?;
    }

    let account = state.accounts().get(id).await?;
    Ok(Json(ApiResponse::success(account.into())))
}

/// PATCH /accounts/{id}
pub async fn update_account(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentAccount>,
    Path(id): Path<i32>,
    Json(payload): Json<UpdateAccountRequest>,
) -> Result<Json<ApiResponse<AccountDto>>, ApiError> {
    current.require_admin()?;
    let id = validate_account_id(id)?;

    let patch = payload.into_patch()?;
    if id == current.id() {
        if patch.is_active == Some(false) {
            return Err(ApiError::validation(
                "isActive: You cannot deactivate your own account",
            ));
        }
        if patch.role.is_some_and(|role| !role.is_admin()) {
            return Err(ApiError::validation(
                "role: You cannot remove your own administrator role",
            ));
        }
    }

    let account = state.accounts().update(id, patch).await?;
    Ok(Json(ApiResponse::success(account.into())))
}

/// DELETE /accounts/{id}
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentAccount>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    current.require_admin()?;
    let id = validate_account_id(id)?;

    if id == current.id() {
        return Err(ApiError::validation("id: You cannot delete your own account"));
    }

    state.accounts().delete(id).await?;
    Ok(Json(ApiResponse::success(MessageResponse::new(format!(
        "Account {id} deleted"
    )))))
}

/// POST /accounts/{id}/deactivate
pub async fn deactivate_account(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentAccount>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<AccountDto>>, ApiError> {
    current.require_admin()?;
    let id = validate_account_id(id)?;

    if id == current.id() {
        return Err(ApiError::validation(
            "id: You cannot deactivate your own account",
        ));
    }

    let account = state.accounts().deactivate(id).await?;
    Ok(Json(ApiResponse::success(account.into())))
}

/// POST /accounts/{id}/password-reset
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentAccount>,
    Path(id): Path<i32>,
    Json(payload): Json<PasswordResetRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    current.require_admin()?;
    let id = validate_account_id(id)?;

    state.accounts().reset_password(id, payload.password).await?;

    tracing::info!(account_id = %id, reset_by = %current.id(), "Password reset via API");

    Ok(Json(ApiResponse::success(MessageResponse::new(
        "Password reset; the account must choose a new password at next login",
    ))))
}

/// GET /accounts/{id}/reports
pub async fn list_reports(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentAccount>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<Vec<AccountDto>>>, ApiError> {
    let id = validate_account_id(id)?;
    if current.id() != id {
        current.require_admin()?;
    }

    let reports = state.accounts().reports_of(id).await?;
    Ok(Json(ApiResponse::success(
        reports.iter().map(AccountDto::from).collect(),
    )))
}

/// GET /accounts/{id}/cycle-check?manager_id=
pub async fn cycle_check(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentAccount>,
    Path(id): Path<i32>,
    Query(query): Query<CycleCheckQuery>,
) -> Result<Json<ApiResponse<CycleCheckResponse>>, ApiError> {
    current.require_admin()?;
    let id = validate_account_id(id)?;
    let manager_id = validate_account_id(query.manager_id)?;

    let would_create_cycle = state
        .accounts()
        .would_create_cycle(id, manager_id)
        .await?;

    Ok(Json(ApiResponse::success(CycleCheckResponse {
        id,
        manager_id,
        would_create_cycle,
    })))
}
