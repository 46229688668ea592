//! Account administration on the token surface.

use axum::{
    extract::{Extension, Path},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use super::auth::gate::{authorize, Capability};
use super::auth::principal::{AccountRole, Principal};
use super::auth::storage;
use super::auth::token::require_account;
use super::auth::types::RoleUpdateRequest;
use super::auth::{ApiFailure, ApiSuccess, AuthState, ErrorCode};

/// POST /api/accounts/:id/role
pub async fn update_role(
    Extension(pool): Extension<PgPool>,
    Extension(state): Extension<Arc<AuthState>>,
    Path(account_id): Path<Uuid>,
    headers: HeaderMap,
    payload: Option<Json<RoleUpdateRequest>>,
) -> Response {
    let caller = match require_account(&pool, &state, &headers).await {
        Ok(account) => account,
        Err(failure) => return failure.into_response(),
    };

    if authorize(&Principal::Account(caller), Capability::ManageAccountRoles).is_err() {
        return ApiFailure::new(ErrorCode::Forbidden).into_response();
    }

    let role = payload
        .and_then(|Json(request)| request.role)
        .as_deref()
        .and_then(AccountRole::from_str);
    let Some(role) = role else {
        return ApiFailure::validation(BTreeMap::from([(
            "role".to_string(),
            "The role must be one of: user, staff, admin.".to_string(),
        )]))
        .into_response();
    };

    match storage::update_account_role(&pool, account_id, role).await {
        Ok(true) => ApiSuccess::new("Role updated").into_response(),
        Ok(false) => ApiFailure::new(ErrorCode::ResourceNotFound).into_response(),
        Err(err) => {
            tracing::error!("role update failed: {err:#}");
            ApiFailure::new(ErrorCode::ServerError).into_response()
        }
    }
}
