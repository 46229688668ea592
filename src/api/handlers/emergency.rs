//! Emergency call submission on the token surface.

use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::auth::rate_limit::{RateLimitAction, RateLimitDecision};
use super::auth::storage;
use super::auth::token::require_account;
use super::auth::types::EmergencyCallRequest;
use super::auth::utils::extract_client_ip;
use super::auth::{ApiFailure, ApiSuccess, AuthState, ErrorCode};

/// POST /api/emergency-calls
///
/// Throttled per client address; clients behind an unidentifiable proxy
/// share one bucket rather than bypassing the limit.
pub async fn create(
    Extension(pool): Extension<PgPool>,
    Extension(state): Extension<Arc<AuthState>>,
    headers: HeaderMap,
    payload: Option<Json<EmergencyCallRequest>>,
) -> Response {
    let account = match require_account(&pool, &state, &headers).await {
        Ok(account) => account,
        Err(failure) => return failure.into_response(),
    };

    let client_key = extract_client_ip(&headers).unwrap_or_else(|| "unknown".to_string());
    if state
        .rate_limiter()
        .check(&client_key, RateLimitAction::EmergencyCall)
        == RateLimitDecision::Limited
    {
        return ApiFailure::new(ErrorCode::TooManyRequests).into_response();
    }

    let request = payload.map(|Json(request)| request).unwrap_or(EmergencyCallRequest {
        location: None,
        description: None,
    });

    let mut errors = BTreeMap::new();
    let location = request
        .location
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if location.is_none() {
        errors.insert(
            "location".to_string(),
            "The location field is required.".to_string(),
        );
    }
    let description = request
        .description
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if description.is_none() {
        errors.insert(
            "description".to_string(),
            "The description field is required.".to_string(),
        );
    }
    let (Some(location), Some(description)) = (location, description) else {
        return ApiFailure::validation(errors).into_response();
    };

    match storage::insert_emergency_call(&pool, account.id, location, description).await {
        Ok(id) => ApiSuccess::new("Emergency call received")
            .with_data(json!({ "id": id }))
            .into_response(),
        Err(err) => {
            tracing::error!("emergency call insert failed: {err:#}");
            ApiFailure::new(ErrorCode::ServerError).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use uuid::Uuid;

    #[tokio::test]
    async fn success_envelope_carries_call_id() {
        let id = Uuid::nil();
        let response = ApiSuccess::new("Emergency call received")
            .with_data(json!({ "id": id }))
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let value: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(value["data"]["id"], "00000000-0000-0000-0000-000000000000");
    }
}
