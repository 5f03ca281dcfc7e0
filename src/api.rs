//! REST API for managing verifications.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
};
use serde::{Deserialize, Serialize};

use crate::address::JoinAddress;
use crate::store::{PendingVerification, VerificationStore, VerifiedAccount};

/// Shared state of the API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<VerificationStore>,
    pub address: Arc<JoinAddress>,
}

/// Pending verification representation in the REST API.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerificationDto {
    pub token: String,
    pub guild: u64,
    pub user: u64,
    pub user_name: String,
    pub expires_at: u64,
    /// The address the member joins to verify.
    pub join_address: String,
}

impl VerificationDto {
    fn new(pending: PendingVerification, address: &JoinAddress) -> Self {
        Self {
            join_address: address.for_token(&pending.token),
            token: pending.token,
            guild: pending.guild,
            user: pending.user,
            user_name: pending.user_name,
            expires_at: pending.expires_at,
        }
    }
}

/// Request to start a verification.
#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub guild: u64,
    pub user: u64,
    pub user_name: String,
}

/// Generic API response.
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ApiResponse {
    const fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

/// Create the REST API router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route(
            "/verifications",
            get(list_verifications).post(create_verification),
        )
        .route("/verifications/{token}", delete(cancel_verification))
        .route("/verified", get(list_verified))
        .with_state(state)
}

/// GET /verifications - List pending verifications.
async fn list_verifications(State(state): State<ApiState>) -> Json<Vec<VerificationDto>> {
    let list = state
        .store
        .list()
        .into_iter()
        .map(|p| VerificationDto::new(p, &state.address))
        .collect();

    Json(list)
}

/// POST /verifications - Start a verification.
async fn create_verification(
    State(state): State<ApiState>,
    Json(req): Json<CreateRequest>,
) -> (StatusCode, Json<VerificationDto>) {
    let pending = state.store.create(req.guild, req.user, req.user_name);
    (
        StatusCode::CREATED,
        Json(VerificationDto::new(pending, &state.address)),
    )
}

/// DELETE /verifications/:token - Cancel a pending verification.
async fn cancel_verification(
    State(state): State<ApiState>,
    Path(token): Path<String>,
) -> (StatusCode, Json<ApiResponse>) {
    if state.store.cancel(&token).is_some() {
        tracing::info!(token = %token, "Verification cancelled");
        (StatusCode::OK, Json(ApiResponse::success()))
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!(
                "Verification with token '{token}' not found"
            ))),
        )
    }
}

/// GET /verified - List completed verifications.
async fn list_verified(State(state): State<ApiState>) -> Json<Vec<VerifiedAccount>> {
    Json(state.store.verified())
}
