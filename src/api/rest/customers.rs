use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::put;
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

/// Registration surface for the customer contact directory. The rest of the
/// customer profile lives in an external service; the dispatch engine only
/// needs a push token per customer id.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/customers/:id/push-token", put(update_push_token))
}

#[derive(Deserialize)]
pub struct UpdatePushTokenRequest {
    pub push_token: String,
}

async fn update_push_token(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(payload): Json<UpdatePushTokenRequest>,
) -> Result<StatusCode, AppError> {
    if id.trim().is_empty() {
        return Err(AppError::BadRequest("customer id cannot be empty".to_string()));
    }

    if payload.push_token.trim().is_empty() {
        return Err(AppError::BadRequest("push_token cannot be empty".to_string()));
    }

    state.customer_tokens.insert(id, payload.push_token);
    Ok(StatusCode::NO_CONTENT)
}
