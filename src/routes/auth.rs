use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::models::dataset_model::ApiError;
use crate::state::app_state::AppState;

/// Token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    if scheme.eq_ignore_ascii_case("bearer") {
        Some(token.trim()).filter(|t| !t.is_empty())
    } else {
        None
    }
}

pub async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.config.auth.token.as_deref() else {
        return next.run(request).await;
    };

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .map(|token| token == expected);

    match presented {
        Some(true) => next.run(request).await,
        Some(false) => {
            warn!("rejected request to {} with invalid token", request.uri().path());
            ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "invalid or expired token")
                .into_response()
        }
        None => ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "authentication required")
            .into_response(),
    }
}
