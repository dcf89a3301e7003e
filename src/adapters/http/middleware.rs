use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use secrecy::ExposeSecret;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::{adapters::http::app_state::AppState, app_error::AppError};

/// Require `Authorization: Bearer <API_TOKEN>` on every API request.
pub async fn bearer_auth(
    State(app_state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let provided = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(AppError::Unauthorized)?;

    if !tokens_match(provided, app_state.config.api_token.expose_secret()) {
        tracing::warn!(uri = %request.uri(), "Rejected request with invalid API token");
        return Err(AppError::Unauthorized);
    }

    Ok(next.run(request).await)
}

/// Compare SHA-256 digests in constant time so neither the contents nor
/// the length of the configured token leak through timing.
fn tokens_match(provided: &str, expected: &str) -> bool {
    let provided = Sha256::digest(provided.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    provided.ct_eq(&expected).into()
}
