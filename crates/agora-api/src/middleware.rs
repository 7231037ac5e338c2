use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};

use agora_chat::ChatError;

use crate::{AppState, error::ApiError};

/// Extract and validate the bearer token, then thread the resulting
/// `Identity` into the handler as a request extension. Handlers never
/// consult ambient state for "the current user".
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ApiError(ChatError::Unauthenticated))?;

    let identity = state.auth.verify(token)?;

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}
