//! Session authentication middleware

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use crate::{error::ApiError, state::AppState};

/// Resolve the bearer session and insert it into the request extensions
///
/// Handlers behind this layer extract it with `Extension<Session>`.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    let session = state.gateway.authorize(header).await?;
    req.extensions_mut().insert(session);

    Ok(next.run(req).await)
}
