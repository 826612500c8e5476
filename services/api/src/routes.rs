//! API service routes

use auth::{LoginForm, RegistrationForm, Session};
use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use axum_extra::{TypedHeader, headers::UserAgent};
use common::repositories::require_any;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    middleware::require_session,
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: String,
}

/// Body of `/subscribe` and `/unsubscribe`
#[derive(Debug, Deserialize)]
pub struct SubscriptionRequest {
    /// User whose birthday is followed
    #[serde(rename = "userID")]
    pub user_id: i64,
    /// Defaults to the session owner; any other value is rejected
    #[serde(rename = "subscriberID", default)]
    pub subscriber_id: Option<i64>,
}

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/users", get(get_users))
        .route("/subscribe", post(subscribe))
        .route("/unsubscribe", post(unsubscribe))
        .route("/logout", post(logout))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    let api = Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .merge(protected_routes);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = state.users().health_check().await.unwrap_or(false);
    let sessions = state.gateway.sessions().health_check().await.unwrap_or(false);

    let status = if database && sessions {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "ok" } else { "degraded" },
            "database": database,
            "sessions": sessions,
        })),
    )
}

fn agent(user_agent: Option<TypedHeader<UserAgent>>) -> String {
    user_agent
        .map(|TypedHeader(agent)| agent.to_string())
        .unwrap_or_default()
}

pub async fn login(
    State(state): State<AppState>,
    user_agent: Option<TypedHeader<UserAgent>>,
    Json(form): Json<LoginForm>,
) -> ApiResult<Json<SessionResponse>> {
    let session = state.gateway.login(&form, &agent(user_agent)).await?;
    Ok(Json(SessionResponse {
        session: session.token,
    }))
}

pub async fn register(
    State(state): State<AppState>,
    user_agent: Option<TypedHeader<UserAgent>>,
    Json(form): Json<RegistrationForm>,
) -> ApiResult<Json<SessionResponse>> {
    let session = state.gateway.register(&form, &agent(user_agent)).await?;
    Ok(Json(SessionResponse {
        session: session.token,
    }))
}

pub async fn get_users(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let users = require_any(state.users().list().await?)?;
    Ok(Json(users))
}

fn subscriber_of(session: &Session, request: &SubscriptionRequest) -> ApiResult<i64> {
    match request.subscriber_id {
        Some(id) if id != session.user_id => Err(ApiError::Forbidden),
        _ => Ok(session.user_id),
    }
}

pub async fn subscribe(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<SubscriptionRequest>,
) -> ApiResult<StatusCode> {
    let subscriber_id = subscriber_of(&session, &request)?;
    state.users().subscribe(request.user_id, subscriber_id).await?;
    info!("User {} subscribed to {}", subscriber_id, request.user_id);
    Ok(StatusCode::OK)
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Json(request): Json<SubscriptionRequest>,
) -> ApiResult<StatusCode> {
    let subscriber_id = subscriber_of(&session, &request)?;
    state
        .users()
        .unsubscribe(request.user_id, subscriber_id)
        .await?;
    info!("User {} unsubscribed from {}", subscriber_id, request.user_id);
    Ok(StatusCode::OK)
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<StatusCode> {
    state.gateway.logout(&session).await?;
    Ok(StatusCode::OK)
}
