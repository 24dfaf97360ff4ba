//!
//! keygate HTTP server
//! -------------------
//! This module defines the Axum-based HTTP API for the token lifecycle:
//! register/login issue a signed access + refresh token pair, refresh
//! exchanges a stored refresh token for a new access token, logout revokes.
//!
//! Responsibilities:
//! - Request-scoped identity propagation from `Authorization: Bearer` headers.
//! - Input-shape validation of register/login payloads.
//! - Admin-gated role assignment endpoints.
//! - Mapping of the auth error taxonomy to 401/403/4xx responses; nothing
//!   internal crosses the boundary.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::auth::AuthService;
use crate::config::Config;
use crate::error::{AuthError, AuthResult};
use crate::identity::{CurrentUser, Role};
use crate::store::MemoryStore;
use crate::token::TokenCodec;

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
}

/// Wire up the store, codec and workflows from configuration. Provisions the
/// default admin unless disabled.
pub fn build_state(config: &Config) -> AuthResult<AppState> {
    let codec = Arc::new(TokenCodec::new(&config.secret_b64, config.access_ttl, config.refresh_ttl)?);
    let store = Arc::new(MemoryStore::new());
    let auth = AuthService::new(store.clone(), store, codec);
    if config.bootstrap_admin {
        auth.ensure_default_admin()?;
    }
    Ok(AppState { auth: Arc::new(auth) })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "keygate ok" }))
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/refresh", post(refresh))
        .route("/api/v1/auth/logout", post(logout))
        .route("/api/v1/auth/add/admin/{login}", post(assign_admin))
        .route("/api/v1/auth/add/premium/{login}", post(assign_premium))
        .layer(middleware::from_fn_with_state(state.clone(), propagate_identity))
        .with_state(state)
}

/// Start the keygate HTTP server with settings from the environment.
pub async fn run() -> anyhow::Result<()> {
    run_with_config(Config::from_env()).await
}

pub async fn run_with_config(config: Config) -> anyhow::Result<()> {
    let state = build_state(&config)?;
    let app = router(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ")
}

/// Translate an auth error into its boundary response. Internal detail is
/// logged here and never serialized.
fn auth_error(err: &AuthError) -> Response {
    if let AuthError::Internal { message } = err {
        error!("internal auth failure: {message}");
    }
    let sanitized = err.sanitized();
    let status = StatusCode::from_u16(sanitized.http_status()).unwrap_or(StatusCode::FORBIDDEN);
    (
        status,
        Json(json!({
            "status": "error",
            "code": sanitized.code_str(),
            "message": sanitized.to_string(),
        })),
    )
        .into_response()
}

/// Per-request identity propagation.
///
/// No bearer header: the request proceeds unauthenticated. A header that
/// fails to decode aborts the request; no request continues identity-less
/// past a failed decode. A token that decodes but is expired is treated as
/// "not logged in", which forces the caller through the refresh flow.
async fn propagate_identity(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let token = match bearer_token(req.headers()) {
        Some(t) => t.to_string(),
        None => return next.run(req).await,
    };
    if req.extensions().get::<CurrentUser>().is_some() {
        return next.run(req).await;
    }

    let claims = match state.auth.decode_token(&token) {
        Ok(claims) => claims,
        Err(e) => return auth_error(&e),
    };

    if !state.auth.token_expired(&claims) {
        let Some(identity) = state.auth.resolve(&claims.sub) else {
            // Token verified but its subject is gone; conservative reject.
            return auth_error(&AuthError::internal(format!("token subject {} unresolvable", claims.sub)));
        };
        let principal = identity.principal();
        req.extensions_mut().insert(CurrentUser {
            id: identity.id,
            login: principal.username,
            roles: principal.authorities,
        });
    }

    next.run(req).await
}

fn require_admin(user: Option<&Extension<CurrentUser>>) -> Result<(), Response> {
    let Some(Extension(user)) = user else {
        return Err(auth_error(&AuthError::AuthenticationFailed));
    };
    if !user.has_role(Role::Admin) {
        return Err((StatusCode::FORBIDDEN, Json(json!({"status": "forbidden"}))).into_response());
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    email: String,
    login: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    login: String,
    password: String,
}

fn validate_credentials(login: &str, password: &str) -> AuthResult<()> {
    if login.trim().is_empty() {
        return Err(AuthError::user_input("login must not be blank"));
    }
    if password.trim().is_empty() {
        return Err(AuthError::user_input("password must not be blank"));
    }
    if password.len() < 6 {
        return Err(AuthError::user_input("password must be at least 6 characters"));
    }
    Ok(())
}

fn validate_email(email: &str) -> AuthResult<()> {
    if email.trim().is_empty() {
        return Err(AuthError::user_input("email must not be blank"));
    }
    let plausible = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !plausible {
        return Err(AuthError::user_input("email must be a valid address"));
    }
    Ok(())
}

async fn register(State(state): State<AppState>, Json(payload): Json<RegisterPayload>) -> Response {
    info!(login = %payload.login, "received registration request");
    if let Err(e) = validate_email(&payload.email)
        .and_then(|_| validate_credentials(&payload.login, &payload.password))
    {
        return auth_error(&e);
    }
    match state.auth.register(&payload.email, &payload.login, &payload.password) {
        Ok(pair) => (StatusCode::OK, Json(pair)).into_response(),
        Err(e) => auth_error(&e),
    }
}

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> Response {
    info!(login = %payload.login, "received login request");
    if let Err(e) = validate_credentials(&payload.login, &payload.password) {
        return auth_error(&e);
    }
    match state.auth.login(&payload.login, &payload.password) {
        Ok(pair) => (StatusCode::OK, Json(pair)).into_response(),
        Err(e) => auth_error(&e),
    }
}

async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> Response {
    info!("received token refresh request");
    let Some(token) = bearer_token(&headers) else {
        return auth_error(&AuthError::AuthenticationFailed);
    };
    match state.auth.refresh(token) {
        Ok(pair) => (StatusCode::OK, Json(pair)).into_response(),
        Err(e) => auth_error(&e),
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    info!("received logout request");
    let Some(token) = bearer_token(&headers) else {
        return auth_error(&AuthError::AuthenticationFailed);
    };
    match state.auth.logout(token) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => auth_error(&e),
    }
}

async fn assign_admin(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    Path(login): Path<String>,
) -> Response {
    if let Err(resp) = require_admin(user.as_ref()) {
        return resp;
    }
    match state.auth.assign_role(&login, Role::Admin) {
        Ok(()) => (StatusCode::OK, format!("Admin role assigned to user {login}")).into_response(),
        Err(e) => auth_error(&e),
    }
}

async fn assign_premium(
    State(state): State<AppState>,
    user: Option<Extension<CurrentUser>>,
    Path(login): Path<String>,
) -> Response {
    if let Err(resp) = require_admin(user.as_ref()) {
        return resp;
    }
    match state.auth.assign_role(&login, Role::PremiumUser) {
        Ok(()) => (StatusCode::OK, format!("Premium role assigned to {login}")).into_response(),
        Err(e) => auth_error(&e),
    }
}
