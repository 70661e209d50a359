//! The HTTP front end.
//!
//! | Method | Path                              | Purpose                          |
//! |--------|-----------------------------------|----------------------------------|
//! | GET    | `/`                               | landing page with password form  |
//! | POST   | `/authenticate`, `/authenticate/` | submit `password` + `expiration` |
//! | GET    | `/health`                         | master link state                |
//!
//! # Status codes for `/authenticate`
//!
//! | Outcome                                         | Status |
//! |-------------------------------------------------|--------|
//! | granted                                         | 200    |
//! | missing field, bad expiration, IPv6 client      | 400    |
//! | wrong password                                  | 403    |
//! | locked out                                      | 429    |
//! | password right but master unreachable           | 503    |
//!
//! The client address is taken from the TCP peer (`ConnectInfo`), never from
//! a header, so the server must be run with
//! `into_make_service_with_connect_info::<SocketAddr>()` as [`serve`] does.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, info_span};
use uuid::Uuid;

use crate::application::{AuthorizationService, AuthorizeError, LinkHealth};
use crate::infrastructure::pages::{lockout_notice, PageSet};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AuthorizationService>,
    pub pages: Arc<PageSet>,
    pub health: watch::Receiver<LinkHealth>,
}

/// Body of `POST /authenticate`.
///
/// Both fields are optional at this level so that a missing field becomes a
/// descriptive 400 instead of a generic extractor rejection.  No `Debug`: the
/// password must not end up in a log line.
#[derive(Deserialize)]
pub struct AuthorizeForm {
    pub password: Option<String>,
    pub expiration: Option<String>,
}

/// Builds the router with per-request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/authenticate", post(authenticate))
        .route("/authenticate/", post(authenticate))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            info_span!(
                "http",
                request_id = %Uuid::new_v4(),
                method = %request.method(),
                path = %request.uri().path(),
            )
        }))
        .with_state(state)
}

/// Binds `bind_addr` and serves until `shutdown` completes.
///
/// # Errors
///
/// Returns an I/O error if the address cannot be bound or the server fails.
pub async fn run_server<F>(bind_addr: SocketAddr, state: AppState, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(bind_addr).await?;
    serve(listener, state, shutdown).await
}

/// Serves on an already-bound listener until `shutdown` completes.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!(addr = %listener.local_addr()?, "HTTP server listening");
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(state.pages.index.clone())
}

async fn authenticate(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Form(form): Form<AuthorizeForm>,
) -> Response {
    let result = state
        .service
        .authorize(
            peer.ip(),
            form.password.as_deref(),
            form.expiration.as_deref(),
        )
        .await;

    match result {
        Ok(_) => (StatusCode::OK, Html(state.pages.ok.clone())).into_response(),
        Err(err) => {
            debug!(%peer, kind = ?err.kind(), error = %err, "authorization refused");
            error_response(&state.pages, err)
        }
    }
}

async fn health(State(state): State<AppState>) -> (StatusCode, &'static str) {
    let health = *state.health.borrow();
    let status = match health {
        LinkHealth::Connected => StatusCode::OK,
        LinkHealth::Connecting | LinkHealth::Reconnecting => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, health.as_str())
}

fn error_response(pages: &PageSet, err: AuthorizeError) -> Response {
    match err {
        AuthorizeError::WrongPassword { remaining, total } => (
            StatusCode::FORBIDDEN,
            Html(pages.render_error(remaining, total, "")),
        )
            .into_response(),
        AuthorizeError::LockedOut {
            remaining,
            total,
            timeout_secs,
        } => (
            StatusCode::TOO_MANY_REQUESTS,
            Html(pages.render_error(remaining, total, &lockout_notice(timeout_secs))),
        )
            .into_response(),
        AuthorizeError::MissingField(_)
        | AuthorizeError::InvalidExpiration(_)
        | AuthorizeError::UnsupportedAddress(_) => {
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
        AuthorizeError::BackendUnavailable(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            "The gateway is temporarily unable to grant access. Please try again shortly.",
        )
            .into_response(),
    }
}
