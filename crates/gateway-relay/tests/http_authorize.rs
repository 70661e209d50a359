//! End-to-end tests of the HTTP front end against an in-memory link.
//!
//! Requests are driven through the router with `tower::ServiceExt::oneshot`;
//! the peer address normally supplied by the server is inserted as a
//! `ConnectInfo` extension by hand.  Time is controlled with `ManualClock`.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tokio::sync::watch;
use tower::ServiceExt;

use gateway_core::{Expiration, ManualClock, OffensePolicy, OffenseTracker};
use gateway_relay::application::{AuthorizationService, GatewayLink, LinkError, LinkHealth};
use gateway_relay::infrastructure::{router, AppState, PageSet};

// ── Test doubles ──────────────────────────────────────────────────────────────

/// Accepts one password and remembers every grant.
struct FakeLink {
    password: &'static str,
    down: AtomicBool,
    grants: Mutex<Vec<(Ipv4Addr, Expiration)>>,
}

impl FakeLink {
    fn new(password: &'static str) -> Self {
        Self {
            password,
            down: AtomicBool::new(false),
            grants: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl GatewayLink for FakeLink {
    async fn authenticate(
        &self,
        ip: Ipv4Addr,
        password: &str,
        expiration: Expiration,
    ) -> Result<bool, LinkError> {
        if password != self.password {
            return Ok(false);
        }
        if self.down.load(Ordering::SeqCst) {
            return Err(LinkError::NotConnected);
        }
        self.grants.lock().unwrap().push((ip, expiration));
        Ok(true)
    }
}

struct Harness {
    app: Router,
    link: Arc<FakeLink>,
    clock: Arc<ManualClock>,
    health: watch::Sender<LinkHealth>,
}

fn harness() -> Harness {
    let link = Arc::new(FakeLink::new("open sesame"));
    let clock = Arc::new(ManualClock::new(50_000));
    let policy = OffensePolicy::new(3, Duration::from_secs(60)).unwrap();
    let tracker = Arc::new(OffenseTracker::with_clock(policy, clock.clone()));
    let (health, health_rx) = watch::channel(LinkHealth::Connected);

    let state = AppState {
        service: Arc::new(AuthorizationService::new(link.clone(), tracker)),
        pages: Arc::new(PageSet::default()),
        health: health_rx,
    };

    Harness {
        app: router(state),
        link,
        clock,
        health,
    }
}

fn peer() -> SocketAddr {
    "198.51.100.7:51234".parse().unwrap()
}

async fn post_form(app: &Router, from: SocketAddr, body: &str) -> (StatusCode, String) {
    let mut request = Request::builder()
        .method("POST")
        .uri("/authenticate/")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap();
    request.extensions_mut().insert(ConnectInfo(from));
    send(app, request).await
}

async fn get(app: &Router, path: &str) -> (StatusCode, String) {
    let request = Request::builder().uri(path).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

// ── Pages ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_index_serves_landing_page() {
    let h = harness();

    let (status, body) = get(&h.app, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("<form"));
}

// ── Grants ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_correct_password_grants_peer_address() {
    // Arrange
    let h = harness();

    // Act
    let (status, body) = post_form(&h.app, peer(), "password=open+sesame&expiration=3600").await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Access granted"));
    let grants = h.link.grants.lock().unwrap().clone();
    assert_eq!(
        grants,
        vec![(Ipv4Addr::new(198, 51, 100, 7), Expiration::After(3600))]
    );
}

#[tokio::test]
async fn test_route_without_trailing_slash_is_accepted() {
    let h = harness();
    let mut request = Request::builder()
        .method("POST")
        .uri("/authenticate")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("password=open+sesame&expiration="))
        .unwrap();
    request.extensions_mut().insert(ConnectInfo(peer()));

    let (status, _) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        h.link.grants.lock().unwrap()[0].1,
        Expiration::Never
    );
}

// ── Lockout scenario ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_three_failures_lock_out_until_window_passes() {
    let h = harness();

    // Three wrong passwords, one second apart: 403 with 2, 1, 0 remaining.
    for remaining in [2, 1, 0] {
        let (status, body) = post_form(&h.app, peer(), "password=guess&expiration=0").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(
            body.contains(&format!("{remaining} of 3 attempt(s) remaining")),
            "unexpected body: {body}"
        );
        h.clock.advance(1);
    }

    // Fourth attempt, even with the right password: locked out.
    let (status, body) = post_form(&h.app, peer(), "password=open+sesame&expiration=0").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(body.contains("You are timed out, your time out is: 60 seconds from the last attempt."));
    assert!(h.link.grants.lock().unwrap().is_empty());

    // After the window the address starts over.
    h.clock.advance(61);
    let (status, body) = post_form(&h.app, peer(), "password=guess&expiration=0").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("2 of 3 attempt(s) remaining"));
}

#[tokio::test]
async fn test_lockout_is_per_address() {
    let h = harness();
    for _ in 0..3 {
        post_form(&h.app, peer(), "password=guess&expiration=0").await;
    }

    let other: SocketAddr = "198.51.100.8:40000".parse().unwrap();
    let (status, _) = post_form(&h.app, other, "password=open+sesame&expiration=0").await;

    assert_eq!(status, StatusCode::OK);
}

// ── Client errors ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_expiration_is_bad_request() {
    let h = harness();

    let (status, body) = post_form(&h.app, peer(), "password=open+sesame").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("expiration"));
}

#[tokio::test]
async fn test_malformed_expiration_is_bad_request_and_not_counted() {
    let h = harness();

    for _ in 0..5 {
        let (status, _) = post_form(&h.app, peer(), "password=guess&expiration=soon").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // None of the malformed requests counted as a failure.
    let (status, _) = post_form(&h.app, peer(), "password=open+sesame&expiration=0").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_ipv6_peer_is_bad_request() {
    let h = harness();
    let v6: SocketAddr = "[2001:db8::1]:443".parse().unwrap();

    let (status, _) = post_form(&h.app, v6, "password=open+sesame&expiration=0").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Backend availability ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_backend_down_is_service_unavailable_and_not_counted() {
    // Arrange
    let h = harness();
    h.link.down.store(true, Ordering::SeqCst);

    // Act
    for _ in 0..4 {
        let (status, _) = post_form(&h.app, peer(), "password=open+sesame&expiration=0").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
    h.link.down.store(false, Ordering::SeqCst);
    let (status, _) = post_form(&h.app, peer(), "password=open+sesame&expiration=0").await;

    // Assert
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health_follows_link_state() {
    let h = harness();

    let (status, body) = get(&h.app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "connected");

    h.health.send_replace(LinkHealth::Reconnecting);
    let (status, body) = get(&h.app, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, "reconnecting");
}
