//! Integration tests for the HTTP authority client
//!
//! Each test runs a throwaway axum server on a loopback port that records
//! request bodies and answers with a configured status.
//!
//! Run with: cargo test --package bikedock-network --test http_authority

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use bikedock_core::{BikeId, CardCode, DockId};
use bikedock_network::{Authority, AuthorityConfig, HttpAuthority};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

#[derive(Clone)]
struct FakeAuthority {
    status: StatusCode,
    delay: Duration,
    received: Arc<Mutex<Vec<(String, Value)>>>,
}

async fn handle(
    State(fake): State<FakeAuthority>,
    Path(endpoint): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    fake.received.lock().unwrap().push((endpoint, body));
    tokio::time::sleep(fake.delay).await;
    fake.status
}

struct TestServer {
    base_url: String,
    received: Arc<Mutex<Vec<(String, Value)>>>,
}

impl TestServer {
    fn received(&self) -> Vec<(String, Value)> {
        self.received.lock().unwrap().clone()
    }
}

async fn spawn_server(status: StatusCode, delay: Duration) -> TestServer {
    let received = Arc::new(Mutex::new(Vec::new()));
    let state = FakeAuthority {
        status,
        delay,
        received: Arc::clone(&received),
    };

    let app = Router::new()
        .route("/api/{endpoint}", post(handle))
        .with_state(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{addr}/api"),
        received,
    }
}

fn dock() -> DockId {
    DockId::new("181149779735094").unwrap()
}

fn authority_for(server: &TestServer) -> HttpAuthority {
    HttpAuthority::new(AuthorityConfig::new(&server.base_url), dock()).unwrap()
}

#[tokio::test]
async fn test_check_in_authorized() {
    let server = spawn_server(StatusCode::OK, Duration::ZERO).await;
    let authority = authority_for(&server);

    assert!(authority.check_in(&BikeId::new("BIKE123").unwrap()).await);
    assert_eq!(
        server.received(),
        vec![(
            "checkin".to_string(),
            json!({"dockID": "181149779735094", "bikeID": "BIKE123"})
        )]
    );
}

#[tokio::test]
async fn test_check_out_sends_card() {
    let server = spawn_server(StatusCode::OK, Duration::ZERO).await;
    let authority = authority_for(&server);

    let bike = BikeId::new("BIKE123").unwrap();
    let card = CardCode::new("42").unwrap();
    assert!(authority.check_out(&bike, &card).await);
    assert_eq!(
        server.received(),
        vec![(
            "checkout".to_string(),
            json!({"dockID": "181149779735094", "bikeID": "BIKE123", "cardString": "42"})
        )]
    );
}

#[tokio::test]
async fn test_register_accepts_no_content() {
    let server = spawn_server(StatusCode::NO_CONTENT, Duration::ZERO).await;
    let authority = authority_for(&server);

    assert!(authority.register(&dock()).await);
    assert_eq!(
        server.received(),
        vec![("dock".to_string(), json!({"dockID": "181149779735094"}))]
    );
}

#[tokio::test]
async fn test_non_success_status_denies() {
    for status in [
        StatusCode::FORBIDDEN,
        StatusCode::NOT_FOUND,
        StatusCode::INTERNAL_SERVER_ERROR,
    ] {
        let server = spawn_server(status, Duration::ZERO).await;
        let authority = authority_for(&server);

        assert!(!authority.check_in(&BikeId::new("BIKE123").unwrap()).await);
        assert!(
            !authority
                .check_out(
                    &BikeId::new("BIKE123").unwrap(),
                    &CardCode::new("42").unwrap()
                )
                .await
        );
    }
}

#[tokio::test]
async fn test_timeout_denies() {
    let server = spawn_server(StatusCode::OK, Duration::from_secs(5)).await;
    let config = AuthorityConfig::new(&server.base_url).with_timeout(Duration::from_millis(100));
    let authority = HttpAuthority::new(config, dock()).unwrap();

    let started = std::time::Instant::now();
    assert!(!authority.check_in(&BikeId::new("BIKE123").unwrap()).await);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_unreachable_authority_denies() {
    // bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = AuthorityConfig::new(format!("http://{addr}/api"));
    let authority = HttpAuthority::new(config, dock()).unwrap();

    assert!(!authority.register(&dock()).await);
    assert!(!authority.check_in(&BikeId::new("BIKE123").unwrap()).await);
}
