use anyhow::{anyhow, Result};
use axum::body::{to_bytes, Body};
use axum::extract::Path;
use axum::http::{header, Method, Request, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tower::ServiceExt;

use school_cms::api::{self, AppState};
use school_cms::config::Pagination;
use school_cms::phones::{PhonesClient, PhonesUpstream, ProxyMethod, UpstreamResponse};

async fn setup_pool() -> sqlx::SqlitePool {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

#[derive(Debug, Clone)]
struct ForwardCall {
    method: ProxyMethod,
    id: Option<String>,
    body: Option<Value>,
}

#[derive(Clone, Default)]
struct RecordingPhones {
    responses: Arc<Mutex<VecDeque<Result<UpstreamResponse>>>>,
    calls: Arc<Mutex<Vec<ForwardCall>>>,
}

impl RecordingPhones {
    fn with_responses(responses: Vec<Result<UpstreamResponse>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            ..Default::default()
        }
    }

    async fn calls(&self) -> Vec<ForwardCall> {
        self.calls.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl PhonesUpstream for RecordingPhones {
    async fn forward(
        &self,
        method: ProxyMethod,
        id: Option<&str>,
        body: Option<&Value>,
    ) -> Result<UpstreamResponse> {
        self.calls.lock().await.push(ForwardCall {
            method,
            id: id.map(str::to_string),
            body: body.cloned(),
        });
        let mut guard = self.responses.lock().await;
        guard.pop_front().unwrap_or_else(|| {
            Ok(UpstreamResponse {
                status: 200,
                body: "[]".into(),
            })
        })
    }
}

fn reply(status: u16, body: &str) -> Result<UpstreamResponse> {
    Ok(UpstreamResponse {
        status,
        body: body.to_string(),
    })
}

async fn app_with(phones: Option<Arc<dyn PhonesUpstream>>) -> Router {
    let mut state = AppState::new(setup_pool().await, Pagination::default());
    if let Some(phones) = phones {
        state = state.with_phones(phones);
    }
    api::router(state)
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let res = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn forwards_verbatim_and_relays_json() {
    let fake = RecordingPhones::with_responses(vec![
        reply(200, r#"[{"id":"1","name":"Pixel"}]"#),
        reply(201, r#"{"id":"2","name":"Nokia"}"#),
        reply(200, r#"{"id":"2","name":"Nokia 3310"}"#),
    ]);
    let app = app_with(Some(Arc::new(fake.clone()))).await;

    let (status, body) = call(&app, Method::GET, "/api/phones", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{"id": "1", "name": "Pixel"}]));

    let payload = json!({"name": "Nokia", "data": {"year": 2000}});
    let (status, body) = call(&app, Method::POST, "/api/phones", Some(payload.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], json!("Nokia"));

    let (status, _) = call(
        &app,
        Method::PUT,
        "/api/phones/2",
        Some(json!({"name": "Nokia 3310"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let calls = fake.calls().await;
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].method, ProxyMethod::Get);
    assert!(calls[0].id.is_none());
    assert_eq!(calls[1].method, ProxyMethod::Post);
    assert_eq!(calls[1].body.as_ref(), Some(&payload));
    assert_eq!(calls[2].method, ProxyMethod::Put);
    assert_eq!(calls[2].id.as_deref(), Some("2"));
}

#[tokio::test]
async fn maps_upstream_failures() {
    let fake = RecordingPhones::with_responses(vec![
        reply(404, r#"{"error":"nope"}"#),
        reply(405, ""),
        reply(503, "down"),
        Err(anyhow!("connection refused")),
    ]);
    let app = app_with(Some(Arc::new(fake))).await;

    let (status, body) = call(&app, Method::GET, "/api/phones/9", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"message": "Product not found"}));

    let (status, body) = call(&app, Method::DELETE, "/api/phones/9", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body, json!({"message": "Method Not Allowed"}));

    let (status, body) = call(&app, Method::GET, "/api/phones", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"message": "Internal Server Error"}));

    let (status, _) = call(&app, Method::GET, "/api/phones", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn empty_success_is_no_content() {
    let fake = RecordingPhones::with_responses(vec![reply(200, "")]);
    let app = app_with(Some(Arc::new(fake))).await;
    let (status, body) = call(&app, Method::DELETE, "/api/phones/4", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn missing_api_url_is_server_error() {
    let app = app_with(None).await;
    let (status, body) = call(&app, Method::GET, "/api/phones", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"message": "API URL not defined"}));
}

#[tokio::test]
async fn rejects_unsafe_ids_and_bad_bodies() {
    let fake = RecordingPhones::default();
    let app = app_with(Some(Arc::new(fake.clone()))).await;

    let (status, _) = call(&app, Method::GET, "/api/phones/a%2Fb", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/phones")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{oops"))
        .unwrap();
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    assert!(fake.calls().await.is_empty());
}

async fn spawn_upstream() -> String {
    async fn item(Path(id): Path<String>) -> (StatusCode, Json<Value>) {
        if id == "missing" {
            (StatusCode::NOT_FOUND, Json(json!({"error": "not found"})))
        } else {
            (StatusCode::OK, Json(json!({"id": id})))
        }
    }

    let upstream = Router::new()
        .route(
            "/phones",
            get(|| async { Json(json!([{"id": "1"}])) }).post(|| async { StatusCode::OK }),
        )
        .route("/phones/:id", get(item));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, upstream).await.unwrap();
    });
    format!("http://{addr}/phones")
}

#[tokio::test]
async fn real_client_against_local_upstream() {
    let base = spawn_upstream().await;
    let client = PhonesClient::new(&base, Duration::from_secs(5)).unwrap();
    let app = app_with(Some(Arc::new(client))).await;

    let (status, body) = call(&app, Method::GET, "/api/phones", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{"id": "1"}]));

    let (status, body) = call(&app, Method::GET, "/api/phones/42", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"id": "42"}));

    let (status, _) = call(&app, Method::GET, "/api/phones/missing", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app, Method::POST, "/api/phones", Some(json!({"name": "x"}))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // The upstream has no PUT route for items.
    let (status, _) = call(&app, Method::PUT, "/api/phones/42", Some(json!({}))).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}
