//! Requests the REST backend puts on the wire, checked against a local stand-in server

use airo::config::BackendConfig;
use airo::persistence::{
    Filter, Order, PersistenceError, PersistenceGateway, PostgrestBackend, Query, TableBackend,
};
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

const API_KEY: &str = "wire-test-anon-key";

#[derive(Debug, Clone)]
struct RecordedRequest {
    method: Method,
    path: String,
    query: Option<String>,
    apikey: Option<String>,
    authorization: Option<String>,
    prefer: Option<String>,
    body: String,
}

type Recorded = Arc<Mutex<Vec<RecordedRequest>>>;

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Mimics the hosted REST layer closely enough for the client:
/// `broken` always conflicts, `legacy` deletes answer with rows instead of a count.
async fn handle(
    State(recorded): State<Recorded>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    recorded.lock().await.push(RecordedRequest {
        method: method.clone(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        apikey: header_value(&headers, "apikey"),
        authorization: header_value(&headers, "authorization"),
        prefer: header_value(&headers, "prefer"),
        body: body.clone(),
    });

    if uri.path().ends_with("/broken") {
        let error = json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint",
            "details": "Key (id)=(t-1) already exists."
        });
        return (StatusCode::CONFLICT, Json(error)).into_response();
    }

    if method == Method::GET {
        let rows = json!([
            {
                "id": "t-2", "type": "SELL", "status": "CLOSED",
                "timestamp": 20, "is_testnet": null
            },
            { "id": "t-1", "type": "BUY", "status": "OPEN", "timestamp": 10 }
        ]);
        return Json(rows).into_response();
    }

    if method == Method::DELETE {
        if uri.path().ends_with("/legacy") {
            return Json(json!([{ "id": 1 }, { "id": 2 }, { "id": 3 }])).into_response();
        }
        return Response::builder()
            .status(StatusCode::NO_CONTENT)
            .header(header::CONTENT_RANGE, "*/2")
            .body(Body::empty())
            .unwrap();
    }

    let rows = match serde_json::from_str::<Value>(&body).unwrap() {
        Value::Array(rows) => rows,
        row => vec![row],
    };
    (StatusCode::CREATED, Json(Value::Array(rows))).into_response()
}

async fn start_server() -> (SocketAddr, Recorded) {
    let recorded: Recorded = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new().fallback(handle).with_state(recorded.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, recorded)
}

fn backend_for(addr: SocketAddr) -> PostgrestBackend {
    PostgrestBackend::new(&BackendConfig::new(&format!("http://{}", addr), API_KEY)).unwrap()
}

async fn last_request(recorded: &Recorded) -> RecordedRequest {
    recorded.lock().await.last().cloned().unwrap()
}

fn assert_authenticated(request: &RecordedRequest) {
    assert_eq!(request.apikey.as_deref(), Some(API_KEY));
    assert_eq!(
        request.authorization.as_deref(),
        Some(format!("Bearer {}", API_KEY).as_str())
    );
}

#[tokio::test]
async fn test_insert_posts_rows_and_asks_for_them_back() {
    let (addr, recorded) = start_server().await;
    let backend = backend_for(addr);

    let rows = backend
        .insert("trades", vec![json!({"id": "t-1", "status": "OPEN"})])
        .await
        .unwrap();
    assert_eq!(rows, vec![json!({"id": "t-1", "status": "OPEN"})]);

    let request = last_request(&recorded).await;
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.path, "/rest/v1/trades");
    assert_eq!(request.query, None);
    assert_eq!(request.prefer.as_deref(), Some("return=representation"));
    assert_authenticated(&request);
    let body: Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(body, json!([{"id": "t-1", "status": "OPEN"}]));
}

#[tokio::test]
async fn test_upsert_merges_duplicates() {
    let (addr, recorded) = start_server().await;
    let backend = backend_for(addr);

    backend
        .upsert("current_balance", vec![json!({"id": 1, "usdt": 10000.0, "btc": 0.0})])
        .await
        .unwrap();

    let request = last_request(&recorded).await;
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.path, "/rest/v1/current_balance");
    assert_eq!(
        request.prefer.as_deref(),
        Some("resolution=merge-duplicates,return=representation")
    );
    assert_authenticated(&request);
}

#[tokio::test]
async fn test_update_patches_filtered_rows() {
    let (addr, recorded) = start_server().await;
    let backend = backend_for(addr);

    let rows = backend
        .update("trades", json!({"status": "CLOSED"}), &[Filter::eq("id", "t-1")])
        .await
        .unwrap();
    assert_eq!(rows, vec![json!({"status": "CLOSED"})]);

    let request = last_request(&recorded).await;
    assert_eq!(request.method, Method::PATCH);
    assert_eq!(request.path, "/rest/v1/trades");
    assert_eq!(request.query.as_deref(), Some("id=eq.t-1"));
    assert_eq!(request.prefer.as_deref(), Some("return=representation"));
    let body: Value = serde_json::from_str(&request.body).unwrap();
    assert_eq!(body, json!({"status": "CLOSED"}));
}

#[tokio::test]
async fn test_select_sends_query_without_prefer() {
    let (addr, recorded) = start_server().await;
    let backend = backend_for(addr);

    let query = Query::new()
        .filter(Filter::gte("timestamp", 10))
        .order(Order::desc("timestamp"))
        .limit(5);
    let rows = backend.select("trades", &query).await.unwrap();
    assert_eq!(rows.len(), 2);

    let request = last_request(&recorded).await;
    assert_eq!(request.method, Method::GET);
    assert_eq!(
        request.query.as_deref(),
        Some("select=*&timestamp=gte.10&order=timestamp.desc&limit=5")
    );
    assert_eq!(request.prefer, None);
    assert_authenticated(&request);
}

#[tokio::test]
async fn test_delete_reads_count_from_content_range() {
    let (addr, recorded) = start_server().await;
    let backend = backend_for(addr);

    let count = backend
        .delete("trades", &[Filter::neq("id", "never_match_this")])
        .await
        .unwrap();
    assert_eq!(count, 2);

    let request = last_request(&recorded).await;
    assert_eq!(request.method, Method::DELETE);
    assert_eq!(request.query.as_deref(), Some("id=neq.never_match_this"));
    assert_eq!(request.prefer.as_deref(), Some("return=minimal,count=exact"));
    assert!(request.body.is_empty());

    // no Content-Range: fall back to counting returned rows
    assert_eq!(backend.delete("legacy", &[]).await.unwrap(), 3);
}

#[tokio::test]
async fn test_error_reply_keeps_backend_code() {
    let (addr, _) = start_server().await;
    let backend = backend_for(addr);

    let err = backend
        .insert("broken", vec![json!({"id": "t-1"})])
        .await
        .unwrap_err();
    match err {
        PersistenceError::Remote {
            status,
            code,
            message,
        } => {
            assert_eq!(status, 409);
            assert_eq!(code.as_deref(), Some("23505"));
            assert!(message.contains("already exists"));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_gateway_over_http() {
    let (addr, recorded) = start_server().await;
    let gateway = PersistenceGateway::new(Some(Arc::new(backend_for(addr))));

    let trades = gateway.get_all_trades().await;
    let ids: Vec<&str> = trades.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["t-2", "t-1"]);
    assert!(!trades[0].is_testnet);

    assert_eq!(gateway.delete_all_trades().await, Some(2));
    assert_eq!(gateway.stats().remote_errors(), 0);
    assert_eq!(recorded.lock().await.len(), 2);
}
