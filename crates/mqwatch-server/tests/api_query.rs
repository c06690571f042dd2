//! Integration tests for the query endpoints, driven through the router.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use mqwatch_server::{api_query::QueryResponse, app, config::Config, AppState};
use mqwatch_store::{EventStore, IngestRecord, StoreHandle};
use serde_json::Value;
use tower::ServiceExt; // for oneshot

fn setup(config: Config) -> (Router, StoreHandle) {
    let store = EventStore::spawn(config.store.to_store_config());
    let application = app(AppState::new(store.clone(), config));
    (application, store)
}

/// Ingests the five-message fixture: keys `a,b,a,c,a`, "foo" at seq 1 and 3.
async fn ingest_fixture(store: &StoreHandle) {
    let records = [
        ("a", r#"{"v":"zero"}"#),
        ("b", r#"{"v":"foo one"}"#),
        ("a", r#"{"v":"two"}"#),
        ("c", r#"{"v":"three foo"}"#),
        ("a", r#"{"v":"four"}"#),
    ];
    for (key, body) in records {
        store.ingest(IngestRecord::new(key, body)).await;
    }
}

async fn get(application: &Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = application
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn query_json(application: &Router, q: &str) -> QueryResponse {
    let uri = format!("/api/query?q={}", encode(q));
    let (status, body) = get(application, &uri).await;
    assert_eq!(status, StatusCode::OK, "query {q:?}");
    serde_json::from_slice(&body).unwrap()
}

/// Minimal percent-encoding for the characters used in these tests.
fn encode(q: &str) -> String {
    q.replace('%', "%25")
        .replace('#', "%23")
        .replace(' ', "%20")
        .replace(',', "%2C")
        .replace('\n', "%0A")
        .replace(':', "%3A")
        .replace('*', "%2A")
}

fn seqs(response: &QueryResponse) -> Vec<i64> {
    response.messages.iter().map(|m| m.seq).collect()
}

#[tokio::test]
async fn word_key_and_range_queries_return_newest_first() {
    let (application, store) = setup(Config::default());
    ingest_fixture(&store).await;

    assert_eq!(seqs(&query_json(&application, "foo").await), vec![3, 1]);
    assert_eq!(seqs(&query_json(&application, "key:a").await), vec![4, 2, 0]);
    assert_eq!(seqs(&query_json(&application, "#2-3").await), vec![3, 2]);
}

#[tokio::test]
async fn match_all_returns_oldest_first_with_counters() {
    let (application, store) = setup(Config::default());
    ingest_fixture(&store).await;

    for q in ["", "*"] {
        let response = query_json(&application, q).await;
        assert_eq!(seqs(&response), vec![0, 1, 2, 3, 4]);
        assert_eq!(response.total_received, 5);
        assert_eq!(response.buffered, 5);
    }
}

#[tokio::test]
async fn response_includes_frequencies_and_json_bodies() {
    let (application, store) = setup(Config::default());
    ingest_fixture(&store).await;

    let response = query_json(&application, "*").await;
    assert_eq!(response.frequencies["a"], 3);
    assert_eq!(response.frequencies["b"], 1);
    assert_eq!(response.frequencies["c"], 1);
    assert_eq!(response.messages[1].body["v"], Value::from("foo one"));
}

#[tokio::test]
async fn short_query_is_rejected() {
    let (application, _store) = setup(Config::default());

    let (status, body) = get(&application, "/api/query?q=ab").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("at least 3"));
}

#[tokio::test]
async fn malformed_range_is_a_bad_request() {
    let (application, _store) = setup(Config::default());

    let (status, body) = get(&application, "/api/query?q=%23x-5").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("#x-5"));
}

#[tokio::test]
async fn index_page_lists_messages_and_frequencies() {
    let (application, store) = setup(Config::default());
    store
        .ingest(
            IngestRecord::new("orders.created", r#"{"id":"<b>"}"#)
                .with_header("__ClassName__", "OrderCreated"),
        )
        .await;

    let (status, body) = get(&application, "/?q=key:orders.created").await;
    assert_eq!(status, StatusCode::OK);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("Total messages received: 1"));
    assert!(html.contains("<h1>Frequencies</h1>"));
    assert!(html.contains("(#0)"));
    assert!(html.contains("OrderCreated"));
    assert!(html.contains("&lt;b&gt;"));
    assert!(!html.contains("No messages."));
}

#[tokio::test]
async fn index_page_with_short_query_shows_notice() {
    let (application, store) = setup(Config::default());
    ingest_fixture(&store).await;

    let (status, body) = get(&application, "/?q=ab").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("class=\"notice\""));
    assert!(html.contains("No messages."));
}

#[tokio::test]
async fn max_results_caps_the_response() {
    let mut config = Config::default();
    config.store.max_results = 2;
    let (application, store) = setup(config);
    ingest_fixture(&store).await;

    assert_eq!(seqs(&query_json(&application, "*").await), vec![3, 4]);
    assert_eq!(seqs(&query_json(&application, "key:a").await), vec![4, 2]);
}

#[tokio::test]
async fn health_reports_buffer_counters() {
    let mut config = Config::default();
    config.store.capacity = 3;
    let (application, store) = setup(config);
    ingest_fixture(&store).await;

    let (status, body) = get(&application, "/health").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["total_received"], 5);
    assert_eq!(json["buffered"], 3);
    assert_eq!(json["capacity"], 3);
}

#[tokio::test]
async fn stopped_store_is_service_unavailable() {
    let (application, store) = setup(Config::default());
    store.shutdown().await;

    // Requests queued behind the shutdown are dropped with the owner.
    let (status, _) = get(&application, "/api/query?q=*").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
