//! Integration tests for the HTTP playbook repository against a stub store.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use tokio::sync::Mutex;

use brainmap_core::{
    BrainmapError, HttpRepository, PersistenceError, PlaybookRepository, PlaybookStore,
};

type Document = Arc<Mutex<Option<String>>>;

async fn read_doc(State(doc): State<Document>) -> (StatusCode, String) {
    match doc.lock().await.clone() {
        Some(body) => (StatusCode::OK, body),
        None => (StatusCode::NOT_FOUND, String::new()),
    }
}

async fn write_doc(State(doc): State<Document>, body: String) -> StatusCode {
    *doc.lock().await = Some(body);
    StatusCode::NO_CONTENT
}

async fn refuse() -> StatusCode {
    StatusCode::FORBIDDEN
}

/// Serve `router` on an ephemeral port and return its base URL.
async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn stub_store(initial: Option<String>) -> (String, Document) {
    let doc: Document = Arc::new(Mutex::new(initial));
    let router = Router::new()
        .route("/api/playbooks", get(read_doc).post(write_doc))
        .with_state(doc.clone());
    (spawn(router).await, doc)
}

fn repo(base: &str) -> HttpRepository {
    HttpRepository::new(base, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_empty_remote_loads_nothing() {
    let (base, _) = stub_store(None).await;
    let mut store = PlaybookStore::new(200);
    assert!(!store.load(&repo(&base)).await.unwrap());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_save_then_load_through_remote() {
    let (base, doc) = stub_store(None).await;
    let remote = repo(&format!("{base}/"));

    let mut store = PlaybookStore::with_defaults(200).unwrap();
    store.save(&remote).await.unwrap();
    assert!(!store.is_dirty());
    assert!(doc.lock().await.as_deref().unwrap().contains("\"Phishing\""));

    let mut reloaded = PlaybookStore::new(200);
    assert!(reloaded.load(&remote).await.unwrap());
    assert_eq!(reloaded.all(), store.all());
}

#[tokio::test]
async fn test_invalid_remote_document_is_rejected() {
    let (base, _) = stub_store(Some(r#"{"not": "an array"}"#.into())).await;
    let mut store = PlaybookStore::with_defaults(200).unwrap();

    let err = store.load(&repo(&base)).await.unwrap_err();
    assert!(matches!(err, BrainmapError::Validation(_)));
    assert_eq!(store.len(), 4);
}

#[tokio::test]
async fn test_refused_write_keeps_store_dirty() {
    let router = Router::new().route("/api/playbooks", get(|| async { "[]" }).post(refuse));
    let base = spawn(router).await;

    let mut store = PlaybookStore::with_defaults(200).unwrap();
    store.remove(45).unwrap();
    let err = store.save(&repo(&base)).await.unwrap_err();
    assert!(matches!(
        err,
        BrainmapError::Persistence(PersistenceError::Rejected { status: 403 })
    ));
    assert!(store.is_dirty());
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn test_unreachable_remote_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = repo(&format!("http://{addr}")).fetch().await.unwrap_err();
    assert!(matches!(err, PersistenceError::Transport(_)));
}
