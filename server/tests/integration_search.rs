use axum::body::{Body, Bytes};
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use ranker_core::{CorpusSource, IdfMode, Index};
use ranker_server::{build_app, AppState};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;
use tower::ServiceExt;

fn write_corpus(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("tweets.txt");
    fs::write(
        &path,
        "a\t1\tt\tde\tRust is great. rust systems programming.\n\
         b\t2\tt\tde\tLearning rust.\n\
         c\t3\tt\tde\tGardening tips\n",
    )
    .unwrap();
    path
}

async fn call(app: Router, uri: &str) -> (StatusCode, Bytes) {
    let req = Request::get(uri).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let dir = tempdir().unwrap();
    let source = CorpusSource::new(write_corpus(dir.path()));
    let (index, _) = Index::from_source(&source, IdfMode::Smooth).unwrap();
    let app = build_app(AppState::ready(source, index));

    let (status, body) = call(app, "/search?q=rust&k=5").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"].as_u64(), Some(2));
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr.len(), 2);
    // the short document's vector is dominated by "rust"
    assert_eq!(arr[0]["doc_id"].as_u64(), Some(2));
    assert_eq!(arr[1]["doc_id"].as_u64(), Some(1));
    assert_eq!(arr[0]["content"].as_str(), Some("Learning rust."));
    assert_eq!(arr[0]["snippet"].as_str(), Some("Learning <em>rust</em>."));
    assert!(arr[0]["score"].as_f64().unwrap() > arr[1]["score"].as_f64().unwrap());
}

#[tokio::test]
async fn unknown_terms_give_empty_results() {
    let dir = tempdir().unwrap();
    let source = CorpusSource::new(write_corpus(dir.path()));
    let (index, _) = Index::from_source(&source, IdfMode::Plain).unwrap();
    let app = build_app(AppState::ready(source, index));

    let (status, body) = call(app, "/search?q=kubernetes").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_hits"].as_u64(), Some(0));
    assert!(json["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn queries_wait_for_build() {
    let dir = tempdir().unwrap();
    let state = AppState::building(CorpusSource::new(write_corpus(dir.path())));
    let app = build_app(state.clone());

    let (status, _) = call(app.clone(), "/search?q=rust").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let (status, body) = call(app.clone(), "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(&body[..], b"building");

    state.spawn_build(IdfMode::Smooth).await.unwrap();

    let (status, body) = call(app.clone(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"ok");
    let (status, _) = call(app, "/search?q=gardening").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unreadable_corpus_fails_build() {
    let dir = tempdir().unwrap();
    let state = AppState::building(CorpusSource::new(dir.path().join("missing.txt")));
    let app = build_app(state.clone());
    state.spawn_build(IdfMode::Smooth).await.unwrap();

    let (status, _) = call(app.clone(), "/health").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let (status, _) = call(app, "/search?q=rust").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn doc_lookup() {
    let dir = tempdir().unwrap();
    let source = CorpusSource::new(write_corpus(dir.path()));
    let (index, _) = Index::from_source(&source, IdfMode::Smooth).unwrap();
    let app = build_app(AppState::ready(source, index));

    let (status, body) = call(app.clone(), "/doc/3").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["content"].as_str(), Some("Gardening tips"));

    let (status, _) = call(app, "/doc/99").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
