use axum::{extract::{Path, Query, State}, http::StatusCode, routing::get, Json, Router};
use parking_lot::RwLock;
use ranker_core::tokenizer::tokenize;
use ranker_core::{CorpusSource, DocId, IdfMode, Index, ReadStats};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f64,
    pub content: Option<String>,
    pub snippet: Option<String>,
}

#[derive(Serialize)]
pub struct DocResponse {
    pub doc_id: DocId,
    pub content: String,
}

/// Queries are only answered once the index reaches `Ready`.
pub enum IndexState {
    Building,
    Ready(Arc<Index>),
    Failed(String),
}

type ApiError = (StatusCode, String);

#[derive(Clone)]
pub struct AppState {
    pub source: Arc<CorpusSource>,
    pub index: Arc<RwLock<IndexState>>,
}

impl AppState {
    pub fn building(source: CorpusSource) -> Self {
        Self { source: Arc::new(source), index: Arc::new(RwLock::new(IndexState::Building)) }
    }

    pub fn ready(source: CorpusSource, index: Index) -> Self {
        Self { source: Arc::new(source), index: Arc::new(RwLock::new(IndexState::Ready(Arc::new(index)))) }
    }

    /// Build the index on the blocking pool and publish it when done. A build
    /// that panics leaves the state `Failed`, never `Building`.
    pub fn spawn_build(&self, mode: IdfMode) -> JoinHandle<()> {
        let source = Arc::clone(&self.source);
        self.spawn_with(move || Index::from_source(&source, mode))
    }

    fn spawn_with<F>(&self, build: F) -> JoinHandle<()>
    where
        F: FnOnce() -> ranker_core::Result<(Index, ReadStats)> + Send + 'static,
    {
        let state = self.clone();
        tokio::spawn(async move {
            let start = Instant::now();
            let next = match tokio::task::spawn_blocking(build).await {
                Ok(Ok((index, stats))) => {
                    tracing::info!(
                        num_docs = index.corpus_cardinality(),
                        num_terms = index.vocabulary_len(),
                        skipped = stats.skipped,
                        took_s = start.elapsed().as_secs_f64(),
                        "index ready"
                    );
                    IndexState::Ready(Arc::new(index))
                }
                Ok(Err(err)) => {
                    tracing::error!(%err, "index build failed");
                    IndexState::Failed(err.to_string())
                }
                Err(err) => {
                    tracing::error!(%err, "index build task aborted");
                    IndexState::Failed(format!("build task aborted: {err}"))
                }
            };
            *state.index.write() = next;
        })
    }

    fn current(&self) -> Result<Arc<Index>, ApiError> {
        match &*self.index.read() {
            IndexState::Ready(index) => Ok(Arc::clone(index)),
            IndexState::Building => Err((StatusCode::SERVICE_UNAVAILABLE, "index is still building".into())),
            IndexState::Failed(reason) => Err((StatusCode::INTERNAL_SERVER_ERROR, format!("index build failed: {reason}"))),
        }
    }

    async fn fetch_documents(&self, ids: Vec<DocId>) -> Result<HashMap<DocId, String>, ApiError> {
        let source = Arc::clone(&self.source);
        tokio::task::spawn_blocking(move || source.fetch_documents(&ids))
            .await
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
            .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
    }
}

pub fn build_app(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, String) {
    match &*state.index.read() {
        IndexState::Ready(_) => (StatusCode::OK, "ok".into()),
        IndexState::Building => (StatusCode::SERVICE_UNAVAILABLE, "building".into()),
        IndexState::Failed(reason) => (StatusCode::INTERNAL_SERVER_ERROR, format!("failed: {reason}")),
    }
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<SearchResponse>, ApiError> {
    let start = Instant::now();
    let index = state.current()?;
    let terms: Vec<&str> = params.q.split_whitespace().collect();
    let ranked = index.query(&terms);
    let total_hits = ranked.len();
    let k = params.k.clamp(1, 100);

    let top: Vec<_> = ranked.into_iter().take(k).collect();
    let mut documents = state.fetch_documents(top.iter().map(|d| d.doc_id).collect()).await?;
    let results = top
        .into_iter()
        .map(|d| {
            let content = documents.remove(&d.doc_id);
            let snippet = content.as_deref().map(|c| highlight_terms(c, &terms));
            SearchHit { doc_id: d.doc_id, score: d.score, content, snippet }
        })
        .collect();

    Ok(Json(SearchResponse { query: params.q.clone(), took_s: start.elapsed().as_secs_f64(), total_hits, results }))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<DocId>) -> Result<Json<DocResponse>, ApiError> {
    let mut found = state.fetch_documents(vec![doc_id]).await?;
    match found.remove(&doc_id) {
        Some(content) => Ok(Json(DocResponse { doc_id, content })),
        None => Err((StatusCode::NOT_FOUND, format!("document {doc_id} not found"))),
    }
}

/// HTML-escape `text`, wrapping whole-word matches of the normalized query
/// tokens in `<em>`.
fn highlight_terms(text: &str, terms: &[&str]) -> String {
    let mut tokens: Vec<String> = terms.iter().flat_map(|t| tokenize(t)).collect();
    tokens.sort();
    tokens.dedup();
    if tokens.is_empty() {
        return escape_html(text);
    }
    let alternation = tokens.iter().map(|t| regex::escape(t)).collect::<Vec<_>>().join("|");
    let Ok(pat) = regex::RegexBuilder::new(&format!(r"\b(?:{alternation})\b")).case_insensitive(true).build() else {
        return escape_html(text);
    };
    let mut out = String::with_capacity(text.len() + 16);
    let mut last = 0;
    for m in pat.find_iter(text) {
        out.push_str(&escape_html(&text[last..m.start()]));
        out.push_str("<em>");
        out.push_str(&escape_html(m.as_str()));
        out.push_str("</em>");
        last = m.end();
    }
    out.push_str(&escape_html(&text[last..]));
    out
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
