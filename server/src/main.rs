use anyhow::Result;
use axum::Router;
use clap::Parser;
use ranker_core::{CorpusSource, IdfMode};
use ranker_server::{build_app, AppState};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Corpus file or directory to index at startup
    #[arg(long)]
    corpus: String,
    /// IDF variant: smooth or plain
    #[arg(long, default_value_t = IdfMode::Smooth)]
    idf: IdfMode,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let state = AppState::building(CorpusSource::new(&args.corpus));
    state.spawn_build(args.idf);
    let app: Router = build_app(state);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, corpus = %args.corpus, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
