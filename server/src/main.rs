use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use ta_core::SnapshotHandle;
use ta_server::compose::AnswerComposer;
use ta_server::config::{Args, CorpusSource, ServerConfig};
use ta_server::policy::PromptPolicy;
use ta_server::provider::OpenAiCompatProvider;
use ta_server::{build_app, AppState};
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let config = ServerConfig::from_args(Args::parse())?;

    // a malformed source is fatal: never serve from a partial store
    let snapshot = config.corpus.load()?;
    tracing::info!(num_docs = snapshot.store.len(), indexed = snapshot.index.is_some(), "corpus loaded");
    let handle = SnapshotHandle::new(snapshot);

    let policy = match &config.policy_path {
        Some(path) => PromptPolicy::load(path)?,
        None => PromptPolicy::default(),
    };
    let provider = OpenAiCompatProvider::new(config.provider.clone())?;
    let composer = AnswerComposer::new(Arc::new(provider))
        .with_policy(policy)
        .with_options(config.options)
        .with_timeout(config.provider.timeout);
    let app = build_app(AppState::new(handle.clone(), composer, config.top_n));

    #[cfg(unix)]
    tokio::spawn(reload_on_sighup(handle, config.corpus.clone()));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

#[cfg(unix)]
async fn reload_on_sighup(handle: SnapshotHandle, source: CorpusSource) {
    use tokio::signal::unix::{signal, SignalKind};
    let mut hup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "cannot listen for SIGHUP; reload disabled");
            return;
        }
    };
    while hup.recv().await.is_some() {
        tracing::info!("SIGHUP received, reloading corpus");
        if let Err(e) = ta_server::reload(&handle, source.clone()).await {
            tracing::error!(error = %e, "reload failed; keeping current snapshot");
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
