//! Housing value prediction server.
//!
//! Loads one model artifact at startup and serves a slider form plus a JSON
//! endpoint. The artifact is read-only for the process lifetime; retraining
//! takes effect on restart.

mod handlers;
mod page;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use housing_learning::Predictor;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::handlers::{
    api_predict_handler, form_predict_handler, health_handler, index_handler, AppState,
};

#[derive(Parser, Debug)]
#[command(name = "housing-server", version, about = "Housing value prediction server")]
struct ServerArgs {
    /// Model artifact written by `trn train`.
    #[arg(long, env = "HOUSING_ARTIFACT", default_value = "artifacts/best_model.json")]
    artifact: PathBuf,
    /// Address to listen on.
    #[arg(long, env = "HOUSING_LISTEN", default_value = "127.0.0.1:8080")]
    listen: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = ServerArgs::parse();

    // A missing or invalid artifact stops the process before it binds.
    let state = build_app_state(&args.artifact)?;
    let artifact = state.predictor.artifact();
    info!(
        artifact = %args.artifact.display(),
        run_id = %artifact.run_id(),
        model = %artifact.model().kind(),
        "Loaded model artifact"
    );

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;
    info!(listen_addr = %args.listen, "Prediction server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Loads the artifact into the shared [`AppState`].
fn build_app_state(artifact: &std::path::Path) -> anyhow::Result<Arc<AppState>> {
    let predictor = Predictor::load(artifact)
        .with_context(|| format!("loading model artifact {}", artifact.display()))?;
    Ok(Arc::new(AppState { predictor }))
}

/// Build the axum [`Router`] with all routes.
fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/predict", post(form_predict_handler))
        .route("/api/predict", post(api_predict_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}
