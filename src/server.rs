//! HTTP trigger for schedulers.
//!
//! `GET /` or `POST /` runs schema bootstrap and one dispatcher pass, then
//! answers 200 with the run statistics or 500 with the failure. Triggers
//! are serialized: a second request waits for the running pass.

use crate::pipeline::PipelineContext;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

#[derive(Clone)]
pub struct AppState {
    ctx: Arc<PipelineContext>,
    cancel: CancellationToken,
    running: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(ctx: Arc<PipelineContext>, cancel: CancellationToken) -> Self {
        Self {
            ctx,
            cancel,
            running: Arc::new(Mutex::new(())),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(trigger).post(trigger))
        .with_state(state)
}

#[instrument(level = "info", skip_all)]
async fn trigger(State(state): State<AppState>) -> (StatusCode, String) {
    let _guard = state.running.lock().await;
    if let Err(e) = state.ctx.store.bootstrap().await {
        warn!(error = %e, "Schema bootstrap failed; running anyway");
    }
    match state.ctx.run_once(&state.cancel).await {
        Ok(stats) => (StatusCode::OK, format!("크롤링 작업 완료! ({stats})")),
        Err(e) => {
            state.ctx.alerter.alert("트리거 실패", &e.to_string()).await;
            (StatusCode::INTERNAL_SERVER_ERROR, format!("오류 발생: {e}"))
        }
    }
}

/// Serve until `cancel` fires. An in-flight pass finishes its current
/// article first.
pub async fn serve(state: AppState, port: u16) -> std::io::Result<()> {
    let cancel = state.cancel.clone();
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Trigger endpoint listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    info!("Trigger endpoint stopped");
    Ok(())
}
