//! HTTP server for the multi-target metrics endpoint.
//!
//! Every request to the metrics path names its own `target`. The handler builds
//! a scraper for that host, renders it through a registry created for the
//! request and drops both when the response is sent.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::collector::{ClustsafeScraper, render_provider};
use crate::error::ValidationError;
use crate::fetch::Fetcher;

const OPENMETRICS_CONTENT_TYPE: &str = "application/openmetrics-text; version=1.0.0; charset=utf-8";

/// Application state shared across handlers.
struct AppState<F> {
    fetcher: Arc<F>,
    metrics_path: Arc<str>,
}

impl<F> Clone for AppState<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
            metrics_path: self.metrics_path.clone(),
        }
    }
}

/// Query string of a scrape request.
#[derive(Debug, Deserialize)]
struct ScrapeParams {
    target: Option<String>,
}

impl ScrapeParams {
    fn target(&self) -> Result<&str, ValidationError> {
        match self.target.as_deref().map(str::trim) {
            // The tool would read a leading '-' as an option.
            Some(target) if target.starts_with('-') => Err(ValidationError::InvalidTarget),
            Some(target) if !target.is_empty() => Ok(target),
            _ => Err(ValidationError::MissingTarget),
        }
    }
}

/// Create the HTTP router.
pub fn create_router<F: Fetcher>(fetcher: Arc<F>, metrics_path: &str) -> Router {
    let state = AppState {
        fetcher,
        metrics_path: Arc::from(metrics_path),
    };

    let mut router = Router::new()
        .route(metrics_path, get(metrics_handler::<F>))
        .route("/health", get(health_handler));

    if metrics_path != "/" {
        router = router.route("/", get(landing_handler::<F>));
    }

    router.layer(CorsLayer::permissive()).with_state(state)
}

/// Handler for the metrics endpoint.
async fn metrics_handler<F: Fetcher>(
    State(state): State<AppState<F>>,
    Query(params): Query<ScrapeParams>,
) -> Response {
    let target = match params.target() {
        Ok(target) => target,
        Err(e) => return e.into_response(),
    };

    let scraper = ClustsafeScraper::new(target, state.fetcher.clone());

    match render_provider(&scraper).await {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", OPENMETRICS_CONTENT_TYPE)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(host = target, err = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics\n").into_response()
        }
    }
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// Landing page with a form to scrape a host.
async fn landing_handler<F: Fetcher>(State(state): State<AppState<F>>) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head><title>ClustSafe Exporter</title></head>
<body>
<h1>ClustSafe Exporter</h1>
<p>Prometheus Exporter for ClustSafe Rack PDU (version {version})</p>
<form action="{path}">
<label for="target">Target host</label>
<input type="text" id="target" name="target" placeholder="10.0.0.1">
<input type="submit" value="Submit">
</form>
</body>
</html>
"#,
        version = env!("CARGO_PKG_VERSION"),
        path = state.metrics_path,
    ))
}

/// HTTP server configuration.
pub struct HttpServer<F> {
    fetcher: Arc<F>,
    listen_addr: SocketAddr,
    metrics_path: String,
}

impl<F: Fetcher> HttpServer<F> {
    /// Create a new HTTP server.
    pub fn new(fetcher: Arc<F>, listen_addr: SocketAddr, metrics_path: String) -> Self {
        Self {
            fetcher,
            listen_addr,
            metrics_path,
        }
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let router = create_router(self.fetcher, &self.metrics_path);

        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        info!(
            addr = %self.listen_addr,
            path = %self.metrics_path,
            "HTTP server listening"
        );

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
