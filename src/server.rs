//! serve command: JSON API over the fetch orchestrator
//!
//! Routes:
//! - GET /health
//! - GET /news?limit=1..20&headless=true|false

use crate::browser::{ChromeRenderer, PageRenderer};
use crate::error::ClassifiedError;
use crate::fetch::{
    fetch_and_extract, FetchSettings, NewsRequest, TimeoutArgs, Timeouts, DEFAULT_LIMIT, MAX_LIMIT,
};
use crate::schema::NewsEnvelope;
use crate::site::SiteProfile;
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use clap::Args;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

#[derive(Args)]
pub struct ServeArgs {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, short, env = "PORT", default_value = "3000")]
    pub port: u16,

    #[command(flatten)]
    pub timeouts: TimeoutArgs,
}

pub struct AppState {
    pub renderer: Arc<dyn PageRenderer>,
    pub settings: FetchSettings,
}

#[derive(Debug, Default, Deserialize)]
pub struct NewsQuery {
    limit: Option<String>,
    headless: Option<String>,
}

/// Error response: `{"error": <code>, "message": <text>}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn invalid_query(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "INVALID_QUERY",
            message: message.into(),
        }
    }
}

impl From<ClassifiedError> for ApiError {
    fn from(err: ClassifiedError) -> Self {
        Self {
            status: StatusCode::from_u16(err.suggested_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            code: err.kind().code(),
            message: err.message().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({
                "error": self.code,
                "message": self.message,
            })),
        )
            .into_response()
    }
}

/// Build the router; the renderer is injected so tests can fake the browser
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/news", get(news))
        .fallback(not_found)
        .with_state(state)
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        )
}

/// Run the serve command
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let site = SiteProfile::ANSA;
    let state = Arc::new(AppState {
        renderer: Arc::new(ChromeRenderer::new(&site)),
        settings: FetchSettings {
            site,
            timeouts: Timeouts::from(&args.timeouts),
        },
    });

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(%addr, source = site.source, "ANSA news API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn not_found() -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        code: "NOT_FOUND",
        message: "Endpoint non trovato.".to_string(),
    }
}

async fn news(
    State(state): State<Arc<AppState>>,
    query: Result<Query<NewsQuery>, QueryRejection>,
) -> Result<Json<NewsEnvelope>, ApiError> {
    let started = Instant::now();
    let Query(query) = query.map_err(|rejection| {
        info!(error = %rejection.body_text(), "GET /news rejected query string");
        ApiError::invalid_query("Parametri di query non validi.")
    })?;
    let request = NewsRequest {
        limit: parse_limit(query.limit.as_deref())?,
        headless: parse_headless(query.headless.as_deref())?,
    };
    info!(limit = request.limit, headless = request.headless, "GET /news");

    // A panic inside the orchestration surfaces as a JoinError, the one
    // failure that is reported as Internal.
    let task_state = Arc::clone(&state);
    let outcome = tokio::spawn(async move {
        fetch_and_extract(task_state.renderer.as_ref(), &request, &task_state.settings).await
    })
    .await
    .unwrap_or_else(|join_err| {
        error!(error = %join_err, "News task failed");
        Err(ClassifiedError::internal())
    });

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match outcome {
        Ok(envelope) => {
            info!(count = envelope.count, elapsed_ms, "GET /news succeeded");
            Ok(Json(envelope))
        }
        Err(e) => {
            error!(code = e.kind().code(), reason = e.message(), elapsed_ms, "GET /news failed");
            Err(e.into())
        }
    }
}

fn parse_limit(raw: Option<&str>) -> Result<usize, ApiError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_LIMIT);
    };
    match raw.trim().parse::<usize>() {
        Ok(limit) if (1..=MAX_LIMIT).contains(&limit) => Ok(limit),
        _ => Err(ApiError::invalid_query(format!(
            "Il parametro limit deve essere un intero tra 1 e {}.",
            MAX_LIMIT
        ))),
    }
}

fn parse_headless(raw: Option<&str>) -> Result<bool, ApiError> {
    match raw {
        None | Some("true") => Ok(true),
        Some("false") => Ok(false),
        Some(_) => Err(ApiError::invalid_query(
            "Il parametro headless deve essere true o false.",
        )),
    }
}
