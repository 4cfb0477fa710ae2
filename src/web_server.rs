use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, Path as UrlPath, Request, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    serve, Json, Router,
};
use minijinja::{path_loader, Environment};
use minijinja_autoreload::AutoReloader;
use serde::Deserialize;
use serde_json::{json, Value};
use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::catalog::Catalog;
use crate::error::{AppError, SERVICE_UNAVAILABLE_NOTICE};
use crate::orchestrator::Orchestrator;
use crate::transcript::Message;

// Shared application state
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
    catalog: Arc<Catalog>,
    templates: Arc<AutoReloader>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>, catalog: Arc<Catalog>, templates_dir: &Path) -> Self {
        Self {
            orchestrator,
            catalog,
            templates: Arc::new(create_minijinja_env(templates_dir)),
        }
    }
}

// Minijinja Environment setup
fn create_minijinja_env(templates_dir: &Path) -> AutoReloader {
    let templates_dir = templates_dir.to_path_buf();
    // Use AutoReloader so template edits show up without a restart
    AutoReloader::new(move |notifier| {
        let mut env = Environment::new();
        env.set_loader(path_loader(&templates_dir));
        notifier.watch_path(&templates_dir, true);
        Ok(env)
    })
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    // Parsed separately so a bad transcript gets its own error.
    #[serde(default)]
    pub messages: Option<Value>,
    #[serde(rename = "userMessage")]
    pub user_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QnaRequest {
    pub message: Option<String>,
}

/// `/chat` failures: `{error}` with 400 for client-side problems, 500 otherwise.
struct ChatError(AppError);

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// `/qna` failures: always 500 with a `{message}` body, including missing input.
struct QnaError(AppError);

impl IntoResponse for QnaError {
    fn into_response(self) -> Response {
        let message = match self.0 {
            AppError::InvalidInput | AppError::InvalidTranscript => "No message sent",
            AppError::UpstreamEmptyResponse | AppError::ToolResultEncoding(_) => {
                "Failed to generate output"
            }
            AppError::UpstreamError(_) | AppError::ExtractionFailed => "Failed to fetch completion",
        };
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "message": message }))).into_response()
    }
}

fn log_failure(route: &str, err: &AppError) {
    match err {
        AppError::UpstreamError(source) => error!(route = route, "Chat completion API error: {:?}", source),
        other => warn!(route = route, "Request failed: {}", other),
    }
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ChatError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected /chat body: {}", rejection);
        ChatError(AppError::InvalidInput)
    })?;
    let user_message = request.user_message.unwrap_or_default();
    let prior: Vec<Message> = match request.messages {
        Some(messages) => serde_json::from_value(messages).map_err(|e| {
            warn!("Rejected /chat transcript: {}", e);
            ChatError(AppError::InvalidTranscript)
        })?,
        None => Vec::new(),
    };

    let messages = state
        .orchestrator
        .handle_chat(prior, &user_message)
        .await
        .map_err(|err| {
            log_failure("/chat", &err);
            ChatError(err)
        })?;

    Ok(Json(json!({ "messages": messages })))
}

fn render_page(
    state: &AppState,
    template: &str,
    ctx: minijinja::Value,
) -> Result<Html<String>, (StatusCode, Html<String>)> {
    // Acquire env, get template, and render within the same block
    state
        .templates
        .acquire_env()
        .and_then(|env| env.get_template(template).and_then(|tmpl| tmpl.render(ctx)))
        .map(Html)
        .map_err(|e| {
            error!("Failed to get or render template {}: {}", template, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("Internal Server Error: {}", e)),
            )
        })
}

async fn qna_handler(
    State(state): State<AppState>,
    payload: Result<Json<QnaRequest>, JsonRejection>,
) -> Result<Json<serde_json::Value>, QnaError> {
    let question = match payload {
        Ok(Json(request)) => request.message.unwrap_or_default(),
        Err(rejection) => {
            warn!("Rejected /qna body: {}", rejection);
            String::new()
        }
    };

    let data = state.orchestrator.handle_qna(&question).await.map_err(|err| {
        log_failure("/qna", &err);
        QnaError(err)
    })?;

    Ok(Json(json!({ "data": data })))
}

async fn index_handler(State(state): State<AppState>) -> Result<Html<String>, (StatusCode, Html<String>)> {
    render_page(
        &state,
        "index.html",
        minijinja::context! {
            title => "Explore Credit Cards",
            cards => state.catalog.entries(),
        },
    )
}

async fn chat_page_handler(State(state): State<AppState>) -> Result<Html<String>, (StatusCode, Html<String>)> {
    render_page(
        &state,
        "chat.html",
        minijinja::context! {
            title => "Credit Card Assistant",
            service_notice => SERVICE_UNAVAILABLE_NOTICE,
        },
    )
}

async fn cards_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "cards": state.catalog.entries() }))
}

async fn card_handler(
    State(state): State<AppState>,
    UrlPath(card_name): UrlPath<String>,
) -> Response {
    match state.catalog.find(&card_name) {
        Some(entry) => Json(entry.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("No card named '{}'", card_name) })),
        )
            .into_response(),
    }
}

pub fn build_router(state: AppState, static_dir: &Path) -> Router {
    // Serve static files from the static directory
    let static_files_service =
        ServeDir::new(static_dir).not_found_service(tower::service_fn(|_req: Request| async {
            Ok::<_, std::convert::Infallible>((StatusCode::NOT_FOUND, "Not Found").into_response())
        }));

    Router::new()
        .route("/", get(index_handler))
        .route("/chat", get(chat_page_handler).post(chat_handler))
        .route("/qna", post(qna_handler))
        .route("/cards", get(cards_handler))
        .route("/cards/:card_name", get(card_handler))
        .nest_service("/static", static_files_service)
        .with_state(state)
        .layer(TraceLayer::new_for_http()) // Add request logging
}

pub async fn start_web_server(port: u16, state: AppState, static_dir: PathBuf) -> Result<()> {
    let app = build_router(state, &static_dir);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Web server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server failed")?;

    info!("Web server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C: {:?}", e);
        // Without a signal handler, run until the process is killed.
        std::future::pending::<()>().await;
    }
    info!("Ctrl-C received, initiating shutdown...");
}
