// Web Server - dashboard + JSON API + Telegram webhook (axum)
//
// Both adapters share one `Arc<Ledger>`. Appends run on the blocking pool
// because they fsync; reads come from the ledger's in-memory snapshot.

use crate::bot::{BotAdapter, Update};
use crate::ledger::{Ledger, StorageError};
use crate::parser::{Grammar, ParseError, SaleFields};
use crate::record::{Record, Source};
use crate::summary::Summary;
use axum::{
    body::Bytes,
    extract::{rejection::FormRejection, Form, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    ledger: Arc<Ledger>,
    grammar: Grammar,
    bot: BotAdapter,
    telegram_token: Arc<str>,
}

impl AppState {
    pub fn new(ledger: Arc<Ledger>, grammar: Grammar, telegram_token: &str) -> Self {
        Self {
            bot: BotAdapter::new(Arc::clone(&ledger), grammar),
            ledger,
            grammar,
            telegram_token: Arc::from(telegram_token),
        }
    }
}

/// API Response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            hint: None,
        }
    }

    fn fail(error: String, hint: Option<&str>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            hint: hint.map(str::to_string),
        }
    }
}

/// Body of `POST /api/sales`: either a raw line or split fields
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum NewSale {
    Line { line: String },
    Fields(SaleFields),
}

/// Active grammar, so clients can build the right form
#[derive(Debug, Serialize, Deserialize)]
pub struct GrammarInfo {
    pub name: String,
    pub hint: String,
    pub has_qty: bool,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
enum ApiError {
    Parse(ParseError),
    Storage(StorageError),
    Worker(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Parse(e) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ApiResponse::<()>::fail(e.to_string(), Some(e.hint()))),
            )
                .into_response(),
            ApiError::Storage(e) => {
                error!(error = %e, "sale not saved");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::<()>::fail("sale could not be saved".to_string(), None)),
                )
                    .into_response()
            }
            ApiError::Worker(e) => {
                error!(error = %e, "ledger worker failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::<()>::fail("internal error".to_string(), None)),
                )
                    .into_response()
            }
        }
    }
}

/// Append on the blocking pool
async fn append_record(ledger: Arc<Ledger>, record: Record) -> Result<Record, ApiError> {
    let saved = record.clone();
    tokio::task::spawn_blocking(move || ledger.append(record))
        .await
        .map_err(|e| ApiError::Worker(e.to_string()))?
        .map_err(ApiError::Storage)?;
    Ok(saved)
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/grammar - Active sale-line format
async fn get_grammar(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(GrammarInfo {
        name: state.grammar.name().to_string(),
        hint: state.grammar.hint().to_string(),
        has_qty: state.grammar == Grammar::ItemQtyPrice,
    }))
}

/// GET /api/sales - All sales in append order
async fn list_sales(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.ledger.list_all()))
}

/// POST /api/sales - Append one sale
async fn create_sale(
    State(state): State<AppState>,
    Json(body): Json<NewSale>,
) -> Result<impl IntoResponse, ApiError> {
    let record = match body {
        NewSale::Line { line } => state.grammar.parse(&line, Source::Dashboard),
        NewSale::Fields(fields) => state.grammar.parse_fields(&fields, Source::Dashboard),
    }
    .map_err(ApiError::Parse)?;

    let saved = append_record(Arc::clone(&state.ledger), record).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(saved))))
}

/// GET /api/stats - Totals per item
async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(Summary::of(&state.ledger.snapshot())))
}

/// GET /api/items/:item - Sales of one item
async fn item_sales(
    State(state): State<AppState>,
    Path(item): Path<String>,
) -> impl IntoResponse {
    let wanted = item.trim().to_lowercase();
    let sales: Vec<Record> = state
        .ledger
        .snapshot()
        .iter()
        .filter(|r| r.item.to_lowercase() == wanted)
        .cloned()
        .collect();

    Json(ApiResponse::ok(sales))
}

// ============================================================================
// Dashboard
// ============================================================================

/// GET / - Serve the dashboard page
async fn serve_dashboard() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

/// POST / - Form submission from the dashboard
async fn submit_form(
    State(state): State<AppState>,
    form: Result<Form<SaleFields>, FormRejection>,
) -> Response {
    let hint = state.grammar.hint();
    let fields = match form {
        Ok(Form(fields)) => fields,
        Err(rejection) => {
            warn!(error = %rejection, "unreadable sale form");
            return (
                StatusCode::BAD_REQUEST,
                format!("invalid form ({})\nexpected: {}", rejection.body_text(), hint),
            )
                .into_response();
        }
    };

    let record = match state.grammar.parse_fields(&fields, Source::Dashboard) {
        Ok(record) => record,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, format!("{}\nexpected: {}", e, hint)).into_response();
        }
    };

    match append_record(Arc::clone(&state.ledger), record).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(e) => e.into_response(),
    }
}

// ============================================================================
// Telegram
// ============================================================================

/// POST /telegram/:token - Bot webhook
///
/// The token is checked before the body is looked at.
async fn telegram_webhook(
    State(state): State<AppState>,
    Path(token): Path<String>,
    body: Bytes,
) -> Response {
    if token != *state.telegram_token {
        warn!("webhook called with wrong token");
        return StatusCode::NOT_FOUND.into_response();
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!(error = %e, "unreadable telegram update");
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    let bot = state.bot.clone();
    match tokio::task::spawn_blocking(move || bot.handle_update(&update)).await {
        Ok(Some(call)) => Json(call).into_response(),
        Ok(None) => StatusCode::OK.into_response(),
        Err(e) => ApiError::Worker(e.to_string()).into_response(),
    }
}

// ============================================================================
// Router
// ============================================================================

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/grammar", get(get_grammar))
        .route("/sales", get(list_sales).post(create_sale))
        .route("/stats", get(get_stats))
        .route("/items/:item", get(item_sales))
        .with_state(state.clone());

    Router::new()
        .route("/", get(serve_dashboard).post(submit_form))
        .route("/telegram/:token", post(telegram_webhook))
        .with_state(state)
        .nest("/api", api_routes)
        .nest_service("/static", ServeDir::new("web"))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
