use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{delete, get},
    Router,
};
use serde::{Deserialize, Serialize};

use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::database::{Database, DbError, EventRow};

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 1000;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),
    #[error("Server error: {0}")]
    Server(String),
}

/// Response structure for status endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    pub total_events: u64,
    pub database_status: String,
}

/// Response structure for the paginated listing
#[derive(Debug, Serialize, Deserialize)]
pub struct TrackingListResponse {
    pub data: Vec<EventRow>,
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub total_pages: u64,
}

/// Response structure for delete endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub transaction_hash: String,
    pub deleted: usize,
}

/// Query parameters for the listing; unparsable values fall back to defaults
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
}

impl PageQuery {
    /// Resolved `(page, page_size)`
    pub fn resolve(&self) -> (u32, u32) {
        let page = parse_positive(self.page.as_deref()).unwrap_or(DEFAULT_PAGE);
        let page_size = parse_positive(self.page_size.as_deref())
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);
        (page, page_size)
    }
}

fn parse_positive(value: Option<&str>) -> Option<u32> {
    value
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|v| *v > 0)
}

/// Query parameters for search
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub kind: Option<String>,
    pub symbol: Option<String>,
}

/// Error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn error_response(status: StatusCode, error: &str, message: String) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
            message,
        }),
    )
}

fn database_error(e: DbError) -> (StatusCode, Json<ErrorResponse>) {
    log::error!("Database request failed: {}", e);
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "database_error",
        e.to_string(),
    )
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub database: Arc<Database>,
}

/// HTTP API server over stored tracking events
pub struct ApiServer {
    database: Arc<Database>,
    pub host: String,
    pub port: u16,
}

impl ApiServer {
    /// Create a new API server instance
    pub fn new(database: Arc<Database>, host: &str, port: u16) -> Self {
        Self {
            database,
            host: host.to_string(),
            port,
        }
    }

    /// Routes with CORS and request tracing
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/status", get(get_status))
            .route("/tracking", get(list_tracking))
            .route("/tracking/search", get(search_tracking))
            .route("/tracking/:transaction", delete(delete_tracking))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CorsLayer::permissive()),
            )
            .with_state(state)
    }

    /// Start the HTTP server
    pub async fn start(&self) -> Result<(), ApiError> {
        let app = Self::router(AppState {
            database: self.database.clone(),
        });

        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ApiError::Server(format!("Failed to bind to {}: {}", addr, e)))?;

        log::info!("HTTP API server starting on {}", addr);

        axum::serve(listener, app)
            .await
            .map_err(|e| ApiError::Server(format!("Server error: {}", e)))?;

        Ok(())
    }
}

/// GET /status - Get system status and health information
pub async fn get_status(State(state): State<AppState>) -> ApiResult<StatusResponse> {
    let total_events = state.database.event_count().map_err(database_error)?;
    Ok(Json(StatusResponse {
        status: "healthy".to_string(),
        total_events,
        database_status: "connected".to_string(),
    }))
}

/// GET /tracking - Stored events with pagination
pub async fn list_tracking(
    Query(params): Query<PageQuery>,
    State(state): State<AppState>,
) -> ApiResult<TrackingListResponse> {
    let (page, page_size) = params.resolve();

    let data = state.database.list_events(page, page_size).map_err(database_error)?;
    let total = state.database.event_count().map_err(database_error)?;
    let total_pages = total.div_ceil(u64::from(page_size));

    Ok(Json(TrackingListResponse {
        data,
        page,
        page_size,
        total,
        total_pages,
    }))
}

/// GET /tracking/search - Events matching kind or symbol
pub async fn search_tracking(
    Query(params): Query<SearchQuery>,
    State(state): State<AppState>,
) -> ApiResult<Vec<EventRow>> {
    let rows = state
        .database
        .search_events(params.kind.as_deref(), params.symbol.as_deref())
        .map_err(database_error)?;

    if rows.is_empty() {
        return Err(error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            "No tracking events match the query".to_string(),
        ));
    }

    Ok(Json(rows))
}

/// DELETE /tracking/:transaction - Remove all events of a transaction
pub async fn delete_tracking(
    Path(transaction): Path<String>,
    State(state): State<AppState>,
) -> ApiResult<DeleteResponse> {
    match state.database.delete_by_transaction_hash(&transaction) {
        Ok(deleted) => Ok(Json(DeleteResponse {
            transaction_hash: transaction,
            deleted,
        })),
        Err(DbError::NotFound) => Err(error_response(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("No tracking events for transaction {}", transaction),
        )),
        Err(e) => Err(database_error(e)),
    }
}
