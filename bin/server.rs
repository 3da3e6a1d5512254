// Food Waste Dashboard - Web Server
// JSON API over the filter-and-aggregation core, with per-session working copies

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeFile;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use food_dashboard::{
    claims_by_food, demand, explorer, overview, query_entry, session_table, top_n, top_receivers,
    ClaimSort, DashboardConfig, DashboardError, DatasetRegistry, Edit, FilterOptions,
    FilterSelection, QueryKey, Role, SessionEditStore, SessionPool, SourceStatus, Table,
};

/// Shared application state
///
/// The registry is immutable after startup and shared freely; each session's
/// working copies live in the pool behind a mutex.
#[derive(Clone)]
struct AppState {
    registry: Arc<DatasetRegistry>,
    sessions: Arc<Mutex<SessionPool>>,
}

impl AppState {
    fn sessions(&self) -> Result<MutexGuard<'_, SessionPool>, ApiError> {
        self.sessions
            .lock()
            .map_err(|_| ApiError::internal("session store unavailable"))
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

/// Error response: status + message
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn internal(message: &str) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.to_string(),
        }
    }
}

impl From<DashboardError> for ApiError {
    fn from(e: DashboardError) -> Self {
        let status = match &e {
            DashboardError::UnknownQuery(_)
            | DashboardError::UnknownSession(_)
            | DashboardError::UnknownRole(_) => StatusCode::NOT_FOUND,
            DashboardError::RowOutOfRange { .. } | DashboardError::ColumnNotFound(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!("{}", self.message);
        } else {
            warn!("{}", self.message);
        }
        let body = ApiResponse {
            success: false,
            data: (),
            error: Some(self.message),
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Filter + session query parameters shared by the read endpoints
#[derive(Debug, Default, Deserialize)]
struct ViewParams {
    city: Option<String>,
    provider: Option<String>,
    food: Option<String>,
    session: Option<Uuid>,
}

impl ViewParams {
    fn selection(&self) -> FilterSelection {
        FilterSelection::global(self.city.clone(), self.provider.clone(), self.food.clone())
    }
}

#[derive(Debug, Deserialize)]
struct TopParams {
    metric: Option<String>,
    label: Option<String>,
    n: Option<usize>,
    #[serde(flatten)]
    view: ViewParams,
}

#[derive(Debug, Deserialize)]
struct ClaimsParams {
    n: Option<usize>,
    sort: Option<String>,
    #[serde(flatten)]
    view: ViewParams,
}

#[derive(Debug, Deserialize)]
struct DemandParams {
    local_city: Option<String>,
    #[serde(flatten)]
    view: ViewParams,
}

#[derive(Serialize)]
struct QueryInfo {
    key: QueryKey,
    title: &'static str,
    question: &'static str,
    status: Option<SourceStatus>,
}

#[derive(Serialize)]
struct SessionInfo {
    id: Uuid,
    created_at: DateTime<Utc>,
    edited: Vec<QueryKey>,
}

impl SessionInfo {
    fn of(store: &SessionEditStore) -> Self {
        SessionInfo {
            id: store.id(),
            created_at: store.created_at(),
            edited: store.keys(),
        }
    }
}

/// Working copy after an edit
#[derive(Serialize)]
struct EditResult {
    forked_at: DateTime<Utc>,
    edits: usize,
    table: Table,
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/filters - Selectable values for the global filters
async fn get_filters(State(state): State<AppState>) -> ApiResult<FilterOptions> {
    Ok(Json(ApiResponse::ok(FilterOptions::collect(&state.registry))))
}

/// GET /api/queries - Query catalog with load status
async fn list_queries(State(state): State<AppState>) -> ApiResult<Vec<QueryInfo>> {
    let statuses = state.registry.status();
    let queries = QueryKey::ALL
        .iter()
        .map(|&key| QueryInfo {
            key,
            title: key.title(),
            question: key.question(),
            status: statuses.iter().find(|s| s.key == key).cloned(),
        })
        .collect();

    Ok(Json(ApiResponse::ok(queries)))
}

/// GET /api/overview - KPI cards
async fn get_overview(
    State(state): State<AppState>,
    Query(params): Query<ViewParams>,
) -> ApiResult<food_dashboard::Overview> {
    Ok(Json(ApiResponse::ok(overview(&state.registry, &params.selection()))))
}

/// GET /api/explorer - Every query after filters
async fn get_explorer(
    State(state): State<AppState>,
    Query(params): Query<ViewParams>,
) -> ApiResult<Vec<food_dashboard::QueryEntry>> {
    let pool = state.sessions()?;
    let session = params.session.map(|id| pool.get(id)).transpose()?;
    Ok(Json(ApiResponse::ok(explorer(&state.registry, &params.selection(), session))))
}

/// GET /api/queries/:key - One query after filters (or the session's working copy)
async fn get_query(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<ViewParams>,
) -> ApiResult<food_dashboard::QueryEntry> {
    let key: QueryKey = key.parse()?;
    let pool = state.sessions()?;
    let session = params.session.map(|id| pool.get(id)).transpose()?;

    Ok(Json(ApiResponse::ok(query_entry(
        &state.registry,
        &params.selection(),
        session,
        key,
    ))))
}

/// GET /api/queries/:key/top - Top-N ranking by metric role
async fn get_top(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<TopParams>,
) -> ApiResult<food_dashboard::Ranking> {
    let key: QueryKey = key.parse()?;
    let metric: Role = params.metric.as_deref().unwrap_or("claims").parse()?;
    let label: Role = params.label.as_deref().unwrap_or("name").parse()?;
    let n = params.n.unwrap_or(10);

    let pool = state.sessions()?;
    let session = params.view.session.map(|id| pool.get(id)).transpose()?;
    let table = session_table(&state.registry, &params.view.selection(), session, key);

    Ok(Json(ApiResponse::ok(top_n(&table, metric, label, n))))
}

/// GET /api/queries/:key/csv - Download the session's view as CSV
async fn get_csv(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<ViewParams>,
) -> Result<Response, ApiError> {
    let key: QueryKey = key.parse()?;
    let pool = state.sessions()?;
    let session = params.session.map(|id| pool.get(id)).transpose()?;
    let table = session_table(&state.registry, &params.selection(), session, key);

    if table.is_empty() {
        return Err(ApiError {
            status: StatusCode::NOT_FOUND,
            message: "No data to download.".to_string(),
        });
    }

    let bytes = table.to_csv_bytes()?;
    let suffix = if session.map_or(false, |s| s.get(key).is_some()) { "_edited" } else { "" };
    let disposition = format!("attachment; filename=\"{}{}.csv\"", key, suffix);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

/// GET /api/claims - Top receivers + claims by food item
async fn get_claims(
    State(state): State<AppState>,
    Query(params): Query<ClaimsParams>,
) -> ApiResult<serde_json::Value> {
    let pool = state.sessions()?;
    let session = params.view.session.map(|id| pool.get(id)).transpose()?;
    let selection = params.view.selection();
    let n = params.n.unwrap_or(food_dashboard::views::TOP_RECEIVERS_DEFAULT);
    let sort: ClaimSort = match params.sort.as_deref() {
        Some(s) => s.parse()?,
        None => ClaimSort::default(),
    };

    let receivers = top_receivers(&state.registry, &selection, session, n);
    let by_food = claims_by_food(&state.registry, &selection, session, sort);

    Ok(Json(ApiResponse::ok(serde_json::json!({
        "top_receivers": receivers,
        "claims_by_food": by_food,
    }))))
}

/// GET /api/demand - Most demanded food types
async fn get_demand(
    State(state): State<AppState>,
    Query(params): Query<DemandParams>,
) -> ApiResult<Option<food_dashboard::Demand>> {
    Ok(Json(ApiResponse::ok(demand(
        &state.registry,
        &params.view.selection(),
        params.local_city.as_deref(),
    ))))
}

/// POST /api/sessions - Start a session with an empty edit store
async fn open_session(State(state): State<AppState>) -> ApiResult<SessionInfo> {
    let mut pool = state.sessions()?;
    let id = pool.open();
    Ok(Json(ApiResponse::ok(SessionInfo::of(pool.get(id)?))))
}

/// DELETE /api/sessions/:id - End a session, discarding its edits
async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<bool> {
    if state.sessions()?.close(id) {
        Ok(Json(ApiResponse::ok(true)))
    } else {
        Err(DashboardError::UnknownSession(id).into())
    }
}

/// POST /api/sessions/:id/queries/:key/edits - Apply one edit to the working copy
async fn post_edit(
    State(state): State<AppState>,
    Path((id, key)): Path<(Uuid, String)>,
    Query(params): Query<ViewParams>,
    Json(edit): Json<Edit>,
) -> ApiResult<EditResult> {
    let key: QueryKey = key.parse()?;
    let base = food_dashboard::apply(&state.registry.load(key), &params.selection());

    let mut pool = state.sessions()?;
    let store = pool.get_mut(id)?;
    let copy = store.apply_edit(key, &base, edit)?;

    info!(session = %id, query = %key, edits = copy.edit_count(), "edit applied");
    Ok(Json(ApiResponse::ok(EditResult {
        forked_at: copy.forked_at(),
        edits: copy.edit_count(),
        table: copy.table().clone(),
    })))
}

/// DELETE /api/sessions/:id/queries/:key - Drop a working copy
async fn discard_copy(
    State(state): State<AppState>,
    Path((id, key)): Path<(Uuid, String)>,
) -> ApiResult<SessionInfo> {
    let key: QueryKey = key.parse()?;
    let mut pool = state.sessions()?;
    let store = pool.get_mut(id)?;
    store.discard(key);

    Ok(Json(ApiResponse::ok(SessionInfo::of(store))))
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🌐 Food Waste Dashboard - Web Server");

    let config_path = std::env::var("FOOD_DASHBOARD_CONFIG").ok().map(std::path::PathBuf::from);
    let config = DashboardConfig::load(config_path.as_deref(), None)?;
    let logo = config.logo_path();

    let registry = DatasetRegistry::open(config);
    let available = registry.status().iter().filter(|s| s.available).count();
    info!("✓ {} of {} query tables available", available, QueryKey::ALL.len());

    // Create shared state
    let state = AppState {
        registry: Arc::new(registry),
        sessions: Arc::new(Mutex::new(SessionPool::new())),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/filters", get(get_filters))
        .route("/queries", get(list_queries))
        .route("/overview", get(get_overview))
        .route("/explorer", get(get_explorer))
        .route("/queries/:key", get(get_query))
        .route("/queries/:key/top", get(get_top))
        .route("/queries/:key/csv", get(get_csv))
        .route("/claims", get(get_claims))
        .route("/demand", get(get_demand))
        .route("/sessions", post(open_session))
        .route("/sessions/:id", delete(close_session))
        .route("/sessions/:id/queries/:key", delete(discard_copy))
        .route("/sessions/:id/queries/:key/edits", post(post_edit))
        .with_state(state);

    // Build main router
    let mut app = Router::new().nest("/api", api_routes);
    if let Some(logo) = logo {
        app = app.route_service("/logo", ServeFile::new(logo));
    }
    let app = app.layer(CorsLayer::permissive());

    // Start server
    let addr = std::env::var("FOOD_DASHBOARD_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("🚀 Server running on http://{}", addr);
    info!("   API: http://{}/api/overview", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
