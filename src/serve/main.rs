//! Query server for drawn-region commune lookups.
//!
//! Serves the boundary layer to the map page, resolves drawn regions to
//! communes grouped by district, exports the result as a sheet and proxies
//! the radar overlay.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use clap::Parser;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use wardmap::config::Config;
use wardmap::engine::drawings_from_value;
use wardmap::export::{self, ExportWriter};
use wardmap::models::{ExportRow, ParentGroup};
use wardmap::radar::{format_timestamp, RadarClient};
use wardmap::{
    BoundaryLayer, ExportError, GeometryError, Outcome, RegionQueryEngine, SelectionResult,
};

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "serve")]
#[command(about = "Commune lookup server for drawn map regions")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    listen: String,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Boundary dataset (overrides the config file)
    #[arg(long)]
    boundary: Option<PathBuf>,

    /// Export template (overrides the config file)
    #[arg(long)]
    template: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

/// Application state shared across handlers
struct AppState {
    engine: RegionQueryEngine,
    export: ExportWriter,
    export_file_name: String,
    radar: Option<RadarClient>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::INFO })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = Config::load_or_default(args.config.as_deref())?;
    if let Some(path) = args.boundary {
        config.boundary.path = path;
    }
    if let Some(path) = args.template {
        config.export.template = Some(path);
    }

    info!("Wardmap Server");

    let source = config.boundary.source();
    let boundary = tokio::task::spawn_blocking(move || BoundaryLayer::shared(&source))
        .await?
        .with_context(|| {
            format!(
                "Failed to load boundary dataset {:?}",
                config.boundary.path
            )
        })?;

    let radar = match config.radar.clone() {
        Some(radar_config) => Some(RadarClient::new(radar_config)?),
        None => {
            info!("Radar overlay not configured");
            None
        }
    };

    let state = Arc::new(AppState {
        engine: RegionQueryEngine::new(boundary),
        export: ExportWriter::from_config(&config.export),
        export_file_name: config.export.file_name.clone(),
        radar,
    });

    // Build router
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/v1/units", get(units_handler))
        .route("/v1/resolve", post(resolve_handler))
        .route("/v1/export", post(export_handler))
        .route("/v1/radar", get(radar_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Starting server on {}", args.listen);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        units: state.engine.boundary().len(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    units: usize,
}

/// Boundary layer as GeoJSON for the map overlay
async fn units_handler(State(state): State<Arc<AppState>>) -> Json<geojson::FeatureCollection> {
    Json(state.engine.boundary().to_feature_collection())
}

#[derive(Serialize)]
struct ResolveResponse {
    status: &'static str,
    message: String,
    /// Distinct unit names
    count: usize,
    /// Matched records, before name deduplication
    matched: usize,
    groups: Vec<ParentGroup>,
    rows: Vec<ExportRow>,
}

/// Run a query on the blocking pool
async fn run_query(
    state: &Arc<AppState>,
    payload: serde_json::Value,
) -> Result<Outcome, (StatusCode, String)> {
    let regions = drawings_from_value(payload).map_err(unprocessable)?;

    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || state.engine.query(&regions))
        .await
        .map_err(|e| {
            error!("Query task failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })
}

fn unprocessable(e: GeometryError) -> (StatusCode, String) {
    (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
}

/// Resolve drawn regions to communes grouped by district
async fn resolve_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<ResolveResponse>, (StatusCode, String)> {
    let outcome = run_query(&state, payload).await?;
    let status = outcome.status();
    let message = outcome.message();

    let result = match outcome {
        Outcome::Failed(e) => return Err(unprocessable(e)),
        Outcome::Found(result) => result,
        Outcome::NothingDrawn | Outcome::NoMatch => SelectionResult::empty(),
    };

    Ok(Json(ResolveResponse {
        status,
        message,
        count: result.unit_count(),
        matched: result.matched_count(),
        rows: RegionQueryEngine::to_export_rows(&result),
        groups: result.groups().to_vec(),
    }))
}

/// Resolve and return the result as a downloadable sheet
async fn export_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Response, (StatusCode, String)> {
    let result = match run_query(&state, payload).await? {
        Outcome::Found(result) => result,
        Outcome::Failed(e) => return Err(unprocessable(e)),
        Outcome::NothingDrawn | Outcome::NoMatch => {
            return Ok(StatusCode::NO_CONTENT.into_response())
        }
    };

    let rows = RegionQueryEngine::to_export_rows(&result);
    let bytes = state.export.write(&rows).map_err(|e| match e {
        ExportError::TemplateNotFound(_) => {
            error!("{}", e);
            (StatusCode::NOT_FOUND, e.to_string())
        }
        other => {
            error!("Export failed: {}", other);
            (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, export::CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", state.export_file_name),
            ),
        ],
        Bytes::from(bytes),
    )
        .into_response())
}

/// Latest radar frame with overlay placement headers
async fn radar_handler(State(state): State<Arc<AppState>>) -> Result<Response, (StatusCode, String)> {
    let radar = state
        .radar
        .as_ref()
        .ok_or((StatusCode::NOT_FOUND, "radar overlay not configured".to_string()))?;

    let frame = radar.fetch_latest().await.map_err(|e| {
        error!("Radar fetch failed: {}", e);
        (StatusCode::BAD_GATEWAY, e.to_string())
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, frame.content_type.clone()),
            (
                HeaderName::from_static("x-radar-timestamp"),
                format_timestamp(&frame.timestamp),
            ),
            (HeaderName::from_static("x-radar-bbox"), frame.bbox.to_string()),
            (
                HeaderName::from_static("x-radar-opacity"),
                frame.opacity.to_string(),
            ),
        ],
        Bytes::from(frame.image),
    )
        .into_response())
}
