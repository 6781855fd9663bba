use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::{
    error::AppError,
    models::Value,
    services::{
        insights::{self, ChartData, ChartOptions, Histogram, DEFAULT_HISTOGRAM_BINS},
        loader::{self, FileFormat},
        profile::{compute_profile, render_report, DatasetProfile},
        session::{Session, SessionId},
    },
    AppState,
};

const PREVIEW_ROWS: usize = 5;

pub fn routes() -> Router<Arc<AppState>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/datasets", post(upload_dataset))
        .route("/datasets/:id", get(get_dataset))
        .route("/datasets/:id/report", get(download_report))
        .route("/datasets/:id/histogram", get(get_histogram))
        .route(
            "/datasets/:id/risk-analysis",
            post(run_risk_analysis).get(download_risk_analysis),
        )
        .layer(cors)
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    filename: String,
}

#[derive(Debug, Deserialize)]
pub struct HistogramParams {
    column: String,
    bins: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct Preview {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

#[derive(Debug, Serialize)]
pub struct DatasetResponse {
    session_id: SessionId,
    filename: String,
    preview: Preview,
    profile: Arc<DatasetProfile>,
    report: String,
    charts: Arc<ChartData>,
}

impl DatasetResponse {
    fn from_session(session: &Session) -> Self {
        Self {
            session_id: session.id,
            filename: session.filename.clone(),
            preview: Preview {
                columns: session.dataset.columns().iter().map(|c| c.name.clone()).collect(),
                rows: session.dataset.head(PREVIEW_ROWS),
            },
            profile: session.profile.clone(),
            report: session.report.to_string(),
            charts: session.charts.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RiskAnalysisResponse {
    session_id: SessionId,
    model: String,
    analysis: String,
}

fn find_session(state: &AppState, id: &str) -> Result<Arc<Session>, AppError> {
    id.parse::<SessionId>()
        .ok()
        .and_then(|id| state.sessions.get(id))
        .ok_or_else(|| AppError::NotFound(format!("Dataset session '{}' not found", id)))
}

fn markdown_download(filename: &str, body: String) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/markdown; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
}

async fn upload_dataset(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<(StatusCode, Json<DatasetResponse>), AppError> {
    let start = std::time::Instant::now();
    tracing::info!(
        "Received upload '{}', size: {}KB",
        params.filename,
        body.len() / 1024
    );

    // 1. Validate file type
    let format = FileFormat::from_filename(&params.filename)?;

    // 2. Parse, profile and chart off the async workers
    let class_column = state.config.class_column.clone();
    let threshold = state.config.high_cardinality_threshold;
    let (dataset, profile, report, charts) = tokio::task::spawn_blocking(move || {
        let dataset = loader::load_dataset(&body, format)?;

        let profile_start = std::time::Instant::now();
        let profile = compute_profile(&dataset)?;
        let report = render_report(&profile);
        let charts = insights::chart_data(
            &dataset,
            &profile,
            &ChartOptions {
                class_column: &class_column,
                high_cardinality_threshold: threshold,
            },
        );
        tracing::info!(
            "Profiled {} rows, {} columns, {} missing in {:?}",
            profile.row_count,
            profile.column_count,
            profile.total_missing,
            profile_start.elapsed()
        );

        Ok::<_, AppError>((dataset, profile, report, charts))
    })
    .await??;

    // 3. Keep the session around for follow-up requests
    let session = state
        .sessions
        .create(params.filename, dataset, profile, report, charts);
    tracing::info!(
        "Created session {} in {:?}",
        session.id,
        start.elapsed()
    );

    Ok((StatusCode::CREATED, Json(DatasetResponse::from_session(&session))))
}

async fn get_dataset(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DatasetResponse>, AppError> {
    let session = find_session(&state, &id)?;
    Ok(Json(DatasetResponse::from_session(&session)))
}

async fn download_report(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = find_session(&state, &id)?;
    Ok(markdown_download("dataset_summary.md", session.report.to_string()))
}

async fn get_histogram(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<HistogramParams>,
) -> Result<Json<Histogram>, AppError> {
    let session = find_session(&state, &id)?;
    let bins = params.bins.unwrap_or(DEFAULT_HISTOGRAM_BINS);
    Ok(Json(insights::histogram(&session.dataset, &params.column, bins)?))
}

async fn run_risk_analysis(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RiskAnalysisResponse>, AppError> {
    let session = find_session(&state, &id)?;

    tracing::info!("Starting risk analysis for session {}", session.id);
    let llm_start = std::time::Instant::now();
    let analysis = state.analyzer.analyze(&session.report).await.map_err(|e| {
        tracing::error!("Risk analysis for session {} failed: {}", session.id, e);
        e
    })?;
    tracing::info!("Risk analysis completed in {:?}", llm_start.elapsed());

    state
        .sessions
        .set_risk_analysis(session.id, analysis.clone())
        .ok_or_else(|| AppError::NotFound(format!("Dataset session '{}' expired", id)))?;

    Ok(Json(RiskAnalysisResponse {
        session_id: session.id,
        model: state.analyzer.model().to_string(),
        analysis,
    }))
}

async fn download_risk_analysis(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = find_session(&state, &id)?;
    let analysis = session.risk_analysis.as_ref().ok_or_else(|| {
        AppError::NotFound(format!("No risk analysis has been run for session '{}'", id))
    })?;
    Ok(markdown_download("llm_risk_analysis.md", analysis.to_string()))
}
