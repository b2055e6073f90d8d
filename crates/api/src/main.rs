use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use serplens_core::benchmark::{self, BenchmarkResult};
use serplens_core::classify::{self, IndustryTag};
use serplens_core::domain::recommendation::{RecommendationDraft, ScoredRecommendation};
use serplens_core::domain::snapshot::MetricSnapshot;
use serplens_core::history::DeltaOutcome;
use serplens_core::score::{self, PrioritySummary};
use serplens_core::storage::snapshots::{self, TrendPoint};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = serplens_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match serplens_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let state = AppState { pool };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/clients/:client_id/snapshots/latest",
            get(get_latest_snapshot),
        )
        .route("/clients/:client_id/trend/:metric", get(get_trend))
        .route("/clients/:client_id/delta", get(get_delta))
        .route("/clients/:client_id/benchmark", get(get_benchmark))
        .route("/prioritize", post(post_prioritize))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Debug, Clone)]
struct AppState {
    pool: Option<PgPool>,
}

async fn get_latest_snapshot(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<Json<MetricSnapshot>, StatusCode> {
    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let snapshot = snapshots::latest(pool, &client_id)
        .await
        .map_err(internal_error)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(snapshot))
}

#[derive(Debug, Deserialize)]
struct TrendQuery {
    months: Option<u32>,
}

#[derive(Debug, Serialize)]
struct TrendResponse {
    client_id: String,
    metric: String,
    points: Vec<TrendPoint>,
}

async fn get_trend(
    State(state): State<AppState>,
    Path((client_id, metric)): Path<(String, String)>,
    Query(query): Query<TrendQuery>,
) -> Result<Json<TrendResponse>, StatusCode> {
    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    if snapshots::metric_column(&metric).is_none() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let months = query.months.unwrap_or(12).clamp(1, 60);
    let points = snapshots::trend(pool, &client_id, &metric, months)
        .await
        .map_err(internal_error)?;

    Ok(Json(TrendResponse {
        client_id,
        metric,
        points,
    }))
}

async fn get_delta(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
) -> Result<Json<DeltaOutcome>, StatusCode> {
    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let outcome = snapshots::delta(pool, &client_id)
        .await
        .map_err(internal_error)?;

    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
struct BenchmarkQuery {
    /// Display name used for classification; falls back to the client id.
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct BenchmarkResponse {
    client_id: String,
    industry: IndustryTag,
    location: Option<String>,
    period: serplens_core::domain::snapshot::Period,
    result: BenchmarkResult,
}

async fn get_benchmark(
    State(state): State<AppState>,
    Path(client_id): Path<String>,
    Query(query): Query<BenchmarkQuery>,
) -> Result<Json<BenchmarkResponse>, StatusCode> {
    let Some(pool) = &state.pool else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let snapshot = snapshots::latest(pool, &client_id)
        .await
        .map_err(internal_error)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let display_name = query
        .name
        .unwrap_or_else(|| client_id.replace(['-', '_'], " "));
    let classification = classify::classify(&display_name, &[]);
    let profile = benchmark::profile_for(classification.industry);
    let result = benchmark::compare(&snapshot, profile);

    Ok(Json(BenchmarkResponse {
        client_id,
        industry: classification.industry,
        location: classification.location,
        period: snapshot.period,
        result,
    }))
}

#[derive(Debug, Serialize)]
struct PrioritizeResponse {
    recommendations: Vec<ScoredRecommendation>,
    summary: PrioritySummary,
}

async fn post_prioritize(
    Json(drafts): Json<Vec<RecommendationDraft>>,
) -> Json<PrioritizeResponse> {
    let recommendations = score::prioritize(drafts);
    let summary = score::summary(&recommendations);
    Json(PrioritizeResponse {
        recommendations,
        summary,
    })
}

fn internal_error(e: anyhow::Error) -> StatusCode {
    sentry_anyhow::capture_anyhow(&e);
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &serplens_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
