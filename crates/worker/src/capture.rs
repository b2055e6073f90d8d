use anyhow::Context;
use serde::Deserialize;
use serplens_core::classify::{self, Classification};
use serplens_core::domain::snapshot::{MetricSnapshot, Period};
use serplens_core::history::DeltaOutcome;
use serplens_core::normalize::{self, Normalizer, RawRecord, SourceKind};
use serplens_core::storage::snapshots;
use std::path::Path;

/// Hand-off file from the external parsing layer: one entry per client, each
/// with already-parsed rows per source kind. The worker never parses raw
/// export formats itself.
#[derive(Debug, Deserialize)]
pub struct CaptureManifest {
    pub clients: Vec<ClientExport>,
}

#[derive(Debug, Deserialize)]
pub struct ClientExport {
    pub client_id: String,
    pub client_name: String,
    #[serde(default)]
    pub sources: Vec<SourceExport>,
}

#[derive(Debug, Deserialize)]
pub struct SourceExport {
    pub kind: SourceKind,
    #[serde(default)]
    pub rows: Vec<RawRecord>,
}

pub fn load_manifest(path: &Path) -> anyhow::Result<CaptureManifest> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    let manifest: CaptureManifest = serde_json::from_str(&raw)
        .with_context(|| format!("manifest {} is not valid JSON", path.display()))?;
    anyhow::ensure!(
        !manifest.clients.is_empty(),
        "manifest {} contains no clients",
        path.display()
    );
    Ok(manifest)
}

/// Classify the client and reconcile its per-source rows into one snapshot.
/// The top search queries double as classification hints when the client
/// name alone is inconclusive.
pub fn build_snapshot(export: &ClientExport, period: Period) -> (Classification, MetricSnapshot) {
    let search_rows: Vec<RawRecord> = export
        .sources
        .iter()
        .filter(|s| s.kind == SourceKind::SearchPerformance)
        .flat_map(|s| s.rows.iter().cloned())
        .collect();

    let hints: Vec<String> = normalize::top_queries(&search_rows, 10)
        .into_iter()
        .map(|q| q.query)
        .collect();

    let classification = classify::classify(&export.client_name, &hints);

    let sources: Vec<(SourceKind, Vec<RawRecord>)> = export
        .sources
        .iter()
        .map(|s| (s.kind, s.rows.clone()))
        .collect();

    let snapshot = Normalizer::for_industry(classification.industry).normalize_merged(
        &sources,
        &export.client_id,
        period,
    );

    (classification, snapshot)
}

/// Capture one client: normalize, persist, surface the month-over-month
/// state, and record the run. Failures are recorded by the caller so this
/// stays a straight-line happy path.
pub async fn capture_client(
    pool: &sqlx::PgPool,
    export: &ClientExport,
    period: Period,
) -> anyhow::Result<()> {
    let (classification, snapshot) = build_snapshot(export, period);

    tracing::info!(
        client_id = %export.client_id,
        %period,
        industry = classification.industry.as_str(),
        location = classification.location.as_deref().unwrap_or("-"),
        clicks = snapshot.clicks,
        impressions = snapshot.impressions,
        users = snapshot.users,
        "snapshot normalized"
    );

    snapshots::capture(pool, &snapshot).await?;

    match snapshots::delta(pool, &export.client_id).await? {
        DeltaOutcome::InsufficientHistory => {
            // Expected for new clients; no synthetic prior period is ever
            // fabricated in its place.
            tracing::info!(
                client_id = %export.client_id,
                "insufficient history for month-over-month deltas"
            );
        }
        DeltaOutcome::Computed { changes } => {
            tracing::info!(
                client_id = %export.client_id,
                clicks_change = ?changes["clicks_change_percent"].as_percent(),
                users_change = ?changes["users_change_percent"].as_percent(),
                "month-over-month deltas cached"
            );
        }
    }

    snapshots::record_capture_run(pool, &export.client_id, period, "success", None).await?;
    Ok(())
}
