use crate::domain::snapshot::{DeviceSplit, MetricSnapshot, Period};
use crate::history::{self, DeltaOutcome};
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Persist one snapshot, replacing any prior capture of the same
/// (client_id, period). Cached change columns are reset on replacement since
/// they were computed from the superseded values.
pub async fn capture(pool: &sqlx::PgPool, snapshot: &MetricSnapshot) -> anyhow::Result<()> {
    let mut tx = pool.begin().await.context("begin transaction failed")?;

    sqlx::query(
        "INSERT INTO monthly_snapshots (\
            client_id, period, clicks, impressions, ctr, avg_position, \
            users, sessions, page_views, engagement_rate, bounce_rate, \
            mobile_pct, desktop_pct, tablet_pct, captured_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
         ON CONFLICT (client_id, period) DO UPDATE \
           SET clicks = EXCLUDED.clicks, \
               impressions = EXCLUDED.impressions, \
               ctr = EXCLUDED.ctr, \
               avg_position = EXCLUDED.avg_position, \
               users = EXCLUDED.users, \
               sessions = EXCLUDED.sessions, \
               page_views = EXCLUDED.page_views, \
               engagement_rate = EXCLUDED.engagement_rate, \
               bounce_rate = EXCLUDED.bounce_rate, \
               mobile_pct = EXCLUDED.mobile_pct, \
               desktop_pct = EXCLUDED.desktop_pct, \
               tablet_pct = EXCLUDED.tablet_pct, \
               captured_at = EXCLUDED.captured_at, \
               clicks_change_percent = NULL, \
               impressions_change_percent = NULL, \
               ctr_change_percent = NULL, \
               position_change_percent = NULL, \
               users_change_percent = NULL",
    )
    .persistent(false)
    .bind(&snapshot.client_id)
    .bind(snapshot.period.to_string())
    .bind(snapshot.clicks)
    .bind(snapshot.impressions)
    .bind(snapshot.ctr)
    .bind(snapshot.avg_position)
    .bind(snapshot.users)
    .bind(snapshot.sessions)
    .bind(snapshot.page_views)
    .bind(snapshot.engagement_rate)
    .bind(snapshot.bounce_rate)
    .bind(snapshot.device_split.mobile)
    .bind(snapshot.device_split.desktop)
    .bind(snapshot.device_split.tablet)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await
    .context("upsert monthly_snapshots failed")?;

    tx.commit().await.context("commit transaction failed")?;

    tracing::debug!(
        client_id = %snapshot.client_id,
        period = %snapshot.period,
        "snapshot captured"
    );
    Ok(())
}

pub async fn latest(
    pool: &sqlx::PgPool,
    client_id: &str,
) -> anyhow::Result<Option<MetricSnapshot>> {
    let rows = recent(pool, client_id, 1).await?;
    Ok(rows.into_iter().next())
}

// Most recent snapshots first.
async fn recent(
    pool: &sqlx::PgPool,
    client_id: &str,
    limit: i64,
) -> anyhow::Result<Vec<MetricSnapshot>> {
    let rows = sqlx::query_as::<_, SnapshotRow>(
        "SELECT client_id, period, clicks, impressions, ctr, avg_position, \
                users, sessions, page_views, engagement_rate, bounce_rate, \
                mobile_pct, desktop_pct, tablet_pct \
         FROM monthly_snapshots \
         WHERE client_id = $1 \
         ORDER BY period DESC \
         LIMIT $2",
    )
    .persistent(false)
    .bind(client_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("select monthly_snapshots failed")?;

    rows.into_iter().map(snapshot_from_row).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub period: Period,
    pub value: f64,
}

/// Closed list of metrics exposed for trend queries, mapped to their column.
/// Anything else is rejected before touching SQL.
pub fn metric_column(metric: &str) -> Option<&'static str> {
    match metric {
        "clicks" => Some("clicks"),
        "impressions" => Some("impressions"),
        "ctr" => Some("ctr"),
        "avg_position" => Some("avg_position"),
        "users" => Some("users"),
        "sessions" => Some("sessions"),
        "page_views" => Some("page_views"),
        "engagement_rate" => Some("engagement_rate"),
        "bounce_rate" => Some("bounce_rate"),
        _ => None,
    }
}

/// The most recent `months` values of one metric, period-ascending so the
/// output is line-chart-ready without client-side sorting.
pub async fn trend(
    pool: &sqlx::PgPool,
    client_id: &str,
    metric: &str,
    months: u32,
) -> anyhow::Result<Vec<TrendPoint>> {
    let column = metric_column(metric)
        .with_context(|| format!("unknown trend metric {metric:?}"))?;

    let rows = sqlx::query_as::<_, (String, f64)>(&format!(
        "SELECT period, CAST({column} AS DOUBLE PRECISION) \
         FROM monthly_snapshots \
         WHERE client_id = $1 \
         ORDER BY period DESC \
         LIMIT $2",
    ))
    .persistent(false)
    .bind(client_id)
    .bind(months as i64)
    .fetch_all(pool)
    .await
    .context("select trend failed")?;

    let mut points = Vec::with_capacity(rows.len());
    for (period, value) in rows.into_iter().rev() {
        points.push(TrendPoint {
            period: period
                .parse()
                .with_context(|| format!("invalid period in store: {period:?}"))?,
            value,
        });
    }
    Ok(points)
}

/// Month-over-month changes for the client's two most recent snapshots, with
/// the computed values cached back onto the current row.
///
/// Fewer than two snapshots yields the insufficient-history sentinel, the
/// expected steady state for new clients.
pub async fn delta(pool: &sqlx::PgPool, client_id: &str) -> anyhow::Result<DeltaOutcome> {
    let snapshots = recent(pool, client_id, 2).await?;
    let [current, previous] = match snapshots.as_slice() {
        [current, previous] => [current, previous],
        _ => return Ok(DeltaOutcome::InsufficientHistory),
    };

    let changes = history::delta_between(current, previous);

    sqlx::query(
        "UPDATE monthly_snapshots \
         SET clicks_change_percent = $3, \
             impressions_change_percent = $4, \
             ctr_change_percent = $5, \
             position_change_percent = $6, \
             users_change_percent = $7 \
         WHERE client_id = $1 AND period = $2",
    )
    .persistent(false)
    .bind(client_id)
    .bind(current.period.to_string())
    .bind(changes["clicks_change_percent"].as_percent())
    .bind(changes["impressions_change_percent"].as_percent())
    .bind(changes["ctr_change_percent"].as_percent())
    .bind(changes["position_change_percent"].as_percent())
    .bind(changes["users_change_percent"].as_percent())
    .execute(pool)
    .await
    .context("cache change columns failed")?;

    Ok(DeltaOutcome::Computed { changes })
}

pub async fn record_capture_run(
    pool: &sqlx::PgPool,
    client_id: &str,
    period: Period,
    status: &str,
    error: Option<&str>,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let recorded_at: DateTime<Utc> = Utc::now();

    sqlx::query(
        "INSERT INTO capture_runs (id, client_id, period, recorded_at, status, error) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .persistent(false)
    .bind(id)
    .bind(client_id)
    .bind(period.to_string())
    .bind(recorded_at)
    .bind(status)
    .bind(error)
    .execute(pool)
    .await
    .context("insert capture_runs failed")?;

    Ok(id)
}

type SnapshotRow = (
    String,
    String,
    i64,
    i64,
    f64,
    f64,
    i64,
    i64,
    i64,
    f64,
    f64,
    f64,
    f64,
    f64,
);

fn snapshot_from_row(row: SnapshotRow) -> anyhow::Result<MetricSnapshot> {
    let (
        client_id,
        period,
        clicks,
        impressions,
        ctr,
        avg_position,
        users,
        sessions,
        page_views,
        engagement_rate,
        bounce_rate,
        mobile_pct,
        desktop_pct,
        tablet_pct,
    ) = row;

    Ok(MetricSnapshot {
        client_id,
        period: period
            .parse()
            .with_context(|| format!("invalid period in store: {period:?}"))?,
        clicks,
        impressions,
        ctr,
        avg_position,
        users,
        sessions,
        page_views,
        engagement_rate,
        bounce_rate,
        device_split: DeviceSplit {
            mobile: mobile_pct,
            desktop: desktop_pct,
            tablet: tablet_pct,
        },
    })
}
