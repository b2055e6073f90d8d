use crate::domain::snapshot::Period;
use anyhow::Context;

// Advisory locks are scoped to the Postgres session. Used as a best-effort
// guard against a scheduled capture window double-running; per-row idempotent
// upserts make a lost race harmless either way.
const LOCK_NAMESPACE: i64 = 0x5345_5250_4C45; // "SERPLE" as hex-ish namespace.

fn lock_key_for_period(period: Period) -> i64 {
    LOCK_NAMESPACE ^ ((period.year() as i64) * 12 + period.month() as i64)
}

pub async fn try_acquire_capture_lock(
    pool: &sqlx::PgPool,
    period: Period,
) -> anyhow::Result<bool> {
    let key = lock_key_for_period(period);
    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .persistent(false)
        .bind(key)
        .fetch_one(pool)
        .await
        .with_context(|| format!("failed to acquire advisory lock (key={key})"))?;
    Ok(acquired.0)
}

pub async fn release_capture_lock(pool: &sqlx::PgPool, period: Period) -> anyhow::Result<()> {
    let key = lock_key_for_period(period);
    sqlx::query("SELECT pg_advisory_unlock($1)")
        .persistent(false)
        .bind(key)
        .execute(pool)
        .await
        .with_context(|| format!("failed to release advisory lock (key={key})"))?;
    Ok(())
}
