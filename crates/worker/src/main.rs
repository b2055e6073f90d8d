use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::Parser;
use serplens_core::domain::snapshot::Period;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod capture;

#[derive(Debug, Parser)]
#[command(name = "serplens_worker")]
struct Args {
    /// Manifest of pre-parsed client exports (JSON), produced by the
    /// external parsing layer.
    #[arg(long)]
    manifest: std::path::PathBuf,

    /// Capture period (YYYY-MM). Defaults to the previous calendar month.
    #[arg(long)]
    period: Option<String>,

    /// Do everything except writing to the database.
    #[arg(long)]
    dry_run: bool,
}

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

    let args = Args::parse();

    let period = resolve_period(args.period.as_deref(), Utc::now())?;
    let manifest = capture::load_manifest(&args.manifest)?;

    if args.dry_run {
        for export in &manifest.clients {
            let (classification, snapshot) = capture::build_snapshot(export, period);
            tracing::info!(
                client_id = %export.client_id,
                %period,
                dry_run = true,
                industry = classification.industry.as_str(),
                clicks = snapshot.clicks,
                impressions = snapshot.impressions,
                users = snapshot.users,
                mobile_pct = snapshot.device_split.mobile,
                "dry-run snapshot"
            );
        }
        return Ok(());
    }

    let db_url = settings.require_database_url()?;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;

    serplens_core::storage::migrate(&pool).await?;

    let acquired =
        serplens_core::storage::lock::try_acquire_capture_lock(&pool, period).await?;
    if !acquired {
        tracing::warn!(%period, "capture lock not acquired; another run in progress");
        return Ok(());
    }

    // One task per client. Each writes to a disjoint (client_id, period) row
    // and captures are idempotent, so no coordination beyond the row upsert.
    let mut handles = Vec::with_capacity(manifest.clients.len());
    for export in manifest.clients {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move {
            let client_id = export.client_id.clone();
            let result = capture::capture_client(&pool, &export, period).await;
            if let Err(err) = &result {
                sentry_anyhow::capture_anyhow(err);
                tracing::error!(client_id = %client_id, error = %err, "client capture failed");
                let _ = serplens_core::storage::snapshots::record_capture_run(
                    &pool,
                    &client_id,
                    period,
                    "error",
                    Some(&format!("{err:#}")),
                )
                .await;
            }
            result.is_ok()
        }));
    }

    let mut succeeded: usize = 0;
    let mut failed: usize = 0;
    for handle in handles {
        match handle.await {
            Ok(true) => succeeded += 1,
            Ok(false) => failed += 1,
            Err(join_err) => {
                failed += 1;
                tracing::error!(error = %join_err, "capture task panicked");
            }
        }
    }

    tracing::info!(%period, succeeded, failed, "capture run finished");

    let _ = serplens_core::storage::lock::release_capture_lock(&pool, period).await;

    anyhow::ensure!(failed == 0, "{failed} client capture(s) failed");
    Ok(())
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

// A monthly capture summarizes a completed month, so the default is the
// month before the current one.
fn resolve_period(period_arg: Option<&str>, now_utc: DateTime<Utc>) -> anyhow::Result<Period> {
    if let Some(s) = period_arg {
        return s.parse();
    }
    Ok(Period::from_date(now_utc.date_naive()).prev())
}
