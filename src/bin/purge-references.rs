/// Re-run the media reference cleanup for assets that are already gone.
///
/// Usage: purge-references --tenant UUID --asset-id UUID [--asset-id UUID ...]
///   Ids that still exist as assets of the tenant are skipped.

use std::sync::Arc;

use clap::Parser;
use uuid::Uuid;

use materials_api::{
    db::{self, PgStore},
    models::media::MediaKind,
    services::cleanup::ContentCleanup,
    store::AssetStore,
};

#[derive(Parser)]
#[command(name = "purge-references", about = "Remove dangling media references from lessons and courses")]
struct Args {
    /// Tenant (owner identity id) whose documents are cleaned
    #[arg(long)]
    tenant: Uuid,

    /// Deleted asset id; repeat for several
    #[arg(long = "asset-id", required = true)]
    asset_ids: Vec<Uuid>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable not set"))?;
    let pool = db::create_pool(&database_url).await?;
    let store = Arc::new(PgStore::new(pool));

    let mut gone = Vec::with_capacity(args.asset_ids.len());
    for id in args.asset_ids {
        if still_exists(store.as_ref(), id, args.tenant).await? {
            tracing::warn!(asset_id = %id, "asset still exists, skipping");
        } else {
            gone.push(id);
        }
    }

    if gone.is_empty() {
        tracing::info!("Nothing to clean up");
        return Ok(());
    }

    let report = ContentCleanup::new(store)
        .purge_references(&gone, args.tenant)
        .await;

    tracing::info!(
        targets = gone.len(),
        rewritten = report.rewritten.len(),
        failures = report.failures.len(),
        "Reference cleanup completed"
    );
    for failure in &report.failures {
        tracing::error!(
            asset_id = %failure.target,
            kind = %failure.kind,
            document_id = ?failure.document_id,
            "{}",
            failure.error
        );
    }

    Ok(())
}

async fn still_exists(store: &PgStore, id: Uuid, tenant: Uuid) -> anyhow::Result<bool> {
    for kind in MediaKind::ALL {
        if let Some(asset) = AssetStore::get(store, kind, id).await? {
            if asset.tenant_id == tenant {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
