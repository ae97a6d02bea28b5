//! Stockflow - Inventory Feed Import Backend
//!
//! Scheduled acquisition of vendor inventory feeds (URL + email), the
//! unified import pipeline, and the per-source inventory store. Manual
//! uploads and combines enter through the library API.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stockflow::colors::advisor::{ColorAdvisor, HttpColorAdvisor, NoopColorAdvisor};
use stockflow::config::AppConfig;
use stockflow::coordinator::ImportCoordinator;
use stockflow::pipeline::ImportPipeline;
use stockflow::retry::RetryQueue;
use stockflow::scheduler::Scheduler;
use stockflow::storage::InventoryDb;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stockflow=info,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    info!(db = %config.database_path, "starting stockflow backend");

    let db = InventoryDb::new(&config.database_path)?;

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.fetch_timeout_secs))
        .user_agent("Stockflow/1.0 (Inventory Import)")
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());

    let advisor: Arc<dyn ColorAdvisor> =
        match HttpColorAdvisor::from_config(http.clone(), &config) {
            Some(advisor) => {
                info!(model = %config.advisor_model, "color advisor enabled");
                Arc::new(advisor)
            }
            None => {
                info!("no color advisor key configured; suggestions disabled");
                Arc::new(NoopColorAdvisor)
            }
        };

    let pipeline = Arc::new(ImportPipeline::new(db, advisor));
    let coordinator = ImportCoordinator::new();
    let retry = RetryQueue::new();

    // The IMAP transport is supplied by the embedding deployment; the
    // scheduler skips email sources when none is wired in.
    let scheduler = Scheduler::new(
        pipeline.clone(),
        coordinator.clone(),
        retry.clone(),
        http.clone(),
        None,
    );

    let tick = config.scheduler_tick_secs;
    tokio::spawn(async move {
        scheduler.run_forever(tick).await;
    });
    info!(tick_secs = tick, "scheduler running");

    if let Some(base_url) = &config.marketplace_base_url {
        let lookup = stockflow::marketplace::HttpPriceClient::new(
            http.clone(),
            base_url.clone(),
            Duration::from_secs(30),
        );
        let db_for_prices = pipeline.db().clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(15 * 60));
            loop {
                ticker.tick().await;
                stockflow::marketplace::refresh_all_store_caches(&db_for_prices, &lookup).await;
            }
        });
        info!("marketplace price refresh loop running");
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}
