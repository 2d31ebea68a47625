use std::path::PathBuf;

use market_scout::config::ScoutConfig;
use market_scout::dedup::dedupe_keep_oldest;
use market_scout::scrapers::{ChromeDriver, ScrapeController};
use market_scout::store::{JsonFileStore, ListingStore};
use market_scout::sync::SyncEngine;
use tracing::{info, Level};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("📱 Market Scout - Marketplace Listing Watcher");
    info!("=============================================");
    info!("");

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = ScoutConfig::load(config_path.as_deref())?;
    info!("Watching {} for {}", config.search_url, config.search_city);

    let store = JsonFileStore::open(config.store_path.clone()).await?;
    let sync = SyncEngine::new(store.clone())
        .with_batching(config.delete_batch_size, config.delete_batch_pause());

    let driver = ChromeDriver::new()?;
    let (controller, handle) = ScrapeController::new(driver, sync, config);

    handle.start().await?;
    drop(handle);
    controller.run().await?;

    // Summarize what the run accumulated.
    let all = store.list_all().await?;
    let outcome = dedupe_keep_oldest(all);

    info!(
        "\n✅ {} canonical listings on record ({} duplicate observations collapsed)\n",
        outcome.unique.len(),
        outcome.duplicates_removed
    );

    for (i, listing) in outcome.unique.iter().enumerate() {
        println!("{}. {} (${})", i + 1, listing.title, listing.price);
        println!("   {} | {}", listing.model, listing.location);
        if let Some(variant) = listing.variant {
            println!("   Variant: {variant}");
        }
        println!("   {}", listing.link);
        println!();
    }

    Ok(())
}
