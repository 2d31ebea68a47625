//! The scrape-cycle controller: repeated scroll/extract passes, a per-cycle
//! CSV export and store sync, then a page reload for a fresh set of
//! listings. Single-threaded and cooperative: stop requests are observed
//! at cycle boundaries, never mid-cycle.

use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Utc;
use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::classify::classify_listing;
use crate::config::ScoutConfig;
use crate::export;
use crate::models::NewListing;
use crate::scrapers::extract::extract_listings;
use crate::scrapers::traits::PageDriver;
use crate::store::ListingStore;
use crate::sync::SyncEngine;

/// Running flag and cycle counter, as reported over the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrapeStatus {
    pub running: bool,
    pub cycle_count: u32,
}

enum ControlRequest {
    Start,
    Stop,
    Status(oneshot::Sender<ScrapeStatus>),
}

/// External control surface. Callers can only request state transitions
/// (start, stop, get-status), never touch controller state directly.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<ControlRequest>,
}

impl ControllerHandle {
    pub async fn start(&self) -> Result<()> {
        self.tx
            .send(ControlRequest::Start)
            .await
            .map_err(|_| anyhow!("controller is gone"))
    }

    pub async fn stop(&self) -> Result<()> {
        self.tx
            .send(ControlRequest::Stop)
            .await
            .map_err(|_| anyhow!("controller is gone"))
    }

    pub async fn status(&self) -> Result<ScrapeStatus> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(ControlRequest::Status(reply))
            .await
            .map_err(|_| anyhow!("controller is gone"))?;
        response.await.map_err(|_| anyhow!("controller is gone"))
    }
}

pub struct ScrapeController<D, S> {
    driver: D,
    sync: SyncEngine<S>,
    config: ScoutConfig,
    rx: mpsc::Receiver<ControlRequest>,
    running: bool,
    cycle_count: u32,
}

impl<D: PageDriver, S: ListingStore> ScrapeController<D, S> {
    pub fn new(driver: D, sync: SyncEngine<S>, config: ScoutConfig) -> (Self, ControllerHandle) {
        let (tx, rx) = mpsc::channel(16);
        (
            Self {
                driver,
                sync,
                config,
                rx,
                running: false,
                cycle_count: 0,
            },
            ControllerHandle { tx },
        )
    }

    /// Drive the controller until the cycle limit is reached or every
    /// handle is dropped. A manual stop transitions back to idle; the next
    /// start request begins a fresh run.
    pub async fn run(mut self) -> Result<()> {
        self.driver.open(&self.config.search_url).await?;
        info!("watching {} via {}", self.config.search_url, self.driver.source_name());

        if self.config.should_auto_start() {
            info!("auto-start requested");
            self.begin();
        }

        loop {
            if !self.running {
                match self.rx.recv().await {
                    Some(request) => self.handle(request),
                    None => return Ok(()),
                }
                continue;
            }

            self.run_cycle().await?;

            // Requests queued while the cycle ran take effect here.
            while let Ok(request) = self.rx.try_recv() {
                self.handle(request);
            }
            if self.running && self.cycle_count >= self.config.max_cycles {
                info!("scrape limit reached, finishing");
                return Ok(());
            }
        }
    }

    fn begin(&mut self) {
        if !self.running {
            self.running = true;
            self.cycle_count = 0;
        }
    }

    fn handle(&mut self, request: ControlRequest) {
        match request {
            ControlRequest::Start => {
                info!("start requested");
                self.begin();
            }
            ControlRequest::Stop => {
                info!("stop requested");
                self.running = false;
            }
            ControlRequest::Status(reply) => {
                let _ = reply.send(ScrapeStatus {
                    running: self.running,
                    cycle_count: self.cycle_count,
                });
            }
        }
    }

    async fn run_cycle(&mut self) -> Result<()> {
        let cycle = self.cycle_count + 1;
        info!("scrape cycle {}/{}", cycle, self.config.max_cycles);

        for _ in 0..self.config.scroll_passes {
            self.driver.scroll_to_bottom().await?;
            sleep(self.config.scroll_settle()).await;
        }

        let html = self.driver.page_html().await?;
        let raw = extract_listings(&html, self.driver.origin());

        if raw.is_empty() {
            // Not an error; the next cycle is the retry mechanism.
            info!("no listings found this cycle");
        } else {
            info!("scraped {} listings", raw.len());
            if let Err(err) = export::export_cycle(&self.config.export_dir, cycle, &raw).await {
                warn!("cycle export failed: {err:#}");
            }

            let now = Utc::now();
            let batch: Vec<NewListing> = raw
                .iter()
                .filter_map(|r| classify_listing(r, &self.config.search_city, now))
                .collect();
            match self.sync.sync_batch(batch).await {
                Ok(report) => info!(
                    "cycle {}: {} created, {} backfilled, {} duplicates",
                    cycle, report.created, report.variant_backfilled, report.duplicates_skipped
                ),
                Err(err) => warn!("cycle sync failed: {err}"),
            }
        }

        // Let the export side effect finish before reload destroys the page.
        sleep(self.config.export_settle()).await;
        self.driver.reload().await?;
        self.cycle_count = cycle;

        let jitter = rand::thread_rng().gen_range(0..=self.config.cycle_jitter_ms);
        sleep(self.config.reload_wait() + Duration::from_millis(jitter)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::store::{JsonFileStore, ListingStore};

    struct FakeDriver {
        pages: Vec<String>,
        index: usize,
    }

    #[async_trait]
    impl PageDriver for FakeDriver {
        async fn open(&mut self, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn page_html(&mut self) -> Result<String> {
            Ok(self.pages[self.index.min(self.pages.len() - 1)].clone())
        }

        async fn scroll_to_bottom(&mut self) -> Result<()> {
            Ok(())
        }

        async fn reload(&mut self) -> Result<()> {
            if self.index + 1 < self.pages.len() {
                self.index += 1;
            }
            Ok(())
        }

        fn origin(&self) -> &str {
            "https://marketplace.example.com"
        }

        fn source_name(&self) -> &'static str {
            "fake"
        }
    }

    fn card(price: &str, title: &str, item: u32) -> String {
        format!(
            r#"<a href="/marketplace/item/{item}/"><div>
                <div><span dir="auto">{price}</span></div>
                <div>{title}</div>
                <div>Austin, TX</div>
            </div></a>"#
        )
    }

    fn test_config(export_dir: &std::path::Path, max_cycles: u32) -> ScoutConfig {
        let mut config = ScoutConfig::default();
        config.max_cycles = max_cycles;
        config.scroll_passes = 1;
        config.scroll_settle_ms = 1;
        config.export_settle_ms = 1;
        config.reload_wait_ms = 1;
        config.cycle_jitter_ms = 0;
        config.export_dir = export_dir.to_path_buf();
        config
    }

    #[tokio::test]
    async fn auto_start_runs_to_the_cycle_limit() {
        let exports = tempfile::tempdir().unwrap();
        let mut config = test_config(exports.path(), 2);
        config.auto_start = true;

        let driver = FakeDriver {
            pages: vec![
                format!(
                    "{}{}",
                    card("$500", "iPhone 15 Pro", 1),
                    card("$300", "iPhone 14", 2)
                ),
                // The reload serves one repeat and one fresh listing.
                format!(
                    "{}{}",
                    card("$300", "iPhone 14", 2),
                    card("$900", "iPhone 16 Pro Max", 3)
                ),
            ],
            index: 0,
        };

        let store = JsonFileStore::in_memory();
        let (controller, handle) =
            ScrapeController::new(driver, SyncEngine::new(store.clone()), config);
        drop(handle);
        controller.run().await.unwrap();

        let all = store.list_all().await.unwrap();
        assert_eq!(all.len(), 3);
        // The repeat observation of item 2 did not create a second record.
        let links: Vec<_> = all.iter().map(|l| l.link.as_str()).collect();
        assert!(links.contains(&"https://marketplace.example.com/marketplace/item/2/"));

        // Both cycles exported their findings.
        let mut exported: Vec<_> = std::fs::read_dir(exports.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        exported.sort();
        assert_eq!(exported, ["scrape_1_2_listings.csv", "scrape_2_2_listings.csv"]);
    }

    #[tokio::test]
    async fn control_surface_reports_status_and_starts() {
        let exports = tempfile::tempdir().unwrap();
        let config = test_config(exports.path(), 1);

        let driver = FakeDriver {
            pages: vec![card("$150", "iPhone 13", 7)],
            index: 0,
        };
        let store = JsonFileStore::in_memory();
        let (controller, handle) =
            ScrapeController::new(driver, SyncEngine::new(store.clone()), config);

        let task = tokio::spawn(controller.run());

        let status = handle.status().await.unwrap();
        assert!(!status.running);
        assert_eq!(status.cycle_count, 0);

        handle.start().await.unwrap();
        task.await.unwrap().unwrap();

        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_pages_are_not_an_error() {
        let exports = tempfile::tempdir().unwrap();
        let mut config = test_config(exports.path(), 1);
        config.auto_start = true;

        let driver = FakeDriver {
            pages: vec!["<div>nothing for sale</div>".to_string()],
            index: 0,
        };
        let store = JsonFileStore::in_memory();
        let (controller, handle) =
            ScrapeController::new(driver, SyncEngine::new(store.clone()), config);
        drop(handle);
        controller.run().await.unwrap();

        assert!(store.list_all().await.unwrap().is_empty());
    }
}
