use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::scrapers::traits::{origin_of, PageDriver};

/// Plain-HTTP page driver for static mirrors and saved search pages.
///
/// No script runs here, so scrolling is a no-op and a "reload" is simply a
/// re-fetch; useful when the listing source does not need a browser, and in
/// development against captured pages served locally.
pub struct SnapshotDriver {
    client: Client,
    url: String,
    html: String,
    origin: String,
}

impl SnapshotDriver {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            url: String::new(),
            html: String::new(),
            origin: String::new(),
        })
    }

    async fn fetch(&mut self) -> Result<()> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("Failed to fetch search page")?;

        if !response.status().is_success() {
            bail!("search page returned status {}", response.status());
        }

        self.html = response
            .text()
            .await
            .context("Failed to read response body")?;
        debug!("Downloaded {} bytes of HTML", self.html.len());
        Ok(())
    }
}

#[async_trait]
impl PageDriver for SnapshotDriver {
    async fn open(&mut self, url: &str) -> Result<()> {
        self.url = url.to_string();
        self.origin = origin_of(url);
        self.fetch().await
    }

    async fn page_html(&mut self) -> Result<String> {
        Ok(self.html.clone())
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        // Static content; nothing more will materialize.
        Ok(())
    }

    async fn reload(&mut self) -> Result<()> {
        self.fetch().await
    }

    fn origin(&self) -> &str {
        &self.origin
    }

    fn source_name(&self) -> &'static str {
        "snapshot"
    }
}
