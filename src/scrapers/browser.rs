use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::{info, warn};

use crate::scrapers::traits::{origin_of, PageDriver};

/// Page driver backed by headless Chrome, for the real marketplace with
/// its lazy-loading feed.
pub struct ChromeDriver {
    browser: Browser,
    tab: Option<Arc<Tab>>,
    origin: String,
}

impl ChromeDriver {
    pub fn new() -> Result<Self> {
        info!("Launching headless Chrome...");

        let options = LaunchOptions::default_builder()
            .headless(true)
            .build()
            .context("Failed to build launch options")?;

        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;

        Ok(Self {
            browser,
            tab: None,
            origin: String::new(),
        })
    }

    fn tab(&self) -> Result<&Arc<Tab>> {
        self.tab.as_ref().ok_or_else(|| anyhow!("no page opened yet"))
    }
}

#[async_trait]
impl PageDriver for ChromeDriver {
    async fn open(&mut self, url: &str) -> Result<()> {
        info!("Opening search page...");
        let tab = self.browser.new_tab()?;
        tab.navigate_to(url)?;
        tab.wait_until_navigated()?;
        self.origin = origin_of(url);
        self.tab = Some(tab);
        Ok(())
    }

    async fn page_html(&mut self) -> Result<String> {
        let result = self
            .tab()?
            .evaluate("document.documentElement.outerHTML", false)?;
        match result.value.as_ref().and_then(|v| v.as_str()) {
            Some(html) => Ok(html.to_string()),
            None => {
                warn!("Could not get HTML from page");
                Ok(String::new())
            }
        }
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        self.tab()?
            .evaluate("window.scrollBy(0, document.body.scrollHeight)", false)?;
        Ok(())
    }

    async fn reload(&mut self) -> Result<()> {
        let tab = self.tab()?;
        tab.reload(true, None)?;
        tab.wait_until_navigated()?;
        Ok(())
    }

    fn origin(&self) -> &str {
        &self.origin
    }

    fn source_name(&self) -> &'static str {
        "chrome"
    }
}
