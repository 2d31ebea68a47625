use anyhow::Result;
use async_trait::async_trait;
use url::Url;

/// Capability surface the cycle controller needs from a live page.
/// This allows swapping the headless-Chrome driver for the plain-HTTP
/// snapshot driver (or a fake in tests) without touching the pipeline.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigate to the search page and wait until it is usable.
    async fn open(&mut self, url: &str) -> Result<()>;

    /// Current serialized DOM.
    async fn page_html(&mut self) -> Result<String>;

    /// Scroll to the bottom so lazy-loaded content starts materializing.
    async fn scroll_to_bottom(&mut self) -> Result<()>;

    /// Full page reload; the site serves a fresh set of listings per load.
    async fn reload(&mut self) -> Result<()>;

    /// Origin used to resolve relative listing links.
    fn origin(&self) -> &str;

    /// Short name of the driver for logs.
    fn source_name(&self) -> &'static str;
}

/// Scheme-and-host origin of a URL, or the URL itself when unparseable.
pub(crate) fn origin_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            let host = u.host_str()?.to_string();
            Some(format!("{}://{}", u.scheme(), host))
        })
        .unwrap_or_else(|| url.to_string())
}
