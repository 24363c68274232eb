//! Blocking HTTP client with a politeness delay and the site's consent cookie.
//!
//! Every request carries the static consent cookie; image requests
//! additionally set the owning chapter's URL as Referer, since the origin
//! rejects hot-linked image fetches without both. There are no automatic
//! retries: resilience comes from idempotent re-runs.

use std::time::{Duration, Instant};

use crate::scraper::error::ScraperError;

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; wtscrape/0.1; +https://github.com/wtscrape)";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DELAY_SECS: u64 = 0;
const MAX_REDIRECTS: usize = 10;

/// Consent cookie sent with every request to the source site.
pub const CONSENT_COOKIE: &str = "pagGDPR=true;";

/// Fetch seam between the engine and HTTP. The discoverer and downloader
/// run against this, so tests can substitute an in-memory fake.
pub trait Fetcher {
    /// GET a page and return its body as text.
    fn get_text(&mut self, url: &str) -> Result<String, ScraperError>;

    /// GET raw bytes, optionally with a Referer header.
    fn get_bytes(&mut self, url: &str, referer: Option<&str>) -> Result<Vec<u8>, ScraperError>;
}

/// Blocking HTTP client that enforces a delay between requests.
#[derive(Debug)]
pub struct PoliteClient {
    inner: reqwest::blocking::Client,
    delay: Duration,
    last_request: Option<Instant>,
}

impl PoliteClient {
    /// Build a polite client with default User-Agent, timeout, and delay.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::builder().build()
    }

    /// Builder for custom User-Agent, delay, or timeout.
    pub fn builder() -> PoliteClientBuilder {
        PoliteClientBuilder::default()
    }

    fn send(
        &mut self,
        url: &str,
        referer: Option<&str>,
    ) -> Result<reqwest::blocking::Response, ScraperError> {
        self.wait_delay();
        let mut request = self
            .inner
            .get(url)
            .header(reqwest::header::COOKIE, CONSENT_COOKIE);
        if let Some(referer) = referer {
            request = request.header(reqwest::header::REFERER, referer);
        }
        let response = request.send().map_err(|e| ScraperError::Network {
            url: url.to_string(),
            source: e,
        })?;
        self.last_request = Some(Instant::now());
        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }

    fn wait_delay(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                std::thread::sleep(self.delay - elapsed);
            }
        }
    }
}

impl Fetcher for PoliteClient {
    fn get_text(&mut self, url: &str) -> Result<String, ScraperError> {
        let response = self.send(url, None)?;
        response.text().map_err(|e| ScraperError::BodyRead {
            url: url.to_string(),
            source: e,
        })
    }

    fn get_bytes(&mut self, url: &str, referer: Option<&str>) -> Result<Vec<u8>, ScraperError> {
        let response = self.send(url, referer)?;
        let bytes = response.bytes().map_err(|e| ScraperError::BodyRead {
            url: url.to_string(),
            source: e,
        })?;
        Ok(bytes.to_vec())
    }
}

/// Builder for PoliteClient with optional User-Agent, delay, and timeout.
#[derive(Debug)]
pub struct PoliteClientBuilder {
    user_agent: Option<String>,
    delay_secs: u64,
    timeout_secs: u64,
}

impl Default for PoliteClientBuilder {
    fn default() -> Self {
        Self {
            user_agent: None,
            delay_secs: DEFAULT_DELAY_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl PoliteClientBuilder {
    /// Set a custom User-Agent. If not set, a browser-like default is used.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Set delay between requests in seconds. Default 0 (the discoverer
    /// applies its own inter-page delay).
    pub fn delay_secs(mut self, secs: u64) -> Self {
        self.delay_secs = secs;
        self
    }

    /// Set request timeout in seconds. Default 30.
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Build the blocking client and polite wrapper.
    pub fn build(self) -> Result<PoliteClient, reqwest::Error> {
        let user_agent = self
            .user_agent
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let inner = reqwest::blocking::Client::builder()
            .cookie_store(true)
            .user_agent(user_agent)
            .timeout(Duration::from_secs(self.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()?;
        Ok(PoliteClient {
            inner,
            delay: Duration::from_secs(self.delay_secs),
            last_request: None,
        })
    }
}
