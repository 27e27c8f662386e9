//! Paged lead pull from the C2S CRM API.
//!
//! The API signals rate limiting with a distinct 429 status; on that signal
//! the puller waits with a doubling, capped delay and retries the SAME page
//! rather than advancing, giving up only after a run of consecutive
//! rate-limit responses.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::config::Config;
use crate::ingest::C2sLeadPayload;

/// Consecutive rate-limit responses tolerated before the run aborts.
const MAX_CONSECUTIVE_RATE_LIMITS: u32 = 5;
/// First wait after a rate-limit signal.
const INITIAL_RATE_LIMIT_WAIT: Duration = Duration::from_secs(1);
/// Ceiling for the doubling wait.
const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);
/// Request timeout for page fetches.
const PULL_TIMEOUT_SECS: u64 = 30;

/// One fetched page, or the explicit rate-limit signal.
#[derive(Debug)]
pub enum PageOutcome {
    Leads(Vec<C2sLeadPayload>),
    RateLimited,
}

/// Doubling, capped wait applied between rate-limited retries of one page.
///
/// Kept separate from the HTTP loop so the policy is testable on its own.
#[derive(Debug)]
pub struct RateLimitBackoff {
    wait: Duration,
    consecutive: u32,
}

impl RateLimitBackoff {
    pub fn new() -> Self {
        Self {
            wait: INITIAL_RATE_LIMIT_WAIT,
            consecutive: 0,
        }
    }

    /// Next wait before retrying the same page, or `None` when the run
    /// should abort.
    pub fn on_rate_limited(&mut self) -> Option<Duration> {
        self.consecutive += 1;
        if self.consecutive > MAX_CONSECUTIVE_RATE_LIMITS {
            return None;
        }
        let wait = self.wait;
        self.wait = (self.wait * 2).min(MAX_RATE_LIMIT_WAIT);
        Some(wait)
    }

    /// A successful page resets the streak and the wait.
    pub fn on_success(&mut self) {
        self.wait = INITIAL_RATE_LIMIT_WAIT;
        self.consecutive = 0;
    }
}

impl Default for RateLimitBackoff {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct PageBody {
    #[serde(default)]
    leads: Vec<C2sLeadPayload>,
}

pub struct C2sClient {
    http: Client,
    base_url: String,
    token: String,
}

impl C2sClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(PULL_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base_url: config.c2s_base_url.trim_end_matches('/').to_string(),
            token: config.c2s_api_token.clone(),
        })
    }

    async fn fetch_page(&self, page: u32) -> Result<PageOutcome> {
        let url = format!("{}/integration/leads?page={page}", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .with_context(|| format!("fetching leads page {page}"))?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            return Ok(PageOutcome::RateLimited);
        }
        let response = response
            .error_for_status()
            .with_context(|| format!("leads page {page}"))?;
        let body: PageBody = response
            .json()
            .await
            .with_context(|| format!("decoding leads page {page}"))?;
        Ok(PageOutcome::Leads(body.leads))
    }

    /// Pull every lead page, honoring rate-limit signals per page.
    pub async fn pull_all(&self) -> Result<Vec<C2sLeadPayload>> {
        let mut all = Vec::new();
        let mut page = 1u32;
        let mut backoff = RateLimitBackoff::new();

        loop {
            match self.fetch_page(page).await? {
                PageOutcome::RateLimited => match backoff.on_rate_limited() {
                    Some(wait) => {
                        tracing::warn!(page, wait_secs = wait.as_secs(), "C2S rate limited");
                        tokio::time::sleep(wait).await;
                        // Retry the same page, never advance past it.
                    }
                    None => bail!(
                        "aborting pull: {MAX_CONSECUTIVE_RATE_LIMITS} consecutive \
                         rate-limit responses at page {page}"
                    ),
                },
                PageOutcome::Leads(leads) => {
                    backoff.on_success();
                    if leads.is_empty() {
                        break;
                    }
                    tracing::debug!(page, count = leads.len(), "pulled C2S lead page");
                    all.extend(leads);
                    page += 1;
                }
            }
        }
        tracing::info!(total = all.len(), "C2S pull finished");
        Ok(all)
    }
}
