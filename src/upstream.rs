//! Match-data provider: the rate-limited HTTP API and the cached view of it
//! the scorer consumes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::CachedFetcher;
use crate::config::{TtlClass, UpstreamConfig};
use crate::history::{Fixture, MatchupHistory, parse_history_sections, split_matchup};
use crate::http_client::http_client;

const H2H_PATH: &str = "/api/flashscore/v1/match/h2h";
const DETAILS_PATH: &str = "/api/flashscore/v1/match/details";
const MAX_ERROR_BODY: usize = 200;

/// Raw payload source, one call per upstream request.
#[async_trait]
pub trait MatchDataSource: Send + Sync {
    async fn match_h2h(&self, match_id: &str) -> Result<Value>;

    async fn match_details(&self, match_id: &str) -> Result<Value>;
}

/// Supplies the three history slices for a fixture.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    async fn matchup_history(&self, fixture: &Fixture) -> Result<MatchupHistory>;
}

/// Calls per UTC day, reset at midnight.
pub struct RequestBudget {
    limit: u32,
    state: Mutex<(NaiveDate, u32)>,
}

impl RequestBudget {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            state: Mutex::new((Utc::now().date_naive(), 0)),
        }
    }

    pub fn try_acquire(&self) -> bool {
        self.try_acquire_on(Utc::now().date_naive())
    }

    fn try_acquire_on(&self, today: NaiveDate) -> bool {
        let mut state = self.state.lock();
        if state.0 != today {
            *state = (today, 0);
        }
        if state.1 >= self.limit {
            return false;
        }
        state.1 += 1;
        true
    }

    pub fn used(&self) -> u32 {
        self.state.lock().1
    }
}

pub struct MatchDataClient {
    client: Client,
    cfg: UpstreamConfig,
    budget: RequestBudget,
}

impl MatchDataClient {
    pub fn new(cfg: UpstreamConfig) -> Result<Self> {
        let client = http_client()?.clone();
        let budget = RequestBudget::new(cfg.daily_limit);
        Ok(Self {
            client,
            cfg,
            budget,
        })
    }

    pub fn requests_used(&self) -> u32 {
        self.budget.used()
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.cfg.base_url, path);
        let mut attempt = 0u32;
        loop {
            if !self.budget.try_acquire() {
                return Err(anyhow!(
                    "daily upstream budget of {} requests exhausted",
                    self.cfg.daily_limit
                ));
            }

            let mut req = self
                .client
                .get(&url)
                .timeout(self.cfg.timeout)
                .header("X-RapidAPI-Host", self.cfg.host());
            if let Some(key) = self.cfg.api_key.as_deref() {
                req = req.header("X-RapidAPI-Key", key);
            }

            let resp = req.send().await.with_context(|| format!("request failed: {url}"))?;
            let status = resp.status();
            if status == StatusCode::TOO_MANY_REQUESTS && attempt < self.cfg.max_retries {
                attempt += 1;
                let delay = backoff_delay(self.cfg.backoff_base, attempt);
                warn!(
                    url = %url,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "upstream rate limited, backing off"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            let body = resp.text().await.context("failed reading body")?;
            if !status.is_success() {
                return Err(anyhow!("http {}: {}", status, truncate(&body)));
            }
            let trimmed = body.trim();
            if trimmed.is_empty() || trimmed == "null" {
                return Err(anyhow!("empty response from {url}"));
            }
            debug!(url = %url, "upstream response received");
            return serde_json::from_str(trimmed).context("invalid upstream json");
        }
    }
}

#[async_trait]
impl MatchDataSource for MatchDataClient {
    async fn match_h2h(&self, match_id: &str) -> Result<Value> {
        self.get_json(&format!("{H2H_PATH}/{match_id}")).await
    }

    async fn match_details(&self, match_id: &str) -> Result<Value> {
        self.get_json(&format!("{DETAILS_PATH}/{match_id}")).await
    }
}

/// Routes every upstream call through the read-through cache.
pub struct CachedHistoryProvider<S> {
    source: Arc<S>,
    fetcher: Arc<CachedFetcher>,
}

impl<S: MatchDataSource> CachedHistoryProvider<S> {
    pub fn new(source: Arc<S>, fetcher: Arc<CachedFetcher>) -> Self {
        Self { source, fetcher }
    }

    pub async fn match_details(&self, match_id: &str) -> Result<Value> {
        let value = self
            .fetcher
            .fetch(TtlClass::MatchDetails, match_id, || {
                self.source.match_details(match_id)
            })
            .await?;
        Ok(value)
    }
}

#[async_trait]
impl<S: MatchDataSource> HistoryProvider for CachedHistoryProvider<S> {
    async fn matchup_history(&self, fixture: &Fixture) -> Result<MatchupHistory> {
        if fixture.id.trim().is_empty() {
            return Err(anyhow!(
                "fixture {} vs {} has no match id",
                fixture.home,
                fixture.away
            ));
        }
        let raw: Value = self
            .fetcher
            .fetch(TtlClass::MatchHistory, &fixture.id, || {
                self.source.match_h2h(&fixture.id)
            })
            .await?;
        let records = parse_history_sections(&raw);
        Ok(split_matchup(&records, fixture))
    }
}

pub(crate) fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(1u32 << attempt.min(16))
}

fn truncate(body: &str) -> &str {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
