//! Player prop hit rates: how often a player cleared a line, per market,
//! over recent game logs and a few standard splits.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::CachedFetcher;
use crate::config::TtlClass;
use crate::error::FetchError;
use crate::rate::compute_rate;
use crate::window::extract_window;

pub const DEFAULT_LAST_N: usize = 20;

/// One game of a player's log, newest first in any slice handed to this
/// module. Missing stats read as zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameLog {
    pub game_id: String,
    #[serde(default)]
    pub game_date: Option<String>,
    pub home: bool,
    #[serde(default)]
    pub stats: BTreeMap<String, f64>,
}

impl GameLog {
    pub fn stat(&self, market: Market) -> f64 {
        if let Some(v) = self.stats.get(market.key()) {
            return *v;
        }
        match market {
            Market::Pra => [Market::Points, Market::Rebounds, Market::Assists]
                .iter()
                .map(|m| self.stats.get(m.key()).copied().unwrap_or(0.0))
                .sum(),
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    #[serde(rename = "pts")]
    Points,
    #[serde(rename = "reb")]
    Rebounds,
    #[serde(rename = "ast")]
    Assists,
    Pra,
    Fg3m,
    #[serde(rename = "stl")]
    Steals,
    #[serde(rename = "blk")]
    Blocks,
    #[serde(rename = "tov")]
    Turnovers,
}

impl Market {
    pub const ALL: [Market; 8] = [
        Market::Points,
        Market::Rebounds,
        Market::Assists,
        Market::Pra,
        Market::Fg3m,
        Market::Steals,
        Market::Blocks,
        Market::Turnovers,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Market::Points => "pts",
            Market::Rebounds => "reb",
            Market::Assists => "ast",
            Market::Pra => "pra",
            Market::Fg3m => "fg3m",
            Market::Steals => "stl",
            Market::Blocks => "blk",
            Market::Turnovers => "tov",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Market::Points => "Points",
            Market::Rebounds => "Rebounds",
            Market::Assists => "Assists",
            Market::Pra => "Pts+Reb+Ast",
            Market::Fg3m => "3-Pointers",
            Market::Steals => "Steals",
            Market::Blocks => "Blocks",
            Market::Turnovers => "Turnovers",
        }
    }

    pub fn default_line(&self) -> f64 {
        match self {
            Market::Points => 25.5,
            Market::Rebounds => 8.5,
            Market::Assists => 6.5,
            Market::Pra => 38.5,
            Market::Fg3m => 2.5,
            Market::Steals => 1.5,
            Market::Blocks => 1.5,
            Market::Turnovers => 3.5,
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown market: {0}")]
pub struct UnknownMarket(pub String);

impl FromStr for Market {
    type Err = UnknownMarket;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let market = match s.trim().to_ascii_lowercase().as_str() {
            "pts" | "points" => Market::Points,
            "reb" | "rebounds" => Market::Rebounds,
            "ast" | "assists" => Market::Assists,
            "pra" => Market::Pra,
            "fg3m" | "3pm" => Market::Fg3m,
            "stl" | "steals" => Market::Steals,
            "blk" | "blocks" => Market::Blocks,
            "tov" | "turnovers" => Market::Turnovers,
            _ => return Err(UnknownMarket(s.to_string())),
        };
        Ok(market)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitRate {
    /// Percentage rounded to one decimal.
    pub hit_rate: f64,
    pub hits: usize,
    pub total: usize,
    pub line: f64,
    pub market: Market,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Splits {
    pub last5: HitRate,
    pub last10: HitRate,
    pub home: HitRate,
    pub away: HitRate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketReport {
    #[serde(flatten)]
    pub overall: HitRate,
    pub label: String,
    pub splits: Splits,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropsReport {
    pub player_id: String,
    pub games_analyzed: usize,
    pub markets: BTreeMap<Market, MarketReport>,
}

/// A hit is a stat strictly above the line.
pub fn hit_rate(games: &[GameLog], market: Market, line: f64) -> HitRate {
    let window = extract_window(games, |_| true, games.len());
    window_hit_rate(&window, market, line)
}

fn window_hit_rate(window: &[&GameLog], market: Market, line: f64) -> HitRate {
    let sample = compute_rate(window, |g| g.stat(market) > line);
    HitRate {
        hit_rate: (sample.rate * 10.0).round() / 10.0,
        hits: sample.hits,
        total: sample.total,
        line,
        market,
    }
}

/// Every market at its override line, or the market default.
pub fn build_report(
    player_id: &str,
    games: &[GameLog],
    lines: &BTreeMap<Market, f64>,
) -> PropsReport {
    let all = extract_window(games, |_| true, games.len());
    let last5 = extract_window(games, |_| true, 5);
    let last10 = extract_window(games, |_| true, 10);
    let home = extract_window(games, |g| g.home, games.len());
    let away = extract_window(games, |g| !g.home, games.len());

    let markets = Market::ALL
        .iter()
        .map(|&market| {
            let line = lines
                .get(&market)
                .copied()
                .unwrap_or_else(|| market.default_line());
            let report = MarketReport {
                overall: window_hit_rate(&all, market, line),
                label: market.label().to_string(),
                splits: Splits {
                    last5: window_hit_rate(&last5, market, line),
                    last10: window_hit_rate(&last10, market, line),
                    home: window_hit_rate(&home, market, line),
                    away: window_hit_rate(&away, market, line),
                },
            };
            (market, report)
        })
        .collect();

    PropsReport {
        player_id: player_id.to_string(),
        games_analyzed: games.len(),
        markets,
    }
}

/// Source of raw game logs, newest first, at most `last_n` games.
#[async_trait]
pub trait GameLogProvider: Send + Sync {
    async fn game_logs(&self, player_id: &str, last_n: usize) -> anyhow::Result<Vec<GameLog>>;
}

pub struct PlayerPropsService<P> {
    provider: Arc<P>,
    fetcher: Arc<CachedFetcher>,
}

impl<P: GameLogProvider> PlayerPropsService<P> {
    pub fn new(provider: Arc<P>, fetcher: Arc<CachedFetcher>) -> Self {
        Self { provider, fetcher }
    }

    pub async fn game_logs(&self, player_id: &str, last_n: usize) -> Result<Vec<GameLog>, FetchError> {
        let key = format!("{player_id}:logs:{last_n}");
        self.fetcher
            .fetch(TtlClass::PlayerStats, &key, || {
                self.provider.game_logs(player_id, last_n)
            })
            .await
    }

    /// Report over the last `last_n` games, cached per player and line set.
    pub async fn report(
        &self,
        player_id: &str,
        lines: &BTreeMap<Market, f64>,
        last_n: usize,
    ) -> Result<PropsReport, FetchError> {
        let line_key = lines
            .iter()
            .map(|(m, l)| format!("{m}={l}"))
            .collect::<Vec<_>>()
            .join(",");
        let key = format!("{player_id}:report:{last_n}:{line_key}");
        self.fetcher
            .fetch(TtlClass::HitRates, &key, || async {
                let games = self.game_logs(player_id, last_n).await?;
                Ok::<_, anyhow::Error>(build_report(player_id, &games, lines))
            })
            .await
    }
}
