use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use std::{env, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEFAULT_UPSTREAM_BASE_URL: &str = "https://flashscore4.p.rapidapi.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Resource categories, each cached with its own TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlClass {
    Games,
    PlayerStats,
    HitRates,
    Roster,
    MatchHistory,
    MatchDetails,
}

impl TtlClass {
    pub const ALL: [TtlClass; 6] = [
        TtlClass::Games,
        TtlClass::PlayerStats,
        TtlClass::HitRates,
        TtlClass::Roster,
        TtlClass::MatchHistory,
        TtlClass::MatchDetails,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TtlClass::Games => "games",
            TtlClass::PlayerStats => "player_stats",
            TtlClass::HitRates => "hit_rates",
            TtlClass::Roster => "roster",
            TtlClass::MatchHistory => "match_history",
            TtlClass::MatchDetails => "match_details",
        }
    }

    fn env_key(&self) -> &'static str {
        match self {
            TtlClass::Games => "CACHE_TTL_GAMES_SECS",
            TtlClass::PlayerStats => "CACHE_TTL_PLAYER_STATS_SECS",
            TtlClass::HitRates => "CACHE_TTL_HIT_RATES_SECS",
            TtlClass::Roster => "CACHE_TTL_ROSTER_SECS",
            TtlClass::MatchHistory => "CACHE_TTL_MATCH_HISTORY_SECS",
            TtlClass::MatchDetails => "CACHE_TTL_MATCH_DETAILS_SECS",
        }
    }
}

impl fmt::Display for TtlClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub games: Duration,
    pub player_stats: Duration,
    pub hit_rates: Duration,
    pub roster: Duration,
    pub match_history: Duration,
    pub match_details: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            games: Duration::from_secs(300),
            player_stats: Duration::from_secs(3600),
            hit_rates: Duration::from_secs(1800),
            roster: Duration::from_secs(86400),
            match_history: Duration::from_secs(21600),
            match_details: Duration::from_secs(86400),
        }
    }
}

impl CacheTtls {
    pub fn ttl(&self, class: TtlClass) -> Duration {
        match class {
            TtlClass::Games => self.games,
            TtlClass::PlayerStats => self.player_stats,
            TtlClass::HitRates => self.hit_rates,
            TtlClass::Roster => self.roster,
            TtlClass::MatchHistory => self.match_history,
            TtlClass::MatchDetails => self.match_details,
        }
    }

    fn slot(&mut self, class: TtlClass) -> &mut Duration {
        match class {
            TtlClass::Games => &mut self.games,
            TtlClass::PlayerStats => &mut self.player_stats,
            TtlClass::HitRates => &mut self.hit_rates,
            TtlClass::Roster => &mut self.roster,
            TtlClass::MatchHistory => &mut self.match_history,
            TtlClass::MatchDetails => &mut self.match_details,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let mut ttls = Self::default();
        for class in TtlClass::ALL {
            let default_secs = ttls.ttl(class).as_secs();
            let secs = parse_or(class.env_key(), default_secs)?;
            *ttls.slot(class) = Duration::from_secs(secs);
        }
        ttls.validate()?;
        Ok(ttls)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for class in TtlClass::ALL {
            if self.ttl(class).as_secs() == 0 {
                return Err(ConfigError::Invalid {
                    name: class.env_key(),
                    reason: "ttl must be at least one second".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub redis_url: Option<String>,
    pub connect_timeout: Duration,
    pub namespace: String,
    pub single_flight: bool,
    pub ttls: CacheTtls,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            connect_timeout: Duration::from_millis(2000),
            namespace: "signals".to_string(),
            single_flight: true,
            ttls: CacheTtls::default(),
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let namespace = env::var("CACHE_NAMESPACE").unwrap_or_else(|_| "signals".to_string());
        if namespace.trim().is_empty() {
            return Err(ConfigError::Invalid {
                name: "CACHE_NAMESPACE",
                reason: "must not be blank".to_string(),
            });
        }
        Ok(Self {
            redis_url: opt_env("CACHE_REDIS_URL"),
            connect_timeout: Duration::from_millis(parse_or("CACHE_CONNECT_TIMEOUT_MS", 2000)?),
            namespace,
            single_flight: parse_bool("CACHE_SINGLE_FLIGHT", true)?,
            ttls: CacheTtls::from_env()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub daily_limit: u32,
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_UPSTREAM_BASE_URL.to_string(),
            api_key: None,
            daily_limit: 2000,
            max_retries: 3,
            backoff_base: Duration::from_millis(2000),
            timeout: Duration::from_millis(10_000),
        }
    }
}

impl UpstreamConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = opt_env("UPSTREAM_BASE_URL")
            .unwrap_or_else(|| DEFAULT_UPSTREAM_BASE_URL.to_string());
        if !base_url.starts_with("http") {
            return Err(ConfigError::Invalid {
                name: "UPSTREAM_BASE_URL",
                reason: format!("not an http(s) url: {base_url}"),
            });
        }
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: opt_env("UPSTREAM_API_KEY"),
            daily_limit: parse_or("UPSTREAM_DAILY_LIMIT", 2000)?,
            max_retries: parse_or("UPSTREAM_MAX_RETRIES", 3)?,
            backoff_base: Duration::from_millis(parse_or("UPSTREAM_BACKOFF_BASE_MS", 2000)?),
            timeout: Duration::from_millis(parse_or("UPSTREAM_TIMEOUT_MS", 10_000)?),
        })
    }

    /// Host header value derived from the base url.
    pub fn host(&self) -> &str {
        let rest = self
            .base_url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.base_url);
        rest.split('/').next().unwrap_or(rest)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub upstream: UpstreamConfig,
    pub history_db_path: Option<PathBuf>,
}

impl AppConfig {
    /// Loads `.env` if present, then reads every setting from the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Ok(Self {
            cache: CacheConfig::from_env()?,
            upstream: UpstreamConfig::from_env()?,
            history_db_path: opt_env("HISTORY_DB_PATH").map(PathBuf::from),
        })
    }

    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.upstream
            .api_key
            .as_deref()
            .ok_or(ConfigError::Missing("UPSTREAM_API_KEY"))
    }
}

fn opt_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_or<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match opt_env(name) {
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_bool(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    let Some(raw) = opt_env(name) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Invalid {
            name,
            reason: format!("expected a boolean, got {other}"),
        }),
    }
}
