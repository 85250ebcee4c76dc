use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use serde_json::Value;
use tracing::{info, warn};

use form_signals::cache::{CacheStore, CachedFetcher};
use form_signals::config::AppConfig;
use form_signals::history::{Fixture, HistoricalRecord, MatchupHistory};
use form_signals::history_store::{self, DEFAULT_HISTORY_LIMIT};
use form_signals::ht_validation::validate_with_ht_scores;
use form_signals::logging::init_tracing;
use form_signals::signal::{SignalConfig, compute_matchup_signal};
use form_signals::upstream::{CachedHistoryProvider, HistoryProvider, MatchDataClient};

const DETAILS_PER_SIDE: usize = 3;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let [match_id, home, away] = args.as_slice() else {
        return Err(anyhow!("usage: scan_match <match_id> <home> <away>"));
    };
    let fixture = Fixture::new(match_id.as_str(), home.as_str(), away.as_str());

    let cfg = AppConfig::from_env()?;
    cfg.require_api_key()?;
    cfg.cache.ttls.validate()?;
    let signal_cfg = SignalConfig::default();
    signal_cfg.validate()?;

    let store = Arc::new(CacheStore::connect(&cfg.cache).await);
    let fetcher = Arc::new(CachedFetcher::new(store.clone(), &cfg.cache));
    let client = Arc::new(MatchDataClient::new(cfg.upstream.clone())?);
    let provider = CachedHistoryProvider::new(client.clone(), fetcher);

    let db_path = cfg
        .history_db_path
        .clone()
        .or_else(history_store::default_db_path)
        .context("unable to resolve sqlite path")?;
    let mut conn = history_store::open_db(&db_path)?;

    let history = match provider.matchup_history(&fixture).await {
        Ok(history) => {
            let stored = history_store::upsert_records(&mut conn, &distinct_records(&history))?;
            info!(stored, db = %db_path.display(), "history persisted");
            history
        }
        Err(err) => {
            warn!(error = %err, "upstream history unavailable, using stored records");
            history_store::load_matchup(&conn, &fixture, DEFAULT_HISTORY_LIMIT)?
        }
    };

    let result = compute_matchup_signal(&fixture, &history, &signal_cfg);
    println!("{} vs {}", fixture.home, fixture.away);
    println!("Score: {} ({})", result.score, result.confidence);
    println!("Reason: {}", result.reason);

    if result.signal {
        let home_details = recent_details(&provider, &history.subject).await;
        let away_details = recent_details(&provider, &history.opponent).await;
        let check = validate_with_ht_scores(&home_details, &away_details);
        println!(
            "First-half check: {} ({})",
            if check.passed { "passed" } else { "failed" },
            check.reason
        );
    }

    store.shutdown();
    info!(requests = client.requests_used(), "upstream requests used today");
    Ok(())
}

fn distinct_records(history: &MatchupHistory) -> Vec<HistoricalRecord> {
    let mut out: Vec<HistoricalRecord> = Vec::new();
    for r in history.subject.iter().chain(&history.opponent) {
        if r.id.is_empty() || !out.iter().any(|o| o.id == r.id) {
            out.push(r.clone());
        }
    }
    out
}

async fn recent_details(
    provider: &CachedHistoryProvider<MatchDataClient>,
    records: &[HistoricalRecord],
) -> Vec<Value> {
    let mut out = Vec::new();
    for r in records
        .iter()
        .filter(|r| !r.id.is_empty())
        .take(DETAILS_PER_SIDE)
    {
        match provider.match_details(&r.id).await {
            Ok(details) => out.push(details),
            Err(err) => warn!(match_id = %r.id, error = %err, "match details unavailable"),
        }
    }
    out
}
