use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use form_signals::history::{Fixture, HistoricalRecord};
use form_signals::signal::{Factor, SignalConfig, SignalResult, compute_signal};

#[derive(Debug, serde::Deserialize)]
struct ScoreCase {
    fixture: Fixture,
    #[serde(default)]
    subject: Vec<HistoricalRecord>,
    #[serde(default)]
    opponent: Vec<HistoricalRecord>,
    #[serde(default)]
    head_to_head: Vec<HistoricalRecord>,
    #[serde(default)]
    config: Option<SignalConfig>,
}

fn main() -> Result<()> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let as_json = args.iter().any(|a| a == "--json");
    let path = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tests/fixtures/score_case.json"));

    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let case: ScoreCase = serde_json::from_str(&raw).context("parse score case")?;
    let cfg = case.config.unwrap_or_default();
    cfg.validate()?;

    // Offline: one case file in, one score out.
    let result = compute_signal(
        &case.fixture,
        &case.subject,
        &case.opponent,
        &case.head_to_head,
        &cfg,
    );

    if as_json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&case.fixture, &result);
    }
    Ok(())
}

fn print_result(fixture: &Fixture, result: &SignalResult) {
    println!("Fixture: {} vs {}", fixture.home, fixture.away);
    println!(
        "Score: {} ({}){}",
        result.score,
        result.confidence,
        if result.signal { " SIGNAL" } else { "" }
    );
    for factor in Factor::ALL {
        let Some(f) = result.factors.get(&factor) else {
            continue;
        };
        println!(
            "  {:<18} {:>5.1}% {:>2}/{:<2} +{}",
            factor.label(),
            f.rate,
            f.hits,
            f.sample_size,
            f.points
        );
    }
    if result.penalty.triggered {
        for fragment in &result.penalty.reason_fragments {
            println!("  penalty: {fragment}");
        }
    }
    println!("Reason: {}", result.reason);
}
