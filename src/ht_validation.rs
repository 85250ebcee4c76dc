//! Secondary first-half check against real match-detail payloads.
//!
//! The head-to-head feed sometimes lacks first-half scores, so a candidate
//! signal can be cross-checked against each side's recent match details.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::history::as_u32_any;
use crate::rate::RateSample;

pub const MIN_VALID_MATCHES: usize = 2;
pub const MIN_COMBINED_RATE: f64 = 60.0;

static HT_IN_RESULT: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\((\d+)-(\d+)\)").ok());

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HtValidation {
    pub passed: bool,
    pub home_rate: f64,
    pub away_rate: f64,
    pub combined_rate: f64,
    pub home_valid: usize,
    pub away_valid: usize,
    pub reason: String,
}

/// Total first-half goals in a match-detail payload, if any known shape
/// carries them.
pub fn extract_ht_goals(details: &Value) -> Option<u32> {
    if !details.is_object() {
        return None;
    }

    let home_ht = details.get("home_team").and_then(|t| t.get("score_1st_half"));
    let away_ht = details.get("away_team").and_then(|t| t.get("score_1st_half"));
    if let (Some(h), Some(a)) = (home_ht, away_ht) {
        return Some(lenient(h).saturating_add(lenient(a)));
    }

    if let Some(p1) = details.get("scoreboard").and_then(|sb| sb.get("period_1")) {
        return Some(field(p1, &["home"]).saturating_add(field(p1, &["away"])));
    }

    if let Some(periods) = details.get("periods").and_then(|p| p.as_array()) {
        let first = periods.iter().find(|p| {
            p.get("period").and_then(|n| n.as_u64()) == Some(1)
                || p.get("name").and_then(|n| n.as_str()) == Some("1st Half")
        });
        if let Some(p1) = first {
            let home = field(p1, &["home_score", "home"]);
            return Some(home.saturating_add(field(p1, &["away_score", "away"])));
        }
    }

    let result = details.get("result").and_then(|r| r.as_str())?;
    let caps = HT_IN_RESULT.as_ref()?.captures(result)?;
    let home: u32 = caps.get(1)?.as_str().parse().ok()?;
    let away: u32 = caps.get(2)?.as_str().parse().ok()?;
    Some(home.saturating_add(away))
}

pub fn validate_with_ht_scores(home_details: &[Value], away_details: &[Value]) -> HtValidation {
    let home = side_sample(home_details);
    let away = side_sample(away_details);
    let combined = (home.rate + away.rate) / 2.0;

    let enough_data = home.total >= MIN_VALID_MATCHES && away.total >= MIN_VALID_MATCHES;
    let above_threshold = combined >= MIN_COMBINED_RATE;

    let reason = if !enough_data {
        format!(
            "insufficient first-half data: home {}/{}, away {}/{}",
            home.total,
            home_details.len(),
            away.total,
            away_details.len()
        )
    } else {
        format!(
            "first-half goal rate {}: home {:.0}%, away {:.0}% (avg {:.0}%)",
            if above_threshold { "confirmed" } else { "too low" },
            home.rate,
            away.rate,
            combined
        )
    };

    HtValidation {
        passed: enough_data && above_threshold,
        home_rate: round1(home.rate),
        away_rate: round1(away.rate),
        combined_rate: round1(combined),
        home_valid: home.total,
        away_valid: away.total,
        reason,
    }
}

fn side_sample(details: &[Value]) -> RateSample {
    let goals: Vec<u32> = details.iter().filter_map(extract_ht_goals).collect();
    let hits = goals.iter().filter(|g| **g >= 1).count();
    RateSample::from_counts(hits, goals.len())
}

fn field(v: &Value, keys: &[&str]) -> u32 {
    keys.iter()
        .find_map(|k| v.get(*k).and_then(as_u32_any).filter(|n| *n > 0))
        .unwrap_or(0)
}

fn lenient(v: &Value) -> u32 {
    as_u32_any(v).unwrap_or(0)
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}
