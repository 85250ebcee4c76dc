use std::collections::BTreeMap;
use std::fmt;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::history::{Fixture, HistoricalRecord, MatchupHistory, ScoreField};
use crate::penalty::{PenaltyConfig, PenaltyOutcome, PenaltySide, evaluate_penalty};
use crate::rate::{RateSample, compute_rate};
use crate::tiers::TierTable;
use crate::window::{VenueFilter, venue_window};

pub const SCORE_MIN: i64 = 0;
pub const SCORE_MAX: i64 = 100;

/// What counts as a "hit" for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRule {
    pub field: ScoreField,
    pub min_combined: u32,
}

impl Default for EventRule {
    // First half over 0.5.
    fn default() -> Self {
        Self {
            field: ScoreField::FirstHalf,
            min_combined: 1,
        }
    }
}

impl EventRule {
    pub fn qualifies(&self, record: &HistoricalRecord) -> bool {
        record
            .combined(self.field)
            .is_some_and(|total| total >= self.min_combined)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceThresholds {
    pub high: u8,
    pub medium: u8,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            high: 80,
            medium: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    pub fn from_score(score: u8, thresholds: &ConfidenceThresholds) -> Self {
        if score >= thresholds.high {
            ConfidenceTier::High
        } else if score >= thresholds.medium {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConfidenceTier::Low => "LOW",
            ConfidenceTier::Medium => "MEDIUM",
            ConfidenceTier::High => "HIGH",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Factor {
    SubjectVenue,
    OpponentVenue,
    HeadToHead,
}

impl Factor {
    pub const ALL: [Factor; 3] = [
        Factor::SubjectVenue,
        Factor::OpponentVenue,
        Factor::HeadToHead,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Factor::SubjectVenue => "Home at home",
            Factor::OpponentVenue => "Away on the road",
            Factor::HeadToHead => "H2H",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorResult {
    pub rate: f64,
    pub hits: usize,
    pub sample_size: usize,
    pub points: u32,
}

impl FactorResult {
    pub fn from_sample(sample: RateSample, table: &TierTable) -> Self {
        Self {
            rate: sample.rate,
            hits: sample.hits,
            sample_size: sample.total,
            points: table.points(&sample),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub event: EventRule,
    pub subject_window: usize,
    pub opponent_window: usize,
    pub h2h_window: usize,
    pub subject_tiers: TierTable,
    pub opponent_tiers: TierTable,
    pub h2h_tiers: TierTable,
    pub penalty: PenaltyConfig,
    pub thresholds: ConfidenceThresholds,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            event: EventRule::default(),
            subject_window: 8,
            opponent_window: 8,
            h2h_window: 5,
            subject_tiers: TierTable::forty_point(),
            opponent_tiers: TierTable::forty_point(),
            h2h_tiers: TierTable::twenty_point(),
            penalty: PenaltyConfig::default(),
            thresholds: ConfidenceThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalConfigError {
    #[error("window size for {0} must be at least 1")]
    EmptyWindow(&'static str),
    #[error("penalty run length must be at least 1")]
    EmptyPenaltyRun,
    #[error("confidence thresholds must satisfy medium <= high <= 100 (got {medium}/{high})")]
    Thresholds { medium: u8, high: u8 },
}

impl SignalConfig {
    pub fn validate(&self) -> Result<(), SignalConfigError> {
        for (name, size) in [
            ("subject venue", self.subject_window),
            ("opponent venue", self.opponent_window),
            ("head to head", self.h2h_window),
        ] {
            if size == 0 {
                return Err(SignalConfigError::EmptyWindow(name));
            }
        }
        if self.penalty.run_length == 0 {
            return Err(SignalConfigError::EmptyPenaltyRun);
        }
        let t = self.thresholds;
        if t.medium > t.high || t.high > 100 {
            return Err(SignalConfigError::Thresholds {
                medium: t.medium,
                high: t.high,
            });
        }
        Ok(())
    }

    fn table(&self, factor: Factor) -> &TierTable {
        match factor {
            Factor::SubjectVenue => &self.subject_tiers,
            Factor::OpponentVenue => &self.opponent_tiers,
            Factor::HeadToHead => &self.h2h_tiers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalResult {
    pub score: u8,
    pub signal: bool,
    pub confidence: ConfidenceTier,
    pub factors: BTreeMap<Factor, FactorResult>,
    pub penalty: PenaltyOutcome,
    pub reason: String,
}

/// Scores one fixture from the three history slices. Pure: no I/O, no
/// shared state.
pub fn compute_signal(
    fixture: &Fixture,
    subject_history: &[HistoricalRecord],
    opponent_history: &[HistoricalRecord],
    h2h_history: &[HistoricalRecord],
    cfg: &SignalConfig,
) -> SignalResult {
    let hit = |r: &HistoricalRecord| cfg.event.qualifies(r);

    let field = cfg.event.field;

    let subject = venue_window(
        subject_history,
        VenueFilter::HomeOf(&fixture.home),
        field,
        cfg.subject_window,
    );
    let opponent = venue_window(
        opponent_history,
        VenueFilter::AwayOf(&fixture.away),
        field,
        cfg.opponent_window,
    );
    let h2h = venue_window(h2h_history, VenueFilter::Any, field, cfg.h2h_window);

    let mut factors = BTreeMap::new();
    for (factor, window) in [
        (Factor::SubjectVenue, &subject),
        (Factor::OpponentVenue, &opponent),
        (Factor::HeadToHead, &h2h),
    ] {
        let sample = compute_rate(window, &hit);
        factors.insert(factor, FactorResult::from_sample(sample, cfg.table(factor)));
    }

    let penalty = evaluate_penalty(
        &[
            PenaltySide {
                team: &fixture.home,
                history: subject_history,
            },
            PenaltySide {
                team: &fixture.away,
                history: opponent_history,
            },
        ],
        &cfg.penalty,
    );

    aggregate(factors, penalty, cfg)
}

pub fn compute_matchup_signal(
    fixture: &Fixture,
    history: &MatchupHistory,
    cfg: &SignalConfig,
) -> SignalResult {
    compute_signal(
        fixture,
        &history.subject,
        &history.opponent,
        &history.head_to_head,
        cfg,
    )
}

/// Scores many fixtures in parallel. Output order follows input order.
pub fn compute_signals(
    inputs: &[(Fixture, MatchupHistory)],
    cfg: &SignalConfig,
) -> Vec<SignalResult> {
    inputs
        .par_iter()
        .map(|(fixture, history)| compute_matchup_signal(fixture, history, cfg))
        .collect()
}

/// Sum of factor points, minus the penalty once, clamped to 0..=100.
pub fn clamp_score(
    points: impl IntoIterator<Item = u32>,
    penalty: &PenaltyOutcome,
    amount: u32,
) -> u8 {
    let mut raw: i64 = points.into_iter().map(i64::from).sum();
    if penalty.triggered {
        raw -= i64::from(amount);
    }
    raw.clamp(SCORE_MIN, SCORE_MAX) as u8
}

pub fn aggregate(
    factors: BTreeMap<Factor, FactorResult>,
    penalty: PenaltyOutcome,
    cfg: &SignalConfig,
) -> SignalResult {
    let score = clamp_score(factors.values().map(|f| f.points), &penalty, cfg.penalty.amount);
    let confidence = ConfidenceTier::from_score(score, &cfg.thresholds);
    let reason = explain(&factors, &penalty, cfg.penalty.amount);

    SignalResult {
        score,
        signal: score >= cfg.thresholds.high,
        confidence,
        factors,
        penalty,
        reason,
    }
}

fn explain(
    factors: &BTreeMap<Factor, FactorResult>,
    penalty: &PenaltyOutcome,
    amount: u32,
) -> String {
    let parts: Vec<String> = Factor::ALL
        .iter()
        .filter_map(|f| factors.get(f).map(|r| (f, r)))
        .map(|(f, r)| {
            if r.sample_size == 0 {
                format!("{}: no data", f.label())
            } else {
                format!(
                    "{}: {:.0}% ({}/{}) +{}",
                    f.label(),
                    r.rate,
                    r.hits,
                    r.sample_size,
                    r.points
                )
            }
        })
        .collect();
    let mut out = parts.join(", ");
    if penalty.triggered {
        out.push_str(&format!(
            ". Penalty -{amount}: {}",
            penalty.reason_fragments.join("; ")
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factor(points: u32) -> FactorResult {
        FactorResult {
            rate: 0.0,
            hits: 0,
            sample_size: 1,
            points,
        }
    }

    #[test]
    fn penalty_applies_once_and_clamps_at_zero() {
        let both = PenaltyOutcome {
            triggered: true,
            reason_fragments: vec!["A".into(), "B".into()],
        };
        assert_eq!(clamp_score([32, 40, 20], &both, 30), 62);
        assert_eq!(clamp_score([10, 0, 0], &both, 30), 0);
        assert_eq!(clamp_score([80, 80], &PenaltyOutcome::default(), 30), 100);
    }

    #[test]
    fn tiers_follow_thresholds() {
        let t = ConfidenceThresholds::default();
        assert_eq!(ConfidenceTier::from_score(80, &t), ConfidenceTier::High);
        assert_eq!(ConfidenceTier::from_score(79, &t), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_score(60, &t), ConfidenceTier::Medium);
        assert_eq!(ConfidenceTier::from_score(59, &t), ConfidenceTier::Low);
    }

    #[test]
    fn penalty_demotes_high_to_medium() {
        let cfg = SignalConfig::default();
        let factors = BTreeMap::from([
            (Factor::SubjectVenue, factor(40)),
            (Factor::OpponentVenue, factor(40)),
            (Factor::HeadToHead, factor(20)),
        ]);
        let penalty = PenaltyOutcome {
            triggered: true,
            reason_fragments: vec!["A scoreless".into()],
        };
        let r = aggregate(factors, penalty, &cfg);
        assert_eq!(r.score, 70);
        assert!(!r.signal);
        assert_eq!(r.confidence, ConfidenceTier::Medium);
        assert!(r.reason.ends_with("Penalty -30: A scoreless"));
    }

    #[test]
    fn validate_rejects_bad_config() {
        let mut cfg = SignalConfig::default();
        assert!(cfg.validate().is_ok());
        cfg.h2h_window = 0;
        assert_eq!(
            cfg.validate(),
            Err(SignalConfigError::EmptyWindow("head to head"))
        );
        let mut cfg = SignalConfig::default();
        cfg.thresholds.medium = 90;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn config_deserializes_partial_overrides() {
        let cfg: SignalConfig = serde_json::from_str(r#"{"h2h_window": 3}"#).unwrap();
        assert_eq!(cfg.h2h_window, 3);
        assert_eq!(cfg.subject_window, 8);
        assert_eq!(cfg.subject_tiers, TierTable::forty_point());
    }
}
