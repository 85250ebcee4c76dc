use serde::{Deserialize, Serialize};

use crate::history::{HistoricalRecord, ScoreField};
use crate::window::penalty_window;

/// Slump rule. It reads its own score line, independent of the factor
/// event: by default a slump is a run of full-time 0-0 results.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PenaltyConfig {
    pub field: ScoreField,
    pub run_length: usize,
    pub amount: u32,
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        Self {
            field: ScoreField::FullTime,
            run_length: 2,
            amount: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PenaltyOutcome {
    pub triggered: bool,
    pub reason_fragments: Vec<String>,
}

/// A side to inspect: its name and its full, unfiltered history.
#[derive(Debug, Clone, Copy)]
pub struct PenaltySide<'a> {
    pub team: &'a str,
    pub history: &'a [HistoricalRecord],
}

/// True when the newest `run_length` records all have a combined score of
/// exactly zero. Records without that score line break the run.
pub fn in_slump(history: &[HistoricalRecord], field: ScoreField, run_length: usize) -> bool {
    let Some(window) = penalty_window(history, run_length) else {
        return false;
    };
    window.iter().all(|r| r.combined(field) == Some(0))
}

pub fn evaluate_penalty(sides: &[PenaltySide<'_>], cfg: &PenaltyConfig) -> PenaltyOutcome {
    let mut out = PenaltyOutcome::default();
    for side in sides {
        if in_slump(side.history, cfg.field, cfg.run_length) {
            out.triggered = true;
            out.reason_fragments.push(format!(
                "{} scoreless in last {} {}",
                side.team,
                cfg.run_length,
                period_label(cfg.field)
            ));
        }
    }
    out
}

fn period_label(field: ScoreField) -> &'static str {
    match field {
        ScoreField::FullTime => "matches",
        ScoreField::FirstHalf => "first halves",
    }
}
