use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rate::RateSample;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierStep {
    pub min_rate: f64,
    pub points: u32,
}

/// Descending step table turning a rate into points. A rate lands on the
/// first step whose `min_rate` it reaches (`>=`); below every step it gets
/// `floor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTierTable", into = "RawTierTable")]
pub struct TierTable {
    steps: Vec<TierStep>,
    floor: u32,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TierTableError {
    #[error("tier table has no steps")]
    Empty,
    #[error("tier threshold {0} is outside 0..=100")]
    ThresholdOutOfRange(f64),
    #[error("tier thresholds must be strictly descending ({prev} then {next})")]
    NotDescending { prev: f64, next: f64 },
    #[error("tier points must not increase as thresholds fall ({prev} then {next})")]
    PointsIncrease { prev: u32, next: u32 },
}

impl TierTable {
    pub fn new(steps: Vec<TierStep>, floor: u32) -> Result<Self, TierTableError> {
        if steps.is_empty() {
            return Err(TierTableError::Empty);
        }
        for s in &steps {
            if !(0.0..=100.0).contains(&s.min_rate) {
                return Err(TierTableError::ThresholdOutOfRange(s.min_rate));
            }
        }
        for pair in steps.windows(2) {
            if pair[1].min_rate >= pair[0].min_rate {
                return Err(TierTableError::NotDescending {
                    prev: pair[0].min_rate,
                    next: pair[1].min_rate,
                });
            }
            if pair[1].points > pair[0].points {
                return Err(TierTableError::PointsIncrease {
                    prev: pair[0].points,
                    next: pair[1].points,
                });
            }
        }
        if let Some(last) = steps.last()
            && floor > last.points
        {
            return Err(TierTableError::PointsIncrease {
                prev: last.points,
                next: floor,
            });
        }
        Ok(Self { steps, floor })
    }

    /// `100→40, ≥80→32, ≥60→24, else 0`.
    pub fn forty_point() -> Self {
        Self::scaled(40)
    }

    /// `100→20, ≥80→16, ≥60→12, else 0`.
    pub fn twenty_point() -> Self {
        Self::scaled(20)
    }

    fn scaled(max: u32) -> Self {
        Self {
            steps: vec![
                TierStep {
                    min_rate: 100.0,
                    points: max,
                },
                TierStep {
                    min_rate: 80.0,
                    points: max * 4 / 5,
                },
                TierStep {
                    min_rate: 60.0,
                    points: max * 3 / 5,
                },
            ],
            floor: 0,
        }
    }

    pub fn points_for_rate(&self, rate: f64) -> u32 {
        self.steps
            .iter()
            .find(|s| rate >= s.min_rate)
            .map(|s| s.points)
            .unwrap_or(self.floor)
    }

    /// Points for a sample. No data scores nothing, whatever the floor.
    pub fn points(&self, sample: &RateSample) -> u32 {
        if sample.is_empty() {
            return 0;
        }
        self.points_for_rate(sample.rate)
    }
}

#[derive(Serialize, Deserialize)]
struct RawTierTable {
    steps: Vec<TierStep>,
    #[serde(default)]
    floor: u32,
}

impl TryFrom<RawTierTable> for TierTable {
    type Error = TierTableError;

    fn try_from(raw: RawTierTable) -> Result<Self, Self::Error> {
        TierTable::new(raw.steps, raw.floor)
    }
}

impl From<TierTable> for RawTierTable {
    fn from(t: TierTable) -> Self {
        Self {
            steps: t.steps,
            floor: t.floor,
        }
    }
}
