use serde::{Deserialize, Serialize};

/// Share of a window satisfying a predicate, as a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateSample {
    pub hits: usize,
    pub total: usize,
    pub rate: f64,
}

impl RateSample {
    pub const EMPTY: RateSample = RateSample {
        hits: 0,
        total: 0,
        rate: 0.0,
    };

    pub fn from_counts(hits: usize, total: usize) -> Self {
        if total == 0 {
            return Self::EMPTY;
        }
        // Multiply first so exact tier boundaries (60, 80, 100) stay exact.
        let rate = (hits as f64 * 100.0) / total as f64;
        Self { hits, total, rate }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

pub fn compute_rate<T>(window: &[&T], hit: impl Fn(&T) -> bool) -> RateSample {
    let hits = window.iter().filter(|r| hit(**r)).count();
    RateSample::from_counts(hits, window.len())
}
