use crate::history::{HistoricalRecord, ScoreField, Venue};

/// Which of a subject's records feed a factor window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VenueFilter<'a> {
    Any,
    HomeOf(&'a str),
    AwayOf(&'a str),
}

impl VenueFilter<'_> {
    pub fn accepts(&self, record: &HistoricalRecord) -> bool {
        match *self {
            VenueFilter::Any => true,
            VenueFilter::HomeOf(team) => record.venue_of(team) == Some(Venue::Home),
            VenueFilter::AwayOf(team) => record.venue_of(team) == Some(Venue::Away),
        }
    }
}

/// First `max_window` items of `history` accepted by `keep`, in their
/// original (newest-first) order.
pub fn extract_window<'a, T>(
    history: &'a [T],
    keep: impl Fn(&T) -> bool,
    max_window: usize,
) -> Vec<&'a T> {
    history.iter().filter(|r| keep(*r)).take(max_window).collect()
}

/// Factor window: records accepted by `filter` that carry the `field` score
/// line. Records without it are skipped, so they never count as misses.
pub fn venue_window<'a>(
    history: &'a [HistoricalRecord],
    filter: VenueFilter<'_>,
    field: ScoreField,
    max_window: usize,
) -> Vec<&'a HistoricalRecord> {
    extract_window(
        history,
        |r| filter.accepts(r) && r.score(field).is_some(),
        max_window,
    )
}

/// Unfiltered newest-first slice used by the penalty check. Returns `None`
/// when fewer than `run_length` records exist.
pub fn penalty_window<T>(history: &[T], run_length: usize) -> Option<&[T]> {
    if run_length == 0 || history.len() < run_length {
        return None;
    }
    Some(&history[..run_length])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::ScoreLine;

    fn rec(home: &str, away: &str) -> HistoricalRecord {
        HistoricalRecord {
            id: format!("{home}-{away}"),
            played_at: None,
            home: home.to_string(),
            away: away.to_string(),
            neutral: false,
            full_time: Some(ScoreLine::new(1, 0)),
            first_half: None,
        }
    }

    #[test]
    fn venue_filter_keeps_order_and_caps_size() {
        let history = vec![
            rec("A", "X1"),
            rec("X2", "A"),
            rec("A", "X3"),
            rec("A", "X4"),
            rec("A", "X5"),
        ];
        let ft = ScoreField::FullTime;
        let w = venue_window(&history, VenueFilter::HomeOf("A"), ft, 2);
        let ids: Vec<&str> = w.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["A-X1", "A-X3"]);

        let away = venue_window(&history, VenueFilter::AwayOf("A"), ft, 8);
        assert_eq!(away.len(), 1);
        assert_eq!(venue_window(&history, VenueFilter::Any, ft, 8).len(), 5);
    }

    #[test]
    fn records_without_the_score_line_are_skipped() {
        let mut history = vec![rec("A", "X1"), rec("A", "X2"), rec("A", "X3")];
        history[0].first_half = Some(ScoreLine::new(0, 0));
        history[2].first_half = Some(ScoreLine::new(1, 0));

        let w = venue_window(&history, VenueFilter::HomeOf("A"), ScoreField::FirstHalf, 8);
        let ids: Vec<&str> = w.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["A-X1", "A-X3"]);
        assert!(venue_window(&history[1..2], VenueFilter::Any, ScoreField::FirstHalf, 8).is_empty());
    }

    #[test]
    fn short_history_has_no_penalty_window() {
        let history = vec![rec("A", "B")];
        assert!(penalty_window(&history, 2).is_none());
        assert!(penalty_window::<HistoricalRecord>(&[], 2).is_none());
        let history = vec![rec("A", "B"), rec("A", "C"), rec("A", "D")];
        let w = penalty_window(&history, 2).expect("window");
        assert_eq!(w.len(), 2);
        assert_eq!(w[0].away, "B");
    }
}
