use std::fs;
use std::path::PathBuf;

use proptest::prelude::*;

use form_signals::history::{
    Fixture, HistoricalRecord, MatchupHistory, ScoreLine, parse_history_sections, split_matchup,
};
use form_signals::signal::{
    ConfidenceTier, Factor, SignalConfig, compute_matchup_signal, compute_signal, compute_signals,
};
use form_signals::tiers::TierTable;

fn rec(id: &str, home: &str, away: &str, ht: Option<(u32, u32)>) -> HistoricalRecord {
    HistoricalRecord {
        id: id.to_string(),
        played_at: None,
        home: home.to_string(),
        away: away.to_string(),
        neutral: false,
        full_time: None,
        first_half: ht.map(|(h, a)| ScoreLine::new(h, a)),
    }
}

fn home_games(team: &str, hts: &[(u32, u32)]) -> Vec<HistoricalRecord> {
    hts.iter()
        .enumerate()
        .map(|(i, ht)| rec(&format!("{team}-h{i}"), team, "Other", Some(*ht)))
        .collect()
}

fn away_games(team: &str, hts: &[(u32, u32)]) -> Vec<HistoricalRecord> {
    hts.iter()
        .enumerate()
        .map(|(i, ht)| rec(&format!("{team}-a{i}"), "Other", team, Some(*ht)))
        .collect()
}

fn goalless_at_full_time(mut records: Vec<HistoricalRecord>) -> Vec<HistoricalRecord> {
    for r in &mut records {
        r.full_time = Some(ScoreLine::new(0, 0));
    }
    records
}

fn meetings(hts: &[(u32, u32)]) -> Vec<HistoricalRecord> {
    hts.iter()
        .enumerate()
        .map(|(i, ht)| rec(&format!("m{i}"), "Alpha", "Beta", Some(*ht)))
        .collect()
}

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn fixture() -> Fixture {
    Fixture::new("f1", "Alpha", "Beta")
}

#[test]
fn all_hits_without_slump_is_a_full_signal() {
    let subject = home_games("Alpha", &[(1, 0); 5]);
    let opponent = away_games("Beta", &[(0, 1); 5]);
    let h2h = meetings(&[(1, 1); 5]);

    let r = compute_signal(&fixture(), &subject, &opponent, &h2h, &SignalConfig::default());
    assert_eq!(r.score, 100);
    assert!(r.signal);
    assert_eq!(r.confidence, ConfidenceTier::High);
    assert!(!r.penalty.triggered);
    assert_eq!(r.factors[&Factor::SubjectVenue].points, 40);
    assert_eq!(r.factors[&Factor::OpponentVenue].points, 40);
    assert_eq!(r.factors[&Factor::HeadToHead].points, 20);
}

#[test]
fn all_misses_score_zero() {
    let subject = home_games("Alpha", &[(0, 0); 5]);
    let opponent = away_games("Beta", &[(0, 0); 5]);
    let h2h = meetings(&[(0, 0); 5]);

    let r = compute_signal(&fixture(), &subject, &opponent, &h2h, &SignalConfig::default());
    assert_eq!(r.score, 0);
    assert!(!r.signal);
    assert_eq!(r.confidence, ConfidenceTier::Low);
    assert!(r.factors.values().all(|f| f.points == 0));
}

#[test]
fn slump_penalty_overrides_strong_form() {
    let raw = read_fixture("score_case.json");
    let case: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let fixture: Fixture = serde_json::from_value(case["fixture"].clone()).unwrap();
    let history: MatchupHistory = serde_json::from_value(serde_json::json!({
        "subject": case["subject"],
        "opponent": case["opponent"],
        "head_to_head": case["head_to_head"],
    }))
    .unwrap();

    let r = compute_matchup_signal(&fixture, &history, &SignalConfig::default());
    assert_eq!(r.factors[&Factor::SubjectVenue].points, 32);
    assert_eq!(r.factors[&Factor::OpponentVenue].points, 40);
    assert_eq!(r.factors[&Factor::HeadToHead].points, 20);
    assert!(r.penalty.triggered);
    assert_eq!(r.score, 62);
    assert!(!r.signal);
    assert_eq!(r.confidence, ConfidenceTier::Medium);
    assert_eq!(r.penalty.reason_fragments, ["Alpha scoreless in last 2 matches"]);
    assert!(r.reason.contains("Penalty -30"));
}

#[test]
fn both_sides_in_slump_still_cost_one_penalty() {
    let mut subject = goalless_at_full_time(away_games("Alpha", &[(0, 0), (0, 0)]));
    subject.extend(home_games("Alpha", &[(1, 0); 5]));
    let mut opponent = goalless_at_full_time(home_games("Beta", &[(0, 0), (0, 0)]));
    opponent.extend(away_games("Beta", &[(1, 0); 5]));
    let h2h = meetings(&[(1, 0); 5]);

    let r = compute_signal(&fixture(), &subject, &opponent, &h2h, &SignalConfig::default());
    assert_eq!(r.penalty.reason_fragments.len(), 2);
    assert_eq!(r.score, 70);
}

#[test]
fn venue_filter_skips_wrong_side_records() {
    // Newest records are away games; only home games feed the subject factor.
    let mut subject = away_games("Alpha", &[(0, 1); 10]);
    subject.extend(home_games("Alpha", &[(0, 0); 8]));
    let r = compute_signal(&fixture(), &subject, &[], &[], &SignalConfig::default());
    let f = r.factors[&Factor::SubjectVenue];
    assert_eq!((f.hits, f.sample_size, f.points), (0, 8, 0));
}

#[test]
fn names_match_case_insensitively_after_trim() {
    let subject = home_games(" alpha ", &[(1, 0); 5]);
    let r = compute_signal(&fixture(), &subject, &[], &[], &SignalConfig::default());
    assert_eq!(r.factors[&Factor::SubjectVenue].sample_size, 5);
}

#[test]
fn records_missing_the_event_line_stay_out_of_the_window() {
    let subject = vec![
        rec("1", "Alpha", "X", None),
        rec("2", "Alpha", "X", None),
        rec("3", "Alpha", "X", Some((1, 0))),
    ];
    let r = compute_signal(&fixture(), &subject, &[], &[], &SignalConfig::default());
    let f = r.factors[&Factor::SubjectVenue];
    assert_eq!((f.hits, f.sample_size, f.points), (1, 1, 40));
    assert!(!r.penalty.triggered);

    let unscored = vec![rec("1", "Alpha", "X", None), rec("2", "Alpha", "X", None)];
    let r = compute_signal(&fixture(), &unscored, &[], &[], &SignalConfig::default());
    assert_eq!(r.factors[&Factor::SubjectVenue].sample_size, 0);
    assert!(r.reason.starts_with("Home at home: no data"));
}

#[test]
fn first_half_zero_zero_alone_is_not_a_slump() {
    let mut subject = home_games("Alpha", &[(0, 0), (0, 0)]);
    for r in &mut subject {
        r.full_time = Some(ScoreLine::new(2, 1));
    }
    let r = compute_signal(&fixture(), &subject, &[], &[], &SignalConfig::default());
    assert!(!r.penalty.triggered);
    assert_eq!(r.factors[&Factor::SubjectVenue].sample_size, 2);
}

#[test]
fn full_time_only_payload_reports_no_data_by_default() {
    let payload: serde_json::Value =
        serde_json::from_str(&read_fixture("h2h_full_time_only.json")).unwrap();
    let records = parse_history_sections(&payload);
    assert_eq!(records.len(), 6);
    let history = split_matchup(&records, &fixture());

    let r = compute_matchup_signal(&fixture(), &history, &SignalConfig::default());
    assert_eq!(r.score, 0);
    assert!(r.factors.values().all(|f| f.sample_size == 0));
    assert_eq!(
        r.reason,
        "Home at home: no data, Away on the road: no data, H2H: no data"
    );
    assert!(!r.penalty.triggered);

    // The same payload scores on a full-time rule (over 2.5 goals).
    let cfg: SignalConfig =
        serde_json::from_str(r#"{ "event": { "field": "full_time", "min_combined": 3 } }"#)
            .unwrap();
    let r = compute_matchup_signal(&fixture(), &history, &cfg);
    let subject = r.factors[&Factor::SubjectVenue];
    assert_eq!((subject.hits, subject.sample_size, subject.points), (2, 3, 24));
    let opponent = r.factors[&Factor::OpponentVenue];
    assert_eq!((opponent.hits, opponent.sample_size, opponent.points), (2, 3, 24));
    let h2h = r.factors[&Factor::HeadToHead];
    assert_eq!((h2h.hits, h2h.sample_size, h2h.points), (2, 5, 0));
    assert_eq!(r.score, 48);
}

#[test]
fn oversized_scores_count_as_hits_without_overflow() {
    let subject = home_games("Alpha", &[(u32::MAX, 1), (1, u32::MAX)]);
    let r = compute_signal(&fixture(), &subject, &[], &[], &SignalConfig::default());
    let f = r.factors[&Factor::SubjectVenue];
    assert_eq!((f.hits, f.sample_size, f.points), (2, 2, 40));
}

#[test]
fn empty_histories_score_zero_without_data() {
    let r = compute_signal(&fixture(), &[], &[], &[], &SignalConfig::default());
    assert_eq!(r.score, 0);
    assert!(r.reason.contains("no data"));
    assert!(!r.penalty.triggered);
}

#[test]
fn repeated_scoring_is_identical() {
    let subject = home_games("Alpha", &[(1, 0), (0, 0), (1, 1), (0, 2), (3, 0)]);
    let opponent = away_games("Beta", &[(0, 0), (1, 0), (1, 0), (0, 0), (0, 1)]);
    let h2h = meetings(&[(1, 0), (0, 0), (0, 1)]);
    let cfg = SignalConfig::default();
    let a = compute_signal(&fixture(), &subject, &opponent, &h2h, &cfg);
    let b = compute_signal(&fixture(), &subject, &opponent, &h2h, &cfg);
    assert_eq!(a, b);
}

#[test]
fn batch_matches_sequential_scoring() {
    let cfg = SignalConfig::default();
    let inputs: Vec<(Fixture, MatchupHistory)> = (0..24)
        .map(|i| {
            let hits = (i % 6) as usize;
            let mut hts = vec![(1, 0); hits];
            hts.resize(5, (0, 0));
            let history = MatchupHistory {
                subject: home_games("Alpha", &hts),
                opponent: away_games("Beta", &hts),
                head_to_head: meetings(&hts),
            };
            (Fixture::new(i.to_string(), "Alpha", "Beta"), history)
        })
        .collect();

    let batch = compute_signals(&inputs, &cfg);
    let sequential: Vec<_> = inputs
        .iter()
        .map(|(f, h)| compute_matchup_signal(f, h, &cfg))
        .collect();
    assert_eq!(batch, sequential);
}

#[test]
fn custom_tables_and_full_time_rule_are_honoured() {
    let cfg: SignalConfig = serde_json::from_str(
        r#"{
            "event": { "field": "full_time", "min_combined": 3 },
            "h2h_tiers": { "steps": [ { "min_rate": 50.0, "points": 10 } ], "floor": 0 }
        }"#,
    )
    .unwrap();
    let mut h2h = meetings(&[(0, 0); 4]);
    for (i, r) in h2h.iter_mut().enumerate() {
        r.full_time = Some(if i < 2 { ScoreLine::new(2, 1) } else { ScoreLine::new(1, 0) });
    }
    let r = compute_signal(&fixture(), &[], &[], &h2h, &cfg);
    assert_eq!(r.factors[&Factor::HeadToHead].rate, 50.0);
    assert_eq!(r.factors[&Factor::HeadToHead].points, 10);
    assert_eq!(cfg.subject_tiers, TierTable::forty_point());
}

fn ht_strategy() -> impl Strategy<Value = Option<(u32, u32)>> {
    prop_oneof![
        1 => Just(None),
        4 => (0u32..3, 0u32..3).prop_map(Some),
    ]
}

fn history_strategy(team: &'static str) -> impl Strategy<Value = Vec<HistoricalRecord>> {
    prop::collection::vec((any::<bool>(), ht_strategy()), 0..14).prop_map(move |items| {
        items
            .into_iter()
            .enumerate()
            .map(|(i, (at_home, ht))| {
                let id = format!("{team}{i}");
                if at_home {
                    rec(&id, team, "Other", ht)
                } else {
                    rec(&id, "Other", team, ht)
                }
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn score_stays_in_range(
        subject in history_strategy("Alpha"),
        opponent in history_strategy("Beta"),
        h2h in prop::collection::vec(ht_strategy(), 0..7),
    ) {
        let h2h = meetings(&h2h.into_iter().map(|ht| ht.unwrap_or((0, 0))).collect::<Vec<_>>());
        let r = compute_signal(&fixture(), &subject, &opponent, &h2h, &SignalConfig::default());
        prop_assert!(r.score <= 100);
        prop_assert_eq!(r.signal, r.score >= 80);
        let raw: u32 = r.factors.values().map(|f| f.points).sum();
        let expected = if r.penalty.triggered { raw.saturating_sub(30) } else { raw }.min(100);
        prop_assert_eq!(u32::from(r.score), expected);
    }

    #[test]
    fn tier_points_are_monotonic(a in 0.0f64..=100.0, b in 0.0f64..=100.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        for table in [TierTable::forty_point(), TierTable::twenty_point()] {
            prop_assert!(table.points_for_rate(lo) <= table.points_for_rate(hi));
        }
    }

    #[test]
    fn more_hits_never_lower_a_factor(hits in 0usize..=8, extra in 0usize..=8) {
        let more = (hits + extra).min(8);
        let window = |n: usize| {
            let mut hts = vec![(1, 0); n];
            hts.resize(8, (0, 0));
            home_games("Alpha", &hts)
        };
        let cfg = SignalConfig::default();
        let base = compute_signal(&fixture(), &window(hits), &[], &[], &cfg);
        let better = compute_signal(&fixture(), &window(more), &[], &[], &cfg);
        prop_assert!(
            better.factors[&Factor::SubjectVenue].points >= base.factors[&Factor::SubjectVenue].points
        );
    }
}
