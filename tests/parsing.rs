use std::fs;
use std::path::PathBuf;

use form_signals::history::{
    Fixture, HistoricalRecord, ScoreField, ScoreLine, parse_history_sections, split_matchup,
};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn ids(records: &[HistoricalRecord]) -> Vec<&str> {
    records.iter().map(|r| r.id.as_str()).collect()
}

fn h2h_payload() -> serde_json::Value {
    serde_json::from_str(&read_fixture("h2h_response.json")).expect("fixture should parse")
}

#[test]
fn parses_h2h_fixture_and_skips_broken_items() {
    let records = parse_history_sections(&h2h_payload());
    assert_eq!(records.len(), 5);
    assert_eq!(records[0].id, "5001");
    assert_eq!(records[0].first_half, Some(ScoreLine::new(1, 0)));
    assert_eq!(records[1].full_time, Some(ScoreLine::new(1, 1)));
    assert_eq!(records[2].id, "5003");
    assert_eq!(records[2].played_at.as_deref(), Some("2025-03-20"));
    assert_eq!(records[3].combined(ScoreField::FirstHalf), None);
    assert_eq!(records[3].combined(ScoreField::FullTime), Some(0));
}

#[test]
fn bare_array_payload_is_accepted() {
    let payload = h2h_payload();
    let bare = payload["DATA"].clone();
    assert_eq!(
        parse_history_sections(&bare),
        parse_history_sections(&payload)
    );
    assert!(parse_history_sections(&serde_json::json!({ "error": "quota" })).is_empty());
}

#[test]
fn splits_h2h_fixture_into_three_histories() {
    let records = parse_history_sections(&h2h_payload());
    let fixture = Fixture::new("9000", "Alpha", "Beta");
    let history = split_matchup(&records, &fixture);

    assert_eq!(ids(&history.subject), ["5001", "5003", "5004"]);
    assert_eq!(ids(&history.opponent), ["5002", "5003", "5004"]);
    assert_eq!(ids(&history.head_to_head), ["5003", "5004"]);
}
