use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Goals for one period of a match, home side first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreLine {
    pub home: u32,
    pub away: u32,
}

impl ScoreLine {
    pub fn new(home: u32, away: u32) -> Self {
        Self { home, away }
    }

    /// Combined goals. Saturates so an absurd upstream value can never
    /// wrap around to a low or zero total.
    pub fn total(&self) -> u32 {
        self.home.saturating_add(self.away)
    }
}

/// Which score line a rule reads from a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreField {
    FullTime,
    FirstHalf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Venue {
    Home,
    Away,
    Neutral,
}

/// One finished match as returned by the upstream provider. Sequences of
/// records are newest-first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub played_at: Option<String>,
    pub home: String,
    pub away: String,
    #[serde(default)]
    pub neutral: bool,
    #[serde(default)]
    pub full_time: Option<ScoreLine>,
    #[serde(default)]
    pub first_half: Option<ScoreLine>,
}

impl HistoricalRecord {
    pub fn score(&self, field: ScoreField) -> Option<ScoreLine> {
        match field {
            ScoreField::FullTime => self.full_time,
            ScoreField::FirstHalf => self.first_half,
        }
    }

    pub fn combined(&self, field: ScoreField) -> Option<u32> {
        self.score(field).map(|s| s.total())
    }

    pub fn involves(&self, team: &str) -> bool {
        same_team(&self.home, team) || same_team(&self.away, team)
    }

    /// Venue role of `team` in this record, `None` when the team did not play.
    pub fn venue_of(&self, team: &str) -> Option<Venue> {
        if !self.involves(team) {
            return None;
        }
        if self.neutral {
            return Some(Venue::Neutral);
        }
        if same_team(&self.home, team) {
            Some(Venue::Home)
        } else {
            Some(Venue::Away)
        }
    }

    pub fn is_between(&self, a: &str, b: &str) -> bool {
        (same_team(&self.home, a) && same_team(&self.away, b))
            || (same_team(&self.home, b) && same_team(&self.away, a))
    }
}

/// An upcoming match to be scored. `home` is the subject side, `away` the
/// opponent side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub id: String,
    pub home: String,
    pub away: String,
}

impl Fixture {
    pub fn new(id: impl Into<String>, home: impl Into<String>, away: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            home: home.into(),
            away: away.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchupHistory {
    pub subject: Vec<HistoricalRecord>,
    pub opponent: Vec<HistoricalRecord>,
    pub head_to_head: Vec<HistoricalRecord>,
}

pub fn same_team(a: &str, b: &str) -> bool {
    let a = a.trim();
    let b = b.trim();
    !a.is_empty() && a.eq_ignore_ascii_case(b)
}

/// Splits the single list returned by the head-to-head endpoint into the
/// three histories used for scoring. Order is preserved.
pub fn split_matchup(records: &[HistoricalRecord], fixture: &Fixture) -> MatchupHistory {
    let mut out = MatchupHistory::default();
    for r in records {
        if r.involves(&fixture.home) {
            out.subject.push(r.clone());
        }
        if r.involves(&fixture.away) {
            out.opponent.push(r.clone());
        }
        if r.is_between(&fixture.home, &fixture.away) {
            out.head_to_head.push(r.clone());
        }
    }
    out
}

/// Parses the head-to-head payload. The provider answers either with a bare
/// array or with `{ "DATA": [...] }`; unparseable items are skipped.
pub fn parse_history_sections(v: &Value) -> Vec<HistoricalRecord> {
    let items = match v {
        Value::Array(arr) => arr.as_slice(),
        _ => match v.get("DATA").and_then(|x| x.as_array()) {
            Some(arr) => arr.as_slice(),
            None => return Vec::new(),
        },
    };
    items.iter().filter_map(parse_history_record).collect()
}

pub fn parse_history_record(v: &Value) -> Option<HistoricalRecord> {
    let home_team = v.get("home_team")?;
    let away_team = v.get("away_team")?;
    let home = home_team.get("name")?.as_str()?.trim().to_string();
    let away = away_team.get("name")?.as_str()?.trim().to_string();
    if home.is_empty() || away.is_empty() {
        return None;
    }

    let id = ["event_key", "match_id", "id"]
        .iter()
        .find_map(|k| v.get(*k).and_then(value_to_id))
        .unwrap_or_default();
    let played_at = ["timestamp", "date", "start_time"]
        .iter()
        .find_map(|k| v.get(*k).and_then(value_to_id));
    let neutral = v.get("neutral").and_then(|x| x.as_bool()).unwrap_or(false);

    let full_time = score_pair(home_team.get("score"), away_team.get("score"));
    let first_half = score_pair(
        home_team.get("score_1st_half"),
        away_team.get("score_1st_half"),
    );

    Some(HistoricalRecord {
        id,
        played_at,
        home,
        away,
        neutral,
        full_time,
        first_half,
    })
}

fn score_pair(home: Option<&Value>, away: Option<&Value>) -> Option<ScoreLine> {
    let home = as_u32_any(home?)?;
    let away = as_u32_any(away?)?;
    Some(ScoreLine { home, away })
}

pub(crate) fn as_u32_any(v: &Value) -> Option<u32> {
    if let Some(n) = v.as_u64() {
        return u32::try_from(n).ok();
    }
    v.as_str()?.trim().parse::<u32>().ok()
}

fn value_to_id(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
