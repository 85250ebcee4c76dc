use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rusqlite::{Connection, Row, params};
use tracing::debug;

use crate::history::{Fixture, HistoricalRecord, MatchupHistory, ScoreLine};

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

// Larger bare numbers are taken as milliseconds.
const MAX_EPOCH_SECS: i64 = 100_000_000_000;

const SELECT_COLUMNS: &str = "id, played_at, home, away, neutral, ft_home, ft_away, ht_home, ht_away";

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os("XDG_CACHE_HOME").filter(|d| !d.is_empty()) {
        return Some(PathBuf::from(dir).join("form_signals"));
    }
    let home = std::env::var_os("HOME").filter(|d| !d.is_empty())?;
    Some(PathBuf::from(home).join(".cache").join("form_signals"))
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join("history.sqlite"))
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS records (
            id TEXT PRIMARY KEY,
            played_at TEXT NULL,
            home TEXT NOT NULL COLLATE NOCASE,
            away TEXT NOT NULL COLLATE NOCASE,
            neutral INTEGER NOT NULL,
            ft_home INTEGER NULL,
            ft_away INTEGER NULL,
            ht_home INTEGER NULL,
            ht_away INTEGER NULL,
            updated_at TEXT NOT NULL,
            played_epoch INTEGER NULL
        );
        CREATE INDEX IF NOT EXISTS idx_records_home ON records(home);
        CREATE INDEX IF NOT EXISTS idx_records_away ON records(away);
        "#,
    )
    .context("create sqlite schema")?;
    if !has_column(conn, "records", "played_epoch")? {
        add_played_epoch(conn)?;
    }
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_records_played_epoch ON records(played_epoch);",
    )
    .context("create played_epoch index")?;
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .context("prepare table_info")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .context("query table_info")?;
    for name in names {
        if name.context("decode table_info row")? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Upgrades a database written before kickoffs were stored as epochs.
fn add_played_epoch(conn: &Connection) -> Result<()> {
    conn.execute("ALTER TABLE records ADD COLUMN played_epoch INTEGER NULL", [])
        .context("add played_epoch column")?;
    let pending: Vec<(String, String)> = {
        let mut stmt = conn
            .prepare("SELECT id, played_at FROM records WHERE played_at IS NOT NULL")
            .context("prepare played_epoch backfill")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .context("query played_epoch backfill")?;
        rows.collect::<rusqlite::Result<_>>()
            .context("decode played_epoch backfill")?
    };
    for (id, played_at) in &pending {
        conn.execute(
            "UPDATE records SET played_epoch = ?1 WHERE id = ?2",
            params![kickoff_epoch(played_at), id],
        )
        .context("backfill played_epoch")?;
    }
    debug!(rows = pending.len(), "played_epoch backfilled");
    Ok(())
}

/// Unix seconds for the kickoff strings upstream feeds send: bare epoch
/// seconds or milliseconds, RFC 3339, naive datetimes (taken as UTC) and
/// bare dates.
pub fn kickoff_epoch(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Some(if n.abs() >= MAX_EPOCH_SECS { n / 1000 } else { n });
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.timestamp());
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(Utc.from_utc_datetime(&naive).timestamp());
        }
    }
    let day = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0)?).timestamp())
}

/// Inserts or refreshes records in one transaction. Records without an id
/// are keyed by teams and kickoff.
pub fn upsert_records(conn: &mut Connection, records: &[HistoricalRecord]) -> Result<usize> {
    let tx = conn.transaction().context("begin upsert transaction")?;
    let now = Utc::now().to_rfc3339();
    for r in records {
        tx.execute(
            r#"
            INSERT INTO records (
                id, played_at, home, away, neutral,
                ft_home, ft_away, ht_home, ht_away, updated_at, played_epoch
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(id) DO UPDATE SET
                played_at = excluded.played_at,
                played_epoch = excluded.played_epoch,
                home = excluded.home,
                away = excluded.away,
                neutral = excluded.neutral,
                ft_home = excluded.ft_home,
                ft_away = excluded.ft_away,
                ht_home = excluded.ht_home,
                ht_away = excluded.ht_away,
                updated_at = excluded.updated_at
            "#,
            params![
                record_key(r),
                r.played_at,
                r.home.trim(),
                r.away.trim(),
                r.neutral as i64,
                r.full_time.map(|s| s.home),
                r.full_time.map(|s| s.away),
                r.first_half.map(|s| s.home),
                r.first_half.map(|s| s.away),
                now,
                r.played_at.as_deref().and_then(kickoff_epoch),
            ],
        )
        .context("upsert record")?;
    }
    tx.commit().context("commit upsert transaction")?;
    debug!(count = records.len(), "history records upserted");
    Ok(records.len())
}

/// Every stored record involving `team`, newest first. Records whose kickoff
/// could not be read sort last.
pub fn load_team_history(conn: &Connection, team: &str, limit: usize) -> Result<Vec<HistoricalRecord>> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM records
         WHERE home = ?1 OR away = ?1
         ORDER BY played_epoch DESC, rowid DESC
         LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql).context("prepare team history query")?;
    let rows = stmt
        .query_map(params![team.trim(), limit as i64], record_from_row)
        .context("query team history")?;
    collect_rows(rows)
}

/// Meetings between `a` and `b` in either orientation, newest first.
pub fn load_head_to_head(
    conn: &Connection,
    a: &str,
    b: &str,
    limit: usize,
) -> Result<Vec<HistoricalRecord>> {
    let sql = format!(
        "SELECT {SELECT_COLUMNS} FROM records
         WHERE (home = ?1 AND away = ?2) OR (home = ?2 AND away = ?1)
         ORDER BY played_epoch DESC, rowid DESC
         LIMIT ?3"
    );
    let mut stmt = conn.prepare(&sql).context("prepare head-to-head query")?;
    let rows = stmt
        .query_map(params![a.trim(), b.trim(), limit as i64], record_from_row)
        .context("query head-to-head")?;
    collect_rows(rows)
}

pub fn load_matchup(conn: &Connection, fixture: &Fixture, limit: usize) -> Result<MatchupHistory> {
    Ok(MatchupHistory {
        subject: load_team_history(conn, &fixture.home, limit)?,
        opponent: load_team_history(conn, &fixture.away, limit)?,
        head_to_head: load_head_to_head(conn, &fixture.home, &fixture.away, limit)?,
    })
}

fn record_key(r: &HistoricalRecord) -> String {
    if !r.id.trim().is_empty() {
        return r.id.trim().to_string();
    }
    format!(
        "{}|{}|{}",
        r.home.trim().to_ascii_lowercase(),
        r.away.trim().to_ascii_lowercase(),
        r.played_at.as_deref().unwrap_or("")
    )
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<HistoricalRecord> {
    Ok(HistoricalRecord {
        id: row.get(0)?,
        played_at: row.get(1)?,
        home: row.get(2)?,
        away: row.get(3)?,
        neutral: row.get::<_, i64>(4)? != 0,
        full_time: score_line(row.get(5)?, row.get(6)?),
        first_half: score_line(row.get(7)?, row.get(8)?),
    })
}

fn score_line(home: Option<u32>, away: Option<u32>) -> Option<ScoreLine> {
    Some(ScoreLine::new(home?, away?))
}

fn collect_rows(
    rows: impl Iterator<Item = rusqlite::Result<HistoricalRecord>>,
) -> Result<Vec<HistoricalRecord>> {
    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode record row")?);
    }
    Ok(out)
}
