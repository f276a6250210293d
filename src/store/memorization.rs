use crate::db;
use crate::records::{MemorizationDetail, MemorizationRecord};
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct MemorizationPatch {
    pub date: Option<String>,
    pub target: Option<f64>,
    pub actual: Option<f64>,
    /// `Some(None)` removes the detail.
    pub detail: Option<Option<MemorizationDetail>>,
}

fn detail_to_json(detail: Option<&MemorizationDetail>) -> anyhow::Result<Option<String>> {
    detail
        .map(|d| serde_json::to_string(d).context("failed to encode memorization detail"))
        .transpose()
}

type MemorizationRow = (
    String,
    String,
    String,
    String,
    f64,
    f64,
    Option<String>,
);

fn read_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<MemorizationRow> {
    Ok((
        r.get(0)?,
        r.get(1)?,
        r.get(2)?,
        r.get(3)?,
        r.get(4)?,
        r.get(5)?,
        r.get(6)?,
    ))
}

fn row_to_record(
    (id, student_id, student_name, date, target, actual, detail_json): MemorizationRow,
) -> MemorizationRecord {
    // A damaged detail blob only loses the detail, never the pages.
    let detail = detail_json.and_then(|s| match serde_json::from_str(&s) {
        Ok(d) => Some(d),
        Err(e) => {
            tracing::warn!(record_id = %id, error = %e, "dropping unreadable memorization detail");
            None
        }
    });
    MemorizationRecord {
        id,
        student_id,
        student_name,
        date,
        target,
        actual,
        detail,
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, student_id, student_name, date, target, actual, detail_json FROM memorization";

pub fn create(
    conn: &Connection,
    student_id: &str,
    student_name: &str,
    date: &str,
    target: f64,
    actual: f64,
    detail: Option<&MemorizationDetail>,
) -> anyhow::Result<String> {
    let id = Uuid::new_v4().to_string();
    let seq = db::next_seq(conn, "memorization")?;
    conn.execute(
        "INSERT INTO memorization(id, student_id, student_name, date, target, actual, detail_json, seq)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            student_id,
            student_name,
            date,
            target,
            actual,
            detail_to_json(detail)?,
            seq,
        ),
    )?;
    Ok(id)
}

pub fn get(conn: &Connection, record_id: &str) -> anyhow::Result<Option<MemorizationRecord>> {
    let sql = format!("{} WHERE id = ?", SELECT_COLUMNS);
    let row = conn
        .query_row(&sql, [record_id], read_row)
        .optional()?;
    Ok(row.map(row_to_record))
}

/// Applies the patch in place. Returns false when the record does not exist.
pub fn update(conn: &Connection, record_id: &str, patch: &MemorizationPatch) -> anyhow::Result<bool> {
    let Some(mut rec) = get(conn, record_id)? else {
        return Ok(false);
    };
    if let Some(date) = patch.date.as_ref() {
        rec.date = date.clone();
    }
    if let Some(target) = patch.target {
        rec.target = target;
    }
    if let Some(actual) = patch.actual {
        rec.actual = actual;
    }
    if let Some(detail) = patch.detail.as_ref() {
        rec.detail = detail.clone();
    }
    conn.execute(
        "UPDATE memorization SET date = ?, target = ?, actual = ?, detail_json = ? WHERE id = ?",
        (
            &rec.date,
            rec.target,
            rec.actual,
            detail_to_json(rec.detail.as_ref())?,
            record_id,
        ),
    )?;
    Ok(true)
}

pub fn delete(conn: &Connection, record_id: &str) -> anyhow::Result<bool> {
    let n = conn.execute("DELETE FROM memorization WHERE id = ?", [record_id])?;
    Ok(n > 0)
}

pub fn load_all(conn: &Connection) -> anyhow::Result<Vec<MemorizationRecord>> {
    let sql = format!("{} ORDER BY seq", SELECT_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], read_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows.into_iter().map(row_to_record).collect())
}
