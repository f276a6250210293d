use crate::db;
use crate::records::ActivityRecord;
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Upsert the day's checklist for a student. Returns the record id, which is
/// stable across re-records of the same day.
pub fn record(
    conn: &Connection,
    student_id: &str,
    student_name: &str,
    date: &str,
    activities: &BTreeMap<String, bool>,
) -> anyhow::Result<String> {
    let json = serde_json::to_string(activities).context("failed to encode activities")?;
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM activities WHERE student_id = ? AND date = ?",
            (student_id, date),
            |r| r.get(0),
        )
        .optional()?;
    if let Some(id) = existing {
        conn.execute(
            "UPDATE activities SET activities_json = ?, student_name = ? WHERE id = ?",
            (&json, student_name, &id),
        )?;
        return Ok(id);
    }
    let id = Uuid::new_v4().to_string();
    let seq = db::next_seq(conn, "activities")?;
    conn.execute(
        "INSERT INTO activities(id, student_id, student_name, date, activities_json, seq)
         VALUES(?, ?, ?, ?, ?, ?)",
        (&id, student_id, student_name, date, &json, seq),
    )?;
    Ok(id)
}

pub fn delete(conn: &Connection, record_id: &str) -> anyhow::Result<bool> {
    let n = conn.execute("DELETE FROM activities WHERE id = ?", [record_id])?;
    Ok(n > 0)
}

pub fn load_all(conn: &Connection) -> anyhow::Result<Vec<ActivityRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, student_id, student_name, date, activities_json
         FROM activities
         ORDER BY seq",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
                r.get::<_, String>(4)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Vec::with_capacity(rows.len());
    for (id, student_id, student_name, date, raw) in rows {
        let activities: BTreeMap<String, bool> = serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::warn!(record_id = %id, error = %e, "unreadable activity checklist, counting as empty");
            BTreeMap::new()
        });
        out.push(ActivityRecord {
            id,
            student_id,
            student_name,
            date,
            activities,
        });
    }
    Ok(out)
}
