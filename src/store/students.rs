use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use uuid::Uuid;

/// Tables whose rows carry a denormalized `student_name`.
const RECORD_TABLES: [&str; 4] = ["attendance", "memorization", "expenses", "activities"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Halaqah {
    pub id: String,
    pub name: String,
    pub supervisor: Option<String>,
    pub student_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub halaqah_id: Option<String>,
    pub active: bool,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Default)]
pub struct StudentPatch {
    pub name: Option<String>,
    /// `Some(None)` clears the halaqah.
    pub halaqah_id: Option<Option<String>>,
    pub active: Option<bool>,
}

pub fn list_halaqahs(conn: &Connection) -> anyhow::Result<Vec<Halaqah>> {
    let mut stmt = conn.prepare(
        "SELECT
           h.id,
           h.name,
           h.supervisor,
           (SELECT COUNT(*) FROM students s WHERE s.halaqah_id = h.id) AS student_count
         FROM halaqahs h
         ORDER BY h.name",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(Halaqah {
                id: r.get(0)?,
                name: r.get(1)?,
                supervisor: r.get(2)?,
                student_count: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn halaqah_exists(conn: &Connection, halaqah_id: &str) -> anyhow::Result<bool> {
    let hit: Option<i64> = conn
        .query_row("SELECT 1 FROM halaqahs WHERE id = ?", [halaqah_id], |r| r.get(0))
        .optional()?;
    Ok(hit.is_some())
}

pub fn create_halaqah(conn: &Connection, name: &str, supervisor: Option<&str>) -> anyhow::Result<String> {
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO halaqahs(id, name, supervisor) VALUES(?, ?, ?)",
        (&id, name, supervisor),
    )?;
    Ok(id)
}

/// Students of a removed halaqah stay, unassigned.
pub fn delete_halaqah(conn: &Connection, halaqah_id: &str) -> anyhow::Result<bool> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "UPDATE students SET halaqah_id = NULL WHERE halaqah_id = ?",
        [halaqah_id],
    )?;
    let n = tx.execute("DELETE FROM halaqahs WHERE id = ?", [halaqah_id])?;
    tx.commit()?;
    Ok(n > 0)
}

fn student_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        name: r.get(1)?,
        halaqah_id: r.get(2)?,
        active: r.get::<_, i64>(3)? != 0,
        sort_order: r.get(4)?,
    })
}

pub fn list_students(conn: &Connection, halaqah_id: Option<&str>) -> anyhow::Result<Vec<Student>> {
    let rows = match halaqah_id {
        Some(hid) => {
            let mut stmt = conn.prepare(
                "SELECT id, name, halaqah_id, active, sort_order
                 FROM students
                 WHERE halaqah_id = ?
                 ORDER BY sort_order",
            )?;
            let out = stmt
                .query_map([hid], student_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            out
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT id, name, halaqah_id, active, sort_order
                 FROM students
                 ORDER BY sort_order",
            )?;
            let out = stmt
                .query_map([], student_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            out
        }
    };
    Ok(rows)
}

pub fn get_student(conn: &Connection, student_id: &str) -> anyhow::Result<Option<Student>> {
    let s = conn
        .query_row(
            "SELECT id, name, halaqah_id, active, sort_order FROM students WHERE id = ?",
            [student_id],
            student_from_row,
        )
        .optional()?;
    Ok(s)
}

pub fn create_student(conn: &Connection, name: &str, halaqah_id: Option<&str>) -> anyhow::Result<String> {
    let sort_order: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM students",
        [],
        |r| r.get(0),
    )?;
    let id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO students(id, name, halaqah_id, active, sort_order, updated_at)
         VALUES(?, ?, ?, 1, ?, strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        (&id, name, halaqah_id, sort_order),
    )?;
    Ok(id)
}

/// Returns false when the student does not exist. A rename is written through
/// to every record table so name-keyed rollups keep matching.
pub fn update_student(conn: &Connection, student_id: &str, patch: &StudentPatch) -> anyhow::Result<bool> {
    let tx = conn.unchecked_transaction()?;
    let exists: Option<i64> = tx
        .query_row("SELECT 1 FROM students WHERE id = ?", [student_id], |r| r.get(0))
        .optional()?;
    if exists.is_none() {
        return Ok(false);
    }
    if let Some(name) = patch.name.as_deref() {
        tx.execute("UPDATE students SET name = ? WHERE id = ?", (name, student_id))?;
        for table in RECORD_TABLES {
            let sql = format!("UPDATE {} SET student_name = ? WHERE student_id = ?", table);
            tx.execute(&sql, (name, student_id))?;
        }
    }
    if let Some(halaqah_id) = patch.halaqah_id.as_ref() {
        tx.execute(
            "UPDATE students SET halaqah_id = ? WHERE id = ?",
            (halaqah_id.as_deref(), student_id),
        )?;
    }
    if let Some(active) = patch.active {
        tx.execute(
            "UPDATE students SET active = ? WHERE id = ?",
            (if active { 1 } else { 0 }, student_id),
        )?;
    }
    tx.execute(
        "UPDATE students SET updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now') WHERE id = ?",
        [student_id],
    )?;
    tx.commit()?;
    Ok(true)
}

/// Removes the student together with all of their records.
pub fn delete_student(conn: &Connection, student_id: &str) -> anyhow::Result<bool> {
    let tx = conn.unchecked_transaction()?;
    for table in RECORD_TABLES {
        let sql = format!("DELETE FROM {} WHERE student_id = ?", table);
        tx.execute(&sql, [student_id])?;
    }
    let n = tx.execute("DELETE FROM students WHERE id = ?", [student_id])?;
    tx.commit()?;
    Ok(n > 0)
}
