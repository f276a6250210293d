use crate::records::{AttendanceRecord, AttendanceStatus};
use rusqlite::Connection;

/// One row per (student, date). Re-recording a day replaces its status and
/// keeps the row's original position.
pub fn record(
    conn: &Connection,
    student_id: &str,
    student_name: &str,
    date: &str,
    status: AttendanceStatus,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO attendance(student_id, student_name, date, status) VALUES(?, ?, ?, ?)
         ON CONFLICT(student_id, date) DO UPDATE SET
           status = excluded.status,
           student_name = excluded.student_name",
        (student_id, student_name, date, status.as_str()),
    )?;
    Ok(())
}

pub fn delete(conn: &Connection, student_id: &str, date: &str) -> anyhow::Result<bool> {
    let n = conn.execute(
        "DELETE FROM attendance WHERE student_id = ? AND date = ?",
        (student_id, date),
    )?;
    Ok(n > 0)
}

/// All attendance rows in insertion order. Rows with a status this build does
/// not know are skipped with a warning.
pub fn load_all(conn: &Connection) -> anyhow::Result<Vec<AttendanceRecord>> {
    let mut stmt = conn.prepare(
        "SELECT student_id, student_name, date, status FROM attendance ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Vec::with_capacity(rows.len());
    for (student_id, student_name, date, raw_status) in rows {
        let Some(status) = AttendanceStatus::parse(&raw_status) else {
            tracing::warn!(%student_id, %date, status = %raw_status, "skipping attendance row with unknown status");
            continue;
        };
        out.push(AttendanceRecord {
            student_id,
            student_name,
            date,
            status,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_db;
    use crate::store::students::create_student;

    #[test]
    fn re_recording_a_day_replaces_status() {
        let dir = tempfile::tempdir().expect("tempdir");
        let conn = open_db(dir.path()).expect("open");
        let a = create_student(&conn, "A", None).expect("a");
        let b = create_student(&conn, "B", None).expect("b");
        record(&conn, &a, "A", "2025-07-01", AttendanceStatus::Sick).expect("a1");
        record(&conn, &b, "B", "2025-07-01", AttendanceStatus::Present).expect("b1");
        record(&conn, &a, "A", "2025-07-01", AttendanceStatus::Present).expect("a1 again");

        let all = load_all(&conn).expect("load");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].student_name, "A");
        assert_eq!(all[0].status, AttendanceStatus::Present);

        assert!(delete(&conn, &a, "2025-07-01").expect("delete"));
        assert!(!delete(&conn, &a, "2025-07-01").expect("delete again"));
        assert_eq!(load_all(&conn).expect("load").len(), 1);
    }
}
