use crate::db;
use crate::records::ExpenseRecord;
use rusqlite::Connection;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct NewExpense<'a> {
    pub student_id: &'a str,
    pub student_name: &'a str,
    pub halaqah_id: Option<&'a str>,
    pub date: &'a str,
    pub amount: i64,
    pub category: &'a str,
    pub note: &'a str,
}

pub fn create(conn: &Connection, e: &NewExpense<'_>) -> anyhow::Result<String> {
    let id = Uuid::new_v4().to_string();
    let seq = db::next_seq(conn, "expenses")?;
    conn.execute(
        "INSERT INTO expenses(id, student_id, student_name, halaqah_id, date, amount, category, note, seq)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            e.student_id,
            e.student_name,
            e.halaqah_id,
            e.date,
            e.amount,
            e.category,
            e.note,
            seq,
        ),
    )?;
    Ok(id)
}

pub fn delete(conn: &Connection, expense_id: &str) -> anyhow::Result<bool> {
    let n = conn.execute("DELETE FROM expenses WHERE id = ?", [expense_id])?;
    Ok(n > 0)
}

pub fn load_all(conn: &Connection) -> anyhow::Result<Vec<ExpenseRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, student_id, student_name, halaqah_id, date, amount, category, note
         FROM expenses
         ORDER BY seq",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(ExpenseRecord {
                id: r.get(0)?,
                student_id: r.get(1)?,
                student_name: r.get(2)?,
                halaqah_id: r.get(3)?,
                date: r.get(4)?,
                amount: r.get(5)?,
                category: r.get(6)?,
                note: r.get(7)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
