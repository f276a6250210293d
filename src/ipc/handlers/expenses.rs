use crate::ipc::error::{respond, HandlerError};
use crate::ipc::helpers::{db_conn, optional_str, parse_window, require_student, required_date, required_str};
use crate::ipc::types::{AppState, Request};
use crate::records::coerce_number;
use crate::store::expenses::{self, NewExpense};
use serde_json::{json, Value};

/// Largest accepted expense magnitude, in whole currency units.
const MAX_EXPENSE_AMOUNT: i64 = 1_000_000_000_000;

fn parse_amount(params: &Value) -> Result<i64, HandlerError> {
    // Whole units; fractional input is rounded, garbage counts as 0.
    let amount = coerce_number(params.get("amount")).round();
    if amount.abs() > MAX_EXPENSE_AMOUNT as f64 {
        return Err(HandlerError::bad_params(format!(
            "amount must be within -{max}..={max}",
            max = MAX_EXPENSE_AMOUNT
        )));
    }
    Ok(amount as i64)
}

fn expenses_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let student_id = required_str(&req.params, "studentId")?;
    let date = required_date(&req.params, "date")?;
    let category = required_str(&req.params, "category")?;
    let note = optional_str(&req.params, "note").unwrap_or_default();
    let amount = parse_amount(&req.params)?;
    let student = require_student(conn, &student_id)?;

    let id = expenses::create(
        conn,
        &NewExpense {
            student_id: &student.id,
            student_name: &student.name,
            halaqah_id: student.halaqah_id.as_deref(),
            date: &date,
            amount,
            category: &category,
            note: &note,
        },
    )
    .map_err(|e| HandlerError::insert("expenses", e))?;
    Ok(json!({ "expenseId": id, "amount": amount }))
}

fn expenses_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let student_id = optional_str(&req.params, "studentId");
    let halaqah_id = optional_str(&req.params, "halaqahId");
    let window = parse_window(req.params.get("window"))?;
    let rows: Vec<_> = expenses::load_all(conn)
        .map_err(HandlerError::query)?
        .into_iter()
        .filter(|r| student_id.as_deref().map_or(true, |sid| r.student_id == sid))
        .filter(|r| {
            halaqah_id
                .as_deref()
                .map_or(true, |hid| r.halaqah_id.as_deref() == Some(hid))
        })
        .filter(|r| window.map_or(true, |w| w.contains_raw(&r.date)))
        .collect();
    Ok(json!({ "expenses": rows }))
}

fn expenses_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let expense_id = required_str(&req.params, "expenseId")?;
    let removed = expenses::delete(conn, &expense_id)
        .map_err(|e| HandlerError::delete("expenses", e))?;
    if !removed {
        return Err(HandlerError::not_found("expense"));
    }
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let outcome = match req.method.as_str() {
        "expenses.create" => expenses_create(state, req),
        "expenses.list" => expenses_list(state, req),
        "expenses.delete" => expenses_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, &req.method, outcome))
}
