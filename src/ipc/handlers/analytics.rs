use crate::calc::{self, Board, RankedEntry, Window};
use crate::ipc::error::{respond, HandlerError};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{
    db_conn, optional_count, optional_str, parse_window, required_str, required_window,
    target_student_name,
};
use crate::ipc::types::{AppState, Request};
use crate::records::MemorizationRecord;
use crate::store::{activities, attendance, expenses, memorization};
use serde::Serialize;
use serde_json::{json, Value};

fn window_json(w: &Window) -> Value {
    match *w {
        Window::Month { year, month0 } => json!({
            "label": w.label(),
            "year": year,
            "month": month0,
        }),
        Window::Semester { year, semester } => json!({
            "label": w.label(),
            "year": year,
            "semester": semester.number(),
        }),
    }
}

fn memorization_summary(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let student_name = target_student_name(conn, &req.params)?;
    let window = required_window(&req.params)?;
    let records = memorization::load_all(conn).map_err(HandlerError::query)?;
    let summary = match window {
        Window::Month { year, month0 } => calc::monthly_progress(&records, &student_name, month0, year),
        Window::Semester { year, semester } => {
            calc::semester_progress(&records, &student_name, semester, year)
        }
    };
    Ok(json!({
        "studentName": student_name,
        "window": window_json(&window),
        "summary": summary,
    }))
}

/// Sum one numeric field of a record collection for a student over a month
/// or semester.
fn window_total(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let student_name = target_student_name(conn, &req.params)?;
    let window = required_window(&req.params)?;
    let collection = required_str(&req.params, "collection")?;
    let field = required_str(&req.params, "field")?;

    let total = match (collection.as_str(), field.as_str()) {
        ("memorization", "target") | ("memorization", "actual") => {
            let records = memorization::load_all(conn).map_err(HandlerError::query)?;
            let pick = |r: &MemorizationRecord| if field == "target" { r.target } else { r.actual };
            let pages = match window {
                Window::Month { year, month0 } => {
                    calc::monthly_total(&records, &student_name, month0, year, pick)
                }
                Window::Semester { year, semester } => {
                    calc::semester_total(&records, &student_name, semester, year, pick)
                }
            };
            json!(pages)
        }
        // Amounts stay integers on the wire.
        ("expenses", "amount") => {
            let records = expenses::load_all(conn).map_err(HandlerError::query)?;
            json!(calc::expense_total(&records, &student_name, &window))
        }
        _ => {
            return Err(HandlerError::bad_params(
                "collection/field must be memorization/target, memorization/actual or expenses/amount",
            ))
        }
    };
    Ok(json!({
        "studentName": student_name,
        "window": window_json(&window),
        "collection": collection,
        "field": field,
        "total": total,
    }))
}

fn attendance_summary(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let student_name = target_student_name(conn, &req.params)?;
    let window = required_window(&req.params)?;
    let records = attendance::load_all(conn).map_err(HandlerError::query)?;
    let summary = calc::attendance_summary(&records, &student_name, &window);
    Ok(json!({
        "studentName": student_name,
        "window": window_json(&window),
        "summary": summary,
    }))
}

fn expense_summary(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let window = required_window(&req.params)?;
    let records = expenses::load_all(conn).map_err(HandlerError::query)?;
    let currency = setup::currency(conn)?;
    if let Some(halaqah_id) = optional_str(&req.params, "halaqahId") {
        let total = calc::expense_total_for_halaqah(&records, &halaqah_id, &window);
        return Ok(json!({
            "halaqahId": halaqah_id,
            "window": window_json(&window),
            "total": total,
            "currency": currency,
        }));
    }
    let student_name = target_student_name(conn, &req.params)?;
    let total = calc::expense_total(&records, &student_name, &window);
    Ok(json!({
        "studentName": student_name,
        "window": window_json(&window),
        "total": total,
        "currency": currency,
    }))
}

fn ranked_json<T: Serialize>(entries: Vec<RankedEntry<T>>) -> Vec<Value> {
    entries
        .into_iter()
        .enumerate()
        .map(|(i, e)| json!({ "rank": i + 1, "name": e.name, "total": e.total }))
        .collect()
}

fn leaderboard(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let board_raw = required_str(&req.params, "board")?;
    let board = Board::parse(&board_raw).ok_or_else(|| {
        HandlerError::bad_params("board must be one of: memorization, attendance, activities, finance")
    })?;
    let n = match optional_count(&req.params, "n", setup::MAX_LEADERBOARD_SIZE)? {
        Some(n) => n,
        None => setup::leaderboard_size(conn)?,
    };
    let window = parse_window(req.params.get("window"))?;

    let ranked = match board {
        Board::Memorization => {
            let records = memorization::load_all(conn).map_err(HandlerError::query)?;
            ranked_json(calc::memorization_leaderboard(&records, window.as_ref(), n))
        }
        Board::Attendance => {
            let records = attendance::load_all(conn).map_err(HandlerError::query)?;
            ranked_json(calc::attendance_leaderboard(&records, window.as_ref(), n))
        }
        Board::Activities => {
            let records = activities::load_all(conn).map_err(HandlerError::query)?;
            ranked_json(calc::activities_leaderboard(&records, window.as_ref(), n))
        }
        Board::Finance => {
            let records = expenses::load_all(conn).map_err(HandlerError::query)?;
            ranked_json(calc::finance_leaderboard(&records, window.as_ref(), n))
        }
    };
    tracing::debug!(board = board.as_str(), n, returned = ranked.len(), "leaderboard computed");

    Ok(json!({
        "board": board.as_str(),
        "window": window.as_ref().map(window_json),
        "entries": ranked,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let outcome = match req.method.as_str() {
        "calc.memorizationSummary" => memorization_summary(state, req),
        "calc.windowTotal" => window_total(state, req),
        "calc.attendanceSummary" => attendance_summary(state, req),
        "calc.expenseSummary" => expense_summary(state, req),
        "calc.leaderboard" => leaderboard(state, req),
        _ => return None,
    };
    Some(respond(&req.id, &req.method, outcome))
}
