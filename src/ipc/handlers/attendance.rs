use crate::ipc::error::{respond, HandlerError};
use crate::ipc::helpers::{db_conn, optional_str, parse_window, require_student, required_date, required_str};
use crate::ipc::types::{AppState, Request};
use crate::records::AttendanceStatus;
use crate::store::attendance;
use serde_json::{json, Value};

fn parse_status(params: &Value) -> Result<AttendanceStatus, HandlerError> {
    let raw = required_str(params, "status")?;
    AttendanceStatus::parse(&raw).ok_or_else(|| {
        HandlerError::bad_params(
            "status must be one of: present, excused, sick, unexcused, returnedHome",
        )
    })
}

fn attendance_record(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let student_id = required_str(&req.params, "studentId")?;
    let date = required_date(&req.params, "date")?;
    let status = parse_status(&req.params)?;
    let student = require_student(conn, &student_id)?;
    attendance::record(conn, &student.id, &student.name, &date, status)
        .map_err(|e| HandlerError::insert("attendance", e))?;
    Ok(json!({
        "studentId": student.id,
        "date": date,
        "status": status,
    }))
}

fn attendance_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let student_id = optional_str(&req.params, "studentId");
    let window = parse_window(req.params.get("window"))?;
    let rows: Vec<_> = attendance::load_all(conn)
        .map_err(HandlerError::query)?
        .into_iter()
        .filter(|r| student_id.as_deref().map_or(true, |sid| r.student_id == sid))
        .filter(|r| window.map_or(true, |w| w.contains_raw(&r.date)))
        .collect();
    Ok(json!({ "records": rows }))
}

fn attendance_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let student_id = required_str(&req.params, "studentId")?;
    let date = required_date(&req.params, "date")?;
    let removed = attendance::delete(conn, &student_id, &date)
        .map_err(|e| HandlerError::delete("attendance", e))?;
    if !removed {
        return Err(HandlerError::not_found("attendance record"));
    }
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let outcome = match req.method.as_str() {
        "attendance.record" => attendance_record(state, req),
        "attendance.list" => attendance_list(state, req),
        "attendance.delete" => attendance_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, &req.method, outcome))
}
