use crate::calc;
use crate::ipc::error::{respond, HandlerError};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{db_conn, optional_str, parse_window, require_student, required_date, required_str};
use crate::ipc::types::{AppState, Request};
use crate::records::{coerce_number, parse_record_date, MemorizationDetail, MemorizationRecord};
use crate::store::memorization::{self, MemorizationPatch};
use serde_json::{json, Value};

fn record_json(r: &MemorizationRecord) -> Value {
    let (percentage, status) = calc::record_progress(r);
    json!({
        "id": r.id,
        "studentId": r.student_id,
        "studentName": r.student_name,
        "date": r.date,
        "target": r.target,
        "actual": r.actual,
        "percentage": percentage,
        "status": status,
        "detail": r.detail,
    })
}

fn parse_detail(v: Option<&Value>) -> Result<Option<MemorizationDetail>, HandlerError> {
    let Some(v) = v else { return Ok(None) };
    if v.is_null() {
        return Ok(None);
    }
    let detail: MemorizationDetail = serde_json::from_value(v.clone())
        .map_err(|e| HandlerError::bad_params(format!("invalid detail: {}", e)))?;
    detail.validate().map_err(HandlerError::BadParams)?;
    Ok(Some(detail))
}

fn check_pages(policy: &setup::MemorizationPolicy, target: f64, actual: f64) -> Result<(), HandlerError> {
    if !policy.allow_actual_above_target && actual > target {
        return Err(HandlerError::bad_params(
            "actual must not exceed target in this workspace",
        ));
    }
    Ok(())
}

fn memorization_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let student_id = required_str(&req.params, "studentId")?;
    let date = required_date(&req.params, "date")?;
    let policy = setup::memorization_policy(conn)?;
    let target = match req.params.get("target") {
        None | Some(Value::Null) => policy.default_target_pages,
        raw => coerce_number(raw),
    };
    let actual = coerce_number(req.params.get("actual"));
    check_pages(&policy, target, actual)?;
    let detail = parse_detail(req.params.get("detail"))?;
    let student = require_student(conn, &student_id)?;

    let id = memorization::create(
        conn,
        &student.id,
        &student.name,
        &date,
        target,
        actual,
        detail.as_ref(),
    )
    .map_err(|e| HandlerError::insert("memorization", e))?;
    let rec = memorization::get(conn, &id)
        .map_err(HandlerError::query)?
        .ok_or_else(|| HandlerError::not_found("memorization record"))?;
    Ok(json!({ "record": record_json(&rec) }))
}

fn memorization_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let record_id = required_str(&req.params, "recordId")?;
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerError::bad_params("patch must be an object"));
    };
    let Some(existing) = memorization::get(conn, &record_id).map_err(HandlerError::query)? else {
        return Err(HandlerError::not_found("memorization record"));
    };

    let mut patch = MemorizationPatch::default();
    for (k, v) in patch_obj {
        match k.as_str() {
            "date" => {
                let d = v
                    .as_str()
                    .and_then(parse_record_date)
                    .ok_or_else(|| HandlerError::bad_params("patch.date must be a YYYY-MM-DD date"))?;
                patch.date = Some(d.format("%Y-%m-%d").to_string());
            }
            "target" => patch.target = Some(coerce_number(Some(v))),
            "actual" => patch.actual = Some(coerce_number(Some(v))),
            "detail" => patch.detail = Some(parse_detail(Some(v))?),
            _ => return Err(HandlerError::bad_params(format!("unknown patch field: {}", k))),
        }
    }
    let policy = setup::memorization_policy(conn)?;
    check_pages(
        &policy,
        patch.target.unwrap_or(existing.target),
        patch.actual.unwrap_or(existing.actual),
    )?;

    memorization::update(conn, &record_id, &patch)
        .map_err(|e| HandlerError::update("memorization", e))?;
    let rec = memorization::get(conn, &record_id)
        .map_err(HandlerError::query)?
        .ok_or_else(|| HandlerError::not_found("memorization record"))?;
    Ok(json!({ "record": record_json(&rec) }))
}

fn memorization_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let record_id = required_str(&req.params, "recordId")?;
    let removed = memorization::delete(conn, &record_id)
        .map_err(|e| HandlerError::delete("memorization", e))?;
    if !removed {
        return Err(HandlerError::not_found("memorization record"));
    }
    Ok(json!({ "ok": true }))
}

fn memorization_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let student_id = optional_str(&req.params, "studentId");
    let window = parse_window(req.params.get("window"))?;
    let rows: Vec<Value> = memorization::load_all(conn)
        .map_err(HandlerError::query)?
        .iter()
        .filter(|r| student_id.as_deref().map_or(true, |sid| r.student_id == sid))
        .filter(|r| window.map_or(true, |w| w.contains_raw(&r.date)))
        .map(record_json)
        .collect();
    Ok(json!({ "records": rows }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let outcome = match req.method.as_str() {
        "memorization.create" => memorization_create(state, req),
        "memorization.update" => memorization_update(state, req),
        "memorization.delete" => memorization_delete(state, req),
        "memorization.list" => memorization_list(state, req),
        _ => return None,
    };
    Some(respond(&req.id, &req.method, outcome))
}
