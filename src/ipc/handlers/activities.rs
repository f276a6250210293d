use crate::ipc::error::{respond, HandlerError};
use crate::ipc::handlers::setup;
use crate::ipc::helpers::{db_conn, optional_str, parse_window, require_student, required_date, required_str};
use crate::ipc::types::{AppState, Request};
use crate::store::activities;
use serde_json::{json, Value};
use std::collections::BTreeMap;

fn parse_checklist(params: &Value, allowed: &[String]) -> Result<BTreeMap<String, bool>, HandlerError> {
    let Some(obj) = params.get("activities").and_then(|v| v.as_object()) else {
        return Err(HandlerError::bad_params("activities must be an object"));
    };
    let mut out = BTreeMap::new();
    for (k, v) in obj {
        if !allowed.iter().any(|a| a == k) {
            return Err(HandlerError::bad_params(format!("unknown activity: {}", k)));
        }
        let done = v
            .as_bool()
            .ok_or_else(|| HandlerError::bad_params(format!("activities.{} must be boolean", k)))?;
        out.insert(k.clone(), done);
    }
    Ok(out)
}

fn activities_record(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let student_id = required_str(&req.params, "studentId")?;
    let date = required_date(&req.params, "date")?;
    let allowed = setup::activity_keys(conn)?;
    let checklist = parse_checklist(&req.params, &allowed)?;
    let student = require_student(conn, &student_id)?;
    let id = activities::record(conn, &student.id, &student.name, &date, &checklist)
        .map_err(|e| HandlerError::insert("activities", e))?;
    let completed = checklist.values().filter(|d| **d).count();
    Ok(json!({ "recordId": id, "completed": completed }))
}

fn activities_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let student_id = optional_str(&req.params, "studentId");
    let window = parse_window(req.params.get("window"))?;
    let rows: Vec<Value> = activities::load_all(conn)
        .map_err(HandlerError::query)?
        .into_iter()
        .filter(|r| student_id.as_deref().map_or(true, |sid| r.student_id == sid))
        .filter(|r| window.map_or(true, |w| w.contains_raw(&r.date)))
        .map(|r| {
            let completed = r.completed_count();
            let mut v = json!(r);
            v["completed"] = json!(completed);
            v
        })
        .collect();
    Ok(json!({ "records": rows }))
}

fn activities_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let record_id = required_str(&req.params, "recordId")?;
    let removed = activities::delete(conn, &record_id)
        .map_err(|e| HandlerError::delete("activities", e))?;
    if !removed {
        return Err(HandlerError::not_found("activity record"));
    }
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let outcome = match req.method.as_str() {
        "activities.record" => activities_record(state, req),
        "activities.list" => activities_list(state, req),
        "activities.delete" => activities_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, &req.method, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checklist_rejects_unknown_keys_and_non_bool_values() {
        let allowed = vec!["tahajud".to_string(), "dhuha".to_string()];
        let ok = parse_checklist(&json!({ "activities": { "tahajud": true, "dhuha": false } }), &allowed)
            .expect("valid");
        assert_eq!(ok.len(), 2);
        assert!(parse_checklist(&json!({ "activities": { "karate": true } }), &allowed).is_err());
        assert!(parse_checklist(&json!({ "activities": { "dhuha": "yes" } }), &allowed).is_err());
        assert!(parse_checklist(&json!({}), &allowed).is_err());
    }
}
