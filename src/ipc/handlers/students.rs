use crate::ipc::error::{respond, HandlerError};
use crate::ipc::helpers::{db_conn, optional_str, require_student, required_str};
use crate::ipc::types::{AppState, Request};
use crate::store::students::{self, StudentPatch};
use rusqlite::Connection;
use serde_json::{json, Value};

fn ensure_halaqah(conn: &Connection, halaqah_id: &str) -> Result<(), HandlerError> {
    if students::halaqah_exists(conn, halaqah_id).map_err(HandlerError::query)? {
        Ok(())
    } else {
        Err(HandlerError::not_found("halaqah"))
    }
}

fn halaqahs_list(state: &mut AppState, _req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let rows = students::list_halaqahs(conn).map_err(HandlerError::query)?;
    Ok(json!({ "halaqahs": rows }))
}

fn halaqahs_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let name = required_str(&req.params, "name")?;
    let supervisor = optional_str(&req.params, "supervisor");
    let id = students::create_halaqah(conn, &name, supervisor.as_deref())
        .map_err(|e| HandlerError::insert("halaqahs", e))?;
    Ok(json!({ "halaqahId": id }))
}

fn halaqahs_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let halaqah_id = required_str(&req.params, "halaqahId")?;
    let removed = students::delete_halaqah(conn, &halaqah_id)
        .map_err(|e| HandlerError::delete("halaqahs", e))?;
    if !removed {
        return Err(HandlerError::not_found("halaqah"));
    }
    Ok(json!({ "ok": true }))
}

fn students_list(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let halaqah_id = optional_str(&req.params, "halaqahId");
    let rows = students::list_students(conn, halaqah_id.as_deref()).map_err(HandlerError::query)?;
    Ok(json!({ "students": rows }))
}

fn students_create(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let name = required_str(&req.params, "name")?;
    let halaqah_id = optional_str(&req.params, "halaqahId");
    if let Some(hid) = halaqah_id.as_deref() {
        ensure_halaqah(conn, hid)?;
    }
    let id = students::create_student(conn, &name, halaqah_id.as_deref())
        .map_err(|e| HandlerError::insert("students", e))?;
    Ok(json!({ "studentId": id }))
}

fn parse_student_patch(conn: &Connection, patch: &serde_json::Map<String, Value>) -> Result<StudentPatch, HandlerError> {
    let mut out = StudentPatch::default();
    for (k, v) in patch {
        match k.as_str() {
            "name" => {
                let name = v
                    .as_str()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| HandlerError::bad_params("patch.name must be a non-empty string"))?;
                out.name = Some(name);
            }
            "halaqahId" => {
                if v.is_null() {
                    out.halaqah_id = Some(None);
                } else {
                    let hid = v
                        .as_str()
                        .map(|s| s.trim().to_string())
                        .ok_or_else(|| HandlerError::bad_params("patch.halaqahId must be string or null"))?;
                    ensure_halaqah(conn, &hid)?;
                    out.halaqah_id = Some(Some(hid));
                }
            }
            "active" => {
                out.active = Some(
                    v.as_bool()
                        .ok_or_else(|| HandlerError::bad_params("patch.active must be boolean"))?,
                );
            }
            _ => return Err(HandlerError::bad_params(format!("unknown patch field: {}", k))),
        }
    }
    Ok(out)
}

fn students_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let student_id = required_str(&req.params, "studentId")?;
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerError::bad_params("patch must be an object"));
    };
    let patch = parse_student_patch(conn, patch_obj)?;
    let updated = students::update_student(conn, &student_id, &patch)
        .map_err(|e| HandlerError::update("students", e))?;
    if !updated {
        return Err(HandlerError::not_found("student"));
    }
    let student = require_student(conn, &student_id)?;
    Ok(json!({ "student": student }))
}

fn students_delete(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let student_id = required_str(&req.params, "studentId")?;
    let removed = students::delete_student(conn, &student_id)
        .map_err(|e| HandlerError::delete("students", e))?;
    if !removed {
        return Err(HandlerError::not_found("student"));
    }
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let outcome = match req.method.as_str() {
        "halaqahs.list" => halaqahs_list(state, req),
        "halaqahs.create" => halaqahs_create(state, req),
        "halaqahs.delete" => halaqahs_delete(state, req),
        "students.list" => students_list(state, req),
        "students.create" => students_create(state, req),
        "students.update" => students_update(state, req),
        "students.delete" => students_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, &req.method, outcome))
}
