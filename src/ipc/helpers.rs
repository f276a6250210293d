use crate::calc::{Semester, Window};
use crate::ipc::error::HandlerError;
use crate::ipc::types::AppState;
use crate::records::parse_record_date;
use crate::store::students::{self, Student};
use rusqlite::Connection;
use serde_json::Value;

pub fn db_conn(state: &AppState) -> Result<&Connection, HandlerError> {
    state.db.as_ref().ok_or(HandlerError::NoWorkspace)
}

/// Trimmed, non-empty string parameter.
pub fn required_str(params: &Value, key: &str) -> Result<String, HandlerError> {
    let Some(raw) = params.get(key).and_then(|v| v.as_str()) else {
        return Err(HandlerError::bad_params(format!("missing {}", key)));
    };
    let t = raw.trim();
    if t.is_empty() {
        return Err(HandlerError::bad_params(format!("{} must not be empty", key)));
    }
    Ok(t.to_string())
}

pub fn optional_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Dates are stored as `YYYY-MM-DD`; timestamps are cut down to their date.
pub fn required_date(params: &Value, key: &str) -> Result<String, HandlerError> {
    let raw = required_str(params, key)?;
    let Some(d) = parse_record_date(&raw) else {
        return Err(HandlerError::bad_params(format!(
            "{} must be a YYYY-MM-DD date",
            key
        )));
    };
    Ok(d.format("%Y-%m-%d").to_string())
}

fn window_year(obj: &serde_json::Map<String, Value>) -> Result<i32, HandlerError> {
    let year = obj
        .get("year")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerError::bad_params("window.year must be integer"))?;
    if !(1..=9999).contains(&year) {
        return Err(HandlerError::bad_params("window.year must be in 1..=9999"));
    }
    Ok(year as i32)
}

/// `{"month": 0..11, "year": y}` or `{"semester": 1|2, "year": y}`. Absent or
/// null means no window.
pub fn parse_window(raw: Option<&Value>) -> Result<Option<Window>, HandlerError> {
    let Some(raw) = raw else { return Ok(None) };
    if raw.is_null() {
        return Ok(None);
    }
    let Some(obj) = raw.as_object() else {
        return Err(HandlerError::bad_params("window must be an object"));
    };
    let year = window_year(obj)?;
    if let Some(s) = obj.get("semester") {
        let semester = s
            .as_i64()
            .and_then(Semester::from_number)
            .ok_or_else(|| HandlerError::bad_params("window.semester must be 1 or 2"))?;
        return Ok(Some(Window::Semester { year, semester }));
    }
    if let Some(m) = obj.get("month") {
        let month0 = m
            .as_i64()
            .filter(|m| (0..=11).contains(m))
            .ok_or_else(|| HandlerError::bad_params("window.month must be in 0..=11"))?;
        return Ok(Some(Window::Month {
            year,
            month0: month0 as u32,
        }));
    }
    Err(HandlerError::bad_params(
        "window needs either month or semester",
    ))
}

pub fn required_window(params: &Value) -> Result<Window, HandlerError> {
    parse_window(params.get("window"))?.ok_or_else(|| HandlerError::bad_params("missing window"))
}

pub fn require_student(conn: &Connection, student_id: &str) -> Result<Student, HandlerError> {
    students::get_student(conn, student_id)
        .map_err(HandlerError::query)?
        .ok_or_else(|| HandlerError::not_found("student"))
}

/// Statistics are keyed by student name. Accepts `studentName` directly or
/// resolves `studentId`.
pub fn target_student_name(conn: &Connection, params: &Value) -> Result<String, HandlerError> {
    if let Some(name) = optional_str(params, "studentName") {
        return Ok(name);
    }
    let student_id = required_str(params, "studentId")?;
    Ok(require_student(conn, &student_id)?.name)
}

/// Optional positive count parameter, clamped to `max`.
pub fn optional_count(params: &Value, key: &str, max: usize) -> Result<Option<usize>, HandlerError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => {
            let n = v
                .as_u64()
                .filter(|n| *n >= 1)
                .ok_or_else(|| HandlerError::bad_params(format!("{} must be a positive integer", key)))?;
            Ok(Some((n as usize).min(max)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn window_parsing() {
        assert_eq!(parse_window(None).unwrap(), None);
        assert_eq!(parse_window(Some(&json!(null))).unwrap(), None);
        assert_eq!(
            parse_window(Some(&json!({ "month": 6, "year": 2025 }))).unwrap(),
            Some(Window::Month { year: 2025, month0: 6 })
        );
        assert_eq!(
            parse_window(Some(&json!({ "semester": 2, "year": 2025 }))).unwrap(),
            Some(Window::Semester { year: 2025, semester: Semester::Second })
        );
        assert!(parse_window(Some(&json!({ "month": 12, "year": 2025 }))).is_err());
        assert!(parse_window(Some(&json!({ "semester": 3, "year": 2025 }))).is_err());
        assert!(parse_window(Some(&json!({ "month": 1 }))).is_err());
        assert!(parse_window(Some(&json!({ "year": 2025 }))).is_err());
        assert!(parse_window(Some(&json!("2025-07"))).is_err());
    }

    #[test]
    fn dates_are_normalized() {
        let p = json!({ "date": "2025-07-01T10:00:00Z", "bad": "1/7/2025" });
        assert_eq!(required_date(&p, "date").unwrap(), "2025-07-01");
        assert!(required_date(&p, "bad").is_err());
        assert!(required_date(&p, "missing").is_err());
    }

    #[test]
    fn optional_count_clamps() {
        let p = json!({ "n": 50, "zero": 0, "neg": -1 });
        assert_eq!(optional_count(&p, "n", 20).unwrap(), Some(20));
        assert_eq!(optional_count(&p, "absent", 20).unwrap(), None);
        assert!(optional_count(&p, "zero", 20).is_err());
        assert!(optional_count(&p, "neg", 20).is_err());
    }
}
