use crate::db;
use crate::ipc::error::{respond, HandlerError};
use crate::ipc::helpers::db_conn;
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Map, Value};

pub const MAX_LEADERBOARD_SIZE: usize = 20;

#[derive(Clone, Copy)]
pub enum SetupSection {
    Leaderboard,
    Memorization,
    Activities,
    Finance,
}

impl SetupSection {
    const ALL: [SetupSection; 4] = [
        SetupSection::Leaderboard,
        SetupSection::Memorization,
        SetupSection::Activities,
        SetupSection::Finance,
    ];

    fn parse(s: &str) -> Option<Self> {
        match s {
            "leaderboard" => Some(Self::Leaderboard),
            "memorization" => Some(Self::Memorization),
            "activities" => Some(Self::Activities),
            "finance" => Some(Self::Finance),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Leaderboard => "leaderboard",
            Self::Memorization => "memorization",
            Self::Activities => "activities",
            Self::Finance => "finance",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Leaderboard => "setup.leaderboard",
            Self::Memorization => "setup.memorization",
            Self::Activities => "setup.activities",
            Self::Finance => "setup.finance",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Leaderboard => json!({
            "size": 3
        }),
        SetupSection::Memorization => json!({
            "allowActualAboveTarget": true,
            "defaultTargetPages": 2
        }),
        SetupSection::Activities => json!({
            "keys": ["subuhBerjamaah", "tahajud", "dhuha", "tilawah", "murojaah"]
        }),
        SetupSection::Finance => json!({
            "currency": "IDR"
        }),
    }
}

fn as_object_mut(value: &mut Value) -> Result<&mut Map<String, Value>, String> {
    value
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())
}

fn parse_bool(v: &Value, key: &str) -> Result<bool, String> {
    v.as_bool().ok_or_else(|| format!("{} must be boolean", key))
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v.as_i64().ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.is_empty() {
        return Err(format!("{} must not be empty", key));
    }
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn parse_activity_keys(v: &Value) -> Result<Vec<Value>, String> {
    let arr = v.as_array().ok_or_else(|| "keys must be an array".to_string())?;
    if arr.is_empty() {
        return Err("keys must contain at least one activity".into());
    }
    let mut out: Vec<Value> = Vec::with_capacity(arr.len());
    for item in arr {
        let k = parse_string_max(item, "keys[]", 40)?;
        let k = Value::String(k);
        if !out.contains(&k) {
            out.push(k);
        }
    }
    Ok(out)
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = as_object_mut(current)?;
    for (k, v) in patch {
        match section {
            SetupSection::Leaderboard => match k.as_str() {
                "size" => {
                    let max = MAX_LEADERBOARD_SIZE as i64;
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, max)?));
                }
                _ => return Err(format!("unknown leaderboard field: {}", k)),
            },
            SetupSection::Memorization => match k.as_str() {
                "allowActualAboveTarget" => {
                    obj.insert(k.clone(), Value::Bool(parse_bool(v, k)?));
                }
                "defaultTargetPages" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 604)?));
                }
                _ => return Err(format!("unknown memorization field: {}", k)),
            },
            SetupSection::Activities => match k.as_str() {
                "keys" => {
                    obj.insert(k.clone(), Value::Array(parse_activity_keys(v)?));
                }
                _ => return Err(format!("unknown activities field: {}", k)),
            },
            SetupSection::Finance => match k.as_str() {
                "currency" => {
                    let c = parse_string_max(v, k, 8)?.to_ascii_uppercase();
                    obj.insert(k.clone(), Value::String(c));
                }
                _ => return Err(format!("unknown finance field: {}", k)),
            },
        }
    }
    Ok(())
}

pub fn load_section(conn: &Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed historical values fall back to defaults field by field.
            for (k, v) in saved_obj {
                let mut one = Map::new();
                one.insert(k.clone(), v.clone());
                if let Err(msg) = merge_section_patch(section, &mut current, &one) {
                    tracing::warn!(section = section.name(), %msg, "ignoring saved setup value");
                }
            }
        }
    }
    Ok(current)
}

pub fn leaderboard_size(conn: &Connection) -> Result<usize, HandlerError> {
    let v = load_section(conn, SetupSection::Leaderboard).map_err(HandlerError::query)?;
    Ok(v.get("size").and_then(|n| n.as_u64()).unwrap_or(3) as usize)
}

pub struct MemorizationPolicy {
    pub allow_actual_above_target: bool,
    pub default_target_pages: f64,
}

pub fn memorization_policy(conn: &Connection) -> Result<MemorizationPolicy, HandlerError> {
    let v = load_section(conn, SetupSection::Memorization).map_err(HandlerError::query)?;
    Ok(MemorizationPolicy {
        allow_actual_above_target: v
            .get("allowActualAboveTarget")
            .and_then(|b| b.as_bool())
            .unwrap_or(true),
        default_target_pages: v
            .get("defaultTargetPages")
            .and_then(|n| n.as_f64())
            .unwrap_or(2.0),
    })
}

pub fn activity_keys(conn: &Connection) -> Result<Vec<String>, HandlerError> {
    let v = load_section(conn, SetupSection::Activities).map_err(HandlerError::query)?;
    Ok(v.get("keys")
        .and_then(|a| a.as_array())
        .map(|a| {
            a.iter()
                .filter_map(|k| k.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default())
}

pub fn currency(conn: &Connection) -> Result<String, HandlerError> {
    let v = load_section(conn, SetupSection::Finance).map_err(HandlerError::query)?;
    Ok(v.get("currency")
        .and_then(|c| c.as_str())
        .unwrap_or("IDR")
        .to_string())
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let sections: Vec<SetupSection> = match req.params.get("section").and_then(|v| v.as_str()) {
        Some(raw) => vec![SetupSection::parse(raw)
            .ok_or_else(|| HandlerError::bad_params("unknown section"))?],
        None => SetupSection::ALL.to_vec(),
    };
    let mut out = Map::new();
    for section in sections {
        let v = load_section(conn, section).map_err(HandlerError::query)?;
        out.insert(section.name().to_string(), v);
    }
    Ok(Value::Object(out))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> Result<Value, HandlerError> {
    let conn = db_conn(state)?;
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return Err(HandlerError::bad_params("missing section"));
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return Err(HandlerError::bad_params("unknown section"));
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerError::bad_params("patch must be an object"));
    };

    let mut current = load_section(conn, section).map_err(HandlerError::query)?;
    merge_section_patch(section, &mut current, patch_obj).map_err(HandlerError::BadParams)?;
    db::settings_set_json(conn, section.key(), &current)
        .map_err(|e| HandlerError::update("settings", e))?;
    let mut out = Map::new();
    out.insert(section.name().to_string(), current);
    Ok(Value::Object(out))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    let outcome = match req.method.as_str() {
        "setup.get" => handle_setup_get(state, req),
        "setup.update" => handle_setup_update(state, req),
        _ => return None,
    };
    Some(respond(&req.id, &req.method, outcome))
}
