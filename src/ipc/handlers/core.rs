use crate::ipc::error::{respond, HandlerError};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, _req: &Request) -> Result<serde_json::Value, HandlerError> {
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
    }))
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerError> {
    let path = PathBuf::from(required_str(&req.params, "path")?);
    state.open_workspace(&path).map_err(|e| HandlerError::Db {
        code: "db_open_failed",
        message: format!("{:#}", e),
        table: None,
    })?;
    tracing::info!(workspace = %path.to_string_lossy(), "workspace selected");
    Ok(json!({ "workspacePath": path.to_string_lossy() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "health" => handle_health(state, req),
        "workspace.select" => handle_workspace_select(state, req),
        _ => return None,
    };
    Some(respond(&req.id, &req.method, outcome))
}
