use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("{0}")]
    BadParams(String),
    #[error("{0}")]
    NotFound(String),
    #[error("select a workspace first")]
    NoWorkspace,
    /// Store failure; `code` is the wire code (`db_query_failed`, ...).
    #[error("{message}")]
    Db {
        code: &'static str,
        message: String,
        table: Option<&'static str>,
    },
}

impl HandlerError {
    pub fn bad_params(message: impl Into<String>) -> Self {
        HandlerError::BadParams(message.into())
    }

    pub fn not_found(what: &str) -> Self {
        HandlerError::NotFound(format!("{} not found", what))
    }

    pub fn query(e: anyhow::Error) -> Self {
        HandlerError::Db {
            code: "db_query_failed",
            message: format!("{:#}", e),
            table: None,
        }
    }

    pub fn insert(table: &'static str, e: anyhow::Error) -> Self {
        HandlerError::Db {
            code: "db_insert_failed",
            message: format!("{:#}", e),
            table: Some(table),
        }
    }

    pub fn update(table: &'static str, e: anyhow::Error) -> Self {
        HandlerError::Db {
            code: "db_update_failed",
            message: format!("{:#}", e),
            table: Some(table),
        }
    }

    pub fn delete(table: &'static str, e: anyhow::Error) -> Self {
        HandlerError::Db {
            code: "db_delete_failed",
            message: format!("{:#}", e),
            table: Some(table),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            HandlerError::BadParams(_) => "bad_params",
            HandlerError::NotFound(_) => "not_found",
            HandlerError::NoWorkspace => "no_workspace",
            HandlerError::Db { code, .. } => *code,
        }
    }

    pub fn response(&self, id: &str) -> serde_json::Value {
        let details = match self {
            HandlerError::Db { table: Some(t), .. } => Some(json!({ "table": t })),
            _ => None,
        };
        err(id, self.code(), self.to_string(), details)
    }
}

/// Wrap a handler outcome into the wire envelope.
pub fn respond(
    id: &str,
    method: &str,
    outcome: Result<serde_json::Value, HandlerError>,
) -> serde_json::Value {
    match outcome {
        Ok(result) => ok(id, result),
        Err(e) => {
            match &e {
                HandlerError::Db { .. } => {
                    tracing::error!(%method, code = e.code(), error = %e, "request failed")
                }
                _ => tracing::warn!(%method, code = e.code(), error = %e, "request rejected"),
            }
            e.response(id)
        }
    }
}
