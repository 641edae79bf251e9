use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{Grade, Term};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::fmt::Display;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }

    pub fn query<E: Display>(e: E) -> Self {
        Self::new("db_query_failed", format!("{:#}", e))
    }

    pub fn update<E: Display>(e: E) -> Self {
        Self::new("db_update_failed", format!("{:#}", e))
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

/// Runs `f` against the open workspace, mapping its outcome into a response envelope.
pub fn with_conn<F>(state: &AppState, req: &Request, f: F) -> Value
where
    F: FnOnce(&Connection, &Value) -> Result<Value, HandlerErr>,
{
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match f(conn, &req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_grade(params: &Value, key: &str) -> Result<Option<Grade>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => {
            let parsed = v.as_str().and_then(Grade::parse);
            match parsed {
                Some(g) => Ok(Some(g)),
                None => Err(HandlerErr::bad_params(format!("{} must be a grade label or G1..G12", key))
                    .with_details(json!({ key: v }))),
            }
        }
    }
}

pub fn get_grade(params: &Value, key: &str) -> Result<Grade, HandlerErr> {
    get_optional_grade(params, key)?.ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_term(params: &Value, key: &str) -> Result<Option<Term>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_i64()
            .and_then(Term::from_number)
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be 1 or 2", key))),
    }
}

pub fn get_term(params: &Value, key: &str) -> Result<Term, HandlerErr> {
    get_optional_term(params, key)?.ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_optional_i64(params: &Value, key: &str) -> Result<Option<i64>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_i64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be integer", key))),
    }
}
