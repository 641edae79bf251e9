use crate::db;
use crate::ipc::helpers::{get_grade, get_optional_grade, get_required_str, with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::Subject;
use rusqlite::Connection;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use super::students::ensure_id;

// Caps and thresholds are checked here, on entry; grading itself accepts any number.
fn check_subject(s: &Subject) -> Result<(), String> {
    if s.name.trim().is_empty() {
        return Err("subject.name must not be empty".into());
    }
    if !(s.max_continuous >= 0.0) || !(s.max_exam >= 0.0) {
        return Err("maxContinuous and maxExam must be non-negative".into());
    }
    if let Some(p) = s.pass_percentage {
        if !(0.0..=100.0).contains(&p) {
            return Err("passPercentage must be in 0..=100".into());
        }
    }
    if let Some(scale) = &s.level_scale {
        for range in scale {
            if range.name.trim().is_empty() {
                return Err("levelScale names must not be empty".into());
            }
            if !(0.0..=100.0).contains(&range.min_percent) {
                return Err(format!("levelScale '{}' minPercent must be in 0..=100", range.name));
            }
        }
    }
    Ok(())
}

fn subjects_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let grade = get_optional_grade(params, "grade")?;
    let subjects = db::list_subjects(conn, grade).map_err(HandlerErr::query)?;
    Ok(json!({ "subjects": subjects }))
}

fn subjects_upsert(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let Some(mut obj) = params.get("subject").and_then(|v| v.as_object()).cloned() else {
        return Err(HandlerErr::bad_params("subject must be an object"));
    };
    ensure_id(&mut obj);
    let subject: Subject = serde_json::from_value(Value::Object(obj))
        .map_err(|e| HandlerErr::bad_params(format!("invalid subject: {}", e)))?;
    check_subject(&subject).map_err(HandlerErr::bad_params)?;
    db::upsert_subject(conn, &subject).map_err(HandlerErr::update)?;
    Ok(json!({ "subject": subject }))
}

fn subjects_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let subject_id = get_required_str(params, "subjectId")?;
    match db::delete_subject(conn, &subject_id).map_err(HandlerErr::update)? {
        Some(deleted_grades) => Ok(json!({ "ok": true, "deletedGrades": deleted_grades })),
        None => Err(HandlerErr::not_found("subject not found")),
    }
}

// Copies add to the target grade; its existing subjects stay.
fn subjects_copy_grade(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let from = get_grade(params, "from")?;
    let to = get_grade(params, "to")?;
    let source = db::list_subjects(conn, Some(from)).map_err(HandlerErr::query)?;
    if source.is_empty() {
        return Err(HandlerErr::not_found("source grade has no subjects")
            .with_details(json!({ "from": from })));
    }

    let clones: Vec<Subject> = source
        .into_iter()
        .map(|s| Subject {
            id: Uuid::new_v4().to_string(),
            grade: to,
            ..s
        })
        .collect();
    let copied = db::insert_subjects(conn, &clones).map_err(HandlerErr::update)?;
    info!(from = from.label(), to = to.label(), copied, "subjects copied between grades");
    Ok(json!({ "copied": copied, "subjects": clones }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(with_conn(state, req, subjects_list)),
        "subjects.upsert" => Some(with_conn(state, req, subjects_upsert)),
        "subjects.delete" => Some(with_conn(state, req, subjects_delete)),
        "subjects.copyGrade" => Some(with_conn(state, req, subjects_copy_grade)),
        _ => None,
    }
}
