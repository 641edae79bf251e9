use crate::db;
use crate::ipc::helpers::{get_optional_grade, get_required_str, with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::Student;
use rusqlite::Connection;
use serde_json::{json, Value};
use uuid::Uuid;

/// Fills in a fresh id when the caller sends none (or an empty one).
pub(super) fn ensure_id(obj: &mut serde_json::Map<String, Value>) -> String {
    let existing = obj
        .get("id")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let id = existing.unwrap_or_else(|| Uuid::new_v4().to_string());
    obj.insert("id".to_string(), Value::String(id.clone()));
    id
}

fn students_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let grade = get_optional_grade(params, "grade")?;
    let students = db::list_students(conn, grade).map_err(HandlerErr::query)?;
    Ok(json!({ "students": students }))
}

fn students_upsert(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let Some(mut obj) = params.get("student").and_then(|v| v.as_object()).cloned() else {
        return Err(HandlerErr::bad_params("student must be an object"));
    };
    ensure_id(&mut obj);
    let student: Student = serde_json::from_value(Value::Object(obj))
        .map_err(|e| HandlerErr::bad_params(format!("invalid student: {}", e)))?;
    if student.name.trim().is_empty() {
        return Err(HandlerErr::bad_params("student.name must not be empty"));
    }
    db::upsert_student(conn, &student).map_err(HandlerErr::update)?;
    Ok(json!({ "student": student }))
}

fn students_delete(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    match db::delete_student(conn, &student_id).map_err(HandlerErr::update)? {
        Some(deleted_grades) => Ok(json!({ "ok": true, "deletedGrades": deleted_grades })),
        None => Err(HandlerErr::not_found("student not found")),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(with_conn(state, req, students_list)),
        "students.upsert" => Some(with_conn(state, req, students_upsert)),
        "students.delete" => Some(with_conn(state, req, students_delete)),
        _ => None,
    }
}
