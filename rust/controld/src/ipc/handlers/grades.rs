use crate::calc;
use crate::db;
use crate::ipc::helpers::{get_optional_term, get_required_str, get_term, with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::GradeRecord;
use rusqlite::Connection;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use tracing::warn;

fn grades_list(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let subject_id = get_required_str(params, "subjectId")?;
    let term = get_optional_term(params, "term")?;
    let records =
        db::list_grade_records_for_subject(conn, &subject_id, term).map_err(HandlerErr::query)?;
    Ok(json!({ "records": records }))
}

fn grades_upsert(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let Some(raw) = params.get("records").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("records must be an array"));
    };
    let mut records: Vec<GradeRecord> = Vec::with_capacity(raw.len());
    for (i, item) in raw.iter().enumerate() {
        let r: GradeRecord = serde_json::from_value(item.clone())
            .map_err(|e| HandlerErr::bad_params(format!("records[{}]: {}", i, e)))?;
        records.push(r);
    }
    if records.is_empty() {
        return Ok(json!({ "upserted": 0 }));
    }

    let students = db::list_students(conn, None).map_err(HandlerErr::query)?;
    let subject_ids: BTreeSet<&str> = records.iter().map(|r| r.subject_id.as_str()).collect();
    let mut issues = Vec::new();
    for subject_id in subject_ids {
        // Entries for unknown subjects are stored unchecked.
        let Some(subject) = db::get_subject(conn, subject_id).map_err(HandlerErr::query)? else {
            continue;
        };
        issues.extend(calc::validate_entries(&students, &subject, &records));
    }
    if !issues.is_empty() {
        warn!(count = issues.len(), "rejected grade batch with out-of-range scores");
        return Err(
            HandlerErr::new("score_out_of_range", "one or more scores exceed the subject maximum")
                .with_details(json!({ "issues": issues })),
        );
    }

    let upserted = db::upsert_grade_records(conn, &records).map_err(HandlerErr::update)?;
    Ok(json!({ "upserted": upserted }))
}

fn grades_level_distribution(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let subject_id = get_required_str(params, "subjectId")?;
    let term = get_term(params, "term")?;
    let Some(subject) = db::get_subject(conn, &subject_id).map_err(HandlerErr::query)? else {
        return Err(HandlerErr::not_found("subject not found"));
    };
    let students = db::list_students(conn, Some(subject.grade)).map_err(HandlerErr::query)?;
    let records = db::list_grade_records_for_subject(conn, &subject_id, Some(term))
        .map_err(HandlerErr::query)?;
    let distribution = calc::subject_level_distribution(&subject, &students, &records, term);
    Ok(json!(distribution))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.list" => Some(with_conn(state, req, grades_list)),
        "grades.upsert" => Some(with_conn(state, req, grades_upsert)),
        "grades.levelDistribution" => Some(with_conn(state, req, grades_level_distribution)),
        _ => None,
    }
}
