use crate::calc;
use crate::db;
use crate::ipc::helpers::{get_grade, get_required_str, with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::Grade;
use crate::ranking::{self, RankedReport, ReportTerm, ViewMode};
use rusqlite::Connection;
use serde_json::{json, Value};

fn parse_report_term(params: &Value) -> Result<ReportTerm, HandlerErr> {
    let Some(raw) = params.get("term") else {
        return Err(HandlerErr::bad_params("missing term"));
    };
    ReportTerm::from_json(raw).ok_or_else(|| {
        HandlerErr::bad_params("term must be one of: 1, 2, final").with_details(json!({ "term": raw }))
    })
}

fn parse_view(params: &Value) -> Result<ViewMode, HandlerErr> {
    match params.get("view").and_then(|v| v.as_str()) {
        None => Ok(ViewMode::All),
        Some(s) => ViewMode::parse(s).ok_or_else(|| {
            HandlerErr::bad_params("view must be one of: all, top, failed")
                .with_details(json!({ "view": s }))
        }),
    }
}

fn ranked_cohort(conn: &Connection, grade: Grade, term: ReportTerm) -> Result<Vec<RankedReport>, HandlerErr> {
    let students = db::list_students(conn, Some(grade)).map_err(HandlerErr::query)?;
    let subjects = db::list_subjects(conn, Some(grade)).map_err(HandlerErr::query)?;
    let records = db::list_grade_records(conn).map_err(HandlerErr::query)?;
    let reports = calc::compile_cohort(grade, &students, &subjects, &records);
    Ok(ranking::rank_cohort(reports, term))
}

fn reports_student(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let Some(student) = db::get_student(conn, &student_id).map_err(HandlerErr::query)? else {
        return Err(HandlerErr::not_found("student not found"));
    };
    let subjects = db::list_subjects(conn, Some(student.grade)).map_err(HandlerErr::query)?;
    let records = db::list_grade_records_for_student(conn, &student.id).map_err(HandlerErr::query)?;
    Ok(json!(calc::compile_report(&student, &subjects, &records)))
}

fn reports_cohort(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let grade = get_grade(params, "grade")?;
    let term = parse_report_term(params)?;
    let view = parse_view(params)?;

    let ranked = ranked_cohort(conn, grade, term)?;
    // Stats describe the whole cohort, not the filtered view.
    let stats = ranking::cohort_stats(&ranked);
    let results = ranking::apply_view(ranked, view);
    Ok(json!({
        "grade": grade,
        "term": term,
        "view": view,
        "results": results,
        "stats": stats,
    }))
}

fn reports_stats(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let grade = get_grade(params, "grade")?;
    let term = parse_report_term(params)?;
    let ranked = ranked_cohort(conn, grade, term)?;
    Ok(json!(ranking::cohort_stats(&ranked)))
}

fn reports_dashboard(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    let students = db::list_students(conn, None).map_err(HandlerErr::query)?;
    let subjects = db::list_subjects(conn, None).map_err(HandlerErr::query)?;
    let records = db::list_grade_records(conn).map_err(HandlerErr::query)?;
    Ok(json!(ranking::school_summary(&students, &subjects, &records)))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.student" => Some(with_conn(state, req, reports_student)),
        "reports.cohort" => Some(with_conn(state, req, reports_cohort)),
        "reports.stats" => Some(with_conn(state, req, reports_stats)),
        "reports.dashboard" => Some(with_conn(state, req, reports_dashboard)),
        _ => None,
    }
}
