use crate::control;
use crate::db;
use crate::ipc::helpers::{get_grade, get_optional_i64, with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Value};
use tracing::info;

use super::settings::{control_defaults, parse_i64_range, START_SEAT_MAX, START_SEAT_MIN};

fn control_assign_seats(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let grade = get_grade(params, "grade")?;
    let start = match params.get("startNumber").filter(|v| !v.is_null()) {
        Some(v) => parse_i64_range(v, "startNumber", START_SEAT_MIN, START_SEAT_MAX)
            .map_err(|msg| HandlerErr::bad_params(msg).with_details(json!({ "startNumber": v })))?,
        None => control_defaults(conn).map_err(HandlerErr::query)?.0,
    };

    let roster = db::list_students(conn, None).map_err(HandlerErr::query)?;
    let (updated, assigned) = control::assign_seats(&roster, grade, start);
    let numbered: Vec<_> = updated.into_iter().filter(|s| s.grade == grade).collect();
    db::save_seating_numbers(conn, &numbered).map_err(HandlerErr::update)?;

    info!(grade = grade.label(), start, assigned, "seat numbers assigned");
    Ok(json!({ "assigned": assigned, "students": numbered }))
}

fn control_committees(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let grade = get_grade(params, "grade")?;
    let size = match get_optional_i64(params, "committeeSize")? {
        Some(n) => n,
        None => control_defaults(conn).map_err(HandlerErr::query)?.1,
    };
    let size = usize::try_from(size.max(1)).unwrap_or(1);

    let students = db::list_students(conn, Some(grade)).map_err(HandlerErr::query)?;
    let committees = control::partition_committees(&students, size);
    Ok(json!({ "count": committees.len(), "committees": committees }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "control.assignSeats" => Some(with_conn(state, req, control_assign_seats)),
        "control.committees" => Some(with_conn(state, req, control_committees)),
        _ => None,
    }
}
