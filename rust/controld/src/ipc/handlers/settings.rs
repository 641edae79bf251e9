use crate::db;
use crate::ipc::helpers::{get_required_str, with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::{json, Map, Value};

pub const DEFAULT_START_SEAT: i64 = 1001;
pub const DEFAULT_COMMITTEE_SIZE: i64 = 20;
pub const START_SEAT_MIN: i64 = 0;
pub const START_SEAT_MAX: i64 = 10_000_000;

const SCHOOL_TEXT_FIELDS: [&str; 6] = [
    "schoolName",
    "directorate",
    "principal",
    "collectorName",
    "controlHeadName",
    "activeYear",
];

#[derive(Clone, Copy)]
enum SettingsSection {
    School,
    Control,
}

impl SettingsSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "school" => Some(Self::School),
            "control" => Some(Self::Control),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::School => "settings.school",
            Self::Control => "settings.control",
        }
    }
}

fn default_section(section: SettingsSection) -> Value {
    match section {
        SettingsSection::School => json!({
            "schoolName": "",
            "directorate": "",
            "principal": "",
            "collectorName": "",
            "controlHeadName": "",
            "activeYear": ""
        }),
        SettingsSection::Control => json!({
            "startSeatNumber": DEFAULT_START_SEAT,
            "committeeSize": DEFAULT_COMMITTEE_SIZE
        }),
    }
}

pub(super) fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v.as_i64().ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.chars().count() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn merge_section_patch(
    section: SettingsSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal settings object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SettingsSection::School => {
                if !SCHOOL_TEXT_FIELDS.contains(&k.as_str()) {
                    return Err(format!("unknown school field: {}", k));
                }
                let max_len = if k == "activeYear" { 20 } else { 120 };
                obj.insert(k.clone(), Value::String(parse_string_max(v, k, max_len)?));
            }
            SettingsSection::Control => match k.as_str() {
                "startSeatNumber" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, START_SEAT_MIN, START_SEAT_MAX)?));
                }
                "committeeSize" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 500)?));
                }
                _ => return Err(format!("unknown control field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &Connection, section: SettingsSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // A stale or malformed saved blob falls back to defaults.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

/// Seat numbering start and committee size as currently configured.
pub fn control_defaults(conn: &Connection) -> anyhow::Result<(i64, i64)> {
    let control = load_section(conn, SettingsSection::Control)?;
    let start = control
        .get("startSeatNumber")
        .and_then(|v| v.as_i64())
        .unwrap_or(DEFAULT_START_SEAT);
    let size = control
        .get("committeeSize")
        .and_then(|v| v.as_i64())
        .unwrap_or(DEFAULT_COMMITTEE_SIZE);
    Ok((start, size))
}

fn settings_get(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    let school = load_section(conn, SettingsSection::School).map_err(HandlerErr::query)?;
    let control = load_section(conn, SettingsSection::Control).map_err(HandlerErr::query)?;
    Ok(json!({
        "school": school,
        "control": control
    }))
}

fn settings_update(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let section_raw = get_required_str(params, "section")?;
    let Some(section) = SettingsSection::parse(&section_raw) else {
        return Err(HandlerErr::bad_params("unknown section")
            .with_details(json!({ "section": section_raw })));
    };
    let Some(patch) = params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("patch must be an object"));
    };

    let mut current = load_section(conn, section).map_err(HandlerErr::query)?;
    merge_section_patch(section, &mut current, patch).map_err(HandlerErr::bad_params)?;
    db::settings_set_json(conn, section.key(), &current).map_err(HandlerErr::update)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "settings.get" => Some(with_conn(state, req, settings_get)),
        "settings.update" => Some(with_conn(state, req, settings_update)),
        _ => None,
    }
}
