use crate::model::{Grade, GradeRecord, LevelRange, Religion, Student, Subject, Term};
use anyhow::Context;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};
use std::path::Path;

pub const DB_FILE_NAME: &str = "control.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)
        .with_context(|| format!("create workspace {}", workspace.display()))?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("open {}", db_path.display()))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            grade TEXT NOT NULL,
            section TEXT NOT NULL DEFAULT '',
            religion TEXT,
            seating_number INTEGER,
            photo_url TEXT,
            sort_order INTEGER NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_students_grade_sort ON students(grade, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            grade TEXT NOT NULL,
            max_continuous REAL NOT NULL DEFAULT 0,
            max_exam REAL NOT NULL DEFAULT 0,
            pass_percentage REAL,
            level_scale_json TEXT,
            sort_order INTEGER NOT NULL,
            updated_at TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_subjects_grade_sort ON subjects(grade, sort_order)",
        [],
    )?;

    // No foreign keys: a dangling student/subject id simply matches nothing.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS grade_records(
            student_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            term INTEGER NOT NULL,
            continuous REAL NOT NULL DEFAULT 0,
            exam REAL NOT NULL DEFAULT 0,
            absent INTEGER NOT NULL DEFAULT 0,
            continuous_absent INTEGER NOT NULL DEFAULT 0,
            exam_absent INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT,
            PRIMARY KEY(student_id, subject_id, term)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grade_records_subject_term ON grade_records(subject_id, term)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

fn now_stamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn conversion_err(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

fn grade_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Grade> {
    let raw: String = row.get(idx)?;
    Grade::parse(&raw).ok_or_else(|| conversion_err(idx, format!("unknown grade: {}", raw)))
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    let religion: Option<String> = row.get(4)?;
    let religion = match religion {
        None => None,
        Some(r) => Some(
            Religion::parse(&r).ok_or_else(|| conversion_err(4, format!("unknown religion: {}", r)))?,
        ),
    };
    Ok(Student {
        id: row.get(0)?,
        name: row.get(1)?,
        grade: grade_at(row, 2)?,
        section: row.get(3)?,
        religion,
        seating_number: row.get(5)?,
        photo_url: row.get(6)?,
    })
}

const STUDENT_COLUMNS: &str = "id, name, grade, section, religion, seating_number, photo_url";

/// Roster in entry order, optionally restricted to one grade.
pub fn list_students(conn: &Connection, grade: Option<Grade>) -> anyhow::Result<Vec<Student>> {
    let students = match grade {
        Some(g) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM students WHERE grade = ? ORDER BY sort_order, rowid",
                STUDENT_COLUMNS
            ))?;
            let rows = stmt.query_map([g.label()], student_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM students ORDER BY sort_order, rowid",
                STUDENT_COLUMNS
            ))?;
            let rows = stmt.query_map([], student_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(students)
}

pub fn get_student(conn: &Connection, id: &str) -> anyhow::Result<Option<Student>> {
    let student = conn
        .query_row(
            &format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS),
            [id],
            student_from_row,
        )
        .optional()?;
    Ok(student)
}

fn next_sort_order(conn: &Connection, table: &str) -> anyhow::Result<i64> {
    let sql = format!("SELECT COALESCE(MAX(sort_order), -1) + 1 FROM {}", table);
    Ok(conn.query_row(&sql, [], |r| r.get(0))?)
}

/// Inserts a new student at the end of the roster, or updates in place.
pub fn upsert_student(conn: &Connection, s: &Student) -> anyhow::Result<()> {
    let sort_order = next_sort_order(conn, "students")?;
    conn.execute(
        "INSERT INTO students(id, name, grade, section, religion, seating_number, photo_url, sort_order, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            grade = excluded.grade,
            section = excluded.section,
            religion = excluded.religion,
            seating_number = excluded.seating_number,
            photo_url = excluded.photo_url,
            updated_at = excluded.updated_at",
        (
            &s.id,
            &s.name,
            s.grade.label(),
            &s.section,
            s.religion.map(Religion::as_str),
            s.seating_number,
            &s.photo_url,
            sort_order,
            now_stamp(),
        ),
    )?;
    Ok(())
}

/// Removes the student and their grade records. Returns `None` if absent,
/// otherwise the number of grade records removed.
pub fn delete_student(conn: &Connection, id: &str) -> anyhow::Result<Option<usize>> {
    let tx = conn.unchecked_transaction()?;
    let removed = tx.execute("DELETE FROM students WHERE id = ?", [id])?;
    if removed == 0 {
        return Ok(None);
    }
    let grades = tx.execute("DELETE FROM grade_records WHERE student_id = ?", [id])?;
    tx.commit()?;
    Ok(Some(grades))
}

/// Persists seat numbers of the given students in one transaction.
pub fn save_seating_numbers(conn: &Connection, students: &[Student]) -> anyhow::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut updated = 0;
    {
        let mut stmt =
            tx.prepare("UPDATE students SET seating_number = ?, updated_at = ? WHERE id = ?")?;
        let stamp = now_stamp();
        for s in students {
            updated += stmt.execute((s.seating_number, &stamp, &s.id))?;
        }
    }
    tx.commit()?;
    Ok(updated)
}

fn subject_from_row(row: &Row<'_>) -> rusqlite::Result<Subject> {
    let scale_json: Option<String> = row.get(6)?;
    let level_scale = match scale_json {
        None => None,
        Some(text) => Some(
            serde_json::from_str::<Vec<LevelRange>>(&text)
                .map_err(|e| conversion_err(6, e.to_string()))?,
        ),
    };
    Ok(Subject {
        id: row.get(0)?,
        name: row.get(1)?,
        grade: grade_at(row, 2)?,
        max_continuous: row.get(3)?,
        max_exam: row.get(4)?,
        pass_percentage: row.get(5)?,
        level_scale,
    })
}

const SUBJECT_COLUMNS: &str =
    "id, name, grade, max_continuous, max_exam, pass_percentage, level_scale_json";

pub fn list_subjects(conn: &Connection, grade: Option<Grade>) -> anyhow::Result<Vec<Subject>> {
    let subjects = match grade {
        Some(g) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM subjects WHERE grade = ? ORDER BY sort_order, rowid",
                SUBJECT_COLUMNS
            ))?;
            let rows = stmt.query_map([g.label()], subject_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM subjects ORDER BY sort_order, rowid",
                SUBJECT_COLUMNS
            ))?;
            let rows = stmt.query_map([], subject_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(subjects)
}

pub fn get_subject(conn: &Connection, id: &str) -> anyhow::Result<Option<Subject>> {
    let subject = conn
        .query_row(
            &format!("SELECT {} FROM subjects WHERE id = ?", SUBJECT_COLUMNS),
            [id],
            subject_from_row,
        )
        .optional()?;
    Ok(subject)
}

pub fn upsert_subject(conn: &Connection, s: &Subject) -> anyhow::Result<()> {
    let sort_order = next_sort_order(conn, "subjects")?;
    let scale_json = s
        .level_scale
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    conn.execute(
        "INSERT INTO subjects(id, name, grade, max_continuous, max_exam, pass_percentage, level_scale_json, sort_order, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            grade = excluded.grade,
            max_continuous = excluded.max_continuous,
            max_exam = excluded.max_exam,
            pass_percentage = excluded.pass_percentage,
            level_scale_json = excluded.level_scale_json,
            updated_at = excluded.updated_at",
        (
            &s.id,
            &s.name,
            s.grade.label(),
            s.max_continuous,
            s.max_exam,
            s.pass_percentage,
            scale_json,
            sort_order,
            now_stamp(),
        ),
    )?;
    Ok(())
}

/// Writes all subjects in one transaction, appended in the given order.
pub fn insert_subjects(conn: &Connection, subjects: &[Subject]) -> anyhow::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    for s in subjects {
        upsert_subject(&tx, s)?;
    }
    tx.commit()?;
    Ok(subjects.len())
}

pub fn delete_subject(conn: &Connection, id: &str) -> anyhow::Result<Option<usize>> {
    let tx = conn.unchecked_transaction()?;
    let removed = tx.execute("DELETE FROM subjects WHERE id = ?", [id])?;
    if removed == 0 {
        return Ok(None);
    }
    let grades = tx.execute("DELETE FROM grade_records WHERE subject_id = ?", [id])?;
    tx.commit()?;
    Ok(Some(grades))
}

fn grade_record_from_row(row: &Row<'_>) -> rusqlite::Result<GradeRecord> {
    let term: i64 = row.get(2)?;
    let term = Term::from_number(term)
        .ok_or_else(|| rusqlite::Error::IntegralValueOutOfRange(2, term))?;
    Ok(GradeRecord {
        student_id: row.get(0)?,
        subject_id: row.get(1)?,
        term,
        continuous: row.get(3)?,
        exam: row.get(4)?,
        absent: row.get::<_, i64>(5)? != 0,
        continuous_absent: row.get::<_, i64>(6)? != 0,
        exam_absent: row.get::<_, i64>(7)? != 0,
    })
}

const GRADE_RECORD_COLUMNS: &str =
    "student_id, subject_id, term, continuous, exam, absent, continuous_absent, exam_absent";

pub fn list_grade_records(conn: &Connection) -> anyhow::Result<Vec<GradeRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM grade_records ORDER BY rowid",
        GRADE_RECORD_COLUMNS
    ))?;
    let rows = stmt.query_map([], grade_record_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn list_grade_records_for_student(
    conn: &Connection,
    student_id: &str,
) -> anyhow::Result<Vec<GradeRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM grade_records WHERE student_id = ? ORDER BY rowid",
        GRADE_RECORD_COLUMNS
    ))?;
    let rows = stmt.query_map([student_id], grade_record_from_row)?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn list_grade_records_for_subject(
    conn: &Connection,
    subject_id: &str,
    term: Option<Term>,
) -> anyhow::Result<Vec<GradeRecord>> {
    let records = match term {
        Some(t) => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM grade_records WHERE subject_id = ? AND term = ? ORDER BY rowid",
                GRADE_RECORD_COLUMNS
            ))?;
            let rows = stmt.query_map((subject_id, t.number()), grade_record_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM grade_records WHERE subject_id = ? ORDER BY rowid",
                GRADE_RECORD_COLUMNS
            ))?;
            let rows = stmt.query_map([subject_id], grade_record_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(records)
}

/// One row per (student, subject, term); later writes replace earlier ones.
pub fn upsert_grade_records(conn: &Connection, records: &[GradeRecord]) -> anyhow::Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut written = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO grade_records(student_id, subject_id, term, continuous, exam, absent, continuous_absent, exam_absent, updated_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(student_id, subject_id, term) DO UPDATE SET
                continuous = excluded.continuous,
                exam = excluded.exam,
                absent = excluded.absent,
                continuous_absent = excluded.continuous_absent,
                exam_absent = excluded.exam_absent,
                updated_at = excluded.updated_at",
        )?;
        let stamp = now_stamp();
        for r in records {
            written += stmt.execute((
                &r.student_id,
                &r.subject_id,
                r.term.number(),
                r.continuous,
                r.exam,
                r.absent as i64,
                r.continuous_absent as i64,
                r.exam_absent as i64,
                &stamp,
            ))?;
        }
    }
    tx.commit()?;
    Ok(written)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row("SELECT value_json FROM settings WHERE key = ?", [key], |r| {
            r.get(0)
        })
        .optional()?;
    match raw {
        None => Ok(None),
        Some(text) => Ok(Some(
            serde_json::from_str(&text).with_context(|| format!("settings.{} is not JSON", key))?,
        )),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}
