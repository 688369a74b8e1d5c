use crate::ipc::handlers::students::require_student;
use crate::ipc::handlers::subjects::require_subject;
use crate::ipc::helpers::{
    get_date_range, get_required_bool, get_required_date, get_required_i64, today, with_conn,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::period::DateRange;
use crate::store::{self, AttendanceSource};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;

fn require_enrolled(conn: &Connection, subject_id: i64, student_id: i64) -> Result<(), HandlerErr> {
    require_subject(conn, subject_id)?;
    require_student(conn, student_id)?;
    let enrolled =
        store::is_enrolled(conn, subject_id, student_id).map_err(HandlerErr::query_failed)?;
    if !enrolled {
        return Err(HandlerErr {
            code: "bad_params",
            message: "student is not enrolled in subject".to_string(),
            details: Some(json!({ "subjectId": subject_id, "studentId": student_id })),
        });
    }
    Ok(())
}

fn write_mark(
    conn: &Connection,
    student_id: i64,
    subject_id: i64,
    date: NaiveDate,
    present: bool,
) -> Result<(), HandlerErr> {
    store::set_attendance(conn, student_id, subject_id, date, present)
        .map_err(HandlerErr::update_failed)
}

fn attendance_mark(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_required_i64(params, "subjectId")?;
    let student_id = get_required_i64(params, "studentId")?;
    let date = get_required_date(params, "date")?;
    let present = get_required_bool(params, "present")?;
    require_enrolled(conn, subject_id, student_id)?;
    write_mark(conn, student_id, subject_id, date, present)?;
    Ok(json!({ "present": present }))
}

/// Flips one mark. A student without a row counts as absent, so the first toggle marks present.
fn attendance_toggle(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_required_i64(params, "subjectId")?;
    let student_id = get_required_i64(params, "studentId")?;
    let date = get_required_date(params, "date")?;
    require_enrolled(conn, subject_id, student_id)?;
    let current = conn
        .get_attendance_mark(student_id, subject_id, date)
        .map_err(HandlerErr::query_failed)?;
    let present = !current.unwrap_or(false);
    write_mark(conn, student_id, subject_id, date, present)?;
    Ok(json!({ "present": present }))
}

fn attendance_mark_all(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_required_i64(params, "subjectId")?;
    let date = get_required_date(params, "date")?;
    let present = get_required_bool(params, "present")?;
    require_subject(conn, subject_id)?;
    let count = store::set_attendance_for_all(conn, subject_id, date, present)
        .map_err(HandlerErr::update_failed)?;
    Ok(json!({ "count": count, "present": present }))
}

/// The marking screen for one subject and day: every enrolled student, a missing row shown
/// as absent and flagged `marked: false`.
fn attendance_day_open(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_required_i64(params, "subjectId")?;
    let date = get_required_date(params, "date")?;
    let subject = require_subject(conn, subject_id)?;
    let students = conn
        .list_enrolled_students(subject_id)
        .map_err(HandlerErr::query_failed)?;

    let mut rows = Vec::with_capacity(students.len());
    let mut present_count = 0usize;
    for s in &students {
        let mark = conn
            .get_attendance_mark(s.id, subject_id, date)
            .map_err(HandlerErr::query_failed)?;
        let present = mark.unwrap_or(false);
        if present {
            present_count += 1;
        }
        rows.push(json!({
            "studentId": s.id,
            "name": s.name,
            "present": present,
            "marked": mark.is_some(),
        }));
    }

    Ok(json!({
        "subjectId": subject.id,
        "subjectName": subject.name,
        "date": date,
        "presentCount": present_count,
        "totalStudents": students.len(),
        "students": rows,
    }))
}

fn attendance_dates(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_required_i64(params, "subjectId")?;
    let range: DateRange = get_date_range(params, today())?;
    require_subject(conn, subject_id)?;
    let dates = conn
        .list_attendance_dates(subject_id)
        .map_err(HandlerErr::query_failed)?;
    Ok(json!({ "subjectId": subject_id, "dates": range.filter(&dates) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.mark" => Some(with_conn(state, req, attendance_mark)),
        "attendance.toggle" => Some(with_conn(state, req, attendance_toggle)),
        "attendance.markAll" => Some(with_conn(state, req, attendance_mark_all)),
        "attendance.dayOpen" => Some(with_conn(state, req, attendance_day_open)),
        "attendance.dates" => Some(with_conn(state, req, attendance_dates)),
        _ => None,
    }
}
