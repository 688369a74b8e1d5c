use crate::ipc::handlers::students::require_student;
use crate::ipc::handlers::subjects::require_subject;
use crate::ipc::helpers::{get_required_i64, with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, AttendanceSource};
use rusqlite::Connection;
use serde_json::json;

fn enrollment_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_required_i64(params, "subjectId")?;
    require_subject(conn, subject_id)?;
    let students = conn
        .list_enrolled_students(subject_id)
        .map_err(HandlerErr::query_failed)?;
    Ok(json!({ "subjectId": subject_id, "students": students }))
}

fn enrollment_add(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_required_i64(params, "subjectId")?;
    let student_id = get_required_i64(params, "studentId")?;
    let subject = require_subject(conn, subject_id)?;
    let student = require_student(conn, student_id)?;
    if subject.teacher_id != student.teacher_id {
        return Err(HandlerErr {
            code: "bad_params",
            message: "student belongs to another teacher".to_string(),
            details: Some(json!({ "subjectId": subject_id, "studentId": student_id })),
        });
    }
    let added = store::enroll_student(conn, subject_id, student_id)
        .map_err(HandlerErr::update_failed)?;
    Ok(json!({ "added": added }))
}

/// Unlinking also drops the student's marks in that subject.
fn enrollment_remove(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_required_i64(params, "subjectId")?;
    let student_id = get_required_i64(params, "studentId")?;
    let removed = store::unenroll_student(conn, subject_id, student_id)
        .map_err(HandlerErr::update_failed)?;
    if !removed {
        return Err(HandlerErr::not_found("student is not enrolled in subject"));
    }
    Ok(json!({ "removed": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "enrollment.list" => Some(with_conn(state, req, enrollment_list)),
        "enrollment.add" => Some(with_conn(state, req, enrollment_add)),
        "enrollment.remove" => Some(with_conn(state, req, enrollment_remove)),
        _ => None,
    }
}
