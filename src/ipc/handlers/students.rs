use crate::ipc::handlers::teachers::require_teacher;
use crate::ipc::helpers::{
    get_required_i64, get_required_name, get_required_str, with_conn, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, AttendanceSource, StudentRef};
use rusqlite::Connection;
use serde_json::json;

/// Resolves a student id, `not_found` when no such row.
pub fn require_student(conn: &Connection, student_id: i64) -> Result<StudentRef, HandlerErr> {
    conn.get_student(student_id)
        .map_err(HandlerErr::query_failed)?
        .ok_or_else(|| HandlerErr::not_found("student not found"))
}

fn students_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = get_required_i64(params, "teacherId")?;
    require_teacher(conn, teacher_id)?;
    let students =
        store::list_students_for_teacher(conn, teacher_id).map_err(HandlerErr::query_failed)?;
    Ok(json!({ "students": students }))
}

fn students_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = get_required_i64(params, "teacherId")?;
    let name = get_required_name(params, "name")?;
    require_teacher(conn, teacher_id)?;
    let student =
        store::create_student(conn, teacher_id, &name).map_err(HandlerErr::update_failed)?;
    Ok(json!({ "student": student }))
}

/// `names` is newline separated; blank lines are skipped.
fn students_create_bulk(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = get_required_i64(params, "teacherId")?;
    let names = get_required_str(params, "names")?;
    require_teacher(conn, teacher_id)?;
    let created = store::create_students_bulk(conn, teacher_id, &names)
        .map_err(HandlerErr::update_failed)?;
    Ok(json!({ "count": created.len(), "students": created }))
}

fn students_rename(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_i64(params, "studentId")?;
    let name = get_required_name(params, "name")?;
    if !store::rename_student(conn, student_id, &name).map_err(HandlerErr::update_failed)? {
        return Err(HandlerErr::not_found("student not found"));
    }
    Ok(json!({ "student": require_student(conn, student_id)? }))
}

fn students_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_i64(params, "studentId")?;
    if !store::delete_student(conn, student_id).map_err(HandlerErr::update_failed)? {
        return Err(HandlerErr::not_found("student not found"));
    }
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(with_conn(state, req, students_list)),
        "students.create" => Some(with_conn(state, req, students_create)),
        "students.createBulk" => Some(with_conn(state, req, students_create_bulk)),
        "students.rename" => Some(with_conn(state, req, students_rename)),
        "students.delete" => Some(with_conn(state, req, students_delete)),
        _ => None,
    }
}
