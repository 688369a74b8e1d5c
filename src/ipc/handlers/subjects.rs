use crate::ipc::handlers::teachers::require_teacher;
use crate::ipc::helpers::{get_required_i64, get_required_name, with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::{self, AttendanceSource, SubjectRef};
use rusqlite::Connection;
use serde_json::json;

/// Resolves a subject id, `not_found` when no such row.
pub fn require_subject(conn: &Connection, subject_id: i64) -> Result<SubjectRef, HandlerErr> {
    conn.get_subject(subject_id)
        .map_err(HandlerErr::query_failed)?
        .ok_or_else(|| HandlerErr::not_found("subject not found"))
}

fn subjects_list(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = get_required_i64(params, "teacherId")?;
    require_teacher(conn, teacher_id)?;
    let subjects = conn
        .list_subjects_for_teacher(teacher_id)
        .map_err(HandlerErr::query_failed)?;
    Ok(json!({ "subjects": subjects }))
}

fn subjects_create(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = get_required_i64(params, "teacherId")?;
    let name = get_required_name(params, "name")?;
    require_teacher(conn, teacher_id)?;
    let subject =
        store::create_subject(conn, teacher_id, &name).map_err(HandlerErr::update_failed)?;
    Ok(json!({ "subject": subject }))
}

fn subjects_rename(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_required_i64(params, "subjectId")?;
    let name = get_required_name(params, "name")?;
    if !store::rename_subject(conn, subject_id, &name).map_err(HandlerErr::update_failed)? {
        return Err(HandlerErr::not_found("subject not found"));
    }
    Ok(json!({ "subject": require_subject(conn, subject_id)? }))
}

fn subjects_delete(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_required_i64(params, "subjectId")?;
    if !store::delete_subject(conn, subject_id).map_err(HandlerErr::update_failed)? {
        return Err(HandlerErr::not_found("subject not found"));
    }
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(with_conn(state, req, subjects_list)),
        "subjects.create" => Some(with_conn(state, req, subjects_create)),
        "subjects.rename" => Some(with_conn(state, req, subjects_rename)),
        "subjects.delete" => Some(with_conn(state, req, subjects_delete)),
        _ => None,
    }
}
