use crate::ipc::helpers::{get_required_i64, with_conn, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store;
use rusqlite::Connection;
use serde_json::json;

/// Resolves a teacher id, `not_found` when no such row.
pub fn require_teacher(conn: &Connection, teacher_id: i64) -> Result<store::TeacherRecord, HandlerErr> {
    store::get_teacher(conn, teacher_id)
        .map_err(HandlerErr::query_failed)?
        .ok_or_else(|| HandlerErr::not_found("teacher not found"))
}

fn teachers_ensure(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let external_id = get_required_i64(params, "externalId")?;
    let name = params
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .trim()
        .to_string();
    let existed = store::find_teacher(conn, external_id)
        .map_err(HandlerErr::query_failed)?
        .is_some();
    let teacher =
        store::ensure_teacher(conn, external_id, &name).map_err(HandlerErr::update_failed)?;
    Ok(json!({ "teacher": teacher, "created": !existed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "teachers.ensure" => Some(with_conn(state, req, teachers_ensure)),
        _ => None,
    }
}
