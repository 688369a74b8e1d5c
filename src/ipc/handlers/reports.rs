use crate::ipc::helpers::{
    get_date_range, get_required_i64, get_required_str, today, with_conn, write_output,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::report::{render_all_subjects_report, render_subject_report};
use rusqlite::Connection;

fn reports_subject_xlsx(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_required_i64(params, "subjectId")?;
    get_required_str(params, "outPath")?;
    let range = get_date_range(params, today())?;
    let bytes =
        render_subject_report(conn, subject_id, range).map_err(HandlerErr::render_failed)?;
    write_output(params, &bytes)
}

fn reports_all_subjects_xlsx(
    conn: &Connection,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = get_required_i64(params, "teacherId")?;
    get_required_str(params, "outPath")?;
    let range = get_date_range(params, today())?;
    let bytes = render_all_subjects_report(conn, teacher_id, range)
        .map_err(HandlerErr::render_failed)?;
    write_output(params, &bytes)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.subjectXlsx" => Some(with_conn(state, req, reports_subject_xlsx)),
        "reports.allSubjectsXlsx" => Some(with_conn(state, req, reports_all_subjects_xlsx)),
        _ => None,
    }
}
