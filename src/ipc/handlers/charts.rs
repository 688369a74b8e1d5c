use crate::charts::{
    render_subject_dates_chart, render_subject_students_chart, render_teacher_overall_chart,
};
use crate::ipc::helpers::{
    get_date_range, get_required_i64, get_required_str, today, with_conn, write_output,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

/// An empty series is reported as `noData` and nothing is written.
fn finish(params: &serde_json::Value, png: Option<Vec<u8>>) -> Result<serde_json::Value, HandlerErr> {
    match png {
        Some(bytes) => {
            let mut result = write_output(params, &bytes)?;
            result["noData"] = json!(false);
            Ok(result)
        }
        None => Ok(json!({ "noData": true })),
    }
}

fn charts_dates(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_required_i64(params, "subjectId")?;
    get_required_str(params, "outPath")?;
    let range = get_date_range(params, today())?;
    let png =
        render_subject_dates_chart(conn, subject_id, range).map_err(HandlerErr::render_failed)?;
    finish(params, png)
}

fn charts_students(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_required_i64(params, "subjectId")?;
    get_required_str(params, "outPath")?;
    let range = get_date_range(params, today())?;
    let png = render_subject_students_chart(conn, subject_id, range)
        .map_err(HandlerErr::render_failed)?;
    finish(params, png)
}

fn charts_overall(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = get_required_i64(params, "teacherId")?;
    get_required_str(params, "outPath")?;
    let range = get_date_range(params, today())?;
    let png = render_teacher_overall_chart(conn, teacher_id, range)
        .map_err(HandlerErr::render_failed)?;
    finish(params, png)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "charts.dates" => Some(with_conn(state, req, charts_dates)),
        "charts.students" => Some(with_conn(state, req, charts_students)),
        "charts.overall" => Some(with_conn(state, req, charts_overall)),
        _ => None,
    }
}
