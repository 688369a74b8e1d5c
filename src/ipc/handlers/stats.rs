use crate::bands::{band_for, format_percentage};
use crate::ipc::helpers::{
    get_date_range, get_optional_i64, get_required_i64, today, with_conn, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::stats::{
    compute_date_tallies, compute_student_stats, compute_subject_stats,
    compute_teacher_overall_stats, StudentStats, SubjectStats,
};
use rusqlite::Connection;
use serde_json::json;

const DIGEST_TOP: usize = 5;
const DIGEST_BOTTOM: usize = 3;

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, HandlerErr> {
    serde_json::to_value(value).map_err(|e| HandlerErr::new("render_failed", e.to_string()))
}

fn digest_line(rank: usize, st: &StudentStats) -> String {
    format!("{}. {}: {}", rank, st.student_name, format_percentage(st.percentage))
}

/// Ranked lines for a chat message: the top five, then either the rest (up to eight students)
/// or a `...` gap followed by the bottom three, each keeping its overall rank.
pub fn digest_lines(students: &[StudentStats]) -> Vec<String> {
    let mut lines: Vec<String> = students
        .iter()
        .take(DIGEST_TOP)
        .enumerate()
        .map(|(i, st)| digest_line(i + 1, st))
        .collect();
    if students.len() > DIGEST_TOP + DIGEST_BOTTOM {
        lines.push("...".to_string());
        let start = students.len() - DIGEST_BOTTOM;
        lines.extend(
            students[start..]
                .iter()
                .enumerate()
                .map(|(i, st)| digest_line(start + i + 1, st)),
        );
    } else {
        lines.extend(
            students
                .iter()
                .enumerate()
                .skip(DIGEST_TOP)
                .map(|(i, st)| digest_line(i + 1, st)),
        );
    }
    lines
}

fn subject_digest(stats: &SubjectStats) -> serde_json::Value {
    json!({
        "subjectId": stats.subject_id,
        "subjectName": stats.subject_name,
        "noData": stats.total_dates == 0,
        "totalStudents": stats.total_students,
        "totalDates": stats.total_dates,
        "average": format_percentage(stats.avg_attendance),
        "band": band_for(stats.avg_attendance),
        "lines": digest_lines(&stats.students_stats),
    })
}

fn stats_student(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_i64(params, "studentId")?;
    let subject_id = get_optional_i64(params, "subjectId")?;
    let range = get_date_range(params, today())?;
    let stats = compute_student_stats(conn, student_id, subject_id, range)
        .map_err(HandlerErr::query_failed)?;
    to_json(&stats)
}

fn stats_subject(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_required_i64(params, "subjectId")?;
    let range = get_date_range(params, today())?;
    let stats = compute_subject_stats(conn, subject_id, range).map_err(HandlerErr::query_failed)?;
    to_json(&stats)
}

fn stats_overall(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let teacher_id = get_required_i64(params, "teacherId")?;
    let range = get_date_range(params, today())?;
    let stats = compute_teacher_overall_stats(conn, teacher_id, range)
        .map_err(HandlerErr::query_failed)?;
    to_json(&stats)
}

fn stats_by_dates(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_required_i64(params, "subjectId")?;
    let range = get_date_range(params, today())?;
    let tallies =
        compute_date_tallies(conn, subject_id, range).map_err(HandlerErr::query_failed)?;
    Ok(json!({ "subjectId": subject_id, "dates": to_json(&tallies)? }))
}

fn stats_subject_digest(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let subject_id = get_required_i64(params, "subjectId")?;
    let range = get_date_range(params, today())?;
    let stats = compute_subject_stats(conn, subject_id, range).map_err(HandlerErr::query_failed)?;
    Ok(subject_digest(&stats))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "stats.student" => Some(with_conn(state, req, stats_student)),
        "stats.subject" => Some(with_conn(state, req, stats_subject)),
        "stats.overall" => Some(with_conn(state, req, stats_overall)),
        "stats.byDates" => Some(with_conn(state, req, stats_by_dates)),
        "stats.subjectDigest" => Some(with_conn(state, req, stats_subject_digest)),
        _ => None,
    }
}
