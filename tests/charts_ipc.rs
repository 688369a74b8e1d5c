mod test_support;

use serde_json::json;
use test_support::{request_ok, seed_databases, spawn_sidecar, temp_dir};

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

fn assert_png(path: &std::path::Path) {
    let bytes = std::fs::read(path).expect("read png");
    assert!(bytes.len() > PNG_SIGNATURE.len());
    assert_eq!(bytes[..8], PNG_SIGNATURE);
}

#[test]
fn subject_and_overall_charts_are_png_files() {
    let workspace = temp_dir("attendd-charts");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let s = seed_databases(&mut stdin, &mut reader, &workspace);

    for (i, (method, params, file)) in [
        ("charts.dates", json!({ "subjectId": s.subject_id }), "dates.png"),
        ("charts.students", json!({ "subjectId": s.subject_id }), "students.png"),
        ("charts.overall", json!({ "teacherId": s.teacher_id }), "overall.png"),
    ]
    .into_iter()
    .enumerate()
    {
        let out = workspace.join(file);
        let mut params = params;
        params["outPath"] = json!(out.to_string_lossy());
        let res = request_ok(&mut stdin, &mut reader, &format!("chart-{i}"), method, params);
        assert_eq!(res["noData"].as_bool(), Some(false), "{method}");
        assert_png(&out);
    }
}

#[test]
fn empty_series_report_no_data_and_write_nothing() {
    let workspace = temp_dir("attendd-charts-empty");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let s = seed_databases(&mut stdin, &mut reader, &workspace);

    let empty = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "subjects.create",
        json!({ "teacherId": s.teacher_id, "name": "Empty" }),
    );
    let empty_id = empty["subject"]["id"].as_i64().expect("id");

    let out = workspace.join("empty-students.png");
    let res = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "charts.students",
        json!({ "subjectId": empty_id, "outPath": out.to_string_lossy() }),
    );
    assert_eq!(res["noData"].as_bool(), Some(true));
    assert!(!out.exists());

    let out = workspace.join("future-dates.png");
    let res = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "charts.dates",
        json!({
            "subjectId": s.subject_id,
            "dateFrom": "2030-01-01",
            "outPath": out.to_string_lossy(),
        }),
    );
    assert_eq!(res["noData"].as_bool(), Some(true));
    assert!(!out.exists());
}
