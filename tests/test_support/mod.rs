#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attendd");
    let mut child = Command::new(exe)
        .env_remove("ATTENDD_WORKSPACE")
        .env_remove("ATTENDD_LOG_DIR")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attendd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

/// Sends one request and returns the whole response envelope.
pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

/// Sends a request expected to fail and returns its error code.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

pub struct Seeded {
    pub teacher_id: i64,
    pub subject_id: i64,
    pub anna: i64,
    pub boris: i64,
    pub clara: i64,
}

fn id_of(v: &serde_json::Value, key: &str) -> i64 {
    v.get(key)
        .and_then(|o| o.get("id"))
        .and_then(|v| v.as_i64())
        .unwrap_or_else(|| panic!("missing {}.id in {}", key, v))
}

/// Opens `workspace` and records the "Databases" subject: Anna attends 2024-11-01, -08 and
/// -15, Boris misses the 15th, Clara attends only the 1st and is never marked on the 8th.
pub fn seed_databases(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &std::path::Path,
) -> Seeded {
    let _ = request_ok(
        stdin,
        reader,
        "seed-ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let teacher = request_ok(
        stdin,
        reader,
        "seed-teacher",
        "teachers.ensure",
        json!({ "externalId": 424242, "name": "Teacher" }),
    );
    let teacher_id = id_of(&teacher, "teacher");
    let subject = request_ok(
        stdin,
        reader,
        "seed-subject",
        "subjects.create",
        json!({ "teacherId": teacher_id, "name": "Databases" }),
    );
    let subject_id = id_of(&subject, "subject");

    let bulk = request_ok(
        stdin,
        reader,
        "seed-students",
        "students.createBulk",
        json!({ "teacherId": teacher_id, "names": "Anna\nBoris\n\nClara\n" }),
    );
    let ids: Vec<i64> = bulk["students"]
        .as_array()
        .expect("students")
        .iter()
        .map(|s| s["id"].as_i64().expect("student id"))
        .collect();
    assert_eq!(ids.len(), 3);
    let (anna, boris, clara) = (ids[0], ids[1], ids[2]);

    for (i, id) in ids.iter().enumerate() {
        let _ = request_ok(
            stdin,
            reader,
            &format!("seed-enroll-{i}"),
            "enrollment.add",
            json!({ "subjectId": subject_id, "studentId": id }),
        );
    }

    let marks = [
        (anna, "2024-11-01", true),
        (anna, "2024-11-08", true),
        (anna, "2024-11-15", true),
        (boris, "2024-11-01", true),
        (boris, "2024-11-08", true),
        (boris, "2024-11-15", false),
        (clara, "2024-11-01", true),
        (clara, "2024-11-15", false),
    ];
    for (i, (student, date, present)) in marks.iter().enumerate() {
        let _ = request_ok(
            stdin,
            reader,
            &format!("seed-mark-{i}"),
            "attendance.mark",
            json!({
                "subjectId": subject_id,
                "studentId": student,
                "date": date,
                "present": present,
            }),
        );
    }

    Seeded {
        teacher_id,
        subject_id,
        anna,
        boris,
        clara,
    }
}
