use crate::db::open_in_memory;
use crate::period::parse_date;
use crate::store;
use chrono::NaiveDate;
use rusqlite::Connection;

pub fn d(s: &str) -> NaiveDate {
    parse_date(s).expect("date")
}

pub struct Databases {
    pub conn: Connection,
    pub teacher_id: i64,
    pub subject_id: i64,
    pub anna: i64,
    pub boris: i64,
    pub clara: i64,
}

/// "Databases" with three students over 2024-11-01, -08, -15.
/// Anna attends everything, Boris misses the last date, Clara attends only the first and
/// has no row at all for the second.
pub fn databases() -> Databases {
    let conn = open_in_memory().expect("db");
    let t = store::ensure_teacher(&conn, 1001, "Teacher").expect("teacher");
    let subj = store::create_subject(&conn, t.id, "Databases").expect("subject");
    let anna = store::create_student(&conn, t.id, "Anna").expect("student").id;
    let boris = store::create_student(&conn, t.id, "Boris").expect("student").id;
    let clara = store::create_student(&conn, t.id, "Clara").expect("student").id;
    for id in [anna, boris, clara] {
        store::enroll_student(&conn, subj.id, id).expect("enroll");
    }
    let (d1, d2, d3) = (d("2024-11-01"), d("2024-11-08"), d("2024-11-15"));
    let marks = [
        (anna, d1, true),
        (anna, d2, true),
        (anna, d3, true),
        (boris, d1, true),
        (boris, d2, true),
        (boris, d3, false),
        (clara, d1, true),
        (clara, d3, false),
    ];
    for (student, date, present) in marks {
        store::set_attendance(&conn, student, subj.id, date, present).expect("mark");
    }
    Databases {
        teacher_id: t.id,
        subject_id: subj.id,
        anna,
        boris,
        clara,
        conn,
    }
}

/// Adds a subject with `count` students named `Student 01..`, where student `i` attends the
/// first `i % (dates + 1)` of `dates` consecutive days.
pub fn add_graded_subject(conn: &Connection, teacher_id: i64, name: &str, count: usize, dates: usize) -> i64 {
    let subj = store::create_subject(conn, teacher_id, name).expect("subject");
    let days: Vec<NaiveDate> = (0..dates)
        .map(|i| d("2024-09-02") + chrono::Duration::days(i as i64))
        .collect();
    for i in 0..count {
        let st = store::create_student(conn, teacher_id, &format!("{} {:02}", name, i + 1))
            .expect("student");
        store::enroll_student(conn, subj.id, st.id).expect("enroll");
        let attended = i % (dates + 1);
        for (j, day) in days.iter().enumerate() {
            store::set_attendance(conn, st.id, subj.id, *day, j < attended).expect("mark");
        }
    }
    subj.id
}
