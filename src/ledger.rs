use crate::period::DateRange;
use crate::store::{AttendanceSource, StudentRef, SubjectRef};
use chrono::NaiveDate;
use std::collections::HashMap;

/// Snapshot of one subject's attendance inside a date window, loaded with one batch read
/// per collection. Every statistic and every rendered cell of a request reads from here.
#[derive(Debug, Clone)]
pub struct Ledger {
    pub subject: Option<SubjectRef>,
    pub students: Vec<StudentRef>,
    pub dates: Vec<NaiveDate>,
    marks: HashMap<(i64, NaiveDate), bool>,
}

impl Ledger {
    pub fn load<S>(source: &S, subject_id: i64, range: DateRange) -> anyhow::Result<Ledger>
    where
        S: AttendanceSource + ?Sized,
    {
        let Some(subject) = source.get_subject(subject_id)? else {
            return Ok(Ledger {
                subject: None,
                students: Vec::new(),
                dates: Vec::new(),
                marks: HashMap::new(),
            });
        };
        let students = source.list_enrolled_students(subject_id)?;
        let dates = range.filter(&source.list_attendance_dates(subject_id)?);
        let marks = source
            .list_subject_attendance(subject_id)?
            .into_iter()
            .filter(|row| range.contains(row.date))
            .map(|row| ((row.student_id, row.date), row.present))
            .collect();
        Ok(Ledger {
            subject: Some(subject),
            students,
            dates,
            marks,
        })
    }

    pub fn subject_name(&self) -> &str {
        self.subject.as_ref().map(|s| s.name.as_str()).unwrap_or("")
    }

    /// Stored mark, `None` when the student has no row for that date.
    pub fn mark(&self, student_id: i64, date: NaiveDate) -> Option<bool> {
        self.marks.get(&(student_id, date)).copied()
    }

    /// Absence-by-omission: no row counts as absent.
    pub fn is_present(&self, student_id: i64, date: NaiveDate) -> bool {
        self.mark(student_id, date).unwrap_or(false)
    }

    pub fn present_count_on(&self, date: NaiveDate) -> usize {
        self.students
            .iter()
            .filter(|s| self.is_present(s.id, date))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::period::parse_date;
    use crate::store;

    #[test]
    fn missing_rows_read_as_absent() {
        let conn = open_in_memory().expect("db");
        let t = store::ensure_teacher(&conn, 7, "T").expect("teacher");
        let subj = store::create_subject(&conn, t.id, "Physics").expect("subject");
        let a = store::create_student(&conn, t.id, "Alice").expect("student");
        let b = store::create_student(&conn, t.id, "Bob").expect("student");
        store::enroll_student(&conn, subj.id, a.id).expect("enroll");
        store::enroll_student(&conn, subj.id, b.id).expect("enroll");
        let day = parse_date("2024-11-01").expect("date");
        store::set_attendance(&conn, a.id, subj.id, day, true).expect("mark");

        let ledger = Ledger::load(&conn, subj.id, DateRange::ALL).expect("ledger");
        assert_eq!(ledger.dates, vec![day]);
        assert_eq!(ledger.mark(b.id, day), None);
        assert!(!ledger.is_present(b.id, day));
        assert_eq!(ledger.present_count_on(day), 1);
    }

    #[test]
    fn unknown_subject_loads_empty() {
        let conn = open_in_memory().expect("db");
        let ledger = Ledger::load(&conn, 999, DateRange::ALL).expect("ledger");
        assert!(ledger.subject.is_none());
        assert!(ledger.students.is_empty());
        assert!(ledger.dates.is_empty());
        assert_eq!(ledger.subject_name(), "");
    }
}
