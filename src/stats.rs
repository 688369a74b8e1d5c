use crate::ledger::Ledger;
use crate::period::DateRange;
use crate::store::{AttendanceRecord, AttendanceSource, StudentRef};
use chrono::NaiveDate;
use serde::Serialize;
use std::cmp::Ordering;

/// One-decimal rounding, exact halves to the even digit.
pub fn round_1_decimal(x: f64) -> f64 {
    (x * 10.0).round_ties_even() / 10.0
}

/// `present / total * 100` rounded to a whole number, halves to even; 0 on an empty total.
pub fn whole_percentage(present: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (present as f64 / total as f64 * 100.0).round_ties_even()
}

/// `present / total` as a one-decimal percentage; 0 when there is nothing to count.
pub fn percentage(present: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_1_decimal(present as f64 / total as f64 * 100.0)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStats {
    pub student_id: i64,
    pub student_name: String,
    pub total: usize,
    pub present: usize,
    pub absent: usize,
    pub percentage: f64,
    pub dates_present: Vec<NaiveDate>,
    pub dates_absent: Vec<NaiveDate>,
}

impl StudentStats {
    fn from_dates(
        student_id: i64,
        student_name: String,
        mut dates_present: Vec<NaiveDate>,
        mut dates_absent: Vec<NaiveDate>,
    ) -> Self {
        dates_present.sort();
        dates_absent.sort();
        let present = dates_present.len();
        let absent = dates_absent.len();
        let total = present + absent;
        StudentStats {
            student_id,
            student_name,
            total,
            present,
            absent,
            percentage: percentage(present, total),
            dates_present,
            dates_absent,
        }
    }

    fn over_occasions<F>(student: &StudentRef, occasions: &[NaiveDate], mark: F) -> Self
    where
        F: Fn(NaiveDate) -> Option<bool>,
    {
        let (present, absent): (Vec<NaiveDate>, Vec<NaiveDate>) = occasions
            .iter()
            .copied()
            .partition(|d| mark(*d).unwrap_or(false));
        StudentStats::from_dates(student.id, student.name.clone(), present, absent)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStats {
    pub subject_id: i64,
    pub subject_name: String,
    pub total_dates: usize,
    pub total_students: usize,
    pub avg_attendance: f64,
    pub students_stats: Vec<StudentStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallStats {
    pub total_subjects: usize,
    pub total_students: usize,
    pub total_dates: usize,
    pub overall_avg_attendance: f64,
    pub subjects_stats: Vec<SubjectStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateTally {
    pub date: NaiveDate,
    pub present: usize,
    pub absent: usize,
    pub total: usize,
    pub percentage: f64,
}

/// With a subject, every occasion of the subject in `range` is counted and a missing mark
/// is an absence. Without one, only the student's existing marks in `range` are counted.
pub fn compute_student_stats<S>(
    source: &S,
    student_id: i64,
    subject_id: Option<i64>,
    range: DateRange,
) -> anyhow::Result<StudentStats>
where
    S: AttendanceSource + ?Sized,
{
    let Some(student) = source.get_student(student_id)? else {
        return Ok(StudentStats::from_dates(student_id, String::new(), Vec::new(), Vec::new()));
    };

    let records = source.get_attendance_records_for_student(student_id, subject_id)?;
    match subject_id {
        Some(subject_id) => {
            let occasions = range.filter(&source.list_attendance_dates(subject_id)?);
            Ok(StudentStats::over_occasions(&student, &occasions, |d| {
                records.iter().find(|r| r.date == d).map(|r| r.present)
            }))
        }
        None => {
            let (present, absent): (Vec<&AttendanceRecord>, Vec<&AttendanceRecord>) = records
                .iter()
                .filter(|r| range.contains(r.date))
                .partition(|r| r.present);
            Ok(StudentStats::from_dates(
                student.id,
                student.name,
                present.into_iter().map(|r| r.date).collect(),
                absent.into_iter().map(|r| r.date).collect(),
            ))
        }
    }
}

/// Best first; equal percentages fall back to name, then id.
pub fn rank_students(a: &StudentStats, b: &StudentStats) -> Ordering {
    b.percentage
        .total_cmp(&a.percentage)
        .then_with(|| a.student_name.cmp(&b.student_name))
        .then_with(|| a.student_id.cmp(&b.student_id))
}

pub fn subject_stats_from_ledger(ledger: &Ledger) -> SubjectStats {
    let (subject_id, subject_name) = ledger
        .subject
        .as_ref()
        .map(|s| (s.id, s.name.clone()))
        .unwrap_or_default();
    let total_students = ledger.students.len();

    if ledger.students.is_empty() || ledger.dates.is_empty() {
        return SubjectStats {
            subject_id,
            subject_name,
            total_dates: 0,
            total_students,
            avg_attendance: 0.0,
            students_stats: Vec::new(),
        };
    }

    let mut students_stats: Vec<StudentStats> = ledger
        .students
        .iter()
        .map(|s| StudentStats::over_occasions(s, &ledger.dates, |d| ledger.mark(s.id, d)))
        .collect();
    let sum: f64 = students_stats.iter().map(|s| s.percentage).sum();
    students_stats.sort_by(rank_students);

    SubjectStats {
        subject_id,
        subject_name,
        total_dates: ledger.dates.len(),
        total_students,
        avg_attendance: round_1_decimal(sum / total_students as f64),
        students_stats,
    }
}

pub fn compute_subject_stats<S>(
    source: &S,
    subject_id: i64,
    range: DateRange,
) -> anyhow::Result<SubjectStats>
where
    S: AttendanceSource + ?Sized,
{
    let ledger = Ledger::load(source, subject_id, range)?;
    Ok(subject_stats_from_ledger(&ledger))
}

/// Students are counted once per subject they are enrolled in. The overall average is the
/// plain mean of subject averages, skipping subjects without occasions in `range`.
pub fn compute_teacher_overall_stats<S>(
    source: &S,
    teacher_id: i64,
    range: DateRange,
) -> anyhow::Result<OverallStats>
where
    S: AttendanceSource + ?Sized,
{
    let subjects = source.list_subjects_for_teacher(teacher_id)?;
    let subjects_stats = subjects
        .iter()
        .map(|s| compute_subject_stats(source, s.id, range))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let averaged: Vec<f64> = subjects_stats
        .iter()
        .filter(|s| s.total_dates > 0)
        .map(|s| s.avg_attendance)
        .collect();
    let overall_avg_attendance = if averaged.is_empty() {
        0.0
    } else {
        round_1_decimal(averaged.iter().sum::<f64>() / averaged.len() as f64)
    };

    Ok(OverallStats {
        total_subjects: subjects_stats.len(),
        total_students: subjects_stats.iter().map(|s| s.total_students).sum(),
        total_dates: subjects_stats.iter().map(|s| s.total_dates).sum(),
        overall_avg_attendance,
        subjects_stats,
    })
}

/// Present/absent head counts per occasion, in date order.
pub fn attendance_by_dates(ledger: &Ledger) -> Vec<DateTally> {
    if ledger.students.is_empty() {
        return Vec::new();
    }
    let total = ledger.students.len();
    ledger
        .dates
        .iter()
        .map(|&date| {
            let present = ledger.present_count_on(date);
            DateTally {
                date,
                present,
                absent: total - present,
                total,
                percentage: percentage(present, total),
            }
        })
        .collect()
}

pub fn compute_date_tallies<S>(
    source: &S,
    subject_id: i64,
    range: DateRange,
) -> anyhow::Result<Vec<DateTally>>
where
    S: AttendanceSource + ?Sized,
{
    let ledger = Ledger::load(source, subject_id, range)?;
    Ok(attendance_by_dates(&ledger))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;
    use crate::store;
    use crate::test_fixtures::{add_graded_subject, d, databases};

    #[test]
    fn round_off_one_decimal() {
        assert_eq!(round_1_decimal(0.0), 0.0);
        assert_eq!(round_1_decimal(66.666), 66.7);
        assert_eq!(round_1_decimal(33.333), 33.3);
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(2, 3), 66.7);
    }

    #[test]
    fn exact_halves_round_to_even() {
        assert_eq!(percentage(1, 16), 6.2);
        assert_eq!(percentage(5, 16), 31.2);
        assert_eq!(percentage(3, 16), 18.8);
        assert_eq!(whole_percentage(1, 8), 12.0);
        assert_eq!(whole_percentage(3, 8), 38.0);
        assert_eq!(whole_percentage(1, 22), 5.0);
        assert_eq!(whole_percentage(12, 22), 55.0);
        assert_eq!(whole_percentage(0, 0), 0.0);
    }

    #[test]
    fn sixteen_occasions_keep_halves_even() {
        let conn = open_in_memory().expect("db");
        let t = store::ensure_teacher(&conn, 5, "T").expect("teacher");
        let subj = add_graded_subject(&conn, t.id, "Lab", 6, 16);
        let stats = compute_subject_stats(&conn, subj, DateRange::ALL).expect("stats");
        let by_present: Vec<(usize, f64)> = stats
            .students_stats
            .iter()
            .map(|s| (s.present, s.percentage))
            .collect();
        assert!(by_present.contains(&(1, 6.2)));
        assert!(by_present.contains(&(5, 31.2)));
        assert!(by_present.contains(&(3, 18.8)));
    }

    #[test]
    fn databases_scenario_full_range() {
        let f = databases();
        let stats = compute_subject_stats(&f.conn, f.subject_id, DateRange::ALL).expect("stats");
        assert_eq!(stats.subject_name, "Databases");
        assert_eq!(stats.total_dates, 3);
        assert_eq!(stats.total_students, 3);
        assert_eq!(stats.avg_attendance, 66.7);

        let by_id = |id: i64| {
            stats
                .students_stats
                .iter()
                .find(|s| s.student_id == id)
                .expect("student present")
        };
        assert_eq!(by_id(f.anna).percentage, 100.0);
        assert_eq!(by_id(f.boris).percentage, 66.7);
        let clara = by_id(f.clara);
        assert_eq!(clara.percentage, 33.3);
        assert_eq!(clara.present, 1);
        assert_eq!(clara.absent, 2);
        assert_eq!(clara.dates_absent, vec![d("2024-11-08"), d("2024-11-15")]);

        let order: Vec<i64> = stats.students_stats.iter().map(|s| s.student_id).collect();
        assert_eq!(order, vec![f.anna, f.boris, f.clara]);
    }

    #[test]
    fn omission_conserves_present_plus_absent() {
        let f = databases();
        let stats = compute_subject_stats(&f.conn, f.subject_id, DateRange::ALL).expect("stats");
        let present: usize = stats.students_stats.iter().map(|s| s.present).sum();
        let absent: usize = stats.students_stats.iter().map(|s| s.absent).sum();
        assert_eq!(present + absent, stats.total_students * stats.total_dates);
    }

    #[test]
    fn student_without_any_rows_is_absent_everywhere() {
        let f = databases();
        let dora = store::create_student(&f.conn, f.teacher_id, "Dora").expect("student");
        store::enroll_student(&f.conn, f.subject_id, dora.id).expect("enroll");

        let st = compute_student_stats(&f.conn, dora.id, Some(f.subject_id), DateRange::ALL)
            .expect("stats");
        assert_eq!(st.total, 3);
        assert_eq!(st.absent, 3);
        assert_eq!(st.percentage, 0.0);

        let subj = compute_subject_stats(&f.conn, f.subject_id, DateRange::ALL).expect("stats");
        let present: usize = subj.students_stats.iter().map(|s| s.present).sum();
        let absent: usize = subj.students_stats.iter().map(|s| s.absent).sum();
        assert_eq!(present + absent, 4 * 3);
    }

    #[test]
    fn narrowed_range_recomputes_student() {
        let f = databases();
        let range = DateRange::new(Some(d("2024-11-01")), Some(d("2024-11-10")));
        let st = compute_student_stats(&f.conn, f.boris, Some(f.subject_id), range).expect("stats");
        assert_eq!(st.total, 2);
        assert_eq!(st.present, 2);
        assert_eq!(st.percentage, 100.0);

        let subj = compute_subject_stats(&f.conn, f.subject_id, range).expect("stats");
        assert_eq!(subj.total_dates, 2);
    }

    #[test]
    fn range_edges_are_inclusive() {
        let f = databases();
        let range = DateRange::new(Some(d("2024-11-08")), Some(d("2024-11-15")));
        let st = compute_student_stats(&f.conn, f.anna, Some(f.subject_id), range).expect("stats");
        assert_eq!(st.dates_present, vec![d("2024-11-08"), d("2024-11-15")]);
    }

    #[test]
    fn inverted_range_is_empty_not_an_error() {
        let f = databases();
        let range = DateRange::new(Some(d("2024-11-15")), Some(d("2024-11-01")));
        let subj = compute_subject_stats(&f.conn, f.subject_id, range).expect("stats");
        assert_eq!(subj.total_dates, 0);
        assert_eq!(subj.avg_attendance, 0.0);
        assert!(subj.students_stats.is_empty());
        assert_eq!(subj.total_students, 3);
    }

    #[test]
    fn student_stats_without_subject_uses_existing_rows_only() {
        let f = databases();
        let st = compute_student_stats(&f.conn, f.clara, None, DateRange::ALL).expect("stats");
        assert_eq!(st.total, 2);
        assert_eq!(st.present, 1);
        assert_eq!(st.percentage, 50.0);
        assert_eq!(st.dates_present, vec![d("2024-11-01")]);
        assert_eq!(st.dates_absent, vec![d("2024-11-15")]);
    }

    #[test]
    fn unknown_ids_yield_zero_results() {
        let conn = open_in_memory().expect("db");
        let st = compute_student_stats(&conn, 404, Some(1), DateRange::ALL).expect("stats");
        assert_eq!(st.total, 0);
        assert_eq!(st.percentage, 0.0);
        let subj = compute_subject_stats(&conn, 404, DateRange::ALL).expect("stats");
        assert_eq!(subj.total_students, 0);
        let overall = compute_teacher_overall_stats(&conn, 404, DateRange::ALL).expect("stats");
        assert_eq!(overall.total_subjects, 0);
        assert_eq!(overall.overall_avg_attendance, 0.0);
    }

    #[test]
    fn empty_subject_is_well_formed() {
        let conn = open_in_memory().expect("db");
        let t = store::ensure_teacher(&conn, 5, "T").expect("teacher");
        let subj = store::create_subject(&conn, t.id, "Empty").expect("subject");
        let stats = compute_subject_stats(&conn, subj.id, DateRange::ALL).expect("stats");
        assert_eq!(stats.total_students, 0);
        assert_eq!(stats.avg_attendance, 0.0);
        assert!(stats.students_stats.is_empty());
    }

    #[test]
    fn equal_percentages_rank_by_name() {
        let conn = open_in_memory().expect("db");
        let t = store::ensure_teacher(&conn, 5, "T").expect("teacher");
        let subj = store::create_subject(&conn, t.id, "Art").expect("subject");
        let zed = store::create_student(&conn, t.id, "Zed").expect("student");
        let amy = store::create_student(&conn, t.id, "Amy").expect("student");
        let day = d("2024-10-01");
        for s in [&zed, &amy] {
            store::enroll_student(&conn, subj.id, s.id).expect("enroll");
            store::set_attendance(&conn, s.id, subj.id, day, true).expect("mark");
        }
        let stats = compute_subject_stats(&conn, subj.id, DateRange::ALL).expect("stats");
        assert_eq!(stats.students_stats[0].student_name, "Amy");
        assert_eq!(stats.students_stats[1].student_name, "Zed");
    }

    #[test]
    fn overall_average_is_mean_of_subject_averages() {
        let f = databases();
        // 3 students over 1 date: absent, present, absent -> avg 33.3.
        let small = add_graded_subject(&f.conn, f.teacher_id, "Small", 3, 1);
        store::create_subject(&f.conn, f.teacher_id, "No dates").expect("subject");

        let overall =
            compute_teacher_overall_stats(&f.conn, f.teacher_id, DateRange::ALL).expect("stats");
        assert_eq!(overall.total_subjects, 3);
        assert_eq!(overall.total_students, 3 + 3);
        assert_eq!(overall.total_dates, 3 + 1);

        let small_stats = overall
            .subjects_stats
            .iter()
            .find(|s| s.subject_id == small)
            .expect("small subject");
        assert_eq!(small_stats.avg_attendance, 33.3);
        // (66.7 + 33.3) / 2; an occasion-weighted ratio would give 7 / 12 = 58.3 instead,
        // and the subject without dates does not pull the mean down.
        assert_eq!(overall.overall_avg_attendance, 50.0);
    }

    #[test]
    fn date_tallies_count_omission_as_absent() {
        let f = databases();
        let tallies = compute_date_tallies(&f.conn, f.subject_id, DateRange::ALL).expect("tallies");
        let counts: Vec<(usize, usize)> = tallies.iter().map(|t| (t.present, t.absent)).collect();
        assert_eq!(counts, vec![(3, 0), (2, 1), (1, 2)]);
        assert_eq!(tallies[1].percentage, 66.7);
    }
}
