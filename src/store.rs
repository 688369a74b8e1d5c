use anyhow::{bail, Context};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherRecord {
    pub id: i64,
    pub external_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectRef {
    pub id: i64,
    pub teacher_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRef {
    pub id: i64,
    pub teacher_id: i64,
    pub name: String,
}

/// One mark of a single student, as seen from the student's side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub date: NaiveDate,
    pub present: bool,
}

/// One mark inside a subject, as loaded by the batch read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendanceRow {
    pub student_id: i64,
    pub date: NaiveDate,
    pub present: bool,
}

/// Read side consumed by the statistics engine and the renderers.
///
/// Unknown ids yield empty collections or `None`; only storage failures are errors.
pub trait AttendanceSource {
    fn list_subjects_for_teacher(&self, teacher_id: i64) -> anyhow::Result<Vec<SubjectRef>>;
    fn get_subject(&self, subject_id: i64) -> anyhow::Result<Option<SubjectRef>>;
    fn get_student(&self, student_id: i64) -> anyhow::Result<Option<StudentRef>>;
    /// Students enrolled in the subject, ordered by name then id.
    fn list_enrolled_students(&self, subject_id: i64) -> anyhow::Result<Vec<StudentRef>>;
    /// Distinct dates with at least one mark for the subject, ascending.
    fn list_attendance_dates(&self, subject_id: i64) -> anyhow::Result<Vec<NaiveDate>>;
    fn list_subject_attendance(&self, subject_id: i64) -> anyhow::Result<Vec<AttendanceRow>>;
    fn get_attendance_records_for_student(
        &self,
        student_id: i64,
        subject_id: Option<i64>,
    ) -> anyhow::Result<Vec<AttendanceRecord>>;
    fn get_attendance_mark(
        &self,
        student_id: i64,
        subject_id: i64,
        date: NaiveDate,
    ) -> anyhow::Result<Option<bool>>;
}

impl AttendanceSource for Connection {
    fn list_subjects_for_teacher(&self, teacher_id: i64) -> anyhow::Result<Vec<SubjectRef>> {
        let mut stmt = self.prepare(
            "SELECT id, teacher_id, name FROM subjects WHERE teacher_id = ? ORDER BY name, id",
        )?;
        let rows = stmt
            .query_map([teacher_id], subject_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get_subject(&self, subject_id: i64) -> anyhow::Result<Option<SubjectRef>> {
        Ok(self
            .query_row(
                "SELECT id, teacher_id, name FROM subjects WHERE id = ?",
                [subject_id],
                subject_from_row,
            )
            .optional()?)
    }

    fn get_student(&self, student_id: i64) -> anyhow::Result<Option<StudentRef>> {
        Ok(self
            .query_row(
                "SELECT id, teacher_id, full_name FROM students WHERE id = ?",
                [student_id],
                student_from_row,
            )
            .optional()?)
    }

    fn list_enrolled_students(&self, subject_id: i64) -> anyhow::Result<Vec<StudentRef>> {
        let mut stmt = self.prepare(
            "SELECT s.id, s.teacher_id, s.full_name
             FROM subject_students ss
             JOIN students s ON s.id = ss.student_id
             WHERE ss.subject_id = ?
             ORDER BY s.full_name, s.id",
        )?;
        let rows = stmt
            .query_map([subject_id], student_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn list_attendance_dates(&self, subject_id: i64) -> anyhow::Result<Vec<NaiveDate>> {
        let mut stmt = self.prepare(
            "SELECT DISTINCT date FROM attendance WHERE subject_id = ? ORDER BY date",
        )?;
        let rows = stmt
            .query_map([subject_id], |r| r.get::<_, NaiveDate>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn list_subject_attendance(&self, subject_id: i64) -> anyhow::Result<Vec<AttendanceRow>> {
        let mut stmt = self.prepare(
            "SELECT student_id, date, is_present
             FROM attendance
             WHERE subject_id = ?
             ORDER BY date, student_id",
        )?;
        let rows = stmt
            .query_map([subject_id], |r| {
                Ok(AttendanceRow {
                    student_id: r.get(0)?,
                    date: r.get(1)?,
                    present: r.get::<_, i64>(2)? != 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get_attendance_records_for_student(
        &self,
        student_id: i64,
        subject_id: Option<i64>,
    ) -> anyhow::Result<Vec<AttendanceRecord>> {
        let map = |r: &rusqlite::Row<'_>| {
            Ok(AttendanceRecord {
                date: r.get(0)?,
                present: r.get::<_, i64>(1)? != 0,
            })
        };
        let rows = match subject_id {
            Some(subject_id) => {
                let mut stmt = self.prepare(
                    "SELECT date, is_present FROM attendance
                     WHERE student_id = ? AND subject_id = ?
                     ORDER BY date",
                )?;
                let rows = stmt
                    .query_map((student_id, subject_id), map)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = self.prepare(
                    "SELECT date, is_present FROM attendance
                     WHERE student_id = ?
                     ORDER BY date, subject_id",
                )?;
                let rows = stmt
                    .query_map([student_id], map)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(rows)
    }

    fn get_attendance_mark(
        &self,
        student_id: i64,
        subject_id: i64,
        date: NaiveDate,
    ) -> anyhow::Result<Option<bool>> {
        let v: Option<i64> = self
            .query_row(
                "SELECT is_present FROM attendance
                 WHERE student_id = ? AND subject_id = ? AND date = ?",
                (student_id, subject_id, date),
                |r| r.get(0),
            )
            .optional()?;
        Ok(v.map(|p| p != 0))
    }
}

fn subject_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<SubjectRef> {
    Ok(SubjectRef {
        id: r.get(0)?,
        teacher_id: r.get(1)?,
        name: r.get(2)?,
    })
}

fn student_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<StudentRef> {
    Ok(StudentRef {
        id: r.get(0)?,
        teacher_id: r.get(1)?,
        name: r.get(2)?,
    })
}

fn now_stamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub fn find_teacher(conn: &Connection, external_id: i64) -> anyhow::Result<Option<TeacherRecord>> {
    Ok(conn
        .query_row(
            "SELECT id, external_id, name FROM teachers WHERE external_id = ?",
            [external_id],
            |r| {
                Ok(TeacherRecord {
                    id: r.get(0)?,
                    external_id: r.get(1)?,
                    name: r.get(2)?,
                })
            },
        )
        .optional()?)
}

pub fn get_teacher(conn: &Connection, teacher_id: i64) -> anyhow::Result<Option<TeacherRecord>> {
    Ok(conn
        .query_row(
            "SELECT id, external_id, name FROM teachers WHERE id = ?",
            [teacher_id],
            |r| {
                Ok(TeacherRecord {
                    id: r.get(0)?,
                    external_id: r.get(1)?,
                    name: r.get(2)?,
                })
            },
        )
        .optional()?)
}

/// Returns the teacher for `external_id`, creating it on first contact.
pub fn ensure_teacher(conn: &Connection, external_id: i64, name: &str) -> anyhow::Result<TeacherRecord> {
    conn.execute(
        "INSERT INTO teachers(external_id, name, created_at) VALUES(?, ?, ?)
         ON CONFLICT(external_id) DO NOTHING",
        (external_id, name.trim(), now_stamp()),
    )
    .context("failed to insert teacher")?;
    find_teacher(conn, external_id)?
        .ok_or_else(|| anyhow::anyhow!("teacher {} vanished after insert", external_id))
}

pub fn create_subject(conn: &Connection, teacher_id: i64, name: &str) -> anyhow::Result<SubjectRef> {
    let name = name.trim();
    if name.is_empty() {
        bail!("subject name must not be empty");
    }
    conn.execute(
        "INSERT INTO subjects(teacher_id, name, created_at) VALUES(?, ?, ?)",
        (teacher_id, name, now_stamp()),
    )
    .context("failed to insert subject")?;
    Ok(SubjectRef {
        id: conn.last_insert_rowid(),
        teacher_id,
        name: name.to_string(),
    })
}

pub fn rename_subject(conn: &Connection, subject_id: i64, name: &str) -> anyhow::Result<bool> {
    let name = name.trim();
    if name.is_empty() {
        bail!("subject name must not be empty");
    }
    let n = conn.execute("UPDATE subjects SET name = ? WHERE id = ?", (name, subject_id))?;
    Ok(n > 0)
}

pub fn delete_subject(conn: &Connection, subject_id: i64) -> anyhow::Result<bool> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM attendance WHERE subject_id = ?", [subject_id])?;
    tx.execute("DELETE FROM subject_students WHERE subject_id = ?", [subject_id])?;
    let n = tx.execute("DELETE FROM subjects WHERE id = ?", [subject_id])?;
    tx.commit()?;
    Ok(n > 0)
}

pub fn list_students_for_teacher(conn: &Connection, teacher_id: i64) -> anyhow::Result<Vec<StudentRef>> {
    let mut stmt = conn.prepare(
        "SELECT id, teacher_id, full_name FROM students WHERE teacher_id = ? ORDER BY full_name, id",
    )?;
    let rows = stmt
        .query_map([teacher_id], student_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn create_student(conn: &Connection, teacher_id: i64, name: &str) -> anyhow::Result<StudentRef> {
    let name = name.trim();
    if name.is_empty() {
        bail!("student name must not be empty");
    }
    conn.execute(
        "INSERT INTO students(teacher_id, full_name, created_at) VALUES(?, ?, ?)",
        (teacher_id, name, now_stamp()),
    )
    .context("failed to insert student")?;
    Ok(StudentRef {
        id: conn.last_insert_rowid(),
        teacher_id,
        name: name.to_string(),
    })
}

/// Creates one student per non-blank line of `names`.
pub fn create_students_bulk(
    conn: &Connection,
    teacher_id: i64,
    names: &str,
) -> anyhow::Result<Vec<StudentRef>> {
    let tx = conn.unchecked_transaction()?;
    let mut created = Vec::new();
    for line in names.lines().map(str::trim).filter(|l| !l.is_empty()) {
        created.push(create_student(&tx, teacher_id, line)?);
    }
    tx.commit()?;
    Ok(created)
}

pub fn rename_student(conn: &Connection, student_id: i64, name: &str) -> anyhow::Result<bool> {
    let name = name.trim();
    if name.is_empty() {
        bail!("student name must not be empty");
    }
    let n = conn.execute(
        "UPDATE students SET full_name = ? WHERE id = ?",
        (name, student_id),
    )?;
    Ok(n > 0)
}

pub fn delete_student(conn: &Connection, student_id: i64) -> anyhow::Result<bool> {
    let tx = conn.unchecked_transaction()?;
    tx.execute("DELETE FROM attendance WHERE student_id = ?", [student_id])?;
    tx.execute("DELETE FROM subject_students WHERE student_id = ?", [student_id])?;
    let n = tx.execute("DELETE FROM students WHERE id = ?", [student_id])?;
    tx.commit()?;
    Ok(n > 0)
}

pub fn is_enrolled(conn: &Connection, subject_id: i64, student_id: i64) -> anyhow::Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM subject_students WHERE subject_id = ? AND student_id = ?",
            (subject_id, student_id),
            |r| r.get::<_, i64>(0),
        )
        .optional()?
        .is_some())
}

/// Links a student from the teacher's pool to a subject. Returns `false` when the
/// link already existed.
pub fn enroll_student(conn: &Connection, subject_id: i64, student_id: i64) -> anyhow::Result<bool> {
    let subject = conn
        .get_subject(subject_id)?
        .ok_or_else(|| anyhow::anyhow!("subject {} not found", subject_id))?;
    let student = conn
        .get_student(student_id)?
        .ok_or_else(|| anyhow::anyhow!("student {} not found", student_id))?;
    if subject.teacher_id != student.teacher_id {
        bail!("student {} belongs to another teacher", student_id);
    }
    let n = conn.execute(
        "INSERT INTO subject_students(subject_id, student_id, enrolled_at) VALUES(?, ?, ?)
         ON CONFLICT(subject_id, student_id) DO NOTHING",
        (subject_id, student_id, now_stamp()),
    )?;
    Ok(n > 0)
}

/// Removes the link and every attendance mark of that student in that subject.
pub fn unenroll_student(conn: &Connection, subject_id: i64, student_id: i64) -> anyhow::Result<bool> {
    let tx = conn.unchecked_transaction()?;
    tx.execute(
        "DELETE FROM attendance WHERE subject_id = ? AND student_id = ?",
        (subject_id, student_id),
    )?;
    let n = tx.execute(
        "DELETE FROM subject_students WHERE subject_id = ? AND student_id = ?",
        (subject_id, student_id),
    )?;
    tx.commit()?;
    Ok(n > 0)
}

/// Upserts one mark keyed by (student, subject, date); repeated calls keep the last value.
pub fn set_attendance(
    conn: &Connection,
    student_id: i64,
    subject_id: i64,
    date: NaiveDate,
    present: bool,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO attendance(student_id, subject_id, date, is_present, updated_at)
         VALUES(?, ?, ?, ?, ?)
         ON CONFLICT(student_id, subject_id, date) DO UPDATE SET
           is_present = excluded.is_present,
           updated_at = excluded.updated_at",
        (student_id, subject_id, date, present as i64, now_stamp()),
    )
    .context("failed to upsert attendance")?;
    Ok(())
}

/// Marks every enrolled student of the subject on `date`. Returns the number of marks written.
pub fn set_attendance_for_all(
    conn: &Connection,
    subject_id: i64,
    date: NaiveDate,
    present: bool,
) -> anyhow::Result<usize> {
    let students = conn.list_enrolled_students(subject_id)?;
    let tx = conn.unchecked_transaction()?;
    for s in &students {
        set_attendance(&tx, s.id, subject_id, date, present)?;
    }
    tx.commit()?;
    Ok(students.len())
}
