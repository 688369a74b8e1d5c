use crate::ledger::Ledger;
use crate::period::{short_label, DateRange};
use crate::stats::whole_percentage;
use crate::store::AttendanceSource;
use crate::xlsx;
use std::collections::HashSet;

pub const PRESENT_MARK: &str = "+";
pub const ABSENT_MARK: &str = "-";
const MAX_SHEET_NAME_CHARS: usize = 31;
const RESERVED_SHEET_NAME: &str = "History";
const NAME_COLUMN_WIDTH: f64 = 30.0;
const INDEX_COLUMN_WIDTH: f64 = 5.0;
const DATE_COLUMN_WIDTH: f64 = 8.0;

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellStyle {
    Plain,
    Title,
    Header,
    Present,
    Absent,
    Centered,
    Name,
    Total,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub style: CellStyle,
}

impl Cell {
    fn text(s: impl Into<String>, style: CellStyle) -> Cell {
        Cell {
            value: CellValue::Text(s.into()),
            style,
        }
    }

    fn number(n: f64, style: CellStyle) -> Cell {
        Cell {
            value: CellValue::Number(n),
            style,
        }
    }

    fn blank(style: CellStyle) -> Cell {
        Cell {
            value: CellValue::Empty,
            style,
        }
    }

    #[cfg(test)]
    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            CellValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// A horizontal merge of `first_col..=last_col` on `row` (zero based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Merge {
    pub row: usize,
    pub first_col: usize,
    pub last_col: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
    pub column_widths: Vec<f64>,
    pub merges: Vec<Merge>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SheetLayout {
    /// Title line above the table; student rows are listed even without occasions.
    Detailed,
    /// Table only; subjects without students or occasions keep just the header.
    Compact,
}

fn whole_percent(present: usize, total: usize) -> String {
    format!("{}%", whole_percentage(present, total) as i64)
}

fn subject_sheet(ledger: &Ledger, name: String, layout: SheetLayout) -> Sheet {
    let date_count = ledger.dates.len();
    let mut rows: Vec<Vec<Cell>> = Vec::new();
    let mut merges = Vec::new();

    if layout == SheetLayout::Detailed {
        rows.push(vec![Cell::text(
            format!("Attendance: {}", ledger.subject_name()),
            CellStyle::Title,
        )]);
        merges.push(Merge {
            row: 0,
            first_col: 0,
            last_col: (date_count + 3).max(4) - 1,
        });
        rows.push(Vec::new());
    }

    let mut header = vec![
        Cell::text("#", CellStyle::Header),
        Cell::text("Student", CellStyle::Header),
    ];
    header.extend(
        ledger
            .dates
            .iter()
            .map(|d| Cell::text(short_label(*d), CellStyle::Header)),
    );
    header.push(Cell::text("Total", CellStyle::Header));
    header.push(Cell::text("%", CellStyle::Header));
    rows.push(header);

    let has_data = !ledger.students.is_empty() && date_count > 0;
    let list_students = match layout {
        SheetLayout::Detailed => true,
        SheetLayout::Compact => has_data,
    };

    if list_students {
        for (idx, student) in ledger.students.iter().enumerate() {
            let mut row = vec![
                Cell::number((idx + 1) as f64, CellStyle::Centered),
                Cell::text(student.name.clone(), CellStyle::Name),
            ];
            let mut present_count = 0usize;
            for date in &ledger.dates {
                if ledger.is_present(student.id, *date) {
                    present_count += 1;
                    row.push(Cell::text(PRESENT_MARK, CellStyle::Present));
                } else {
                    row.push(Cell::text(ABSENT_MARK, CellStyle::Absent));
                }
            }
            row.push(Cell::number(present_count as f64, CellStyle::Centered));
            row.push(Cell::text(
                whole_percent(present_count, date_count),
                CellStyle::Centered,
            ));
            rows.push(row);
        }
    }

    if has_data {
        rows.push(Vec::new());
        let total_students = ledger.students.len();
        let mut total = vec![
            Cell::blank(CellStyle::Centered),
            Cell::text("TOTAL", CellStyle::Total),
        ];
        total.extend(ledger.dates.iter().map(|d| {
            Cell::text(
                format!("{}/{}", ledger.present_count_on(*d), total_students),
                CellStyle::Total,
            )
        }));
        rows.push(total);
    }

    let mut column_widths = vec![INDEX_COLUMN_WIDTH, NAME_COLUMN_WIDTH];
    column_widths.extend(std::iter::repeat(DATE_COLUMN_WIDTH).take(date_count + 2));

    Sheet {
        name,
        rows,
        column_widths,
        merges,
    }
}

/// Makes `raw` usable as a sheet name: forbidden characters replaced, no apostrophe at
/// either end, `History` avoided, length capped, and unique (case-insensitive) among `taken`.
fn sheet_name(raw: &str, ordinal: usize, taken: &mut HashSet<String>) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches('\'').trim();
    let base = if cleaned.is_empty() {
        format!("Sheet{}", ordinal)
    } else if cleaned.eq_ignore_ascii_case(RESERVED_SHEET_NAME) {
        format!("{}_", cleaned)
    } else {
        cleaned.to_string()
    };

    let mut n = 1;
    loop {
        let suffix = if n == 1 { String::new() } else { format!(" ({})", n) };
        let keep = MAX_SHEET_NAME_CHARS - suffix.chars().count();
        let head: String = base.chars().take(keep).collect();
        let candidate = head.trim_end_matches('\'').to_string() + &suffix;
        if taken.insert(candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}

pub fn subject_workbook(ledger: &Ledger) -> Workbook {
    Workbook {
        sheets: vec![subject_sheet(
            ledger,
            "Attendance".to_string(),
            SheetLayout::Detailed,
        )],
    }
}

pub fn all_subjects_workbook(ledgers: &[Ledger]) -> Workbook {
    if ledgers.is_empty() {
        return Workbook {
            sheets: vec![Sheet {
                name: "No data".to_string(),
                rows: vec![vec![Cell::text("No subjects", CellStyle::Plain)]],
                column_widths: Vec::new(),
                merges: Vec::new(),
            }],
        };
    }
    let mut taken = HashSet::new();
    let sheets = ledgers
        .iter()
        .enumerate()
        .map(|(i, ledger)| {
            let name = sheet_name(ledger.subject_name(), i + 1, &mut taken);
            subject_sheet(ledger, name, SheetLayout::Compact)
        })
        .collect();
    Workbook { sheets }
}

pub fn render_subject_report<S>(
    source: &S,
    subject_id: i64,
    range: DateRange,
) -> anyhow::Result<Vec<u8>>
where
    S: AttendanceSource + ?Sized,
{
    let ledger = Ledger::load(source, subject_id, range)?;
    xlsx::encode_workbook(&subject_workbook(&ledger))
}

pub fn render_all_subjects_report<S>(
    source: &S,
    teacher_id: i64,
    range: DateRange,
) -> anyhow::Result<Vec<u8>>
where
    S: AttendanceSource + ?Sized,
{
    let ledgers = source
        .list_subjects_for_teacher(teacher_id)?
        .iter()
        .map(|s| Ledger::load(source, s.id, range))
        .collect::<anyhow::Result<Vec<_>>>()?;
    xlsx::encode_workbook(&all_subjects_workbook(&ledgers))
}
