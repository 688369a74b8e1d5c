//! Attendance charts: composed as SVG, rasterized to PNG.
//!
//! Every renderer returns `Ok(None)` when there is nothing to plot; the caller decides what
//! to tell the user. Errors only come from the rasterizer.

use crate::bands::{color_for, guide_percents, BANDS};
use crate::ledger::Ledger;
use crate::period::{short_label, DateRange};
use crate::stats::{
    attendance_by_dates, compute_teacher_overall_stats, rank_students, subject_stats_from_ledger,
    whole_percentage, DateTally, StudentStats, SubjectStats,
};
use crate::store::AttendanceSource;
use anyhow::{anyhow, Context};
use once_cell::sync::Lazy;
use resvg::usvg;
use std::fmt::Write as _;
use std::sync::Arc;

pub const MAX_CHART_STUDENTS: usize = 20;
const MAX_NAME_CHARS: usize = 25;
const PERCENT_AXIS_MAX: f64 = 105.0;

const AXIS_COLOR: &str = "#555555";
const GRID_COLOR: &str = "#E5E5E5";
const FONT_FAMILY: &str = "DejaVu Sans, Arial, sans-serif";

static FONTS: Lazy<Arc<usvg::fontdb::Database>> = Lazy::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    Arc::new(db)
});

fn present_color() -> &'static str {
    BANDS[0].color
}

fn absent_color() -> &'static str {
    BANDS[BANDS.len() - 1].color
}

/// Escapes markup characters and drops anything XML 1.0 cannot carry.
fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if c < ' ' || c == '\u{FFFE}' || c == '\u{FFFF}' => {}
            c => out.push(c),
        }
    }
    out
}

fn short_name(name: &str) -> String {
    if name.chars().count() > MAX_NAME_CHARS {
        let head: String = name.chars().take(MAX_NAME_CHARS).collect();
        format!("{head}...")
    } else {
        name.to_string()
    }
}

fn open_svg(svg: &mut String, width: f64, height: f64, title: &str) {
    let _ = writeln!(
        svg,
        "<svg xmlns='http://www.w3.org/2000/svg' width='{width:.0}' height='{height:.0}' viewBox='0 0 {width:.0} {height:.0}' font-family='{FONT_FAMILY}'>"
    );
    let _ = writeln!(svg, "  <rect width='{width:.0}' height='{height:.0}' fill='#FFFFFF'/>");
    let _ = writeln!(
        svg,
        "  <text x='{:.1}' y='32' text-anchor='middle' font-size='18' font-weight='bold' fill='#222222'>{}</text>",
        width / 2.0,
        escape_text(title)
    );
}

fn close_svg(svg: &mut String) {
    let _ = writeln!(svg, "</svg>");
}

/// Stacked present/absent bars, one per occasion, in date order.
pub fn dates_chart_svg(subject_name: &str, tallies: &[DateTally]) -> Option<String> {
    if tallies.is_empty() {
        return None;
    }

    let left = 70.0;
    let right = 30.0;
    let top = 70.0;
    let bottom = 80.0;
    let slot = 56.0;
    let plot_w = (tallies.len() as f64 * slot).max(560.0);
    let plot_h = 340.0;
    let width = left + plot_w + right;
    let height = top + plot_h + bottom;
    let slot = plot_w / tallies.len() as f64;
    let bar_w = slot * 0.6;
    let y_max = tallies.iter().map(|t| t.total).max().unwrap_or(0).max(1) as f64 * 1.12;
    let y = |v: f64| top + plot_h - v / y_max * plot_h;
    let present = present_color();
    let absent = absent_color();

    let mut svg = String::new();
    open_svg(&mut svg, width, height, &format!("Attendance: {subject_name}"));

    let step = ((y_max / 6.0).ceil() as usize).max(1);
    let mut tick = 0usize;
    while (tick as f64) <= y_max {
        let ty = y(tick as f64);
        let _ = writeln!(
            svg,
            "  <line x1='{left:.1}' y1='{ty:.1}' x2='{:.1}' y2='{ty:.1}' stroke='{GRID_COLOR}'/>",
            left + plot_w
        );
        let _ = writeln!(
            svg,
            "  <text x='{:.1}' y='{:.1}' text-anchor='end' font-size='11' fill='{AXIS_COLOR}'>{tick}</text>",
            left - 8.0,
            ty + 4.0
        );
        tick += step;
    }

    for (i, t) in tallies.iter().enumerate() {
        let x = left + slot * i as f64 + (slot - bar_w) / 2.0;
        let cx = x + bar_w / 2.0;
        let present_top = y(t.present as f64);
        let total_top = y((t.present + t.absent) as f64);
        let base = y(0.0);

        let _ = writeln!(
            svg,
            "  <rect x='{x:.1}' y='{present_top:.1}' width='{bar_w:.1}' height='{:.1}' fill='{present}' stroke='#FFFFFF'/>",
            base - present_top
        );
        let _ = writeln!(
            svg,
            "  <rect x='{x:.1}' y='{total_top:.1}' width='{bar_w:.1}' height='{:.1}' fill='{absent}' stroke='#FFFFFF'/>",
            present_top - total_top
        );
        if t.present > 0 {
            let _ = writeln!(
                svg,
                "  <text x='{cx:.1}' y='{:.1}' text-anchor='middle' font-size='12' font-weight='bold' fill='#FFFFFF'>{}</text>",
                (base + present_top) / 2.0 + 4.0,
                t.present
            );
        }
        if t.absent > 0 {
            let _ = writeln!(
                svg,
                "  <text x='{cx:.1}' y='{:.1}' text-anchor='middle' font-size='12' font-weight='bold' fill='#FFFFFF'>{}</text>",
                (present_top + total_top) / 2.0 + 4.0,
                t.absent
            );
        }
        let _ = writeln!(
            svg,
            "  <text x='{cx:.1}' y='{:.1}' text-anchor='middle' font-size='11' font-weight='bold' fill='#222222'>{:.0}%</text>",
            total_top - 6.0,
            whole_percentage(t.present, t.total)
        );
        let label_y = base + 18.0;
        let _ = writeln!(
            svg,
            "  <text x='{cx:.1}' y='{label_y:.1}' text-anchor='end' font-size='11' fill='{AXIS_COLOR}' transform='rotate(-45 {cx:.1} {label_y:.1})'>{}</text>",
            short_label(t.date)
        );
    }

    let _ = writeln!(
        svg,
        "  <line x1='{left:.1}' y1='{:.1}' x2='{:.1}' y2='{:.1}' stroke='{AXIS_COLOR}'/>",
        y(0.0),
        left + plot_w,
        y(0.0)
    );

    let legend_x = left + plot_w - 150.0;
    for (i, (color, label)) in [(present, "Present"), (absent, "Absent")]
        .iter()
        .enumerate()
    {
        let ly = top - 24.0 + i as f64 * 16.0;
        let _ = writeln!(
            svg,
            "  <rect x='{legend_x:.1}' y='{ly:.1}' width='12' height='12' fill='{color}'/>"
        );
        let _ = writeln!(
            svg,
            "  <text x='{:.1}' y='{:.1}' font-size='12' fill='#222222'>{label}</text>",
            legend_x + 18.0,
            ly + 10.0
        );
    }

    close_svg(&mut svg);
    Some(svg)
}

/// One labelled horizontal bar per row, best at top, on a 0..105 percentage axis.
struct PercentBar {
    label: String,
    percent: f64,
    annotation: String,
}

fn percent_bars_svg(title: &str, bars: &[PercentBar], label_room: f64) -> String {
    let left = 230.0;
    let plot_w = 560.0;
    let right = label_room;
    let top = 60.0;
    let row_h = 28.0;
    let bottom = 50.0;
    let plot_h = (bars.len() as f64 * row_h).max(240.0);
    let row_h = plot_h / bars.len().max(1) as f64;
    let width = left + plot_w + right;
    let height = top + plot_h + bottom;
    let x = |p: f64| left + p.clamp(0.0, PERCENT_AXIS_MAX) / PERCENT_AXIS_MAX * plot_w;

    let mut svg = String::new();
    open_svg(&mut svg, width, height, title);

    for tick in (0..=100).step_by(20) {
        let tx = x(tick as f64);
        let _ = writeln!(
            svg,
            "  <line x1='{tx:.1}' y1='{top:.1}' x2='{tx:.1}' y2='{:.1}' stroke='{GRID_COLOR}'/>",
            top + plot_h
        );
        let _ = writeln!(
            svg,
            "  <text x='{tx:.1}' y='{:.1}' text-anchor='middle' font-size='11' fill='{AXIS_COLOR}'>{tick}</text>",
            top + plot_h + 16.0
        );
    }
    let _ = writeln!(
        svg,
        "  <text x='{:.1}' y='{:.1}' text-anchor='middle' font-size='12' fill='{AXIS_COLOR}'>Attendance (%)</text>",
        left + plot_w / 2.0,
        top + plot_h + 38.0
    );

    for (i, bar) in bars.iter().enumerate() {
        let by = top + row_h * i as f64 + row_h * 0.15;
        let bh = row_h * 0.7;
        let cy = by + bh / 2.0 + 4.0;
        let bw = x(bar.percent) - left;
        let _ = writeln!(
            svg,
            "  <text x='{:.1}' y='{cy:.1}' text-anchor='end' font-size='12' fill='#222222'>{}</text>",
            left - 8.0,
            escape_text(&bar.label)
        );
        let _ = writeln!(
            svg,
            "  <rect x='{left:.1}' y='{by:.1}' width='{bw:.1}' height='{bh:.1}' fill='{}' stroke='#FFFFFF'/>",
            color_for(bar.percent)
        );
        let _ = writeln!(
            svg,
            "  <text x='{:.1}' y='{cy:.1}' font-size='12' font-weight='bold' fill='#222222'>{}</text>",
            left + bw + 6.0,
            escape_text(&bar.annotation)
        );
    }

    for guide in guide_percents() {
        let gx = x(guide);
        let _ = writeln!(
            svg,
            "  <line x1='{gx:.1}' y1='{top:.1}' x2='{gx:.1}' y2='{:.1}' stroke='{}' stroke-width='1' stroke-dasharray='6 4' stroke-opacity='0.5'/>",
            top + plot_h,
            color_for(guide)
        );
    }

    let _ = writeln!(
        svg,
        "  <line x1='{left:.1}' y1='{top:.1}' x2='{left:.1}' y2='{:.1}' stroke='{AXIS_COLOR}'/>",
        top + plot_h
    );
    close_svg(&mut svg);
    svg
}

/// The students plotted by the per-student chart: best first, at most [`MAX_CHART_STUDENTS`].
pub fn chart_students(students: &[StudentStats]) -> Vec<&StudentStats> {
    let mut ranked: Vec<&StudentStats> = students.iter().collect();
    ranked.sort_by(|a, b| rank_students(a, b));
    ranked.truncate(MAX_CHART_STUDENTS);
    ranked
}

pub fn students_chart_svg(subject_name: &str, students: &[StudentStats]) -> Option<String> {
    if students.is_empty() {
        return None;
    }
    let bars: Vec<PercentBar> = chart_students(students)
        .into_iter()
        .map(|s| PercentBar {
            label: short_name(&s.student_name),
            percent: s.percentage,
            annotation: format!("{:.0}%", s.percentage.round_ties_even()),
        })
        .collect();
    Some(percent_bars_svg(
        &format!("Student attendance: {subject_name}"),
        &bars,
        60.0,
    ))
}

/// Subjects that have occasions, best first.
pub fn chart_subjects(subjects: &[SubjectStats]) -> Vec<&SubjectStats> {
    let mut with_data: Vec<&SubjectStats> = subjects.iter().filter(|s| s.total_dates > 0).collect();
    with_data.sort_by(|a, b| {
        b.avg_attendance
            .total_cmp(&a.avg_attendance)
            .then_with(|| a.subject_name.cmp(&b.subject_name))
    });
    with_data
}

pub fn overall_chart_svg(subjects: &[SubjectStats]) -> Option<String> {
    let ranked = chart_subjects(subjects);
    if ranked.is_empty() {
        return None;
    }
    let bars: Vec<PercentBar> = ranked
        .into_iter()
        .map(|s| PercentBar {
            label: short_name(&s.subject_name),
            percent: s.avg_attendance,
            annotation: format!(
                "{:.0}% ({} students, {} dates)",
                s.avg_attendance.round_ties_even(),
                s.total_students,
                s.total_dates
            ),
        })
        .collect();
    Some(percent_bars_svg("Attendance by subject", &bars, 240.0))
}

/// Renders SVG markup to PNG bytes at the document's own size.
pub fn rasterize(svg: &str) -> anyhow::Result<Vec<u8>> {
    use png::{BitDepth, ColorType, Encoder};
    use resvg::tiny_skia::{Pixmap, Transform};

    let mut options = usvg::Options::default();
    options.fontdb = FONTS.clone();
    let tree = usvg::Tree::from_data(svg.as_bytes(), &options)
        .map_err(|e| anyhow!("chart svg parse failed: {e}"))?;

    let size = tree.size().to_int_size();
    let mut pixmap = Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow!("chart pixmap allocation failed"))?;
    resvg::render(&tree, Transform::default(), &mut pixmap.as_mut());

    let mut out = Vec::new();
    {
        let mut encoder = Encoder::new(&mut out, size.width(), size.height());
        encoder.set_color(ColorType::Rgba);
        encoder.set_depth(BitDepth::Eight);
        let mut writer = encoder.write_header().context("failed to write png header")?;
        writer
            .write_image_data(pixmap.data())
            .context("failed to write png data")?;
    }
    Ok(out)
}

fn render(svg: Option<String>) -> anyhow::Result<Option<Vec<u8>>> {
    svg.map(|s| rasterize(&s)).transpose()
}

pub fn render_dates_chart(subject_name: &str, tallies: &[DateTally]) -> anyhow::Result<Option<Vec<u8>>> {
    render(dates_chart_svg(subject_name, tallies))
}

pub fn render_students_chart(
    subject_name: &str,
    students: &[StudentStats],
) -> anyhow::Result<Option<Vec<u8>>> {
    render(students_chart_svg(subject_name, students))
}

pub fn render_overall_chart(subjects: &[SubjectStats]) -> anyhow::Result<Option<Vec<u8>>> {
    render(overall_chart_svg(subjects))
}

pub fn render_subject_dates_chart<S>(
    source: &S,
    subject_id: i64,
    range: DateRange,
) -> anyhow::Result<Option<Vec<u8>>>
where
    S: AttendanceSource + ?Sized,
{
    let ledger = Ledger::load(source, subject_id, range)?;
    render_dates_chart(ledger.subject_name(), &attendance_by_dates(&ledger))
}

pub fn render_subject_students_chart<S>(
    source: &S,
    subject_id: i64,
    range: DateRange,
) -> anyhow::Result<Option<Vec<u8>>>
where
    S: AttendanceSource + ?Sized,
{
    let ledger = Ledger::load(source, subject_id, range)?;
    let stats = subject_stats_from_ledger(&ledger);
    render_students_chart(&stats.subject_name, &stats.students_stats)
}

pub fn render_teacher_overall_chart<S>(
    source: &S,
    teacher_id: i64,
    range: DateRange,
) -> anyhow::Result<Option<Vec<u8>>>
where
    S: AttendanceSource + ?Sized,
{
    let overall = compute_teacher_overall_stats(source, teacher_id, range)?;
    render_overall_chart(&overall.subjects_stats)
}
