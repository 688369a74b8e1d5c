//! Minimal Office Open XML workbook writer for the attendance sheets.
//!
//! Strings are written inline (no shared string table) and styles come from one fixed
//! style sheet, indexed by [`CellStyle`].

use crate::report::{CellStyle, CellValue, Sheet, Workbook};
use anyhow::Context;
use std::fmt::Write as _;
use std::io::{Cursor, Write};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

const CONTENT_TYPES_ENTRY: &str = "[Content_Types].xml";
const ROOT_RELS_ENTRY: &str = "_rels/.rels";
const WORKBOOK_ENTRY: &str = "xl/workbook.xml";
const WORKBOOK_RELS_ENTRY: &str = "xl/_rels/workbook.xml.rels";
const STYLES_ENTRY: &str = "xl/styles.xml";

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const NS_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<fonts count="4">
<font><sz val="11"/><name val="Calibri"/></font>
<font><b/><sz val="14"/><name val="Calibri"/></font>
<font><b/><sz val="11"/><color rgb="FFFFFFFF"/><name val="Calibri"/></font>
<font><b/><sz val="11"/><name val="Calibri"/></font>
</fonts>
<fills count="5">
<fill><patternFill patternType="none"/></fill>
<fill><patternFill patternType="gray125"/></fill>
<fill><patternFill patternType="solid"><fgColor rgb="FF4472C4"/><bgColor indexed="64"/></patternFill></fill>
<fill><patternFill patternType="solid"><fgColor rgb="FFC6EFCE"/><bgColor indexed="64"/></patternFill></fill>
<fill><patternFill patternType="solid"><fgColor rgb="FFFFC7CE"/><bgColor indexed="64"/></patternFill></fill>
</fills>
<borders count="2">
<border><left/><right/><top/><bottom/><diagonal/></border>
<border><left style="thin"/><right style="thin"/><top style="thin"/><bottom style="thin"/><diagonal/></border>
</borders>
<cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
<cellXfs count="8">
<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
<xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/>
<xf numFmtId="0" fontId="2" fillId="2" borderId="1" xfId="0" applyFont="1" applyFill="1" applyBorder="1" applyAlignment="1"><alignment horizontal="center" vertical="center"/></xf>
<xf numFmtId="0" fontId="0" fillId="3" borderId="1" xfId="0" applyFill="1" applyBorder="1" applyAlignment="1"><alignment horizontal="center" vertical="center"/></xf>
<xf numFmtId="0" fontId="0" fillId="4" borderId="1" xfId="0" applyFill="1" applyBorder="1" applyAlignment="1"><alignment horizontal="center" vertical="center"/></xf>
<xf numFmtId="0" fontId="0" fillId="0" borderId="1" xfId="0" applyBorder="1" applyAlignment="1"><alignment horizontal="center" vertical="center"/></xf>
<xf numFmtId="0" fontId="0" fillId="0" borderId="1" xfId="0" applyBorder="1"/>
<xf numFmtId="0" fontId="3" fillId="0" borderId="1" xfId="0" applyFont="1" applyBorder="1" applyAlignment="1"><alignment horizontal="center" vertical="center"/></xf>
</cellXfs>
<cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles>
</styleSheet>
"#;

fn style_index(style: CellStyle) -> usize {
    match style {
        CellStyle::Plain => 0,
        CellStyle::Title => 1,
        CellStyle::Header => 2,
        CellStyle::Present => 3,
        CellStyle::Absent => 4,
        CellStyle::Centered => 5,
        CellStyle::Name => 6,
        CellStyle::Total => 7,
    }
}

/// Spreadsheet column letters for a zero-based index: 0 -> A, 25 -> Z, 26 -> AA.
pub fn column_name(index: usize) -> String {
    let mut n = index + 1;
    let mut out = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        out.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    out.iter().rev().collect()
}

/// Markup characters escaped; characters outside the XML 1.0 set dropped.
fn escape_xml(s: &str) -> String {
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

fn sheet_xml(sheet: &Sheet) -> String {
    let mut xml = String::new();
    let _ = writeln!(xml, r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    let _ = writeln!(xml, r#"<worksheet xmlns="{NS_MAIN}" xmlns:r="{NS_REL}">"#);

    if !sheet.column_widths.is_empty() {
        let _ = write!(xml, "<cols>");
        for (i, w) in sheet.column_widths.iter().enumerate() {
            let _ = write!(
                xml,
                r#"<col min="{n}" max="{n}" width="{w}" customWidth="1"/>"#,
                n = i + 1
            );
        }
        let _ = writeln!(xml, "</cols>");
    }

    let _ = writeln!(xml, "<sheetData>");
    for (r, row) in sheet.rows.iter().enumerate() {
        if row.is_empty() {
            continue;
        }
        let row_no = r + 1;
        let _ = write!(xml, r#"<row r="{row_no}">"#);
        for (c, cell) in row.iter().enumerate() {
            let reference = format!("{}{}", column_name(c), row_no);
            let s = style_index(cell.style);
            match &cell.value {
                CellValue::Empty => {
                    let _ = write!(xml, r#"<c r="{reference}" s="{s}"/>"#);
                }
                CellValue::Number(n) => {
                    let _ = write!(xml, r#"<c r="{reference}" s="{s}"><v>{n}</v></c>"#);
                }
                CellValue::Text(t) => {
                    let _ = write!(
                        xml,
                        r#"<c r="{reference}" s="{s}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                        escape_xml(t)
                    );
                }
            }
        }
        let _ = writeln!(xml, "</row>");
    }
    let _ = writeln!(xml, "</sheetData>");

    if !sheet.merges.is_empty() {
        let _ = write!(xml, r#"<mergeCells count="{}">"#, sheet.merges.len());
        for m in &sheet.merges {
            let _ = write!(
                xml,
                r#"<mergeCell ref="{}{row}:{}{row}"/>"#,
                column_name(m.first_col),
                column_name(m.last_col),
                row = m.row + 1
            );
        }
        let _ = writeln!(xml, "</mergeCells>");
    }

    let _ = writeln!(xml, "</worksheet>");
    xml
}

fn content_types_xml(sheet_count: usize) -> String {
    let mut xml = String::new();
    let _ = writeln!(xml, r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    let _ = writeln!(
        xml,
        r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#
    );
    let _ = writeln!(
        xml,
        r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#
    );
    let _ = writeln!(xml, r#"<Default Extension="xml" ContentType="application/xml"/>"#);
    let _ = writeln!(
        xml,
        r#"<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>"#
    );
    for i in 1..=sheet_count {
        let _ = writeln!(
            xml,
            r#"<Override PartName="/xl/worksheets/sheet{i}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        );
    }
    let _ = writeln!(
        xml,
        r#"<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#
    );
    let _ = writeln!(xml, "</Types>");
    xml
}

fn root_rels_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{NS_PKG_REL}">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>
"#
    )
}

fn workbook_xml(workbook: &Workbook) -> String {
    let mut xml = String::new();
    let _ = writeln!(xml, r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    let _ = writeln!(xml, r#"<workbook xmlns="{NS_MAIN}" xmlns:r="{NS_REL}">"#);
    let _ = write!(xml, "<sheets>");
    for (i, sheet) in workbook.sheets.iter().enumerate() {
        let _ = write!(
            xml,
            r#"<sheet name="{}" sheetId="{id}" r:id="rId{id}"/>"#,
            escape_xml(&sheet.name),
            id = i + 1
        );
    }
    let _ = writeln!(xml, "</sheets>");
    let _ = writeln!(xml, "</workbook>");
    xml
}

fn workbook_rels_xml(sheet_count: usize) -> String {
    let mut xml = String::new();
    let _ = writeln!(xml, r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    let _ = writeln!(xml, r#"<Relationships xmlns="{NS_PKG_REL}">"#);
    for i in 1..=sheet_count {
        let _ = writeln!(
            xml,
            r#"<Relationship Id="rId{i}" Type="{NS_REL}/worksheet" Target="worksheets/sheet{i}.xml"/>"#
        );
    }
    let _ = writeln!(
        xml,
        r#"<Relationship Id="rId{}" Type="{NS_REL}/styles" Target="styles.xml"/>"#,
        sheet_count + 1
    );
    let _ = writeln!(xml, "</Relationships>");
    xml
}

/// Encodes the workbook as `.xlsx` bytes.
pub fn encode_workbook(workbook: &Workbook) -> anyhow::Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let sheet_count = workbook.sheets.len();

    let mut entries: Vec<(String, String)> = vec![
        (CONTENT_TYPES_ENTRY.to_string(), content_types_xml(sheet_count)),
        (ROOT_RELS_ENTRY.to_string(), root_rels_xml()),
        (WORKBOOK_ENTRY.to_string(), workbook_xml(workbook)),
        (WORKBOOK_RELS_ENTRY.to_string(), workbook_rels_xml(sheet_count)),
        (STYLES_ENTRY.to_string(), STYLES_XML.to_string()),
    ];
    for (i, sheet) in workbook.sheets.iter().enumerate() {
        entries.push((format!("xl/worksheets/sheet{}.xml", i + 1), sheet_xml(sheet)));
    }

    for (name, body) in &entries {
        zip.start_file(name.as_str(), opts)
            .with_context(|| format!("failed to start workbook entry {}", name))?;
        zip.write_all(body.as_bytes())
            .with_context(|| format!("failed to write workbook entry {}", name))?;
    }

    let cursor = zip.finish().context("failed to finalize workbook")?;
    Ok(cursor.into_inner())
}
