//! Output formatting and file exports.
//!
//! Supports pretty-printing, JSON serialization, CSV and XLSX export.

use std::fs::File;
use std::path::Path;

use csv::WriterBuilder;
use rust_xlsxwriter::{Workbook, XlsxError};
use serde::Serialize;
use tracing::{debug, info};

use crate::analyzers::types::{
    EnvironmentRecord, GrowthRecord, Observation, SheetValue, StudyReport,
};
use crate::error::{Result, StudyError};
use crate::loader::SchoolTable;

/// Default file name for a school's exported environmental table.
pub fn environment_export_name(school: &str) -> String {
    format!("{school}_환경데이터.csv")
}

pub const GROWTH_EXPORT_NAME: &str = "4개교_생육결과_통합.xlsx";

/// Logs a report using Rust's debug pretty-print format.
pub fn print_pretty(report: &StudyReport) {
    debug!("{:#?}", report);
}

/// Logs any serializable value as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Writes a report as pretty-printed JSON to `path`.
pub fn write_report_json(path: &Path, report: &StudyReport) -> Result<()> {
    let file = File::create(path).map_err(|e| StudyError::io(path, e))?;
    serde_json::to_writer_pretty(file, report).map_err(|e| StudyError::io(path, e.into()))?;
    info!(path = %path.display(), "Report written");
    Ok(())
}

/// Writes `rows` as a CSV file with a header row, replacing any existing file.
pub fn write_csv<R: Serialize>(path: &Path, rows: &[R]) -> Result<()> {
    debug!(path = %path.display(), rows = rows.len(), "Writing CSV");

    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| StudyError::csv(path, e))?;

    for row in rows {
        writer.serialize(row).map_err(|e| StudyError::csv(path, e))?;
    }
    writer.flush().map_err(|e| StudyError::io(path, e))?;

    Ok(())
}

/// Exports one school's environmental table as CSV.
pub fn export_environment_csv(path: &Path, rows: &[EnvironmentRecord]) -> Result<()> {
    write_csv(path, rows)?;
    info!(path = %path.display(), rows = rows.len(), "Environment table exported");
    Ok(())
}

/// Exports the combined growth table as a single-sheet XLSX workbook.
///
/// Columns are the union of every sheet's header in first-seen order,
/// followed by `school`. Blank or missing cells are left empty.
pub fn export_growth_xlsx(path: &Path, tables: &[SchoolTable<GrowthRecord>]) -> Result<()> {
    let count = write_growth_sheet(path, tables).map_err(|source| StudyError::Xlsx {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), rows = count, "Growth table exported");
    Ok(())
}

/// Union of the sheet headers; `school` is always written last.
fn growth_export_columns(tables: &[SchoolTable<GrowthRecord>]) -> Vec<&str> {
    let mut columns: Vec<&str> = Vec::new();
    for name in tables.iter().flat_map(|t| t.columns.iter()) {
        if name != "school" && !columns.contains(&name.as_str()) {
            columns.push(name);
        }
    }
    columns
}

fn write_growth_sheet(
    path: &Path,
    tables: &[SchoolTable<GrowthRecord>],
) -> std::result::Result<usize, XlsxError> {
    let columns = growth_export_columns(tables);
    let school_col = columns.len() as u16;

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, header) in columns.iter().enumerate() {
        sheet.write_string(0, col as u16, *header)?;
    }
    sheet.write_string(0, school_col, "school")?;

    let mut count = 0;
    for (i, record) in tables.iter().flat_map(|t| t.rows.iter()).enumerate() {
        let row = (i + 1) as u32;
        for (col, name) in columns.iter().enumerate() {
            let col = col as u16;
            let value = record
                .value(name)
                .map(SheetValue::Number)
                .or_else(|| record.extra.get(*name).cloned());
            match value {
                Some(SheetValue::Number(v)) => sheet.write_number(row, col, v)?,
                Some(SheetValue::Text(s)) => sheet.write_string(row, col, s)?,
                Some(SheetValue::Bool(b)) => sheet.write_boolean(row, col, b)?,
                None => continue,
            };
        }
        sheet.write_string(row, school_col, &record.school)?;
        count += 1;
    }

    workbook.save(path)?;
    Ok(count)
}
