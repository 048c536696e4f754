//! Reads the raw experiment tables from the data directory.
//!
//! A [`Dataset`] is built once by the caller and passed by reference to the
//! aggregation code. Nothing here caches across calls.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use calamine::{CellErrorType, Data, Reader, open_workbook_auto};
use tracing::{debug, error, info, warn};

use crate::analyzers::types::{
    EnvironmentRecord, FRESH_WEIGHT, GrowthRecord, LEAF_COUNT, SHOOT_LENGTH, SheetValue,
    is_missing_marker, parse_measurement,
};
use crate::config::{EnvironmentSource, StudyConfig};
use crate::error::{Result, StudyError};
use crate::resolve::{nfc, resolve};

/// All rows loaded from one school's source.
#[derive(Debug, Clone, PartialEq)]
pub struct SchoolTable<R> {
    pub school: String,
    /// Header of the source, in source order, NFC-normalized.
    pub columns: Vec<String>,
    pub rows: Vec<R>,
}

/// Environmental and growth tables for one run, plus the logical names of
/// environmental files that could not be found.
#[derive(Debug, Clone)]
pub struct Dataset {
    data_dir: PathBuf,
    environment: Vec<SchoolTable<EnvironmentRecord>>,
    growth: Vec<SchoolTable<GrowthRecord>>,
    unresolved: Vec<EnvironmentSource>,
}

impl Dataset {
    /// Loads every configured source from `data_dir`.
    ///
    /// Missing environmental files are logged and skipped. A missing growth
    /// workbook is [`StudyError::NotFound`].
    ///
    /// # Errors
    ///
    /// [`StudyError::EmptyDataset`] if no environmental or no growth table
    /// was loaded; any read or parse failure otherwise.
    #[tracing::instrument(skip_all, fields(data_dir = %data_dir.display()))]
    pub fn load(data_dir: &Path, config: &StudyConfig) -> Result<Self> {
        let (environment, unresolved) =
            load_environment(data_dir, &config.environment_sources())?;
        let growth = load_growth(data_dir, &config.growth_workbook)?;

        let dataset = Self::from_parts(data_dir, environment, growth, unresolved)?;
        info!(
            environment_tables = dataset.environment.len(),
            growth_tables = dataset.growth.len(),
            unresolved = dataset.unresolved.len(),
            "Dataset loaded"
        );
        Ok(dataset)
    }

    /// Assembles a dataset from already-loaded tables.
    pub fn from_parts(
        data_dir: &Path,
        environment: Vec<SchoolTable<EnvironmentRecord>>,
        growth: Vec<SchoolTable<GrowthRecord>>,
        unresolved: Vec<EnvironmentSource>,
    ) -> Result<Self> {
        if environment.is_empty() {
            return Err(StudyError::EmptyDataset {
                what: "environment tables",
            });
        }
        if growth.is_empty() {
            return Err(StudyError::EmptyDataset {
                what: "growth tables",
            });
        }

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            environment,
            growth,
            unresolved,
        })
    }

    pub fn environment_tables(&self) -> &[SchoolTable<EnvironmentRecord>] {
        &self.environment
    }

    pub fn growth_tables(&self) -> &[SchoolTable<GrowthRecord>] {
        &self.growth
    }

    /// Environmental sources whose files were not found.
    pub fn unresolved(&self) -> &[EnvironmentSource] {
        &self.unresolved
    }

    /// Every environmental row, tables in configured order.
    pub fn environment_rows(&self) -> impl Iterator<Item = &EnvironmentRecord> + Clone {
        self.environment.iter().flat_map(|t| t.rows.iter())
    }

    /// Every growth row, sheets in workbook order.
    pub fn growth_rows(&self) -> impl Iterator<Item = &GrowthRecord> + Clone {
        self.growth.iter().flat_map(|t| t.rows.iter())
    }

    /// The environmental table of `school`.
    ///
    /// # Errors
    ///
    /// [`StudyError::NotFound`] naming the logical file when the school's
    /// CSV was not found at load time, [`StudyError::UnknownSchool`] when the
    /// school is not configured at all.
    pub fn environment_for(&self, school: &str) -> Result<&[EnvironmentRecord]> {
        let school = nfc(school);

        if let Some(table) = self.environment.iter().find(|t| t.school == school) {
            return Ok(&table.rows);
        }

        match self.unresolved.iter().find(|s| s.school == school) {
            Some(source) => Err(StudyError::NotFound {
                name: source.file.clone(),
                dir: self.data_dir.clone(),
            }),
            None => Err(StudyError::UnknownSchool { school }),
        }
    }
}

/// Resolves and reads each environmental CSV.
///
/// Returns the loaded tables in source order and the sources that could not
/// be resolved.
pub fn load_environment(
    data_dir: &Path,
    sources: &[EnvironmentSource],
) -> Result<(Vec<SchoolTable<EnvironmentRecord>>, Vec<EnvironmentSource>)> {
    let mut tables = Vec::new();
    let mut unresolved = Vec::new();

    for source in sources {
        let path = match resolve(data_dir, &source.file) {
            Ok(path) => path,
            Err(StudyError::NotFound { name, .. }) => {
                error!(file = %name, school = %source.school, "Environment file not found");
                unresolved.push(source.clone());
                continue;
            }
            Err(e) => return Err(e),
        };

        let table = read_environment_table(&path, &source.school)?;
        debug!(school = %source.school, rows = table.rows.len(), "Environment table read");
        tables.push(table);
    }

    Ok((tables, unresolved))
}

/// Parses one environmental CSV and tags every row with `school`.
pub fn read_environment_csv(path: &Path, school: &str) -> Result<Vec<EnvironmentRecord>> {
    read_environment_table(path, school).map(|table| table.rows)
}

/// Like [`read_environment_csv`], keeping the CSV header as well.
pub fn read_environment_table(path: &Path, school: &str) -> Result<SchoolTable<EnvironmentRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| StudyError::csv(path, e))?;

    let columns = rdr
        .headers()
        .map_err(|e| StudyError::csv(path, e))?
        .iter()
        .map(nfc)
        .collect();

    let school = nfc(school);
    let mut rows = Vec::new();

    for result in rdr.deserialize() {
        let mut record: EnvironmentRecord = result.map_err(|e| StudyError::csv(path, e))?;
        record.school = school.clone();
        rows.push(record);
    }

    Ok(SchoolTable {
        school,
        columns,
        rows,
    })
}

/// Resolves the growth workbook and reads one table per sheet.
pub fn load_growth(data_dir: &Path, workbook_name: &str) -> Result<Vec<SchoolTable<GrowthRecord>>> {
    let path = resolve(data_dir, workbook_name)?;
    read_growth_workbook(&path)
}

/// Reads every sheet of a growth workbook; the sheet name is the school.
#[tracing::instrument(skip_all, fields(path = %path.display()))]
pub fn read_growth_workbook(path: &Path) -> Result<Vec<SchoolTable<GrowthRecord>>> {
    let mut workbook = open_workbook_auto(path).map_err(|source| StudyError::Workbook {
        path: path.to_path_buf(),
        source,
    })?;

    let mut tables = Vec::new();

    for sheet in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|source| StudyError::Workbook {
                path: path.to_path_buf(),
                source,
            })?;

        let school = nfc(&sheet);
        let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
        let mut rows_iter = range.rows();

        let Some(header) = rows_iter.next() else {
            warn!(sheet = %sheet, "Sheet is empty");
            tables.push(SchoolTable {
                school,
                columns: Vec::new(),
                rows: Vec::new(),
            });
            continue;
        };

        let names = header_names(header);
        let columns = GrowthColumns::locate(&names);
        if columns.is_empty() {
            warn!(sheet = %sheet, "Sheet has none of the growth columns");
        }

        let mut rows = Vec::new();
        for (i, cells) in rows_iter.enumerate() {
            if cells.iter().all(|c| matches!(c, Data::Empty)) {
                continue;
            }

            // 1-based sheet row, header included
            let row = first_row + i + 2;
            let read = |index: Option<usize>, name: &str| -> Result<Option<f64>> {
                let Some(cell) = index.and_then(|i| cells.get(i)) else {
                    return Ok(None);
                };
                numeric_cell(cell).map_err(|message| StudyError::Sheet {
                    sheet: sheet.clone(),
                    row,
                    column: name.to_string(),
                    message,
                })
            };

            let extra: BTreeMap<String, SheetValue> = names
                .iter()
                .enumerate()
                .filter(|(index, _)| !columns.contains(*index))
                .filter_map(|(index, name)| Some((name.clone(), sheet_value(cells.get(index)?)?)))
                .collect();

            rows.push(GrowthRecord {
                fresh_weight: read(columns.fresh_weight, FRESH_WEIGHT)?,
                leaf_count: read(columns.leaf_count, LEAF_COUNT)?,
                shoot_length: read(columns.shoot_length, SHOOT_LENGTH)?,
                school: school.clone(),
                extra,
            });
        }

        debug!(sheet = %sheet, rows = rows.len(), "Growth sheet read");
        tables.push(SchoolTable {
            school,
            columns: names,
            rows,
        });
    }

    Ok(tables)
}

/// Positions of the growth columns within a sheet's header row.
#[derive(Debug, Default)]
struct GrowthColumns {
    fresh_weight: Option<usize>,
    leaf_count: Option<usize>,
    shoot_length: Option<usize>,
}

/// Column names of a header row; blank headers are named by position.
fn header_names(header: &[Data]) -> Vec<String> {
    header
        .iter()
        .enumerate()
        .map(|(index, cell)| match cell {
            Data::String(s) if !s.trim().is_empty() => nfc(s.trim()),
            Data::String(_) | Data::Empty => format!("Unnamed: {index}"),
            other => other.to_string(),
        })
        .collect()
}

impl GrowthColumns {
    fn locate(names: &[String]) -> Self {
        let mut columns = Self::default();
        for (index, name) in names.iter().enumerate() {
            match name.as_str() {
                FRESH_WEIGHT => columns.fresh_weight = Some(index),
                LEAF_COUNT => columns.leaf_count = Some(index),
                SHOOT_LENGTH => columns.shoot_length = Some(index),
                _ => {}
            }
        }
        columns
    }

    fn is_empty(&self) -> bool {
        self.fresh_weight.is_none() && self.leaf_count.is_none() && self.shoot_length.is_none()
    }

    fn contains(&self, index: usize) -> bool {
        [self.fresh_weight, self.leaf_count, self.shoot_length].contains(&Some(index))
    }
}

/// Missing markers, `#N/A` cells and non-finite numbers read as `None`.
fn numeric_cell(cell: &Data) -> std::result::Result<Option<f64>, String> {
    match cell {
        Data::Empty | Data::Error(CellErrorType::NA) => Ok(None),
        Data::Int(i) => Ok(Some(*i as f64)),
        Data::Float(f) => Ok(f.is_finite().then_some(*f)),
        Data::String(s) => parse_measurement(s).map_err(|_| format!("not a number: '{s}'")),
        other => Err(format!("unexpected cell value {other:?}")),
    }
}

fn sheet_value(cell: &Data) -> Option<SheetValue> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::Int(i) => Some(SheetValue::Number(*i as f64)),
        Data::Float(f) => f.is_finite().then_some(SheetValue::Number(*f)),
        Data::Bool(b) => Some(SheetValue::Bool(*b)),
        Data::String(s) if is_missing_marker(s) => None,
        Data::String(s) => Some(SheetValue::Text(s.clone())),
        other => Some(SheetValue::Text(other.to_string())),
    }
}
