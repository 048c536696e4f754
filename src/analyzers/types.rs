//! Data types used by the aggregation pipeline.

use std::collections::BTreeMap;
use std::num::ParseFloatError;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, de};

pub const TEMPERATURE: &str = "temperature";
pub const HUMIDITY: &str = "humidity";
pub const PH: &str = "ph";
pub const EC: &str = "ec";

pub const FRESH_WEIGHT: &str = "생중량(g)";
pub const LEAF_COUNT: &str = "잎 수(장)";
pub const SHOOT_LENGTH: &str = "지상부 길이(mm)";

/// Cell texts read as "no measurement", compared case-insensitively.
const MISSING_MARKERS: &[&str] = &[
    "", "na", "n/a", "nan", "-nan", "null", "none", "<na>", "#na", "#n/a", "#n/a n/a", "1.#ind",
    "-1.#ind", "1.#qnan", "-1.#qnan",
];

pub fn is_missing_marker(text: &str) -> bool {
    let text = text.trim();
    MISSING_MARKERS
        .iter()
        .any(|marker| text.eq_ignore_ascii_case(marker))
}

/// Parses a measurement cell.
///
/// Missing-value markers and non-finite numbers are `None`, so they are
/// skipped when averaging instead of turning the mean into NaN.
pub fn parse_measurement(text: &str) -> Result<Option<f64>, ParseFloatError> {
    if is_missing_marker(text) {
        return Ok(None);
    }
    let value: f64 = text.trim().parse()?;
    Ok(value.is_finite().then_some(value))
}

fn measurement<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(text) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    parse_measurement(&text).map_err(|_| de::Error::custom(format!("not a number: '{text}'")))
}

/// A row that belongs to exactly one school and exposes named numeric columns.
pub trait Observation {
    /// Numeric columns this row type understands.
    const COLUMNS: &'static [&'static str];

    fn school(&self) -> &str;

    /// Value of `column`, `None` when the cell was blank or the column is
    /// not one of [`Observation::COLUMNS`].
    fn value(&self, column: &str) -> Option<f64>;
}

/// A single row of a school's environmental CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentRecord {
    pub time: String,
    #[serde(default, deserialize_with = "measurement")]
    pub temperature: Option<f64>,
    #[serde(default, deserialize_with = "measurement")]
    pub humidity: Option<f64>,
    #[serde(default, deserialize_with = "measurement")]
    pub ph: Option<f64>,
    #[serde(default, deserialize_with = "measurement")]
    pub ec: Option<f64>,
    /// Assigned from the source file, never read from the CSV.
    #[serde(default)]
    pub school: String,
}

impl Observation for EnvironmentRecord {
    const COLUMNS: &'static [&'static str] = &[TEMPERATURE, HUMIDITY, PH, EC];

    fn school(&self) -> &str {
        &self.school
    }

    fn value(&self, column: &str) -> Option<f64> {
        match column {
            TEMPERATURE => self.temperature,
            HUMIDITY => self.humidity,
            PH => self.ph,
            EC => self.ec,
            _ => None,
        }
    }
}

/// A non-blank spreadsheet cell outside the measured columns.
#[derive(Debug, Clone, PartialEq)]
pub enum SheetValue {
    Number(f64),
    Text(String),
    Bool(bool),
}

/// A single harvested plant from one sheet of the growth workbook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthRecord {
    #[serde(rename = "생중량(g)")]
    pub fresh_weight: Option<f64>,
    #[serde(rename = "잎 수(장)")]
    pub leaf_count: Option<f64>,
    #[serde(rename = "지상부 길이(mm)")]
    pub shoot_length: Option<f64>,
    pub school: String,
    /// Every other column of the sheet (e.g. `개체번호`), keyed by header.
    #[serde(skip)]
    pub extra: BTreeMap<String, SheetValue>,
}

impl Observation for GrowthRecord {
    const COLUMNS: &'static [&'static str] = &[FRESH_WEIGHT, LEAF_COUNT, SHOOT_LENGTH];

    fn school(&self) -> &str {
        &self.school
    }

    fn value(&self, column: &str) -> Option<f64> {
        match column {
            FRESH_WEIGHT => self.fresh_weight,
            LEAF_COUNT => self.leaf_count,
            SHOOT_LENGTH => self.shoot_length,
            _ => None,
        }
    }
}

/// Per-school environmental means with the school's target EC.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnvironmentSummary {
    pub school: String,
    pub target_concentration: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub ph: f64,
    pub ec: f64,
}

/// Per-school growth means with the school's target EC.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthSummary {
    pub school: String,
    pub target_concentration: f64,
    pub fresh_weight: f64,
    pub leaf_count: f64,
    pub shoot_length: f64,
    pub sample_count: usize,
}

/// Environmental and growth means for one school, joined on the school key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    pub school: String,
    pub target_concentration: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub ph: f64,
    pub ec: f64,
    pub fresh_weight: f64,
    pub leaf_count: f64,
    pub shoot_length: f64,
    pub sample_count: usize,
}

pub type SummaryTable = Vec<SummaryRow>;

/// Columns of a [`SummaryRow`] that [`best_by`](crate::analyzers::best::best_by)
/// can rank on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SummaryColumn {
    TargetConcentration,
    Temperature,
    Humidity,
    Ph,
    Ec,
    FreshWeight,
    LeafCount,
    ShootLength,
    SampleCount,
}

impl SummaryColumn {
    pub fn name(self) -> &'static str {
        match self {
            SummaryColumn::TargetConcentration => "target_concentration",
            SummaryColumn::Temperature => "temperature",
            SummaryColumn::Humidity => "humidity",
            SummaryColumn::Ph => "ph",
            SummaryColumn::Ec => "ec",
            SummaryColumn::FreshWeight => "fresh_weight",
            SummaryColumn::LeafCount => "leaf_count",
            SummaryColumn::ShootLength => "shoot_length",
            SummaryColumn::SampleCount => "sample_count",
        }
    }
}

impl SummaryRow {
    pub fn get(&self, column: SummaryColumn) -> f64 {
        match column {
            SummaryColumn::TargetConcentration => self.target_concentration,
            SummaryColumn::Temperature => self.temperature,
            SummaryColumn::Humidity => self.humidity,
            SummaryColumn::Ph => self.ph,
            SummaryColumn::Ec => self.ec,
            SummaryColumn::FreshWeight => self.fresh_weight,
            SummaryColumn::LeafCount => self.leaf_count,
            SummaryColumn::ShootLength => self.shoot_length,
            SummaryColumn::SampleCount => self.sample_count as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Direction {
    #[default]
    Max,
    Min,
}

/// One row of the experiment overview table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverviewRow {
    pub school: String,
    /// Absent when the school has no configured target.
    pub target_concentration: Option<f64>,
    pub sample_count: usize,
}

/// Headline numbers for the whole experiment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Overview {
    pub schools: Vec<OverviewRow>,
    pub total_samples: usize,
    pub mean_temperature: Option<f64>,
    pub mean_humidity: Option<f64>,
}

/// Five-number summary of a school's fresh weights.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Distribution {
    pub school: String,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Pearson correlations of the growth measurements against fresh weight.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Correlations {
    pub leaf_count_vs_fresh_weight: Option<f64>,
    pub shoot_length_vs_fresh_weight: Option<f64>,
}

/// Everything the study reports, serialized as one JSON document.
#[derive(Debug, Clone, Serialize)]
pub struct StudyReport {
    pub schema_version: u8,
    pub generated_at: DateTime<Utc>,
    pub overview: Overview,
    pub environment: Vec<EnvironmentSummary>,
    pub growth: Vec<GrowthSummary>,
    pub summary: SummaryTable,
    pub optimal: SummaryRow,
    pub fresh_weight_distribution: Vec<Distribution>,
    pub correlations: Correlations,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_measurement_missing_markers() {
        for text in ["", " ", "NA", "N/A", "NaN", "nan", "null", "None", "#N/A", " na "] {
            assert_eq!(parse_measurement(text), Ok(None), "{text:?}");
        }
        assert_eq!(parse_measurement("inf"), Ok(None));
        assert_eq!(parse_measurement(" 6.5 "), Ok(Some(6.5)));
        assert!(parse_measurement("warm").is_err());
    }

    #[test]
    fn test_environment_record_reads_markers_as_blank() {
        let data = "time,temperature,humidity,ph,ec\nt0,NaN,NA,#N/A,1.5\n";
        let mut rdr = csv::Reader::from_reader(data.as_bytes());
        let record: EnvironmentRecord = rdr.deserialize().next().unwrap().unwrap();

        assert_eq!(record.temperature, None);
        assert_eq!(record.humidity, None);
        assert_eq!(record.ph, None);
        assert_eq!(record.ec, Some(1.5));
    }
}
