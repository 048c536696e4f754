use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Result, StudyError};
use crate::resolve::nfc;

/// Maps each school to its target nutrient-solution EC.
///
/// Stored as a plain JSON object:
/// ```json
/// { "송도고": 1.0, "하늘고": 2.0 }
/// ```
/// Keys are held in NFC so lookups agree with loaded school keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConcentrationMap {
    entries: BTreeMap<String, f64>,
}

impl ConcentrationMap {
    /// Builds a map from `(school, target)` pairs, rejecting targets that are
    /// not finite and positive.
    pub fn new<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut entries = BTreeMap::new();
        for (school, value) in pairs {
            let school = nfc(school.as_ref());
            if !(value.is_finite() && value > 0.0) {
                return Err(StudyError::InvalidConcentration { school, value });
            }
            entries.insert(school, value);
        }
        Ok(Self { entries })
    }

    /// Returns the target for `school`, if one is configured.
    pub fn lookup(&self, school: &str) -> Option<f64> {
        self.entries.get(&nfc(school)).copied()
    }

    /// Returns the target for `school` or [`StudyError::MissingMapping`].
    pub fn get(&self, school: &str) -> Result<f64> {
        self.lookup(school)
            .ok_or_else(|| StudyError::MissingMapping {
                school: school.to_string(),
            })
    }

    /// Iterates over all `(school, target)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One environmental CSV and the school it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSource {
    pub school: String,
    pub file: String,
}

impl EnvironmentSource {
    /// Derives the school from the part of the file name before the first
    /// `_`, e.g. `송도고_환경데이터.csv` → `송도고`.
    pub fn from_file_name(file: &str) -> Self {
        let file = nfc(file);
        let school = file.split('_').next().unwrap_or(&file).to_string();
        Self { school, file }
    }
}

/// File names and targets for one run of the study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyConfig {
    /// Environmental CSV logical names; the school is the prefix before `_`.
    pub environment_files: Vec<String>,
    pub growth_workbook: String,
    pub concentrations: ConcentrationMap,
}

impl StudyConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| StudyError::io(path, e))?;
        let raw: StudyConfig = serde_json::from_str(&content).map_err(|source| {
            StudyError::Config {
                path: path.to_path_buf(),
                source,
            }
        })?;

        // Re-validate targets, deserialization bypasses `ConcentrationMap::new`.
        let concentrations = ConcentrationMap::new(raw.concentrations.iter())?;
        Ok(Self {
            concentrations,
            ..raw
        })
    }

    /// Environmental sources in configured order.
    pub fn environment_sources(&self) -> Vec<EnvironmentSource> {
        self.environment_files
            .iter()
            .map(|f| EnvironmentSource::from_file_name(f))
            .collect()
    }
}

impl Default for StudyConfig {
    fn default() -> Self {
        let concentrations = [
            ("송도고", 1.0),
            ("하늘고", 2.0),
            ("아라고", 4.0),
            ("동산고", 8.0),
        ];

        Self {
            environment_files: concentrations
                .iter()
                .map(|(school, _)| format!("{school}_환경데이터.csv"))
                .collect(),
            growth_workbook: "4개교_생육결과데이터.xlsx".to_string(),
            concentrations: ConcentrationMap {
                entries: concentrations
                    .iter()
                    .map(|(school, ec)| (school.to_string(), *ec))
                    .collect(),
            },
        }
    }
}
