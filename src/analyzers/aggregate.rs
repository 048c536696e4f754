use crate::analyzers::types::{
    EC, EnvironmentRecord, EnvironmentSummary, FRESH_WEIGHT, GrowthRecord, GrowthSummary, HUMIDITY,
    LEAF_COUNT, Observation, PH, SHOOT_LENGTH, SummaryRow, SummaryTable, TEMPERATURE,
};
use crate::analyzers::utility::mean;
use crate::config::ConcentrationMap;
use crate::error::{Result, StudyError};
use std::collections::{BTreeMap, BTreeSet};

/// Row count and per-column means for one group.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupStats {
    pub count: usize,
    pub means: BTreeMap<String, f64>,
}

/// Result of [`group_means`]: group key → column → mean.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupMeans {
    groups: BTreeMap<String, GroupStats>,
}

impl GroupMeans {
    /// Mean of `column` within `group`. NaN when the group had no values for
    /// the column, `None` when the group or column was never computed.
    pub fn get(&self, group: &str, column: &str) -> Option<f64> {
        self.groups.get(group)?.means.get(column).copied()
    }

    pub fn stats(&self, group: &str) -> Option<&GroupStats> {
        self.groups.get(group)
    }

    /// Groups in ascending key order.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &GroupStats)> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    fn mean_or_nan(&self, group: &str, column: &str) -> f64 {
        self.get(group, column).unwrap_or(f64::NAN)
    }
}

/// Groups `rows` by `key` and averages each of `columns` within every group.
///
/// Rows where a column is blank are skipped for that column only. Values are
/// summed in sorted order so the result does not depend on row order.
///
/// # Errors
///
/// [`StudyError::UnknownColumn`] if a column is not one of `R::COLUMNS`.
pub fn group_means<'a, R, I, F>(rows: I, key: F, columns: &[&str]) -> Result<GroupMeans>
where
    R: Observation + 'a,
    I: IntoIterator<Item = &'a R>,
    F: Fn(&'a R) -> &'a str,
{
    if let Some(unknown) = columns
        .iter()
        .find(|c| !R::COLUMNS.iter().any(|known| known == *c))
    {
        return Err(StudyError::UnknownColumn {
            column: unknown.to_string(),
        });
    }

    let mut series: BTreeMap<&str, (usize, Vec<Vec<f64>>)> = BTreeMap::new();

    for row in rows {
        let (count, values) = series
            .entry(key(row))
            .or_insert_with(|| (0, vec![Vec::new(); columns.len()]));
        *count += 1;

        for (i, column) in columns.iter().enumerate() {
            if let Some(v) = row.value(column) {
                values[i].push(v);
            }
        }
    }

    let groups = series
        .into_iter()
        .map(|(group, (count, mut values))| {
            let means = columns
                .iter()
                .zip(values.iter_mut())
                .map(|(column, v)| {
                    v.sort_by(f64::total_cmp);
                    (column.to_string(), mean(v.as_slice()).unwrap_or(f64::NAN))
                })
                .collect();
            (group.to_string(), GroupStats { count, means })
        })
        .collect();

    Ok(GroupMeans { groups })
}

/// Per-school means of every environmental column.
pub fn environment_means<'a>(
    rows: impl IntoIterator<Item = &'a EnvironmentRecord>,
) -> Result<GroupMeans> {
    group_means(rows, EnvironmentRecord::school, EnvironmentRecord::COLUMNS)
}

/// Per-school means of every growth column, with sample counts.
pub fn growth_means<'a>(rows: impl IntoIterator<Item = &'a GrowthRecord>) -> Result<GroupMeans> {
    group_means(rows, GrowthRecord::school, GrowthRecord::COLUMNS)
}

fn check_mappings<'a>(
    schools: impl Iterator<Item = &'a str>,
    concentrations: &ConcentrationMap,
) -> Result<()> {
    for school in schools {
        concentrations.get(school)?;
    }
    Ok(())
}

/// Inner-joins environmental and growth means on the school key and attaches
/// each school's target concentration.
///
/// Schools present on only one side are dropped. Rows are ordered by target
/// concentration, then school, independent of input order; this is the
/// order [`best_by`](crate::analyzers::best::best_by) breaks ties in.
///
/// # Errors
///
/// [`StudyError::MissingMapping`] if any school on either side has no target.
pub fn merge_on_school(
    env: &GroupMeans,
    growth: &GroupMeans,
    concentrations: &ConcentrationMap,
) -> Result<SummaryTable> {
    let schools: BTreeSet<&str> = env.groups().chain(growth.groups()).map(|(s, _)| s).collect();
    check_mappings(schools.into_iter(), concentrations)?;

    let mut table: SummaryTable = env
        .groups()
        .filter_map(|(school, _)| {
            let g = growth.stats(school)?;
            Some(SummaryRow {
                school: school.to_string(),
                target_concentration: concentrations.lookup(school)?,
                temperature: env.mean_or_nan(school, TEMPERATURE),
                humidity: env.mean_or_nan(school, HUMIDITY),
                ph: env.mean_or_nan(school, PH),
                ec: env.mean_or_nan(school, EC),
                fresh_weight: growth.mean_or_nan(school, FRESH_WEIGHT),
                leaf_count: growth.mean_or_nan(school, LEAF_COUNT),
                shoot_length: growth.mean_or_nan(school, SHOOT_LENGTH),
                sample_count: g.count,
            })
        })
        .collect();

    table.sort_by(|a, b| {
        a.target_concentration
            .total_cmp(&b.target_concentration)
            .then_with(|| a.school.cmp(&b.school))
    });
    Ok(table)
}

/// Environmental means per school with target concentrations attached.
pub fn environment_summaries(
    env: &GroupMeans,
    concentrations: &ConcentrationMap,
) -> Result<Vec<EnvironmentSummary>> {
    let mut rows = env
        .groups()
        .map(|(school, _)| {
            Ok(EnvironmentSummary {
                school: school.to_string(),
                target_concentration: concentrations.get(school)?,
                temperature: env.mean_or_nan(school, TEMPERATURE),
                humidity: env.mean_or_nan(school, HUMIDITY),
                ph: env.mean_or_nan(school, PH),
                ec: env.mean_or_nan(school, EC),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    rows.sort_by(|a, b| {
        a.target_concentration
            .total_cmp(&b.target_concentration)
            .then_with(|| a.school.cmp(&b.school))
    });
    Ok(rows)
}

/// Growth means and sample counts per school with target concentrations attached.
pub fn growth_summaries(
    growth: &GroupMeans,
    concentrations: &ConcentrationMap,
) -> Result<Vec<GrowthSummary>> {
    let mut rows = growth
        .groups()
        .map(|(school, stats)| {
            Ok(GrowthSummary {
                school: school.to_string(),
                target_concentration: concentrations.get(school)?,
                fresh_weight: growth.mean_or_nan(school, FRESH_WEIGHT),
                leaf_count: growth.mean_or_nan(school, LEAF_COUNT),
                shoot_length: growth.mean_or_nan(school, SHOOT_LENGTH),
                sample_count: stats.count,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    rows.sort_by(|a, b| {
        a.target_concentration
            .total_cmp(&b.target_concentration)
            .then_with(|| a.school.cmp(&b.school))
    });
    Ok(rows)
}
