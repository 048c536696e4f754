use crate::analyzers::aggregate::{
    environment_means, environment_summaries, growth_means, growth_summaries, merge_on_school,
};
use crate::analyzers::best::best_by;
use crate::analyzers::types::{
    Correlations, Direction, Distribution, GrowthRecord, Overview, OverviewRow, StudyReport,
    SummaryColumn,
};
use crate::analyzers::utility::{mean, pearson, quantile};
use crate::config::ConcentrationMap;
use crate::error::Result;
use crate::loader::Dataset;
use chrono::Utc;
use tracing::info;

const SCHEMA_VERSION: u8 = 1;

/// Builds the full study report from a loaded dataset.
///
/// The optimal row is the merged-summary row with the highest mean fresh
/// weight.
pub fn build_report(dataset: &Dataset, concentrations: &ConcentrationMap) -> Result<StudyReport> {
    let env = environment_means(dataset.environment_rows())?;
    let growth = growth_means(dataset.growth_rows())?;

    let summary = merge_on_school(&env, &growth, concentrations)?;
    let optimal = best_by(&summary, SummaryColumn::FreshWeight, Direction::Max)?.clone();

    info!(
        school = %optimal.school,
        target_concentration = optimal.target_concentration,
        fresh_weight = optimal.fresh_weight,
        "Optimal concentration"
    );

    Ok(StudyReport {
        schema_version: SCHEMA_VERSION,
        generated_at: Utc::now(),
        overview: overview(dataset, concentrations),
        environment: environment_summaries(&env, concentrations)?,
        growth: growth_summaries(&growth, concentrations)?,
        summary,
        optimal,
        fresh_weight_distribution: fresh_weight_distribution(dataset),
        correlations: correlations(dataset.growth_rows()),
    })
}

/// Per-sheet sample counts and pooled environmental means.
pub fn overview(dataset: &Dataset, concentrations: &ConcentrationMap) -> Overview {
    let schools: Vec<OverviewRow> = dataset
        .growth_tables()
        .iter()
        .map(|t| OverviewRow {
            school: t.school.clone(),
            target_concentration: concentrations.lookup(&t.school),
            sample_count: t.rows.len(),
        })
        .collect();

    let total_samples = schools.iter().map(|r| r.sample_count).sum();

    let temperatures: Vec<f64> = dataset.environment_rows().filter_map(|r| r.temperature).collect();
    let humidities: Vec<f64> = dataset.environment_rows().filter_map(|r| r.humidity).collect();

    Overview {
        schools,
        total_samples,
        mean_temperature: mean(&temperatures),
        mean_humidity: mean(&humidities),
    }
}

/// Five-number summary of fresh weight for each sheet with any weights.
pub fn fresh_weight_distribution(dataset: &Dataset) -> Vec<Distribution> {
    dataset
        .growth_tables()
        .iter()
        .filter_map(|t| {
            let mut weights: Vec<f64> = t.rows.iter().filter_map(|r| r.fresh_weight).collect();
            weights.sort_by(f64::total_cmp);
            Some(Distribution {
                school: t.school.clone(),
                min: *weights.first()?,
                q1: quantile(&weights, 0.25)?,
                median: quantile(&weights, 0.5)?,
                q3: quantile(&weights, 0.75)?,
                max: *weights.last()?,
            })
        })
        .collect()
}

/// Pearson r of leaf count and shoot length against fresh weight, over rows
/// where both values are present.
pub fn correlations<'a>(rows: impl Iterator<Item = &'a GrowthRecord> + Clone) -> Correlations {
    let pairs = |x: fn(&GrowthRecord) -> Option<f64>| -> Vec<(f64, f64)> {
        rows.clone()
            .filter_map(|r| Some((x(r)?, r.fresh_weight?)))
            .collect()
    };

    Correlations {
        leaf_count_vs_fresh_weight: pearson(&pairs(|r| r.leaf_count)),
        shoot_length_vs_fresh_weight: pearson(&pairs(|r| r.shoot_length)),
    }
}
