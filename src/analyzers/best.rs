use crate::analyzers::types::{Direction, SummaryColumn, SummaryRow};
use crate::error::{Result, StudyError};

/// Selects the row with the largest (or smallest) value of `column`.
///
/// Ties go to the earliest row in table order. Tables from
/// [`merge_on_school`](crate::analyzers::aggregate::merge_on_school) are in
/// ascending target concentration, so a tie there resolves to the lower EC,
/// whatever the order of the workbook sheets. NaN values are never chosen.
///
/// # Errors
///
/// [`StudyError::EmptyDataset`] for an empty table,
/// [`StudyError::UndefinedColumn`] when every value of `column` is NaN.
pub fn best_by(
    table: &[SummaryRow],
    column: SummaryColumn,
    direction: Direction,
) -> Result<&SummaryRow> {
    if table.is_empty() {
        return Err(StudyError::EmptyDataset {
            what: "summary rows",
        });
    }

    let mut best: Option<&SummaryRow> = None;
    for row in table {
        let value = row.get(column);
        if value.is_nan() {
            continue;
        }
        let better = match best {
            None => true,
            Some(current) => match direction {
                Direction::Max => value > current.get(column),
                Direction::Min => value < current.get(column),
            },
        };
        if better {
            best = Some(row);
        }
    }

    best.ok_or_else(|| StudyError::UndefinedColumn {
        column: column.name().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(school: &str, target: f64, weight: f64) -> SummaryRow {
        SummaryRow {
            school: school.to_string(),
            target_concentration: target,
            temperature: 15.0,
            humidity: 60.0,
            ph: 6.0,
            ec: target,
            fresh_weight: weight,
            leaf_count: 8.0,
            shoot_length: 100.0,
            sample_count: 10,
        }
    }

    fn scenario() -> Vec<SummaryRow> {
        vec![
            row("A", 1.0, 10.0),
            row("B", 2.0, 25.0),
            row("C", 4.0, 15.0),
            row("D", 8.0, 5.0),
        ]
    }

    #[test]
    fn test_best_weight_is_school_b() {
        let table = scenario();
        let best = best_by(&table, SummaryColumn::FreshWeight, Direction::Max).unwrap();
        assert_eq!(best.school, "B");
        assert_eq!(best.fresh_weight, 25.0);
        assert_eq!(best.target_concentration, 2.0);
    }

    #[test]
    fn test_min_direction() {
        let table = scenario();
        let best = best_by(&table, SummaryColumn::FreshWeight, Direction::Min).unwrap();
        assert_eq!(best.school, "D");
    }

    #[test]
    fn test_best_is_extremal() {
        let table = scenario();
        for direction in [Direction::Max, Direction::Min] {
            let best = best_by(&table, SummaryColumn::FreshWeight, direction).unwrap();
            for other in &table {
                match direction {
                    Direction::Max => assert!(best.fresh_weight >= other.fresh_weight),
                    Direction::Min => assert!(best.fresh_weight <= other.fresh_weight),
                }
            }
        }
    }

    #[test]
    fn test_ties_resolve_to_first_row() {
        let table = vec![row("A", 1.0, 20.0), row("B", 2.0, 20.0), row("C", 4.0, 3.0)];
        let best = best_by(&table, SummaryColumn::FreshWeight, Direction::Max).unwrap();
        assert_eq!(best.school, "A");
    }

    #[test]
    fn test_nan_is_never_selected() {
        let table = vec![row("A", 1.0, f64::NAN), row("B", 2.0, 1.0)];
        let best = best_by(&table, SummaryColumn::FreshWeight, Direction::Max).unwrap();
        assert_eq!(best.school, "B");
    }

    #[test]
    fn test_all_nan_is_undefined() {
        let table = vec![row("A", 1.0, f64::NAN)];
        assert!(matches!(
            best_by(&table, SummaryColumn::FreshWeight, Direction::Max),
            Err(StudyError::UndefinedColumn { .. })
        ));
    }

    #[test]
    fn test_empty_table() {
        assert!(matches!(
            best_by(&[], SummaryColumn::FreshWeight, Direction::Max),
            Err(StudyError::EmptyDataset { .. })
        ));
    }
}
