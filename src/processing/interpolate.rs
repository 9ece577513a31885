use super::table::TimeTable;
use crate::error::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationMethod {
    #[default]
    Linear,
    Nearest,
    /// Zero-order hold: the last source value at or before the target time.
    Previous,
}

/// What happens to target points outside the source's valid time range.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// No extrapolation; the value is missing.
    #[default]
    Missing,
    /// Hold the first/last valid source value.
    Clamp,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterpolationConfig {
    #[serde(default)]
    pub method: InterpolationMethod,
    #[serde(default)]
    pub boundary: BoundaryPolicy,
}

/// Resamples every column of `table` onto `new_time`.
///
/// The result's index is exactly `new_time` and its columns keep their names
/// and order. Each column is interpolated on its own non-missing samples, so a
/// gap in one column does not leak into the others. Target points that hit a
/// source time exactly take the source value unchanged, which makes aligning a
/// table onto its own index a no-op.
pub fn interpolate_to_new_time(
    table: &TimeTable,
    new_time: &[f64],
    config: InterpolationConfig,
) -> Result<TimeTable> {
    let values = table
        .values()
        .iter()
        .map(|column| interpolate_column(table.index(), column, new_time, config))
        .collect();

    TimeTable::new(new_time.to_vec(), table.columns().to_vec(), values)
}

fn interpolate_column(
    old_time: &[f64],
    column: &[f64],
    new_time: &[f64],
    config: InterpolationConfig,
) -> Vec<f64> {
    // Only interpolate between samples that hold a value
    let (times, values): (Vec<f64>, Vec<f64>) = old_time
        .iter()
        .zip(column.iter())
        .filter(|(_, value)| !value.is_nan())
        .map(|(&t, &v)| (t, v))
        .unzip();

    if times.is_empty() {
        return vec![f64::NAN; new_time.len()];
    }

    new_time
        .iter()
        .map(|&t| sample_at(&times, &values, t, config))
        .collect()
}

fn sample_at(times: &[f64], values: &[f64], t: f64, config: InterpolationConfig) -> f64 {
    let first = times[0];
    let last = times[times.len() - 1];

    if t.is_nan() {
        return f64::NAN;
    }
    if t < first || t > last {
        return match config.boundary {
            BoundaryPolicy::Missing => f64::NAN,
            BoundaryPolicy::Clamp if t < first => values[0],
            BoundaryPolicy::Clamp => values[values.len() - 1],
        };
    }

    // First source sample at or after t
    let upper = times.partition_point(|&x| x < t);
    if times[upper] == t {
        return values[upper];
    }
    let lower = upper - 1;

    match config.method {
        InterpolationMethod::Linear => {
            let span = times[upper] - times[lower];
            let weight = (t - times[lower]) / span;
            values[lower] + weight * (values[upper] - values[lower])
        }
        InterpolationMethod::Nearest => {
            if t - times[lower] <= times[upper] - t {
                values[lower]
            } else {
                values[upper]
            }
        }
        InterpolationMethod::Previous => values[lower],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position() -> TimeTable {
        TimeTable::new(
            vec![0.0, 1.0, 2.0, 4.0],
            vec!["head_speed".to_string(), "head_position_x".to_string()],
            vec![vec![0.0, 2.0, 4.0, 8.0], vec![1.0, f64::NAN, 3.0, 5.0]],
        )
        .unwrap()
    }

    #[test]
    fn linear_interpolation_uses_time_values() {
        let aligned =
            interpolate_to_new_time(&position(), &[0.5, 3.0], InterpolationConfig::default())
                .unwrap();
        assert_eq!(aligned.index(), &[0.5, 3.0]);
        assert!((aligned.column("head_speed").unwrap()[0] - 1.0).abs() < 1e-12);
        assert!((aligned.column("head_speed").unwrap()[1] - 6.0).abs() < 1e-12);
    }

    #[test]
    fn interpolates_across_missing_source_values() {
        let aligned =
            interpolate_to_new_time(&position(), &[1.0], InterpolationConfig::default()).unwrap();
        assert!((aligned.column("head_position_x").unwrap()[0] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn points_outside_source_range_are_missing_by_default() {
        let aligned =
            interpolate_to_new_time(&position(), &[-1.0, 5.0], InterpolationConfig::default())
                .unwrap();
        assert!(aligned.column("head_speed").unwrap().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn clamp_boundary_holds_edge_values() {
        let config = InterpolationConfig {
            boundary: BoundaryPolicy::Clamp,
            ..Default::default()
        };
        let aligned = interpolate_to_new_time(&position(), &[-1.0, 5.0], config).unwrap();
        assert_eq!(aligned.column("head_speed").unwrap(), &[0.0, 8.0]);
    }

    #[test]
    fn aligning_to_own_index_is_identity() {
        let table = TimeTable::new(
            vec![0.0, 0.002, 0.004, 0.006],
            vec!["head_speed".to_string()],
            vec![vec![1.5, 2.5, 0.25, 3.0]],
        )
        .unwrap();
        let aligned = interpolate_to_new_time(&table, table.index(), InterpolationConfig::default())
            .unwrap();
        assert_eq!(aligned, table);
    }

    #[test]
    fn column_order_is_preserved() {
        let aligned =
            interpolate_to_new_time(&position(), &[1.5], InterpolationConfig::default()).unwrap();
        assert_eq!(aligned.columns(), position().columns());
    }

    #[test]
    fn previous_and_nearest_methods() {
        let previous = InterpolationConfig {
            method: InterpolationMethod::Previous,
            ..Default::default()
        };
        let nearest = InterpolationConfig {
            method: InterpolationMethod::Nearest,
            ..Default::default()
        };
        let table = position();
        let held = interpolate_to_new_time(&table, &[3.9], previous).unwrap();
        let near = interpolate_to_new_time(&table, &[3.9], nearest).unwrap();
        assert_eq!(held.column("head_speed").unwrap(), &[4.0]);
        assert_eq!(near.column("head_speed").unwrap(), &[8.0]);
    }
}
