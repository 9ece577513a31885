use super::envelope::{analytic_envelope, contiguous_runs, gaussian_smooth, map_runs};
use super::table::TimeTable;
use crate::error::Result;
use crate::processing::detectors::RippleEvent;
use rayon::prelude::*;

pub const DEFAULT_SMOOTHING_SIGMA: f64 = 0.004; // seconds

/// Name of the single column produced by [`ripple_consensus_trace`].
pub const CONSENSUS_COLUMN: &str = "consensus";

// -----------------------------------------------------------------------------
// CONSENSUS TRACE
// -----------------------------------------------------------------------------

/// Combined ripple amplitude across channels.
///
/// For every run of rows where all channels hold a value: take each channel's
/// envelope, sum the squared envelopes across channels, smooth the sum with a
/// Gaussian of `smoothing_sigma` seconds and take the square root. Rows with a
/// missing channel stay missing and are never backfilled. The output index is
/// the input index.
pub fn ripple_consensus_trace(
    lfps: &TimeTable,
    sampling_frequency: f64,
    smoothing_sigma: f64,
) -> Result<TimeTable> {
    let valid = lfps.valid_rows();
    let trace = combined_envelope(lfps.values(), &valid, sampling_frequency, smoothing_sigma);

    TimeTable::new(
        lfps.index().to_vec(),
        vec![CONSENSUS_COLUMN.to_string()],
        vec![trace],
    )
}

/// Consensus amplitude over `channels` restricted to the rows flagged in
/// `valid`. Envelopes and smoothing are computed per contiguous valid run so
/// that nothing leaks across a gap.
pub fn combined_envelope(
    channels: &[Vec<f64>],
    valid: &[bool],
    sampling_frequency: f64,
    smoothing_sigma: f64,
) -> Vec<f64> {
    let runs = contiguous_runs(valid);

    let envelopes: Vec<Vec<f64>> = channels
        .par_iter()
        .map(|channel| map_runs(channel, &runs, analytic_envelope))
        .collect();

    // Sum of squared envelopes, missing outside the valid runs
    let mut power = vec![f64::NAN; valid.len()];
    for run in &runs {
        for row in run.clone() {
            power[row] = envelopes.iter().map(|env| env[row].powi(2)).sum();
        }
    }

    map_runs(&power, &runs, |run| {
        gaussian_smooth(run, smoothing_sigma, sampling_frequency)
            .into_iter()
            .map(|p| p.max(0.0).sqrt())
            .collect()
    })
}

// -----------------------------------------------------------------------------
// RIPPLE WINDOWS
// -----------------------------------------------------------------------------

/// Rows of `table` from `offset` seconds before the ripple start to `offset`
/// seconds after its end. With `relative`, times are shifted so the ripple
/// starts at zero.
pub fn ripple_window(
    table: &TimeTable,
    event: &RippleEvent,
    offset: f64,
    relative: bool,
) -> Result<TimeTable> {
    let window = table.slice_time(event.start_time - offset, event.end_time + offset);
    if !relative {
        return Ok(window);
    }

    let index = window.index().iter().map(|t| t - event.start_time).collect();
    TimeTable::new(index, window.columns().to_vec(), window.values().to_vec())
}

/// Ripple window with each channel scaled to `(x - mean) / (max - min)` and
/// offset by its channel position, for stacked multi-channel views.
pub fn stacked_lfp_window(
    lfps: &TimeTable,
    event: &RippleEvent,
    offset: f64,
    relative: bool,
) -> Result<TimeTable> {
    let window = ripple_window(lfps, event, offset, relative)?;

    let stacked = window
        .values()
        .iter()
        .enumerate()
        .map(|(channel_idx, column)| {
            let present: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
            if present.is_empty() {
                return column.clone();
            }
            let mean = present.iter().sum::<f64>() / present.len() as f64;
            let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let min = present.iter().copied().fold(f64::INFINITY, f64::min);
            let range = if max > min { max - min } else { 1.0 };
            column
                .iter()
                .map(|v| channel_idx as f64 + (v - mean) / range)
                .collect()
        })
        .collect();

    TimeTable::new(window.index().to_vec(), window.columns().to_vec(), stacked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn lfps_with_gap() -> TimeTable {
        let fs = 500.0;
        let n = 400;
        let index: Vec<f64> = (0..n).map(|i| i as f64 / fs).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let mut a: Vec<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let b: Vec<f64> = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        for row in 150..160 {
            a[row] = f64::NAN;
        }
        TimeTable::new(index, vec!["3".to_string(), "7".to_string()], vec![a, b]).unwrap()
    }

    #[test]
    fn output_index_matches_input() {
        let lfps = lfps_with_gap();
        let trace = ripple_consensus_trace(&lfps, 500.0, DEFAULT_SMOOTHING_SIGMA).unwrap();
        assert_eq!(trace.index(), lfps.index());
        assert_eq!(trace.columns(), &[CONSENSUS_COLUMN.to_string()]);
    }

    #[test]
    fn missing_rows_stay_missing_and_valid_rows_are_finite() {
        let lfps = lfps_with_gap();
        let trace = ripple_consensus_trace(&lfps, 500.0, DEFAULT_SMOOTHING_SIGMA).unwrap();
        let values = trace.column(CONSENSUS_COLUMN).unwrap();
        for (row, is_valid) in lfps.valid_rows().into_iter().enumerate() {
            if is_valid {
                assert!(values[row].is_finite() && values[row] >= 0.0, "row {}", row);
            } else {
                assert!(values[row].is_nan(), "row {}", row);
            }
        }
    }

    #[test]
    fn constant_amplitude_channels_combine_in_quadrature() {
        let fs = 500.0;
        let n = 1000;
        let index: Vec<f64> = (0..n).map(|i| i as f64 / fs).collect();
        let sine = |amp: f64| -> Vec<f64> {
            (0..n)
                .map(|i| amp * (2.0 * std::f64::consts::PI * 125.0 * i as f64 / fs + 0.3).sin())
                .collect()
        };
        let lfps = TimeTable::new(
            index,
            vec!["1".to_string(), "2".to_string()],
            vec![sine(3.0), sine(4.0)],
        )
        .unwrap();
        let trace = ripple_consensus_trace(&lfps, fs, DEFAULT_SMOOTHING_SIGMA).unwrap();
        let value = trace.column(CONSENSUS_COLUMN).unwrap()[500];
        assert!((value - 5.0).abs() < 1e-6);
    }

    #[test]
    fn window_is_relative_to_ripple_start() {
        let lfps = lfps_with_gap();
        let event = RippleEvent::new(1, 0.2, 0.3);
        let window = ripple_window(&lfps, &event, 0.1, true).unwrap();
        let first = window.index()[0];
        let last = window.index()[window.n_rows() - 1];
        // within one sample of the requested bounds
        assert!((first + 0.1).abs() < 0.0025);
        assert!((last - 0.2).abs() < 0.0025);
    }

    #[test]
    fn stacked_channels_sit_on_their_index() {
        let lfps = lfps_with_gap();
        let event = RippleEvent::new(1, 0.5, 0.6);
        let stacked = stacked_lfp_window(&lfps, &event, 0.05, false).unwrap();
        for (channel_idx, column) in stacked.values().iter().enumerate() {
            assert!(column
                .iter()
                .all(|v| (v - channel_idx as f64).abs() <= 1.0 + 1e-12));
        }
    }
}
