// src/visualization/frames.rs
use super::MovieConfig;
use crate::error::{Result, RippleError};
use crate::processing::envelope::gaussian_smooth;
use crate::processing::table::TimeTable;

use serde::Serialize;
use std::fs::File;
use std::ops::Range;
use std::path::Path;

// -----------------------------------------------------------------------------
// INPUTS
// -----------------------------------------------------------------------------

/// Regular 2D grid of place bins. Bin `k` sits at
/// `(x_centers[k / ny], y_centers[k % ny])`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialGrid {
    pub x_centers: Vec<f64>,
    pub y_centers: Vec<f64>,
    pub is_track_interior: Vec<bool>,
}

impl SpatialGrid {
    pub fn new(x_centers: Vec<f64>, y_centers: Vec<f64>, is_track_interior: Vec<bool>) -> Result<Self> {
        if is_track_interior.len() != x_centers.len() * y_centers.len() {
            return Err(RippleError::ShapeMismatch(format!(
                "track mask has {} bins for a {}x{} grid",
                is_track_interior.len(),
                x_centers.len(),
                y_centers.len()
            )));
        }
        Ok(Self {
            x_centers,
            y_centers,
            is_track_interior,
        })
    }

    pub fn n_bins(&self) -> usize {
        self.is_track_interior.len()
    }

    pub fn bin_center(&self, bin: usize) -> [f64; 2] {
        let ny = self.y_centers.len();
        [self.x_centers[bin / ny], self.y_centers[bin % ny]]
    }

    /// Posterior with bins off the track set to missing.
    pub fn restrict_to_track(&self, posterior: &[f64]) -> Vec<f64> {
        posterior
            .iter()
            .zip(self.is_track_interior.iter())
            .map(|(&p, &interior)| if interior { p } else { f64::NAN })
            .collect()
    }

    /// Most probable bin, ignoring missing values.
    pub fn map_bin(&self, posterior: &[f64]) -> Option<usize> {
        posterior
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.is_nan())
            .fold(None, |best: Option<(usize, f64)>, (bin, &p)| match best {
                Some((_, best_p)) if best_p >= p => best,
                _ => Some((bin, p)),
            })
            .map(|(bin, _)| bin)
    }

    /// Bin edges along each axis. The grid is regular, so the outer edges
    /// sit half a bin width beyond the outer centers.
    pub fn edges(&self) -> (Vec<f64>, Vec<f64>) {
        (bin_edges(&self.x_centers), bin_edges(&self.y_centers))
    }

    /// Plot limits: the outer bin edges widened by `margin`.
    pub fn axis_limits(&self, margin: f64) -> AxisLimits {
        let (x_edges, y_edges) = self.edges();
        AxisLimits::around(&x_edges, &y_edges, margin)
    }
}

fn bin_edges(centers: &[f64]) -> Vec<f64> {
    let half_width = match centers {
        [first, second, ..] => (second - first) / 2.0,
        _ => 0.0,
    };
    let mut edges: Vec<f64> = centers.iter().map(|c| c - half_width).collect();
    if let Some(last) = centers.last() {
        edges.push(last + half_width);
    }
    edges
}

/// A named environment the decoder places the animal in.
#[derive(Debug, Clone, PartialEq)]
pub struct Environment {
    pub name: String,
    pub grid: SpatialGrid,
}

/// Decoded posterior `[time][state][bin]`. Bins of a state follow the grid of
/// the environment of the same name, or the shared grid when there is only
/// one environment.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPosterior {
    pub time: Vec<f64>,
    pub states: Vec<String>,
    pub values: Vec<Vec<Vec<f64>>>,
}

impl DecodedPosterior {
    fn check_slice(&self, time_slice: &Range<usize>) -> Result<()> {
        if self.values.len() != self.time.len() {
            return Err(RippleError::ShapeMismatch(format!(
                "posterior has {} time points and {} time stamps",
                self.values.len(),
                self.time.len()
            )));
        }
        if time_slice.is_empty() || time_slice.end > self.time.len() {
            return Err(RippleError::EmptyInput(format!(
                "time slice {:?} selects no posterior frames out of {}",
                time_slice,
                self.time.len()
            )));
        }
        Ok(())
    }

    /// Posterior at `time_ind` summed over states.
    fn summed_over_states(&self, time_ind: usize, n_bins: usize) -> Result<Vec<f64>> {
        let mut total = vec![0.0; n_bins];
        for state in &self.values[time_ind] {
            if state.len() != n_bins {
                return Err(RippleError::ShapeMismatch(format!(
                    "state posterior has {} bins, grid has {}",
                    state.len(),
                    n_bins
                )));
            }
            total.iter_mut().zip(state.iter()).for_each(|(t, p)| *t += p);
        }
        Ok(total)
    }
}

/// Actual position and head direction (radians), one entry per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionTrack {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub direction: Vec<f64>,
}

impl PositionTrack {
    /// Reads the named columns of a position table.
    pub fn from_table(table: &TimeTable, x: &str, y: &str, direction: &str) -> Result<Self> {
        let column = |name: &str| {
            table
                .column(name)
                .map(<[f64]>::to_vec)
                .ok_or_else(|| RippleError::ShapeMismatch(format!("no position column '{}'", name)))
        };
        Ok(Self {
            x: column(x)?,
            y: column(y)?,
            direction: column(direction)?,
        })
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    fn position(&self, ind: usize) -> [f64; 2] {
        [self.x[ind], self.y[ind]]
    }

    /// Segment from the position along the head direction.
    fn heading(&self, ind: usize, length: f64) -> [[f64; 2]; 2] {
        let [x, y] = self.position(ind);
        let direction = self.direction[ind];
        [[x, y], [x + length * direction.cos(), y + length * direction.sin()]]
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct AxisLimits {
    pub x: (f64, f64),
    pub y: (f64, f64),
}

impl AxisLimits {
    fn around(x: &[f64], y: &[f64], margin: f64) -> Self {
        let range = |values: &[f64]| {
            let (lo, hi) = values
                .iter()
                .filter(|v| !v.is_nan())
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            (lo - margin, hi + margin)
        };
        Self {
            x: range(x),
            y: range(y),
        }
    }
}

// -----------------------------------------------------------------------------
// MULTIUNIT RATE
// -----------------------------------------------------------------------------

/// 1.0 where any mark feature is present at a sample, else 0.0.
pub fn multiunit_spikes(marks: &TimeTable) -> Vec<f64> {
    (0..marks.n_rows())
        .map(|row| {
            let any = marks.values().iter().any(|column| !column[row].is_nan());
            if any {
                1.0
            } else {
                0.0
            }
        })
        .collect()
}

/// Population rate in spikes/s: the mean spike indicator across units times
/// the sampling frequency, Gaussian smoothed.
pub fn multiunit_firing_rate(
    units: &[Vec<f64>],
    sampling_frequency: f64,
    sigma: f64,
) -> Result<Vec<f64>> {
    let Some(n_samples) = units.first().map(Vec::len) else {
        return Ok(Vec::new());
    };
    if let Some((ind, unit)) = units.iter().enumerate().find(|(_, u)| u.len() != n_samples) {
        return Err(RippleError::ShapeMismatch(format!(
            "unit {} has {} samples, expected {}",
            ind,
            unit.len(),
            n_samples
        )));
    }
    let mean_rate: Vec<f64> = (0..n_samples)
        .map(|t| {
            units.iter().map(|unit| unit[t]).sum::<f64>() / units.len() as f64 * sampling_frequency
        })
        .collect();
    Ok(gaussian_smooth(&mean_rate, sigma, sampling_frequency))
}

fn rate_window(rate: &[f64], center: usize, offsets: &[isize]) -> Vec<f64> {
    offsets
        .iter()
        .map(|&k| {
            let ind = center as isize + k;
            if ind >= 0 && (ind as usize) < rate.len() {
                rate[ind as usize]
            } else {
                f64::NAN
            }
        })
        .collect()
}

/// Largest rate over the samples any frame's window shows.
fn rate_limit(rate: &[f64], time_slice: &Range<usize>, offsets: &[isize]) -> f64 {
    let lo = (time_slice.start as isize + offsets.first().copied().unwrap_or(0)).max(0) as usize;
    let hi = ((time_slice.end as isize + offsets.last().copied().unwrap_or(0)).max(0) as usize)
        .min(rate.len());
    rate.get(lo..hi)
        .unwrap_or(&[])
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(0.0, f64::max)
}

// -----------------------------------------------------------------------------
// FRAMES
// -----------------------------------------------------------------------------

/// Everything the renderer needs, frame by frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Movie<F> {
    pub fps: u32,
    pub vmax: f64,
    /// Limits per panel: one for a single environment, one per environment
    /// otherwise.
    pub axis_limits: Vec<AxisLimits>,
    pub rate_limit: f64,
    /// Time offsets (s) of the rate window samples.
    pub window_times: Vec<f64>,
    pub frames: Vec<F>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MovieFrame {
    pub time: f64,
    /// Posterior summed over states, missing off the track.
    pub posterior: Vec<f64>,
    pub position: [f64; 2],
    pub heading: [[f64; 2]; 2],
    pub map_position: Option<[f64; 2]>,
    /// MAP positions of up to `trail_length` preceding frames, oldest first.
    pub map_trail: Vec<[f64; 2]>,
    pub rate_window: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnvironmentFrame {
    pub name: String,
    pub posterior: Vec<f64>,
    /// Posterior mass of this environment.
    pub probability: f64,
    /// Set only for the most probable environment.
    pub map_position: Option<[f64; 2]>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MultiEnvironmentFrame {
    pub time: f64,
    pub environments: Vec<EnvironmentFrame>,
    pub most_probable: usize,
    pub position: [f64; 2],
    pub heading: [[f64; 2]; 2],
    pub rate_window: Vec<f64>,
}

fn check_series(time_slice: &Range<usize>, position: &PositionTrack, rate: &[f64]) -> Result<()> {
    if position.y.len() != position.len() || position.direction.len() != position.len() {
        return Err(RippleError::ShapeMismatch(
            "position x, y and direction differ in length".to_string(),
        ));
    }
    if time_slice.end > position.len() || time_slice.end > rate.len() {
        return Err(RippleError::ShapeMismatch(format!(
            "time slice {:?} runs past {} position samples / {} rate samples",
            time_slice,
            position.len(),
            rate.len()
        )));
    }
    Ok(())
}

fn window_times(config: &MovieConfig, offsets: &[isize]) -> Vec<f64> {
    offsets
        .iter()
        .map(|&k| k as f64 / config.sampling_frequency)
        .collect()
}

/// Frames for a single environment over `time_slice` of the full series.
pub fn prepare_single_environment_movie(
    time_slice: Range<usize>,
    posterior: &DecodedPosterior,
    grid: &SpatialGrid,
    position: &PositionTrack,
    firing_rate: &[f64],
    config: &MovieConfig,
) -> Result<Movie<MovieFrame>> {
    config.validate()?;
    posterior.check_slice(&time_slice)?;
    check_series(&time_slice, position, firing_rate)?;

    let offsets = config.window_offsets();

    let posteriors = time_slice
        .clone()
        .map(|t| {
            posterior
                .summed_over_states(t, grid.n_bins())
                .map(|summed| grid.restrict_to_track(&summed))
        })
        .collect::<Result<Vec<_>>>()?;
    let map_positions: Vec<Option<[f64; 2]>> = posteriors
        .iter()
        .map(|p| grid.map_bin(p).map(|bin| grid.bin_center(bin)))
        .collect();

    let frames = time_slice
        .clone()
        .zip(posteriors)
        .enumerate()
        .map(|(frame_ind, (t, frame_posterior))| {
            let trail_start = frame_ind.saturating_sub(config.trail_length);
            MovieFrame {
                time: posterior.time[t],
                posterior: frame_posterior,
                position: position.position(t),
                heading: position.heading(t, config.heading_length),
                map_position: map_positions[frame_ind],
                map_trail: map_positions[trail_start..frame_ind]
                    .iter()
                    .flatten()
                    .copied()
                    .collect(),
                rate_window: rate_window(firing_rate, t, &offsets),
            }
        })
        .collect();

    Ok(Movie {
        fps: config.fps(),
        vmax: config.vmax,
        axis_limits: vec![AxisLimits::around(&position.x, &position.y, config.axis_margin)],
        rate_limit: rate_limit(firing_rate, &time_slice, &offsets),
        window_times: window_times(config, &offsets),
        frames,
    })
}

/// Frames for several environments, one posterior state per environment.
pub fn prepare_multi_environment_movie(
    time_slice: Range<usize>,
    posterior: &DecodedPosterior,
    environments: &[Environment],
    position: &PositionTrack,
    firing_rate: &[f64],
    config: &MovieConfig,
) -> Result<Movie<MultiEnvironmentFrame>> {
    config.validate()?;
    posterior.check_slice(&time_slice)?;
    check_series(&time_slice, position, firing_rate)?;
    if environments.is_empty() {
        return Err(RippleError::EmptyInput("no environments".to_string()));
    }

    // State index of each environment
    let state_of = environments
        .iter()
        .map(|env| {
            posterior
                .states
                .iter()
                .position(|state| state == &env.name)
                .ok_or_else(|| {
                    RippleError::ShapeMismatch(format!("posterior has no state '{}'", env.name))
                })
        })
        .collect::<Result<Vec<usize>>>()?;

    let offsets = config.window_offsets();
    let mut frames = Vec::with_capacity(time_slice.len());
    for t in time_slice.clone() {
        let mut env_frames = Vec::with_capacity(environments.len());
        for (env, &state) in environments.iter().zip(state_of.iter()) {
            let values = posterior.values[t].get(state).ok_or_else(|| {
                RippleError::ShapeMismatch(format!("posterior frame {} misses state {}", t, state))
            })?;
            let n_bins = env.grid.n_bins();
            if values.len() < n_bins {
                return Err(RippleError::ShapeMismatch(format!(
                    "environment '{}' has {} bins, posterior state has {}",
                    env.name,
                    n_bins,
                    values.len()
                )));
            }
            env_frames.push(EnvironmentFrame {
                name: env.name.clone(),
                posterior: env.grid.restrict_to_track(&values[..n_bins]),
                probability: values.iter().filter(|p| !p.is_nan()).sum(),
                map_position: None,
            });
        }

        let most_probable = env_frames
            .iter()
            .enumerate()
            .fold(0, |best, (ind, frame)| {
                if frame.probability > env_frames[best].probability {
                    ind
                } else {
                    best
                }
            });
        let grid = &environments[most_probable].grid;
        env_frames[most_probable].map_position = grid
            .map_bin(&env_frames[most_probable].posterior)
            .map(|bin| grid.bin_center(bin));

        frames.push(MultiEnvironmentFrame {
            time: posterior.time[t],
            environments: env_frames,
            most_probable,
            position: position.position(t),
            heading: position.heading(t, config.heading_length),
            rate_window: rate_window(firing_rate, t, &offsets),
        });
    }

    Ok(Movie {
        fps: config.fps(),
        vmax: config.vmax,
        axis_limits: environments
            .iter()
            .map(|env| env.grid.axis_limits(config.axis_margin))
            .collect(),
        rate_limit: rate_limit(firing_rate, &time_slice, &offsets),
        window_times: window_times(config, &offsets),
        frames,
    })
}

// -----------------------------------------------------------------------------
// EXPORT
// -----------------------------------------------------------------------------

/// One CSV row per frame.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct FrameSummary {
    pub time: f64,
    pub environment: String,
    pub environment_probability: f64,
    pub position_x: f64,
    pub position_y: f64,
    pub map_x: Option<f64>,
    pub map_y: Option<f64>,
    pub max_posterior: f64,
    pub firing_rate: f64,
}

fn max_ignoring_missing(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(f64::NAN, f64::max)
}

fn centre(window: &[f64]) -> f64 {
    window.get(window.len() / 2).copied().unwrap_or(f64::NAN)
}

impl From<&MovieFrame> for FrameSummary {
    fn from(frame: &MovieFrame) -> Self {
        Self {
            time: frame.time,
            environment: String::new(),
            environment_probability: frame.posterior.iter().filter(|p| !p.is_nan()).sum(),
            position_x: frame.position[0],
            position_y: frame.position[1],
            map_x: frame.map_position.map(|p| p[0]),
            map_y: frame.map_position.map(|p| p[1]),
            max_posterior: max_ignoring_missing(&frame.posterior),
            firing_rate: centre(&frame.rate_window),
        }
    }
}

impl From<&MultiEnvironmentFrame> for FrameSummary {
    fn from(frame: &MultiEnvironmentFrame) -> Self {
        let env = &frame.environments[frame.most_probable];
        Self {
            time: frame.time,
            environment: env.name.clone(),
            environment_probability: env.probability,
            position_x: frame.position[0],
            position_y: frame.position[1],
            map_x: env.map_position.map(|p| p[0]),
            map_y: env.map_position.map(|p| p[1]),
            max_posterior: max_ignoring_missing(&env.posterior),
            firing_rate: centre(&frame.rate_window),
        }
    }
}

/// Writes one summary row per frame of `movie`.
pub fn export_frame_summary<F>(path: &Path, movie: &Movie<F>) -> Result<()>
where
    for<'a> FrameSummary: From<&'a F>,
{
    let file = File::create(path).map_err(|e| RippleError::io(path, e))?;
    let mut wtr = csv::Writer::from_writer(file);
    for frame in &movie.frames {
        wtr.serialize(FrameSummary::from(frame))?;
    }
    wtr.flush().map_err(|e| RippleError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn grid() -> SpatialGrid {
        // 3 x 2 bins, the last x column off the track
        SpatialGrid::new(
            vec![0.0, 10.0, 20.0],
            vec![0.0, 5.0],
            vec![true, true, true, true, false, false],
        )
        .unwrap()
    }

    fn posterior(n_time: usize) -> DecodedPosterior {
        // Peak moves one bin per frame, split over two states
        let values = (0..n_time)
            .map(|t| {
                let mut bins = vec![0.0; 6];
                bins[t % 4] = 0.4;
                bins[5] = 0.9; // off-track
                vec![bins.clone(), bins]
            })
            .collect();
        DecodedPosterior {
            time: (0..n_time).map(|t| t as f64 / 500.0).collect(),
            states: vec!["Continuous".to_string(), "Fragmented".to_string()],
            values,
        }
    }

    fn track(n: usize) -> PositionTrack {
        PositionTrack {
            x: (0..n).map(|i| i as f64).collect(),
            y: vec![2.0; n],
            direction: vec![0.0; n],
        }
    }

    #[test]
    fn single_environment_frames() {
        let n = 20;
        let rate: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let movie = prepare_single_environment_movie(
            8..16,
            &posterior(n),
            &grid(),
            &track(n),
            &rate,
            &MovieConfig::default(),
        )
        .unwrap();

        assert_eq!(movie.fps, 62);
        assert_eq!(movie.frames.len(), 8);
        assert_eq!(movie.window_times.len(), 501);
        assert_eq!(movie.rate_limit, 19.0);

        let frame = &movie.frames[0];
        assert_eq!(frame.time, 8.0 / 500.0);
        // off-track bins are masked, so the MAP is the on-track peak
        assert!(frame.posterior[5].is_nan());
        assert_eq!(frame.map_position, Some(grid().bin_center(0)));
        assert_eq!(frame.heading, [[8.0, 2.0], [12.0, 2.0]]);
        assert!(frame.map_trail.is_empty());
        assert_eq!(centre(&frame.rate_window), 8.0);
        assert!(frame.rate_window[0].is_nan());

        assert_eq!(movie.frames[7].map_trail.len(), 5);
        assert_eq!(movie.axis_limits[0].x, (-10.0, 29.0));
    }

    #[test]
    fn multi_environment_marks_most_probable() {
        let n = 4;
        let environments = vec![
            Environment {
                name: "Continuous".to_string(),
                grid: grid(),
            },
            Environment {
                name: "Fragmented".to_string(),
                grid: grid(),
            },
        ];
        let mut decoded = posterior(n);
        for frame in decoded.values.iter_mut() {
            frame[0].iter_mut().for_each(|p| *p *= 0.5);
        }

        let movie = prepare_multi_environment_movie(
            0..n,
            &decoded,
            &environments,
            &track(n),
            &vec![0.0; n],
            &MovieConfig::default(),
        )
        .unwrap();

        let frame = &movie.frames[1];
        assert_eq!(frame.most_probable, 1);
        assert!(frame.environments[0].map_position.is_none());
        assert_eq!(frame.environments[1].map_position, Some(grid().bin_center(1)));
        assert!((frame.environments[1].probability - 1.3).abs() < 1e-12);
        assert_eq!(movie.axis_limits.len(), 2);
        // Grid edges: x in [-5, 25], y in [-2.5, 7.5]
        assert_eq!(movie.axis_limits[0].x, (-15.0, 35.0));
        assert_eq!(movie.axis_limits[0].y, (-12.5, 17.5));
    }

    #[test]
    fn unknown_environment_state_is_rejected() {
        let environments = vec![Environment {
            name: "Linear".to_string(),
            grid: grid(),
        }];
        let result = prepare_multi_environment_movie(
            0..2,
            &posterior(2),
            &environments,
            &track(2),
            &[0.0, 0.0],
            &MovieConfig::default(),
        );
        assert!(matches!(result, Err(RippleError::ShapeMismatch(_))));
    }

    #[test]
    fn multiunit_rate_counts_samples_with_marks() {
        let marks = TimeTable::new(
            vec![0.0, 0.002, 0.004],
            vec!["amp_0".to_string(), "amp_1".to_string()],
            vec![vec![f64::NAN, 1.0, f64::NAN], vec![f64::NAN, f64::NAN, 2.0]],
        )
        .unwrap();
        let spikes = multiunit_spikes(&marks);
        assert_eq!(spikes, vec![0.0, 1.0, 1.0]);

        let unsmoothed = multiunit_firing_rate(&[spikes], 500.0, 0.0).unwrap();
        assert_eq!(unsmoothed, vec![0.0, 500.0, 500.0]);
    }

    #[test]
    fn ragged_units_are_rejected() {
        let units = vec![vec![0.0, 1.0, 0.0], vec![1.0, 0.0]];
        let result = multiunit_firing_rate(&units, 500.0, 0.0);
        assert!(matches!(result, Err(RippleError::ShapeMismatch(_))));
        assert!(multiunit_firing_rate(&[], 500.0, 0.0).unwrap().is_empty());
    }

    #[test]
    fn summary_has_a_row_per_frame() {
        let n = 6;
        let movie = prepare_single_environment_movie(
            0..n,
            &posterior(n),
            &grid(),
            &track(n),
            &vec![1.0; n],
            &MovieConfig::default(),
        )
        .unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("frames.csv");
        export_frame_summary(&path, &movie).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), n + 1);
        assert!(text.starts_with("time,environment,"));
    }
}
