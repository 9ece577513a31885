// src/visualization/mod.rs

pub mod frames;
#[cfg(feature = "visualization")]
pub mod window;

pub use frames::{
    export_frame_summary, multiunit_firing_rate, multiunit_spikes,
    prepare_multi_environment_movie, prepare_single_environment_movie, AxisLimits,
    DecodedPosterior, Environment, Movie, MovieFrame, MultiEnvironmentFrame, PositionTrack,
    SpatialGrid,
};

use crate::error::{Result, RippleError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MovieConfig {
    pub sampling_frequency: f64,
    pub video_slowdown: f64,
    /// Upper end of the posterior colour scale; the lower end is 0.
    pub vmax: f64,
    /// Samples of multiunit rate shown around each frame (odd).
    pub window_size: usize,
    /// Previous MAP positions drawn behind the current one.
    pub trail_length: usize,
    /// Length of the heading segment drawn from the actual position (cm).
    pub heading_length: f64,
    /// Padding added around the position range for the axes (cm).
    pub axis_margin: f64,
    pub firing_rate_sigma: f64, // sec
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for MovieConfig {
    fn default() -> Self {
        Self {
            sampling_frequency: 500.0,
            video_slowdown: 8.0,
            vmax: 0.07,
            window_size: 501,
            trail_length: 5,
            heading_length: 4.0,
            axis_margin: 10.0,
            firing_rate_sigma: 0.015,
            window_width: 1000,
            window_height: 700,
        }
    }
}

impl MovieConfig {
    /// Playback rate: the sampling frequency divided by the slowdown,
    /// rounded down.
    pub fn fps(&self) -> u32 {
        (self.sampling_frequency / self.video_slowdown).floor() as u32
    }

    /// Sample offsets of the rate window, centred on zero.
    pub fn window_offsets(&self) -> Vec<isize> {
        let half = (self.window_size / 2) as isize;
        (0..self.window_size as isize).map(|k| k - half).collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.sampling_frequency.is_nan() || self.sampling_frequency <= 0.0 {
            return Err(RippleError::InvalidParameters(
                "sampling_frequency must be positive".to_string(),
            ));
        }
        if self.video_slowdown.is_nan() || self.video_slowdown <= 0.0 {
            return Err(RippleError::InvalidParameters(
                "video_slowdown must be positive".to_string(),
            ));
        }
        if self.fps() == 0 {
            return Err(RippleError::InvalidParameters(format!(
                "video_slowdown {} leaves no frames per second at {} Hz",
                self.video_slowdown, self.sampling_frequency
            )));
        }
        if self.window_size == 0 {
            return Err(RippleError::InvalidParameters(
                "window_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rate_rounds_down() {
        let config = MovieConfig::default();
        assert_eq!(config.fps(), 62);
        let config = MovieConfig {
            sampling_frequency: 1500.0,
            video_slowdown: 10.0,
            ..Default::default()
        };
        assert_eq!(config.fps(), 150);
    }

    #[test]
    fn window_is_centred() {
        let offsets = MovieConfig::default().window_offsets();
        assert_eq!(offsets.len(), 501);
        assert_eq!(offsets[0], -250);
        assert_eq!(offsets[250], 0);
        assert_eq!(offsets[500], 250);
    }

    #[test]
    fn slowdown_above_sampling_rate_is_rejected() {
        let config = MovieConfig {
            video_slowdown: 1000.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
