pub mod karlsson;
pub mod kay;
pub mod segments;

use crate::error::{Result, RippleError};
use crate::processing::intervals::Interval;
use serde::{Deserialize, Serialize};

pub use karlsson::KarlssonRippleDetector;
pub use kay::KayRippleDetector;

pub const KAY_RIPPLE_DETECTOR: &str = "Kay_ripple_detector";
pub const KARLSSON_RIPPLE_DETECTOR: &str = "Karlsson_ripple_detector";

// DETECTOR COMPONENT ----------------------------------------------------------

/// One detection algorithm over aligned multi-channel ripple-band LFP.
pub trait DetectorInstance {
    fn name(&self) -> &'static str;
    fn detect(&self, inputs: &DetectorInputs) -> Result<Vec<RippleEvent>>;
}

/// Shared numeric parameters of both detectors.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields, default)]
pub struct RippleDetectionParams {
    pub speed_threshold: f64,        // cm/s
    pub minimum_duration: f64,       // sec
    pub zscore_threshold: f64,       // std
    pub smoothing_sigma: f64,        // sec
    pub close_ripple_threshold: f64, // sec
}

impl Default for RippleDetectionParams {
    fn default() -> Self {
        Self {
            speed_threshold: 4.0,
            minimum_duration: 0.015,
            zscore_threshold: 2.0,
            smoothing_sigma: 0.004,
            close_ripple_threshold: 0.0,
        }
    }
}

impl RippleDetectionParams {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("speed_threshold", self.speed_threshold),
            ("minimum_duration", self.minimum_duration),
            ("zscore_threshold", self.zscore_threshold),
            ("smoothing_sigma", self.smoothing_sigma),
            ("close_ripple_threshold", self.close_ripple_threshold),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(RippleError::InvalidParameters(format!(
                    "{} must be finite, got {}",
                    name, value
                )));
            }
        }
        if self.minimum_duration < 0.0 || self.smoothing_sigma < 0.0 {
            return Err(RippleError::InvalidParameters(
                "minimum_duration and smoothing_sigma must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// The closed set of detection algorithms, each carrying its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum RippleDetectionAlgorithm {
    Kay(KayRippleDetector),
    Karlsson(KarlssonRippleDetector),
}

impl RippleDetectionAlgorithm {
    /// Resolves an algorithm by its registered name.
    pub fn from_name(name: &str, params: RippleDetectionParams) -> Result<Self> {
        params.validate()?;
        match name {
            KAY_RIPPLE_DETECTOR => Ok(Self::Kay(KayRippleDetector::new(params))),
            KARLSSON_RIPPLE_DETECTOR => Ok(Self::Karlsson(KarlssonRippleDetector::new(params))),
            other => Err(RippleError::UnknownAlgorithm(other.to_string())),
        }
    }
}

impl DetectorInstance for RippleDetectionAlgorithm {
    fn name(&self) -> &'static str {
        match self {
            Self::Kay(detector) => detector.name(),
            Self::Karlsson(detector) => detector.name(),
        }
    }

    fn detect(&self, inputs: &DetectorInputs) -> Result<Vec<RippleEvent>> {
        inputs.validate()?;
        match self {
            Self::Kay(detector) => detector.detect(inputs),
            Self::Karlsson(detector) => detector.detect(inputs),
        }
    }
}

// INPUTS ----------------------------------------------------------------------

/// Time vector, filtered LFP channels, speed and sampling rate of one run.
pub struct DetectorInputs<'a> {
    pub time: &'a [f64],
    pub filtered_lfps: &'a [Vec<f64>],
    pub speed: &'a [f64],
    pub sampling_frequency: f64,
}

impl DetectorInputs<'_> {
    pub fn validate(&self) -> Result<()> {
        let n = self.time.len();
        if self.speed.len() != n {
            return Err(RippleError::ShapeMismatch(format!(
                "speed has {} samples, time has {}",
                self.speed.len(),
                n
            )));
        }
        if let Some(channel) = self.filtered_lfps.iter().find(|channel| channel.len() != n) {
            return Err(RippleError::ShapeMismatch(format!(
                "LFP channel has {} samples, time has {}",
                channel.len(),
                n
            )));
        }
        if self.filtered_lfps.is_empty() {
            return Err(RippleError::EmptyInput("no LFP channels".to_string()));
        }
        if self.sampling_frequency.is_nan() || self.sampling_frequency <= 0.0 {
            return Err(RippleError::InvalidParameters(format!(
                "sampling frequency must be positive, got {}",
                self.sampling_frequency
            )));
        }
        Ok(())
    }

    /// Rows where every channel and the speed hold a value.
    pub fn valid_rows(&self) -> Vec<bool> {
        (0..self.time.len())
            .map(|row| {
                !self.speed[row].is_nan()
                    && self.filtered_lfps.iter().all(|channel| !channel[row].is_nan())
            })
            .collect()
    }
}

// OUTPUT ----------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RippleEvent {
    pub ripple_number: usize,
    pub start_time: f64,
    pub end_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<EventScores>,
}

impl RippleEvent {
    pub fn new(ripple_number: usize, start_time: f64, end_time: f64) -> Self {
        Self {
            ripple_number,
            start_time,
            end_time,
            scores: None,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Per-event statistics reported by the Kay detector.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct EventScores {
    pub duration: f64,
    pub mean_zscore: f64,
    pub median_zscore: f64,
    pub max_zscore: f64,
    pub min_zscore: f64,
    pub area: f64,
    pub total_energy: f64,
    pub speed_at_start: f64,
    pub speed_at_end: f64,
    pub max_speed: f64,
    pub min_speed: f64,
    pub median_speed: f64,
    pub mean_speed: f64,
}

impl EventScores {
    pub const COLUMNS: [&'static str; 13] = [
        "duration",
        "mean_zscore",
        "median_zscore",
        "max_zscore",
        "min_zscore",
        "area",
        "total_energy",
        "speed_at_start",
        "speed_at_end",
        "max_speed",
        "min_speed",
        "median_speed",
        "mean_speed",
    ];

    pub fn to_row(&self) -> [f64; 13] {
        [
            self.duration,
            self.mean_zscore,
            self.median_zscore,
            self.max_zscore,
            self.min_zscore,
            self.area,
            self.total_energy,
            self.speed_at_start,
            self.speed_at_end,
            self.max_speed,
            self.min_speed,
            self.median_speed,
            self.mean_speed,
        ]
    }

    pub fn from_row(row: &[f64]) -> Option<Self> {
        match row {
            [duration, mean_zscore, median_zscore, max_zscore, min_zscore, area, total_energy, speed_at_start, speed_at_end, max_speed, min_speed, median_speed, mean_speed] => {
                Some(Self {
                    duration: *duration,
                    mean_zscore: *mean_zscore,
                    median_zscore: *median_zscore,
                    max_zscore: *max_zscore,
                    min_zscore: *min_zscore,
                    area: *area,
                    total_energy: *total_energy,
                    speed_at_start: *speed_at_start,
                    speed_at_end: *speed_at_end,
                    max_speed: *max_speed,
                    min_speed: *min_speed,
                    median_speed: *median_speed,
                    mean_speed: *mean_speed,
                })
            }
            _ => None,
        }
    }
}

/// Score columns of `events`, one `(name, values)` pair per score in
/// `EventScores::COLUMNS` order. Empty when no event carries scores; an
/// event without scores contributes NaN.
pub fn score_columns(events: &[RippleEvent]) -> Vec<(&'static str, Vec<f64>)> {
    if events.iter().all(|event| event.scores.is_none()) {
        return Vec::new();
    }
    let rows: Vec<[f64; 13]> = events
        .iter()
        .map(|event| event.scores.as_ref().map_or([f64::NAN; 13], EventScores::to_row))
        .collect();
    EventScores::COLUMNS
        .iter()
        .enumerate()
        .map(|(col, &name)| (name, rows.iter().map(|row| row[col]).collect()))
        .collect()
}

/// Numbers final intervals from 1 in time order.
pub(crate) fn number_events(intervals: &[Interval]) -> Vec<RippleEvent> {
    intervals
        .iter()
        .enumerate()
        .map(|(idx, interval)| RippleEvent::new(idx + 1, interval.start, interval.end))
        .collect()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_columns_follow_the_score_order() {
        let mut scored = RippleEvent::new(1, 1.0, 1.05);
        scored.scores = EventScores::from_row(&[
            0.05, 3.0, 2.5, 6.0, 2.0, 0.1, 0.2, 1.0, 1.5, 2.0, 0.5, 1.2, 1.1,
        ]);
        let unscored = RippleEvent::new(2, 2.0, 2.03);

        let columns = score_columns(&[scored, unscored.clone()]);
        let names: Vec<&str> = columns.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, EventScores::COLUMNS);
        assert_eq!(columns[0].1[0], 0.05);
        assert_eq!(columns[6].1[0], 0.2);
        assert!(columns[12].1[1].is_nan());

        assert!(score_columns(&[unscored]).is_empty());
    }

    #[test]
    fn unknown_algorithm_is_a_configuration_error() {
        let result =
            RippleDetectionAlgorithm::from_name("Skaggs_ripple_detector", Default::default());
        assert!(matches!(result, Err(RippleError::UnknownAlgorithm(name)) if name == "Skaggs_ripple_detector"));
    }

    #[test]
    fn registry_resolves_both_algorithms() {
        let kay = RippleDetectionAlgorithm::from_name(KAY_RIPPLE_DETECTOR, Default::default())
            .unwrap();
        let karlsson =
            RippleDetectionAlgorithm::from_name(KARLSSON_RIPPLE_DETECTOR, Default::default())
                .unwrap();
        assert_eq!(kay.name(), KAY_RIPPLE_DETECTOR);
        assert_eq!(karlsson.name(), KARLSSON_RIPPLE_DETECTOR);
    }

    #[test]
    fn unknown_parameter_keys_are_rejected() {
        let yaml = "speed_threshold: 4.0\nwindow: 3\n";
        assert!(serde_yaml::from_str::<RippleDetectionParams>(yaml).is_err());
    }

    #[test]
    fn missing_parameter_keys_take_defaults() {
        let params: RippleDetectionParams = serde_yaml::from_str("zscore_threshold: 3.0\n").unwrap();
        assert_eq!(params.zscore_threshold, 3.0);
        assert_eq!(params.speed_threshold, 4.0);
    }

    #[test]
    fn mismatched_inputs_are_rejected() {
        let time = [0.0, 0.002];
        let lfps = vec![vec![0.0]];
        let speed = [0.0, 0.0];
        let inputs = DetectorInputs {
            time: &time,
            filtered_lfps: &lfps,
            speed: &speed,
            sampling_frequency: 500.0,
        };
        let detector =
            RippleDetectionAlgorithm::from_name(KAY_RIPPLE_DETECTOR, Default::default()).unwrap();
        assert!(matches!(
            detector.detect(&inputs),
            Err(RippleError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn negative_duration_is_invalid() {
        let params = RippleDetectionParams {
            minimum_duration: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            RippleDetectionAlgorithm::from_name(KAY_RIPPLE_DETECTOR, params),
            Err(RippleError::InvalidParameters(_))
        ));
    }
}
