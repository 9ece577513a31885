use super::segments::{exclude_movement, merge_close_events, threshold_by_zscore};
use super::{
    number_events, DetectorInputs, DetectorInstance, EventScores, RippleDetectionParams,
    RippleEvent, KAY_RIPPLE_DETECTOR,
};
use crate::error::Result;
use crate::processing::consensus::combined_envelope;
use crate::processing::envelope::zscore;
use crate::processing::intervals::Interval;

/// Multi-channel consensus detector (Kay et al. 2016).
///
/// Thresholds the z-scored consensus trace: the square root of the smoothed
/// sum of squared channel envelopes.
#[derive(Debug, Clone, PartialEq)]
pub struct KayRippleDetector {
    params: RippleDetectionParams,
}

impl KayRippleDetector {
    pub fn new(params: RippleDetectionParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RippleDetectionParams {
        &self.params
    }
}

impl DetectorInstance for KayRippleDetector {
    fn name(&self) -> &'static str {
        KAY_RIPPLE_DETECTOR
    }

    fn detect(&self, inputs: &DetectorInputs) -> Result<Vec<RippleEvent>> {
        let params = &self.params;
        let valid = inputs.valid_rows();

        // Combined amplitude over the valid rows, z-scored over the same rows
        let combined = combined_envelope(
            inputs.filtered_lfps,
            &valid,
            inputs.sampling_frequency,
            params.smoothing_sigma,
        );
        let zscores = zscore(&combined);

        let candidates = threshold_by_zscore(
            &zscores,
            inputs.time,
            params.minimum_duration,
            params.zscore_threshold,
        );
        let ripple_times = exclude_movement(
            candidates,
            inputs.speed,
            inputs.time,
            params.speed_threshold,
        );
        let ripple_times = merge_close_events(ripple_times, params.close_ripple_threshold);

        let mut events = number_events(&ripple_times);
        for (event, interval) in events.iter_mut().zip(ripple_times.iter()) {
            event.scores = Some(event_scores(interval, inputs.time, &zscores, inputs.speed));
        }

        Ok(events)
    }
}

// EVENT STATISTICS ------------------------------------------------------------

fn event_scores(interval: &Interval, time: &[f64], zscores: &[f64], speed: &[f64]) -> EventScores {
    let first = time.partition_point(|&t| t < interval.start);
    let last = time.partition_point(|&t| t <= interval.end).max(first);

    // Rows of the event that carry a score (a merged event may straddle a gap)
    let rows: Vec<usize> = (first..last).filter(|&row| !zscores[row].is_nan()).collect();
    let event_time: Vec<f64> = rows.iter().map(|&row| time[row]).collect();
    let event_z: Vec<f64> = rows.iter().map(|&row| zscores[row]).collect();
    let event_speed: Vec<f64> = rows.iter().map(|&row| speed[row]).collect();
    let squared: Vec<f64> = event_z.iter().map(|z| z * z).collect();

    EventScores {
        duration: interval.duration(),
        mean_zscore: mean(&event_z),
        median_zscore: median(&event_z),
        max_zscore: event_z.iter().copied().fold(f64::NAN, f64::max),
        min_zscore: event_z.iter().copied().fold(f64::NAN, f64::min),
        area: trapezoid(&event_z, &event_time),
        total_energy: trapezoid(&squared, &event_time),
        speed_at_start: event_speed.first().copied().unwrap_or(f64::NAN),
        speed_at_end: event_speed.last().copied().unwrap_or(f64::NAN),
        max_speed: event_speed.iter().copied().fold(f64::NAN, f64::max),
        min_speed: event_speed.iter().copied().fold(f64::NAN, f64::min),
        median_speed: median(&event_speed),
        mean_speed: mean(&event_speed),
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn trapezoid(values: &[f64], time: &[f64]) -> f64 {
    values
        .windows(2)
        .zip(time.windows(2))
        .map(|(v, t)| 0.5 * (v[0] + v[1]) * (t[1] - t[0]))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::super::test_signals::{burst_amplitude, channel, time, FS};
    use super::*;

    fn detect(
        time: &[f64],
        lfps: &[Vec<f64>],
        speed: &[f64],
        params: RippleDetectionParams,
    ) -> Vec<RippleEvent> {
        let inputs = DetectorInputs {
            time,
            filtered_lfps: lfps,
            speed,
            sampling_frequency: FS,
        };
        KayRippleDetector::new(params).detect(&inputs).unwrap()
    }

    #[test]
    fn single_burst_yields_one_ripple_at_onset() {
        let t = time(10.0);
        let amplitude = |x: f64| burst_amplitude(x, 5.0, 0.15, 5.0);
        let lfps = vec![channel(&t, 0.3, amplitude), channel(&t, 1.1, amplitude)];
        let speed = vec![1.0; t.len()];

        let events = detect(&t, &lfps, &speed, RippleDetectionParams::default());

        assert_eq!(events.len(), 1, "{:?}", events);
        let ripple = &events[0];
        assert_eq!(ripple.ripple_number, 1);
        assert!(
            ripple.start_time >= 4.98 && ripple.start_time < 5.02,
            "start {}",
            ripple.start_time
        );
        assert!(ripple.duration() >= 0.015);

        let scores = ripple.scores.expect("Kay events carry scores");
        assert!(scores.max_zscore >= 2.0);
        assert!(scores.total_energy > 0.0);
        assert!(scores.max_speed <= 4.0);
    }

    #[test]
    fn bursts_while_running_are_excluded() {
        let t = time(10.0);
        let amplitude = |x: f64| burst_amplitude(x, 5.0, 0.15, 5.0);
        let lfps = vec![channel(&t, 0.3, amplitude), channel(&t, 1.1, amplitude)];
        let speed: Vec<f64> = t
            .iter()
            .map(|&x| if (4.5..5.5).contains(&x) { 20.0 } else { 1.0 })
            .collect();

        let events = detect(&t, &lfps, &speed, RippleDetectionParams::default());
        assert!(events.is_empty(), "{:?}", events);
    }

    #[test]
    fn nearby_bursts_merge_under_close_threshold() {
        let t = time(10.0);
        let amplitude = |x: f64| {
            burst_amplitude(x, 4.0, 0.08, 5.0).max(burst_amplitude(x, 4.14, 0.08, 5.0))
        };
        let lfps = vec![channel(&t, 0.3, amplitude), channel(&t, 1.1, amplitude)];
        let speed = vec![1.0; t.len()];

        let apart = detect(&t, &lfps, &speed, RippleDetectionParams::default());
        assert_eq!(apart.len(), 2, "{:?}", apart);

        let params = RippleDetectionParams {
            close_ripple_threshold: 0.1,
            ..Default::default()
        };
        let merged = detect(&t, &lfps, &speed, params);
        assert_eq!(merged.len(), 1, "{:?}", merged);
        assert!(merged[0].start_time <= apart[0].start_time);
        assert!(merged[0].end_time >= apart[1].end_time);
    }

    #[test]
    fn events_are_ordered_and_disjoint() {
        let t = time(10.0);
        let amplitude = |x: f64| {
            burst_amplitude(x, 2.0, 0.1, 6.0)
                .max(burst_amplitude(x, 5.0, 0.1, 6.0))
                .max(burst_amplitude(x, 8.0, 0.1, 6.0))
        };
        let lfps = vec![channel(&t, 0.3, amplitude), channel(&t, 1.1, amplitude)];
        let speed = vec![1.0; t.len()];

        let events = detect(&t, &lfps, &speed, RippleDetectionParams::default());
        assert_eq!(events.len(), 3, "{:?}", events);
        for pair in events.windows(2) {
            assert!(pair[0].end_time < pair[1].start_time);
        }
        for event in &events {
            assert!(event.duration() >= 0.015);
        }
    }

    #[test]
    fn trapezoid_integrates_linear_ramp() {
        assert!((trapezoid(&[0.0, 1.0, 2.0], &[0.0, 1.0, 2.0]) - 2.0).abs() < 1e-12);
        assert_eq!(median(&[3.0, 1.0, 2.0, 4.0]), 2.5);
    }
}
