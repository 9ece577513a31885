use super::segments::{
    exclude_movement, merge_close_events, merge_overlapping_ranges, threshold_by_zscore,
};
use super::{
    number_events, DetectorInputs, DetectorInstance, RippleDetectionParams, RippleEvent,
    KARLSSON_RIPPLE_DETECTOR,
};
use crate::error::Result;
use crate::processing::envelope::{
    analytic_envelope, contiguous_runs, gaussian_smooth, map_runs, zscore,
};
use crate::processing::intervals::Interval;
use rayon::prelude::*;
use std::ops::Range;

/// Per-channel detector (Karlsson & Frank 2009).
///
/// Each channel is thresholded on its own smoothed, z-scored envelope and the
/// union of the channel candidates is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct KarlssonRippleDetector {
    params: RippleDetectionParams,
}

impl KarlssonRippleDetector {
    pub fn new(params: RippleDetectionParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &RippleDetectionParams {
        &self.params
    }

    fn channel_candidates(
        &self,
        channel: &[f64],
        runs: &[Range<usize>],
        inputs: &DetectorInputs,
    ) -> Vec<Interval> {
        let params = &self.params;
        let smoothed = map_runs(channel, runs, |run| {
            gaussian_smooth(
                &analytic_envelope(run),
                params.smoothing_sigma,
                inputs.sampling_frequency,
            )
        });
        threshold_by_zscore(
            &zscore(&smoothed),
            inputs.time,
            params.minimum_duration,
            params.zscore_threshold,
        )
    }
}

impl DetectorInstance for KarlssonRippleDetector {
    fn name(&self) -> &'static str {
        KARLSSON_RIPPLE_DETECTOR
    }

    fn detect(&self, inputs: &DetectorInputs) -> Result<Vec<RippleEvent>> {
        let runs = contiguous_runs(&inputs.valid_rows());

        let candidates: Vec<Interval> = inputs
            .filtered_lfps
            .par_iter()
            .flat_map_iter(|channel| self.channel_candidates(channel, &runs, inputs))
            .collect();

        let ripple_times = exclude_movement(
            merge_overlapping_ranges(candidates),
            inputs.speed,
            inputs.time,
            self.params.speed_threshold,
        );
        let ripple_times = merge_close_events(ripple_times, self.params.close_ripple_threshold);

        Ok(number_events(&ripple_times))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_signals::{burst_amplitude, channel, time, FS};
    use super::*;

    fn detect(time: &[f64], lfps: &[Vec<f64>], speed: &[f64]) -> Vec<RippleEvent> {
        let inputs = DetectorInputs {
            time,
            filtered_lfps: lfps,
            speed,
            sampling_frequency: FS,
        };
        KarlssonRippleDetector::new(RippleDetectionParams::default())
            .detect(&inputs)
            .unwrap()
    }

    #[test]
    fn burst_on_one_channel_is_enough() {
        let t = time(10.0);
        let lfps = vec![
            channel(&t, 0.3, |x| burst_amplitude(x, 3.0, 0.1, 6.0)),
            channel(&t, 1.1, |_| 1.0),
        ];
        let speed = vec![0.5; t.len()];

        let events = detect(&t, &lfps, &speed);
        assert_eq!(events.len(), 1, "{:?}", events);
        assert!(events[0].start_time >= 2.98 && events[0].start_time < 3.02);
        assert!(events[0].scores.is_none());
    }

    #[test]
    fn overlapping_channel_events_are_unioned() {
        let t = time(10.0);
        let lfps = vec![
            channel(&t, 0.3, |x| burst_amplitude(x, 6.0, 0.1, 6.0)),
            channel(&t, 1.1, |x| burst_amplitude(x, 6.05, 0.1, 6.0)),
        ];
        let speed = vec![0.5; t.len()];

        let events = detect(&t, &lfps, &speed);
        assert_eq!(events.len(), 1, "{:?}", events);
        assert!(events[0].end_time >= 6.13);
    }

    #[test]
    fn missing_rows_split_the_signal() {
        let t = time(10.0);
        let mut lfps = vec![
            channel(&t, 0.3, |x| burst_amplitude(x, 2.0, 0.1, 6.0)),
            channel(&t, 1.1, |x| burst_amplitude(x, 7.0, 0.1, 6.0)),
        ];
        let gap = (4.0 * FS) as usize..(4.5 * FS) as usize;
        for row in gap.clone() {
            lfps[0][row] = f64::NAN;
        }
        let speed = vec![0.5; t.len()];

        let events = detect(&t, &lfps, &speed);
        assert_eq!(events.len(), 2, "{:?}", events);
        for event in &events {
            assert!(event.end_time < t[gap.start] || event.start_time > t[gap.end - 1]);
        }
    }
}
