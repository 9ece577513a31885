use crate::processing::intervals::Interval;
use std::ops::Range;

/// Index ranges of consecutive `true` samples.
fn boolean_segments(series: impl Iterator<Item = bool>) -> Vec<Range<usize>> {
    let mut segments = Vec::new();
    let mut start = None;
    let mut len = 0;

    for (idx, flag) in series.enumerate() {
        len = idx + 1;
        match (flag, start) {
            (true, None) => start = Some(idx),
            (false, Some(s)) => {
                segments.push(s..idx);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        segments.push(s..len);
    }

    segments
}

fn segment_duration(segment: &Range<usize>, time: &[f64]) -> f64 {
    time[segment.end - 1] - time[segment.start]
}

/// Candidate events from a z-scored trace.
///
/// Runs where the score reaches `zscore_threshold` and last at least
/// `minimum_duration` seconds are kept, then each is widened to the
/// surrounding run where the score stays at or above zero (the mean).
/// Missing scores end a run. Overlapping results are merged.
pub fn threshold_by_zscore(
    zscores: &[f64],
    time: &[f64],
    minimum_duration: f64,
    zscore_threshold: f64,
) -> Vec<Interval> {
    let above_threshold = boolean_segments(zscores.iter().map(|&z| z >= zscore_threshold));
    let above_mean = boolean_segments(zscores.iter().map(|&z| z >= 0.0));

    let extended = above_threshold
        .into_iter()
        .filter(|segment| segment_duration(segment, time) >= minimum_duration)
        .map(|segment| {
            // Widen to the mean-crossing run holding this segment's first sample
            let widened = above_mean
                .iter()
                .find(|mean_run| mean_run.contains(&segment.start))
                .cloned()
                .unwrap_or(segment);
            Interval::new(time[widened.start], time[widened.end - 1])
        })
        .collect();

    merge_overlapping_ranges(extended)
}

/// Sorts intervals by start and merges any that overlap or touch.
pub fn merge_overlapping_ranges(mut intervals: Vec<Interval>) -> Vec<Interval> {
    intervals.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
    for interval in intervals {
        match merged.last_mut() {
            Some(current) if interval.start <= current.end => {
                current.end = current.end.max(interval.end);
            }
            _ => merged.push(interval),
        }
    }
    merged
}

/// Drops candidates where the animal moves faster than `speed_threshold` at
/// the event's start or end.
pub fn exclude_movement(
    candidates: Vec<Interval>,
    speed: &[f64],
    time: &[f64],
    speed_threshold: f64,
) -> Vec<Interval> {
    candidates
        .into_iter()
        .filter(|event| {
            let speed_at = |t: f64| {
                let idx = time.partition_point(|&x| x < t).min(time.len() - 1);
                speed[idx]
            };
            speed_at(event.start) <= speed_threshold && speed_at(event.end) <= speed_threshold
        })
        .collect()
}

/// Coalesces consecutive events separated by less than `close_threshold`
/// seconds into one event spanning both.
pub fn merge_close_events(events: Vec<Interval>, close_threshold: f64) -> Vec<Interval> {
    let mut merged: Vec<Interval> = Vec::with_capacity(events.len());
    for event in events {
        match merged.last_mut() {
            Some(current) if event.start - current.end < close_threshold => {
                current.end = current.end.max(event.end);
            }
            _ => merged.push(event),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn time(n: usize) -> Vec<f64> {
        (0..n).map(|i| i as f64 * 0.01).collect()
    }

    #[test]
    fn short_threshold_crossings_are_discarded() {
        let z = [0.0, 3.0, 0.0, 3.0, 3.0, 3.0, 0.0];
        let events = threshold_by_zscore(&z, &time(7), 0.015, 2.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].start, 0.0);
        assert!((events[0].end - 0.06).abs() < 1e-12);
    }

    #[test]
    fn events_widen_to_mean_crossings() {
        let z = [-1.0, 0.5, 1.0, 2.5, 2.5, 2.5, 1.0, -0.5, -1.0];
        let t = time(9);
        let events = threshold_by_zscore(&z, &t, 0.015, 2.0);
        assert_eq!(events, vec![Interval::new(t[1], t[6])]);
    }

    #[test]
    fn missing_scores_split_runs() {
        let z = [2.5, 2.5, 2.5, f64::NAN, 2.5, 2.5, 2.5];
        let events = threshold_by_zscore(&z, &time(7), 0.015, 2.0);
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn overlapping_ranges_merge() {
        let merged = merge_overlapping_ranges(vec![
            Interval::new(2.0, 3.0),
            Interval::new(0.0, 1.0),
            Interval::new(0.5, 1.5),
        ]);
        assert_eq!(merged, vec![Interval::new(0.0, 1.5), Interval::new(2.0, 3.0)]);
    }

    #[test]
    fn fast_events_are_excluded() {
        let t = time(10);
        let speed = [0.0, 0.0, 10.0, 10.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let kept = exclude_movement(
            vec![Interval::new(0.02, 0.04), Interval::new(0.05, 0.08)],
            &speed,
            &t,
            4.0,
        );
        assert_eq!(kept, vec![Interval::new(0.05, 0.08)]);
    }

    #[test]
    fn close_events_coalesce() {
        let merged = merge_close_events(
            vec![
                Interval::new(1.0, 1.1),
                Interval::new(1.15, 1.2),
                Interval::new(2.0, 2.1),
            ],
            0.1,
        );
        assert_eq!(merged, vec![Interval::new(1.0, 1.2), Interval::new(2.0, 2.1)]);
    }

    #[test]
    fn zero_close_threshold_keeps_separate_events() {
        let events = vec![Interval::new(1.0, 1.1), Interval::new(1.15, 1.2)];
        assert_eq!(merge_close_events(events.clone(), 0.0), events);
    }
}
