use serde::{Deserialize, Serialize};

/// A valid-time interval in seconds, both ends inclusive.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Interval {
    pub start: f64,
    pub end: f64,
}

impl Interval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Overlap of two intervals, if any.
    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start <= end {
            Some(Interval { start, end })
        } else {
            None
        }
    }
}

impl From<[f64; 2]> for Interval {
    fn from(bounds: [f64; 2]) -> Self {
        Interval::new(bounds[0], bounds[1])
    }
}

/// Restricts every interval of `intervals` to `bounds`, dropping intervals
/// that do not overlap it. Order is preserved.
pub fn interval_list_intersect(intervals: &[Interval], bounds: &Interval) -> Vec<Interval> {
    intervals
        .iter()
        .filter_map(|interval| interval.intersect(bounds))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_bounds_clip_valid_times() {
        let valid = vec![
            Interval::new(0.0, 10.0),
            Interval::new(20.0, 30.0),
            Interval::new(40.0, 50.0),
        ];
        let clipped = interval_list_intersect(&valid, &Interval::new(5.0, 45.0));
        assert_eq!(
            clipped,
            vec![
                Interval::new(5.0, 10.0),
                Interval::new(20.0, 30.0),
                Interval::new(40.0, 45.0)
            ]
        );
    }

    #[test]
    fn disjoint_bounds_leave_nothing() {
        let valid = vec![Interval::new(0.0, 10.0)];
        assert!(interval_list_intersect(&valid, &Interval::new(11.0, 12.0)).is_empty());
    }
}
