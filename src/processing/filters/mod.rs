pub mod bandpass;

pub use bandpass::{BandPassFilter, BandPassFilterConfig};

use crate::processing::envelope::contiguous_runs;

/// Causal sample-by-sample filter.
pub trait FilterInstance: Send {
    fn id(&self) -> &str;
    fn process_sample(&mut self, sample: f64) -> f64;
    fn reset(&mut self);
}

/// Runs `filter` forward and then backward over `signal` so the result has no
/// phase shift. Each pass starts from rest on an odd extension of the signal
/// to keep the edges from ringing.
pub fn filtfilt<F: FilterInstance + ?Sized>(filter: &mut F, signal: &[f64]) -> Vec<f64> {
    let n = signal.len();
    if n < 2 {
        return signal.to_vec();
    }
    let pad = PAD_SAMPLES.min(n - 1);

    // Odd extension: 2*x[0] - x[pad..1] ++ x ++ 2*x[n-1] - x[n-2..n-1-pad]
    let mut extended = Vec::with_capacity(n + 2 * pad);
    extended.extend((1..=pad).rev().map(|i| 2.0 * signal[0] - signal[i]));
    extended.extend_from_slice(signal);
    extended.extend((1..=pad).map(|i| 2.0 * signal[n - 1] - signal[n - 1 - i]));

    let forward = run_pass(filter, extended.iter().copied());
    let mut backward = run_pass(filter, forward.iter().rev().copied());
    backward.reverse();

    backward[pad..pad + n].to_vec()
}

/// Zero-phase filtering applied separately to every run of non-missing
/// samples. Missing samples stay missing.
pub fn filtfilt_runs<F: FilterInstance + ?Sized>(filter: &mut F, signal: &[f64]) -> Vec<f64> {
    let valid: Vec<bool> = signal.iter().map(|v| !v.is_nan()).collect();
    let mut output = vec![f64::NAN; signal.len()];
    for run in contiguous_runs(&valid) {
        output[run.clone()].copy_from_slice(&filtfilt(filter, &signal[run.clone()]));
    }
    output
}

const PAD_SAMPLES: usize = 30;

fn run_pass<F: FilterInstance + ?Sized>(
    filter: &mut F,
    samples: impl Iterator<Item = f64>,
) -> Vec<f64> {
    filter.reset();
    samples.map(|sample| filter.process_sample(sample)).collect()
}
