use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use std::ops::Range;

/// Gaussian kernels are cut off this many sigmas from the centre.
const GAUSSIAN_TRUNCATE: f64 = 8.0;

/// Instantaneous amplitude of `signal`: the magnitude of its analytic signal.
///
/// The analytic signal is built in the frequency domain over exactly
/// `signal.len()` points, so a signal holding a whole number of cycles has a
/// flat envelope with no edge ringing.
pub fn analytic_envelope(signal: &[f64]) -> Vec<f64> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }

    let mut planner = FftPlanner::<f64>::new();
    let forward = planner.plan_fft_forward(n);
    let inverse = planner.plan_fft_inverse(n);

    let mut spectrum: Vec<Complex<f64>> = signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
    forward.process(&mut spectrum);

    // Double positive frequencies, drop negative ones, keep DC and Nyquist
    let half = n / 2;
    for (k, bin) in spectrum.iter_mut().enumerate() {
        let gain = if k == 0 || (n % 2 == 0 && k == half) {
            1.0
        } else if k < (n + 1) / 2 {
            2.0
        } else {
            0.0
        };
        *bin *= gain;
    }

    inverse.process(&mut spectrum);
    spectrum.iter().map(|bin| bin.norm() / n as f64).collect()
}

/// Normalised Gaussian kernel for `sigma_samples`, truncated at 8 sigma.
pub fn gaussian_kernel(sigma_samples: f64) -> Vec<f64> {
    let radius = (GAUSSIAN_TRUNCATE * sigma_samples + 0.5) as isize;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|k| (-0.5 * (k as f64 / sigma_samples).powi(2)).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Smooths `data` with a Gaussian of `sigma` seconds at `sampling_frequency`.
///
/// Samples beyond either end count as zero, so the output tapers towards the
/// edges instead of borrowing values from outside the run.
pub fn gaussian_smooth(data: &[f64], sigma: f64, sampling_frequency: f64) -> Vec<f64> {
    let sigma_samples = sigma * sampling_frequency;
    if sigma_samples.is_nan() || sigma_samples <= 0.0 || data.is_empty() {
        return data.to_vec();
    }

    let kernel = gaussian_kernel(sigma_samples);
    let radius = (kernel.len() / 2) as isize;
    let n = data.len() as isize;

    (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .filter_map(|(k, w)| {
                    let j = i + k as isize - radius;
                    (0..n).contains(&j).then(|| w * data[j as usize])
                })
                .sum()
        })
        .collect()
}

/// Standard score over the non-missing values (population standard
/// deviation). Missing values stay missing; a constant input has no defined
/// score and comes back all missing.
pub fn zscore(values: &[f64]) -> Vec<f64> {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        return vec![f64::NAN; values.len()];
    }

    let mean = sum / count as f64;
    let variance = values
        .iter()
        .filter(|v| !v.is_nan())
        .map(|v| (v - mean).powi(2))
        .sum::<f64>()
        / count as f64;
    let std_dev = variance.sqrt();

    if std_dev == 0.0 {
        return vec![f64::NAN; values.len()];
    }
    values.iter().map(|v| (v - mean) / std_dev).collect()
}

/// Maximal runs of consecutive `true` rows.
pub fn contiguous_runs(valid: &[bool]) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut start = None;

    for (idx, &is_valid) in valid.iter().enumerate() {
        match (is_valid, start) {
            (true, None) => start = Some(idx),
            (false, Some(s)) => {
                runs.push(s..idx);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push(s..valid.len());
    }

    runs
}

/// Applies `f` to each run of `data` independently. Rows outside every run are
/// missing in the output.
pub fn map_runs<F>(data: &[f64], runs: &[Range<usize>], f: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let mut output = vec![f64::NAN; data.len()];
    for run in runs {
        let mapped = f(&data[run.clone()]);
        output[run.clone()].copy_from_slice(&mapped);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn envelope_of_whole_cycle_sine_is_flat() {
        let fs = 500.0;
        let signal: Vec<f64> = (0..1000)
            .map(|i| 3.0 * (2.0 * PI * 125.0 * i as f64 / fs + 0.3).sin())
            .collect();
        let envelope = analytic_envelope(&signal);
        assert!(envelope.iter().all(|e| (e - 3.0).abs() < 1e-9));
    }

    #[test]
    fn envelope_handles_odd_lengths() {
        let signal: Vec<f64> = (0..7).map(|i| (2.0 * PI * i as f64 / 7.0).cos()).collect();
        let envelope = analytic_envelope(&signal);
        assert!(envelope.iter().all(|e| (e - 1.0).abs() < 1e-9));
    }

    #[test]
    fn kernel_is_normalised_and_truncated() {
        let kernel = gaussian_kernel(2.0);
        assert_eq!(kernel.len(), 33);
        assert!((kernel.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn smoothing_preserves_interior_constant() {
        let data = vec![1.0; 200];
        let smoothed = gaussian_smooth(&data, 0.004, 500.0);
        assert!((smoothed[100] - 1.0).abs() < 1e-12);
        // zero padding pulls the edges down
        assert!(smoothed[0] < 0.7);
    }

    #[test]
    fn zscore_ignores_missing() {
        let scores = zscore(&[1.0, f64::NAN, 3.0]);
        assert_eq!(scores[0], -1.0);
        assert!(scores[1].is_nan());
        assert_eq!(scores[2], 1.0);
    }

    #[test]
    fn runs_split_on_invalid_rows() {
        let runs = contiguous_runs(&[false, true, true, false, true]);
        assert_eq!(runs, vec![1..3, 4..5]);
    }

    #[test]
    fn map_runs_leaves_gaps_missing() {
        let data = [1.0, 2.0, f64::NAN, 4.0];
        let runs = contiguous_runs(&[true, true, false, true]);
        let doubled = map_runs(&data, &runs, |run| run.iter().map(|x| x * 2.0).collect());
        assert_eq!(doubled[..2], [2.0, 4.0]);
        assert!(doubled[2].is_nan());
        assert_eq!(doubled[3], 8.0);
    }
}
