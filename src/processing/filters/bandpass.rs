use super::FilterInstance;
use crate::error::{Result, RippleError};

use serde::{Deserialize, Serialize};

/// Ripple band used when no band is configured.
pub const RIPPLE_BAND_HZ: (f64, f64) = (150.0, 250.0);

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BandPassFilterConfig {
    pub id: String,
    pub f_low: f64,
    pub f_high: f64,
    /// Number of high-pass and low-pass biquads in the cascade.
    #[serde(default = "default_sections")]
    pub sections: usize,
}

fn default_sections() -> usize {
    2
}

impl BandPassFilterConfig {
    /// Ripple band config named after its band, e.g. "Ripple 150-250 Hz".
    pub fn ripple() -> Self {
        let (f_low, f_high) = RIPPLE_BAND_HZ;
        Self {
            id: format!("Ripple {}-{} Hz", f_low, f_high),
            f_low,
            f_high,
            sections: default_sections(),
        }
    }
}

/// Butterworth band-pass built from cascaded high-pass and low-pass biquads.
pub struct BandPassFilter {
    config: BandPassFilterConfig,
    high_pass: Vec<SecondOrderFilter>,
    low_pass: Vec<SecondOrderFilter>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FilterKind {
    HighPass,
    LowPass,
}

#[derive(Debug, Clone)]
struct SecondOrderFilter {
    a: [f64; 3],
    b: [f64; 3],
    x: [f64; 2],
    y: [f64; 2],
}

impl SecondOrderFilter {
    fn new(f0: f64, fs: f64, kind: FilterKind) -> Self {
        let q = (2.0f64).sqrt() / 2.0; // Butterworth, maximally flat
        let omega = 2.0 * std::f64::consts::PI * f0 / fs;
        let alpha = f64::sin(omega) / (2.0 * q);
        let cos_omega = f64::cos(omega);

        let (b0, b1, b2) = match kind {
            FilterKind::HighPass => (
                (1.0 + cos_omega) / 2.0,
                -(1.0 + cos_omega),
                (1.0 + cos_omega) / 2.0,
            ),
            FilterKind::LowPass => (
                (1.0 - cos_omega) / 2.0,
                1.0 - cos_omega,
                (1.0 - cos_omega) / 2.0,
            ),
        };
        let (a0, a1, a2) = (1.0 + alpha, -2.0 * cos_omega, 1.0 - alpha);

        SecondOrderFilter {
            a: [1.0, a1 / a0, a2 / a0],
            b: [b0 / a0, b1 / a0, b2 / a0],
            x: [0.0, 0.0],
            y: [0.0, 0.0],
        }
    }

    fn calculate_output(&mut self, input: f64) -> f64 {
        let output = self.b[0] * input + self.b[1] * self.x[0] + self.b[2] * self.x[1]
            - self.a[1] * self.y[0]
            - self.a[2] * self.y[1];

        // Update internal sample history
        self.x[1] = self.x[0];
        self.x[0] = input;
        self.y[1] = self.y[0];
        self.y[0] = output;

        output
    }

    fn reset(&mut self) {
        self.x = [0.0, 0.0];
        self.y = [0.0, 0.0];
    }
}

impl BandPassFilter {
    pub fn new(config: BandPassFilterConfig, fs: f64) -> Result<Self> {
        let nyquist = fs / 2.0;
        if !(config.f_low > 0.0 && config.f_low < config.f_high && config.f_high < nyquist) {
            return Err(RippleError::InvalidParameters(format!(
                "band {}-{} Hz does not fit below the Nyquist frequency {} Hz",
                config.f_low, config.f_high, nyquist
            )));
        }
        if config.sections == 0 {
            return Err(RippleError::InvalidParameters(
                "band-pass filter needs at least one section".to_string(),
            ));
        }

        let high_pass = (0..config.sections)
            .map(|_| SecondOrderFilter::new(config.f_low, fs, FilterKind::HighPass))
            .collect();
        let low_pass = (0..config.sections)
            .map(|_| SecondOrderFilter::new(config.f_high, fs, FilterKind::LowPass))
            .collect();

        Ok(BandPassFilter {
            config,
            high_pass,
            low_pass,
        })
    }

    pub fn config(&self) -> &BandPassFilterConfig {
        &self.config
    }
}

impl FilterInstance for BandPassFilter {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn process_sample(&mut self, sample: f64) -> f64 {
        // High-pass stages first, then low-pass
        let high_passed = self
            .high_pass
            .iter_mut()
            .fold(sample, |x, stage| stage.calculate_output(x));
        self.low_pass
            .iter_mut()
            .fold(high_passed, |x, stage| stage.calculate_output(x))
    }

    fn reset(&mut self) {
        self.high_pass
            .iter_mut()
            .chain(self.low_pass.iter_mut())
            .for_each(SecondOrderFilter::reset);
    }
}
