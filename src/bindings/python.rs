// src/bindings/python.rs
use crate::error::RippleError;
use crate::processing::consensus::{ripple_consensus_trace, DEFAULT_SMOOTHING_SIGMA};
use crate::processing::detectors::{
    score_columns, DetectorInputs, DetectorInstance, RippleDetectionAlgorithm,
    RippleDetectionParams, KARLSSON_RIPPLE_DETECTOR, KAY_RIPPLE_DETECTOR,
};
use crate::processing::interpolate::{interpolate_to_new_time, InterpolationConfig};
use crate::processing::table::TimeTable;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

impl From<RippleError> for PyErr {
    fn from(err: RippleError) -> PyErr {
        PyValueError::new_err(err.to_string())
    }
}

/// Python passes `time x channel` rows; the detectors work on channel columns.
fn rows_to_columns(rows: &[Vec<f64>]) -> PyResult<Vec<Vec<f64>>> {
    let n_channels = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|row| row.len() != n_channels) {
        return Err(PyValueError::new_err("rows have different channel counts"));
    }
    Ok((0..n_channels)
        .map(|channel| rows.iter().map(|row| row[channel]).collect())
        .collect())
}

fn channel_names(n: usize) -> Vec<String> {
    (0..n).map(|channel| channel.to_string()).collect()
}

/// Runs a detector and returns its events column-wise: `ripple_number`,
/// `start_time`, `end_time`, then the score columns when the detector
/// scores its events.
fn run_detector<'py>(
    py: Python<'py>,
    name: &str,
    time: Vec<f64>,
    filtered_lfps: Vec<Vec<f64>>,
    speed: Vec<f64>,
    sampling_frequency: f64,
    params: RippleDetectionParams,
) -> PyResult<Bound<'py, PyDict>> {
    let channels = rows_to_columns(&filtered_lfps)?;
    let detector = RippleDetectionAlgorithm::from_name(name, params)?;
    let inputs = DetectorInputs {
        time: &time,
        filtered_lfps: &channels,
        speed: &speed,
        sampling_frequency,
    };
    let events = detector.detect(&inputs)?;

    let table = PyDict::new_bound(py);
    table.set_item(
        "ripple_number",
        events.iter().map(|event| event.ripple_number).collect::<Vec<_>>(),
    )?;
    table.set_item(
        "start_time",
        events.iter().map(|event| event.start_time).collect::<Vec<_>>(),
    )?;
    table.set_item(
        "end_time",
        events.iter().map(|event| event.end_time).collect::<Vec<_>>(),
    )?;
    for (column, values) in score_columns(&events) {
        table.set_item(column, values)?;
    }
    Ok(table)
}

#[pyfunction]
#[pyo3(signature = (
    time, filtered_lfps, speed, sampling_frequency,
    speed_threshold=4.0, minimum_duration=0.015, zscore_threshold=2.0,
    smoothing_sigma=0.004, close_ripple_threshold=0.0
))]
#[allow(clippy::too_many_arguments)]
pub fn kay_ripple_detector<'py>(
    py: Python<'py>,
    time: Vec<f64>,
    filtered_lfps: Vec<Vec<f64>>,
    speed: Vec<f64>,
    sampling_frequency: f64,
    speed_threshold: f64,
    minimum_duration: f64,
    zscore_threshold: f64,
    smoothing_sigma: f64,
    close_ripple_threshold: f64,
) -> PyResult<Bound<'py, PyDict>> {
    let params = RippleDetectionParams {
        speed_threshold,
        minimum_duration,
        zscore_threshold,
        smoothing_sigma,
        close_ripple_threshold,
    };
    run_detector(py, KAY_RIPPLE_DETECTOR, time, filtered_lfps, speed, sampling_frequency, params)
}

#[pyfunction]
#[pyo3(signature = (
    time, filtered_lfps, speed, sampling_frequency,
    speed_threshold=4.0, minimum_duration=0.015, zscore_threshold=2.0,
    smoothing_sigma=0.004, close_ripple_threshold=0.0
))]
#[allow(clippy::too_many_arguments)]
pub fn karlsson_ripple_detector<'py>(
    py: Python<'py>,
    time: Vec<f64>,
    filtered_lfps: Vec<Vec<f64>>,
    speed: Vec<f64>,
    sampling_frequency: f64,
    speed_threshold: f64,
    minimum_duration: f64,
    zscore_threshold: f64,
    smoothing_sigma: f64,
    close_ripple_threshold: f64,
) -> PyResult<Bound<'py, PyDict>> {
    let params = RippleDetectionParams {
        speed_threshold,
        minimum_duration,
        zscore_threshold,
        smoothing_sigma,
        close_ripple_threshold,
    };
    run_detector(
        py,
        KARLSSON_RIPPLE_DETECTOR,
        time,
        filtered_lfps,
        speed,
        sampling_frequency,
        params,
    )
}

#[pyfunction]
#[pyo3(name = "ripple_consensus_trace", signature = (time, filtered_lfps, sampling_frequency, smoothing_sigma=DEFAULT_SMOOTHING_SIGMA))]
pub fn ripple_consensus_trace_py(
    time: Vec<f64>,
    filtered_lfps: Vec<Vec<f64>>,
    sampling_frequency: f64,
    smoothing_sigma: f64,
) -> PyResult<Vec<f64>> {
    let channels = rows_to_columns(&filtered_lfps)?;
    let table = TimeTable::new(time, channel_names(channels.len()), channels)?;
    let trace = ripple_consensus_trace(&table, sampling_frequency, smoothing_sigma)?;
    Ok(trace.values().first().cloned().unwrap_or_default())
}

/// Linear interpolation of `values` (`time x column` rows) onto `new_time`.
#[pyfunction]
#[pyo3(name = "interpolate_to_new_time")]
pub fn interpolate_to_new_time_py(
    time: Vec<f64>,
    values: Vec<Vec<f64>>,
    new_time: Vec<f64>,
) -> PyResult<Vec<Vec<f64>>> {
    let columns = rows_to_columns(&values)?;
    let table = TimeTable::new(time, channel_names(columns.len()), columns)?;
    let aligned = interpolate_to_new_time(&table, &new_time, InterpolationConfig::default())?;
    Ok((0..aligned.n_rows()).map(|row| aligned.row(row)).collect())
}

pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(kay_ripple_detector, m)?)?;
    m.add_function(wrap_pyfunction!(karlsson_ripple_detector, m)?)?;
    m.add_function(wrap_pyfunction!(ripple_consensus_trace_py, m)?)?;
    m.add_function(wrap_pyfunction!(interpolate_to_new_time_py, m)?)?;
    Ok(())
}
