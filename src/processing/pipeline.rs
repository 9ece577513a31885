// src/processing/pipeline.rs
use super::assembler::{get_ripple_lfps_and_position_info, AssemblerOptions};
use super::consensus::ripple_consensus_trace;
use super::detectors::{DetectorInstance, RippleEvent};
use super::table::TimeTable;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::selection::SelectionKey;
use crate::store::RippleStore;
use crate::utils::log::{log_run, RunRecord};

use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineOptions {
    pub assembler: AssemblerOptions,
    /// Directory of the run ledger; no ledger entry is written without one.
    pub log_dir: Option<PathBuf>,
}

impl PipelineOptions {
    pub fn from_config(config: &PipelineConfig, log_dir: Option<PathBuf>) -> Self {
        Self {
            assembler: AssemblerOptions {
                electrode_mask_policy: config.electrode_mask_policy,
                interpolation: config.interpolation,
            },
            log_dir,
        }
    }
}

/// Outcome of one detection run.
#[derive(Debug, Clone, PartialEq)]
pub struct RippleRun {
    pub object_id: String,
    pub algorithm: &'static str,
    pub events: Vec<RippleEvent>,
}

/// Detects ripples for `key` and stores them under it.
pub fn compute_ripple_times<S: RippleStore + ?Sized>(
    store: &mut S,
    key: &SelectionKey,
    options: &PipelineOptions,
) -> Result<RippleRun> {
    info!(%key, "computing ripple times");

    let (signals, params) = get_ripple_lfps_and_position_info(&*store, key, &options.assembler)?;
    let detector = params.detector()?;
    let events = detector.detect(&signals.detector_inputs())?;
    info!(
        algorithm = detector.name(),
        n_ripples = events.len(),
        "detected ripples"
    );

    let object_id = store.insert_ripple_times(key, &events)?;

    if let Some(log_dir) = &options.log_dir {
        let mut record = RunRecord::new(key, detector.name());
        record.n_channels = signals.lfps.n_columns();
        record.n_samples = signals.lfps.n_rows();
        record.n_ripples = events.len();
        record.object_id = object_id.clone();
        // The result is already stored; a ledger failure only warrants a warning
        if let Err(e) = log_run(log_dir, &record) {
            warn!(error = %e, "could not append to the run ledger");
        }
    }

    Ok(RippleRun {
        object_id,
        algorithm: detector.name(),
        events,
    })
}

/// Consensus trace over the aligned ripple LFP of `key`.
pub fn consensus_trace_for<S: RippleStore + ?Sized>(
    store: &S,
    key: &SelectionKey,
    options: &AssemblerOptions,
) -> Result<TimeTable> {
    let (signals, params) = get_ripple_lfps_and_position_info(store, key, options)?;
    ripple_consensus_trace(
        &signals.lfps,
        signals.sampling_frequency,
        params.ripple_detection_params.smoothing_sigma,
    )
}
