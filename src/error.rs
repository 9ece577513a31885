// src/error.rs
use crate::selection::SelectionKey;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RippleError>;

#[derive(Debug, Error)]
pub enum RippleError {
    // CONFIGURATION -----------------------------------------------------------
    #[error("filter '{filter_name}' of LFP band '{lfp_band_id}' is not a ripple filter")]
    InvalidFilter {
        lfp_band_id: String,
        filter_name: String,
    },

    #[error("unknown ripple detection algorithm '{0}' (expected Kay_ripple_detector or Karlsson_ripple_detector)")]
    UnknownAlgorithm(String),

    #[error("electrode ids {ids:?} are not in LFP band '{lfp_band_id}'")]
    UnknownElectrodes { lfp_band_id: String, ids: Vec<u32> },

    #[error("electrode ids {ids:?} were requested more than once")]
    DuplicateElectrodes { ids: Vec<u32> },

    #[error("ripple parameter set '{0}' already exists with different values")]
    ParameterSetConflict(String),

    #[error("invalid ripple parameters: {0}")]
    InvalidParameters(String),

    #[error("could not find base directory {0:?}; set it in the config or SPYGLASS_BASE_DIR")]
    MissingBaseDir(Option<PathBuf>),

    // MISSING ENTITIES --------------------------------------------------------
    #[error("ripple parameter set '{name}' does not exist (selection: {key})")]
    MissingParameterSet { name: String, key: SelectionKey },

    #[error("electrode group '{group_name}' does not exist (selection: {key})")]
    MissingElectrodeGroup { group_name: String, key: SelectionKey },

    #[error("LFP band '{0}' does not exist")]
    MissingLfpBand(String),

    #[error("interval list '{interval_list_name}' does not exist for '{nwb_file_name}'")]
    MissingIntervalList {
        nwb_file_name: String,
        interval_list_name: String,
    },

    #[error("position source '{0}' does not exist")]
    MissingPosition(String),

    #[error("position data has no speed column '{speed_name}' (selection: {key})")]
    MissingSpeedColumn { speed_name: String, key: SelectionKey },

    #[error("no ripple times stored for selection {0}")]
    MissingRippleTimes(SelectionKey),

    // DATA AVAILABILITY -------------------------------------------------------
    #[error("no overlapping valid times between LFP and position data (selection: {0})")]
    NoOverlappingIntervals(SelectionKey),

    // SHAPES ------------------------------------------------------------------
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("time index is not monotonic at row {0}")]
    NonMonotonicIndex(usize),

    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("invalid data in {path}: {message}")]
    InvalidData { path: PathBuf, message: String },

    // WRAPPED -----------------------------------------------------------------
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl RippleError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RippleError::Io {
            path: path.into(),
            source,
        }
    }
}
