// src/store/mod.rs
pub mod files;
pub mod manifest;
pub mod memory;

pub use manifest::ManifestStore;
pub use memory::MemoryStore;

use crate::config::{check_parameter_insert, Inserted, RippleParameters};
use crate::error::Result;
use crate::processing::detectors::RippleEvent;
use crate::processing::intervals::Interval;
use crate::processing::table::TimeTable;
use crate::selection::{ElectrodeGroup, SelectionKey};

use serde::{Deserialize, Serialize};

/// A band-pass filtered LFP dataset. Columns of `data` follow `electrode_ids`.
#[derive(Debug, Clone, PartialEq)]
pub struct LfpBand {
    pub lfp_band_id: String,
    pub nwb_file_name: String,
    pub filter_name: String,
    pub target_interval_list_name: String,
    pub electrode_ids: Vec<u32>,
    pub sampling_rate: f64,
    pub data: TimeTable,
}

impl LfpBand {
    /// Column names used for the electrode channels.
    pub fn electrode_columns(electrode_ids: &[u32]) -> Vec<String> {
        electrode_ids.iter().map(u32::to_string).collect()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct IntervalList {
    pub nwb_file_name: String,
    pub interval_list_name: String,
    pub valid_times: Vec<Interval>,
}

/// Detection result persisted for one selection.
#[derive(Debug, Clone, PartialEq)]
pub struct RippleTimes {
    pub key: SelectionKey,
    pub object_id: String,
    pub events: Vec<RippleEvent>,
}

/// Keyed fetches and inserts against the tables the ripple pipeline reads
/// and writes.
pub trait RippleStore {
    fn ripple_parameters(&self, name: &str) -> Result<Option<RippleParameters>>;
    fn put_ripple_parameters(&mut self, name: &str, params: RippleParameters) -> Result<()>;

    fn electrode_group(&self, lfp_band_id: &str, group_name: &str)
        -> Result<Option<ElectrodeGroup>>;
    /// Replaces any existing group with the same band and name.
    fn put_electrode_group(&mut self, group: ElectrodeGroup) -> Result<()>;

    fn lfp_band(&self, lfp_band_id: &str) -> Result<LfpBand>;
    fn interval_list(&self, nwb_file_name: &str, interval_list_name: &str)
        -> Result<IntervalList>;
    /// Position covariates (e.g. `head_speed`) indexed by time.
    fn position(&self, pos_merge_id: &str) -> Result<TimeTable>;

    /// Stores detection results and returns their object id.
    fn insert_ripple_times(&mut self, key: &SelectionKey, events: &[RippleEvent])
        -> Result<String>;
    fn ripple_times(&self, key: &SelectionKey) -> Result<Option<RippleTimes>>;

    /// Inserts a named parameter set once; parameter sets never change.
    fn insert_ripple_parameters(
        &mut self,
        name: &str,
        params: RippleParameters,
    ) -> Result<Inserted> {
        let existing = self.ripple_parameters(name)?;
        let outcome = check_parameter_insert(name, existing.as_ref(), &params)?;
        if outcome == Inserted::New {
            self.put_ripple_parameters(name, params)?;
        }
        Ok(outcome)
    }
}

/// Inserts the `default` parameter set, skipping it if already present.
pub fn insert_default_parameters<S: RippleStore + ?Sized>(store: &mut S) -> Result<Inserted> {
    store.insert_ripple_parameters(crate::config::DEFAULT_PARAM_NAME, RippleParameters::default())
}

/// Reads back the stored ripple times of `key`.
pub fn fetch_ripple_times<S: RippleStore + ?Sized>(
    store: &S,
    key: &SelectionKey,
) -> Result<RippleTimes> {
    store
        .ripple_times(key)?
        .ok_or_else(|| crate::error::RippleError::MissingRippleTimes(key.clone()))
}
