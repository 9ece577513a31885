use super::{IntervalList, LfpBand, RippleStore, RippleTimes};
use crate::config::RippleParameters;
use crate::error::{Result, RippleError};
use crate::processing::detectors::RippleEvent;
use crate::processing::table::TimeTable;
use crate::selection::{ElectrodeGroup, SelectionKey};

use std::cell::RefCell;
use std::collections::HashMap;

/// In-process store. Records the name of every data fetch it serves.
#[derive(Debug, Default)]
pub struct MemoryStore {
    ripple_parameters: HashMap<String, RippleParameters>,
    electrode_groups: HashMap<(String, String), ElectrodeGroup>,
    lfp_bands: HashMap<String, LfpBand>,
    interval_lists: HashMap<(String, String), IntervalList>,
    positions: HashMap<String, TimeTable>,
    ripple_times: HashMap<SelectionKey, RippleTimes>,
    fetch_log: RefCell<Vec<&'static str>>,
}

impl MemoryStore {
    pub fn add_lfp_band(&mut self, band: LfpBand) {
        self.lfp_bands.insert(band.lfp_band_id.clone(), band);
    }

    pub fn add_interval_list(&mut self, list: IntervalList) {
        self.interval_lists.insert(
            (list.nwb_file_name.clone(), list.interval_list_name.clone()),
            list,
        );
    }

    pub fn add_position(&mut self, pos_merge_id: &str, position: TimeTable) {
        self.positions.insert(pos_merge_id.to_string(), position);
    }

    /// Names of the fetches served so far, in call order.
    pub fn fetch_log(&self) -> Vec<&'static str> {
        self.fetch_log.borrow().clone()
    }

    fn record(&self, fetch: &'static str) {
        self.fetch_log.borrow_mut().push(fetch);
    }
}

impl RippleStore for MemoryStore {
    fn ripple_parameters(&self, name: &str) -> Result<Option<RippleParameters>> {
        Ok(self.ripple_parameters.get(name).cloned())
    }

    fn put_ripple_parameters(&mut self, name: &str, params: RippleParameters) -> Result<()> {
        self.ripple_parameters.insert(name.to_string(), params);
        Ok(())
    }

    fn electrode_group(
        &self,
        lfp_band_id: &str,
        group_name: &str,
    ) -> Result<Option<ElectrodeGroup>> {
        Ok(self
            .electrode_groups
            .get(&(lfp_band_id.to_string(), group_name.to_string()))
            .cloned())
    }

    fn put_electrode_group(&mut self, group: ElectrodeGroup) -> Result<()> {
        self.electrode_groups.insert(
            (group.lfp_band_id.clone(), group.group_name.clone()),
            group,
        );
        Ok(())
    }

    fn lfp_band(&self, lfp_band_id: &str) -> Result<LfpBand> {
        self.record("lfp_band");
        self.lfp_bands
            .get(lfp_band_id)
            .cloned()
            .ok_or_else(|| RippleError::MissingLfpBand(lfp_band_id.to_string()))
    }

    fn interval_list(&self, nwb_file_name: &str, interval_list_name: &str) -> Result<IntervalList> {
        self.record("interval_list");
        self.interval_lists
            .get(&(nwb_file_name.to_string(), interval_list_name.to_string()))
            .cloned()
            .ok_or_else(|| RippleError::MissingIntervalList {
                nwb_file_name: nwb_file_name.to_string(),
                interval_list_name: interval_list_name.to_string(),
            })
    }

    fn position(&self, pos_merge_id: &str) -> Result<TimeTable> {
        self.record("position");
        self.positions
            .get(pos_merge_id)
            .cloned()
            .ok_or_else(|| RippleError::MissingPosition(pos_merge_id.to_string()))
    }

    fn insert_ripple_times(&mut self, key: &SelectionKey, events: &[RippleEvent]) -> Result<String> {
        let object_id = format!("ripple_times_{:04}", self.ripple_times.len() + 1);
        self.ripple_times.insert(
            key.clone(),
            RippleTimes {
                key: key.clone(),
                object_id: object_id.clone(),
                events: events.to_vec(),
            },
        );
        Ok(object_id)
    }

    fn ripple_times(&self, key: &SelectionKey) -> Result<Option<RippleTimes>> {
        Ok(self.ripple_times.get(key).cloned())
    }
}
