// src/store/manifest.rs
use super::files::{read_ripple_times, read_time_table, write_ripple_times};
use super::{IntervalList, LfpBand, RippleStore, RippleTimes};
use crate::config::{load_config, save_config, RippleParameters};
use crate::error::{Result, RippleError};
use crate::processing::detectors::RippleEvent;
use crate::processing::table::TimeTable;
use crate::selection::{ElectrodeGroup, SelectionKey};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// LFP band entry; the samples live in a CSV next to the manifest.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LfpBandEntry {
    pub lfp_band_id: String,
    pub nwb_file_name: String,
    pub filter_name: String,
    pub target_interval_list_name: String,
    pub electrode_ids: Vec<u32>,
    pub sampling_rate: f64,
    pub path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PositionEntry {
    pub pos_merge_id: String,
    pub path: PathBuf,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RippleTimesEntry {
    pub key: SelectionKey,
    pub object_id: String,
    pub path: PathBuf,
}

/// The YAML document listing everything the store knows about.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Manifest {
    pub ripple_parameters: BTreeMap<String, RippleParameters>,
    pub electrode_groups: Vec<ElectrodeGroup>,
    pub lfp_bands: Vec<LfpBandEntry>,
    pub interval_lists: Vec<IntervalList>,
    pub positions: Vec<PositionEntry>,
    pub ripple_times: Vec<RippleTimesEntry>,
}

/// File-backed store: a YAML manifest plus CSV data files. Relative paths in
/// the manifest resolve against the manifest's directory; detection results
/// are written under `analysis_dir` and recorded relative to that directory
/// when they live below it. Every insert rewrites the manifest.
#[derive(Debug)]
pub struct ManifestStore {
    path: PathBuf,
    root: PathBuf,
    analysis_dir: PathBuf,
    manifest: Manifest,
}

impl ManifestStore {
    /// Opens the manifest at `path`, starting empty if it does not exist yet.
    pub fn open(path: impl Into<PathBuf>, analysis_dir: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let manifest = if path.exists() {
            load_config(&path)?
        } else {
            Manifest::default()
        };
        // Both anchors are made absolute so a relative working layout
        // cannot be applied twice on read-back
        let root = absolute(path.parent().unwrap_or(Path::new("")))?;
        let analysis_dir: PathBuf = analysis_dir.into();
        let analysis_dir = absolute(&analysis_dir)?;

        Ok(Self {
            path,
            root,
            analysis_dir,
            manifest,
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn save(&self) -> Result<()> {
        save_config(&self.manifest, &self.path)
    }

    /// Registers (or replaces) an LFP band entry.
    pub fn register_lfp_band(&mut self, entry: LfpBandEntry) -> Result<()> {
        self.manifest
            .lfp_bands
            .retain(|band| band.lfp_band_id != entry.lfp_band_id);
        self.manifest.lfp_bands.push(entry);
        self.save()
    }

    pub fn register_position(&mut self, entry: PositionEntry) -> Result<()> {
        self.manifest
            .positions
            .retain(|position| position.pos_merge_id != entry.pos_merge_id);
        self.manifest.positions.push(entry);
        self.save()
    }

    pub fn register_interval_list(&mut self, list: IntervalList) -> Result<()> {
        self.manifest.interval_lists.retain(|existing| {
            existing.nwb_file_name != list.nwb_file_name
                || existing.interval_list_name != list.interval_list_name
        });
        self.manifest.interval_lists.push(list);
        self.save()
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn lfp_band_entry(&self, lfp_band_id: &str) -> Result<&LfpBandEntry> {
        self.manifest
            .lfp_bands
            .iter()
            .find(|band| band.lfp_band_id == lfp_band_id)
            .ok_or_else(|| RippleError::MissingLfpBand(lfp_band_id.to_string()))
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| RippleError::io(path, e))?;
    Ok(cwd.join(path))
}

impl RippleStore for ManifestStore {
    fn ripple_parameters(&self, name: &str) -> Result<Option<RippleParameters>> {
        Ok(self.manifest.ripple_parameters.get(name).cloned())
    }

    fn put_ripple_parameters(&mut self, name: &str, params: RippleParameters) -> Result<()> {
        self.manifest
            .ripple_parameters
            .insert(name.to_string(), params);
        self.save()
    }

    fn electrode_group(
        &self,
        lfp_band_id: &str,
        group_name: &str,
    ) -> Result<Option<ElectrodeGroup>> {
        Ok(self
            .manifest
            .electrode_groups
            .iter()
            .find(|group| group.lfp_band_id == lfp_band_id && group.group_name == group_name)
            .cloned())
    }

    fn put_electrode_group(&mut self, group: ElectrodeGroup) -> Result<()> {
        self.manifest.electrode_groups.retain(|existing| {
            existing.lfp_band_id != group.lfp_band_id || existing.group_name != group.group_name
        });
        self.manifest.electrode_groups.push(group);
        self.save()
    }

    fn lfp_band(&self, lfp_band_id: &str) -> Result<LfpBand> {
        let entry = self.lfp_band_entry(lfp_band_id)?;
        let path = self.resolve(&entry.path);
        let data = read_time_table(&path)?;

        // Channels are addressed by electrode id
        let expected = LfpBand::electrode_columns(&entry.electrode_ids);
        if data.columns() != expected.as_slice() {
            return Err(RippleError::ShapeMismatch(format!(
                "LFP band '{}' lists electrodes {:?} but {} has columns {:?}",
                lfp_band_id,
                entry.electrode_ids,
                path.display(),
                data.columns()
            )));
        }
        debug!(lfp_band_id, rows = data.n_rows(), channels = data.n_columns(), "loaded LFP band");

        Ok(LfpBand {
            lfp_band_id: entry.lfp_band_id.clone(),
            nwb_file_name: entry.nwb_file_name.clone(),
            filter_name: entry.filter_name.clone(),
            target_interval_list_name: entry.target_interval_list_name.clone(),
            electrode_ids: entry.electrode_ids.clone(),
            sampling_rate: entry.sampling_rate,
            data,
        })
    }

    fn interval_list(&self, nwb_file_name: &str, interval_list_name: &str) -> Result<IntervalList> {
        self.manifest
            .interval_lists
            .iter()
            .find(|list| {
                list.nwb_file_name == nwb_file_name && list.interval_list_name == interval_list_name
            })
            .cloned()
            .ok_or_else(|| RippleError::MissingIntervalList {
                nwb_file_name: nwb_file_name.to_string(),
                interval_list_name: interval_list_name.to_string(),
            })
    }

    fn position(&self, pos_merge_id: &str) -> Result<TimeTable> {
        let entry = self
            .manifest
            .positions
            .iter()
            .find(|position| position.pos_merge_id == pos_merge_id)
            .ok_or_else(|| RippleError::MissingPosition(pos_merge_id.to_string()))?;
        read_time_table(&self.resolve(&entry.path))
    }

    fn insert_ripple_times(&mut self, key: &SelectionKey, events: &[RippleEvent]) -> Result<String> {
        fs::create_dir_all(&self.analysis_dir)
            .map_err(|e| RippleError::io(&self.analysis_dir, e))?;

        let object_id = format!(
            "{}_{}_{}_{}",
            key.lfp_band_id, key.group_name, key.ripple_param_name, key.pos_merge_id
        )
        .replace(|c: char| !c.is_ascii_alphanumeric() && c != '_' && c != '-', "-");
        let path = self.analysis_dir.join(format!("{}_ripple_times.csv", object_id));
        write_ripple_times(&path, events)?;

        let recorded = path
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or(path);
        self.manifest.ripple_times.retain(|entry| &entry.key != key);
        self.manifest.ripple_times.push(RippleTimesEntry {
            key: key.clone(),
            object_id: object_id.clone(),
            path: recorded,
        });
        self.save()?;

        Ok(object_id)
    }

    fn ripple_times(&self, key: &SelectionKey) -> Result<Option<RippleTimes>> {
        let Some(entry) = self.manifest.ripple_times.iter().find(|entry| &entry.key == key) else {
            return Ok(None);
        };
        Ok(Some(RippleTimes {
            key: key.clone(),
            object_id: entry.object_id.clone(),
            events: read_ripple_times(&self.resolve(&entry.path))?,
        }))
    }
}
