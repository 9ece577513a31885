// src/selection.rs
use crate::error::{Result, RippleError};
use crate::store::{LfpBand, RippleStore};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::info;

pub const DEFAULT_GROUP_NAME: &str = "CA1";

/// Identifies one ripple detection run: which filtered LFP band, which
/// electrode group of it, which parameter set and which position result.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SelectionKey {
    pub lfp_band_id: String,
    pub group_name: String,
    pub ripple_param_name: String,
    pub pos_merge_id: String,
}

impl fmt::Display for SelectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{lfp_band_id: {}, group_name: {}, ripple_param_name: {}, pos_merge_id: {}}}",
            self.lfp_band_id, self.group_name, self.ripple_param_name, self.pos_merge_id
        )
    }
}

/// Sorted electrode ids of a band used as the ripple LFP.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ElectrodeGroup {
    pub lfp_band_id: String,
    pub group_name: String,
    pub electrode_ids: Vec<u32>,
}

pub fn is_ripple_filter(filter_name: &str) -> bool {
    filter_name.to_lowercase().contains("ripple")
}

/// Checks that the band was produced by a ripple filter.
pub fn validate_band(band: &LfpBand) -> Result<()> {
    if is_ripple_filter(&band.filter_name) {
        Ok(())
    } else {
        Err(RippleError::InvalidFilter {
            lfp_band_id: band.lfp_band_id.clone(),
            filter_name: band.filter_name.clone(),
        })
    }
}

/// Checks that the key's LFP band exists and was produced by a ripple filter.
pub fn validate_key<S: RippleStore + ?Sized>(store: &S, key: &SelectionKey) -> Result<()> {
    validate_band(&store.lfp_band(&key.lfp_band_id)?)
}

/// Replaces the electrode group `group_name` of a band.
///
/// Without an explicit list every electrode of the band is used. Ids are
/// sorted; duplicates and ids the band does not hold are rejected.
pub fn set_lfp_electrodes<S: RippleStore + ?Sized>(
    store: &mut S,
    lfp_band_id: &str,
    electrode_list: Option<&[u32]>,
    group_name: &str,
) -> Result<ElectrodeGroup> {
    let band = store.lfp_band(lfp_band_id)?;

    let mut electrode_ids = electrode_list
        .map(<[u32]>::to_vec)
        .unwrap_or_else(|| band.electrode_ids.clone());
    electrode_ids.sort_unstable();

    let duplicates: BTreeSet<u32> = electrode_ids
        .windows(2)
        .filter(|pair| pair[0] == pair[1])
        .map(|pair| pair[0])
        .collect();
    if !duplicates.is_empty() {
        return Err(RippleError::DuplicateElectrodes {
            ids: duplicates.into_iter().collect(),
        });
    }

    let unknown: Vec<u32> = electrode_ids
        .iter()
        .copied()
        .filter(|id| !band.electrode_ids.contains(id))
        .collect();
    if !unknown.is_empty() {
        return Err(RippleError::UnknownElectrodes {
            lfp_band_id: lfp_band_id.to_string(),
            ids: unknown,
        });
    }

    validate_band(&band)?;

    let group = ElectrodeGroup {
        lfp_band_id: lfp_band_id.to_string(),
        group_name: group_name.to_string(),
        electrode_ids,
    };
    info!(
        lfp_band_id,
        group_name,
        n_electrodes = group.electrode_ids.len(),
        "setting ripple LFP electrodes"
    );
    store.put_electrode_group(group.clone())?;

    Ok(group)
}
