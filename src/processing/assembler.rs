// src/processing/assembler.rs
use super::detectors::DetectorInputs;
use super::interpolate::{interpolate_to_new_time, InterpolationConfig};
use super::intervals::{interval_list_intersect, Interval};
use super::table::TimeTable;
use crate::config::{ElectrodeMaskPolicy, RippleParameters};
use crate::error::{Result, RippleError};
use crate::selection::{validate_band, SelectionKey};
use crate::store::RippleStore;

use tracing::{debug, warn};

/// Speed, ripple-band LFP and sampling rate sharing one time index.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedSignals {
    pub speed: Vec<f64>,
    pub lfps: TimeTable,
    pub sampling_frequency: f64,
}

impl AlignedSignals {
    pub fn time(&self) -> &[f64] {
        self.lfps.index()
    }

    pub fn detector_inputs(&self) -> DetectorInputs<'_> {
        DetectorInputs {
            time: self.lfps.index(),
            filtered_lfps: self.lfps.values(),
            speed: &self.speed,
            sampling_frequency: self.sampling_frequency,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AssemblerOptions {
    pub electrode_mask_policy: ElectrodeMaskPolicy,
    pub interpolation: InterpolationConfig,
}

/// Channel mask over `band_electrodes` selecting the `requested` ids, in band
/// order. Requested ids the band does not hold are dropped with a warning, or
/// rejected under [`ElectrodeMaskPolicy::Strict`].
pub fn electrode_mask(
    lfp_band_id: &str,
    band_electrodes: &[u32],
    requested: &[u32],
    policy: ElectrodeMaskPolicy,
) -> Result<Vec<bool>> {
    let missing: Vec<u32> = requested
        .iter()
        .copied()
        .filter(|id| !band_electrodes.contains(id))
        .collect();

    if !missing.is_empty() {
        match policy {
            ElectrodeMaskPolicy::Tolerant => {
                warn!(lfp_band_id, ?missing, "requested electrodes are not in the LFP band");
            }
            ElectrodeMaskPolicy::Strict => {
                return Err(RippleError::UnknownElectrodes {
                    lfp_band_id: lfp_band_id.to_string(),
                    ids: missing,
                });
            }
        }
    }

    Ok(band_electrodes
        .iter()
        .map(|id| requested.contains(id))
        .collect())
}

/// Gathers the inputs of one detection run.
///
/// The parameter set is resolved before anything else is fetched. The LFP
/// band is masked to the electrode group, both the LFP and the position are
/// restricted to the session's valid times within the position's time range,
/// and the position is interpolated onto the LFP time index.
pub fn get_ripple_lfps_and_position_info<S: RippleStore + ?Sized>(
    store: &S,
    key: &SelectionKey,
    options: &AssemblerOptions,
) -> Result<(AlignedSignals, RippleParameters)> {
    let params = store
        .ripple_parameters(&key.ripple_param_name)?
        .ok_or_else(|| RippleError::MissingParameterSet {
            name: key.ripple_param_name.clone(),
            key: key.clone(),
        })?;

    let group = store
        .electrode_group(&key.lfp_band_id, &key.group_name)?
        .ok_or_else(|| RippleError::MissingElectrodeGroup {
            group_name: key.group_name.clone(),
            key: key.clone(),
        })?;

    // Ripple-band LFP restricted to the group's channels
    let band = store.lfp_band(&key.lfp_band_id)?;
    validate_band(&band)?;
    let mask = electrode_mask(
        &band.lfp_band_id,
        &band.electrode_ids,
        &group.electrode_ids,
        options.electrode_mask_policy,
    )?;
    let ripple_lfp = band.data.select_columns(&mask)?;
    debug!(
        channels = ripple_lfp.n_columns(),
        rows = ripple_lfp.n_rows(),
        "selected ripple LFP channels"
    );

    // Valid times, restricted to the span of the position data
    let valid_times = store
        .interval_list(&band.nwb_file_name, &band.target_interval_list_name)?
        .valid_times;
    let position = store.position(&key.pos_merge_id)?;
    let position_span = match (position.index().first(), position.index().last()) {
        (Some(&first), Some(&last)) => Interval::new(first, last),
        _ => return Err(RippleError::NoOverlappingIntervals(key.clone())),
    };
    let valid_times = interval_list_intersect(&valid_times, &position_span);
    if valid_times.is_empty() {
        return Err(RippleError::NoOverlappingIntervals(key.clone()));
    }

    let position = concat_intervals(&position, &valid_times)?;
    let interval_ripple_lfps = concat_intervals(&ripple_lfp, &valid_times)?;
    if interval_ripple_lfps.is_empty() {
        return Err(RippleError::NoOverlappingIntervals(key.clone()));
    }
    debug!(
        intervals = valid_times.len(),
        rows = interval_ripple_lfps.n_rows(),
        "restricted to valid times"
    );

    let position =
        interpolate_to_new_time(&position, interval_ripple_lfps.index(), options.interpolation)?;
    let speed = position
        .column(&params.speed_name)
        .ok_or_else(|| RippleError::MissingSpeedColumn {
            speed_name: params.speed_name.clone(),
            key: key.clone(),
        })?
        .to_vec();

    Ok((
        AlignedSignals {
            speed,
            lfps: interval_ripple_lfps,
            sampling_frequency: band.sampling_rate,
        },
        params,
    ))
}

/// Rows of `table` inside each interval, in interval order.
fn concat_intervals(table: &TimeTable, intervals: &[Interval]) -> Result<TimeTable> {
    let parts: Vec<TimeTable> = intervals
        .iter()
        .map(|interval| table.slice_time(interval.start, interval.end))
        .collect();
    TimeTable::concat(&parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_keeps_band_order() {
        let mask = electrode_mask("band", &[7, 3, 5], &[3, 7], ElectrodeMaskPolicy::Tolerant)
            .unwrap();
        assert_eq!(mask, vec![true, true, false]);
    }

    #[test]
    fn tolerant_mask_drops_unknown_electrodes() {
        let mask = electrode_mask("band", &[3, 7], &[3, 7, 99], ElectrodeMaskPolicy::Tolerant)
            .unwrap();
        assert_eq!(mask.iter().filter(|&&active| active).count(), 2);
    }

    #[test]
    fn strict_mask_reports_unknown_electrodes() {
        let result = electrode_mask("band", &[3, 7], &[3, 7, 99], ElectrodeMaskPolicy::Strict);
        assert!(matches!(
            result,
            Err(RippleError::UnknownElectrodes { ids, .. }) if ids == vec![99]
        ));
    }
}
