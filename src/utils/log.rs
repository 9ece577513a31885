// src/utils/log.rs
use crate::error::{Result, RippleError};
use crate::selection::SelectionKey;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::Path;

pub const RUN_LEDGER_FILE: &str = "ripple_runs.csv";

/// One row of the detection run ledger.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RunRecord {
    pub timestamp: DateTime<Utc>,
    pub lfp_band_id: String,
    pub group_name: String,
    pub ripple_param_name: String,
    pub pos_merge_id: String,
    pub algorithm: String,
    pub n_channels: usize,
    pub n_samples: usize,
    pub n_ripples: usize,
    pub object_id: String,
}

impl RunRecord {
    pub fn new(key: &SelectionKey, algorithm: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            lfp_band_id: key.lfp_band_id.clone(),
            group_name: key.group_name.clone(),
            ripple_param_name: key.ripple_param_name.clone(),
            pos_merge_id: key.pos_merge_id.clone(),
            algorithm: algorithm.to_string(),
            n_channels: 0,
            n_samples: 0,
            n_ripples: 0,
            object_id: String::new(),
        }
    }
}

/// Appends `record` to the ledger CSV in `log_dir`, writing the header when
/// the file is new.
pub fn log_run(log_dir: &Path, record: &RunRecord) -> Result<()> {
    // Create directory if it doesn't exist
    fs::create_dir_all(log_dir).map_err(|e| RippleError::io(log_dir, e))?;

    let path = log_dir.join(RUN_LEDGER_FILE);
    let file_exists = path.exists();

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| RippleError::io(&path, e))?;

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(!file_exists)
        .from_writer(file);
    wtr.serialize(record)?;
    wtr.flush().map_err(|e| RippleError::io(&path, e))?;

    Ok(())
}

/// Every record in the ledger of `log_dir`, oldest first.
pub fn read_runs(log_dir: &Path) -> Result<Vec<RunRecord>> {
    let path = log_dir.join(RUN_LEDGER_FILE);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut rdr = csv::Reader::from_path(&path)?;
    let records = rdr.deserialize().collect::<std::result::Result<Vec<RunRecord>, _>>()?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn key() -> SelectionKey {
        SelectionKey {
            lfp_band_id: "band".to_string(),
            group_name: "CA1".to_string(),
            ripple_param_name: "default".to_string(),
            pos_merge_id: "pos".to_string(),
        }
    }

    #[test]
    fn ledger_appends_with_single_header() {
        let dir = tempdir().unwrap();
        let logs = dir.path().join("logs");

        let mut first = RunRecord::new(&key(), "Kay_ripple_detector");
        first.n_ripples = 3;
        log_run(&logs, &first).unwrap();
        log_run(&logs, &RunRecord::new(&key(), "Karlsson_ripple_detector")).unwrap();

        let text = fs::read_to_string(logs.join(RUN_LEDGER_FILE)).unwrap();
        assert_eq!(text.matches("lfp_band_id").count(), 1);

        let runs = read_runs(&logs).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0], first);
        assert_eq!(runs[1].algorithm, "Karlsson_ripple_detector");
    }

    #[test]
    fn missing_ledger_reads_empty() {
        let dir = tempdir().unwrap();
        assert!(read_runs(dir.path()).unwrap().is_empty());
    }
}
