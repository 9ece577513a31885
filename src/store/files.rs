// src/store/files.rs
use crate::error::{Result, RippleError};
use crate::processing::detectors::{EventScores, RippleEvent};
use crate::processing::table::TimeTable;

use std::fs::File;
use std::path::Path;

// -----------------------------------------------------------------------------
// TIME TABLES
// -----------------------------------------------------------------------------

/// Reads a CSV whose first column is time and whose other columns are
/// values. Empty cells and `NaN` are missing values.
pub fn read_time_table(path: &Path) -> Result<TimeTable> {
    let file = File::open(path).map_err(|e| RippleError::io(path, e))?;
    let mut rdr = csv::Reader::from_reader(file);

    let headers = rdr.headers()?.clone();
    if headers.is_empty() {
        return Err(invalid(path, "missing header row".to_string()));
    }
    let columns: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut index = Vec::new();
    let mut values: Vec<Vec<f64>> = vec![Vec::new(); columns.len()];
    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        for (col, field) in record.iter().enumerate() {
            let value = parse_value(field).ok_or_else(|| {
                invalid(
                    path,
                    format!("row {} column {}: '{}' is not a number", row + 1, col, field),
                )
            })?;
            match col {
                0 => index.push(value),
                _ => values[col - 1].push(value),
            }
        }
    }

    TimeTable::new(index, columns, values)
}

/// Writes `table` as CSV with `index_name` as the time column header.
pub fn write_time_table(path: &Path, table: &TimeTable, index_name: &str) -> Result<()> {
    let file = File::create(path).map_err(|e| RippleError::io(path, e))?;
    let mut wtr = csv::Writer::from_writer(file);

    let header: Vec<&str> = std::iter::once(index_name)
        .chain(table.columns().iter().map(String::as_str))
        .collect();
    wtr.write_record(&header)?;

    for (row, time) in table.index().iter().enumerate() {
        let record: Vec<String> = std::iter::once(format_value(*time))
            .chain(table.values().iter().map(|column| format_value(column[row])))
            .collect();
        wtr.write_record(&record)?;
    }
    wtr.flush().map_err(|e| RippleError::io(path, e))?;
    Ok(())
}

// -----------------------------------------------------------------------------
// RIPPLE TIMES
// -----------------------------------------------------------------------------

const EVENT_COLUMNS: [&str; 3] = ["ripple_number", "start_time", "end_time"];

/// Writes events one per row. Score columns are present only when every
/// event carries scores.
pub fn write_ripple_times(path: &Path, events: &[RippleEvent]) -> Result<()> {
    let file = File::create(path).map_err(|e| RippleError::io(path, e))?;
    let mut wtr = csv::Writer::from_writer(file);

    let with_scores = !events.is_empty() && events.iter().all(|event| event.scores.is_some());
    let mut header: Vec<&str> = EVENT_COLUMNS.to_vec();
    if with_scores {
        header.extend(EventScores::COLUMNS);
    }
    wtr.write_record(&header)?;

    for event in events {
        let mut record = vec![
            event.ripple_number.to_string(),
            format_value(event.start_time),
            format_value(event.end_time),
        ];
        if let (true, Some(scores)) = (with_scores, event.scores) {
            record.extend(scores.to_row().iter().map(|v| format_value(*v)));
        }
        wtr.write_record(&record)?;
    }
    wtr.flush().map_err(|e| RippleError::io(path, e))?;
    Ok(())
}

pub fn read_ripple_times(path: &Path) -> Result<Vec<RippleEvent>> {
    let file = File::open(path).map_err(|e| RippleError::io(path, e))?;
    let mut rdr = csv::Reader::from_reader(file);

    let with_scores = rdr.headers()?.len() == EVENT_COLUMNS.len() + EventScores::COLUMNS.len();

    let mut events = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        let ripple_number = record
            .get(0)
            .and_then(|field| field.trim().parse::<usize>().ok())
            .ok_or_else(|| invalid(path, format!("row {}: bad ripple number", row + 1)))?;
        let numbers = record
            .iter()
            .skip(1)
            .map(parse_value)
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| invalid(path, format!("row {}: bad number", row + 1)))?;
        let (start_time, end_time) = match numbers.as_slice() {
            [start, end, ..] => (*start, *end),
            _ => return Err(invalid(path, format!("row {}: missing times", row + 1))),
        };

        let mut event = RippleEvent::new(ripple_number, start_time, end_time);
        if with_scores {
            event.scores = EventScores::from_row(&numbers[2..]);
        }
        events.push(event);
    }

    Ok(events)
}

fn parse_value(field: &str) -> Option<f64> {
    let field = field.trim();
    if field.is_empty() || field.eq_ignore_ascii_case("nan") {
        Some(f64::NAN)
    } else {
        field.parse().ok()
    }
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

fn invalid(path: &Path, message: String) -> RippleError {
    RippleError::InvalidData {
        path: path.to_path_buf(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn time_table_keeps_missing_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lfp.csv");
        let table = TimeTable::new(
            vec![0.0, 0.5, 1.0],
            vec!["3".to_string(), "7".to_string()],
            vec![vec![1.0, f64::NAN, 3.0], vec![-1.5, 2.0, 0.25]],
        )
        .unwrap();

        write_time_table(&path, &table, "time").unwrap();
        let loaded = read_time_table(&path).unwrap();

        assert_eq!(loaded.index(), table.index());
        assert_eq!(loaded.columns(), table.columns());
        assert!(loaded.column("3").unwrap()[1].is_nan());
        assert_eq!(loaded.column("7").unwrap(), &[-1.5, 2.0, 0.25]);
    }

    #[test]
    fn bad_numbers_name_the_row() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "time,head_speed\n0.0,1.0\n0.1,fast\n").unwrap();
        match read_time_table(&path) {
            Err(RippleError::InvalidData { message, .. }) => assert!(message.contains("row 2")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn scored_events_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ripples.csv");
        let mut event = RippleEvent::new(1, 5.0, 5.1);
        event.scores = EventScores::from_row(&[0.1; 13]);

        write_ripple_times(&path, &[event.clone()]).unwrap();
        assert_eq!(read_ripple_times(&path).unwrap(), vec![event]);
    }

    #[test]
    fn unscored_events_have_three_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ripples.csv");
        write_ripple_times(&path, &[RippleEvent::new(1, 1.0, 1.2)]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("ripple_number,start_time,end_time\n"));
        assert_eq!(read_ripple_times(&path).unwrap()[0].scores, None);
    }
}
