use crate::error::{Result, RippleError};

/// A time-indexed table of named `f64` columns. Missing values are `NaN`.
///
/// Values are stored column-major so that per-channel work (envelopes,
/// smoothing) can borrow one contiguous slice per column.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeTable {
    index: Vec<f64>,
    columns: Vec<String>,
    values: Vec<Vec<f64>>,
}

impl TimeTable {
    pub fn new(index: Vec<f64>, columns: Vec<String>, values: Vec<Vec<f64>>) -> Result<Self> {
        if columns.len() != values.len() {
            return Err(RippleError::ShapeMismatch(format!(
                "{} column names for {} columns",
                columns.len(),
                values.len()
            )));
        }
        if let Some((name, column)) = columns
            .iter()
            .zip(values.iter())
            .find(|(_, column)| column.len() != index.len())
        {
            return Err(RippleError::ShapeMismatch(format!(
                "column '{}' has {} rows, index has {}",
                name,
                column.len(),
                index.len()
            )));
        }
        if let Some(row) = index.windows(2).position(|pair| pair[1] < pair[0]) {
            return Err(RippleError::NonMonotonicIndex(row + 1));
        }

        Ok(Self {
            index,
            columns,
            values,
        })
    }

    /// Builds a table with no rows but the given columns.
    pub fn empty(columns: Vec<String>) -> Self {
        let values = vec![Vec::new(); columns.len()];
        Self {
            index: Vec::new(),
            columns,
            values,
        }
    }

    pub fn index(&self) -> &[f64] {
        &self.index
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Vec<f64>] {
        &self.values
    }

    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .position(|column| column == name)
            .map(|idx| self.values[idx].as_slice())
    }

    pub fn row(&self, row: usize) -> Vec<f64> {
        self.values.iter().map(|column| column[row]).collect()
    }

    /// True for every row where all columns hold a value.
    pub fn valid_rows(&self) -> Vec<bool> {
        (0..self.n_rows())
            .map(|row| self.values.iter().all(|column| !column[row].is_nan()))
            .collect()
    }

    /// Rows with `start <= time <= end`, both ends inclusive.
    pub fn slice_time(&self, start: f64, end: f64) -> TimeTable {
        let first = self.index.partition_point(|&t| t < start);
        let last = self.index.partition_point(|&t| t <= end);
        let last = last.max(first);

        TimeTable {
            index: self.index[first..last].to_vec(),
            columns: self.columns.clone(),
            values: self
                .values
                .iter()
                .map(|column| column[first..last].to_vec())
                .collect(),
        }
    }

    /// Keeps the columns whose mask entry is true, in their existing order.
    pub fn select_columns(&self, mask: &[bool]) -> Result<TimeTable> {
        if mask.len() != self.n_columns() {
            return Err(RippleError::ShapeMismatch(format!(
                "column mask has {} entries for {} columns",
                mask.len(),
                self.n_columns()
            )));
        }

        let (columns, values) = self
            .columns
            .iter()
            .zip(self.values.iter())
            .zip(mask.iter())
            .filter(|(_, &keep)| keep)
            .map(|((name, column), _)| (name.clone(), column.clone()))
            .unzip();

        Ok(TimeTable {
            index: self.index.clone(),
            columns,
            values,
        })
    }

    /// Stacks tables row-wise. All parts must share the same columns.
    pub fn concat(parts: &[TimeTable]) -> Result<TimeTable> {
        let first = parts
            .first()
            .ok_or_else(|| RippleError::EmptyInput("no tables to concatenate".to_string()))?;

        let mut index = Vec::with_capacity(parts.iter().map(TimeTable::n_rows).sum());
        let mut values = vec![Vec::with_capacity(index.capacity()); first.n_columns()];

        for part in parts {
            if part.columns != first.columns {
                return Err(RippleError::ShapeMismatch(
                    "cannot concatenate tables with different columns".to_string(),
                ));
            }
            index.extend_from_slice(&part.index);
            for (target, source) in values.iter_mut().zip(part.values.iter()) {
                target.extend_from_slice(source);
            }
        }

        TimeTable::new(index, first.columns.clone(), values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TimeTable {
        TimeTable::new(
            vec![0.0, 1.0, 2.0, 3.0],
            vec!["a".to_string(), "b".to_string()],
            vec![vec![1.0, 2.0, 3.0, 4.0], vec![10.0, f64::NAN, 30.0, 40.0]],
        )
        .unwrap()
    }

    #[test]
    fn rejects_ragged_columns() {
        let result = TimeTable::new(
            vec![0.0, 1.0],
            vec!["a".to_string()],
            vec![vec![1.0, 2.0, 3.0]],
        );
        assert!(matches!(result, Err(RippleError::ShapeMismatch(_))));
    }

    #[test]
    fn rejects_decreasing_index() {
        let result = TimeTable::new(vec![0.0, 2.0, 1.0], vec![], vec![]);
        assert!(matches!(result, Err(RippleError::NonMonotonicIndex(2))));
    }

    #[test]
    fn time_slice_is_inclusive() {
        let sliced = table().slice_time(1.0, 2.0);
        assert_eq!(sliced.index(), &[1.0, 2.0]);
        assert_eq!(sliced.column("a").unwrap(), &[2.0, 3.0]);
    }

    #[test]
    fn valid_rows_flag_missing_values() {
        assert_eq!(table().valid_rows(), vec![true, false, true, true]);
    }

    #[test]
    fn concat_keeps_interval_order() {
        let t = table();
        let joined = TimeTable::concat(&[t.slice_time(0.0, 0.0), t.slice_time(2.0, 3.0)]).unwrap();
        assert_eq!(joined.index(), &[0.0, 2.0, 3.0]);
        assert_eq!(joined.column("b").unwrap(), &[10.0, 30.0, 40.0]);

        let overlapping = TimeTable::concat(&[t.slice_time(2.0, 3.0), t.slice_time(0.0, 0.0)]);
        assert!(overlapping.is_err());
    }

    #[test]
    fn select_columns_uses_mask() {
        let selected = table().select_columns(&[false, true]).unwrap();
        assert_eq!(selected.columns(), &["b".to_string()]);
    }
}
