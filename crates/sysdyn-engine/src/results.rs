//! Simulation result table.

use indexmap::IndexMap;
use serde::Serialize;

/// Recorded time series: one time column plus one column per model
/// variable, in declaration order.
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResults {
    pub time: Vec<f64>,
    pub columns: IndexMap<String, Vec<f64>>,
}

impl SimulationResults {
    pub fn new(column_names: impl IntoIterator<Item = String>) -> Self {
        Self {
            time: Vec::new(),
            columns: column_names.into_iter().map(|name| (name, Vec::new())).collect(),
        }
    }

    /// Append one row. `lookup` supplies the value for each column name.
    pub fn push_row(&mut self, time: f64, mut lookup: impl FnMut(&str) -> f64) {
        self.time.push(time);
        for (name, column) in &mut self.columns {
            column.push(lookup(name));
        }
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn final_time(&self) -> Option<f64> {
        self.time.last().copied()
    }

    pub fn final_value(&self, name: &str) -> Option<f64> {
        self.columns.get(name).and_then(|col| col.last().copied())
    }
}
