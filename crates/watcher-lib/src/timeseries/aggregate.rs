//! Open-ended fold over many series

use super::{nan_sum, TimeSeries, F};

/// Accumulates series and folds them with a reducer when read.
///
/// The number of inputs does not need to be known up front. All inputs are
/// expected to share the window of the first one; inputs with a different
/// window are skipped on read.
#[derive(Debug, Clone)]
pub struct Aggregate {
    f: F,
    input: Vec<TimeSeries>,
}

impl Aggregate {
    pub fn new(f: F) -> Self {
        Self {
            f,
            input: Vec::new(),
        }
    }

    /// Add a series; absent series are ignored
    pub fn add(&mut self, ts: Option<&TimeSeries>) -> &mut Self {
        if let Some(ts) = ts {
            self.input.push(ts.clone());
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.input.is_empty()
    }

    /// Fold every input into one series; `None` if nothing was added
    pub fn get(&self) -> Option<TimeSeries> {
        let (first, rest) = self.input.split_first()?;
        let f = self.f;
        let mut data = first.data().to_vec();
        for ts in rest.iter().filter(|ts| ts.same_shape(first)) {
            for (acc, (t, v)) in data.iter_mut().zip(ts.iter()) {
                *acc = f(t, *acc, v);
            }
        }
        Some(TimeSeries::with_data(first.from(), first.step(), data))
    }
}

impl Default for Aggregate {
    fn default() -> Self {
        Self::new(nan_sum)
    }
}
