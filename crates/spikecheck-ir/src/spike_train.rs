//! Boolean spike trains indexed by (timestep, input node) and rate coding.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpikeTrainError {
    #[error("spike train has no timesteps")]
    Empty,
    #[error("row {row} has width {actual}, expected {expected}")]
    Ragged {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// A concrete spike train of `num_steps` timesteps over `width` nodes.
///
/// Timesteps are 1-based to line up with the symbolic encoding, where
/// timestep 0 is the all-quiet initial state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpikeTrain {
    num_steps: usize,
    width: usize,
    bits: Vec<bool>,
}

impl SpikeTrain {
    pub fn silent(num_steps: usize, width: usize) -> Self {
        Self {
            num_steps,
            width,
            bits: vec![false; num_steps * width],
        }
    }

    /// Build from one row per timestep.
    pub fn from_rows(rows: Vec<Vec<bool>>) -> Result<Self, SpikeTrainError> {
        let width = rows.first().ok_or(SpikeTrainError::Empty)?.len();
        let num_steps = rows.len();
        let mut bits = Vec::with_capacity(num_steps * width);
        for (row, values) in rows.into_iter().enumerate() {
            if values.len() != width {
                return Err(SpikeTrainError::Ragged {
                    row,
                    expected: width,
                    actual: values.len(),
                });
            }
            bits.extend(values);
        }
        Ok(Self {
            num_steps,
            width,
            bits,
        })
    }

    pub fn num_steps(&self) -> usize {
        self.num_steps
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Spike of `node` at timestep `step` (1-based).
    pub fn fires(&self, step: usize, node: usize) -> bool {
        assert!(
            (1..=self.num_steps).contains(&step) && node < self.width,
            "spike position ({step}, {node}) outside {}x{} train",
            self.num_steps,
            self.width
        );
        self.bits[(step - 1) * self.width + node]
    }

    pub fn set(&mut self, step: usize, node: usize, value: bool) {
        assert!(
            (1..=self.num_steps).contains(&step) && node < self.width,
            "spike position ({step}, {node}) outside {}x{} train",
            self.num_steps,
            self.width
        );
        self.bits[(step - 1) * self.width + node] = value;
    }

    pub fn to_rows(&self) -> Vec<Vec<bool>> {
        self.bits.chunks(self.width.max(1)).map(<[bool]>::to_vec).collect()
    }

    pub fn spike_count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }

    /// Number of positions at which two equally-shaped trains disagree.
    pub fn hamming_distance(&self, other: &SpikeTrain) -> Option<usize> {
        if self.num_steps != other.num_steps || self.width != other.width {
            return None;
        }
        Some(
            self.bits
                .iter()
                .zip(&other.bits)
                .filter(|(a, b)| a != b)
                .count(),
        )
    }
}

/// Rate coding: node `i` fires at each timestep with probability
/// `features[i]` clamped to `[0, 1]`.
pub fn rate_encode<R: Rng + ?Sized>(features: &[f64], num_steps: usize, rng: &mut R) -> SpikeTrain {
    let mut train = SpikeTrain::silent(num_steps, features.len());
    for step in 1..=num_steps {
        for (node, value) in features.iter().enumerate() {
            let p = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
            train.set(step, node, rng.gen_bool(p));
        }
    }
    train
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn rows_round_trip_and_indexing() {
        let rows = vec![vec![true, false], vec![false, true], vec![true, true]];
        let train = SpikeTrain::from_rows(rows.clone()).unwrap();
        assert_eq!(train.num_steps(), 3);
        assert_eq!(train.width(), 2);
        assert!(train.fires(1, 0));
        assert!(!train.fires(1, 1));
        assert!(train.fires(3, 1));
        assert_eq!(train.to_rows(), rows);
        assert_eq!(train.spike_count(), 4);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = SpikeTrain::from_rows(vec![vec![true], vec![true, false]]).unwrap_err();
        assert_eq!(
            err,
            SpikeTrainError::Ragged {
                row: 1,
                expected: 1,
                actual: 2
            }
        );
        assert_eq!(SpikeTrain::from_rows(vec![]).unwrap_err(), SpikeTrainError::Empty);
    }

    #[test]
    #[should_panic(expected = "outside")]
    fn step_zero_is_not_addressable() {
        SpikeTrain::silent(2, 2).fires(0, 0);
    }

    #[test]
    fn hamming_distance_counts_flips() {
        let a = SpikeTrain::silent(2, 2);
        let mut b = a.clone();
        b.set(1, 1, true);
        b.set(2, 0, true);
        assert_eq!(a.hamming_distance(&b), Some(2));
        assert_eq!(a.hamming_distance(&SpikeTrain::silent(3, 2)), None);
    }

    #[test]
    fn rate_encoding_is_seed_deterministic_and_saturates() {
        let features = [0.0, 1.0, 0.5, 7.0, -3.0];
        let a = rate_encode(&features, 20, &mut StdRng::seed_from_u64(11));
        let b = rate_encode(&features, 20, &mut StdRng::seed_from_u64(11));
        assert_eq!(a, b);
        for step in 1..=20 {
            assert!(!a.fires(step, 0));
            assert!(a.fires(step, 1));
            assert!(a.fires(step, 3));
            assert!(!a.fires(step, 4));
        }
    }
}
