//! Simulated device sets.
//!
//! A position source yields one batch of coordinates per tick;
//! [`DeviceGenerator`] turns each batch into an id → [`Device`] map with a
//! freshly sampled accuracy per device.

use crate::device::Device;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use std::collections::BTreeMap;
use std::{error::Error, fmt};

#[derive(Debug, Clone, PartialEq)]
pub enum GeneratorError {
    InvalidAccuracyRange { lo: f64, hi: f64 },
    InvalidDimensions([f64; 2]),
}

impl fmt::Display for GeneratorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorError::InvalidAccuracyRange { lo, hi } => write!(
                f,
                "accuracy range ({lo}, {hi}) must be finite, non-negative and ordered"
            ),
            GeneratorError::InvalidDimensions(dims) => write!(
                f,
                "position area ({}, {}) must be finite and non-negative",
                dims[0], dims[1]
            ),
        }
    }
}

impl Error for GeneratorError {}

/// Endless source of `count` positions per batch, uniform over `[0, W] × [0, H]`.
#[derive(Clone, Debug)]
pub struct UniformPositions {
    count: usize,
    dimensions: [f64; 2],
    rng: ChaCha12Rng,
}

impl UniformPositions {
    pub fn new(count: usize, dimensions: [f64; 2], seed: u64) -> Result<Self, GeneratorError> {
        if !dimensions.iter().all(|d| d.is_finite() && *d >= 0.0) {
            return Err(GeneratorError::InvalidDimensions(dimensions));
        }
        Ok(Self {
            count,
            dimensions,
            rng: ChaCha12Rng::seed_from_u64(seed),
        })
    }
}

impl Iterator for UniformPositions {
    type Item = Vec<[f64; 2]>;

    fn next(&mut self) -> Option<Self::Item> {
        let [w, h] = self.dimensions;
        let batch = (0..self.count)
            .map(|_| {
                [
                    self.rng.random_range(0.0..=w),
                    self.rng.random_range(0.0..=h),
                ]
            })
            .collect();
        Some(batch)
    }
}

/// Turns position batches into device maps.
///
/// Ids are the decimal slot of the position within its batch: unique per
/// tick, and the same slot keeps its id from tick to tick.
pub struct DeviceGenerator<P, R> {
    positions: P,
    accuracy: (f64, f64),
    rng: R,
}

impl<P> DeviceGenerator<P, ChaCha12Rng>
where
    P: Iterator<Item = Vec<[f64; 2]>>,
{
    pub fn seeded(positions: P, accuracy: (f64, f64), seed: u64) -> Result<Self, GeneratorError> {
        Self::try_new(positions, accuracy, ChaCha12Rng::seed_from_u64(seed))
    }
}

impl<P, R> DeviceGenerator<P, R>
where
    P: Iterator<Item = Vec<[f64; 2]>>,
    R: Rng,
{
    pub fn try_new(positions: P, accuracy: (f64, f64), rng: R) -> Result<Self, GeneratorError> {
        let (lo, hi) = accuracy;
        if !(lo.is_finite() && hi.is_finite() && lo >= 0.0 && lo <= hi) {
            return Err(GeneratorError::InvalidAccuracyRange { lo, hi });
        }
        Ok(Self {
            positions,
            accuracy,
            rng,
        })
    }

    pub fn accuracy_range(&self) -> (f64, f64) {
        self.accuracy
    }
}

impl<P, R> Iterator for DeviceGenerator<P, R>
where
    P: Iterator<Item = Vec<[f64; 2]>>,
    R: Rng,
{
    type Item = BTreeMap<String, Device>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch = self.positions.next()?;
        let (lo, hi) = self.accuracy;
        let devices = batch
            .into_iter()
            .enumerate()
            .map(|(slot, position)| {
                let id = slot.to_string();
                let accuracy = self.rng.random_range(lo..=hi);
                (id.clone(), Device::new(id, position, accuracy))
            })
            .collect();
        Some(devices)
    }
}
