use serde::{Deserialize, Serialize};

/// A point entity with an uncertain 2-D position.
///
/// `accuracy` is the radius of the position uncertainty. Deposition ignores
/// it; the grid hands it back unchanged through [`crate::GridManager::devices`]
/// and uses it for the `devices_near_cell` lookup.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Device {
    id: String,
    position: [f64; 2],
    accuracy: f64,
}

impl Device {
    pub fn new(id: impl Into<String>, position: [f64; 2], accuracy: f64) -> Self {
        Self {
            id: id.into(),
            position,
            accuracy,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn position(&self) -> [f64; 2] {
        self.position
    }

    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    /// Both coordinates are finite (no NaN, no infinity).
    pub fn is_finite(&self) -> bool {
        self.position[0].is_finite() && self.position[1].is_finite()
    }

    /// Finite position and a finite, non-negative accuracy.
    pub fn is_valid(&self) -> bool {
        self.is_finite() && self.accuracy.is_finite() && self.accuracy >= 0.0
    }
}
