use std::collections::HashMap;

use crate::estimator::Measurement;

/// Cross-frame pairing result for one measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Association {
    /// slot index in `index` mode, synthetic track id in `centroid` mode
    pub track_id: u64,
    pub previous_distance: Option<f32>,
}

/// Pairs the measurements of the current frame with state kept from the previous one.
///
/// Calls must come in strict frame order. The returned vector is parallel to `measurements`.
pub trait Associator {
    fn associate(&mut self, measurements: &[Measurement]) -> Vec<Association>;
    fn reset(&mut self);
    fn len(&self) -> usize;

    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Positional association: detection `i` of this frame is assumed to be detection `i` of
/// the previous frame.
///
/// The slot map is rebuilt every frame, so indices missing from the current frame (or
/// discarded as degenerate) lose their stored distance.
#[derive(Debug, Default)]
pub struct IndexAssociator {
    slots: HashMap<usize, f32>,
}

impl IndexAssociator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn distance(&self, index: usize) -> Option<f32> {
        self.slots.get(&index).copied()
    }
}

impl Associator for IndexAssociator {
    fn associate(&mut self, measurements: &[Measurement]) -> Vec<Association> {
        let mut next = HashMap::with_capacity(measurements.len());

        let pairs = measurements
            .iter()
            .map(|m| {
                next.insert(m.index, m.distance_m);

                Association {
                    track_id: m.index as u64,
                    previous_distance: self.slots.get(&m.index).copied(),
                }
            })
            .collect();

        self.slots = next;
        pairs
    }

    fn reset(&mut self) {
        self.slots.clear();
    }

    #[inline]
    fn len(&self) -> usize {
        self.slots.len()
    }
}
