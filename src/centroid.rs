use nalgebra as na;

use crate::estimator::Measurement;
use crate::tracker::{Association, Associator};

pub const DEFAULT_MAX_CENTROID_DISTANCE: f32 = 80.0;

#[derive(Debug, Clone)]
struct Track {
    id: u64,
    centroid: na::Point2<f32>,
    distance_m: f32,
}

/// Nearest-centroid association with a distance gate.
///
/// Pairs are committed greedily in order of increasing centroid distance, each track and
/// each detection used at most once. Unmatched detections open new tracks, unmatched
/// tracks are dropped.
#[derive(Debug)]
pub struct CentroidAssociator {
    max_distance: f32,
    next_id: u64,
    tracks: Vec<Track>,
}

impl CentroidAssociator {
    pub fn new(max_distance: f32) -> Self {
        Self {
            max_distance,
            next_id: 1,
            tracks: Vec::with_capacity(16),
        }
    }

    #[inline]
    pub fn max_distance(&self) -> f32 {
        self.max_distance
    }

    fn candidates(&self, measurements: &[Measurement]) -> Vec<(usize, usize, f32)> {
        let mut pairs = Vec::new();

        for (t, track) in self.tracks.iter().enumerate() {
            for (j, m) in measurements.iter().enumerate() {
                let dist = na::distance(&track.centroid, &m.detection.centroid());

                if dist <= self.max_distance {
                    pairs.push((t, j, dist));
                }
            }
        }

        pairs.sort_by(|a, b| a.2.total_cmp(&b.2));
        pairs
    }
}

impl Default for CentroidAssociator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CENTROID_DISTANCE)
    }
}

impl Associator for CentroidAssociator {
    fn associate(&mut self, measurements: &[Measurement]) -> Vec<Association> {
        let mut track_used = vec![false; self.tracks.len()];
        let mut matched: Vec<Option<usize>> = vec![None; measurements.len()];

        for (t, j, _) in self.candidates(measurements) {
            if !track_used[t] && matched[j].is_none() {
                track_used[t] = true;
                matched[j] = Some(t);
            }
        }

        let mut next = Vec::with_capacity(measurements.len());
        let mut pairs = Vec::with_capacity(measurements.len());

        for (m, slot) in measurements.iter().zip(matched) {
            let (id, previous_distance) = match slot {
                Some(t) => (self.tracks[t].id, Some(self.tracks[t].distance_m)),
                None => {
                    let id = self.next_id;
                    self.next_id += 1;
                    (id, None)
                }
            };

            next.push(Track {
                id,
                centroid: m.detection.centroid(),
                distance_m: m.distance_m,
            });

            pairs.push(Association {
                track_id: id,
                previous_distance,
            });
        }

        log::trace!(
            "centroid association: {} tracks -> {} tracks",
            self.tracks.len(),
            next.len()
        );

        self.tracks = next;
        pairs
    }

    fn reset(&mut self) {
        self.tracks.clear();
        self.next_id = 1;
    }

    #[inline]
    fn len(&self) -> usize {
        self.tracks.len()
    }
}
