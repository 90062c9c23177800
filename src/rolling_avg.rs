use crate::circular_queue::CircularQueue;

pub const DEFAULT_WINDOW: usize = 5;

/// Moving average over the last `window` frame speed samples.
///
/// During warm-up the mean is taken over however many samples are held.
#[derive(Debug, Clone)]
pub struct RollingAvg {
    history: CircularQueue<f32>,
}

impl RollingAvg {
    pub fn new(window: usize) -> Self {
        Self {
            history: CircularQueue::with_capacity(window),
        }
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Appends a sample and returns the mean of the window.
    pub fn push(&mut self, sample: f32) -> f32 {
        self.history.push(sample);
        self.mean().unwrap_or(0.0)
    }

    pub fn mean(&self) -> Option<f32> {
        if self.history.is_empty() {
            return None;
        }

        Some(self.history.iter().sum::<f32>() / self.history.len() as f32)
    }

    #[inline]
    pub fn window(&self) -> usize {
        self.history.capacity()
    }

    #[inline]
    pub fn num_samples(&self) -> usize {
        self.history.len()
    }

    /// Oldest first
    #[inline]
    pub fn samples(&self) -> impl Iterator<Item = f32> + '_ {
        self.history.asc_iter().copied()
    }
}

impl Default for RollingAvg {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}
