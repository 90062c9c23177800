use std::fmt;
use std::time::Duration;

use serde_derive::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertLevel {
    None,
    Low,
    High,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AlertLevel::None => "none",
            AlertLevel::Low => "low",
            AlertLevel::High => "high",
        };

        f.write_str(s)
    }
}

/// Tone request for the audio collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tone {
    pub frequency_hz: u32,
    pub duration: Duration,
}

impl Tone {
    pub const fn new(frequency_hz: u32, duration_ms: u64) -> Self {
        Self {
            frequency_hz,
            duration: Duration::from_millis(duration_ms),
        }
    }
}

/// Strict lower bounds (`>`) on width and speed for each level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    pub high_width_m: f32,
    pub high_speed_kmh: f32,
    pub low_width_m: f32,
    pub low_speed_kmh: f32,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            high_width_m: 0.5,
            high_speed_kmh: 30.0,
            low_width_m: 0.3,
            low_speed_kmh: 20.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlertPolicy {
    thresholds: AlertThresholds,
    high_tone: Tone,
    low_tone: Tone,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self::new(AlertThresholds::default())
    }
}

impl AlertPolicy {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self {
            thresholds,
            high_tone: Tone::new(1000, 300),
            low_tone: Tone::new(700, 200),
        }
    }

    pub fn with_tones(mut self, high: Tone, low: Tone) -> Self {
        self.high_tone = high;
        self.low_tone = low;
        self
    }

    #[inline]
    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    /// High is checked first; the first matching level wins.
    pub fn evaluate(&self, width_m: f32, speed_kmh: f32) -> AlertLevel {
        let t = &self.thresholds;

        if width_m > t.high_width_m && speed_kmh > t.high_speed_kmh {
            AlertLevel::High
        } else if width_m > t.low_width_m && speed_kmh > t.low_speed_kmh {
            AlertLevel::Low
        } else {
            AlertLevel::None
        }
    }

    pub fn tone(&self, level: AlertLevel) -> Option<Tone> {
        match level {
            AlertLevel::High => Some(self.high_tone),
            AlertLevel::Low => Some(self.low_tone),
            AlertLevel::None => None,
        }
    }
}

/// Audio output collaborator. Fire-and-forget.
pub trait AlertSink {
    fn beep(&mut self, tone: Tone);
}

/// Writes tone requests to the log instead of a speaker
#[derive(Debug, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn beep(&mut self, tone: Tone) {
        log::warn!(
            "ALERT beep {} Hz for {} ms",
            tone.frequency_hz,
            tone.duration.as_millis()
        );
    }
}

impl<S: AlertSink + ?Sized> AlertSink for Box<S> {
    fn beep(&mut self, tone: Tone) {
        (**self).beep(tone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels() {
        let p = AlertPolicy::default();

        assert_eq!(p.evaluate(0.6, 35.0), AlertLevel::High);
        assert_eq!(p.evaluate(0.35, 25.0), AlertLevel::Low);
        assert_eq!(p.evaluate(0.2, 50.0), AlertLevel::None);
    }

    #[test]
    fn wide_but_moderate_speed_is_low() {
        let p = AlertPolicy::default();

        assert_eq!(p.evaluate(0.9, 25.0), AlertLevel::Low);
        assert_eq!(p.evaluate(0.9, 15.0), AlertLevel::None);
    }

    #[test]
    fn thresholds_are_strict() {
        let p = AlertPolicy::default();

        assert_eq!(p.evaluate(0.5, 31.0), AlertLevel::Low);
        assert_eq!(p.evaluate(0.6, 30.0), AlertLevel::Low);
        assert_eq!(p.evaluate(0.3, 25.0), AlertLevel::None);
        assert_eq!(p.evaluate(0.35, 20.0), AlertLevel::None);
    }

    #[test]
    fn high_tone_is_higher_and_longer() {
        let p = AlertPolicy::default();
        let high = p.tone(AlertLevel::High).unwrap();
        let low = p.tone(AlertLevel::Low).unwrap();

        assert!(high.frequency_hz > low.frequency_hz);
        assert!(high.duration > low.duration);
        assert_eq!(p.tone(AlertLevel::None), None);
    }
}
