//! One synchronous estimation pass per frame.
//!
//! The pipeline owns every piece of cross-frame state (association map, speed history).
//! Consumers only ever see [`FrameReport`] values.

use serde_derive::Serialize;

use crate::alert::{AlertLevel, AlertPolicy, AlertSink};
use crate::centroid::CentroidAssociator;
use crate::config::{PotholeConfig, TrackingMode};
use crate::detection::Detection;
use crate::error::Error;
use crate::estimator::GeometricEstimator;
use crate::frame::Frame;
use crate::rolling_avg::RollingAvg;
use crate::speed::{self, DEFAULT_FPS};
use crate::tracker::{Associator, IndexAssociator};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectReport {
    pub index: usize,
    pub track_id: u64,
    pub detection: Detection,
    pub width_m: f32,
    pub distance_m: f32,
    /// None when the object had no previous distance
    pub speed_kmh: Option<f32>,
    pub alert: AlertLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub frame: u64,
    pub objects: Vec<ObjectReport>,
    /// degenerate detections dropped from this frame
    pub skipped: usize,
    pub frame_speed_kmh: f32,
    pub smoothed_speed_kmh: f32,
}

impl FrameReport {
    pub fn max_alert(&self) -> AlertLevel {
        self.objects
            .iter()
            .map(|o| o.alert)
            .fold(AlertLevel::None, |acc, x| match (acc, x) {
                (AlertLevel::High, _) | (_, AlertLevel::High) => AlertLevel::High,
                (AlertLevel::Low, _) | (_, AlertLevel::Low) => AlertLevel::Low,
                _ => AlertLevel::None,
            })
    }
}

pub struct Pipeline {
    estimator: GeometricEstimator,
    associator: Box<dyn Associator + Send>,
    smoother: RollingAvg,
    policy: AlertPolicy,
    default_fps: f32,
    dt: f32,
}

impl Pipeline {
    pub fn new(
        estimator: GeometricEstimator,
        associator: Box<dyn Associator + Send>,
        smoother: RollingAvg,
        policy: AlertPolicy,
        default_fps: f32,
    ) -> Self {
        Self {
            estimator,
            associator,
            smoother,
            policy,
            default_fps,
            dt: speed::frame_interval(None, default_fps),
        }
    }

    pub fn from_config(cfg: &PotholeConfig) -> Result<Self, Error> {
        let estimator = GeometricEstimator::new(cfg.calibration)?;
        let associator: Box<dyn Associator + Send> = match cfg.tracking {
            TrackingMode::Index => Box::new(IndexAssociator::new()),
            TrackingMode::Centroid => Box::new(CentroidAssociator::new(cfg.max_centroid_distance)),
        };
        let policy = AlertPolicy::new(cfg.alert).with_tones(cfg.high_tone, cfg.low_tone);

        Ok(Self::new(
            estimator,
            associator,
            RollingAvg::new(cfg.window),
            policy,
            cfg.default_fps,
        ))
    }

    /// Sets the frame interval from the source's reported rate.
    pub fn set_frame_rate(&mut self, fps: Option<f32>) {
        self.dt = speed::frame_interval(fps, self.default_fps);
    }

    #[inline]
    pub fn frame_interval(&self) -> f32 {
        self.dt
    }

    #[inline]
    pub fn policy(&self) -> &AlertPolicy {
        &self.policy
    }

    #[inline]
    pub fn estimator(&self) -> &GeometricEstimator {
        &self.estimator
    }

    #[inline]
    pub fn tracked(&self) -> usize {
        self.associator.len()
    }

    #[inline]
    pub fn history_len(&self) -> usize {
        self.smoother.num_samples()
    }

    /// Clears association state and speed history.
    pub fn reset(&mut self) {
        self.associator.reset();
        self.smoother.clear();
    }

    pub fn process(&mut self, frame: &Frame) -> FrameReport {
        let mut measurements = Vec::with_capacity(frame.len());
        let mut skipped = 0;

        for (index, det) in frame.iter().enumerate() {
            log::trace!("frame {} raw detection {}: {:?}", frame.index, index, det);

            match self.estimator.measure(index, det) {
                Ok(m) => measurements.push(m),
                Err(err) => {
                    skipped += 1;
                    log::debug!(
                        "frame {}: skipping detection {}: {}",
                        frame.index,
                        index,
                        err
                    );
                }
            }
        }

        let associations = self.associator.associate(&measurements);

        let mut speeds = Vec::with_capacity(measurements.len());
        let mut objects = Vec::with_capacity(measurements.len());

        for (m, a) in measurements.iter().zip(associations) {
            let speed_kmh = a
                .previous_distance
                .map(|prev| speed::closing_speed_kmh(prev, m.distance_m, self.dt));

            if let Some(s) = speed_kmh {
                speeds.push(s);
            }

            objects.push(ObjectReport {
                index: m.index,
                track_id: a.track_id,
                detection: m.detection,
                width_m: m.width_m,
                distance_m: m.distance_m,
                speed_kmh,
                alert: self.policy.evaluate(m.width_m, speed_kmh.unwrap_or(0.0)),
            });
        }

        let frame_speed_kmh = speed::frame_speed(&speeds);
        let smoothed_speed_kmh = self.smoother.push(frame_speed_kmh);

        log::debug!(
            "frame {}: {} objects, {} skipped, speed {:.2} km/h (smoothed {:.2})",
            frame.index,
            objects.len(),
            skipped,
            frame_speed_kmh,
            smoothed_speed_kmh
        );

        FrameReport {
            frame: frame.index,
            objects,
            skipped,
            frame_speed_kmh,
            smoothed_speed_kmh,
        }
    }

    /// Sends one tone per alerting object.
    pub fn sound_alerts<S: AlertSink + ?Sized>(&self, report: &FrameReport, sink: &mut S) {
        for tone in report
            .objects
            .iter()
            .filter_map(|o| self.policy.tone(o.alert))
        {
            sink.beep(tone);
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(
            GeometricEstimator::default(),
            Box::new(IndexAssociator::new()),
            RollingAvg::default(),
            AlertPolicy::default(),
            DEFAULT_FPS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::Tone;

    // pixel width giving the requested distance under default calibration
    fn det_at(x1: f32, distance_m: f32) -> Detection {
        let pixel_width = 0.5 * 800.0 / distance_m;
        Detection::new(x1, 100.0, x1 + pixel_width, 140.0)
    }

    #[derive(Default)]
    struct Recorder(Vec<Tone>);

    impl AlertSink for Recorder {
        fn beep(&mut self, tone: Tone) {
            self.0.push(tone);
        }
    }

    #[test]
    fn first_frame_has_no_speed() {
        let mut p = Pipeline::default();
        let report = p.process(&Frame::new(0, vec![det_at(10.0, 10.0)]));

        assert_eq!(report.objects.len(), 1);
        assert_eq!(report.objects[0].speed_kmh, None);
        assert_eq!(report.frame_speed_kmh, 0.0);
        assert_eq!(report.smoothed_speed_kmh, 0.0);
    }

    #[test]
    fn speed_from_consecutive_frames() {
        let mut p = Pipeline::default();
        p.set_frame_rate(Some(30.0));

        p.process(&Frame::new(0, vec![det_at(10.0, 10.0)]));
        let report = p.process(&Frame::new(1, vec![det_at(10.0, 8.0)]));

        let speed = report.objects[0].speed_kmh.unwrap();
        assert!((speed - 216.0).abs() < 1e-2);
        assert!((report.frame_speed_kmh - 216.0).abs() < 1e-2);
        assert!((report.smoothed_speed_kmh - 108.0).abs() < 1e-2);
    }

    #[test]
    fn degenerate_detection_is_skipped() {
        let mut p = Pipeline::default();

        p.process(&Frame::new(0, vec![det_at(10.0, 10.0)]));
        let report = p.process(&Frame::new(
            1,
            vec![Detection::new(50.0, 0.0, 50.0, 10.0), det_at(10.0, 8.0)],
        ));

        assert_eq!(report.skipped, 1);
        assert_eq!(report.objects.len(), 1);
        assert_eq!(report.objects[0].index, 1);
        assert_eq!(report.objects[0].speed_kmh, None);
        assert_eq!(report.frame_speed_kmh, 0.0);
    }

    #[test]
    fn frame_speed_averages_paired_objects_only() {
        let mut p = Pipeline::default();
        p.set_frame_rate(Some(10.0));

        p.process(&Frame::new(0, vec![det_at(10.0, 10.0), det_at(300.0, 20.0)]));
        let report = p.process(&Frame::new(
            1,
            vec![
                det_at(10.0, 9.0),
                det_at(300.0, 20.0),
                det_at(500.0, 5.0),
            ],
        ));

        // 1 m in 0.1 s = 36 km/h, the stationary one contributes 0, the new one nothing
        assert_eq!(report.objects[2].speed_kmh, None);
        assert!((report.frame_speed_kmh - 18.0).abs() < 1e-3);
    }

    #[test]
    fn alerts_use_own_speed() {
        let mut p = Pipeline::default();
        p.set_frame_rate(Some(1.0));

        // 0.4 m at 20 m, then 0.7 m at ~11.4 m one second later: ~30.9 km/h
        p.process(&Frame::new(
            0,
            vec![
                Detection::new(0.0, 0.0, 20.0, 20.0),
                Detection::new(200.0, 0.0, 205.0, 20.0),
            ],
        ));
        let report = p.process(&Frame::new(
            1,
            vec![
                Detection::new(0.0, 0.0, 35.0, 20.0),
                Detection::new(200.0, 0.0, 205.0, 20.0),
            ],
        ));

        assert_eq!(report.objects[0].alert, AlertLevel::High);
        assert_eq!(report.objects[1].alert, AlertLevel::None);
        assert_eq!(report.max_alert(), AlertLevel::High);

        let mut sink = Recorder::default();
        p.sound_alerts(&report, &mut sink);
        assert_eq!(sink.0, vec![Tone::new(1000, 300)]);
    }

    #[test]
    fn reset_discards_previous_distances() {
        let mut p = Pipeline::default();

        p.process(&Frame::new(0, vec![det_at(10.0, 10.0)]));
        p.reset();

        assert_eq!(p.tracked(), 0);
        assert_eq!(p.history_len(), 0);

        let report = p.process(&Frame::new(1, vec![det_at(10.0, 8.0)]));
        assert_eq!(report.objects[0].speed_kmh, None);
    }
}
