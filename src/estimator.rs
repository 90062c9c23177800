//! Pixel box to physical width and distance, using a pinhole projection with a
//! known reference width.

use crate::detection::Detection;
use crate::error::Error;

pub const DEFAULT_PIXELS_PER_METER: f32 = 50.0;
pub const DEFAULT_FOCAL_LENGTH: f32 = 800.0;
pub const DEFAULT_KNOWN_WIDTH: f32 = 0.5;

/// Camera calibration, fixed for the lifetime of an estimator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    /// S, pixel to meter scale
    pub pixels_per_meter: f32,
    /// F, in pixels
    pub focal_length: f32,
    /// K, real-world reference width in meters
    pub known_width: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            pixels_per_meter: DEFAULT_PIXELS_PER_METER,
            focal_length: DEFAULT_FOCAL_LENGTH,
            known_width: DEFAULT_KNOWN_WIDTH,
        }
    }
}

impl Calibration {
    pub fn validate(&self) -> Result<(), Error> {
        for (name, value) in [
            ("pixels_per_meter", self.pixels_per_meter),
            ("focal_length", self.focal_length),
            ("known_width", self.known_width),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(Error::InvalidCalibration(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }
}

/// Physical estimate for one detection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// position of the detection in the detector's output for this frame
    pub index: usize,
    pub detection: Detection,
    pub width_m: f32,
    pub distance_m: f32,
}

#[derive(Debug, Clone)]
pub struct GeometricEstimator {
    calibration: Calibration,
}

impl Default for GeometricEstimator {
    fn default() -> Self {
        Self {
            calibration: Calibration::default(),
        }
    }
}

impl GeometricEstimator {
    pub fn new(calibration: Calibration) -> Result<Self, Error> {
        calibration.validate()?;

        Ok(Self { calibration })
    }

    #[inline]
    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Returns `(width_m, distance_m)` for a box, rejecting boxes with no positive pixel width.
    pub fn estimate(&self, det: &Detection) -> Result<(f32, f32), Error> {
        if det.is_degenerate() {
            return Err(Error::DegenerateBox {
                x1: det.x1,
                x2: det.x2,
            });
        }

        let pixel_width = det.pixel_width();
        let c = &self.calibration;

        let width_m = pixel_width / c.pixels_per_meter;
        let distance_m = (c.known_width * c.focal_length) / pixel_width;

        Ok((width_m, distance_m))
    }

    pub fn measure(&self, index: usize, det: &Detection) -> Result<Measurement, Error> {
        let (width_m, distance_m) = self.estimate(det)?;

        Ok(Measurement {
            index,
            detection: *det,
            width_m,
            distance_m,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimator() -> GeometricEstimator {
        GeometricEstimator::new(Calibration::default()).unwrap()
    }

    #[test]
    fn projects_width_and_distance() {
        let det = Detection::new(100.0, 50.0, 150.0, 90.0);
        let (w, d) = estimator().estimate(&det).unwrap();

        assert_eq!(w, 50.0 / 50.0);
        assert_eq!(d, (0.5 * 800.0) / 50.0);
    }

    #[test]
    fn follows_configured_constants() {
        let calibration = Calibration {
            pixels_per_meter: 20.0,
            focal_length: 1000.0,
            known_width: 0.8,
        };
        let est = GeometricEstimator::new(calibration).unwrap();
        let det = Detection::new(10.0, 0.0, 74.0, 30.0);
        let (w, d) = est.estimate(&det).unwrap();

        assert_eq!(w, 64.0 / 20.0);
        assert_eq!(d, (0.8 * 1000.0) / 64.0);
    }

    #[test]
    fn same_box_same_result() {
        let est = estimator();
        let det = Detection::new(13.5, 7.0, 91.25, 60.0);

        assert_eq!(est.estimate(&det).unwrap(), est.estimate(&det).unwrap());
    }

    #[test]
    fn rejects_degenerate_boxes() {
        let est = estimator();

        assert!(matches!(
            est.estimate(&Detection::new(40.0, 0.0, 40.0, 10.0)),
            Err(Error::DegenerateBox { .. })
        ));
        assert!(matches!(
            est.measure(3, &Detection::new(50.0, 0.0, 40.0, 10.0)),
            Err(Error::DegenerateBox { .. })
        ));
    }

    #[test]
    fn rejects_bad_calibration() {
        let calibration = Calibration {
            focal_length: 0.0,
            ..Calibration::default()
        };

        assert!(matches!(
            GeometricEstimator::new(calibration),
            Err(Error::InvalidCalibration(_))
        ));
    }
}
