pub mod alert;
pub mod bbox;
pub mod centroid;
pub mod config;
pub mod detection;
pub mod error;
pub mod estimator;
pub mod frame;
pub mod pipeline;
pub mod rolling_avg;
pub mod session;
pub mod source;
pub mod speed;
pub mod tracker;

mod circular_queue;

pub use alert::{AlertLevel, AlertPolicy, AlertSink, AlertThresholds, LogSink, Tone};
pub use centroid::CentroidAssociator;
pub use config::{PotholeConfig, TrackingMode};
pub use detection::Detection;
pub use error::Error;
pub use estimator::{Calibration, GeometricEstimator, Measurement};
pub use frame::Frame;
pub use pipeline::{FrameReport, ObjectReport, Pipeline};
pub use rolling_avg::RollingAvg;
pub use session::{Session, SessionState, StopHandle};
pub use source::{DetectionLog, MemorySource, VideoSource};
pub use tracker::{Association, Associator, IndexAssociator};
