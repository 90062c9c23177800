use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Degenerate bounding box: x2 ({x2}) must be greater than x1 ({x1})")]
    DegenerateBox { x1: f32, x2: f32 },

    #[error("Invalid calibration: {0}")]
    InvalidCalibration(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Session is already running")]
    AlreadyRunning,

    #[error("Video source error: {0}")]
    Source(String),

    #[error("Session worker panicked")]
    WorkerPanicked,

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Toml Error: {0}")]
    Toml(#[from] toml::de::Error),
}
