pub const DEFAULT_FPS: f32 = 30.0;
pub const MPS_TO_KMH: f32 = 3.6;

/// Seconds between frames. Falls back to `default_fps` when the source reports no usable
/// rate, and to [`DEFAULT_FPS`] when the fallback itself is unusable.
pub fn frame_interval(fps: Option<f32>, default_fps: f32) -> f32 {
    let usable = |f: f32| f > 0.0 && f.is_finite();

    let fps = match fps {
        Some(f) if usable(f) => f,
        _ if usable(default_fps) => default_fps,
        _ => DEFAULT_FPS,
    };

    1.0 / fps
}

/// Rate of approach in m/s; positive when the object gets closer.
#[inline]
pub fn closing_speed_mps(previous_distance: f32, current_distance: f32, dt: f32) -> f32 {
    (previous_distance - current_distance) / dt
}

/// Closing speed in km/h, clamped at zero for receding objects.
#[inline]
pub fn closing_speed_kmh(previous_distance: f32, current_distance: f32, dt: f32) -> f32 {
    let kmh = closing_speed_mps(previous_distance, current_distance, dt) * MPS_TO_KMH;

    // also maps NaN to 0
    kmh.max(0.0)
}

/// Mean of the per-object speeds of one frame, 0 when nothing could be paired.
pub fn frame_speed(speeds: &[f32]) -> f32 {
    if speeds.is_empty() {
        return 0.0;
    }

    speeds.iter().sum::<f32>() / speeds.len() as f32
}
