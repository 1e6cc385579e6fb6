/// Playback progress as a percentage in [0, 100].
pub fn progress_percent(current_time: f64, duration: f64) -> f32 {
    if !(duration > 0.0) || !current_time.is_finite() {
        return 0.0;
    }
    (current_time / duration * 100.0).clamp(0.0, 100.0) as f32
}
