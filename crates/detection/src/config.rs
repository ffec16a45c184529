//! Detection pipeline configuration loaded from environment variables.

use std::time::Duration;

/// Pipeline tuning knobs with sensible defaults.
///
/// Reads from environment variables:
/// - `DETECTION_QUEUE_CAPACITY` — inference queue depth (default: `5`)
/// - `DETECTION_WORKERS` — inference worker count (default: `2`)
/// - `DETECTION_OPEN_RETRIES` — camera open attempts (default: `5`)
/// - `DETECTION_OPEN_BACKOFF_MS` — pause between attempts (default: `200`)
/// - `DETECTION_CONFIDENCE_THRESHOLD` — minimum confidence (default: `0.3`)
#[derive(Debug, Clone)]
pub struct DetectionConfig {
    /// Bounded inference queue depth; frames beyond it are dropped.
    pub queue_capacity: usize,
    /// Number of inference workers sharing the queue.
    pub workers: usize,
    /// Camera open retry budget.
    pub open_retries: u32,
    /// Backoff between open attempts.
    pub open_backoff: Duration,
    /// Detections below this confidence are discarded.
    pub confidence_threshold: f32,
    /// Buffered frames per outbound annotated-frame feed.
    pub frame_buffer: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 5,
            workers: 2,
            open_retries: 5,
            open_backoff: Duration::from_millis(200),
            confidence_threshold: 0.3,
            frame_buffer: 16,
        }
    }
}

impl DetectionConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            queue_capacity: env_parse("DETECTION_QUEUE_CAPACITY", defaults.queue_capacity),
            workers: env_parse("DETECTION_WORKERS", defaults.workers),
            open_retries: env_parse("DETECTION_OPEN_RETRIES", defaults.open_retries),
            open_backoff: Duration::from_millis(env_parse(
                "DETECTION_OPEN_BACKOFF_MS",
                defaults.open_backoff.as_millis() as u64,
            )),
            confidence_threshold: env_parse(
                "DETECTION_CONFIDENCE_THRESHOLD",
                defaults.confidence_threshold,
            ),
            frame_buffer: defaults.frame_buffer,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = DetectionConfig::default();
        assert_eq!(config.queue_capacity, 5);
        assert_eq!(config.workers, 2);
        assert_eq!(config.open_retries, 5);
        assert_eq!(config.open_backoff, Duration::from_millis(200));
        assert!((config.confidence_threshold - 0.3).abs() < f32::EPSILON);
    }
}
