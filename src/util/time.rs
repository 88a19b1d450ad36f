//! Time utilities for the simulation loop

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::config::MAX_FPS;

/// Get current Unix timestamp in milliseconds
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Process start time for uptime tracking
static PROCESS_START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize process start time (call once at startup)
pub fn init_process_time() {
    PROCESS_START.get_or_init(Instant::now);
}

/// Get process uptime in seconds
pub fn uptime_secs() -> u64 {
    PROCESS_START
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Duration of one simulation step at the given rate, clamped to `1..=MAX_FPS`
pub fn step_duration(fps: u32) -> Duration {
    Duration::from_micros(1_000_000 / u64::from(fps.clamp(1, MAX_FPS)))
}

/// A simple timer measuring wall-clock time between frames
#[derive(Debug, Clone)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Elapsed time since the last lap, restarting the timer
    pub fn lap(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.start);
        self.start = now;
        elapsed
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_duration_matches_rate() {
        assert_eq!(step_duration(60), Duration::from_micros(16_666));
        assert_eq!(step_duration(0), Duration::from_secs(1));
        assert_eq!(step_duration(u32::MAX), Duration::from_millis(1));
    }

    #[test]
    fn lap_restarts_timer() {
        let mut timer = Timer::new();
        std::thread::sleep(Duration::from_millis(2));
        assert!(timer.lap() >= Duration::from_millis(2));
        assert!(timer.elapsed() < Duration::from_millis(2));
    }
}
