//! Fixed-timestep accumulator decoupling simulation from frame cadence

use std::time::Duration;

use tracing::debug;

use crate::util::time::step_duration;

/// Converts wall-clock frame time into a whole number of simulation steps.
///
/// Accumulated time beyond `max_steps` timesteps is discarded so a long
/// stall never turns into an unbounded catch-up loop.
#[derive(Debug, Clone)]
pub struct FixedTimestep {
    step: Duration,
    accumulator: Duration,
    max_steps: u32,
    dropped: Duration,
}

impl FixedTimestep {
    pub fn new(fps: u32, max_steps: u32) -> Self {
        Self {
            step: step_duration(fps),
            accumulator: Duration::ZERO,
            max_steps: max_steps.max(1),
            dropped: Duration::ZERO,
        }
    }

    /// Add elapsed wall time and return how many steps to run now
    pub fn advance(&mut self, elapsed: Duration) -> u32 {
        self.accumulator += elapsed;

        let cap = self.step * self.max_steps;
        if self.accumulator > cap {
            let excess = self.accumulator - cap;
            self.dropped += excess;
            self.accumulator = cap;
            debug!(excess_ms = excess.as_millis() as u64, "Dropping simulation backlog");
        }

        let mut steps = 0;
        while self.accumulator >= self.step {
            self.accumulator -= self.step;
            steps += 1;
        }
        steps
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    /// Step length in seconds, as passed to controllers
    pub fn delta_secs(&self) -> f32 {
        self.step.as_secs_f32()
    }

    /// Total wall time discarded by the catch-up cap
    pub fn dropped(&self) -> Duration {
        self.dropped
    }
}
