//! Client and server sessions and the loop that drives them

pub mod client;
pub mod server;

pub use client::{ClientSession, ClientStats};
pub use server::{PeerId, ServerSession};

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::game::FixedTimestep;
use crate::util::time::Timer;

/// A role that advances by whole fixed steps
pub trait Steppable: Send {
    /// Run one fixed step
    fn step(&mut self);

    /// Stop driving this session
    fn is_finished(&self) -> bool {
        false
    }
}

/// Drive `session` at the timestep's rate until shutdown, then hand it back.
///
/// Each wall-clock frame is converted into a whole number of steps; work
/// beyond the catch-up cap is dropped rather than queued.
pub async fn run_loop<S: Steppable>(
    mut session: S,
    mut timestep: FixedTimestep,
    mut shutdown: watch::Receiver<bool>,
) -> S {
    let mut frame_interval = interval(timestep.step());
    frame_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut timer = Timer::new();
    let mut steps_run: u64 = 0;

    loop {
        tokio::select! {
            _ = frame_interval.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        let steps = timestep.advance(timer.lap());
        for _ in 0..steps {
            session.step();
        }
        steps_run += u64::from(steps);

        if session.is_finished() {
            debug!(steps_run, "Session finished");
            break;
        }
    }

    info!(
        steps_run,
        dropped_ms = timestep.dropped().as_millis() as u64,
        "Simulation loop stopped"
    );
    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct Counter {
        steps: u32,
        limit: Option<u32>,
    }

    impl Steppable for Counter {
        fn step(&mut self) {
            self.steps += 1;
        }

        fn is_finished(&self) -> bool {
            self.limit.is_some_and(|limit| self.steps >= limit)
        }
    }

    #[test]
    fn loop_stops_on_shutdown() {
        let counter = tokio_test::block_on(async {
            let (tx, rx) = watch::channel(false);
            let handle = tokio::spawn(run_loop(
                Counter { steps: 0, limit: None },
                FixedTimestep::new(200, 5),
                rx,
            ));
            tokio::time::sleep(Duration::from_millis(100)).await;
            tx.send(true).expect("loop alive");
            handle.await.expect("join")
        });

        assert!(counter.steps > 0);
    }

    #[test]
    fn finished_session_ends_the_loop() {
        let counter = tokio_test::block_on(async {
            let (_tx, rx) = watch::channel(false);
            run_loop(Counter { steps: 0, limit: Some(3) }, FixedTimestep::new(200, 5), rx).await
        });

        assert!(counter.steps >= 3);
    }
}
