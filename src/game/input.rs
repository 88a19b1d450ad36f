//! Control intents, input frames and the client-side input gatherer

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A single control intent sampled from the local input devices
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Intent {
    /// Yaw stick position (-1.0 = full left, 1.0 = full right)
    Yaw(f32),
    /// Pitch stick position (-1.0 = nose down, 1.0 = nose up)
    Pitch(f32),
    /// Roll direction (-1.0, 0.0 or 1.0)
    Roll(f32),
    /// Trigger held this tick
    Fire,
}

/// Control intents for one tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputFrame {
    pub tick: u64,
    pub intents: Vec<Intent>,
}

impl InputFrame {
    pub fn new(tick: u64, intents: Vec<Intent>) -> Self {
        Self { tick, intents }
    }

    /// True if every axis value in the frame is a finite number
    pub fn is_valid(&self) -> bool {
        self.intents.iter().all(|intent| match intent {
            Intent::Yaw(v) | Intent::Pitch(v) | Intent::Roll(v) => v.is_finite(),
            Intent::Fire => true,
        })
    }
}

/// Folded control state applied by the physics system
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControlState {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
    pub fire: bool,
}

impl ControlState {
    /// Fold a list of intents; later intents for the same axis win
    pub fn from_intents(intents: &[Intent]) -> Self {
        let mut state = Self::default();
        for intent in intents {
            match *intent {
                Intent::Yaw(v) => state.yaw = v.clamp(-1.0, 1.0),
                Intent::Pitch(v) => state.pitch = v.clamp(-1.0, 1.0),
                Intent::Roll(v) => state.roll = v.clamp(-1.0, 1.0),
                Intent::Fire => state.fire = true,
            }
        }
        state
    }
}

/// Source of local control intents, sampled once per simulation step
pub trait IntentSource: Send {
    fn sample(&mut self, tick: u64) -> Vec<Intent>;
}

/// Deterministic intent source used by the demo and tests
#[derive(Debug, Clone)]
pub struct ScriptedIntents {
    /// Ticks per full yaw sweep
    pub sweep_period: u64,
    /// Fire on every n-th tick (0 = never)
    pub fire_every: u64,
}

impl Default for ScriptedIntents {
    fn default() -> Self {
        Self {
            sweep_period: 240,
            fire_every: 20,
        }
    }
}

impl IntentSource for ScriptedIntents {
    fn sample(&mut self, tick: u64) -> Vec<Intent> {
        let phase = (tick % self.sweep_period.max(1)) as f32 / self.sweep_period.max(1) as f32;
        let mut intents = vec![
            Intent::Yaw((phase * std::f32::consts::TAU).sin()),
            Intent::Pitch(0.25 * (phase * std::f32::consts::TAU).cos()),
        ];
        if self.fire_every > 0 && tick % self.fire_every == 0 {
            intents.push(Intent::Fire);
        }
        intents
    }
}

/// Accumulates one input frame per step and flushes them in batches.
///
/// Frames are emitted in tick order and at most once. While the transport
/// is unavailable frames stay buffered up to `capacity`, after which the
/// oldest are dropped.
#[derive(Debug)]
pub struct InputGatherer {
    period_frames: u32,
    capacity: usize,
    buffer: VecDeque<InputFrame>,
    frames_since_flush: u32,
    last_tick: Option<u64>,
    dropped: u64,
}

impl InputGatherer {
    pub fn new(period_frames: u32, capacity: usize) -> Self {
        Self {
            period_frames: period_frames.max(1),
            capacity: capacity.max(1),
            buffer: VecDeque::new(),
            frames_since_flush: 0,
            last_tick: None,
            dropped: 0,
        }
    }

    /// Record the intents for `tick`. Returns a batch when one is due and
    /// the transport can take it.
    pub fn gather(
        &mut self,
        tick: u64,
        intents: Vec<Intent>,
        transport_available: bool,
    ) -> Option<Vec<InputFrame>> {
        if self.last_tick.is_some_and(|last| tick <= last) {
            debug!(tick, "Ignoring input frame that is not newer than the last one");
            return None;
        }
        self.last_tick = Some(tick);

        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
            self.dropped += 1;
            if self.dropped % 60 == 1 {
                warn!(dropped = self.dropped, "Input buffer full, dropping oldest frames");
            }
        }
        self.buffer.push_back(InputFrame::new(tick, intents));

        self.frames_since_flush += 1;
        if self.frames_since_flush >= self.period_frames && transport_available {
            self.frames_since_flush = 0;
            return Some(self.buffer.drain(..).collect());
        }
        None
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
