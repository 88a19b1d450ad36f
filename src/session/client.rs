//! Client session: one player's replica, input pipeline and transport

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::control::{ControllerFactory, ControllerKey};
use crate::game::{InputFrame, InputGatherer, IntentSource, ObjectId};
use crate::net::{ClientMsg, JsonCodec, ServerMsg, Transport, TransportEvent};
use crate::state::{AssetManager, ReplicaStateManager, SnapshotOutcome, StateError};
use crate::util::time::unix_millis;

use super::Steppable;

/// Client-side counters
#[derive(Debug, Clone, Default)]
pub struct ClientStats {
    pub snapshots_applied: u64,
    pub stale_snapshots: u64,
    pub inputs_sent: u64,
    pub local_hits: u64,
    pub decode_errors: u64,
    /// Round trip measured by the last pong
    pub last_rtt_ms: Option<u64>,
}

pub struct ClientSession<T: Transport, A: AssetManager> {
    transport: T,
    replica: ReplicaStateManager<A>,
    gatherer: InputGatherer,
    intents: Box<dyn IntentSource>,
    player_factory: ControllerFactory,
    player: Option<ObjectId>,
    tick: u64,
    delta: f32,
    ping_every: u64,
    /// Tick of the last spawn request still waiting for an assignment
    spawn_requested_at: Option<u64>,
    spawn_assigned: bool,
    disconnected: bool,
    stats: ClientStats,
}

impl<T: Transport, A: AssetManager> ClientSession<T, A> {
    pub fn new(config: &Config, transport: T, assets: A, intents: Box<dyn IntentSource>) -> Self {
        let replica = ReplicaStateManager::with_default_types(config, assets);
        let player_factory = replica.registry().create_factory(ControllerKey::PlayerShip);
        Self {
            transport,
            replica,
            gatherer: InputGatherer::new(
                config.input_gathering_period_frames,
                config.input_buffer_capacity,
            ),
            intents,
            player_factory,
            player: None,
            tick: 0,
            delta: config.timestep_secs(),
            ping_every: u64::from(config.fps),
            spawn_requested_at: None,
            spawn_assigned: false,
            disconnected: false,
            stats: ClientStats::default(),
        }
    }

    pub fn replica(&self) -> &ReplicaStateManager<A> {
        &self.replica
    }

    pub fn player(&self) -> Option<ObjectId> {
        self.player
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    fn send(&mut self, msg: &ClientMsg) {
        match JsonCodec::encode(msg) {
            Ok(bytes) => self.transport.send(bytes),
            Err(e) => warn!(error = %e, "Failed to encode client message"),
        }
    }

    /// Drain everything the server sent since the last step
    fn process_messages(&mut self) {
        while let Some(event) = self.transport.poll() {
            match event {
                TransportEvent::Message(bytes) => match JsonCodec::decode::<ServerMsg>(&bytes) {
                    Ok(msg) => self.handle_message(msg),
                    Err(e) => {
                        self.stats.decode_errors += 1;
                        warn!(error = %e, "Failed to parse server message");
                    }
                },
                TransportEvent::Disconnected => {
                    if self.replica.disconnect().is_some() {
                        info!(tick = self.tick, "Disconnected from server");
                    }
                    self.disconnected = true;
                }
            }
        }
    }

    fn handle_message(&mut self, msg: ServerMsg) {
        match msg {
            ServerMsg::SpawnAssigned { id } => {
                self.spawn_assigned = true;
                if let Err(e) = self.adopt_player(id) {
                    warn!(object_id = %id, error = %e, "Failed to take control of assigned ship");
                }
            }
            ServerMsg::Snapshot(snapshot) => match self.replica.apply_snapshot(&snapshot) {
                SnapshotOutcome::Applied { .. } => self.stats.snapshots_applied += 1,
                SnapshotOutcome::Stale => self.stats.stale_snapshots += 1,
                SnapshotOutcome::Ignored => {}
            },
            ServerMsg::Pong { value } => {
                let rtt = unix_millis().saturating_sub(value);
                self.stats.last_rtt_ms = Some(rtt);
                debug!(rtt_ms = rtt, "Pong");
            }
            ServerMsg::Error { code, message } => {
                warn!(code = %code, message = %message, "Server error");
            }
        }
    }

    /// Bind the player controller to the assigned ship, creating it if the
    /// ship has not been seen in a snapshot yet
    fn adopt_player(&mut self, id: ObjectId) -> Result<(), StateError> {
        if self.player == Some(id) {
            return Ok(());
        }
        if self.replica.contains(id) {
            self.replica.rebind_controller(id, self.player_factory)?;
        } else {
            self.replica.create_object_controller(id, self.player_factory)?;
        }
        self.replica.specify_player_controller_and_controlled_object(id)?;
        self.player = Some(id);
        info!(object_id = %id, "Controlling ship");
        Ok(())
    }

    /// Ask for a ship, repeating once per second until the server answers
    fn request_spawn(&mut self) {
        if self.disconnected || self.spawn_assigned {
            return;
        }
        let due = self
            .spawn_requested_at
            .map_or(true, |at| self.tick.saturating_sub(at) >= self.ping_every.max(1));
        if !due {
            return;
        }
        if self.spawn_requested_at.is_some() {
            debug!(tick = self.tick, "No ship assigned yet, repeating spawn request");
        }
        self.send(&ClientMsg::SpawnRequest);
        self.spawn_requested_at = Some(self.tick);
    }

    /// Sample local intents, batch them for the server and return this tick's frame
    fn gather_input(&mut self) -> Option<InputFrame> {
        let player = self.player.filter(|id| self.replica.contains(*id))?;
        let intents = self.intents.sample(self.tick);
        let frame = InputFrame::new(self.tick, intents.clone());

        let available = self.transport.is_connected();
        if let Some(frames) = self.gatherer.gather(self.tick, intents, available) {
            self.stats.inputs_sent += frames.len() as u64;
            self.send(&ClientMsg::Input {
                object_id: player,
                frames,
            });
        }
        Some(frame)
    }
}

impl<T: Transport, A: AssetManager> Steppable for ClientSession<T, A> {
    fn step(&mut self) {
        self.process_messages();

        self.request_spawn();

        self.tick += 1;
        let frame = if self.disconnected {
            None
        } else {
            self.gather_input()
        };
        let report = self.replica.step(self.tick, self.delta, frame);
        self.stats.local_hits += report.hits.len() as u64;

        if !self.disconnected && self.tick % self.ping_every.max(1) == 0 {
            self.send(&ClientMsg::Ping {
                value: unix_millis(),
            });
        }
    }

    fn is_finished(&self) -> bool {
        self.disconnected
    }
}
