//! Server session: the authority plus one transport per connected peer

use std::fmt;

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::game::{ObjectId, SnapshotStats};
use crate::net::{ClientMsg, JsonCodec, ServerMsg, Transport, TransportEvent};
use crate::state::{AssetManager, AuthoritativeStateManager, StateError};
use crate::util::rate_limit::PeerRateLimiter;

use super::Steppable;

/// Index of a peer within its server session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub usize);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

struct Peer<T> {
    transport: T,
    limiter: PeerRateLimiter,
    /// Objects spawned for this peer and still alive
    objects: Vec<ObjectId>,
    connected: bool,
}

pub struct ServerSession<T: Transport, A: AssetManager> {
    authority: AuthoritativeStateManager<A>,
    peers: Vec<Peer<T>>,
    delta: f32,
    snapshot_stats: SnapshotStats,
    hits: u64,
    kills: u64,
}

impl<T: Transport, A: AssetManager> ServerSession<T, A> {
    pub fn new(config: &Config, assets: A) -> Self {
        Self {
            authority: AuthoritativeStateManager::with_default_types(config, assets),
            peers: Vec::new(),
            delta: config.timestep_secs(),
            snapshot_stats: SnapshotStats::default(),
            hits: 0,
            kills: 0,
        }
    }

    pub fn add_peer(&mut self, transport: T) -> PeerId {
        let id = PeerId(self.peers.len());
        self.peers.push(Peer {
            transport,
            limiter: PeerRateLimiter::new(),
            objects: Vec::new(),
            connected: true,
        });
        info!(peer = %id, "Peer connected");
        id
    }

    pub fn authority(&self) -> &AuthoritativeStateManager<A> {
        &self.authority
    }

    pub fn authority_mut(&mut self) -> &mut AuthoritativeStateManager<A> {
        &mut self.authority
    }

    pub fn connected_peers(&self) -> usize {
        self.peers.iter().filter(|peer| peer.connected).count()
    }

    pub fn peer_objects(&self, peer: PeerId) -> &[ObjectId] {
        self.peers
            .get(peer.0)
            .map(|p| p.objects.as_slice())
            .unwrap_or_default()
    }

    pub fn snapshot_stats(&self) -> &SnapshotStats {
        &self.snapshot_stats
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn kills(&self) -> u64 {
        self.kills
    }

    fn send_to(peer: &mut Peer<T>, msg: &ServerMsg) {
        match JsonCodec::encode(msg) {
            Ok(bytes) => peer.transport.send(bytes),
            Err(e) => warn!(error = %e, "Failed to encode server message"),
        }
    }

    /// Drain every peer's inbound queue
    fn process_inputs(&mut self) {
        for index in 0..self.peers.len() {
            let peer_id = PeerId(index);
            let peer = &mut self.peers[index];
            if !peer.connected {
                continue;
            }

            while let Some(event) = peer.transport.poll() {
                match event {
                    TransportEvent::Message(bytes) => match JsonCodec::decode::<ClientMsg>(&bytes) {
                        Ok(msg) => Self::handle_message(&mut self.authority, peer_id, peer, msg),
                        Err(e) => {
                            warn!(peer = %peer_id, error = %e, "Failed to parse client message");
                            Self::send_to(peer, &ServerMsg::error("bad_message", e.to_string()));
                        }
                    },
                    TransportEvent::Disconnected => {
                        peer.connected = false;
                        info!(peer = %peer_id, objects = peer.objects.len(), "Peer disconnected");
                        for id in peer.objects.drain(..) {
                            match self.authority.destroy(id) {
                                Ok(()) | Err(StateError::UnknownId(_)) => {}
                                Err(e) => warn!(object_id = %id, error = %e, "Failed to despawn"),
                            }
                        }
                        break;
                    }
                }
            }
        }
    }

    fn handle_message(
        authority: &mut AuthoritativeStateManager<A>,
        peer_id: PeerId,
        peer: &mut Peer<T>,
        msg: ClientMsg,
    ) {
        match msg {
            ClientMsg::SpawnRequest => {
                if !peer.limiter.check_spawn() {
                    warn!(peer = %peer_id, "Rate limited spawn request");
                    Self::send_to(peer, &ServerMsg::error("rate_limited", "too many spawn requests"));
                    return;
                }
                if let Some(&id) = peer.objects.first() {
                    debug!(peer = %peer_id, object_id = %id, "Repeated spawn request, resending assignment");
                    Self::send_to(peer, &ServerMsg::SpawnAssigned { id });
                    return;
                }
                match authority.spawn() {
                    Ok(id) => {
                        peer.objects.push(id);
                        Self::send_to(peer, &ServerMsg::SpawnAssigned { id });
                    }
                    Err(e) => {
                        warn!(peer = %peer_id, error = %e, "Spawn failed");
                        Self::send_to(peer, &ServerMsg::error("spawn_failed", e.to_string()));
                    }
                }
            }
            ClientMsg::Input { object_id, frames } => {
                if !peer.objects.contains(&object_id) {
                    debug!(peer = %peer_id, object_id = %object_id, "Input for an object the peer does not own");
                    return;
                }
                if let Err(e) = authority.receive_input(object_id, frames) {
                    debug!(peer = %peer_id, error = %e, "Dropping input");
                }
            }
            ClientMsg::Ping { value } => {
                if peer.limiter.check_ping() {
                    Self::send_to(peer, &ServerMsg::Pong { value });
                } else {
                    debug!(peer = %peer_id, "Rate limited ping");
                }
            }
        }
    }
}

impl<T: Transport, A: AssetManager> Steppable for ServerSession<T, A> {
    fn step(&mut self) {
        self.process_inputs();

        let report = self.authority.step(self.delta);
        if report.failures > 0 {
            debug!(tick = report.tick, failures = report.failures, "Objects skipped this tick");
        }
        self.hits += report.hits.len() as u64;
        self.kills += report.destroyed.len() as u64;
        for destroyed in &report.destroyed {
            for peer in &mut self.peers {
                peer.objects.retain(|id| id != destroyed);
            }
        }

        let Some(snapshot) = report.snapshot else {
            return;
        };
        let object_count = snapshot.objects.len();
        let bytes = match JsonCodec::encode(&ServerMsg::Snapshot(snapshot)) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(tick = report.tick, error = %e, "Failed to encode snapshot");
                return;
            }
        };
        self.snapshot_stats.record(object_count, bytes.len());
        for peer in self.peers.iter_mut().filter(|peer| peer.connected) {
            peer.transport.send(bytes.clone());
        }
    }
}
