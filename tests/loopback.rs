//! End-to-end tests: a server session and client sessions over loopback transports

use ship_sync::config::Config;
use ship_sync::control::ControllerKind;
use ship_sync::game::{IntentSource, ScriptedIntents};
use bytes::Bytes;
use ship_sync::net::{loopback_pair, LoopbackTransport, Transport, TransportEvent};
use ship_sync::session::{ClientSession, PeerId, ServerSession, Steppable};
use ship_sync::state::AttachmentTracker;

type Server = ServerSession<LoopbackTransport, AttachmentTracker>;
type Client = ClientSession<LoopbackTransport, AttachmentTracker>;

/// Scripted steering without firing, so ships never shoot each other down
fn steering() -> Box<dyn IntentSource> {
    Box::new(ScriptedIntents {
        sweep_period: 120,
        fire_every: 0,
    })
}

fn setup(config: &Config, clients: usize) -> (Server, Vec<Client>) {
    let mut server = ServerSession::new(config, AttachmentTracker::new());
    let clients = (0..clients)
        .map(|_| {
            let (server_end, client_end) = loopback_pair();
            server.add_peer(server_end);
            ClientSession::new(config, client_end, AttachmentTracker::new(), steering())
        })
        .collect();
    (server, clients)
}

fn pump(server: &mut Server, clients: &mut [Client], steps: usize) {
    for _ in 0..steps {
        for client in clients.iter_mut() {
            client.step();
        }
        server.step();
    }
}

#[test]
fn client_gets_a_ship_and_predicts_close_to_the_authority() {
    let config = Config::default();
    let (mut server, mut clients) = setup(&config, 1);

    pump(&mut server, &mut clients, 180);

    let client = &clients[0];
    let id = client.player().expect("ship assigned");
    assert_eq!(server.peer_objects(PeerId(0)), &[id]);
    assert_eq!(client.replica().player(), Some(id));
    assert_eq!(
        client.replica().controller_kind(id),
        Some(ControllerKind::LocalPredicted)
    );

    let predicted = client.replica().object(id).expect("local ship").position;
    let authoritative = server.authority().object(id).expect("server ship").position;
    assert!(
        (predicted - authoritative).length() < 3.0,
        "prediction {predicted:?} drifted from authority {authoritative:?}"
    );
    assert!(client.stats().snapshots_applied > 0);
    assert!(client.stats().inputs_sent > 100);
    assert!(server.snapshot_stats().total_snapshots >= 59);
}

#[test]
fn clients_see_each_other_as_replicas() {
    let config = Config::default();
    let (mut server, mut clients) = setup(&config, 2);

    pump(&mut server, &mut clients, 60);

    let a = clients[0].player().expect("a");
    let b = clients[1].player().expect("b");
    assert_ne!(a, b);

    for (client, own, other) in [(&clients[0], a, b), (&clients[1], b, a)] {
        assert_eq!(client.replica().objects().len(), 2);
        assert_eq!(client.replica().controller_kind(own), Some(ControllerKind::LocalPredicted));
        assert_eq!(client.replica().controller_kind(other), Some(ControllerKind::RemoteReplica));
    }

    let mirrored = clients[0].replica().object(b).expect("replica of b").position;
    let actual = server.authority().object(b).expect("b").position;
    assert!((mirrored - actual).length() < 2.0);
}

#[test]
fn disconnected_peer_is_despawned_everywhere() {
    let config = Config::default();
    let (mut server, mut clients) = setup(&config, 2);
    pump(&mut server, &mut clients, 30);

    let leaving = clients[1].player().expect("ship");
    drop(clients.pop());
    pump(&mut server, &mut clients, 10);

    assert_eq!(server.connected_peers(), 1);
    assert!(server.authority().object(leaving).is_none());
    assert!(server.peer_objects(PeerId(1)).is_empty());
    assert!(!clients[0].replica().contains(leaving));
    assert_eq!(server.authority().assets().live(), 1);
    assert_eq!(clients[0].replica().assets().live(), 1);
}

#[test]
fn client_freezes_when_the_server_goes_away() {
    let config = Config::default();
    let (mut server, mut clients) = setup(&config, 1);
    pump(&mut server, &mut clients, 30);
    drop(server);

    let client = &mut clients[0];
    let id = client.player().expect("ship");
    client.step();
    assert!(client.is_disconnected());
    assert!(client.is_finished());

    let frozen = client.replica().object(id).expect("ship kept").position;
    for _ in 0..10 {
        client.step();
    }
    assert_eq!(client.replica().object(id).map(|o| o.position), Some(frozen));
}

#[test]
fn ping_measures_round_trip() {
    let config = Config::default();
    let (mut server, mut clients) = setup(&config, 1);

    pump(&mut server, &mut clients, config.fps as usize + 5);

    assert!(clients[0].stats().last_rtt_ms.is_some());
}

/// Loopback endpoint that loses its first outbound message
struct LosesFirstSend {
    inner: LoopbackTransport,
    lost: bool,
}

impl Transport for LosesFirstSend {
    fn send(&mut self, bytes: Bytes) {
        if !self.lost {
            self.lost = true;
            return;
        }
        self.inner.send(bytes);
    }

    fn poll(&mut self) -> Option<TransportEvent> {
        self.inner.poll()
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }
}

#[test]
fn lost_spawn_request_is_repeated() {
    let config = Config::default();
    let mut server: Server = ServerSession::new(&config, AttachmentTracker::new());
    let (server_end, client_end) = loopback_pair();
    server.add_peer(server_end);
    let mut client = ClientSession::new(
        &config,
        LosesFirstSend {
            inner: client_end,
            lost: false,
        },
        AttachmentTracker::new(),
        steering(),
    );

    for _ in 0..3 * config.fps {
        client.step();
        server.step();
    }

    let id = client.player().expect("ship assigned after retry");
    assert_eq!(server.peer_objects(PeerId(0)), &[id]);
    assert_eq!(server.authority().objects().len(), 1);
}

#[test]
fn repeated_spawn_request_returns_the_same_ship() {
    use ship_sync::net::{ClientMsg, JsonCodec, ServerMsg};

    let config = Config::default();
    let mut server: Server = ServerSession::new(&config, AttachmentTracker::new());
    let (server_end, mut raw_client) = loopback_pair();
    server.add_peer(server_end);

    for _ in 0..2 {
        raw_client.send(JsonCodec::encode(&ClientMsg::SpawnRequest).expect("encode"));
    }
    server.step();

    let mut assigned = Vec::new();
    while let Some(TransportEvent::Message(bytes)) = raw_client.poll() {
        if let Ok(ServerMsg::SpawnAssigned { id }) = JsonCodec::decode::<ServerMsg>(&bytes) {
            assigned.push(id);
        }
    }
    assert_eq!(assigned.len(), 2);
    assert_eq!(assigned[0], assigned[1]);
    assert_eq!(server.authority().objects().len(), 1);
}
