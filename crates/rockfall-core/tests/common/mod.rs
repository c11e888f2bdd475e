use rockfall_core::net::messages::{JoinedMsg, Message, Route};
use rockfall_core::net::protocol::encode_message;
use rockfall_core::{AvatarInput, PeerSession, SessionConfig};

pub const DT: f32 = 1.0 / 60.0;

/// A config whose owner drops one stationary obstacle straight above the
/// avatars' start column.
pub fn dropper_config(large: bool, spawn_y: f32, speed: f32) -> SessionConfig {
    SessionConfig {
        spawn_interval: 0.1,
        max_owned_obstacles: 1,
        spawn_margin: 239.5,
        spawn_y,
        obstacle_min_speed: speed,
        obstacle_max_speed: speed,
        large_probability: if large { 1.0 } else { 0.0 },
        seed: Some(5),
        ..SessionConfig::default()
    }
}

/// Peers in one room, with gossip routed between them in memory the way the
/// relay would: encoded once, delivered to everyone but the sender.
pub struct Room {
    pub peers: Vec<PeerSession>,
    /// Relay-bound messages with the sender's identity.
    pub to_relay: Vec<(String, Message)>,
}

impl Room {
    pub fn new(members: Vec<(&str, SessionConfig)>) -> Self {
        let roster: Vec<String> = members.iter().map(|(n, _)| n.to_string()).collect();
        let mut room = Self {
            peers: Vec::new(),
            to_relay: Vec::new(),
        };
        for (name, config) in members {
            let mut session = PeerSession::new(name, config);
            session.enqueue(Message::Joined(JoinedMsg {
                room: "SCENARIO".to_string(),
                identity: name.to_string(),
                roster: roster.clone(),
                elapsed_ms: 0,
            }));
            room.peers.push(session);
        }
        room
    }

    pub fn index(&self, name: &str) -> usize {
        self.peers
            .iter()
            .position(|p| p.identity() == name)
            .unwrap()
    }

    pub fn peer(&self, name: &str) -> &PeerSession {
        &self.peers[self.index(name)]
    }

    /// Forward `msgs` from `from` to every other peer.
    pub fn deliver(&mut self, from: usize, msgs: &[Message]) {
        let sender = self.peers[from].identity().to_string();
        for msg in msgs {
            if msg.route() != Route::Gossip {
                self.to_relay.push((sender.clone(), msg.clone()));
                continue;
            }
            let frame = encode_message(msg).unwrap();
            for (i, peer) in self.peers.iter_mut().enumerate() {
                if i != from {
                    peer.enqueue_frame(&frame).unwrap();
                }
            }
        }
    }

    /// Tick every peer once; `input` picks each peer's input by identity.
    pub fn tick_with(&mut self, dt: f32, input: impl Fn(&str) -> AvatarInput) -> Vec<Message> {
        let mut all = Vec::new();
        for i in 0..self.peers.len() {
            let input = input(self.peers[i].identity());
            let out = self.peers[i].tick(dt, &input);
            self.deliver(i, &out);
            all.extend(out);
        }
        all
    }

    pub fn tick(&mut self, dt: f32) -> Vec<Message> {
        self.tick_with(dt, |_| AvatarInput::default())
    }

    /// Zero-length ticks so every in-flight message is applied.
    pub fn settle(&mut self) {
        for _ in 0..3 {
            self.tick(0.0);
        }
    }

    pub fn votes_from(&self, name: &str) -> usize {
        self.to_relay
            .iter()
            .filter(|(who, m)| who == name && matches!(m, Message::GameEndVote(_)))
            .count()
    }
}

pub fn fire() -> AvatarInput {
    AvatarInput {
        fire: true,
        ..AvatarInput::default()
    }
}
