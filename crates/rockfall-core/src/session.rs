use std::collections::VecDeque;
use std::time::Duration;

use crate::apply::Applier;
use crate::collision;
use crate::config::SessionConfig;
use crate::entity::{EntityId, PeerId};
use crate::mirror;
use crate::net::messages::{
    AvatarPositionMsg, GameEndVoteMsg, GameEndedMsg, JoinMsg, JoinedMsg, LeaveMsg, Message,
    ObstaclePositionMsg, ProjectilePositionMsg, Route, StateRequestMsg,
};
use crate::net::protocol::{self, ProtocolError};
use crate::ownership::OwnershipRegistry;
use crate::sim::{AvatarInput, LocalSimulation};
use crate::termination::{Phase, TerminationCoordinator};
use crate::time;
use crate::world::{World, WorldSnapshot};

/// Fixed-rate send gate driven by tick deltas.
#[derive(Debug, Clone)]
struct Cadence {
    period: f32,
    accum: f32,
}

impl Cadence {
    fn new(rate_hz: f32) -> Self {
        let period = if rate_hz > 0.0 { 1.0 / rate_hz } else { f32::MAX };
        Self {
            period,
            accum: period,
        }
    }

    /// Advance by `dt`; true when a send is due.
    fn ready(&mut self, dt: f32) -> bool {
        self.accum += dt;
        if self.accum >= self.period {
            self.accum = (self.accum - self.period).min(self.period);
            true
        } else {
            false
        }
    }
}

/// One peer's whole game state, owned by its tick loop.
///
/// The network layer only ever calls [`enqueue`](Self::enqueue); every
/// mutation of the world happens inside [`tick`](Self::tick).
#[derive(Debug)]
pub struct PeerSession {
    config: SessionConfig,
    registry: OwnershipRegistry,
    world: World,
    sim: LocalSimulation,
    termination: TerminationCoordinator,
    inbound: VecDeque<Message>,
    /// Seconds since the session was created.
    clock: f64,
    /// Session clock at which the room started, once the relay acknowledged the join.
    started_at: Option<f64>,
    room: Option<String>,
    rejection: Option<String>,
    avatar_cadence: Cadence,
    entity_cadence: Cadence,
    vote: Option<GameEndVoteMsg>,
    results: Option<GameEndedMsg>,
}

impl PeerSession {
    pub fn new(identity: impl Into<PeerId>, config: SessionConfig) -> Self {
        let identity = identity.into();
        let mut world = World::new();
        world.ensure_avatar(&identity, &config);
        Self {
            registry: OwnershipRegistry::new(identity),
            world,
            sim: LocalSimulation::new(config.seed),
            termination: TerminationCoordinator::new(config.win_mode),
            inbound: VecDeque::new(),
            clock: 0.0,
            started_at: None,
            room: None,
            rejection: None,
            avatar_cadence: Cadence::new(config.avatar_send_rate),
            entity_cadence: Cadence::new(config.entity_send_rate),
            vote: None,
            results: None,
            config,
        }
    }

    pub fn identity(&self) -> &str {
        self.registry.local_peer()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn registry(&self) -> &OwnershipRegistry {
        &self.registry
    }

    pub fn phase(&self) -> Phase {
        self.termination.phase()
    }

    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    /// Whether the relay has acknowledged the join.
    pub fn is_joined(&self) -> bool {
        self.started_at.is_some()
    }

    /// The relay's reason for refusing the join, if it did.
    pub fn rejection(&self) -> Option<&str> {
        self.rejection.as_deref()
    }

    /// Stats carried by this peer's end-of-game vote, once it voted.
    pub fn final_stats(&self) -> Option<&GameEndVoteMsg> {
        self.vote.as_ref()
    }

    /// The relay's settlement, once the game has ended.
    pub fn results(&self) -> Option<&GameEndedMsg> {
        self.results.as_ref()
    }

    pub fn join_message(&self, room: impl Into<String>, token: impl Into<String>) -> Message {
        Message::Join(JoinMsg {
            room: room.into(),
            identity: self.identity().to_string(),
            token: token.into(),
        })
    }

    pub fn leave_message(&self) -> Message {
        Message::Leave(LeaveMsg {})
    }

    /// Queue an inbound message for the next tick.
    pub fn enqueue(&mut self, msg: Message) {
        self.inbound.push_back(msg);
    }

    /// Decode and queue an inbound frame. Malformed frames are dropped.
    pub fn enqueue_frame(&mut self, data: &[u8]) -> Result<(), ProtocolError> {
        let msg = protocol::decode_message(data)?;
        self.enqueue(msg);
        Ok(())
    }

    /// Time since the room's start acknowledgment.
    pub fn elapsed(&self) -> Option<Duration> {
        self.started_at
            .map(|start| Duration::from_secs_f64((self.clock - start).max(0.0)))
    }

    /// Merged view for rendering.
    pub fn snapshot(&self) -> WorldSnapshot {
        let elapsed = self
            .started_at
            .map_or(self.clock, |start| self.clock - start);
        self.world
            .snapshot(&self.registry, self.phase(), elapsed.max(0.0))
    }

    /// Run one tick and return the messages to send, in order.
    pub fn tick(&mut self, dt: f32, input: &AvatarInput) -> Vec<Message> {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.clock += f64::from(dt);
        let mut out = Vec::new();

        self.drain_inbound(&mut out);
        if !self.is_joined() || self.phase() == Phase::Finished {
            return out;
        }

        self.sim.step(
            dt,
            self.clock,
            input,
            &self.config,
            &mut self.registry,
            &mut self.world,
            &mut out,
        );
        mirror::extrapolate(dt, &self.config, &self.registry, &mut self.world);
        collision::resolve(&self.config, &mut self.registry, &mut self.world, &mut out);
        self.evaluate_termination(&mut out);
        self.emit_positions(dt, &mut out);
        out
    }

    fn drain_inbound(&mut self, out: &mut Vec<Message>) {
        while let Some(msg) = self.inbound.pop_front() {
            if self.phase() == Phase::Finished {
                self.inbound.clear();
                break;
            }
            match msg.route() {
                Route::FromRelay => self.handle_relay(msg, out),
                Route::Gossip => {
                    if !self.is_joined() {
                        continue;
                    }
                    Applier {
                        config: &self.config,
                        registry: &mut self.registry,
                        world: &mut self.world,
                    }
                    .apply(&msg, out);
                },
                Route::ToRelay => {
                    tracing::debug!(msg_type = ?msg.message_type(), "Dropping relay-bound message");
                },
            }
        }
    }

    fn handle_relay(&mut self, msg: Message, out: &mut Vec<Message>) {
        match msg {
            Message::Joined(m) => self.on_joined(m, out),
            Message::JoinRejected(m) => {
                tracing::warn!(reason = %m.reason, "Join rejected by relay");
                self.rejection = Some(m.reason);
            },
            Message::PlayerJoined(m) => {
                tracing::info!(peer = %m.identity, players = m.roster.len(), "Player joined");
                for identity in &m.roster {
                    self.world.ensure_avatar(identity, &self.config).connected = true;
                }
            },
            Message::PlayerLeft(m) => {
                tracing::info!(peer = %m.identity, players = m.roster.len(), "Player left");
                if let Some(avatar) = self.world.avatar_mut(&m.identity) {
                    avatar.connected = false;
                }
            },
            Message::GameEnded(m) => {
                tracing::info!(
                    reason = %m.reason,
                    winner = ?m.winner,
                    "Game ended"
                );
                self.termination.finish(m.reason);
                self.results = Some(m);
            },
            other => {
                tracing::debug!(msg_type = ?other.message_type(), "Unexpected relay message");
            },
        }
    }

    fn on_joined(&mut self, m: JoinedMsg, out: &mut Vec<Message>) {
        if self.is_joined() {
            return;
        }
        tracing::info!(
            room = %m.room,
            players = m.roster.len(),
            elapsed_ms = m.elapsed_ms,
            "Joined room"
        );
        self.started_at = Some(self.clock - m.elapsed_ms as f64 / 1000.0);
        for identity in &m.roster {
            self.world.ensure_avatar(identity, &self.config);
        }
        if m.roster.iter().any(|p| p != self.identity()) {
            out.push(Message::StateRequest(StateRequestMsg {
                identity: self.identity().to_string(),
            }));
        }
        self.room = Some(m.room);
    }

    fn evaluate_termination(&mut self, out: &mut Vec<Message>) {
        let elapsed = self.elapsed();
        let Some(reason) = self
            .termination
            .evaluate(self.world.avatars.values(), elapsed)
        else {
            return;
        };
        let identity = self.identity().to_string();
        let (score, hp, alive) = self
            .world
            .avatar(&identity)
            .map_or((0, 0, false), |a| (a.score, a.hp, a.alive));
        let vote = GameEndVoteMsg {
            identity,
            reason,
            score,
            hp,
            alive,
            timestamp_ms: time::unix_millis(),
        };
        out.push(Message::GameEndVote(vote.clone()));
        self.vote = Some(vote);
    }

    fn emit_positions(&mut self, dt: f32, out: &mut Vec<Message>) {
        if self.avatar_cadence.ready(dt)
            && let Some(avatar) = self.world.avatar(self.registry.local_peer())
            && avatar.alive
        {
            out.push(Message::AvatarPosition(AvatarPositionMsg {
                identity: avatar.identity.clone(),
                x: avatar.x,
                y: avatar.y,
            }));
        }
        if self.entity_cadence.ready(dt) {
            let owned = |id: &EntityId| self.registry.is_owned(id);
            for obstacle in self.world.obstacles.values().filter(|o| owned(&o.id)) {
                out.push(Message::ObstaclePosition(ObstaclePositionMsg {
                    id: obstacle.id.clone(),
                    x: obstacle.x,
                    y: obstacle.y,
                }));
            }
            for projectile in self.world.projectiles.values().filter(|p| owned(&p.id)) {
                out.push(Message::ProjectilePosition(ProjectilePositionMsg {
                    id: projectile.id.clone(),
                    x: projectile.x,
                    y: projectile.y,
                }));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::DestroyReason;
    use crate::config::WinMode;
    use crate::entity::{Obstacle, SizeClass};
    use crate::net::messages::{
        FinalStanding, JoinRejectedMsg, ObstacleSpawnMsg, PlayerLeftMsg, ScoreReason,
        ScoreUpdateMsg,
    };
    use crate::termination::EndReason;
    use crate::test_helpers::quiet_config;

    fn joined(identity: &str, roster: &[&str], config: SessionConfig) -> (PeerSession, Vec<Message>) {
        let mut session = PeerSession::new(identity, config);
        session.enqueue(Message::Joined(JoinedMsg {
            room: "ROOM".to_string(),
            identity: identity.to_string(),
            roster: roster.iter().map(|s| s.to_string()).collect(),
            elapsed_ms: 0,
        }));
        let out = session.tick(0.0, &AvatarInput::default());
        (session, out)
    }

    #[test]
    fn nothing_simulates_before_join() {
        let mut session = PeerSession::new("alice", SessionConfig::default());
        let out = session.tick(5.0, &AvatarInput { fire: true, ..Default::default() });
        assert!(out.is_empty());
        assert!(session.world().obstacles.is_empty());
    }

    #[test]
    fn join_requests_state_from_existing_peers() {
        let (session, out) = joined("alice", &["bob", "alice"], quiet_config());
        assert_eq!(session.room(), Some("ROOM"));
        assert!(session.world().avatar("bob").is_some());
        assert!(matches!(out.as_slice(), [Message::StateRequest(r)] if r.identity == "alice"));
    }

    #[test]
    fn first_in_room_does_not_request_state() {
        let (_, out) = joined("alice", &["alice"], quiet_config());
        assert!(out.iter().all(|m| !matches!(m, Message::StateRequest(_))));
    }

    #[test]
    fn rejection_is_recorded() {
        let mut session = PeerSession::new("alice", quiet_config());
        session.enqueue(Message::JoinRejected(JoinRejectedMsg {
            reason: "identity already in room".to_string(),
        }));
        session.tick(0.0, &AvatarInput::default());
        assert_eq!(session.rejection(), Some("identity already in room"));
        assert!(!session.is_joined());
    }

    #[test]
    fn malformed_frames_are_dropped() {
        let mut session = PeerSession::new("alice", quiet_config());
        assert!(session.enqueue_frame(&[]).is_err());
        assert!(session.enqueue_frame(&[0xEE, 1, 2]).is_err());
        assert!(session.enqueue_frame(&[0x21, 0xC1]).is_err());
        assert!(session.inbound.is_empty());
    }

    #[test]
    fn avatar_position_cadence() {
        let (mut session, _) = joined("alice", &["alice"], quiet_config());
        let mut sent = 0;
        for _ in 0..60 {
            let out = session.tick(1.0 / 60.0, &AvatarInput::default());
            sent += out
                .iter()
                .filter(|m| matches!(m, Message::AvatarPosition(_)))
                .count();
        }
        assert!((19..=21).contains(&sent), "sent {sent}");
    }

    #[test]
    fn dead_avatar_stops_broadcasting_position() {
        let (mut session, _) = joined("alice", &["alice", "bob"], quiet_config());
        session.world.avatar_mut("alice").unwrap().alive = false;
        for _ in 0..30 {
            let out = session.tick(1.0 / 60.0, &AvatarInput::default());
            assert!(out.iter().all(|m| !matches!(m, Message::AvatarPosition(_))));
        }
    }

    #[test]
    fn owned_entity_positions_are_sent_at_entity_rate() {
        let (mut session, _) = joined("alice", &["alice"], quiet_config());
        let mut sent = 0;
        for i in 0..60 {
            let input = AvatarInput {
                fire: i == 0,
                ..Default::default()
            };
            let out = session.tick(1.0 / 60.0, &input);
            sent += out
                .iter()
                .filter(|m| matches!(m, Message::ProjectilePosition(_)))
                .count();
        }
        assert!((9..=11).contains(&sent), "sent {sent}");
    }

    #[test]
    fn votes_once_and_waits_for_relay() {
        let config = SessionConfig {
            win_mode: WinMode::Score(10),
            ..quiet_config()
        };
        let (mut session, _) = joined("alice", &["alice", "bob"], config);
        session.enqueue(Message::ScoreUpdate(ScoreUpdateMsg {
            identity: "bob".to_string(),
            score: 10,
            reason: ScoreReason::ObstacleDestroyed(SizeClass::Large),
        }));
        let out = session.tick(0.016, &AvatarInput::default());
        let votes: Vec<_> = out
            .iter()
            .filter_map(|m| match m {
                Message::GameEndVote(v) => Some(v),
                _ => None,
            })
            .collect();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].reason, EndReason::ScoreTargetReached);
        assert_eq!(votes[0].identity, "alice");
        assert_eq!(session.phase(), Phase::Voted);
        assert_eq!(session.final_stats(), Some(votes[0]));

        for _ in 0..10 {
            let out = session.tick(0.016, &AvatarInput::default());
            assert!(out.iter().all(|m| !matches!(m, Message::GameEndVote(_))));
        }
        assert_eq!(session.phase(), Phase::Voted);

        session.enqueue(Message::GameEnded(GameEndedMsg {
            reason: EndReason::ScoreTargetReached,
            standings: vec![FinalStanding {
                identity: "bob".to_string(),
                score: 10,
                hp: 3,
                alive: true,
            }],
            winner: Some("bob".to_string()),
        }));
        session.tick(0.016, &AvatarInput::default());
        assert_eq!(session.phase(), Phase::Finished);
        assert_eq!(session.results().unwrap().winner.as_deref(), Some("bob"));
        assert!(session.tick(0.016, &AvatarInput { fire: true, ..Default::default() }).is_empty());
    }

    #[test]
    fn time_limit_counts_from_room_start() {
        let config = SessionConfig {
            win_mode: WinMode::TimeLimit(Duration::from_secs(60)),
            ..quiet_config()
        };
        let mut session = PeerSession::new("alice", config);
        session.enqueue(Message::Joined(JoinedMsg {
            room: "ROOM".to_string(),
            identity: "alice".to_string(),
            roster: vec!["alice".to_string()],
            elapsed_ms: 59_500,
        }));
        let out = session.tick(0.0, &AvatarInput::default());
        assert!(out.iter().all(|m| !matches!(m, Message::GameEndVote(_))));
        let out = session.tick(0.6, &AvatarInput::default());
        assert!(matches!(
            out.iter().find(|m| matches!(m, Message::GameEndVote(_))),
            Some(Message::GameEndVote(v)) if v.reason == EndReason::TimeLimitReached
        ));
    }

    #[test]
    fn departed_peer_does_not_block_all_dead() {
        let (mut session, _) = joined("alice", &["alice", "bob"], quiet_config());
        session.enqueue(Message::PlayerLeft(PlayerLeftMsg {
            identity: "bob".to_string(),
            roster: vec!["alice".to_string()],
        }));
        session.world.avatar_mut("alice").unwrap().alive = false;
        let out = session.tick(0.016, &AvatarInput::default());
        assert!(out.iter().any(
            |m| matches!(m, Message::GameEndVote(v) if v.reason == EndReason::AllPlayersDead)
        ));
    }

    #[test]
    fn gossip_from_strangers_does_not_block_all_dead() {
        let (mut session, _) = joined("alice", &["alice"], quiet_config());
        session.enqueue(Message::ScoreUpdate(ScoreUpdateMsg {
            identity: "ghost".to_string(),
            score: 5,
            reason: ScoreReason::ObstacleDestroyed(SizeClass::Small),
        }));
        session.tick(0.016, &AvatarInput::default());
        assert!(session.world().avatar("ghost").is_none());

        session.world.avatar_mut("alice").unwrap().alive = false;
        let out = session.tick(0.016, &AvatarInput::default());
        assert!(out.iter().any(
            |m| matches!(m, Message::GameEndVote(v) if v.reason == EndReason::AllPlayersDead)
        ));
    }

    #[test]
    fn mirrors_are_extrapolated_between_updates() {
        let (mut session, _) = joined("alice", &["alice", "bob"], quiet_config());
        let id = EntityId::new("bob", 1);
        session.enqueue(Message::ObstacleSpawn(ObstacleSpawnMsg::from_obstacle(&Obstacle {
            id: id.clone(),
            x: 50.0,
            y: 0.0,
            vy: 100.0,
            radius: 16.0,
            hp: 1,
            size: SizeClass::Small,
        })));
        session.tick(0.5, &AvatarInput::default());
        assert_eq!(session.world().obstacles[&id].y, 50.0);
    }

    #[test]
    fn snapshot_reports_phase_and_ownership() {
        let (mut session, _) = joined("alice", &["alice"], quiet_config());
        session.tick(0.1, &AvatarInput { fire: true, ..Default::default() });
        let snap = session.snapshot();
        assert_eq!(snap.phase, Phase::Playing);
        assert_eq!(snap.avatars.len(), 1);
        assert!(snap.projectiles.iter().all(|p| p.owned));
        assert_eq!(snap.projectiles.len(), 1);
        assert!((snap.elapsed_secs - 0.1).abs() < 1e-6);
    }

    #[test]
    fn finished_session_ignores_late_gossip() {
        let (mut session, _) = joined("alice", &["alice", "bob"], quiet_config());
        session.enqueue(Message::GameEnded(GameEndedMsg {
            reason: EndReason::AllPlayersDead,
            standings: vec![],
            winner: None,
        }));
        session.enqueue(Message::ObstacleDestroyed(crate::net::messages::ObstacleDestroyedMsg {
            id: EntityId::new("bob", 1),
            reason: DestroyReason::Bullet,
        }));
        session.tick(0.016, &AvatarInput::default());
        assert!(!session.world().is_retired(&EntityId::new("bob", 1)));
    }
}
