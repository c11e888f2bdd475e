use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tokio::time::Instant;

use rockfall_core::entity::PeerId;
use rockfall_core::net::messages::{
    FinalStanding, GameEndVoteMsg, GameEndedMsg, JoinedMsg, Message, PlayerJoinedMsg,
    PlayerLeftMsg,
};
use rockfall_core::net::protocol::encode_message;
use rockfall_core::termination::EndReason;

use crate::error::RelayError;

/// A joined connection in a relay room.
struct RelayMember {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    vote: Option<GameEndVoteMsg>,
}

/// A relay room: members keyed by identity, plus the game clock.
struct RelayRoom {
    members: BTreeMap<PeerId, RelayMember>,
    /// Set by the first join of a game, cleared when the game settles.
    started_at: Option<Instant>,
}

impl RelayRoom {
    fn new() -> Self {
        Self {
            members: BTreeMap::new(),
            started_at: None,
        }
    }

    fn roster(&self) -> Vec<PeerId> {
        self.members.keys().cloned().collect()
    }

    fn send_to(&self, identity: &str, data: &[u8]) {
        if let Some(member) = self.members.get(identity) {
            let _ = member.tx.send(data.to_vec());
        }
    }

    /// Forward a frame to every member except `from`.
    fn forward_to_others(&self, from: &str, data: &[u8]) {
        for (identity, member) in &self.members {
            if identity != from {
                let _ = member.tx.send(data.to_vec());
            }
        }
    }

    fn broadcast(&self, data: &[u8]) {
        for member in self.members.values() {
            let _ = member.tx.send(data.to_vec());
        }
    }

    /// Settle the game once every current member has voted.
    fn try_settle(&mut self) -> Option<GameEndedMsg> {
        if self.members.is_empty() || self.members.values().any(|m| m.vote.is_none()) {
            return None;
        }
        let votes: Vec<&GameEndVoteMsg> =
            self.members.values().filter_map(|m| m.vote.as_ref()).collect();
        let ended = settle_votes(&votes);
        for member in self.members.values_mut() {
            member.vote = None;
        }
        self.started_at = None;
        Some(ended)
    }
}

/// Pick the reason with the most votes (ties go to the lower reason code)
/// and rank the voters by score.
pub fn settle_votes(votes: &[&GameEndVoteMsg]) -> GameEndedMsg {
    let mut tally: BTreeMap<EndReason, usize> = BTreeMap::new();
    for vote in votes {
        *tally.entry(vote.reason).or_default() += 1;
    }
    let mut reason = EndReason::AllPlayersDead;
    let mut best = 0;
    // BTreeMap iterates in reason order, so strict > keeps the lowest on ties
    for (candidate, count) in tally {
        if count > best {
            reason = candidate;
            best = count;
        }
    }

    let mut standings: Vec<FinalStanding> = votes
        .iter()
        .map(|v| FinalStanding {
            identity: v.identity.clone(),
            score: v.score,
            hp: v.hp,
            alive: v.alive,
        })
        .collect();
    standings.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.identity.cmp(&b.identity)));
    let winner = standings.first().map(|s| s.identity.clone());

    GameEndedMsg {
        reason,
        standings,
        winner,
    }
}

fn encode(msg: &Message) -> Option<Vec<u8>> {
    match encode_message(msg) {
        Ok(data) => Some(data),
        Err(e) => {
            tracing::warn!(msg_type = ?msg.message_type(), error = %e, "Failed to encode relay message");
            None
        },
    }
}

/// Manages all relay rooms.
pub struct RelayState {
    rooms: HashMap<String, RelayRoom>,
    max_rooms: usize,
    max_members: usize,
}

impl RelayState {
    pub fn new(max_rooms: usize, max_members: usize) -> Self {
        Self {
            rooms: HashMap::new(),
            max_rooms,
            max_members,
        }
    }

    /// Admit `identity` to `room`, creating the room if needed. On success the
    /// new member is sent `Joined` and everyone else `PlayerJoined`.
    pub fn join(
        &mut self,
        room_id: &str,
        identity: &str,
        tx: mpsc::UnboundedSender<Vec<u8>>,
    ) -> Result<JoinedMsg, RelayError> {
        if room_id.trim().is_empty() {
            return Err(RelayError::InvalidJoin("room id is empty".into()));
        }
        if identity.trim().is_empty() {
            return Err(RelayError::InvalidJoin("identity is empty".into()));
        }
        if !self.rooms.contains_key(room_id) && self.rooms.len() >= self.max_rooms {
            return Err(RelayError::RoomLimitReached);
        }
        let room = self
            .rooms
            .entry(room_id.to_string())
            .or_insert_with(RelayRoom::new);
        if room.members.contains_key(identity) {
            return Err(RelayError::DuplicateIdentity(identity.to_string()));
        }
        if room.members.len() >= self.max_members {
            return Err(RelayError::RoomFull(room_id.to_string()));
        }

        room.members
            .insert(identity.to_string(), RelayMember { tx, vote: None });
        let started_at = *room.started_at.get_or_insert_with(Instant::now);
        let roster = room.roster();

        let joined = JoinedMsg {
            room: room_id.to_string(),
            identity: identity.to_string(),
            roster: roster.clone(),
            elapsed_ms: started_at.elapsed().as_millis() as u64,
        };
        if let Some(data) = encode(&Message::Joined(joined.clone())) {
            room.send_to(identity, &data);
        }
        let announce = Message::PlayerJoined(PlayerJoinedMsg {
            identity: identity.to_string(),
            roster,
        });
        if let Some(data) = encode(&announce) {
            room.forward_to_others(identity, &data);
        }
        Ok(joined)
    }

    /// Remove a member. Remaining members get `PlayerLeft`; an empty room is
    /// dropped. Returns the settlement if the departure completed the vote.
    pub fn leave(&mut self, room_id: &str, identity: &str) -> Option<GameEndedMsg> {
        let room = self.rooms.get_mut(room_id)?;
        room.members.remove(identity)?;
        if room.members.is_empty() {
            self.rooms.remove(room_id);
            return None;
        }

        let left = Message::PlayerLeft(PlayerLeftMsg {
            identity: identity.to_string(),
            roster: room.roster(),
        });
        if let Some(data) = encode(&left) {
            room.broadcast(&data);
        }

        let ended = room.try_settle()?;
        if let Some(data) = encode(&Message::GameEnded(ended.clone())) {
            room.broadcast(&data);
        }
        Some(ended)
    }

    /// Record a vote (a re-vote overwrites) and broadcast `GameEnded` once
    /// every member has voted.
    pub fn record_vote(&mut self, room_id: &str, vote: GameEndVoteMsg) -> Option<GameEndedMsg> {
        let room = self.rooms.get_mut(room_id)?;
        let member = room.members.get_mut(&vote.identity)?;
        member.vote = Some(vote);

        let ended = room.try_settle()?;
        if let Some(data) = encode(&Message::GameEnded(ended.clone())) {
            room.broadcast(&data);
        }
        Some(ended)
    }

    /// Forward a gossip frame to every other member of the room.
    pub fn relay_gossip(&self, room_id: &str, from: &str, data: &[u8]) {
        if let Some(room) = self.rooms.get(room_id) {
            room.forward_to_others(from, data);
        }
    }

    pub fn room_exists(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn member_count(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map_or(0, |r| r.members.len())
    }
}

/// Shared relay state behind an async RwLock.
pub type SharedRelayState = Arc<RwLock<RelayState>>;
