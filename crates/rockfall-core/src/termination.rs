//! Per-peer end-of-game proposal.
//!
//! A peer never decides that the game is over. It evaluates the end
//! predicates against its own (possibly stale) view, proposes exactly one
//! vote, and waits for the relay's `GameEnded` to move it to `Finished`.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::WinMode;
use crate::entity::Avatar;

/// Why a game ended (or should end).
///
/// Variant order is the relay's tie-break order when votes are split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EndReason {
    ScoreTargetReached,
    AllPlayersDead,
    TimeLimitReached,
}

impl EndReason {
    pub fn code(self) -> &'static str {
        match self {
            Self::ScoreTargetReached => "SCORE_TARGET_REACHED",
            Self::AllPlayersDead => "ALL_PLAYERS_DEAD",
            Self::TimeLimitReached => "TIME_LIMIT_REACHED",
        }
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Playing,
    Voted,
    Finished,
}

/// Tracks the vote state machine `Playing -> Voted -> Finished`.
#[derive(Debug, Clone)]
pub struct TerminationCoordinator {
    win_mode: WinMode,
    phase: Phase,
    voted_reason: Option<EndReason>,
    final_reason: Option<EndReason>,
}

impl TerminationCoordinator {
    pub fn new(win_mode: WinMode) -> Self {
        Self {
            win_mode,
            phase: Phase::Playing,
            voted_reason: None,
            final_reason: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn voted_reason(&self) -> Option<EndReason> {
        self.voted_reason
    }

    pub fn final_reason(&self) -> Option<EndReason> {
        self.final_reason
    }

    /// Check the end predicates in order. Returns the reason to vote for the
    /// first time one holds; afterwards always `None`.
    ///
    /// `elapsed` is the time since the room's start acknowledgment, `None`
    /// until the relay has acknowledged the join.
    pub fn evaluate<'a>(
        &mut self,
        avatars: impl IntoIterator<Item = &'a Avatar>,
        elapsed: Option<Duration>,
    ) -> Option<EndReason> {
        if self.phase != Phase::Playing {
            return None;
        }
        let reason = self.check(avatars, elapsed)?;
        self.phase = Phase::Voted;
        self.voted_reason = Some(reason);
        tracing::info!(reason = %reason, "End predicate satisfied, voting");
        Some(reason)
    }

    fn check<'a>(
        &self,
        avatars: impl IntoIterator<Item = &'a Avatar>,
        elapsed: Option<Duration>,
    ) -> Option<EndReason> {
        let mut known = 0usize;
        let mut any_alive = false;
        let mut target_hit = false;
        let target = self.win_mode.score_target();
        for avatar in avatars.into_iter().filter(|a| a.connected) {
            known += 1;
            if avatar.alive {
                any_alive = true;
                if target.is_some_and(|t| avatar.score >= t) {
                    target_hit = true;
                }
            }
        }
        if target_hit {
            return Some(EndReason::ScoreTargetReached);
        }
        if known > 0 && !any_alive {
            return Some(EndReason::AllPlayersDead);
        }
        if let (Some(limit), Some(elapsed)) = (self.win_mode.time_limit(), elapsed)
            && elapsed >= limit
        {
            return Some(EndReason::TimeLimitReached);
        }
        None
    }

    /// Apply the relay's authoritative end notification.
    pub fn finish(&mut self, reason: EndReason) {
        if self.phase == Phase::Finished {
            return;
        }
        self.phase = Phase::Finished;
        self.final_reason = Some(reason);
    }
}
