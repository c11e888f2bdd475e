//! Multi-peer gossip scenarios: several sessions in one room, messages routed
//! in memory exactly as the relay would forward them.

#[allow(dead_code)]
mod common;

use common::{DT, Room, dropper_config, fire};
use rockfall_core::authority::DestroyReason;
use rockfall_core::entity::{EntityId, SizeClass};
use rockfall_core::net::messages::{
    Message, ObstacleDestroyedMsg, ObstaclePositionMsg, ScoreReason, ScoreUpdateMsg,
};
use rockfall_core::termination::{EndReason, Phase};
use rockfall_core::test_helpers::quiet_config;
use rockfall_core::{AvatarInput, SessionConfig};

fn run(room: &mut Room, ticks: usize) {
    for _ in 0..ticks {
        room.tick(DT);
    }
}

fn run_with(room: &mut Room, ticks: usize, input: impl Fn(&str) -> AvatarInput + Copy) {
    for _ in 0..ticks {
        room.tick_with(DT, input);
    }
}

// Large obstacle takes two projectile hits from a peer that does not own it
#[test]
fn large_obstacle_needs_two_hits_and_rewards_attacker() {
    let mut room = Room::new(vec![
        ("alice", dropper_config(true, 300.0, 0.0)),
        ("bob", quiet_config()),
    ]);
    let target = EntityId::new("alice", 1);
    run(&mut room, 15);
    assert!(room.peer("bob").world().obstacles.contains_key(&target));
    assert_eq!(room.peer("bob").world().obstacles[&target].radius, 26.0);

    // First hit
    room.tick_with(DT, |name| if name == "bob" { fire() } else { AvatarInput::default() });
    run(&mut room, 60);
    room.settle();
    for name in ["alice", "bob"] {
        let world = room.peer(name).world();
        assert_eq!(world.obstacles[&target].hp, 1, "{name} should see hp 1");
        assert_eq!(world.avatar("bob").unwrap().score, 0);
    }
    assert!(room.peer("alice").registry().is_owned(&target));

    // Second hit destroys it
    room.tick_with(DT, |name| if name == "bob" { fire() } else { AvatarInput::default() });
    run(&mut room, 60);
    room.settle();
    for name in ["alice", "bob"] {
        let world = room.peer(name).world();
        assert!(world.is_retired(&target), "{name} should have retired {target}");
        assert_eq!(world.avatar("bob").unwrap().score, 10);
        assert_eq!(world.avatar("alice").unwrap().score, 0);
    }
    assert!(!room.peer("alice").registry().is_owned(&target));
}

// Small obstacle hits an avatar whose peer does not own it
#[test]
fn avatar_impact_destroys_foreign_obstacle_without_scoring() {
    let mut room = Room::new(vec![
        ("alice", dropper_config(false, -400.0, 200.0)),
        ("bob", quiet_config()),
    ]);
    let target = EntityId::new("alice", 1);
    let sidestep = |name: &str| AvatarInput {
        move_x: if name == "alice" { -1.0 } else { 0.0 },
        ..AvatarInput::default()
    };
    run_with(&mut room, 360, sidestep);
    room.settle();

    for name in ["alice", "bob"] {
        let world = room.peer(name).world();
        assert!(world.is_retired(&target), "{name} should have retired {target}");
        let bob = world.avatar("bob").unwrap();
        assert_eq!(bob.hp, 2, "{name} should see bob at hp 2");
        assert!(bob.alive);
        assert_eq!(bob.score, 0);
        assert_eq!(world.avatar("alice").unwrap().hp, 3);
        assert_eq!(world.avatar("alice").unwrap().score, 0);
    }
    assert!(!room.peer("alice").registry().is_owned(&target));
}

#[test]
fn score_target_vote_is_emitted_exactly_once() {
    let mut room = Room::new(vec![("alice", quiet_config()), ("bob", quiet_config())]);
    room.settle();
    let bob = room.index("bob");
    let reached = Message::ScoreUpdate(ScoreUpdateMsg {
        identity: "bob".to_string(),
        score: 50,
        reason: ScoreReason::ObstacleDestroyed(SizeClass::Large),
    });
    room.deliver(bob, std::slice::from_ref(&reached));
    room.tick(DT);
    assert_eq!(room.votes_from("alice"), 1);
    assert_eq!(room.peer("alice").phase(), Phase::Voted);
    let stats = room.peer("alice").final_stats().unwrap();
    assert_eq!(stats.reason, EndReason::ScoreTargetReached);
    assert_eq!(stats.score, 0);
    assert!(stats.alive);

    // Re-delivery and further predicate checks never vote again
    room.deliver(bob, &[reached]);
    run(&mut room, 30);
    assert_eq!(room.votes_from("alice"), 1);
    assert_eq!(room.votes_from("bob"), 0);
}

#[test]
fn all_players_dead_is_voted_by_observers() {
    let fragile = |config: SessionConfig| SessionConfig {
        avatar_max_hp: 1,
        max_owned_obstacles: 2,
        ..config
    };
    let mut room = Room::new(vec![
        ("alice", fragile(dropper_config(false, 300.0, 200.0))),
        ("bob", fragile(quiet_config())),
    ]);
    run(&mut room, 180);
    room.settle();

    for name in ["alice", "bob"] {
        let world = room.peer(name).world();
        assert!(world.avatars.values().all(|a| !a.alive), "{name} sees a survivor");
        assert!(room.votes_from(name) <= 1);
    }
    assert!(room.votes_from("alice") + room.votes_from("bob") >= 1);
    for (_, msg) in &room.to_relay {
        if let Message::GameEndVote(vote) = msg {
            assert_eq!(vote.reason, EndReason::AllPlayersDead);
            assert!(!vote.alive);
            assert_eq!(vote.hp, 0);
        }
    }
    // Eliminated avatars are kept for the scoreboard
    assert_eq!(room.peer("alice").world().avatars.len(), 2);
}

#[test]
fn duplicate_obstacle_destroyed_changes_nothing() {
    let mut room = Room::new(vec![
        ("alice", dropper_config(true, 300.0, 0.0)),
        ("bob", quiet_config()),
    ]);
    run(&mut room, 15);
    let target = EntityId::new("alice", 1);
    let destroy = Message::ObstacleDestroyed(ObstacleDestroyedMsg {
        id: target.clone(),
        reason: DestroyReason::Bullet,
    });
    let alice = room.index("alice");
    room.deliver(alice, std::slice::from_ref(&destroy));
    room.peers[1].tick(0.0, &AvatarInput::default());
    let before = room.peer("bob").world().clone();
    assert!(before.is_retired(&target));

    room.deliver(alice, &[destroy]);
    room.peers[1].tick(0.0, &AvatarInput::default());
    assert_eq!(room.peer("bob").world(), &before);
}

#[test]
fn bare_position_update_creates_no_phantom() {
    let mut room = Room::new(vec![("alice", quiet_config()), ("bob", quiet_config())]);
    room.settle();
    let phantom = EntityId::new("alice", 77);
    let alice = room.index("alice");
    room.deliver(
        alice,
        &[Message::ObstaclePosition(ObstaclePositionMsg {
            id: phantom.clone(),
            x: 100.0,
            y: 100.0,
        })],
    );
    room.settle();
    assert!(!room.peer("bob").world().obstacles.contains_key(&phantom));
    assert!(room.peer("bob").world().obstacles.is_empty());
}

#[test]
fn late_joiner_resyncs_owned_state() {
    let mut room = Room::new(vec![
        ("alice", dropper_config(true, 300.0, 0.0)),
        ("bob", quiet_config()),
    ]);
    run(&mut room, 15);
    let target = EntityId::new("alice", 1);

    // carol joins after the spawn was broadcast
    let mut carol = rockfall_core::PeerSession::new("carol", quiet_config());
    carol.enqueue(Message::Joined(rockfall_core::net::messages::JoinedMsg {
        room: "SCENARIO".to_string(),
        identity: "carol".to_string(),
        roster: vec!["alice".into(), "bob".into(), "carol".into()],
        elapsed_ms: 250,
    }));
    for peer in room.peers.iter_mut() {
        peer.enqueue(Message::PlayerJoined(rockfall_core::net::messages::PlayerJoinedMsg {
            identity: "carol".to_string(),
            roster: vec!["alice".into(), "bob".into(), "carol".into()],
        }));
    }
    room.peers.push(carol);
    room.settle();

    let carol = room.peer("carol");
    assert!(carol.world().obstacles.contains_key(&target));
    assert!(!carol.registry().is_owned(&target));
    assert!(carol.world().avatar("alice").is_some());
    assert!(carol.world().avatar("bob").is_some());
    assert!(room.peer("alice").world().avatar("carol").is_some());
}

// Every entity is advanced by exactly one peer, and after the dust settles no
// peer keeps a mirror whose owner has already destroyed it.
#[test]
fn ownership_is_exclusive_and_mirrors_converge() {
    let busy = |seed| SessionConfig {
        spawn_interval: 0.3,
        seed: Some(seed),
        ..SessionConfig::default()
    };
    let mut room = Room::new(vec![
        ("alice", busy(1)),
        ("bob", busy(2)),
        ("carol", busy(3)),
    ]);
    let mut t = 0usize;
    for _ in 0..600 {
        t += 1;
        let phase = t;
        room.tick_with(DT, move |name| {
            let dir = match name {
                "alice" => -1.0,
                "bob" => 1.0,
                _ => 0.0,
            };
            AvatarInput {
                move_x: if (phase / 90) % 2 == 0 { dir } else { -dir },
                move_y: 0.0,
                fire: true,
            }
        });
    }
    room.settle();

    for peer in &room.peers {
        let me = peer.identity();
        let world = peer.world();
        for id in world.obstacles.keys().chain(world.projectiles.keys()) {
            assert_eq!(
                peer.registry().is_owned(id),
                id.owner == me,
                "{me}: ownership of {id} does not follow its id"
            );
            if id.owner != me {
                let owner = room.peer(&id.owner).world();
                assert!(
                    owner.contains(id),
                    "{me} mirrors {id} which its owner already removed"
                );
            }
        }
    }
}
