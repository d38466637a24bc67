use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use resistance_bot::{Agent, BeliefAgent};
use resistance_core::model::mission::validate_team;
use resistance_core::model::player::{PlayerId, players};
use resistance_handler::config::HandlerConfig;
use resistance_handler::handler::FallbackPolicy;
use resistance_handler::{AgentHandler, Call, InvokeError, Reply};

#[derive(Clone, Copy)]
enum Misbehaviour {
    Spin,
    Sleep,
    Panic,
    Garbage,
}

/// A strategy that misbehaves in its decisions and is fine otherwise.
struct Rogue {
    mode: Misbehaviour,
    spin_for: Duration,
}

impl Rogue {
    fn boxed(mode: Misbehaviour) -> Box<dyn Agent> {
        Box::new(Self {
            mode,
            spin_for: Duration::from_secs(3),
        })
    }

    fn misbehave(&self) {
        match self.mode {
            Misbehaviour::Spin => {
                let started = Instant::now();
                let mut spins = 0u64;
                while started.elapsed() < self.spin_for {
                    spins = spins.wrapping_add(1);
                    std::hint::black_box(spins);
                }
            }
            Misbehaviour::Sleep => thread::sleep(self.spin_for),
            Misbehaviour::Panic => panic!("rogue strategy gave up"),
            Misbehaviour::Garbage => {}
        }
    }
}

impl Agent for Rogue {
    fn name(&self) -> &str {
        "rogue"
    }

    fn new_game(&mut self, _: usize, _: PlayerId, _: &[PlayerId]) {}

    fn propose_mission(&mut self, team_size: usize, _: usize) -> Vec<PlayerId> {
        self.misbehave();
        // one too many, all the same player
        vec![PlayerId::new(9); team_size + 1]
    }

    fn vote(&mut self, _: &[PlayerId], _: PlayerId, _: usize) -> bool {
        self.misbehave();
        true
    }

    fn vote_outcome(&mut self, _: &[PlayerId], _: PlayerId, _: &[PlayerId]) {}

    fn betray(&mut self, _: &[PlayerId], _: PlayerId, _: usize) -> bool {
        self.misbehave();
        true
    }

    fn mission_outcome(&mut self, _: &[PlayerId], _: PlayerId, _: usize, _: bool) {
        self.misbehave();
    }

    fn round_outcome(&mut self, _: usize, _: usize) {}

    fn game_outcome(&mut self, _: bool, _: &[PlayerId]) {}
}

fn config(deadline_ms: u64) -> HandlerConfig {
    HandlerConfig::default()
        .with_deadline_ms(deadline_ms)
        .with_seed(17)
}

#[test]
fn busy_loop_propose_returns_valid_team_within_deadline() {
    let mut handler = AgentHandler::new(Rogue::boxed(Misbehaviour::Spin), &config(100));
    handler.new_game(5, PlayerId::new(0), &[]);

    let started = Instant::now();
    let team = handler.propose_mission(3, 1);
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(600), "took {elapsed:?}");
    assert!(validate_team(&team, 3, 5).is_ok(), "{team:?}");
    assert_eq!(handler.error_count(), 1);
}

#[test]
fn each_timed_out_call_counts_once() {
    let mut handler = AgentHandler::new(Rogue::boxed(Misbehaviour::Sleep), &config(40));
    handler.new_game(7, PlayerId::new(2), &[]);
    assert_eq!(handler.error_count(), 0);

    let outcome = handler.dispatch(Call::Vote {
        mission: players(&[0, 1]),
        proposer: PlayerId::new(1),
        betrayals_required: 1,
    });
    assert!(outcome.fallback_used);
    assert!(matches!(outcome.error, Some(InvokeError::TimedOut { operation: "vote", deadline_ms: 40 })));
    assert!(matches!(outcome.reply, Reply::Decision(_)));
    assert_eq!(handler.error_count(), 1);

    // the worker is still asleep, so the next call waits its own deadline
    handler.betray(&players(&[2, 3]), PlayerId::new(3), 1);
    assert_eq!(handler.error_count(), 2);

    handler.mission_outcome(&players(&[2, 3]), PlayerId::new(3), 0, true);
    assert_eq!(handler.error_count(), 3);

    handler.reset_error_counter();
    assert_eq!(handler.error_count(), 0);
}

#[test]
fn timed_out_decisions_follow_configured_probabilities() {
    // the rogue would have said yes to both, so only the fallback can answer no
    for approve in [false, true] {
        let probability = if approve { 1.0 } else { 0.0 };
        let config = HandlerConfig {
            vote_approval_probability: probability,
            betray_probability: probability,
            ..config(40)
        };
        let mut handler = AgentHandler::new(Rogue::boxed(Misbehaviour::Sleep), &config);
        handler.new_game(5, PlayerId::new(1), &players(&[1, 3]));

        for _ in 0..3 {
            assert_eq!(handler.vote(&players(&[1, 2]), PlayerId::new(2), 1), approve);
            assert_eq!(handler.betray(&players(&[1, 2]), PlayerId::new(2), 1), approve);
        }
        assert_eq!(handler.error_count(), 6);
    }
}

#[test]
fn timed_out_proposal_is_the_seeded_fallback_team() {
    let config = config(40);
    let mut expected = FallbackPolicy::new(&config);
    let mut handler = AgentHandler::new(Rogue::boxed(Misbehaviour::Sleep), &config);
    handler.new_game(8, PlayerId::new(0), &[]);

    for size in [3, 4, 4] {
        assert_eq!(handler.propose_mission(size, 1), expected.team(8, size));
    }
    assert_eq!(handler.error_count(), 3);
}

#[test]
fn panicking_strategy_falls_back_and_keeps_serving() {
    let mut handler = AgentHandler::new(Rogue::boxed(Misbehaviour::Panic), &config(500));
    handler.new_game(5, PlayerId::new(0), &[]);

    for round in 1..=3u64 {
        let team = handler.propose_mission(2, 1);
        assert!(validate_team(&team, 2, 5).is_ok());
        assert_eq!(handler.error_count(), round);
    }

    let outcome = handler.dispatch(Call::Betray {
        mission: players(&[0, 1]),
        proposer: PlayerId::new(0),
        betrayals_required: 1,
    });
    assert!(matches!(outcome.error, Some(InvokeError::Panicked { operation: "betray", .. })));
}

#[test]
fn malformed_team_is_replaced() {
    let mut handler = AgentHandler::new(Rogue::boxed(Misbehaviour::Garbage), &config(500));
    handler.new_game(6, PlayerId::new(0), &[]);

    let outcome = handler.dispatch(Call::ProposeMission {
        team_size: 3,
        betrayals_required: 1,
    });
    assert!(matches!(outcome.error, Some(InvokeError::Malformed { .. })));
    assert!(outcome.fallback_used);
    let team = outcome.reply.into_team();
    assert!(validate_team(&team, 3, 6).is_ok(), "{team:?}");
    assert_eq!(handler.error_count(), 1);

    // decisions of the right shape pass straight through
    assert!(handler.vote(&players(&[0, 1]), PlayerId::new(1), 1));
    assert_eq!(handler.error_count(), 1);
}

#[test]
fn stalled_strategy_is_replaced_at_next_game() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&built);
    let factory = Box::new(move || {
        // only the first strategy stalls
        let mode = if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            Misbehaviour::Sleep
        } else {
            Misbehaviour::Garbage
        };
        Rogue::boxed(mode)
    });
    let mut handler = AgentHandler::with_factory(factory, &config(50));

    handler.new_game(5, PlayerId::new(0), &[]);
    handler.vote(&players(&[0, 1]), PlayerId::new(1), 1);
    assert_eq!(handler.error_count(), 1);

    handler.new_game(5, PlayerId::new(0), &[]);
    assert_eq!(built.load(Ordering::SeqCst), 2);
    assert!(handler.vote(&players(&[0, 1]), PlayerId::new(1), 1));
    assert_eq!(handler.error_count(), 1);
}

#[test]
fn wrapped_belief_agent_matches_unwrapped_decisions() {
    let mut plain = BeliefAgent::default();
    let mut wrapped = AgentHandler::new(Box::new(BeliefAgent::default()), &config(1_000));

    let seats = players(&[0, 2]);
    plain.new_game(5, PlayerId::new(0), &seats);
    wrapped.new_game(5, PlayerId::new(0), &seats);

    assert_eq!(plain.propose_mission(3, 1), wrapped.propose_mission(3, 1));
    let team = players(&[0, 2, 3]);
    assert!(wrapped.betray(&team, PlayerId::new(3), 1));
    assert_eq!(
        plain.vote(&team, PlayerId::new(3), 1),
        wrapped.vote(&team, PlayerId::new(3), 1)
    );
    assert_eq!(wrapped.name(), "belief");
    assert_eq!(wrapped.error_count(), 0);
}
