use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use xiangqi_zero::board::{Coord, Move, Outcome, RulesConfig, Side};
use xiangqi_zero::gameplay::{GameMode, GameSession, HumanAgent, RandomAgent};
use xiangqi_zero::mcts::MctsConfig;

#[test]
fn random_agents_play_to_the_end() {
    let stop = AtomicBool::new(false);
    let mut session = GameSession::new(
        Side::Red,
        RulesConfig::default(),
        Box::new(RandomAgent::new("red", 1)),
        Box::new(RandomAgent::new("black", 2)),
    );
    let mut seen = 0usize;
    let rec = session.play_observed(&stop, |_, _| seen += 1).unwrap();
    assert!(rec.outcome.is_terminal());
    assert_eq!(seen, rec.replay.steps.len());
    let rebuilt = rec.replay.replay().unwrap();
    assert_eq!(rebuilt.grid(), session.board().grid());
    assert_eq!(rebuilt.outcome(), rec.outcome);
}

#[test]
fn human_moves_arrive_through_the_input_handle() {
    let stop = AtomicBool::new(false);
    let (human, input) = HumanAgent::new("human");
    let mut session = GameSession::new(
        Side::Red,
        RulesConfig::default(),
        Box::new(human),
        Box::new(RandomAgent::new("black", 3)),
    );
    let feeder = std::thread::spawn(move || {
        assert!(input.submit(Move::new(1, Coord::new(5, 0))));
    });
    let rec = session
        .play_observed(&stop, |board, _| {
            if board.moves_played().len() == 2 {
                stop.store(true, Ordering::Relaxed);
            }
        })
        .unwrap();
    feeder.join().unwrap();
    assert_eq!(rec.outcome, Outcome::Ongoing);
    assert_eq!(rec.replay.steps.len(), 2);
    assert_eq!(rec.replay.steps[0], (1, [5, 0]));
}

#[test]
fn closed_human_input_fails_the_turn() {
    let stop = AtomicBool::new(false);
    let (human, input) = HumanAgent::new("human");
    drop(input);
    let mut session = GameSession::new(
        Side::Red,
        RulesConfig::default(),
        Box::new(human),
        Box::new(RandomAgent::new("black", 3)),
    );
    assert!(session.play(&stop).is_err());
}

#[test]
fn bot_session_from_mode_has_no_inputs() {
    let stop = Arc::new(AtomicBool::new(false));
    let mcts = MctsConfig { c_puct: 5.0, simulations: 12 };
    let (mut session, inputs) =
        GameSession::for_mode(GameMode::BotVsBot, Side::Black, RulesConfig::default(), mcts, stop.clone());
    assert!(inputs.iter().all(Option::is_none));
    assert_eq!(session.agent(Side::Red).name(), "bot-red");

    let rec = session
        .play_observed(&stop, |board, _| {
            if board.moves_played().len() == 4 {
                stop.store(true, Ordering::Relaxed);
            }
        })
        .unwrap();
    assert_eq!(rec.replay.steps.len(), 4);
    assert_eq!(rec.replay.start_side(), Side::Black);

    session.restart(Side::Red);
    assert!(session.board().moves_played().is_empty());
}

#[test]
fn human_vs_bot_hands_out_one_input() {
    let stop = Arc::new(AtomicBool::new(false));
    let (_session, inputs) = GameSession::for_mode(
        GameMode::HumanVsBot,
        Side::Red,
        RulesConfig::default(),
        MctsConfig::default(),
        stop,
    );
    assert!(inputs[0].is_some());
    assert!(inputs[1].is_none());
}
