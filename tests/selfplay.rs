use xiangqi_zero::board::Outcome;
use xiangqi_zero::evaluator::{MaterialEvaluator, RandomEvaluator};
use xiangqi_zero::selfplay::{generate_games, play_game, SelfPlayParams};

fn small(seed: u64) -> SelfPlayParams {
    SelfPlayParams { games: 2, max_plies: 12, simulations: 16, seed, ..Default::default() }
}

#[test]
fn selfplay_generates_games_deterministically() {
    let params = small(42);
    let g1 = generate_games(&params, |gi| RandomEvaluator::new(gi as u64), |_| {}).unwrap();
    let g2 = generate_games(&params, |gi| RandomEvaluator::new(gi as u64), |_| {}).unwrap();
    assert_eq!(g1.len(), 2);
    assert_eq!(g2.len(), 2);
    // Deterministic by seed
    assert_eq!(g1[0].replay, g2[0].replay);
    assert_eq!(g1[1].replay, g2[1].replay);
}

#[test]
fn selfplay_noise_changes_moves_with_different_seeds() {
    let mut p = small(1);
    p.games = 1;
    let g1 = generate_games(&p, |_| MaterialEvaluator::default(), |_| {}).unwrap();
    p.seed = 2;
    let g2 = generate_games(&p, |_| MaterialEvaluator::default(), |_| {}).unwrap();
    assert_ne!(g1[0].replay.steps, g2[0].replay.steps, "noise did not alter move sampling");
}

#[test]
fn truncated_games_are_labelled_as_ties() {
    let p = SelfPlayParams { max_plies: 6, simulations: 8, ..Default::default() };
    let g = play_game(MaterialEvaluator::default(), &p, 7, None).unwrap();
    assert!(g.truncated);
    assert_eq!(g.outcome, Outcome::Tie);
    assert_eq!(g.examples.len(), 6);
    assert_eq!(g.replay.steps.len(), 6);
    assert!(g.examples.iter().all(|ex| ex.z == 0.0));
    for ex in &g.examples {
        assert_eq!(ex.policy.len(), 192);
        assert!((ex.policy.iter().sum::<f32>() - 1.0).abs() < 1e-3);
        assert_eq!(ex.state.len(), 9 * 90);
    }
    // players alternate from the start player
    assert!(g.examples.windows(2).all(|w| w[0].player != w[1].player));
}

#[test]
fn greedy_play_without_noise_is_seed_independent() {
    let p = SelfPlayParams {
        max_plies: 8,
        simulations: 12,
        temperature_tau: 0.0,
        dirichlet_epsilon: 0.0,
        ..Default::default()
    };
    let a = play_game(MaterialEvaluator::default(), &p, 1, None).unwrap();
    let b = play_game(MaterialEvaluator::default(), &p, 99, None).unwrap();
    assert_eq!(a.replay.steps, b.replay.steps);
}

#[test]
fn finished_games_label_winner_and_loser() {
    let p = SelfPlayParams { max_plies: 2000, simulations: 4, ..Default::default() };
    let g = play_game(RandomEvaluator::new(5), &p, 5, None).unwrap();
    assert!(!g.truncated);
    match g.outcome {
        Outcome::Win(w) => {
            for ex in &g.examples {
                assert_eq!(ex.z, if ex.player == w { 1.0 } else { -1.0 });
            }
        }
        Outcome::Tie => assert!(g.examples.iter().all(|ex| ex.z == 0.0)),
        Outcome::Ongoing => panic!("finished game reported as ongoing"),
    }
    assert_eq!(g.replay.replay().unwrap().outcome(), g.outcome);
}
