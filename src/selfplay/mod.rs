use log::{debug, info};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Gamma};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::board::{Board, Outcome, RulesConfig, Side};
use crate::encoder::{self, Action, ACTION_SPACE};
use crate::error::SearchError;
use crate::evaluator::Evaluator;
use crate::mcts::{Mcts, MctsConfig};
use crate::replay::Replay;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfPlayParams {
    pub games: usize,
    pub max_plies: usize,
    pub simulations: usize,
    pub c_puct: f32,
    pub seed: u64,
    pub temperature_tau: f32,       // softmax temperature over visit counts; 0 => greedy
    pub temperature_tau_final: f32, // anneal to this by temperature_moves
    pub temperature_moves: usize,   // plies over which to anneal
    pub dirichlet_alpha: f32,
    pub dirichlet_epsilon: f32, // mixing coefficient, 0 disables noise
    pub start_player: Side,
    pub rules: RulesConfig,
}

impl Default for SelfPlayParams {
    fn default() -> Self {
        Self {
            games: 1,
            max_plies: 400,
            simulations: 200,
            c_puct: 5.0,
            seed: 42,
            temperature_tau: 1.0,
            temperature_tau_final: 1.0,
            temperature_moves: 0,
            dirichlet_alpha: 0.3,
            dirichlet_epsilon: 0.25,
            start_player: Side::Red,
            rules: RulesConfig::default(),
        }
    }
}

impl SelfPlayParams {
    /// Temperature for ply `ply`, annealed linearly over `temperature_moves`.
    pub fn temperature_at(&self, ply: usize) -> f32 {
        if self.temperature_moves > 1 && ply < self.temperature_moves {
            let f = ply as f32 / (self.temperature_moves as f32 - 1.0);
            (1.0 - f) * self.temperature_tau + f * self.temperature_tau_final
        } else if self.temperature_moves > 0 {
            self.temperature_tau_final
        } else {
            self.temperature_tau
        }
    }

    fn mcts_config(&self) -> MctsConfig {
        MctsConfig { c_puct: self.c_puct, simulations: self.simulations }
    }
}

/// One position of a finished game labelled with the realised outcome.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingExample {
    pub state: Vec<f32>,
    pub policy: Vec<f32>,
    pub player: Side,
    /// +1 / -1 / 0 from `player`'s point of view.
    pub z: f32,
}

#[derive(Clone, Debug)]
pub struct GameRecord {
    pub outcome: Outcome,
    /// Stopped by `max_plies` or a stop signal; scored as a tie.
    pub truncated: bool,
    pub replay: Replay,
    pub examples: Vec<TrainingExample>,
}

/// Per-game seed derived from the run seed.
pub fn game_seed(seed: u64, game_index: usize) -> u64 {
    seed ^ (game_index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn dirichlet_noise(alpha: f32, n: usize, rng: &mut SmallRng) -> Vec<f32> {
    let Ok(gamma) = Gamma::new(alpha.max(1e-3), 1.0) else { return vec![1.0 / n as f32; n] };
    let mut noise: Vec<f32> = (0..n).map(|_| gamma.sample(rng) as f32).collect();
    let sum: f32 = noise.iter().sum();
    if sum > 0.0 {
        for x in &mut noise { *x /= sum; }
    } else {
        noise.fill(1.0 / n as f32);
    }
    noise
}

fn sample_action(probs: &[(Action, f32)], rng: &mut SmallRng) -> Action {
    let r: f32 = rng.gen();
    let mut cdf = 0.0f32;
    for &(a, p) in probs {
        cdf += p.max(0.0);
        if r <= cdf { return a; }
    }
    probs[probs.len() - 1].0
}

/// Choose the action to play at `ply` from the root of `mcts`.
fn choose_action<E: Evaluator>(mcts: &Mcts<E>, params: &SelfPlayParams, ply: usize, rng: &mut SmallRng) -> Option<Action> {
    let tau = params.temperature_at(ply);
    if tau <= 0.0 {
        return mcts.best_action();
    }
    let mut probs = mcts.move_probabilities(tau);
    if probs.is_empty() { return None; }
    if params.dirichlet_epsilon > 0.0 && params.dirichlet_alpha > 0.0 {
        let noise = dirichlet_noise(params.dirichlet_alpha, probs.len(), rng);
        let eps = params.dirichlet_epsilon;
        for ((_, p), n) in probs.iter_mut().zip(noise) {
            *p = (1.0 - eps) * *p + eps * n;
        }
    }
    Some(sample_action(&probs, rng))
}

/// Play one game against itself and label every recorded position.
pub fn play_game<E: Evaluator>(
    evaluator: E,
    params: &SelfPlayParams,
    seed: u64,
    stop: Option<&AtomicBool>,
) -> Result<GameRecord, SearchError> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut board = Board::with_config(params.start_player, params.rules);
    let mut mcts = Mcts::new(evaluator, params.mcts_config());
    let mut pending: Vec<(Vec<f32>, Vec<f32>, Side)> = Vec::new();
    let mut truncated = false;
    let mut ply = 0usize;

    while !board.outcome().is_terminal() {
        if ply >= params.max_plies || stop.map_or(false, |s| s.load(Ordering::Relaxed)) {
            truncated = true;
            break;
        }
        mcts.run_with_stop(&board, params.simulations.max(1), stop)?;
        if stop.map_or(false, |s| s.load(Ordering::Relaxed)) {
            truncated = true;
            break;
        }
        let side = board.side_to_move();
        let Some(action) = choose_action(&mcts, params, ply, &mut rng) else {
            return Err(SearchError::EvaluatorContract("search produced no root children".into()));
        };
        let policy = mcts.policy_vector(params.temperature_at(ply).max(1e-3));
        pending.push((encoder::encode_state(&board, side), policy, side));

        let mv = encoder::decode_move(&board, action, side)?;
        debug!("ply {ply}: {side:?} plays {mv} (action {action})");
        board.apply(mv)?;
        mcts.advance(action);
        ply += 1;
    }

    let outcome = if truncated { Outcome::Tie } else { board.outcome() };
    let examples = pending
        .into_iter()
        .map(|(state, policy, player)| TrainingExample { state, policy, player, z: outcome.value_for(player) })
        .collect();
    info!("self-play game finished after {ply} plies: {outcome:?}{}", if truncated { " (truncated)" } else { "" });
    Ok(GameRecord { outcome, truncated, replay: Replay::from_board(&board), examples })
}

/// Run `params.games` independent games in parallel. Each game owns its
/// evaluator and a seed derived from `params.seed`; `on_game` is called as
/// games finish.
pub fn generate_games<E, F, P>(params: &SelfPlayParams, make_evaluator: F, on_game: P) -> Result<Vec<GameRecord>, SearchError>
where
    E: Evaluator,
    F: Fn(usize) -> E + Sync,
    P: Fn(&GameRecord) + Sync,
{
    (0..params.games)
        .into_par_iter()
        .map(|gi| {
            let record = play_game(make_evaluator(gi), params, game_seed(params.seed, gi), None)?;
            on_game(&record);
            Ok::<_, SearchError>(record)
        })
        .collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordBin {
    pub player: u8, // 0 red, 1 black
    pub z: i8,      // from player's perspective
    pub state: Vec<u8>,
    pub policy: Vec<f32>,
}

pub const SHARD_MAGIC: &[u8; 8] = b"XQSP0001"; // Xiangqi Self-Play v1

/// Bytes per record for a state of `state_len` cells.
pub fn record_size(state_len: usize) -> usize { 1 + 1 + 2 + state_len + ACTION_SPACE * 4 }

pub fn flatten_game_to_records(game: &GameRecord) -> Vec<RecordBin> {
    game.examples
        .iter()
        .map(|ex| RecordBin {
            player: ex.player.index() as u8,
            z: ex.z as i8,
            state: ex.state.iter().map(|&v| v as u8).collect(),
            policy: ex.policy.clone(),
        })
        .collect()
}

/// Write shard files `shard_NNNNNN.bin`: magic, little-endian `u32` state
/// length, then fixed-size records.
pub fn write_shards<P: AsRef<Path>>(games: &[GameRecord], out_dir: P, max_records_per_shard: usize) -> std::io::Result<Vec<PathBuf>> {
    create_dir_all(&out_dir)?;
    let mut shard_index = 0usize;
    let mut rec_in_shard = 0usize;
    let mut out_paths = Vec::new();
    let mut writer: Option<BufWriter<File>> = None;

    let mut start_new_shard = |idx: usize, state_len: usize| -> std::io::Result<BufWriter<File>> {
        let path = out_dir.as_ref().join(format!("shard_{:06}.bin", idx));
        let mut f = BufWriter::new(File::create(&path)?);
        f.write_all(SHARD_MAGIC)?;
        f.write_all(&(state_len as u32).to_le_bytes())?;
        out_paths.push(path);
        Ok(f)
    };

    for g in games {
        for r in flatten_game_to_records(g) {
            if writer.is_none() || rec_in_shard >= max_records_per_shard.max(1) {
                if let Some(mut w) = writer.take() { w.flush()?; }
                writer = Some(start_new_shard(shard_index, r.state.len())?);
                shard_index += 1;
                rec_in_shard = 0;
            }
            let Some(w) = writer.as_mut() else { continue };
            let mut buf = Vec::with_capacity(record_size(r.state.len()));
            buf.push(r.player);
            buf.push(r.z as u8);
            buf.extend_from_slice(&[0u8; 2]);
            buf.extend_from_slice(&r.state);
            for p in &r.policy {
                buf.extend_from_slice(&p.to_le_bytes());
            }
            w.write_all(&buf)?;
            rec_in_shard += 1;
        }
    }
    if let Some(mut w) = writer { w.flush()?; }
    Ok(out_paths)
}

pub fn read_shard<P: AsRef<Path>>(path: P) -> std::io::Result<Vec<RecordBin>> {
    let mut f = BufReader::new(File::open(path)?);
    let mut magic = [0u8; 8];
    f.read_exact(&mut magic)?;
    if &magic != SHARD_MAGIC { return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "bad magic")); }
    let mut len_bytes = [0u8; 4];
    f.read_exact(&mut len_bytes)?;
    let state_len = u32::from_le_bytes(len_bytes) as usize;
    let mut recs = Vec::new();
    let mut buf = vec![0u8; record_size(state_len)];
    loop {
        match f.read_exact(&mut buf) {
            Ok(()) => {
                let state = buf[4..4 + state_len].to_vec();
                let policy = buf[4 + state_len..]
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                recs.push(RecordBin { player: buf[0], z: buf[1] as i8, state, policy });
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e),
        }
    }
    Ok(recs)
}
