//! Interactive game sessions.
//!
//! A [`GameSession`] owns the board and one [`Agent`] per side and drives
//! the move loop. Human agents are fed from another thread through a
//! [`HumanInput`] handle, usually after a [`Selection`] has turned two
//! clicks (piece, then destination) into a [`Move`].

use anyhow::{anyhow, bail};
use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;

use crate::board::{piece_info, Board, Coord, Move, Outcome, RulesConfig, Side};
use crate::encoder;
use crate::evaluator::{Evaluator, MaterialEvaluator};
use crate::mcts::{Mcts, MctsConfig};
use crate::replay::Replay;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameMode {
    HumanVsHuman,
    /// Human plays red, the bot plays black.
    HumanVsBot,
    BotVsBot,
}

pub trait Agent: Send {
    fn name(&self) -> &str;

    /// Pick a move for the side to move on `board`.
    fn choose_move(&mut self, board: &Board) -> anyhow::Result<Move>;

    /// Called for every move applied to the game, by either side, with the
    /// board as it was before the move.
    fn observe(&mut self, _before: &Board, _mv: Move) {}

    fn reset(&mut self) {}
}

pub struct MctsAgent<E: Evaluator> {
    name: String,
    mcts: Mcts<E>,
    stop: Option<Arc<AtomicBool>>,
}

impl<E: Evaluator> MctsAgent<E> {
    pub fn new(name: impl Into<String>, evaluator: E, config: MctsConfig) -> Self {
        Self { name: name.into(), mcts: Mcts::new(evaluator, config), stop: None }
    }

    /// Cut searches short once `stop` is raised.
    pub fn with_stop(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn tree(&self) -> &Mcts<E> { &self.mcts }
}

impl<E: Evaluator + Send> Agent for MctsAgent<E> {
    fn name(&self) -> &str { &self.name }

    fn choose_move(&mut self, board: &Board) -> anyhow::Result<Move> {
        let sims = self.mcts.config().simulations.max(1);
        self.mcts.run_with_stop(board, sims, self.stop.as_deref())?;
        debug!("{} value {:.3}\n{}", self.name, -self.mcts.root_q(), self.mcts.statistics_string());
        let action = self
            .mcts
            .best_action()
            .ok_or_else(|| anyhow!("{}: search finished without a root move", self.name))?;
        Ok(encoder::decode_move(board, action, board.side_to_move())?)
    }

    fn observe(&mut self, before: &Board, mv: Move) {
        match encoder::encode_move(before, mv.piece, mv.to) {
            Ok(action) => self.mcts.advance(action),
            Err(e) => {
                warn!("{}: dropping search tree ({e})", self.name);
                self.mcts.reset();
            }
        }
    }

    fn reset(&mut self) { self.mcts.reset(); }
}

/// Uniformly random legal moves.
pub struct RandomAgent {
    name: String,
    rng: SmallRng,
}

impl RandomAgent {
    pub fn new(name: impl Into<String>, seed: u64) -> Self {
        Self { name: name.into(), rng: SmallRng::seed_from_u64(seed) }
    }
}

impl Agent for RandomAgent {
    fn name(&self) -> &str { &self.name }

    fn choose_move(&mut self, board: &Board) -> anyhow::Result<Move> {
        let moves = board.legal_moves(board.side_to_move());
        moves.choose(&mut self.rng).copied().ok_or_else(|| anyhow!("{}: no legal move", self.name))
    }
}

/// Sending half of a human agent. Holds at most one undelivered move.
#[derive(Clone, Debug)]
pub struct HumanInput {
    tx: SyncSender<Move>,
}

impl HumanInput {
    /// Queue `mv` for the agent. Returns `false` when a move is already
    /// pending or the agent is gone.
    pub fn submit(&self, mv: Move) -> bool {
        match self.tx.try_send(mv) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("move {mv} dropped: previous move still pending");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// Waits for moves submitted through its [`HumanInput`]. Illegal submissions
/// are skipped; the turn fails once every input handle has been dropped.
pub struct HumanAgent {
    name: String,
    rx: Receiver<Move>,
}

impl HumanAgent {
    pub fn new(name: impl Into<String>) -> (Self, HumanInput) {
        let (tx, rx) = sync_channel(1);
        (Self { name: name.into(), rx }, HumanInput { tx })
    }
}

impl Agent for HumanAgent {
    fn name(&self) -> &str { &self.name }

    fn choose_move(&mut self, board: &Board) -> anyhow::Result<Move> {
        let side = board.side_to_move();
        loop {
            let mv = self.rx.recv().map_err(|_| anyhow!("{}: input closed", self.name))?;
            let owned = piece_info(mv.piece).map(|i| i.owner) == Some(side);
            if owned && board.is_legal(mv.piece, mv.to) {
                return Ok(mv);
            }
            warn!("{}: ignoring illegal move {mv}", self.name);
        }
    }

    fn reset(&mut self) {
        while self.rx.try_recv().is_ok() {}
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SelectionEvent {
    /// A piece of the side to move is now selected.
    Selected(u8),
    /// The selected piece can legally go to the clicked square.
    Moved(Move),
    /// Input had no effect; the previous selection is unchanged.
    Ignored,
}

/// Two-phase piece/destination picker for the side to move.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    selected: Option<u8>,
}

impl Selection {
    pub fn new() -> Self { Self::default() }

    pub fn selected(&self) -> Option<u8> { self.selected }

    pub fn clear(&mut self) { self.selected = None; }

    /// Destinations of the selected piece.
    pub fn destinations<'a>(&self, board: &'a Board) -> &'a [Coord] {
        self.selected.map(|p| board.legal_destinations(p)).unwrap_or(&[])
    }

    /// Select `piece` if it is on the board and belongs to the side to move.
    pub fn select_piece(&mut self, board: &Board, piece: u8) -> SelectionEvent {
        let own = piece_info(piece).map(|i| i.owner) == Some(board.side_to_move());
        if own && board.find_piece(piece).is_some() {
            self.selected = Some(piece);
            SelectionEvent::Selected(piece)
        } else {
            SelectionEvent::Ignored
        }
    }

    /// Click on `coord`: reselects when it holds an own piece, otherwise
    /// completes the move if the selected piece may go there.
    pub fn select_coord(&mut self, board: &Board, coord: Coord) -> SelectionEvent {
        if !coord.is_valid() { return SelectionEvent::Ignored; }
        let id = board.piece_at(coord);
        if id != 0 {
            if let SelectionEvent::Selected(p) = self.select_piece(board, id) {
                return SelectionEvent::Selected(p);
            }
        }
        match self.selected {
            Some(piece) if board.is_legal(piece, coord) => {
                self.selected = None;
                SelectionEvent::Moved(Move::new(piece, coord))
            }
            _ => SelectionEvent::Ignored,
        }
    }
}

/// How a session ended.
#[derive(Clone, Debug)]
pub struct GameRecord {
    /// `Ongoing` when the session was stopped before the game finished.
    pub outcome: Outcome,
    pub replay: Replay,
}

pub struct GameSession {
    board: Board,
    agents: [Box<dyn Agent>; 2],
}

impl GameSession {
    pub fn new(start_player: Side, rules: RulesConfig, red: Box<dyn Agent>, black: Box<dyn Agent>) -> Self {
        Self { board: Board::with_config(start_player, rules), agents: [red, black] }
    }

    /// Standard agents for `mode`. The returned inputs are indexed by side
    /// and only present for human players.
    pub fn for_mode(
        mode: GameMode,
        start_player: Side,
        rules: RulesConfig,
        mcts: MctsConfig,
        stop: Arc<AtomicBool>,
    ) -> (Self, [Option<HumanInput>; 2]) {
        let bot = |name: &str| -> Box<dyn Agent> {
            Box::new(MctsAgent::new(name, MaterialEvaluator::default(), mcts).with_stop(stop.clone()))
        };
        let human = |name: &str| {
            let (agent, input) = HumanAgent::new(name);
            (Box::new(agent) as Box<dyn Agent>, Some(input))
        };
        let ((red, red_in), (black, black_in)) = match mode {
            GameMode::HumanVsHuman => (human("red"), human("black")),
            GameMode::HumanVsBot => (human("red"), (bot("bot"), None)),
            GameMode::BotVsBot => ((bot("bot-red"), None), (bot("bot-black"), None)),
        };
        debug!("session {mode:?}, {:?} moves first, {} simulations per bot move", start_player, mcts.simulations);
        (Self::new(start_player, rules, red, black), [red_in, black_in])
    }

    pub fn board(&self) -> &Board { &self.board }

    pub fn agent(&self, side: Side) -> &dyn Agent { self.agents[side.index()].as_ref() }

    pub fn play(&mut self, stop: &AtomicBool) -> anyhow::Result<GameRecord> {
        self.play_observed(stop, |_, _| {})
    }

    /// Run the game to completion, calling `on_move` with the updated board
    /// after every move. Returns early, between moves, once `stop` is set.
    pub fn play_observed<F>(&mut self, stop: &AtomicBool, mut on_move: F) -> anyhow::Result<GameRecord>
    where
        F: FnMut(&Board, Move),
    {
        info!(
            "game start: {} (red) vs {} (black), {:?} moves first",
            self.agents[0].name(),
            self.agents[1].name(),
            self.board.start_player()
        );
        let mut outcome = self.board.outcome();
        while !outcome.is_terminal() {
            if stop.load(Ordering::Relaxed) {
                info!("game stopped after {} moves", self.board.moves_played().len());
                break;
            }
            let side = self.board.side_to_move();
            let agent = &mut self.agents[side.index()];
            let mv = match agent.choose_move(&self.board) {
                Ok(mv) => mv,
                Err(e) if stop.load(Ordering::Relaxed) => {
                    debug!("{} interrupted: {e:#}", agent.name());
                    break;
                }
                Err(e) => return Err(e),
            };
            if stop.load(Ordering::Relaxed) {
                break;
            }
            if !self.board.is_legal(mv.piece, mv.to) {
                bail!("{} chose illegal move {mv}", agent.name());
            }
            info!("{} ({side:?}) plays {mv}", agent.name());
            let before = self.board.clone();
            self.board.apply(mv)?;
            for a in self.agents.iter_mut() {
                a.observe(&before, mv);
            }
            on_move(&self.board, mv);
            outcome = self.board.outcome();
        }
        if outcome.is_terminal() {
            info!("game over after {} moves: {outcome:?}", self.board.moves_played().len());
        }
        Ok(GameRecord { outcome, replay: Replay::from_board(&self.board) })
    }

    /// Fresh board with the same rules; agents drop any search state.
    pub fn restart(&mut self, start_player: Side) {
        self.board.init(start_player);
        for a in self.agents.iter_mut() {
            a.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::UniformEvaluator;

    #[test]
    fn selection_requires_own_piece_first() {
        let b = Board::new(Side::Red);
        let mut s = Selection::new();
        assert_eq!(s.select_coord(&b, Coord::new(0, 0)), SelectionEvent::Ignored);
        assert_eq!(s.select_coord(&b, Coord::new(5, 0)), SelectionEvent::Ignored);
        assert_eq!(s.select_coord(&b, Coord::new(6, 0)), SelectionEvent::Selected(1));
        assert_eq!(s.destinations(&b), &[Coord::new(5, 0)]);
    }

    #[test]
    fn selection_reselects_and_completes() {
        let b = Board::new(Side::Red);
        let mut s = Selection::new();
        s.select_piece(&b, 1);
        assert_eq!(s.select_coord(&b, Coord::new(6, 2)), SelectionEvent::Selected(2));
        // not reachable for soldier 2
        assert_eq!(s.select_coord(&b, Coord::new(5, 0)), SelectionEvent::Ignored);
        assert_eq!(s.selected(), Some(2));
        assert_eq!(s.select_coord(&b, Coord::new(5, 2)), SelectionEvent::Moved(Move::new(2, Coord::new(5, 2))));
        assert_eq!(s.selected(), None);
    }

    #[test]
    fn human_input_holds_one_move() {
        let (_agent, input) = HumanAgent::new("h");
        assert!(input.submit(Move::new(1, Coord::new(5, 0))));
        assert!(!input.submit(Move::new(2, Coord::new(5, 2))));
    }

    #[test]
    fn human_agent_skips_illegal_submissions() {
        let b = Board::new(Side::Red);
        let (mut agent, input) = HumanAgent::new("h");
        let feeder = std::thread::spawn(move || {
            for mv in [Move::new(17, Coord::new(4, 8)), Move::new(1, Coord::new(5, 0))] {
                while !input.submit(mv) {
                    std::thread::yield_now();
                }
            }
        });
        assert_eq!(agent.choose_move(&b).unwrap(), Move::new(1, Coord::new(5, 0)));
        feeder.join().unwrap();
    }

    #[test]
    fn mcts_agent_follows_the_game() {
        let b = Board::new(Side::Red);
        let mut agent = MctsAgent::new("bot", UniformEvaluator, MctsConfig { c_puct: 5.0, simulations: 60 });
        let mv = agent.choose_move(&b).unwrap();
        assert!(b.is_legal(mv.piece, mv.to));
        let before_root = agent.tree().root_visits();
        agent.observe(&b, mv);
        assert!(agent.tree().root_visits() < before_root);
    }

    #[test]
    fn stopped_session_returns_ongoing() {
        let stop = AtomicBool::new(true);
        let mut session = GameSession::new(
            Side::Red,
            RulesConfig::default(),
            Box::new(RandomAgent::new("a", 1)),
            Box::new(RandomAgent::new("b", 2)),
        );
        let rec = session.play(&stop).unwrap();
        assert_eq!(rec.outcome, Outcome::Ongoing);
        assert!(rec.replay.steps.is_empty());
    }
}
