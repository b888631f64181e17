// Xiangqi rules, action encoding, PUCT search and self-play
pub mod board;
pub mod encoder;
pub mod error;
pub mod evaluator;
pub mod gameplay;
pub mod mcts;
pub mod perft;
pub mod replay;
pub mod selfplay;

pub use board::{Board, Coord, Move, Outcome, RulesConfig, Side};
pub use encoder::{Action, ACTION_SPACE};
pub use error::{ReplayError, RulesError, SearchError};
pub use evaluator::{Evaluation, Evaluator};
pub use mcts::{Mcts, MctsConfig};
