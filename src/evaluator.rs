//! Evaluator capability consumed by the search.
//!
//! An evaluator returns priors over the legal actions of the side to move and
//! a value in [-1, 1] from that side's point of view. Anything the search
//! receives goes through [`Evaluation::validated`] first.

use log::warn;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::board::{Board, PieceKind, Side, piece_info};
use crate::encoder::{self, Action, ACTION_SPACE};
use crate::error::SearchError;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Evaluation {
    pub priors: Vec<(Action, f32)>,
    pub value: f32,
}

impl Evaluation {
    /// Check the evaluator contract for `side` on `board`, renormalising
    /// positive mass that does not sum to one.
    pub fn validated(mut self, board: &Board, side: Side) -> Result<Self, SearchError> {
        if !self.value.is_finite() || !(-1.0..=1.0).contains(&self.value) {
            return Err(SearchError::EvaluatorContract(format!("value {} outside [-1, 1]", self.value)));
        }
        let mask = encoder::legal_action_mask(board, side);
        let mut seen = [false; ACTION_SPACE];
        let mut total = 0.0f32;
        for &(a, p) in &self.priors {
            if a >= ACTION_SPACE || !mask[a] {
                return Err(SearchError::EvaluatorContract(format!("prior for illegal action {a}")));
            }
            if seen[a] {
                return Err(SearchError::EvaluatorContract(format!("duplicate prior for action {a}")));
            }
            seen[a] = true;
            if !p.is_finite() || p < 0.0 {
                return Err(SearchError::EvaluatorContract(format!("invalid prior {p} for action {a}")));
            }
            total += p;
        }
        if self.priors.is_empty() {
            if mask.iter().any(|&legal| legal) {
                return Err(SearchError::EvaluatorContract("no priors for a position with legal moves".into()));
            }
            return Ok(self);
        }
        if total <= 0.0 {
            return Err(SearchError::EvaluatorContract("priors carry no probability mass".into()));
        }
        if (total - 1.0).abs() > 1e-3 {
            warn!("renormalising evaluator priors (sum {total:.4})");
        }
        for (_, p) in &mut self.priors {
            *p /= total;
        }
        Ok(self)
    }
}

pub trait Evaluator {
    fn evaluate(&mut self, board: &Board, side: Side) -> anyhow::Result<Evaluation>;
}

impl<E: Evaluator + ?Sized> Evaluator for Box<E> {
    fn evaluate(&mut self, board: &Board, side: Side) -> anyhow::Result<Evaluation> {
        (**self).evaluate(board, side)
    }
}

fn uniform_priors(board: &Board, side: Side) -> Vec<(Action, f32)> {
    let actions = encoder::legal_actions(board, side);
    let p = 1.0 / actions.len().max(1) as f32;
    actions.into_iter().map(|a| (a, p)).collect()
}

/// Equal priors over legal actions, neutral value.
#[derive(Clone, Copy, Debug, Default)]
pub struct UniformEvaluator;

impl Evaluator for UniformEvaluator {
    fn evaluate(&mut self, board: &Board, side: Side) -> anyhow::Result<Evaluation> {
        Ok(Evaluation { priors: uniform_priors(board, side), value: 0.0 })
    }
}

/// Seeded random priors and value. Deterministic for a given seed and call
/// sequence.
#[derive(Clone, Debug)]
pub struct RandomEvaluator {
    rng: SmallRng,
}

impl RandomEvaluator {
    pub fn new(seed: u64) -> Self { Self { rng: SmallRng::seed_from_u64(seed) } }
}

impl Evaluator for RandomEvaluator {
    fn evaluate(&mut self, board: &Board, side: Side) -> anyhow::Result<Evaluation> {
        let actions = encoder::legal_actions(board, side);
        let mut priors: Vec<(Action, f32)> = actions.into_iter().map(|a| (a, self.rng.gen_range(0.01f32..1.0))).collect();
        let sum: f32 = priors.iter().map(|(_, p)| p).sum();
        if sum > 0.0 { for (_, p) in &mut priors { *p /= sum; } }
        Ok(Evaluation { priors, value: self.rng.gen_range(-1.0f32..=1.0) })
    }
}

fn piece_value(kind: PieceKind) -> f32 {
    match kind {
        PieceKind::Soldier => 1.0,
        PieceKind::Cannon => 4.5,
        PieceKind::Chariot => 9.0,
        PieceKind::Horse => 4.0,
        PieceKind::Elephant => 2.0,
        PieceKind::Advisor => 2.0,
        PieceKind::General => 0.0,
    }
}

/// Material balance, positive when `side` is ahead.
pub fn material_balance(board: &Board, side: Side) -> f32 {
    let mut score = 0.0;
    for row in board.grid().iter() {
        for &id in row.iter() {
            let Some(info) = piece_info(id) else { continue };
            let v = piece_value(info.kind);
            if info.owner == side { score += v } else { score -= v }
        }
    }
    score
}

/// Uniform priors with a squashed material value.
#[derive(Clone, Copy, Debug)]
pub struct MaterialEvaluator {
    pub scale: f32,
}

impl Default for MaterialEvaluator {
    fn default() -> Self { Self { scale: 10.0 } }
}

impl Evaluator for MaterialEvaluator {
    fn evaluate(&mut self, board: &Board, side: Side) -> anyhow::Result<Evaluation> {
        let value = (material_balance(board, side) / self.scale.max(1e-3)).tanh();
        Ok(Evaluation { priors: uniform_priors(board, side), value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn material_is_balanced_at_start() {
        let b = Board::new(Side::Red);
        assert_eq!(material_balance(&b, Side::Red), 0.0);
        let e = MaterialEvaluator::default().evaluate(&b, Side::Black).unwrap();
        assert_eq!(e.value, 0.0);
        assert_eq!(e.priors.len(), 44);
    }

    #[test]
    fn validation_rejects_bad_output() {
        let b = Board::new(Side::Red);
        let bad_value = Evaluation { priors: vec![(1, 1.0)], value: 1.5 };
        assert!(bad_value.validated(&b, Side::Red).is_err());
        let illegal = Evaluation { priors: vec![(0, 1.0)], value: 0.0 };
        assert!(illegal.validated(&b, Side::Red).is_err());
        let negative = Evaluation { priors: vec![(1, -0.5)], value: 0.0 };
        assert!(negative.validated(&b, Side::Red).is_err());
    }

    fn rejection(e: Evaluation) -> String {
        match e.validated(&Board::new(Side::Red), Side::Red) {
            Err(SearchError::EvaluatorContract(msg)) => msg,
            other => panic!("expected a contract violation, got {other:?}"),
        }
    }

    #[test]
    fn validation_rejects_nan_duplicates_and_empty_mass() {
        assert!(rejection(Evaluation { priors: vec![(1, 1.0)], value: f32::NAN }).starts_with("value"));
        assert!(rejection(Evaluation { priors: vec![(1, f32::NAN)], value: 0.0 }).starts_with("invalid prior"));
        assert!(rejection(Evaluation { priors: vec![(1, 0.5), (1, 0.5)], value: 0.0 }).starts_with("duplicate"));
        assert!(rejection(Evaluation { priors: vec![(1, 0.0), (5, 0.0)], value: 0.0 }).contains("no probability mass"));
        assert!(rejection(Evaluation { priors: vec![], value: 0.0 }).contains("no priors"));
    }

    #[test]
    fn validation_renormalises() {
        let b = Board::new(Side::Red);
        let e = Evaluation { priors: vec![(1, 2.0), (5, 2.0)], value: 0.0 };
        let v = e.validated(&b, Side::Red).unwrap();
        assert!((v.priors[0].1 - 0.5).abs() < 1e-6);
        assert!((v.priors[1].1 - 0.5).abs() < 1e-6);
    }
}
