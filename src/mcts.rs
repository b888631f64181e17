//! PUCT Monte-Carlo tree search over an index arena.
//!
//! Leaves are scored by an [`Evaluator`] instead of rollouts. A node's `q` is
//! the mean value from the point of view of the side that played the move
//! leading into it, so a parent simply maximises over its children.

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::board::Board;
use crate::encoder::{self, Action, ACTION_SPACE};
use crate::error::SearchError;
use crate::evaluator::Evaluator;

const VISIT_EPS: f64 = 1e-10;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MctsConfig {
    pub c_puct: f32,
    pub simulations: usize,
}

impl Default for MctsConfig {
    fn default() -> Self { Self { c_puct: 5.0, simulations: 200 } }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize { self.0 as usize }
}

#[derive(Clone, Debug)]
pub struct Node {
    parent: Option<NodeId>,
    prior: f32,
    visits: u32,
    q: f32,
    children: Vec<(Action, NodeId)>,
    expanded: bool,
}

impl Node {
    fn new(parent: Option<NodeId>, prior: f32) -> Self {
        Self { parent, prior, visits: 0, q: 0.0, children: Vec::new(), expanded: false }
    }

    pub fn parent(&self) -> Option<NodeId> { self.parent }
    pub fn prior(&self) -> f32 { self.prior }
    pub fn visits(&self) -> u32 { self.visits }
    pub fn q(&self) -> f32 { self.q }
    pub fn children(&self) -> &[(Action, NodeId)] { &self.children }
    pub fn is_expanded(&self) -> bool { self.expanded }

    /// PUCT score of this node seen from its parent.
    pub fn puct(&self, parent_visits_sqrt: f32, c_puct: f32) -> f32 {
        self.q + c_puct * self.prior * parent_visits_sqrt / (1.0 + self.visits as f32)
    }
}

pub struct Mcts<E: Evaluator> {
    nodes: Vec<Node>,
    root: NodeId,
    evaluator: E,
    config: MctsConfig,
}

impl<E: Evaluator> Mcts<E> {
    pub fn new(evaluator: E, config: MctsConfig) -> Self {
        Self { nodes: vec![Node::new(None, 1.0)], root: NodeId(0), evaluator, config }
    }

    pub fn config(&self) -> &MctsConfig { &self.config }
    pub fn root(&self) -> NodeId { self.root }
    pub fn node(&self, id: NodeId) -> &Node { &self.nodes[id.index()] }
    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn root_visits(&self) -> u32 { self.node(self.root).visits }
    pub fn root_q(&self) -> f32 { self.node(self.root).q }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Child maximising the PUCT score; the earliest child wins ties.
    pub fn select_child(&self, id: NodeId) -> Option<(Action, NodeId)> {
        let node = self.node(id);
        let sqrt_n = (node.visits as f32).sqrt();
        let mut best: Option<((Action, NodeId), f32)> = None;
        for &(action, child) in &node.children {
            let score = self.node(child).puct(sqrt_n, self.config.c_puct);
            match best {
                Some((_, s)) if score <= s => {}
                _ => best = Some(((action, child), score)),
            }
        }
        best.map(|(pick, _)| pick)
    }

    /// Attach children for actions not seen before. A node expands once.
    pub fn expand(&mut self, id: NodeId, priors: &[(Action, f32)]) {
        if self.node(id).expanded { return; }
        for &(action, prior) in priors {
            if self.node(id).children.iter().any(|&(a, _)| a == action) { continue; }
            let child = self.alloc(Node::new(Some(id), prior));
            self.nodes[id.index()].children.push((action, child));
        }
        self.nodes[id.index()].expanded = true;
    }

    /// Fold `value` into `id` and every ancestor, flipping sign per ply.
    pub fn backup(&mut self, id: NodeId, value: f32) {
        let mut cur = Some(id);
        let mut v = value;
        while let Some(nid) = cur {
            let node = &mut self.nodes[nid.index()];
            node.visits += 1;
            node.q += (v - node.q) / node.visits as f32;
            v = -v;
            cur = node.parent;
        }
    }

    /// One descend / evaluate / expand / backup pass from `board`, which must
    /// be the position the root stands for.
    pub fn simulate(&mut self, board: &Board) -> Result<(), SearchError> {
        let mut scratch = board.clone();
        let mut id = self.root;
        while self.node(id).expanded {
            let Some((action, child)) = self.select_child(id) else { break };
            let mv = encoder::decode_move(&scratch, action, scratch.side_to_move())?;
            scratch.apply(mv)?;
            id = child;
        }

        let side = scratch.side_to_move();
        let outcome = scratch.outcome();
        let leaf_value = if outcome.is_terminal() {
            outcome.value_for(side)
        } else {
            let eval = self
                .evaluator
                .evaluate(&scratch, side)
                .map_err(SearchError::Evaluator)?
                .validated(&scratch, side)?;
            self.expand(id, &eval.priors);
            eval.value
        };
        trace!("leaf {:?} outcome {:?} value {:.3}", id, outcome, leaf_value);
        // leaf_value is for the side to move at the leaf; the leaf node
        // records it for the side that moved into it.
        self.backup(id, -leaf_value);
        Ok(())
    }

    pub fn run(&mut self, board: &Board, simulations: usize) -> Result<Vec<(Action, u32)>, SearchError> {
        self.run_with_stop(board, simulations, None)
    }

    /// Like [`run`](Self::run) but returns early, between simulations, once
    /// `stop` is raised.
    pub fn run_with_stop(
        &mut self,
        board: &Board,
        simulations: usize,
        stop: Option<&AtomicBool>,
    ) -> Result<Vec<(Action, u32)>, SearchError> {
        let mut done = 0usize;
        for _ in 0..simulations {
            if stop.map_or(false, |s| s.load(Ordering::Relaxed)) { break; }
            self.simulate(board)?;
            done += 1;
        }
        debug!(
            "search: {} simulations, {} nodes, root visits {}, best {:?}",
            done,
            self.nodes.len(),
            self.root_visits(),
            self.best_action()
        );
        Ok(self.root_visit_counts())
    }

    pub fn root_visit_counts(&self) -> Vec<(Action, u32)> {
        self.node(self.root)
            .children
            .iter()
            .map(|&(a, c)| (a, self.node(c).visits))
            .collect()
    }

    /// Most visited root action; the earliest child wins ties.
    pub fn best_action(&self) -> Option<Action> {
        let mut best: Option<(Action, u32)> = None;
        for (a, n) in self.root_visit_counts() {
            if best.map_or(true, |(_, bn)| n > bn) { best = Some((a, n)); }
        }
        best.map(|(a, _)| a)
    }

    /// `softmax(ln(N + eps) / temperature)` over the root's children.
    pub fn move_probabilities(&self, temperature: f32) -> Vec<(Action, f32)> {
        let counts = self.root_visit_counts();
        if counts.is_empty() { return Vec::new(); }
        let t = (temperature as f64).max(1e-3);
        let logits: Vec<f64> = counts.iter().map(|&(_, n)| (n as f64 + VISIT_EPS).ln() / t).collect();
        let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
        let sum: f64 = exps.iter().sum();
        counts
            .iter()
            .zip(exps)
            .map(|(&(a, _), e)| (a, (e / sum) as f32))
            .collect()
    }

    /// Dense form of [`move_probabilities`](Self::move_probabilities).
    pub fn policy_vector(&self, temperature: f32) -> Vec<f32> {
        let mut out = vec![0.0f32; ACTION_SPACE];
        for (a, p) in self.move_probabilities(temperature) {
            out[a] = p;
        }
        out
    }

    /// Re-root on `action`. The child's subtree is kept and compacted into a
    /// fresh arena; without such a child the tree restarts from scratch.
    pub fn advance(&mut self, action: Action) {
        let child = self
            .node(self.root)
            .children
            .iter()
            .find(|&&(a, _)| a == action)
            .map(|&(_, c)| c);
        match child {
            Some(c) => self.compact_from(c),
            None => self.reset(),
        }
    }

    pub fn reset(&mut self) {
        self.nodes.clear();
        self.nodes.push(Node::new(None, 1.0));
        self.root = NodeId(0);
    }

    fn compact_from(&mut self, new_root: NodeId) {
        let mut old = std::mem::take(&mut self.nodes);
        let mut kept: Vec<Node> = Vec::new();
        let mut queue: VecDeque<(NodeId, Option<NodeId>)> = VecDeque::new();
        queue.push_back((new_root, None));
        while let Some((old_id, parent)) = queue.pop_front() {
            let new_id = NodeId(kept.len() as u32);
            let mut node = std::mem::replace(&mut old[old_id.index()], Node::new(None, 0.0));
            node.parent = parent;
            // Ids follow pop order, so a child's new id is fixed by its queue slot.
            let base = kept.len() + 1 + queue.len();
            for (i, (_, c)) in node.children.iter_mut().enumerate() {
                queue.push_back((*c, Some(new_id)));
                *c = NodeId((base + i) as u32);
            }
            kept.push(node);
        }
        self.nodes = kept;
        self.root = NodeId(0);
    }

    /// Table of the most visited root children.
    pub fn statistics_string(&self) -> String {
        let mut s = String::from("|  action  |     P     |     N     |     Q     |   PUCT    |\n");
        let root = self.node(self.root);
        let sqrt_n = (root.visits as f32).sqrt();
        let mut children: Vec<(Action, &Node)> = root.children.iter().map(|&(a, c)| (a, self.node(c))).collect();
        children.sort_by(|a, b| b.1.visits.cmp(&a.1.visits));
        for (a, n) in children.iter().take(10) {
            s.push_str(&format!(
                "|{:^10}|{:^11.4}|{:^11}|{:^11.4}|{:^11.4}|\n",
                a, n.prior, n.visits, n.q, n.puct(sqrt_n, self.config.c_puct)
            ));
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Side;
    use crate::evaluator::UniformEvaluator;

    fn tree() -> Mcts<UniformEvaluator> { Mcts::new(UniformEvaluator, MctsConfig::default()) }

    #[test]
    fn backup_flips_sign_per_ply() {
        let mut t = tree();
        let root = t.root();
        t.expand(root, &[(1, 0.5), (5, 0.5)]);
        let child = t.node(root).children()[0].1;
        t.expand(child, &[(3, 1.0)]);
        let grandchild = t.node(child).children()[0].1;
        t.backup(grandchild, 1.0);
        assert_eq!(t.node(grandchild).q(), 1.0);
        assert_eq!(t.node(child).q(), -1.0);
        assert_eq!(t.node(root).q(), 1.0);
        t.backup(grandchild, 0.0);
        assert_eq!(t.node(grandchild).visits(), 2);
        assert!((t.node(grandchild).q() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn select_prefers_prior_then_first_on_ties() {
        let mut t = tree();
        let root = t.root();
        t.expand(root, &[(1, 0.3), (5, 0.7)]);
        t.backup(root, 0.0);
        assert_eq!(t.select_child(root).map(|(a, _)| a), Some(5));

        let mut u = tree();
        let r = u.root();
        u.expand(r, &[(9, 0.5), (2, 0.5)]);
        u.backup(r, 0.0);
        assert_eq!(u.select_child(r).map(|(a, _)| a), Some(9));
    }

    #[test]
    fn expand_happens_once() {
        let mut t = tree();
        let root = t.root();
        t.expand(root, &[(1, 1.0)]);
        t.expand(root, &[(5, 1.0)]);
        assert_eq!(t.node(root).children().len(), 1);
        assert_eq!(t.node_count(), 2);
    }

    #[test]
    fn run_visits_root_children() {
        let b = Board::new(Side::Red);
        let mut t = tree();
        let counts = t.run(&b, 50).unwrap();
        assert_eq!(counts.len(), 44);
        assert_eq!(t.root_visits(), 50);
        let total: u32 = counts.iter().map(|(_, n)| n).sum();
        assert_eq!(total, 49);
    }

    #[test]
    fn advance_keeps_subtree_and_drops_siblings() {
        let b = Board::new(Side::Red);
        let mut t = tree();
        t.run(&b, 200).unwrap();
        let best = t.best_action().unwrap();
        let (_, child) = *t.node(t.root()).children().iter().find(|(a, _)| *a == best).unwrap();
        let child_visits = t.node(child).visits();
        let child_kids = t.node(child).children().len();
        t.advance(best);
        assert_eq!(t.root_visits(), child_visits);
        assert_eq!(t.node(t.root()).children().len(), child_kids);
        assert!(t.node(t.root()).parent().is_none());
        for &(_, c) in t.node(t.root()).children() {
            assert_eq!(t.node(c).parent(), Some(t.root()));
        }
        t.advance(usize::MAX);
        assert_eq!(t.node_count(), 1);
        assert_eq!(t.root_visits(), 0);
    }

    #[test]
    fn low_temperature_is_nearly_greedy() {
        let mut t = tree();
        let root = t.root();
        t.expand(root, &[(1, 0.5), (5, 0.5)]);
        let kids: Vec<NodeId> = t.node(root).children().iter().map(|&(_, c)| c).collect();
        for _ in 0..30 { t.backup(kids[0], 0.0); }
        for _ in 0..70 { t.backup(kids[1], 0.0); }
        let hot = t.move_probabilities(1.0);
        assert!((hot[0].1 - 0.3).abs() < 1e-4);
        assert!((hot[1].1 - 0.7).abs() < 1e-4);
        let cold = t.move_probabilities(1e-3);
        assert!(cold[1].1 > 0.999);
    }
}
