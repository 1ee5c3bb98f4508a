use std::cmp::Ordering;
use std::collections::HashSet;

use crate::trace::StepIndex;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    /// Edges pointing into the node: what influences it.
    #[default]
    Incoming,
    /// Edges leaving the node: what it influences.
    Outgoing,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Self::Incoming => "Incoming",
            Self::Outgoing => "Outgoing",
        }
    }

    /// Orients an edge between `node` and one of its neighbours as
    /// `(source, target)`.
    pub fn edge(self, node: StepIndex, neighbor: StepIndex) -> (StepIndex, StepIndex) {
        match self {
            Self::Incoming => (neighbor, node),
            Self::Outgoing => (node, neighbor),
        }
    }
}

/// The far end of an influence edge as seen from a given node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Neighbor {
    pub index: StepIndex,
    /// Normalized weight in `[0, 1]`.
    pub weight: f32,
    pub raw_score: f32,
}

/// Orders by weight descending, then neighbour index ascending.
pub fn rank(a: &Neighbor, b: &Neighbor) -> Ordering {
    b.weight
        .total_cmp(&a.weight)
        .then_with(|| a.index.cmp(&b.index))
}

/// Keeps the `k` best candidates. The same neighbour is never returned
/// twice; its best-ranked occurrence wins.
pub fn select_top_k<I>(candidates: I, k: usize) -> Vec<Neighbor>
where
    I: IntoIterator<Item = Neighbor>,
{
    if k == 0 {
        return Vec::new();
    }

    let mut ranked = candidates.into_iter().collect::<Vec<_>>();
    ranked.sort_by(rank);

    let mut seen = HashSet::with_capacity(ranked.len().min(k * 2));
    ranked.retain(|neighbor| seen.insert(neighbor.index));
    ranked.truncate(k);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neighbor(index: StepIndex, weight: f32) -> Neighbor {
        Neighbor {
            index,
            weight,
            raw_score: weight,
        }
    }

    #[test]
    fn highest_weights_come_first() {
        let picked = select_top_k(
            [neighbor(3, 0.1), neighbor(2, 0.9), neighbor(5, 0.5)],
            2,
        );
        let indices = picked.iter().map(|n| n.index).collect::<Vec<_>>();
        assert_eq!(indices, vec![2, 5]);
    }

    #[test]
    fn ties_break_by_ascending_index() {
        let picked = select_top_k(
            [neighbor(9, 0.5), neighbor(1, 0.5), neighbor(4, 0.5)],
            3,
        );
        let indices = picked.iter().map(|n| n.index).collect::<Vec<_>>();
        assert_eq!(indices, vec![1, 4, 9]);
    }

    #[test]
    fn zero_k_is_empty() {
        assert!(select_top_k([neighbor(1, 1.0)], 0).is_empty());
    }

    #[test]
    fn large_k_returns_everything_sorted() {
        let candidates = [neighbor(0, 0.2), neighbor(1, 0.7), neighbor(2, 0.4)];
        let picked = select_top_k(candidates, 10);
        assert_eq!(picked.len(), 3);
        assert!(picked.windows(2).all(|pair| pair[0].weight >= pair[1].weight));
    }

    #[test]
    fn duplicates_are_suppressed() {
        let picked = select_top_k(
            [neighbor(1, 0.3), neighbor(1, 0.8), neighbor(2, 0.5)],
            2,
        );
        assert_eq!(picked, vec![neighbor(1, 0.8), neighbor(2, 0.5)]);
    }

    #[test]
    fn selection_is_deterministic() {
        let candidates = vec![neighbor(4, 0.5), neighbor(2, 0.5), neighbor(7, 0.9), neighbor(1, 0.0)];
        let first = select_top_k(candidates.clone(), 3);
        let second = select_top_k(candidates.clone(), 3);
        assert_eq!(first, second);
        assert_eq!(candidates[0].index, 4);
    }

    #[test]
    fn direction_orients_edges() {
        assert_eq!(Direction::Incoming.edge(2, 0), (0, 2));
        assert_eq!(Direction::Outgoing.edge(2, 0), (2, 0));
    }
}
