use std::collections::HashMap;

use crate::trace::{EdgeSet, StepIndex};

use super::normalize::{ScoreRange, SignMode};
use super::topk::{Direction, Neighbor, rank, select_top_k};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightedEdge {
    pub source: StepIndex,
    pub target: StepIndex,
    pub raw_score: f32,
    pub weight: f32,
}

/// Influence edges with their globally normalized weights and adjacency in
/// both directions. Rebuilt whenever the edge set or the sign mode changes.
#[derive(Clone, Debug, Default)]
pub struct InfluenceGraph {
    edges: Vec<WeightedEdge>,
    by_pair: HashMap<(StepIndex, StepIndex), usize>,
    outgoing: HashMap<StepIndex, Vec<usize>>,
    incoming: HashMap<StepIndex, Vec<usize>>,
    range: Option<ScoreRange>,
    mode: SignMode,
}

impl InfluenceGraph {
    pub fn build(edge_set: &EdgeSet, mode: SignMode) -> Self {
        let range = ScoreRange::from_scores(
            edge_set.edges().iter().map(|edge| edge.raw_score),
            mode,
        );

        let mut graph = Self {
            edges: Vec::with_capacity(edge_set.len()),
            by_pair: HashMap::with_capacity(edge_set.len()),
            outgoing: HashMap::new(),
            incoming: HashMap::new(),
            range,
            mode,
        };

        for edge in edge_set.edges() {
            let weight = range
                .map(|range| range.normalize(edge.raw_score, mode))
                .unwrap_or(0.0);
            let slot = graph.edges.len();
            graph.edges.push(WeightedEdge {
                source: edge.source,
                target: edge.target,
                raw_score: edge.raw_score,
                weight,
            });
            graph.by_pair.insert((edge.source, edge.target), slot);
            graph.outgoing.entry(edge.source).or_default().push(slot);
            graph.incoming.entry(edge.target).or_default().push(slot);
        }

        graph
    }

    pub fn edges(&self) -> &[WeightedEdge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn range(&self) -> Option<ScoreRange> {
        self.range
    }

    pub fn mode(&self) -> SignMode {
        self.mode
    }

    pub fn edge(&self, source: StepIndex, target: StepIndex) -> Option<&WeightedEdge> {
        self.by_pair.get(&(source, target)).map(|slot| &self.edges[*slot])
    }

    /// Normalized weight of an edge, 0 when the pair has no edge.
    pub fn weight(&self, source: StepIndex, target: StepIndex) -> f32 {
        self.edge(source, target).map_or(0.0, |edge| edge.weight)
    }

    fn candidates(&self, node: StepIndex, direction: Direction) -> impl Iterator<Item = Neighbor> + '_ {
        let slots = match direction {
            Direction::Outgoing => self.outgoing.get(&node),
            Direction::Incoming => self.incoming.get(&node),
        };

        slots.into_iter().flatten().map(move |slot| {
            let edge = &self.edges[*slot];
            let index = match direction {
                Direction::Outgoing => edge.target,
                Direction::Incoming => edge.source,
            };
            Neighbor {
                index,
                weight: edge.weight,
                raw_score: edge.raw_score,
            }
        })
    }

    /// The `k` strongest neighbours of `node` in `direction`.
    pub fn top_k(&self, node: StepIndex, direction: Direction, k: usize) -> Vec<Neighbor> {
        select_top_k(self.candidates(node, direction), k)
    }

    /// Every neighbour of `node` in `direction`, strongest first.
    pub fn neighbors(&self, node: StepIndex, direction: Direction) -> Vec<Neighbor> {
        let mut neighbors = self.candidates(node, direction).collect::<Vec<_>>();
        neighbors.sort_by(rank);
        neighbors
    }
}
