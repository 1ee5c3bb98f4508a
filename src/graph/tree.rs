//! Bounded-depth attribution trees.
//!
//! A tree grows level by level from a root step, following the top-k
//! strongest influences in one direction. A step is placed at most once:
//! the first (shallowest) level that reaches it keeps it, which also makes
//! cycles in the influence graph harmless.

use std::collections::{HashMap, HashSet};

use eframe::egui::{Pos2, pos2};

use crate::trace::StepIndex;

use super::normalize::{ScoreRange, SignMode, normalize_all};
use super::topk::{Direction, Neighbor};
use super::weights::InfluenceGraph;

pub const NODE_WIDTH: f32 = 110.0;
pub const NODE_HEIGHT: f32 = 70.0;
pub const LEVEL_GAP: f32 = 120.0;
pub const NODE_GAP: f32 = 150.0;
pub const START_Y: f32 = 100.0;
const MIN_WIDTH: f32 = 600.0;
const MIN_HEIGHT: f32 = 400.0;
const MARGIN: f32 = 200.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TreeParams {
    pub direction: Direction,
    pub max_depth: usize,
    pub k: usize,
}

/// Neighbours a tree node was expanded through. For incoming trees these are
/// the steps influencing the node, for outgoing trees the steps it
/// influences.
#[derive(Clone, Debug, PartialEq)]
pub struct NeighborLinks {
    pub direction: Direction,
    pub neighbors: Vec<Neighbor>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TreeNode {
    pub index: StepIndex,
    pub links: NeighborLinks,
}

impl TreeNode {
    fn leaf(index: StepIndex, direction: Direction) -> Self {
        Self {
            index,
            links: NeighborLinks {
                direction,
                neighbors: Vec::new(),
            },
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.links.neighbors.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TreeEdge {
    pub source: StepIndex,
    pub target: StepIndex,
    pub weight: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AttributionTree {
    pub root: Option<StepIndex>,
    pub direction: Direction,
    /// `levels[0]` holds the root alone when the tree is not empty.
    pub levels: Vec<Vec<TreeNode>>,
}

impl AttributionTree {
    pub fn empty(direction: Direction) -> Self {
        Self {
            root: None,
            direction,
            levels: Vec::new(),
        }
    }

    /// Expands from `root` breadth first. `is_step` tells which indices
    /// belong to the trace; edges to anything else are ignored.
    pub fn build(
        root: StepIndex,
        influence: &InfluenceGraph,
        params: TreeParams,
        is_step: impl Fn(StepIndex) -> bool,
    ) -> Self {
        let direction = params.direction;
        if !is_step(root) {
            return Self::empty(direction);
        }

        let mut placed = HashSet::from([root]);
        let mut levels = vec![vec![TreeNode::leaf(root, direction)]];

        for depth in 0..params.max_depth {
            let mut next = Vec::new();

            for node in &mut levels[depth] {
                let neighbors = influence
                    .top_k(node.index, direction, params.k)
                    .into_iter()
                    .filter(|neighbor| neighbor.index != node.index && is_step(neighbor.index))
                    .collect::<Vec<_>>();

                for neighbor in &neighbors {
                    if placed.insert(neighbor.index) {
                        next.push(TreeNode::leaf(neighbor.index, direction));
                    }
                }
                node.links.neighbors = neighbors;
            }

            if next.is_empty() {
                break;
            }
            levels.push(next);
        }

        Self {
            root: Some(root),
            direction,
            levels,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// True when the root has nothing attached in the chosen direction.
    pub fn has_connections(&self) -> bool {
        self.levels.len() > 1
    }

    pub fn node_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TreeNode> {
        self.levels.iter().flatten()
    }

    pub fn level_of(&self, index: StepIndex) -> Option<usize> {
        self.levels
            .iter()
            .position(|level| level.iter().any(|node| node.index == index))
    }

    /// Influence edges drawn by the tree, oriented source to target, each
    /// ordered pair once.
    pub fn edges(&self) -> Vec<TreeEdge> {
        let mut seen = HashSet::new();
        let mut edges = Vec::new();

        for node in self.nodes() {
            for neighbor in &node.links.neighbors {
                let (source, target) = node.links.direction.edge(node.index, neighbor.index);
                if seen.insert((source, target)) {
                    edges.push(TreeEdge {
                        source,
                        target,
                        weight: neighbor.weight,
                    });
                }
            }
        }

        edges
    }

    /// Rows are centred horizontally; the root row sits at the top for
    /// outgoing trees and at the bottom for incoming trees.
    pub fn layout(&self) -> TreeLayout {
        let level_count = self.levels.len();
        let widest = self.levels.iter().map(Vec::len).max().unwrap_or(0);
        let width = (widest as f32 * NODE_GAP + MARGIN).max(MIN_WIDTH);
        let height = (level_count as f32 * LEVEL_GAP + MARGIN).max(MIN_HEIGHT);
        let center_x = width / 2.0;

        let mut positions = HashMap::with_capacity(self.node_count());
        for (level, nodes) in self.levels.iter().enumerate() {
            let row = match self.direction {
                Direction::Outgoing => level,
                Direction::Incoming => level_count - 1 - level,
            };
            let y = START_Y + row as f32 * LEVEL_GAP;
            let start_x = center_x - (nodes.len().saturating_sub(1)) as f32 * NODE_GAP / 2.0;

            for (slot, node) in nodes.iter().enumerate() {
                positions.insert(node.index, pos2(start_x + slot as f32 * NODE_GAP, y));
            }
        }

        TreeLayout {
            positions,
            width,
            height,
        }
    }

    /// Opacities for drawing: node importance is normalized over the tree's
    /// own nodes, edge weight over the tree's own edges.
    pub fn encode(&self, importance: impl Fn(StepIndex) -> f32, mode: SignMode) -> TreeEncoding {
        let nodes = self.nodes().map(|node| node.index).collect::<Vec<_>>();
        let range = ScoreRange::from_scores(nodes.iter().map(|index| importance(*index)), mode);
        let node_opacity = nodes
            .iter()
            .map(|index| {
                let normalized = range.map_or(0.0, |range| range.normalize(importance(*index), mode));
                (*index, node_opacity(normalized))
            })
            .collect();

        let edges = self.edges();
        let weights = edges.iter().map(|edge| edge.weight).collect::<Vec<_>>();
        let edge_opacity = edges
            .iter()
            .zip(normalize_all(&weights, SignMode::Absolute))
            .map(|(edge, weight)| ((edge.source, edge.target), edge_opacity(weight)))
            .collect();

        TreeEncoding {
            node_opacity,
            edge_opacity,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct TreeLayout {
    pub positions: HashMap<StepIndex, Pos2>,
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, Debug, Default)]
pub struct TreeEncoding {
    pub node_opacity: HashMap<StepIndex, f32>,
    pub edge_opacity: HashMap<(StepIndex, StepIndex), f32>,
}

pub fn node_opacity(importance: f32) -> f32 {
    (0.3 + 0.7 * importance).clamp(0.4, 1.0)
}

pub fn edge_opacity(weight: f32) -> f32 {
    (0.3 + 0.8 * weight).clamp(0.3, 0.9)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{EdgeSet, InfluenceEdge};

    fn influence(edges: &[(StepIndex, StepIndex, f32)]) -> InfluenceGraph {
        let edges = edges
            .iter()
            .map(|(source, target, raw_score)| InfluenceEdge {
                source: *source,
                target: *target,
                raw_score: *raw_score,
            })
            .collect();
        InfluenceGraph::build(&EdgeSet::new(edges), SignMode::Absolute)
    }

    fn params(direction: Direction, max_depth: usize, k: usize) -> TreeParams {
        TreeParams {
            direction,
            max_depth,
            k,
        }
    }

    fn level_indices(tree: &AttributionTree) -> Vec<Vec<StepIndex>> {
        tree.levels
            .iter()
            .map(|level| level.iter().map(|node| node.index).collect())
            .collect()
    }

    fn known(count: StepIndex) -> impl Fn(StepIndex) -> bool {
        move |index| index < count
    }

    #[test]
    fn incoming_tree_follows_strongest_influence() {
        let influence = influence(&[(0, 2, 0.9), (0, 3, 0.1), (1, 2, 0.5)]);
        let tree = AttributionTree::build(2, &influence, params(Direction::Incoming, 2, 1), known(5));

        assert_eq!(level_indices(&tree), vec![vec![2], vec![0]]);
        assert!(tree.levels[1][0].is_leaf());
        assert_eq!(tree.levels[0][0].links.direction, Direction::Incoming);
    }

    #[test]
    fn outgoing_tree_expands_each_level() {
        let influence = influence(&[(0, 1, 0.9), (0, 2, 0.8), (1, 3, 0.7), (2, 4, 0.6), (3, 5, 0.5)]);
        let tree = AttributionTree::build(0, &influence, params(Direction::Outgoing, 2, 2), known(6));

        assert_eq!(level_indices(&tree), vec![vec![0], vec![1, 2], vec![3, 4]]);
        assert!(tree.levels[2].iter().all(TreeNode::is_leaf));
    }

    #[test]
    fn no_step_is_placed_twice_in_dense_graphs() {
        let mut edges = Vec::new();
        for source in 0..8 {
            for target in 0..8 {
                edges.push((source, target, (source * 8 + target) as f32 / 64.0));
            }
        }
        let influence = influence(&edges);

        for direction in [Direction::Incoming, Direction::Outgoing] {
            for max_depth in 1..=20 {
                for k in 1..=10 {
                    let tree = AttributionTree::build(3, &influence, params(direction, max_depth, k), known(8));
                    let mut seen = HashSet::new();
                    assert!(tree.nodes().all(|node| seen.insert(node.index)));
                    assert!(tree.levels.len() <= max_depth + 1);
                    assert!(tree.node_count() <= 8);
                }
            }
        }
    }

    #[test]
    fn self_loops_and_unknown_steps_are_ignored() {
        let influence = influence(&[(1, 1, 1.0), (1, 9, 0.8), (1, 2, 0.1)]);
        let tree = AttributionTree::build(1, &influence, params(Direction::Outgoing, 3, 3), known(5));

        assert_eq!(level_indices(&tree), vec![vec![1], vec![2]]);
    }

    #[test]
    fn unknown_root_gives_empty_tree() {
        let influence = influence(&[(0, 1, 1.0)]);
        let tree = AttributionTree::build(7, &influence, params(Direction::Outgoing, 2, 2), known(3));

        assert!(tree.is_empty());
        assert!(tree.edges().is_empty());
        assert!(tree.layout().positions.is_empty());
    }

    #[test]
    fn isolated_root_has_no_connections() {
        let influence = influence(&[(0, 1, 1.0)]);
        let tree = AttributionTree::build(2, &influence, params(Direction::Incoming, 2, 2), known(3));

        assert!(!tree.is_empty());
        assert!(!tree.has_connections());
    }

    #[test]
    fn shared_neighbours_draw_each_edge_once() {
        let influence = influence(&[(0, 2, 0.9), (1, 2, 0.8), (0, 1, 0.7)]);
        let tree = AttributionTree::build(2, &influence, params(Direction::Incoming, 3, 2), known(3));

        assert_eq!(level_indices(&tree), vec![vec![2], vec![0, 1]]);
        let pairs = tree
            .edges()
            .iter()
            .map(|edge| (edge.source, edge.target))
            .collect::<Vec<_>>();
        assert_eq!(pairs, vec![(0, 2), (1, 2), (0, 1)]);
    }

    #[test]
    fn layout_centres_rows_and_anchors_root() {
        let outgoing = influence(&[(0, 1, 0.9), (0, 2, 0.8), (0, 3, 0.7)]);
        let tree = AttributionTree::build(0, &outgoing, params(Direction::Outgoing, 1, 3), known(4));
        let layout = tree.layout();

        assert_eq!(layout.width, 650.0);
        assert_eq!(layout.height, 440.0);
        assert_eq!(layout.positions[&0], pos2(325.0, START_Y));
        assert_eq!(layout.positions[&1], pos2(175.0, START_Y + LEVEL_GAP));
        assert_eq!(layout.positions[&3], pos2(475.0, START_Y + LEVEL_GAP));

        let incoming = influence(&[(1, 0, 0.9)]);
        let tree = AttributionTree::build(0, &incoming, params(Direction::Incoming, 1, 1), known(2));
        let layout = tree.layout();
        assert_eq!(layout.width, MIN_WIDTH);
        assert_eq!(layout.positions[&0].y, START_Y + LEVEL_GAP);
        assert_eq!(layout.positions[&1].y, START_Y);
    }

    #[test]
    fn encoding_stays_within_visible_bounds() {
        let influence = influence(&[(0, 1, 0.9), (0, 2, 0.1)]);
        let tree = AttributionTree::build(0, &influence, params(Direction::Outgoing, 1, 2), known(3));
        let encoding = tree.encode(|index| [0.5, 1.0, 0.0][index as usize], SignMode::Absolute);

        assert_eq!(encoding.node_opacity[&1], 1.0);
        assert_eq!(encoding.node_opacity[&2], 0.4);
        assert_eq!(encoding.edge_opacity[&(0, 1)], 0.9);
        assert_eq!(encoding.edge_opacity[&(0, 2)], 0.3);
    }
}
