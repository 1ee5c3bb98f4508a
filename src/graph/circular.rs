use std::collections::HashSet;
use std::f32::consts::{FRAC_PI_2, TAU};

use eframe::egui::{Pos2, pos2};

use crate::trace::{Step, StepIndex};

use super::normalize::ScoreRange;
use super::topk::Direction;
use super::weights::InfluenceGraph;

const FILTER_LABELS: [&str; 5] = ["Top 20%", "Top 40%", "Top 60%", "Top 80%", "All nodes"];

/// Percentile filter over normalized step importance, in five discrete
/// levels. Level 0 keeps the top 20%; the last level keeps every step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImportanceFilter(u8);

impl ImportanceFilter {
    pub const ALL: Self = Self(4);
    pub const LEVELS: u8 = 5;

    pub fn new(level: u8) -> Self {
        Self(level.min(Self::LEVELS - 1))
    }

    pub fn level(self) -> u8 {
        self.0
    }

    pub fn label(self) -> &'static str {
        FILTER_LABELS[usize::from(self.0)]
    }

    /// Number of steps kept out of `total`, never below one for a non-empty
    /// trace.
    pub fn retained(self, total: usize) -> usize {
        if total == 0 {
            return 0;
        }
        let levels = usize::from(Self::LEVELS);
        let kept = (usize::from(self.0) + 1) * total;
        kept.div_ceil(levels).clamp(1, total)
    }
}

impl Default for ImportanceFilter {
    fn default() -> Self {
        Self::ALL
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeKind {
    Sequential,
    Causal,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CircularNode {
    pub index: StepIndex,
    /// Importance normalized over every step of the trace.
    pub importance: f32,
}

impl CircularNode {
    pub fn radius(&self) -> f32 {
        node_radius(self.importance)
    }

    pub fn color_intensity(&self) -> f32 {
        color_intensity(self.importance)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CircularEdge {
    pub source: StepIndex,
    pub target: StepIndex,
    pub kind: EdgeKind,
    /// Normalized influence weight; zero for sequential edges.
    pub weight: f32,
}

impl CircularEdge {
    pub fn touches(&self, node: StepIndex) -> bool {
        self.source == node || self.target == node
    }

    /// Opacity with no focus node, or with `focus` driving the emphasis.
    pub fn opacity(&self, focus: Option<StepIndex>) -> f32 {
        match (focus, self.kind) {
            (None, EdgeKind::Sequential) => 0.8,
            (None, EdgeKind::Causal) => (2.0 * self.weight).clamp(0.2, 0.8),
            (Some(node), EdgeKind::Sequential) if self.touches(node) => 0.9,
            (Some(node), EdgeKind::Causal) if self.touches(node) => {
                (0.3 + 0.7 * self.weight).clamp(0.3, 1.0)
            }
            (Some(_), _) => 0.1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CircularParams {
    pub causal_links: usize,
    pub filter: ImportanceFilter,
}

/// Size of the drawing area the circle is fitted into.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CircleGeometry {
    pub width: f32,
    pub height: f32,
    pub panel_open: bool,
}

impl CircleGeometry {
    pub fn center(&self) -> Pos2 {
        let vertical = if self.panel_open { 0.425 } else { 0.45 };
        pos2(self.width * 0.5, self.height * vertical)
    }

    pub fn radius(&self) -> f32 {
        let scale = if self.panel_open { 0.41 } else { 0.39 };
        self.width.min(self.height).max(0.0) * scale
    }
}

/// Steps retained by the importance filter with the edges drawn between
/// them. Nodes are ordered by step index.
#[derive(Clone, Debug, Default)]
pub struct CircularGraph {
    pub nodes: Vec<CircularNode>,
    pub edges: Vec<CircularEdge>,
}

impl CircularGraph {
    pub fn build(steps: &[Step], influence: &InfluenceGraph, params: CircularParams) -> Self {
        let mode = influence.mode();
        let range = ScoreRange::from_scores(steps.iter().map(|step| step.importance), mode);
        let mut nodes = steps
            .iter()
            .map(|step| CircularNode {
                index: step.index,
                importance: range.map_or(0.0, |range| range.normalize(step.importance, mode)),
            })
            .collect::<Vec<_>>();

        nodes.sort_by(|a, b| {
            b.importance
                .total_cmp(&a.importance)
                .then_with(|| a.index.cmp(&b.index))
        });
        nodes.truncate(params.filter.retained(steps.len()));
        nodes.sort_by_key(|node| node.index);

        let edges = if nodes.len() > 1 {
            collect_edges(&nodes, influence, params.causal_links)
        } else {
            Vec::new()
        };

        Self { nodes, edges }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn causal_edge_count(&self) -> usize {
        self.edges
            .iter()
            .filter(|edge| edge.kind == EdgeKind::Causal)
            .count()
    }

    pub fn position_of(&self, index: StepIndex) -> Option<usize> {
        self.nodes.binary_search_by_key(&index, |node| node.index).ok()
    }

    /// Evenly spaced positions around the circle, starting at twelve o'clock
    /// and following node order.
    pub fn layout(&self, geometry: CircleGeometry) -> Vec<Pos2> {
        let count = self.nodes.len();
        let center = geometry.center();
        let radius = geometry.radius();

        (0..count)
            .map(|slot| {
                let angle = (slot as f32 / count as f32) * TAU - FRAC_PI_2;
                pos2(
                    center.x + radius * angle.cos(),
                    center.y + radius * angle.sin(),
                )
            })
            .collect()
    }
}

fn collect_edges(
    nodes: &[CircularNode],
    influence: &InfluenceGraph,
    causal_links: usize,
) -> Vec<CircularEdge> {
    let mut edges = nodes
        .windows(2)
        .map(|pair| CircularEdge {
            source: pair[0].index,
            target: pair[1].index,
            kind: EdgeKind::Sequential,
            weight: 0.0,
        })
        .collect::<Vec<_>>();

    if causal_links == 0 {
        return edges;
    }

    let retained = nodes.iter().map(|node| node.index).collect::<HashSet<_>>();
    let mut seen = HashSet::new();

    for node in nodes {
        for direction in [Direction::Outgoing, Direction::Incoming] {
            for neighbor in influence.top_k(node.index, direction, causal_links) {
                let (source, target) = direction.edge(node.index, neighbor.index);
                if source == target || !retained.contains(&source) || !retained.contains(&target) {
                    continue;
                }
                if seen.insert((source, target)) {
                    edges.push(CircularEdge {
                        source,
                        target,
                        kind: EdgeKind::Causal,
                        weight: neighbor.weight,
                    });
                }
            }
        }
    }

    edges
}

pub fn node_radius(importance: f32) -> f32 {
    (10.0 + (1.0 + 20.0 * importance.max(0.0)).ln() * 3.5).max(10.0)
}

pub fn color_intensity(importance: f32) -> f32 {
    (3.0 * importance).clamp(0.6, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::normalize::SignMode;
    use crate::trace::{EdgeSet, InfluenceEdge};

    fn steps(importances: &[f32]) -> Vec<Step> {
        importances
            .iter()
            .enumerate()
            .map(|(index, importance)| Step {
                index: index as StepIndex,
                text: format!("step {index}"),
                category: "active_computation".to_owned(),
                importance: *importance,
                depends_on: Vec::new(),
            })
            .collect()
    }

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

    fn params(causal_links: usize, level: u8) -> CircularParams {
        CircularParams {
            causal_links,
            filter: ImportanceFilter::new(level),
        }
    }

    #[test]
    fn retained_count_follows_percentile_levels() {
        let cases: [(usize, [usize; 5]); 5] = [
            (1, [1, 1, 1, 1, 1]),
            (2, [1, 1, 2, 2, 2]),
            (7, [2, 3, 5, 6, 7]),
            (13, [3, 6, 8, 11, 13]),
            (100, [20, 40, 60, 80, 100]),
        ];
        for (total, expected) in cases {
            for level in 0..ImportanceFilter::LEVELS {
                assert_eq!(
                    ImportanceFilter::new(level).retained(total),
                    expected[usize::from(level)]
                );
            }
        }
        assert_eq!(ImportanceFilter::new(0).retained(0), 0);
        assert_eq!(ImportanceFilter::new(9), ImportanceFilter::ALL);
    }

    #[test]
    fn filter_keeps_most_important_steps_in_index_order() {
        let steps = steps(&[0.1, 0.9, 0.2, 0.8, 0.0]);
        let graph = CircularGraph::build(&steps, &influence(&[]), params(0, 1));

        let kept = graph.nodes.iter().map(|node| node.index).collect::<Vec<_>>();
        assert_eq!(kept, vec![1, 3]);
    }

    #[test]
    fn sequential_edges_link_consecutive_retained_steps() {
        let steps = steps(&[0.5, 0.1, 0.7, 0.9]);
        let graph = CircularGraph::build(&steps, &influence(&[]), params(3, 2));

        let sequential = graph
            .edges
            .iter()
            .map(|edge| (edge.source, edge.target, edge.kind))
            .collect::<Vec<_>>();
        assert_eq!(
            sequential,
            vec![(0, 2, EdgeKind::Sequential), (2, 3, EdgeKind::Sequential)]
        );
    }

    #[test]
    fn causal_edges_are_deduplicated_and_filtered() {
        let steps = steps(&[0.5, 0.5, 0.5, 0.0, 0.5]);
        let influence = influence(&[(0, 2, 0.9), (0, 3, 0.1), (1, 2, 0.5), (2, 2, 0.4)]);
        let graph = CircularGraph::build(&steps, &influence, params(1, 3));

        assert!(graph.position_of(3).is_none());
        let causal = graph
            .edges
            .iter()
            .filter(|edge| edge.kind == EdgeKind::Causal)
            .map(|edge| (edge.source, edge.target))
            .collect::<Vec<_>>();
        assert_eq!(causal, vec![(0, 2), (1, 2)]);
    }

    #[test]
    fn single_and_empty_traces_have_no_edges() {
        let influence = influence(&[(0, 0, 1.0)]);
        let single = CircularGraph::build(&steps(&[0.4]), &influence, params(5, 4));
        assert_eq!(single.nodes.len(), 1);
        assert!(single.edges.is_empty());

        let empty = CircularGraph::build(&[], &influence, params(5, 4));
        assert!(empty.is_empty());
    }

    #[test]
    fn layout_starts_at_twelve_o_clock() {
        let graph = CircularGraph::build(&steps(&[0.1, 0.2, 0.3, 0.4]), &influence(&[]), params(0, 4));
        let geometry = CircleGeometry {
            width: 1000.0,
            height: 800.0,
            panel_open: false,
        };
        let positions = graph.layout(geometry);

        let center = geometry.center();
        assert!((center.x - 500.0).abs() < 1e-3);
        assert!((center.y - 360.0).abs() < 1e-3);
        assert!((geometry.radius() - 312.0).abs() < 1e-3);
        assert!((positions[0].x - center.x).abs() < 1e-3);
        assert!((positions[0].y - (center.y - 312.0)).abs() < 1e-3);
        assert!((positions[1].x - (center.x + 312.0)).abs() < 1e-3);

        let open = CircleGeometry {
            panel_open: true,
            ..geometry
        };
        assert!(open.radius() > geometry.radius());
        assert!(open.center().y < center.y);
    }

    #[test]
    fn encoding_grows_with_importance() {
        assert_eq!(node_radius(0.0), 10.0);
        assert!(node_radius(1.0) > node_radius(0.5));
        assert_eq!(color_intensity(0.0), 0.6);
        assert_eq!(color_intensity(0.5), 1.0);
    }

    #[test]
    fn edge_opacity_depends_on_focus() {
        let causal = CircularEdge {
            source: 0,
            target: 2,
            kind: EdgeKind::Causal,
            weight: 0.25,
        };
        let sequential = CircularEdge {
            source: 2,
            target: 3,
            kind: EdgeKind::Sequential,
            weight: 0.0,
        };

        assert_eq!(causal.opacity(None), 0.5);
        assert_eq!(sequential.opacity(None), 0.8);
        assert!((causal.opacity(Some(0)) - 0.475).abs() < 1e-6);
        assert_eq!(causal.opacity(Some(3)), 0.1);
        assert_eq!(sequential.opacity(Some(3)), 0.9);
        assert_eq!(sequential.opacity(Some(0)), 0.1);
    }
}
