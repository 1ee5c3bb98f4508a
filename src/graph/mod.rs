//! Graph construction, layout and highlight state for the trace views.

pub mod circular;
pub mod filter;
pub mod highlight;
pub mod normalize;
pub mod timer;
pub mod topk;
pub mod tree;
pub mod weights;

pub use circular::{CircleGeometry, CircularEdge, CircularGraph, CircularParams, EdgeKind, ImportanceFilter};
pub use filter::StepFilter;
pub use highlight::{
    ClickTarget, HOVER_SCROLL_DELAY, HighlightCoordinator, HighlightEffect, HighlightFrame, HoverSource,
    NodeBorder,
};
pub use normalize::{ScoreRange, SignMode, normalize_all};
pub use timer::{Debounce, DelayedTask};
pub use topk::{Direction, Neighbor, select_top_k};
pub use tree::{AttributionTree, NeighborLinks, TreeEdge, TreeEncoding, TreeLayout, TreeNode, TreeParams};
pub use weights::{InfluenceGraph, WeightedEdge};
