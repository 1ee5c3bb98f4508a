//! Per-selection state shared by every view.
//!
//! A [`Session`] owns the loaded trace for one [`SelectionKey`] together with
//! everything derived from it. Starting a new load bumps a generation
//! counter and resets derived state at once; results carrying an older
//! ticket are discarded.

use std::cell::Cell;
use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::graph::{
    AttributionTree, CircularGraph, CircularParams, Direction, HighlightCoordinator, HighlightEffect,
    HighlightFrame, ImportanceFilter, InfluenceGraph, Neighbor, SignMode, StepFilter, TreeParams,
};
use crate::trace::{LoadError, Metric, SelectionKey, Step, StepIndex, TraceData};

pub const MAX_CAUSAL_LINKS: usize = 10;
pub const MAX_TREE_DEPTH: usize = 20;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ViewMode {
    #[default]
    Circular,
    Tree,
}

impl ViewMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::Circular => "Circular graph",
            Self::Tree => "Attribution tree",
        }
    }
}

/// User-adjustable view parameters. Setters on [`Session`] keep them in
/// range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewSettings {
    pub view_mode: ViewMode,
    pub sign_mode: SignMode,
    pub metric: Metric,
    pub causal_links: usize,
    pub importance_filter: ImportanceFilter,
    pub max_depth: usize,
    pub direction: Direction,
}

impl Default for ViewSettings {
    fn default() -> Self {
        Self {
            view_mode: ViewMode::Circular,
            sign_mode: SignMode::Absolute,
            metric: Metric::AttentionSuppression,
            causal_links: 3,
            importance_filter: ImportanceFilter::ALL,
            max_depth: 2,
            direction: Direction::Incoming,
        }
    }
}

impl ViewSettings {
    /// The tree needs at least one link per node to grow at all.
    pub fn min_causal_links(&self) -> usize {
        match self.view_mode {
            ViewMode::Circular => 0,
            ViewMode::Tree => 1,
        }
    }

    pub fn clamped(mut self) -> Self {
        self.causal_links = self
            .causal_links
            .clamp(self.min_causal_links(), MAX_CAUSAL_LINKS);
        self.max_depth = self.max_depth.clamp(1, MAX_TREE_DEPTH);
        self
    }
}

/// Captured when a load starts; the result is only applied if the ticket
/// still matches the session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    key: SelectionKey,
}

impl LoadTicket {
    pub fn key(&self) -> &SelectionKey {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    Stale,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EmptyReason {
    NoSelection,
    DataUnavailable,
    Failed(String),
}

impl EmptyReason {
    pub fn message(&self) -> String {
        match self {
            Self::NoSelection => "Select a model, solution type and problem".to_owned(),
            Self::DataUnavailable => "No data for this selection".to_owned(),
            Self::Failed(error) => format!("Failed to load: {error}"),
        }
    }
}

/// What the active view should show.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderState {
    Loading,
    Empty { reason: EmptyReason },
    NoConnections,
    Ready,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Navigation {
    Previous,
    Next,
}

/// A resampled wording of a step and how often it occurred.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alternative {
    pub text: String,
    pub count: usize,
}

/// What a tree's connectivity depends on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct TreeShape {
    revision: u64,
    root: StepIndex,
    params: TreeParams,
}

#[derive(Debug, Default)]
pub struct Session {
    key: Option<SelectionKey>,
    generation: u64,
    loading: bool,
    data: Option<TraceData>,
    failure: Option<EmptyReason>,
    settings: ViewSettings,
    active_metric: Metric,
    influence: InfluenceGraph,
    highlight: HighlightCoordinator,
    filter: StepFilter,
    last_tree_root: Option<StepIndex>,
    revision: u64,
    /// Whether the tree for a given shape grows past its root.
    tree_connected: Cell<Option<(TreeShape, bool)>>,
}

impl Session {
    pub fn new(settings: ViewSettings) -> Self {
        Self {
            settings: settings.clamped(),
            active_metric: settings.metric,
            ..Self::default()
        }
    }

    pub fn key(&self) -> Option<&SelectionKey> {
        self.key.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn data(&self) -> Option<&TraceData> {
        self.data.as_ref()
    }

    pub fn steps(&self) -> &[Step] {
        self.data
            .as_ref()
            .map(|data| data.steps.as_slice())
            .unwrap_or_default()
    }

    pub fn settings(&self) -> &ViewSettings {
        &self.settings
    }

    /// The metric the edges currently come from, after fallback.
    pub fn active_metric(&self) -> Metric {
        self.active_metric
    }

    pub fn influence(&self) -> &InfluenceGraph {
        &self.influence
    }

    /// Bumped whenever the influence weights are rebuilt.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn highlight(&self) -> &HighlightCoordinator {
        &self.highlight
    }

    pub fn highlight_mut(&mut self) -> &mut HighlightCoordinator {
        &mut self.highlight
    }

    pub fn highlight_frame(&self) -> HighlightFrame {
        self.highlight.frame()
    }

    pub fn filter(&self) -> &StepFilter {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut StepFilter {
        &mut self.filter
    }

    /// Switches to `key`, dropping everything derived from the previous
    /// selection. The returned ticket must accompany the load result.
    pub fn begin_load(&mut self, key: SelectionKey) -> LoadTicket {
        self.generation += 1;
        info!(%key, generation = self.generation, "selection changed");

        self.key = Some(key.clone());
        self.loading = true;
        self.data = None;
        self.failure = None;
        self.settings.metric = Metric::default();
        self.active_metric = self.settings.metric;
        self.influence = InfluenceGraph::default();
        self.highlight.reset();
        self.filter.clear();
        self.last_tree_root = None;
        self.revision += 1;

        LoadTicket {
            generation: self.generation,
            key,
        }
    }

    pub fn complete_load(&mut self, ticket: LoadTicket, result: Result<TraceData, LoadError>) -> LoadOutcome {
        if ticket.generation != self.generation || self.key.as_ref() != Some(&ticket.key) {
            debug!(
                key = %ticket.key,
                generation = ticket.generation,
                current = self.generation,
                "discarding stale load result"
            );
            return LoadOutcome::Stale;
        }

        self.loading = false;
        match result {
            Ok(data) => {
                self.data = Some(data);
                self.rebuild_influence();
                self.select_most_important();
            }
            Err(error) => {
                warn!(key = %ticket.key, %error, "load failed");
                self.failure = Some(match error {
                    LoadError::DataUnavailable { .. } => EmptyReason::DataUnavailable,
                    other => EmptyReason::Failed(other.to_string()),
                });
            }
        }

        LoadOutcome::Applied
    }

    /// Forgets the selection entirely, invalidating any in-flight load.
    pub fn clear(&mut self) {
        self.generation += 1;
        self.key = None;
        self.loading = false;
        self.data = None;
        self.failure = None;
        self.influence = InfluenceGraph::default();
        self.highlight.reset();
        self.filter.clear();
        self.last_tree_root = None;
        self.revision += 1;
    }

    fn rebuild_influence(&mut self) {
        let Some(data) = &self.data else {
            return;
        };

        let (edges, metric) = data.edges_for(self.settings.metric);
        if metric != self.settings.metric {
            debug!(requested = self.settings.metric.label(), "metric unavailable, using counterfactual");
        }
        self.active_metric = metric;
        self.influence = InfluenceGraph::build(edges, self.settings.sign_mode);
        self.revision += 1;
    }

    /// Selects the argmax-importance step when nothing is selected yet.
    fn select_most_important(&mut self) {
        if self.highlight.selected().is_some() {
            return;
        }
        if let Some(index) = self.most_important_step() {
            self.highlight.select(index);
            self.highlight.request_scroll(index);
        }
    }

    pub fn most_important_step(&self) -> Option<StepIndex> {
        let mode = self.settings.sign_mode;
        self.steps()
            .iter()
            .max_by(|a, b| {
                mode.transform(a.importance)
                    .total_cmp(&mode.transform(b.importance))
                    .then_with(|| b.index.cmp(&a.index))
            })
            .map(|step| step.index)
    }

    pub fn set_view_mode(&mut self, view_mode: ViewMode) {
        self.settings.view_mode = view_mode;
        self.settings = self.settings.clamped();
    }

    pub fn set_sign_mode(&mut self, sign_mode: SignMode) {
        if self.settings.sign_mode != sign_mode {
            self.settings.sign_mode = sign_mode;
            self.rebuild_influence();
        }
    }

    pub fn set_metric(&mut self, metric: Metric) {
        if self.settings.metric != metric {
            self.settings.metric = metric;
            self.rebuild_influence();
        }
    }

    pub fn set_causal_links(&mut self, causal_links: usize) {
        self.settings.causal_links = causal_links;
        self.settings = self.settings.clamped();
    }

    pub fn set_importance_filter(&mut self, filter: ImportanceFilter) {
        self.settings.importance_filter = filter;
    }

    pub fn set_max_depth(&mut self, max_depth: usize) {
        self.settings.max_depth = max_depth;
        self.settings = self.settings.clamped();
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.settings.direction = direction;
    }

    pub fn poll(&mut self, now: f64) -> Option<HighlightEffect> {
        self.highlight.poll(now)
    }

    pub fn render_state(&self) -> RenderState {
        if self.loading {
            return RenderState::Loading;
        }
        if let Some(reason) = &self.failure {
            return RenderState::Empty {
                reason: reason.clone(),
            };
        }
        let Some(data) = &self.data else {
            return RenderState::Empty {
                reason: EmptyReason::NoSelection,
            };
        };
        if data.steps.is_empty() {
            return RenderState::NoConnections;
        }

        match self.settings.view_mode {
            ViewMode::Circular => RenderState::Ready,
            ViewMode::Tree => {
                let connected = self.tree_root().is_some_and(|root| self.tree_has_connections(root));
                if connected {
                    RenderState::Ready
                } else {
                    RenderState::NoConnections
                }
            }
        }
    }

    pub fn circular_graph(&self) -> CircularGraph {
        CircularGraph::build(
            self.steps(),
            &self.influence,
            CircularParams {
                causal_links: self.settings.causal_links,
                filter: self.settings.importance_filter,
            },
        )
    }

    fn is_step(&self, index: StepIndex) -> bool {
        self.data.as_ref().is_some_and(|data| data.contains(index))
    }

    /// Selected step, else the previous tree root, else the most important
    /// step.
    pub fn tree_root(&self) -> Option<StepIndex> {
        self.highlight
            .selected()
            .filter(|index| self.is_step(*index))
            .or(self.last_tree_root.filter(|index| self.is_step(*index)))
            .or_else(|| self.most_important_step())
    }

    pub fn tree_params(&self) -> TreeParams {
        TreeParams {
            direction: self.settings.direction,
            max_depth: self.settings.max_depth,
            k: self.settings.causal_links.max(1),
        }
    }

    /// Builds the tree for the current root and remembers that root.
    pub fn attribution_tree(&mut self) -> AttributionTree {
        let Some(root) = self.tree_root() else {
            return AttributionTree::empty(self.settings.direction);
        };
        self.last_tree_root = Some(root);
        let tree = self.build_tree(root);
        self.tree_connected
            .set(Some((self.tree_shape(root), tree.has_connections())));
        tree
    }

    fn build_tree(&self, root: StepIndex) -> AttributionTree {
        AttributionTree::build(root, &self.influence, self.tree_params(), |index| self.is_step(index))
    }

    fn tree_shape(&self, root: StepIndex) -> TreeShape {
        TreeShape {
            revision: self.revision,
            root,
            params: self.tree_params(),
        }
    }

    /// Connectivity of the tree rooted at `root`, rebuilt only when the
    /// data, root or tree parameters changed since the last answer.
    fn tree_has_connections(&self, root: StepIndex) -> bool {
        let shape = self.tree_shape(root);
        if let Some((cached, connected)) = self.tree_connected.get()
            && cached == shape
        {
            return connected;
        }

        let connected = self.build_tree(root).has_connections();
        self.tree_connected.set(Some((shape, connected)));
        connected
    }

    /// Moves the selection one step along the trace and asks the list to
    /// follow it.
    pub fn navigate(&mut self, navigation: Navigation) -> Option<StepIndex> {
        let steps = self.steps();
        let current = self
            .highlight
            .selected()
            .and_then(|index| steps.binary_search_by_key(&index, |step| step.index).ok());

        let position = match (current, navigation) {
            (None, _) => 0,
            (Some(position), Navigation::Previous) => position.checked_sub(1)?,
            (Some(position), Navigation::Next) => position + 1,
        };
        let index = steps.get(position)?.index;

        self.highlight.select(index);
        self.highlight.request_scroll(index);
        Some(index)
    }

    /// Every step `index` influences, strongest first.
    pub fn causal_effects(&self, index: StepIndex) -> Vec<Neighbor> {
        self.influence
            .neighbors(index, Direction::Outgoing)
            .into_iter()
            .filter(|neighbor| neighbor.index != index && self.is_step(neighbor.index))
            .collect()
    }

    /// The strongest influences on `index`, limited by the link count.
    pub fn affected_by(&self, index: StepIndex) -> Vec<Neighbor> {
        self.influence
            .top_k(index, Direction::Incoming, self.settings.causal_links.max(1))
            .into_iter()
            .filter(|neighbor| neighbor.index != index && self.is_step(neighbor.index))
            .collect()
    }

    /// Resampled wordings that differ from the original text, most frequent
    /// first.
    pub fn resample_alternatives(&self, index: StepIndex) -> Vec<Alternative> {
        let Some(data) = &self.data else {
            return Vec::new();
        };
        let Some(resamples) = data.resamples.get(&index) else {
            return Vec::new();
        };
        let original = data.step(index).map(|step| step.text.trim()).unwrap_or_default();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for text in resamples.iter().map(|text| text.trim()) {
            if !text.is_empty() && text != original {
                *counts.entry(text).or_default() += 1;
            }
        }

        let mut alternatives = counts
            .into_iter()
            .map(|(text, count)| Alternative {
                text: text.to_owned(),
                count,
            })
            .collect::<Vec<_>>();
        alternatives.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.text.cmp(&b.text)));
        alternatives
    }

    pub fn visible_steps(&self) -> Vec<&Step> {
        self.filter.apply(self.steps())
    }
}
