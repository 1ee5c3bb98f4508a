use crate::trace::StepIndex;

use super::timer::DelayedTask;

/// Seconds a central-graph hover must last before the step list follows it.
pub const HOVER_SCROLL_DELAY: f64 = 0.35;

/// View that produced the current hover.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HoverSource {
    CentralGraph,
    List,
    TreeView,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Hover {
    node: StepIndex,
    source: HoverSource,
}

/// What a primary click landed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClickTarget {
    Node(StepIndex),
    DetailPanel,
    Control,
    Background,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HighlightEffect {
    ScrollListTo(StepIndex),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NodeBorder {
    #[default]
    None,
    Hovered,
    Selected,
}

/// Hover and selection shared by every view. All views read one
/// [`HighlightFrame`] per pass so they never disagree.
#[derive(Clone, Debug, Default)]
pub struct HighlightCoordinator {
    hovered: Option<Hover>,
    selected: Option<StepIndex>,
    pending_scroll: DelayedTask<StepIndex>,
    scroll_request: Option<StepIndex>,
}

impl HighlightCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repeating the current hover is a no-op so a pointer resting on a node
    /// does not keep pushing its scroll deadline back.
    pub fn hover(&mut self, node: StepIndex, source: HoverSource, now: f64) {
        let hover = Hover { node, source };
        if self.hovered == Some(hover) {
            return;
        }

        self.pending_scroll.cancel();
        self.hovered = Some(hover);
        if source == HoverSource::CentralGraph {
            self.pending_scroll.schedule(now, HOVER_SCROLL_DELAY, node);
        }
    }

    pub fn unhover(&mut self) {
        self.hovered = None;
        self.pending_scroll.cancel();
    }

    /// Clears the hover only if it still belongs to `source`.
    pub fn unhover_from(&mut self, source: HoverSource) {
        if self.hover_source() == Some(source) {
            self.unhover();
        }
    }

    pub fn select(&mut self, node: StepIndex) {
        self.selected = Some(node);
    }

    pub fn deselect(&mut self) {
        self.selected = None;
    }

    pub fn click(&mut self, target: ClickTarget) {
        match target {
            ClickTarget::Node(node) => self.select(node),
            ClickTarget::Background => self.deselect(),
            ClickTarget::DetailPanel | ClickTarget::Control => {}
        }
    }

    /// Asks the list to bring `node` into view on the next pass.
    pub fn request_scroll(&mut self, node: StepIndex) {
        self.scroll_request = Some(node);
    }

    /// Fires the delayed hover scroll when its deadline has passed.
    pub fn poll(&mut self, now: f64) -> Option<HighlightEffect> {
        let node = self.pending_scroll.poll(now)?;
        self.scroll_request = Some(node);
        Some(HighlightEffect::ScrollListTo(node))
    }

    pub fn take_scroll_request(&mut self) -> Option<StepIndex> {
        self.scroll_request.take()
    }

    pub fn next_deadline(&self) -> Option<f64> {
        self.pending_scroll.deadline()
    }

    pub fn pending_scroll(&self) -> Option<StepIndex> {
        self.pending_scroll.payload().copied()
    }

    pub fn hovered(&self) -> Option<StepIndex> {
        self.hovered.map(|hover| hover.node)
    }

    pub fn hover_source(&self) -> Option<HoverSource> {
        self.hovered.map(|hover| hover.source)
    }

    pub fn selected(&self) -> Option<StepIndex> {
        self.selected
    }

    /// The node connections are emphasized for: hover wins over selection.
    pub fn focus(&self) -> Option<StepIndex> {
        self.hovered().or(self.selected)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn frame(&self) -> HighlightFrame {
        HighlightFrame {
            selected: self.selected,
            hovered: self.hovered(),
            focus: self.focus(),
        }
    }
}

/// Immutable snapshot of highlight state for one render pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HighlightFrame {
    pub selected: Option<StepIndex>,
    pub hovered: Option<StepIndex>,
    pub focus: Option<StepIndex>,
}

impl HighlightFrame {
    pub fn node_border(&self, node: StepIndex) -> NodeBorder {
        if self.selected == Some(node) {
            NodeBorder::Selected
        } else if self.hovered == Some(node) {
            NodeBorder::Hovered
        } else {
            NodeBorder::None
        }
    }

    pub fn emphasizes(&self, source: StepIndex, target: StepIndex) -> bool {
        self.focus
            .is_some_and(|focus| focus == source || focus == target)
    }
}
