use chunk_lens::graph::{
    AttributionTree, Direction, HOVER_SCROLL_DELAY, HighlightEffect, HoverSource, InfluenceGraph, SignMode,
    TreeParams,
};
use chunk_lens::session::{LoadOutcome, RenderState, Session, ViewSettings};
use chunk_lens::trace::{EdgeSet, InfluenceEdge, LoadError, SelectionKey, Step, StepIndex, TraceData};

fn edges() -> EdgeSet {
    EdgeSet::new(vec![
        InfluenceEdge {
            source: 0,
            target: 2,
            raw_score: 0.9,
        },
        InfluenceEdge {
            source: 0,
            target: 3,
            raw_score: 0.1,
        },
        InfluenceEdge {
            source: 1,
            target: 2,
            raw_score: 0.5,
        },
    ])
}

fn key(problem: &str) -> SelectionKey {
    SelectionKey::new("model", "correct_base_solution", problem)
}

fn trace(problem: &str, step_count: StepIndex) -> TraceData {
    let mut data = TraceData::empty(key(problem));
    data.steps = (0..step_count)
        .map(|index| Step {
            index,
            text: format!("{problem} step {index}"),
            category: "active_computation".to_owned(),
            importance: index as f32 / 10.0,
            depends_on: Vec::new(),
        })
        .collect();
    data.counterfactual = edges();
    data
}

#[test]
fn top_k_and_normalized_weights() {
    let influence = InfluenceGraph::build(&edges(), SignMode::Absolute);

    let top = influence.top_k(0, Direction::Outgoing, 1);
    assert_eq!(top.iter().map(|neighbor| neighbor.index).collect::<Vec<_>>(), vec![2]);

    assert_eq!(influence.weight(0, 2), 1.0);
    assert_eq!(influence.weight(0, 3), 0.0);
    let middle = influence.weight(1, 2);
    assert!(middle > 0.0 && middle < 1.0);
    assert!((middle - 0.5).abs() < 1e-6);

    assert_eq!(influence.top_k(0, Direction::Outgoing, 1), top);
}

#[test]
fn incoming_tree_stops_at_steps_without_influences() {
    let influence = InfluenceGraph::build(&edges(), SignMode::Absolute);
    let params = TreeParams {
        direction: Direction::Incoming,
        max_depth: 2,
        k: 1,
    };

    let tree = AttributionTree::build(2, &influence, params, |index| index < 5);
    let levels = tree
        .levels
        .iter()
        .map(|level| level.iter().map(|node| node.index).collect::<Vec<_>>())
        .collect::<Vec<_>>();

    assert_eq!(levels, vec![vec![2], vec![0]]);
    assert!(tree.has_connections());
}

#[test]
fn newer_selection_wins_over_pending_load() {
    let mut session = Session::new(ViewSettings::default());
    let problem_a = session.begin_load(key("a"));
    let problem_b = session.begin_load(key("b"));

    assert_eq!(session.complete_load(problem_b, Ok(trace("b", 5))), LoadOutcome::Applied);
    assert_eq!(session.complete_load(problem_a, Ok(trace("a", 3))), LoadOutcome::Stale);

    let data = session.data().map(|data| (data.key.clone(), data.steps.len()));
    assert_eq!(data, Some((key("b"), 5)));
    assert_eq!(session.render_state(), RenderState::Ready);
}

#[test]
fn stale_failure_does_not_blank_the_current_trace() {
    let mut session = Session::new(ViewSettings::default());
    let problem_a = session.begin_load(key("a"));
    let problem_b = session.begin_load(key("b"));
    session.complete_load(problem_b, Ok(trace("b", 5)));

    let outcome = session.complete_load(problem_a, Err(LoadError::DataUnavailable { key: key("a") }));
    assert_eq!(outcome, LoadOutcome::Stale);
    assert_eq!(session.render_state(), RenderState::Ready);
}

#[test]
fn second_hover_replaces_pending_scroll() {
    let mut session = Session::new(ViewSettings::default());
    let ticket = session.begin_load(key("a"));
    session.complete_load(ticket, Ok(trace("a", 5)));
    let _ = session.highlight_mut().take_scroll_request();

    session.highlight_mut().hover(1, HoverSource::CentralGraph, 10.0);
    session.highlight_mut().hover(3, HoverSource::CentralGraph, 10.1);
    assert_eq!(session.highlight().pending_scroll(), Some(3));

    assert_eq!(session.poll(10.0 + HOVER_SCROLL_DELAY), None);
    assert_eq!(
        session.poll(10.1 + HOVER_SCROLL_DELAY),
        Some(HighlightEffect::ScrollListTo(3))
    );
    assert_eq!(session.poll(20.0), None);
    assert_eq!(session.highlight_mut().take_scroll_request(), Some(3));
}
