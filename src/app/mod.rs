use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Duration;

use eframe::egui::{self, Context};
use tracing::{debug, warn};

use crate::config::ExplorerConfig;
use crate::graph::{AttributionTree, CircularGraph, Debounce, ImportanceFilter, TreeEncoding, TreeLayout};
use crate::session::{LoadOutcome, LoadTicket, Session};
use crate::trace::{DirectorySource, LoadError, ModelEntry, ProblemEntry, ProblemSource, SelectionKey, TraceData};

mod graph;
mod render_utils;
mod ui;

use graph::{ResettableView, Viewport};

/// Seconds the circular layout waits for the canvas size to settle.
const RESIZE_DEBOUNCE: f64 = 0.2;

pub struct ExplorerApp {
    source: Arc<dyn ProblemSource>,
    model: ViewModel,
}

type Pending<T> = Receiver<Result<T, LoadError>>;

struct ViewModel {
    session: Session,
    picker: Picker,
    models_rx: Option<Pending<Vec<ModelEntry>>>,
    problems_rx: Option<(String, String, Pending<Vec<ProblemEntry>>)>,
    load_rx: Option<(LoadTicket, Pending<TraceData>)>,
    circular: CircularView,
    tree: TreeView,
    abbreviate_tags: bool,
    show_prompt: bool,
}

/// Catalog listings and the current model / solution type / problem choice.
#[derive(Default)]
struct Picker {
    models: Vec<ModelEntry>,
    problems: Vec<ProblemEntry>,
    model: Option<String>,
    solution_type: Option<String>,
    problem_search: String,
    catalog_error: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CircularCacheKey {
    revision: u64,
    causal_links: usize,
    filter: ImportanceFilter,
}

struct CircularCache {
    key: CircularCacheKey,
    graph: CircularGraph,
}

struct CircularView {
    viewport: Viewport,
    cache: Option<CircularCache>,
    /// Canvas size the layout was last fitted to.
    settled_size: Option<egui::Vec2>,
    resize: Debounce<egui::Vec2>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct TreeCacheKey {
    revision: u64,
    root: Option<crate::trace::StepIndex>,
    params: crate::graph::TreeParams,
}

struct TreeCache {
    key: TreeCacheKey,
    tree: AttributionTree,
    layout: TreeLayout,
    encoding: TreeEncoding,
}

struct TreeView {
    viewport: Viewport,
    cache: Option<TreeCache>,
}

impl CircularView {
    fn new() -> Self {
        Self {
            viewport: Viewport::default(),
            cache: None,
            settled_size: None,
            resize: Debounce::new(RESIZE_DEBOUNCE),
        }
    }
}

impl ResettableView for CircularView {
    fn reset_view(&mut self) {
        self.viewport.reset();
    }
}

impl ResettableView for TreeView {
    fn reset_view(&mut self) {
        self.viewport.reset();
    }
}

fn spawn<T, F>(job: F) -> Pending<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, LoadError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _ = tx.send(job());
    });
    rx
}

/// Polls a background job. `None` while it is still running.
fn poll<T>(rx: &Pending<T>) -> Option<Result<T, LoadError>> {
    match rx.try_recv() {
        Ok(result) => Some(result),
        Err(TryRecvError::Empty) => None,
        Err(TryRecvError::Disconnected) => Some(Err(LoadError::Disconnected)),
    }
}

impl ExplorerApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: ExplorerConfig) -> Self {
        let source: Arc<dyn ProblemSource> = Arc::new(DirectorySource::new(config.data_dir.clone()));
        let mut model = ViewModel::new(Session::new(config.settings));

        model.request_models(&source);
        if let (Some(model_name), Some(solution_type)) = (&config.model, &config.solution_type) {
            model.picker.model = Some(model_name.clone());
            model.picker.solution_type = Some(solution_type.clone());
            model.request_problems(&source, model_name.clone(), solution_type.clone());
        }
        if let Some(key) = config.initial_selection() {
            model.request_load(&source, key);
        }

        Self { source, model }
    }
}

impl ViewModel {
    fn new(session: Session) -> Self {
        Self {
            session,
            picker: Picker::default(),
            models_rx: None,
            problems_rx: None,
            load_rx: None,
            circular: CircularView::new(),
            tree: TreeView {
                viewport: Viewport::default(),
                cache: None,
            },
            abbreviate_tags: false,
            show_prompt: false,
        }
    }

    fn request_models(&mut self, source: &Arc<dyn ProblemSource>) {
        let source = Arc::clone(source);
        self.models_rx = Some(spawn(move || source.models()));
    }

    fn request_problems(&mut self, source: &Arc<dyn ProblemSource>, model: String, solution_type: String) {
        self.picker.problems.clear();
        self.picker.problem_search.clear();
        let worker = Arc::clone(source);
        let (model_name, solution) = (model.clone(), solution_type.clone());
        let rx = spawn(move || worker.problems(&model_name, &solution));
        self.problems_rx = Some((model, solution_type, rx));
    }

    /// Starts loading `key`. Any earlier in-flight load is superseded by the
    /// session's ticket check.
    fn request_load(&mut self, source: &Arc<dyn ProblemSource>, key: SelectionKey) {
        let ticket = self.session.begin_load(key.clone());
        self.circular.cache = None;
        self.tree.cache = None;
        self.show_prompt = false;

        let worker = Arc::clone(source);
        let rx = spawn(move || worker.load(&key));
        self.load_rx = Some((ticket, rx));
    }

    fn poll_background(&mut self) {
        if let Some(rx) = &self.models_rx
            && let Some(result) = poll(rx)
        {
            self.models_rx = None;
            match result {
                Ok(models) => {
                    self.picker.models = models;
                    self.picker.catalog_error = None;
                }
                Err(error) => {
                    warn!(%error, "could not list models");
                    self.picker.catalog_error = Some(error.to_string());
                }
            }
        }

        if let Some((model, solution_type, rx)) = &self.problems_rx
            && let Some(result) = poll(rx)
        {
            let still_current = self.picker.model.as_ref() == Some(model)
                && self.picker.solution_type.as_ref() == Some(solution_type);
            if still_current {
                match result {
                    Ok(problems) => self.picker.problems = problems,
                    Err(error) => {
                        warn!(%error, "could not list problems");
                        self.picker.catalog_error = Some(error.to_string());
                    }
                }
            } else {
                debug!(model, solution_type, "dropping outdated problem listing");
            }
            self.problems_rx = None;
        }

        if let Some((_, rx)) = &self.load_rx
            && let Some(result) = poll(rx)
            && let Some((ticket, _)) = self.load_rx.take()
            && self.session.complete_load(ticket, result) == LoadOutcome::Applied
        {
            self.circular.cache = None;
            self.tree.cache = None;
        }
    }

    fn show(&mut self, ctx: &Context, source: &Arc<dyn ProblemSource>) {
        self.poll_background();

        let now = ctx.input(|input| input.time);
        let _ = self.session.poll(now);
        if let Some(deadline) = self.session.highlight().next_deadline() {
            ctx.request_repaint_after(Duration::from_secs_f64((deadline - now).max(0.0)));
        }
        if self.models_rx.is_some() || self.problems_rx.is_some() || self.load_rx.is_some() {
            ctx.request_repaint_after(Duration::from_millis(50));
        }

        self.draw_panels(ctx, source, now);
    }

    fn active_view_mut(&mut self) -> &mut dyn ResettableView {
        match self.session.settings().view_mode {
            crate::session::ViewMode::Circular => &mut self.circular,
            crate::session::ViewMode::Tree => &mut self.tree,
        }
    }
}

impl eframe::App for ExplorerApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        self.model.show(ctx, &self.source);
    }
}
