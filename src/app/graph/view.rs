use eframe::egui::{self, Align2, Color32, FontId, Pos2, Sense, Stroke, Ui, vec2};

use crate::graph::{CircleGeometry, ClickTarget, EdgeKind, HoverSource, NodeBorder};
use crate::util::{flatten_text, truncate_chars};

use super::super::render_utils::{circle_visible, draw_arrow_head, draw_background, node_fill, with_opacity};
use super::super::{CircularCache, CircularCacheKey, ViewModel};
use super::interaction::hovered_index;

const SEQUENTIAL_EDGE: Color32 = Color32::from_rgb(150, 160, 172);
const CAUSAL_EDGE: Color32 = Color32::from_rgb(241, 146, 94);
const SELECTED_BORDER: Color32 = Color32::from_rgb(245, 206, 93);

impl ViewModel {
    fn ensure_circular_cache(&mut self) {
        let settings = self.session.settings();
        let key = CircularCacheKey {
            revision: self.session.revision(),
            causal_links: settings.causal_links,
            filter: settings.importance_filter,
        };

        if self.circular.cache.as_ref().is_some_and(|cache| cache.key == key) {
            return;
        }

        let graph = self.session.circular_graph();
        tracing::debug!(
            nodes = graph.nodes.len(),
            causal = graph.causal_edge_count(),
            "rebuilt circular graph"
        );
        self.circular.cache = Some(CircularCache { key, graph });
    }

    /// Fits the circle to the canvas once its size has been stable for the
    /// debounce window.
    fn settle_canvas_size(&mut self, ui: &Ui, size: egui::Vec2, now: f64) -> egui::Vec2 {
        let view = &mut self.circular;
        match view.settled_size {
            None => view.settled_size = Some(size),
            Some(settled) if settled != size => {
                if view.resize.pending() != Some(&size) {
                    view.resize.trigger(now, size);
                }
            }
            Some(_) => view.resize.cancel(),
        }

        if let Some(size) = view.resize.poll(now) {
            view.settled_size = Some(size);
        }
        if let Some(deadline) = view.resize.deadline() {
            ui.ctx()
                .request_repaint_after(std::time::Duration::from_secs_f64((deadline - now).max(0.0)));
        }

        view.settled_size.unwrap_or(size)
    }

    pub(in crate::app) fn draw_circular(&mut self, ui: &mut Ui, now: f64, panel_open: bool) {
        self.ensure_circular_cache();

        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);
        let canvas = self.settle_canvas_size(ui, rect.size(), now);

        self.circular.viewport.handle_zoom(ui, rect, &response);
        self.circular.viewport.handle_pan(&response);
        let viewport = self.circular.viewport;
        draw_background(&painter, rect, viewport.pan, viewport.zoom);

        let Some(cache) = self.circular.cache.as_ref() else {
            return;
        };
        let graph = &cache.graph;
        let layout = graph.layout(CircleGeometry {
            width: canvas.x,
            height: canvas.y,
            panel_open,
        });

        let screen_positions = layout
            .iter()
            .map(|position| viewport.to_screen(rect, *position))
            .collect::<Vec<Pos2>>();
        let screen_radii = graph
            .nodes
            .iter()
            .map(|node| (node.radius() * viewport.zoom.powf(0.40)).clamp(4.0, 48.0))
            .collect::<Vec<_>>();

        let hovered = if response.hovered() {
            hovered_index(ui, &screen_positions, &screen_radii).map(|slot| graph.nodes[slot].index)
        } else {
            None
        };

        let highlight = self.session.highlight_mut();
        match hovered {
            Some(index) => {
                highlight.hover(index, HoverSource::CentralGraph, now);
                ui.output_mut(|output| output.cursor_icon = egui::CursorIcon::PointingHand);
            }
            None => highlight.unhover_from(HoverSource::CentralGraph),
        }
        if response.clicked_by(egui::PointerButton::Primary) {
            highlight.click(hovered.map_or(ClickTarget::Background, ClickTarget::Node));
        }
        let frame = self.session.highlight_frame();

        let Some(data) = self.session.data() else {
            return;
        };

        for edge in &graph.edges {
            let (Some(source), Some(target)) = (graph.position_of(edge.source), graph.position_of(edge.target)) else {
                continue;
            };
            let start = screen_positions[source];
            let end = screen_positions[target];
            let opacity = edge.opacity(frame.focus);
            let emphasized = frame.emphasizes(edge.source, edge.target);

            match edge.kind {
                EdgeKind::Sequential => {
                    painter.line_segment([start, end], Stroke::new(1.5, with_opacity(SEQUENTIAL_EDGE, opacity)));
                }
                EdgeKind::Causal => {
                    let width = 1.0 + edge.weight * 3.0 + if emphasized { 1.0 } else { 0.0 };
                    let color = with_opacity(CAUSAL_EDGE, opacity);
                    let direction = (end - start).normalized();
                    let tip = end - direction * screen_radii[target];
                    painter.line_segment([start, tip], Stroke::new(width, color));
                    draw_arrow_head(&painter, start, tip, 6.0 + width, color);
                }
            }
        }

        for (slot, node) in graph.nodes.iter().enumerate() {
            let position = screen_positions[slot];
            let radius = screen_radii[slot];
            if !circle_visible(rect, position, radius) {
                continue;
            }

            let category = data.step(node.index).map_or("", |step| step.category.as_str());
            painter.circle_filled(position, radius, node_fill(category, node.color_intensity()));

            let stroke = match frame.node_border(node.index) {
                NodeBorder::Selected => Stroke::new(3.0, SELECTED_BORDER),
                NodeBorder::Hovered => Stroke::new(2.0, Color32::WHITE),
                NodeBorder::None => Stroke::new(1.0, Color32::from_rgba_unmultiplied(15, 15, 15, 190)),
            };
            painter.circle_stroke(position, radius, stroke);
            painter.text(
                position,
                Align2::CENTER_CENTER,
                node.index.to_string(),
                FontId::proportional((radius * 0.8).clamp(8.0, 14.0)),
                Color32::from_gray(20),
            );
        }

        if let Some(index) = frame.hovered
            && let Some(step) = data.step(index)
        {
            painter.text(
                rect.left_top() + vec2(10.0, 10.0),
                Align2::LEFT_TOP,
                format!(
                    "Step {}  |  importance {:.4}  |  {}",
                    step.index,
                    step.importance,
                    truncate_chars(&flatten_text(&step.text), 90)
                ),
                FontId::proportional(13.0),
                Color32::from_gray(240),
            );
        }
    }
}
