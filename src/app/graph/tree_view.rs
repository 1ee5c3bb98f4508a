use eframe::egui::{self, Align2, Color32, CornerRadius, FontId, Pos2, Rect, Sense, Stroke, StrokeKind, Ui, Vec2, vec2};

use crate::graph::tree::{NODE_HEIGHT, NODE_WIDTH};
use crate::graph::{ClickTarget, HoverSource, NodeBorder};
use crate::util::format_tag;

use super::super::render_utils::{category_color, draw_arrow_head, draw_background, with_opacity};
use super::super::{TreeCache, TreeCacheKey, ViewModel};
use super::interaction::hovered_box;

const TREE_EDGE: Color32 = Color32::from_rgb(120, 170, 230);

/// Point where the segment from `center` toward `toward` leaves a box of
/// the given half extents.
fn box_exit(center: Pos2, half: Vec2, toward: Pos2) -> Pos2 {
    let delta = toward - center;
    if delta.x.abs() <= f32::EPSILON && delta.y.abs() <= f32::EPSILON {
        return center;
    }
    let scale_x = if delta.x.abs() > f32::EPSILON { half.x / delta.x.abs() } else { f32::INFINITY };
    let scale_y = if delta.y.abs() > f32::EPSILON { half.y / delta.y.abs() } else { f32::INFINITY };
    center + delta * scale_x.min(scale_y).min(1.0)
}

impl ViewModel {
    fn ensure_tree_cache(&mut self) {
        let key = TreeCacheKey {
            revision: self.session.revision(),
            root: self.session.tree_root(),
            params: self.session.tree_params(),
        };

        if self.tree.cache.as_ref().is_some_and(|cache| cache.key == key) {
            return;
        }

        let tree = self.session.attribution_tree();
        let layout = tree.layout();
        let sign_mode = self.session.settings().sign_mode;
        let data = self.session.data();
        let encoding = tree.encode(
            |index| {
                data.and_then(|data| data.step(index))
                    .map_or(0.0, |step| step.importance)
            },
            sign_mode,
        );
        tracing::debug!(root = ?tree.root, nodes = tree.node_count(), "rebuilt attribution tree");

        self.tree.cache = Some(TreeCache {
            key,
            tree,
            layout,
            encoding,
        });
    }

    pub(in crate::app) fn draw_tree(&mut self, ui: &mut Ui, now: f64) {
        self.ensure_tree_cache();

        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);

        self.tree.viewport.handle_zoom(ui, rect, &response);
        self.tree.viewport.handle_pan(&response);
        let viewport = self.tree.viewport;
        draw_background(&painter, rect, viewport.pan, viewport.zoom);

        let Some(cache) = self.tree.cache.as_ref() else {
            return;
        };
        let centering = vec2(((rect.width() - cache.layout.width) / 2.0).max(0.0), 0.0);
        let to_screen = |position: Pos2| viewport.to_screen(rect, position + centering);
        let half = vec2(NODE_WIDTH, NODE_HEIGHT) * viewport.zoom / 2.0;

        let nodes = cache.tree.nodes().collect::<Vec<_>>();
        let boxes = nodes
            .iter()
            .map(|node| {
                let center = cache
                    .layout
                    .positions
                    .get(&node.index)
                    .map_or(rect.center(), |position| to_screen(*position));
                Rect::from_center_size(center, half * 2.0)
            })
            .collect::<Vec<_>>();

        let hovered = if response.hovered() {
            hovered_box(ui, &boxes).map(|slot| nodes[slot].index)
        } else {
            None
        };

        let highlight = self.session.highlight_mut();
        match hovered {
            Some(index) => {
                highlight.hover(index, HoverSource::TreeView, now);
                ui.output_mut(|output| output.cursor_icon = egui::CursorIcon::PointingHand);
            }
            None => highlight.unhover_from(HoverSource::TreeView),
        }
        if response.clicked_by(egui::PointerButton::Primary) {
            highlight.click(hovered.map_or(ClickTarget::Background, ClickTarget::Node));
        }
        let frame = self.session.highlight_frame();

        let Some(data) = self.session.data() else {
            return;
        };

        for edge in cache.tree.edges() {
            let (Some(source), Some(target)) = (
                cache.layout.positions.get(&edge.source),
                cache.layout.positions.get(&edge.target),
            ) else {
                continue;
            };
            let (source, target) = (to_screen(*source), to_screen(*target));
            let start = box_exit(source, half, target);
            let tip = box_exit(target, half, source);

            let mut opacity = cache
                .encoding
                .edge_opacity
                .get(&(edge.source, edge.target))
                .copied()
                .unwrap_or(0.3);
            if frame.focus.is_some() && !frame.emphasizes(edge.source, edge.target) {
                opacity *= 0.35;
            }
            let color = with_opacity(TREE_EDGE, opacity);
            painter.line_segment([start, tip], Stroke::new(2.0 * viewport.zoom.sqrt(), color));
            draw_arrow_head(&painter, start, tip, 9.0 * viewport.zoom.sqrt(), color);
        }

        let font_scale = viewport.zoom.clamp(0.5, 2.0);
        for (node, node_rect) in nodes.iter().zip(&boxes) {
            if !rect.intersects(*node_rect) {
                continue;
            }
            let Some(step) = data.step(node.index) else {
                continue;
            };

            let opacity = cache.encoding.node_opacity.get(&node.index).copied().unwrap_or(1.0);
            let fill = with_opacity(category_color(&step.category), opacity);
            let radius = CornerRadius::same((6.0 * font_scale) as u8);
            painter.rect_filled(*node_rect, radius, fill);

            let stroke = match frame.node_border(node.index) {
                NodeBorder::Selected => Stroke::new(3.0, Color32::from_rgb(245, 206, 93)),
                NodeBorder::Hovered => Stroke::new(2.0, Color32::WHITE),
                NodeBorder::None if cache.tree.root == Some(node.index) => Stroke::new(2.0, Color32::from_gray(220)),
                NodeBorder::None => Stroke::new(1.0, Color32::from_gray(40)),
            };
            painter.rect_stroke(*node_rect, radius, stroke, StrokeKind::Outside);

            let center = node_rect.center();
            painter.text(
                center - vec2(0.0, 14.0 * font_scale),
                Align2::CENTER_CENTER,
                format!("Step {}", step.index),
                FontId::proportional(13.0 * font_scale),
                Color32::from_gray(15),
            );
            painter.text(
                center,
                Align2::CENTER_CENTER,
                format_tag(&step.category, true),
                FontId::proportional(11.0 * font_scale),
                Color32::from_gray(25),
            );
            painter.text(
                center + vec2(0.0, 14.0 * font_scale),
                Align2::CENTER_CENTER,
                format!("{:.3}", step.importance),
                FontId::monospace(10.0 * font_scale),
                Color32::from_gray(25),
            );
        }
    }
}
