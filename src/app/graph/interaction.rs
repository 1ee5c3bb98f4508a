use eframe::egui::{self, Pos2, Rect, Ui, Vec2};

const MIN_ZOOM: f32 = 0.1;
const MAX_ZOOM: f32 = 6.0;

/// Owned by each view and reset through the view itself, never through
/// shared state.
pub(in crate::app) trait ResettableView {
    fn reset_view(&mut self);
}

/// Pan and zoom of one canvas. Layout coordinates are relative to the
/// canvas' top-left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(in crate::app) struct Viewport {
    pub(in crate::app) pan: Vec2,
    pub(in crate::app) zoom: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            pan: Vec2::ZERO,
            zoom: 1.0,
        }
    }
}

impl Viewport {
    pub(in crate::app) fn reset(&mut self) {
        *self = Self::default();
    }

    pub(in crate::app) fn to_screen(&self, rect: Rect, layout: Pos2) -> Pos2 {
        rect.min + self.pan + layout.to_vec2() * self.zoom
    }

    pub(in crate::app) fn to_layout(&self, rect: Rect, screen: Pos2) -> Pos2 {
        ((screen - rect.min - self.pan) / self.zoom).to_pos2()
    }

    /// Wheel zoom anchored at the pointer.
    pub(in crate::app) fn handle_zoom(&mut self, ui: &Ui, rect: Rect, response: &egui::Response) -> bool {
        if !response.hovered() {
            return false;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return false;
        }

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        let layout_before = self.to_layout(rect, pointer);

        let zoom_factor = (1.0 + (scroll * 0.0018)).clamp(0.85, 1.15);
        self.zoom = (self.zoom * zoom_factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan = pointer - rect.min - (layout_before.to_vec2() * self.zoom);
        true
    }

    pub(in crate::app) fn handle_pan(&mut self, response: &egui::Response) {
        if response.dragged_by(egui::PointerButton::Primary)
            || response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
        {
            self.pan += response.drag_delta();
        }
    }
}

/// Closest node whose disc contains the pointer.
pub(in crate::app) fn hovered_index(ui: &Ui, screen_positions: &[Pos2], screen_radii: &[f32]) -> Option<usize> {
    let pointer = ui.input(|input| input.pointer.hover_pos())?;
    screen_positions
        .iter()
        .zip(screen_radii)
        .enumerate()
        .filter_map(|(index, (position, radius))| {
            let distance = position.distance(pointer);
            (distance <= *radius).then_some((index, distance))
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, _)| index)
}

/// Index of the first rectangle containing the pointer.
pub(in crate::app) fn hovered_box(ui: &Ui, boxes: &[Rect]) -> Option<usize> {
    let pointer = ui.input(|input| input.pointer.hover_pos())?;
    boxes.iter().position(|rect| rect.contains(pointer))
}
