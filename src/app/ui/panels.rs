use std::sync::Arc;

use eframe::egui::{self, Align, Context, Key, Layout, RichText};

use crate::graph::HighlightFrame;
use crate::session::{RenderState, ViewMode};
use crate::trace::ProblemSource;

use super::super::ViewModel;

impl ViewModel {
    pub(in crate::app) fn draw_panels(&mut self, ctx: &Context, source: &Arc<dyn ProblemSource>, now: f64) {
        if self.show_prompt && ctx.input(|input| input.key_pressed(Key::Escape)) {
            self.show_prompt = false;
        }
        let painted_with = self.session.highlight_frame();

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| self.draw_top_bar(ui));

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| self.draw_controls(ui, source));

        let panel_open = self.session.highlight().selected().is_some();
        if panel_open {
            egui::SidePanel::right("details")
                .resizable(true)
                .default_width(360.0)
                .show(ctx, |ui| self.draw_details(ui));
        }

        if self.session.data().is_some() {
            egui::TopBottomPanel::bottom("chain")
                .resizable(true)
                .default_height(240.0)
                .show(ctx, |ui| self.draw_chain(ui, now));
        }

        egui::CentralPanel::default().show(ctx, |ui| match self.session.render_state() {
            RenderState::Loading => {
                ui.vertical_centered(|ui| {
                    ui.add_space(120.0);
                    ui.heading("Loading reasoning trace...");
                    ui.add_space(8.0);
                    ui.spinner();
                });
            }
            RenderState::Empty { reason } => centered_message(ui, &reason.message()),
            RenderState::NoConnections => centered_message(ui, "No significant connections to display."),
            RenderState::Ready => match self.session.settings().view_mode {
                ViewMode::Circular => self.draw_circular(ui, now, panel_open),
                ViewMode::Tree => self.draw_tree(ui, now),
            },
        });

        self.draw_prompt_window(ctx);
        discard_if_highlight_moved(ctx, painted_with, self.session.highlight_frame());
    }

    fn draw_top_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("chunk-lens");
            ui.separator();

            let Some(data) = self.session.data() else {
                match self.session.key() {
                    Some(key) => ui.label(format!("loading {key}")),
                    None => ui.label("No problem selected"),
                };
                return;
            };

            ui.label(RichText::new(data.title()).strong());
            ui.label(format!("steps: {}", data.steps.len()));
            ui.label(format!("edges: {}", data.edge_count()));

            let requested = self.session.settings().metric;
            let active = self.session.active_metric();
            if requested == active {
                ui.label(format!("metric: {}", active.label()));
            } else {
                ui.label(format!("metric: {} (fallback)", active.label()))
                    .on_hover_text(format!("{} scores are not available for this problem.", requested.label()));
            }

            if data.skipped_records > 0 {
                ui.colored_label(
                    egui::Color32::from_rgb(230, 180, 80),
                    format!("{} malformed records skipped", data.skipped_records),
                );
            }

            let has_prompt = data.prompt.is_some();
            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                if ui.add_enabled(has_prompt, egui::Button::new("Prompt")).clicked() {
                    self.show_prompt = true;
                }
            });
        });
    }

    fn draw_prompt_window(&mut self, ctx: &Context) {
        if !self.show_prompt {
            return;
        }
        let Some(prompt) = self.session.data().and_then(|data| data.prompt.as_deref()) else {
            self.show_prompt = false;
            return;
        };

        let mut open = true;
        egui::Window::new("Prompt")
            .open(&mut open)
            .collapsible(false)
            .default_width(520.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().max_height(420.0).show(ui, |ui| {
                    ui.label(prompt);
                });
                ui.small("Press Escape to close.");
            });
        self.show_prompt = open;
    }
}

/// Panels laid out before the one that moved the highlight painted a stale
/// frame; the pass is repeated so every view shows the same state.
fn discard_if_highlight_moved(ctx: &Context, before: HighlightFrame, after: HighlightFrame) -> bool {
    if before == after {
        return false;
    }
    ctx.request_discard("highlight changed during layout");
    true
}

fn centered_message(ui: &mut egui::Ui, message: &str) {
    ui.vertical_centered(|ui| {
        ui.add_space(120.0);
        ui.label(RichText::new(message).size(16.0));
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{HighlightCoordinator, HoverSource};
    use eframe::egui::RawInput;

    #[test]
    fn hover_during_layout_repeats_the_pass_once() {
        let ctx = Context::default();
        let mut highlight = HighlightCoordinator::new();

        let output = ctx.run(RawInput::default(), |ctx| {
            let before = highlight.frame();
            highlight.hover(3, HoverSource::CentralGraph, 0.0);
            discard_if_highlight_moved(ctx, before, highlight.frame());
        });

        assert_eq!(output.platform_output.num_completed_passes, 2);
        assert_eq!(highlight.frame().hovered, Some(3));
    }

    #[test]
    fn steady_highlight_paints_once() {
        let ctx = Context::default();
        let mut highlight = HighlightCoordinator::new();
        highlight.select(1);

        let output = ctx.run(RawInput::default(), |ctx| {
            let frame = highlight.frame();
            assert!(!discard_if_highlight_moved(ctx, frame, highlight.frame()));
        });

        assert_eq!(output.platform_output.num_completed_passes, 1);
    }
}
