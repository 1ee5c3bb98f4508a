use eframe::egui::{self, RichText, Ui};

use crate::graph::{ClickTarget, Neighbor};
use crate::session::{Alternative, Navigation};
use crate::trace::{StepIndex, TraceData};
use crate::util::{flatten_text, format_tag, truncate_chars};

use super::super::ViewModel;
use super::super::render_utils::category_color;

const NEIGHBOR_PREVIEW_CHARS: usize = 70;

enum DetailAction {
    Select(StepIndex),
    Navigate(Navigation),
    Close,
}

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        let Some(selected) = self.session.highlight().selected() else {
            return;
        };
        let Some(data) = self.session.data() else {
            return;
        };
        let Some(step) = data.step(selected) else {
            ui.label("The selected step is not part of this trace.");
            return;
        };

        let causal_effects = self.session.causal_effects(selected);
        let affected_by = self.session.affected_by(selected);
        let alternatives = self.session.resample_alternatives(selected);
        let mut action = None;

        ui.horizontal(|ui| {
            ui.heading(format!("Step {}", step.index));
            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                if ui.button("✕").on_hover_text("Clear selection").clicked() {
                    action = Some(DetailAction::Close);
                }
                if ui.button("Next ▶").clicked() {
                    action = Some(DetailAction::Navigate(Navigation::Next));
                }
                if ui.button("◀ Prev").clicked() {
                    action = Some(DetailAction::Navigate(Navigation::Previous));
                }
            });
        });

        ui.colored_label(
            category_color(&step.category),
            format_tag(&step.category, self.abbreviate_tags),
        );
        ui.label(format!("Importance: {:.4}", step.importance));
        if !step.depends_on.is_empty() {
            let depends_on = step
                .depends_on
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            ui.small(format!("Depends on: {depends_on}"));
        }

        egui::ScrollArea::vertical()
            .id_salt("details_scroll")
            .auto_shrink([false, false])
            .show(ui, |ui| {
                ui.add_space(4.0);
                ui.label(flatten_text(&step.text));

                ui.separator();
                ui.label(RichText::new("Causally affects").strong());
                neighbor_rows(ui, data, &causal_effects, self.abbreviate_tags, &mut action);

                ui.separator();
                ui.label(RichText::new("Causally affected by").strong());
                neighbor_rows(ui, data, &affected_by, self.abbreviate_tags, &mut action);

                ui.separator();
                ui.label(RichText::new("Resampled alternatives").strong());
                alternative_rows(ui, &alternatives);
            });

        if ui.ui_contains_pointer() && ui.input(|input| input.pointer.primary_clicked()) {
            self.session.highlight_mut().click(ClickTarget::DetailPanel);
        }

        match action {
            Some(DetailAction::Select(index)) => {
                let highlight = self.session.highlight_mut();
                highlight.click(ClickTarget::Node(index));
                highlight.request_scroll(index);
            }
            Some(DetailAction::Navigate(navigation)) => {
                let _ = self.session.navigate(navigation);
            }
            Some(DetailAction::Close) => self.session.highlight_mut().deselect(),
            None => {}
        }
    }
}

fn neighbor_rows(
    ui: &mut Ui,
    data: &TraceData,
    neighbors: &[Neighbor],
    abbreviate_tags: bool,
    action: &mut Option<DetailAction>,
) {
    if neighbors.is_empty() {
        ui.small("None");
        return;
    }

    for neighbor in neighbors {
        let Some(step) = data.step(neighbor.index) else {
            continue;
        };
        let label = format!(
            "Step {} · {} · {:.2}",
            step.index,
            format_tag(&step.category, abbreviate_tags),
            neighbor.weight
        );
        let response = ui
            .selectable_label(false, label)
            .on_hover_text(truncate_chars(&flatten_text(&step.text), NEIGHBOR_PREVIEW_CHARS * 3));
        if response.clicked() {
            *action = Some(DetailAction::Select(step.index));
        }
        ui.small(truncate_chars(&flatten_text(&step.text), NEIGHBOR_PREVIEW_CHARS));
    }
}

fn alternative_rows(ui: &mut Ui, alternatives: &[Alternative]) {
    if alternatives.is_empty() {
        ui.small("No alternative wordings were sampled.");
        return;
    }

    for alternative in alternatives {
        ui.horizontal_wrapped(|ui| {
            ui.label(RichText::new(format!("×{}", alternative.count)).monospace());
            ui.label(flatten_text(&alternative.text));
        });
    }
}
