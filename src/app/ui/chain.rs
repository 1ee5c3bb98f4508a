use eframe::egui::{self, Align, RichText, Ui};

use crate::graph::{ClickTarget, HoverSource};
use crate::trace::StepIndex;
use crate::util::{flatten_text, format_tag, truncate_chars};

use super::super::ViewModel;
use super::super::render_utils::{category_color, legend_order};

const ROW_PREVIEW_CHARS: usize = 140;

struct ChainRow {
    index: StepIndex,
    category: String,
    preview: String,
}

impl ViewModel {
    /// Legend, list filters and the step list. Hovering a row highlights the
    /// step in the graph; graph hovers scroll the list after a short delay.
    pub(in crate::app) fn draw_chain(&mut self, ui: &mut Ui, now: f64) {
        let Some(data) = self.session.data() else {
            return;
        };
        let categories = data.categories();
        let legend = legend_order(&categories)
            .into_iter()
            .map(str::to_owned)
            .collect::<Vec<_>>();
        let total = data.steps.len();

        let mut legend_click = None;
        let mut category_click = None;
        let filter = self.session.filter();
        ui.horizontal_wrapped(|ui| {
            for tag in &legend {
                let active = filter.legend_tag.as_deref() == Some(tag.as_str());
                let text = RichText::new(format!("● {}", format_tag(tag, self.abbreviate_tags)))
                    .color(category_color(tag));
                if ui.selectable_label(active, text).clicked() {
                    legend_click = Some(tag.clone());
                }
            }
        });

        egui::CollapsingHeader::new("Categories")
            .id_salt("chain_categories")
            .default_open(false)
            .show(ui, |ui| {
                ui.horizontal_wrapped(|ui| {
                    for tag in &legend {
                        let mut included = filter.included.contains(tag);
                        if ui.checkbox(&mut included, format_tag(tag, self.abbreviate_tags)).changed() {
                            category_click = Some(tag.clone());
                        }
                    }
                });
            });

        if let Some(tag) = legend_click {
            self.session.filter_mut().toggle_legend(&tag);
        }
        if let Some(tag) = category_click {
            self.session.filter_mut().toggle_category(&tag);
        }

        let rows = self
            .session
            .visible_steps()
            .into_iter()
            .map(|step| ChainRow {
                index: step.index,
                category: step.category.clone(),
                preview: truncate_chars(&flatten_text(&step.text), ROW_PREVIEW_CHARS),
            })
            .collect::<Vec<_>>();

        ui.horizontal(|ui| {
            ui.add(
                egui::TextEdit::singleline(&mut self.session.filter_mut().search)
                    .hint_text("Search steps")
                    .desired_width(260.0),
            );
            if self.session.filter().is_active() && ui.button("Clear filters").clicked() {
                self.session.filter_mut().clear();
            }
            ui.label(format!("Showing {} of {} steps", rows.len(), total));
        });
        ui.separator();

        let scroll_target = self.session.highlight_mut().take_scroll_request();
        let frame = self.session.highlight_frame();
        let mut hovered_row = None;
        let mut clicked_row = None;

        egui::ScrollArea::vertical()
            .id_salt("chain_scroll")
            .auto_shrink([false, false])
            .show(ui, |ui| {
                for row in &rows {
                    let highlighted = frame.selected == Some(row.index) || frame.hovered == Some(row.index);
                    let text = RichText::new(format!(
                        "{:>3}  [{}]  {}",
                        row.index,
                        format_tag(&row.category, true),
                        row.preview
                    ));
                    let response = ui.selectable_label(highlighted, text);

                    if response.hovered() {
                        hovered_row = Some(row.index);
                    }
                    if response.clicked() {
                        clicked_row = Some(row.index);
                    }
                    if scroll_target == Some(row.index) {
                        response.scroll_to_me(Some(Align::Center));
                    }
                }
            });

        let highlight = self.session.highlight_mut();
        match hovered_row {
            Some(index) => highlight.hover(index, HoverSource::List, now),
            None => highlight.unhover_from(HoverSource::List),
        }
        if let Some(index) = clicked_row {
            highlight.click(ClickTarget::Node(index));
        }
    }
}
