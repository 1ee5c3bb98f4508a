use std::sync::Arc;

use eframe::egui::{self, Key, Response, RichText, Ui};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use crate::graph::{Direction, ImportanceFilter, SignMode};
use crate::session::{MAX_CAUSAL_LINKS, MAX_TREE_DEPTH, ViewMode};
use crate::trace::{Metric, ProblemEntry, ProblemSource, SelectionKey};
use crate::util::truncate_chars;

use super::super::ViewModel;

const SLIDER_KEY_BASE_RATE: f32 = 6.0;
const SLIDER_KEY_ACCEL_PER_SEC: f32 = 4.0;
const SLIDER_KEY_ACCEL_MAX: f32 = 12.0;
const PROBLEM_ROWS: usize = 200;

#[derive(Clone, Copy, Default)]
struct SliderKeyHoldState {
    held_secs: f32,
    carry: f32,
}

fn slider_key_accel_multiplier(hold_secs: f32) -> f32 {
    let ramp = hold_secs * SLIDER_KEY_ACCEL_PER_SEC;
    (1.0 + ramp + ramp * ramp * 0.15).min(SLIDER_KEY_ACCEL_MAX)
}

/// Steps a focused integer slider while an arrow key is held, speeding up
/// the longer it stays down.
fn apply_slider_arrow_acceleration(ui: &Ui, response: &Response, value: &mut usize, min: usize, max: usize) -> bool {
    let state_id = response.id.with("arrow_key_hold_state");
    let mut state = ui
        .ctx()
        .data(|data| data.get_temp::<SliderKeyHoldState>(state_id).unwrap_or_default());

    let (delta_time, increase, decrease) = ui.input(|input| {
        (
            input.stable_dt.min(0.1),
            input.key_down(Key::ArrowRight) || input.key_down(Key::ArrowUp),
            input.key_down(Key::ArrowLeft) || input.key_down(Key::ArrowDown),
        )
    });
    let direction = i32::from(increase) - i32::from(decrease);

    if !response.has_focus() || direction == 0 {
        ui.ctx()
            .data_mut(|data| data.insert_temp(state_id, SliderKeyHoldState::default()));
        return false;
    }

    state.held_secs += delta_time;
    state.carry += SLIDER_KEY_BASE_RATE * slider_key_accel_multiplier(state.held_secs) * delta_time;
    let whole = state.carry.floor();
    state.carry -= whole;

    let old_value = *value;
    let delta = whole as usize;
    *value = if direction > 0 {
        value.saturating_add(delta).min(max)
    } else {
        value.saturating_sub(delta).max(min)
    };

    ui.ctx().request_repaint();
    ui.ctx().data_mut(|data| data.insert_temp(state_id, state));
    *value != old_value
}

fn usize_slider(ui: &mut Ui, value: &mut usize, min: usize, max: usize, text: &str) -> bool {
    let response = ui.add(egui::Slider::new(value, min..=max).text(text));
    let accelerated = apply_slider_arrow_acceleration(ui, &response, value, min, max);
    response.changed() || accelerated
}

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

/// Problems matching `query` on id or preview, best match first. An empty
/// query keeps the catalog order.
fn rank_problems<'a>(problems: &'a [ProblemEntry], query: &str) -> Vec<&'a ProblemEntry> {
    let query = query.trim();
    if query.is_empty() {
        return problems.iter().collect();
    }

    let matcher = SkimMatcherV2::default();
    let mut scored = problems
        .iter()
        .filter_map(|problem| {
            let by_id = fuzzy_match_score(&matcher, &problem.id, query);
            let by_preview = fuzzy_match_score(&matcher, &problem.preview, query);
            by_id.max(by_preview).map(|score| (score, problem))
        })
        .collect::<Vec<_>>();
    scored.sort_by(|(a_score, a), (b_score, b)| b_score.cmp(a_score).then_with(|| a.id.cmp(&b.id)));
    scored.into_iter().map(|(_, problem)| problem).collect()
}

impl ViewModel {
    pub(in crate::app) fn draw_controls(&mut self, ui: &mut Ui, source: &Arc<dyn ProblemSource>) {
        egui::ScrollArea::vertical()
            .id_salt("controls_scroll")
            .auto_shrink([false, false])
            .show(ui, |ui| {
                ui.heading("Problem");
                ui.add_space(4.0);
                self.draw_picker(ui, source);

                ui.separator();
                ui.heading("View");
                ui.add_space(4.0);
                self.draw_view_settings(ui);
            });
    }

    fn draw_picker(&mut self, ui: &mut Ui, source: &Arc<dyn ProblemSource>) {
        if let Some(error) = &self.picker.catalog_error {
            ui.colored_label(egui::Color32::from_rgb(230, 110, 90), error);
        }
        if self.models_rx.is_some() {
            ui.horizontal(|ui| {
                ui.spinner();
                ui.label("Reading catalog...");
            });
        }

        let mut model_choice = None;
        egui::ComboBox::from_label("Model")
            .selected_text(self.picker.model.as_deref().unwrap_or("choose..."))
            .show_ui(ui, |ui| {
                for entry in &self.picker.models {
                    let selected = self.picker.model.as_deref() == Some(entry.name.as_str());
                    if ui.selectable_label(selected, &entry.name).clicked() && !selected {
                        model_choice = Some(entry.clone());
                    }
                }
            });
        if let Some(entry) = model_choice {
            self.picker.model = Some(entry.name.clone());
            self.picker.solution_type = entry.solution_types.first().cloned();
            self.picker.problems.clear();
            if let Some(solution_type) = self.picker.solution_type.clone() {
                self.request_problems(source, entry.name, solution_type);
            }
        }

        let solution_types = self
            .picker
            .model
            .as_ref()
            .and_then(|name| self.picker.models.iter().find(|entry| &entry.name == name))
            .map(|entry| entry.solution_types.clone())
            .unwrap_or_default();
        let mut solution_choice = None;
        egui::ComboBox::from_label("Solution type")
            .selected_text(self.picker.solution_type.as_deref().unwrap_or("choose..."))
            .show_ui(ui, |ui| {
                for solution_type in &solution_types {
                    let selected = self.picker.solution_type.as_deref() == Some(solution_type.as_str());
                    if ui.selectable_label(selected, solution_type).clicked() && !selected {
                        solution_choice = Some(solution_type.clone());
                    }
                }
            });
        if let (Some(solution_type), Some(model)) = (solution_choice, self.picker.model.clone()) {
            self.picker.solution_type = Some(solution_type.clone());
            self.request_problems(source, model, solution_type);
        }

        ui.add_space(4.0);
        ui.add(egui::TextEdit::singleline(&mut self.picker.problem_search).hint_text("Search problems"));
        if self.problems_rx.is_some() {
            ui.spinner();
        }

        let current = self.session.key().map(|key| key.problem_id.clone());
        let mut load_choice = None;
        let ranked = rank_problems(&self.picker.problems, &self.picker.problem_search);
        ui.small(format!("{} of {} problems", ranked.len(), self.picker.problems.len()));
        egui::ScrollArea::vertical()
            .id_salt("problem_list")
            .max_height(220.0)
            .auto_shrink([false, true])
            .show(ui, |ui| {
                for problem in ranked.into_iter().take(PROBLEM_ROWS) {
                    let selected = current.as_deref() == Some(problem.id.as_str());
                    let response = ui.selectable_label(selected, &problem.id);
                    let response = if problem.preview.is_empty() {
                        response
                    } else {
                        response.on_hover_text(truncate_chars(&problem.preview, 240))
                    };
                    if response.clicked() && !selected {
                        load_choice = Some(problem.id.clone());
                    }
                }
            });

        if let (Some(problem), Some(model), Some(solution_type)) =
            (load_choice, self.picker.model.clone(), self.picker.solution_type.clone())
        {
            self.request_load(source, SelectionKey::new(model, solution_type, problem));
        }
    }

    fn draw_view_settings(&mut self, ui: &mut Ui) {
        let mut settings = *self.session.settings();

        ui.horizontal(|ui| {
            for mode in [ViewMode::Circular, ViewMode::Tree] {
                if ui.selectable_label(settings.view_mode == mode, mode.label()).clicked() {
                    self.session.set_view_mode(mode);
                }
            }
        });

        let has_suppression = self.session.data().is_none_or(|data| data.has_suppression());
        egui::ComboBox::from_label("Metric")
            .selected_text(settings.metric.label())
            .show_ui(ui, |ui| {
                for metric in [Metric::AttentionSuppression, Metric::Counterfactual] {
                    let available = metric != Metric::AttentionSuppression || has_suppression;
                    let clicked = ui
                        .add_enabled_ui(available, |ui| ui.selectable_label(settings.metric == metric, metric.label()))
                        .inner
                        .clicked();
                    if clicked {
                        settings.metric = metric;
                    }
                }
            });
        if settings.metric != self.session.settings().metric {
            self.session.set_metric(settings.metric);
        }

        ui.horizontal(|ui| {
            ui.label("Sign:");
            for mode in [SignMode::Absolute, SignMode::PositiveClamped] {
                if ui.radio(settings.sign_mode == mode, mode.label()).clicked() && settings.sign_mode != mode {
                    self.session.set_sign_mode(mode);
                }
            }
        });

        ui.add_space(6.0);
        let settings = *self.session.settings();
        let mut causal_links = settings.causal_links;
        if usize_slider(
            ui,
            &mut causal_links,
            settings.min_causal_links(),
            MAX_CAUSAL_LINKS,
            "Causal links per step",
        ) {
            self.session.set_causal_links(causal_links);
        }

        match settings.view_mode {
            ViewMode::Circular => {
                let mut level = usize::from(settings.importance_filter.level());
                let max_level = usize::from(ImportanceFilter::LEVELS - 1);
                if usize_slider(ui, &mut level, 0, max_level, "Importance filter") {
                    let level = u8::try_from(level).unwrap_or(ImportanceFilter::LEVELS - 1);
                    self.session.set_importance_filter(ImportanceFilter::new(level));
                }
                ui.small(self.session.settings().importance_filter.label());
            }
            ViewMode::Tree => {
                let mut depth = settings.max_depth;
                if usize_slider(ui, &mut depth, 1, MAX_TREE_DEPTH, "Max depth") {
                    self.session.set_max_depth(depth);
                }
                ui.horizontal(|ui| {
                    ui.label("Direction:");
                    for direction in [Direction::Incoming, Direction::Outgoing] {
                        if ui.radio(settings.direction == direction, direction.label()).clicked() {
                            self.session.set_direction(direction);
                        }
                    }
                });
            }
        }

        ui.add_space(6.0);
        ui.checkbox(&mut self.abbreviate_tags, "Abbreviate category tags");
        if ui.button("Reset view").clicked() {
            self.active_view_mut().reset_view();
        }

        ui.add_space(8.0);
        ui.label(RichText::new("Drag to pan, scroll to zoom, click a step to select it.").small());
    }
}
