use std::collections::BTreeSet;

use eframe::egui::{Color32, Painter, Pos2, Rect, Stroke, Vec2};

const UNKNOWN_CATEGORY: Color32 = Color32::from_rgb(0x9E, 0x9E, 0x9E);

/// Category tags in legend order with their colours.
const CATEGORY_COLORS: &[(&str, Color32)] = &[
    ("problem_setup", Color32::from_rgb(0x42, 0x85, 0xF4)),
    ("plan_generation", Color32::from_rgb(0xEA, 0x43, 0x35)),
    ("fact_retrieval", Color32::from_rgb(0xFB, 0xBC, 0x05)),
    ("active_computation", Color32::from_rgb(0x34, 0xA8, 0x53)),
    ("uncertainty_management", Color32::from_rgb(0x9C, 0x27, 0xB0)),
    ("self_checking", Color32::from_rgb(0xFF, 0x98, 0x00)),
    ("result_consolidation", Color32::from_rgb(0x00, 0xBC, 0xD4)),
    ("final_answer_emission", Color32::from_rgb(0x79, 0x55, 0x48)),
    ("situation_assessment", Color32::from_rgb(0x42, 0x85, 0xF4)),
    ("leverage_identification", Color32::from_rgb(0x65, 0x43, 0x21)),
    ("urgency_and_time", Color32::from_rgb(0xFF, 0xA5, 0x00)),
    ("self_preservation", Color32::from_rgb(0x9C, 0x27, 0xB0)),
    ("email_analysis", Color32::from_rgb(0x00, 0x80, 0x80)),
    ("action_execution", Color32::from_rgb(0x2F, 0x4F, 0x4F)),
    ("structural_marker", Color32::from_rgb(0x00, 0xBC, 0xD4)),
    ("action_marker", Color32::from_rgb(0x00, 0xBC, 0xD4)),
    ("evidence_assessment", Color32::from_rgb(0x42, 0x85, 0xF4)),
    ("ethical_analysis", Color32::from_rgb(0xEA, 0x43, 0x35)),
    ("risk_evaluation", Color32::from_rgb(0x34, 0xA8, 0x53)),
    ("regulatory_analysis", Color32::from_rgb(0xFB, 0xBC, 0x05)),
    ("stakeholder_impact", Color32::from_rgb(0x9C, 0x27, 0xB0)),
    ("option_generation", Color32::from_rgb(0x00, 0xBC, 0xD4)),
    ("consequence_analysis", Color32::from_rgb(0xFF, 0x98, 0x00)),
    ("action_planning", Color32::from_rgb(0x8B, 0xC3, 0x4A)),
    ("final_action", Color32::from_rgb(0xF4, 0x43, 0x36)),
    ("algorithm_design", Color32::from_rgb(0x8B, 0x00, 0x00)),
    ("deduction", Color32::from_rgb(0xFF, 0x69, 0xB4)),
    ("code_writing", Color32::from_rgb(0x34, 0xA8, 0x53)),
    ("verification", Color32::from_rgb(0xFF, 0xA5, 0x00)),
    ("answer_emission", Color32::from_rgb(0x79, 0x55, 0x48)),
    ("other", Color32::from_rgb(0x79, 0x55, 0x48)),
];

pub(super) fn category_color(category: &str) -> Color32 {
    CATEGORY_COLORS
        .iter()
        .find(|(tag, _)| *tag == category)
        .map_or(UNKNOWN_CATEGORY, |(_, color)| *color)
}

/// Categories present in a trace, known tags in palette order followed by
/// unknown ones alphabetically.
pub(super) fn legend_order<'a>(present: &BTreeSet<&'a str>) -> Vec<&'a str> {
    let mut ordered = CATEGORY_COLORS
        .iter()
        .filter_map(|(tag, _)| present.get(tag).copied())
        .collect::<Vec<_>>();
    ordered.extend(
        present
            .iter()
            .copied()
            .filter(|tag| CATEGORY_COLORS.iter().all(|(known, _)| known != tag)),
    );
    ordered
}

pub(super) fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;

    Color32::from_rgba_unmultiplied(
        ((base.r() as f32 * inverse) + (overlay.r() as f32 * amount)) as u8,
        ((base.g() as f32 * inverse) + (overlay.g() as f32 * amount)) as u8,
        ((base.b() as f32 * inverse) + (overlay.b() as f32 * amount)) as u8,
        ((base.a() as f32 * inverse) + (overlay.a() as f32 * amount)) as u8,
    )
}

pub(super) fn with_opacity(color: Color32, opacity: f32) -> Color32 {
    let alpha = (opacity.clamp(0.0, 1.0) * 255.0) as u8;
    Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), alpha)
}

/// Category colour washed toward white as intensity drops.
pub(super) fn node_fill(category: &str, intensity: f32) -> Color32 {
    blend_color(Color32::WHITE, category_color(category), intensity)
}

pub(super) fn draw_background(painter: &Painter, rect: Rect, pan: Vec2, zoom: f32) {
    painter.rect_filled(rect, 0.0, Color32::from_rgb(19, 23, 29));

    let step = (56.0 * zoom.clamp(0.6, 1.8)).max(20.0);
    let origin = rect.min + pan;
    let stroke = Stroke::new(1.0, Color32::from_rgba_unmultiplied(60, 70, 80, 70));

    let mut x = rect.left() + (origin.x - rect.left()).rem_euclid(step);
    while x < rect.right() {
        painter.line_segment([Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())], stroke);
        x += step;
    }

    let mut y = rect.top() + (origin.y - rect.top()).rem_euclid(step);
    while y < rect.bottom() {
        painter.line_segment([Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)], stroke);
        y += step;
    }
}

pub(super) fn circle_visible(rect: Rect, position: Pos2, radius: f32) -> bool {
    !(position.x + radius < rect.left()
        || position.x - radius > rect.right()
        || position.y + radius < rect.top()
        || position.y - radius > rect.bottom())
}

/// Arrow head at `tip`, pointing along `start -> tip`.
pub(super) fn draw_arrow_head(painter: &Painter, start: Pos2, tip: Pos2, size: f32, color: Color32) {
    let delta = tip - start;
    if delta.length() <= f32::EPSILON {
        return;
    }
    let direction = delta / delta.length();
    let normal = direction.rot90();
    let base = tip - direction * size;
    painter.add(eframe::egui::Shape::convex_polygon(
        vec![tip, base + normal * (size * 0.5), base - normal * (size * 0.5)],
        color,
        Stroke::NONE,
    ));
}
