use std::collections::BTreeSet;

use crate::trace::Step;

/// Filters applied to the step list: legend tag, text search and included
/// categories, intersected.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StepFilter {
    pub legend_tag: Option<String>,
    pub search: String,
    /// Empty means every category is included.
    pub included: BTreeSet<String>,
}

impl StepFilter {
    pub fn is_active(&self) -> bool {
        self.legend_tag.is_some() || !self.search.trim().is_empty() || !self.included.is_empty()
    }

    pub fn matches(&self, step: &Step) -> bool {
        if let Some(tag) = &self.legend_tag
            && step.category != *tag
        {
            return false;
        }

        let query = self.search.trim();
        if !query.is_empty() && !step.text.to_lowercase().contains(&query.to_lowercase()) {
            return false;
        }

        self.included.is_empty() || self.included.contains(&step.category)
    }

    /// Steps passing every filter, in index order.
    pub fn apply<'a>(&self, steps: &'a [Step]) -> Vec<&'a Step> {
        let mut visible = steps.iter().filter(|step| self.matches(step)).collect::<Vec<_>>();
        visible.sort_by_key(|step| step.index);
        visible
    }

    /// Clicking the active legend entry clears it; any legend click resets
    /// the list filters.
    pub fn toggle_legend(&mut self, tag: &str) {
        self.legend_tag = match self.legend_tag.take() {
            Some(active) if active == tag => None,
            _ => Some(tag.to_owned()),
        };
        self.search.clear();
        self.included.clear();
    }

    pub fn toggle_category(&mut self, category: &str) {
        if !self.included.remove(category) {
            self.included.insert(category.to_owned());
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
