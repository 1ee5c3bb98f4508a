use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

use serde_json::{Map, Value};

pub type StepIndex = u32;

/// Which dataset variant a problem directory was written in. The variant
/// decides which raw field the step importance is read from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DataFormat {
    #[default]
    Scenario,
    Problem,
}

/// Scoring metric the influence edges were produced with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Metric {
    #[default]
    AttentionSuppression,
    Counterfactual,
}

impl Metric {
    pub fn label(self) -> &'static str {
        match self {
            Self::AttentionSuppression => "Attention suppression",
            Self::Counterfactual => "Counterfactual",
        }
    }
}

/// Identifies one loaded problem: everything derived from a payload is
/// scoped to exactly one key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SelectionKey {
    pub model: String,
    pub solution_type: String,
    pub problem_id: String,
}

impl SelectionKey {
    pub fn new(
        model: impl Into<String>,
        solution_type: impl Into<String>,
        problem_id: impl Into<String>,
    ) -> Self {
        Self {
            model: model.into(),
            solution_type: solution_type.into(),
            problem_id: problem_id.into(),
        }
    }
}

impl fmt::Display for SelectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.model, self.solution_type, self.problem_id)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    pub index: StepIndex,
    pub text: String,
    pub category: String,
    pub importance: f32,
    pub depends_on: Vec<StepIndex>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InfluenceEdge {
    pub source: StepIndex,
    pub target: StepIndex,
    pub raw_score: f32,
}

/// Sparse directed edge list with at most one edge per ordered pair.
#[derive(Clone, Debug, Default)]
pub struct EdgeSet {
    edges: Vec<InfluenceEdge>,
}

impl EdgeSet {
    /// Builds the set keeping the first edge seen for each ordered pair.
    pub fn new(edges: Vec<InfluenceEdge>) -> Self {
        let mut seen = HashSet::with_capacity(edges.len());
        let edges = edges
            .into_iter()
            .filter(|edge| seen.insert((edge.source, edge.target)))
            .collect();
        Self { edges }
    }

    pub fn edges(&self) -> &[InfluenceEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProblemInfo {
    pub nickname: Option<String>,
    pub text: Option<String>,
    pub answer: Option<String>,
}

/// One fully loaded problem. Replaced wholesale whenever the selection
/// changes.
#[derive(Clone, Debug)]
pub struct TraceData {
    pub key: SelectionKey,
    pub format: DataFormat,
    /// Sorted by index, indices unique.
    pub steps: Vec<Step>,
    pub counterfactual: EdgeSet,
    pub suppression: Option<EdgeSet>,
    pub summary: Option<Map<String, Value>>,
    pub problem: Option<ProblemInfo>,
    pub resamples: HashMap<StepIndex, Vec<String>>,
    pub prompt: Option<String>,
    pub skipped_records: usize,
}

impl TraceData {
    pub fn empty(key: SelectionKey) -> Self {
        Self {
            key,
            format: DataFormat::default(),
            steps: Vec::new(),
            counterfactual: EdgeSet::default(),
            suppression: None,
            summary: None,
            problem: None,
            resamples: HashMap::new(),
            prompt: None,
            skipped_records: 0,
        }
    }

    pub fn step(&self, index: StepIndex) -> Option<&Step> {
        self.steps
            .binary_search_by_key(&index, |step| step.index)
            .ok()
            .map(|position| &self.steps[position])
    }

    pub fn contains(&self, index: StepIndex) -> bool {
        self.step(index).is_some()
    }

    /// Resolves the edge set for a metric, falling back to the primary
    /// counterfactual edges when the alternate set is missing.
    pub fn edges_for(&self, metric: Metric) -> (&EdgeSet, Metric) {
        match (metric, &self.suppression) {
            (Metric::AttentionSuppression, Some(edges)) => (edges, Metric::AttentionSuppression),
            _ => (&self.counterfactual, Metric::Counterfactual),
        }
    }

    pub fn has_suppression(&self) -> bool {
        self.suppression.is_some()
    }

    pub fn categories(&self) -> BTreeSet<&str> {
        self.steps
            .iter()
            .map(|step| step.category.as_str())
            .filter(|category| !category.is_empty())
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.counterfactual.len()
    }

    pub fn title(&self) -> String {
        if let Some(nickname) = self
            .problem
            .as_ref()
            .and_then(|problem| problem.nickname.as_deref())
            .filter(|nickname| !nickname.is_empty())
        {
            let mut chars = nickname.chars();
            return match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            };
        }

        let summary_index = self.summary.as_ref().and_then(|summary| {
            let keys = match self.format {
                DataFormat::Scenario => ["scenario_idx", "problem_idx"],
                DataFormat::Problem => ["problem_idx", "scenario_idx"],
            };
            keys.iter().find_map(|key| summary.get(*key)).map(|value| match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
        });
        let label = summary_index.unwrap_or_else(|| self.key.problem_id.clone());

        match self.format {
            DataFormat::Scenario => format!("Scenario {label}"),
            DataFormat::Problem => format!("Problem {label}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelEntry {
    pub name: String,
    pub solution_types: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProblemEntry {
    pub id: String,
    pub preview: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(index: StepIndex) -> Step {
        Step {
            index,
            text: format!("step {index}"),
            category: "other".to_owned(),
            importance: 0.0,
            depends_on: Vec::new(),
        }
    }

    #[test]
    fn edge_set_keeps_first_edge_per_pair() {
        let set = EdgeSet::new(vec![
            InfluenceEdge { source: 0, target: 1, raw_score: 0.4 },
            InfluenceEdge { source: 0, target: 1, raw_score: 0.9 },
            InfluenceEdge { source: 1, target: 0, raw_score: 0.2 },
        ]);

        assert_eq!(set.len(), 2);
        assert_eq!(set.edges()[0].raw_score, 0.4);
    }

    #[test]
    fn missing_suppression_falls_back_to_counterfactual() {
        let mut data = TraceData::empty(SelectionKey::new("m", "s", "p"));
        data.counterfactual = EdgeSet::new(vec![InfluenceEdge { source: 0, target: 1, raw_score: 1.0 }]);

        let (edges, metric) = data.edges_for(Metric::AttentionSuppression);
        assert_eq!(metric, Metric::Counterfactual);
        assert_eq!(edges.len(), 1);

        data.suppression = Some(EdgeSet::default());
        let (_, metric) = data.edges_for(Metric::AttentionSuppression);
        assert_eq!(metric, Metric::AttentionSuppression);
    }

    #[test]
    fn step_lookup_uses_sorted_indices() {
        let mut data = TraceData::empty(SelectionKey::new("m", "s", "p"));
        data.steps = vec![step(0), step(3), step(7)];

        assert_eq!(data.step(3).map(|step| step.index), Some(3));
        assert!(data.step(4).is_none());
    }

    #[test]
    fn title_prefers_nickname_then_summary_index() {
        let mut data = TraceData::empty(SelectionKey::new("m", "s", "problem_12"));
        assert_eq!(data.title(), "Scenario problem_12");

        let mut summary = Map::new();
        summary.insert("problem_idx".to_owned(), Value::from(12));
        data.summary = Some(summary);
        data.format = DataFormat::Problem;
        assert_eq!(data.title(), "Problem 12");

        data.problem = Some(ProblemInfo {
            nickname: Some("bAGEL count".to_owned()),
            ..ProblemInfo::default()
        });
        assert_eq!(data.title(), "Bagel count");
    }
}
