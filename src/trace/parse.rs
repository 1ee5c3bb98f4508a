use std::collections::HashMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::warn;

use super::model::{DataFormat, InfluenceEdge, ProblemInfo, Step, StepIndex};

/// Only `chunk_idx` is required; any other field with an unusable value
/// reads as absent.
#[derive(Clone, Debug, Deserialize)]
pub(super) struct RawChunk {
    chunk_idx: StepIndex,
    #[serde(default, deserialize_with = "lenient")]
    chunk: String,
    #[serde(default, deserialize_with = "lenient")]
    function_tags: Vec<Value>,
    #[serde(default, deserialize_with = "lenient")]
    depends_on: Vec<Value>,
    #[serde(default, deserialize_with = "lenient")]
    counterfactual_importance_category_kl: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    counterfactual_importance_kl: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    counterfactual_importance_test_pass_kl: Option<f64>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

impl RawChunk {
    fn importance(&self, format: DataFormat) -> f32 {
        let value = match format {
            DataFormat::Scenario => self.counterfactual_importance_category_kl,
            DataFormat::Problem => self
                .counterfactual_importance_kl
                .filter(|value| *value != 0.0)
                .or(self.counterfactual_importance_test_pass_kl),
        };

        value
            .map(|value| value as f32)
            .filter(|value| value.is_finite())
            .unwrap_or(0.0)
    }

    fn into_step(self, format: DataFormat) -> Step {
        let importance = self.importance(format);
        let depends_on = self.depends_on.iter().filter_map(index_from_value).collect();
        let category = self
            .function_tags
            .iter()
            .find_map(Value::as_str)
            .unwrap_or_default()
            .to_owned();

        Step {
            index: self.chunk_idx,
            text: self.chunk,
            category,
            importance,
            depends_on,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
struct RawStepImportance {
    source_chunk_idx: StepIndex,
    #[serde(default)]
    target_impacts: Vec<Value>,
}

#[derive(Clone, Debug, Deserialize)]
struct RawImpact {
    target_chunk_idx: StepIndex,
    importance_score: f64,
}

/// Records kept plus the number of records that could not be read.
#[derive(Debug)]
pub(super) struct Parsed<T> {
    pub(super) records: T,
    pub(super) skipped: usize,
}

fn index_from_value(value: &Value) -> Option<StepIndex> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|n| StepIndex::try_from(n).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn top_level_array(raw: &str) -> serde_json::Result<Vec<Value>> {
    serde_json::from_str::<Vec<Value>>(raw)
}

/// Reads labeled chunks one record at a time so a malformed record only
/// drops itself. Duplicate indices keep the first occurrence.
pub(super) fn parse_chunks(raw: &str, format: DataFormat) -> serde_json::Result<Parsed<Vec<Step>>> {
    let values = top_level_array(raw)?;
    let mut skipped = 0usize;
    let mut steps = Vec::with_capacity(values.len());

    for (position, value) in values.into_iter().enumerate() {
        match RawChunk::deserialize(value) {
            Ok(chunk) => steps.push(chunk.into_step(format)),
            Err(error) => {
                warn!(position, %error, "skipping malformed chunk record");
                skipped += 1;
            }
        }
    }

    steps.sort_by_key(|step| step.index);
    let before = steps.len();
    steps.dedup_by_key(|step| step.index);
    let duplicates = before - steps.len();
    if duplicates > 0 {
        warn!(duplicates, "dropping chunk records with duplicate indices");
    }

    Ok(Parsed {
        records: steps,
        skipped: skipped + duplicates,
    })
}

/// Reads a step-importance file: a list of sources, each carrying its
/// scored targets.
pub(super) fn parse_edges(raw: &str) -> serde_json::Result<Parsed<Vec<InfluenceEdge>>> {
    let values = top_level_array(raw)?;
    let mut skipped = 0usize;
    let mut edges = Vec::new();

    for (position, value) in values.into_iter().enumerate() {
        let source = match RawStepImportance::deserialize(value) {
            Ok(source) => source,
            Err(error) => {
                warn!(position, %error, "skipping malformed step importance record");
                skipped += 1;
                continue;
            }
        };

        for impact in source.target_impacts {
            match RawImpact::deserialize(impact) {
                Ok(impact) if impact.importance_score.is_finite() => edges.push(InfluenceEdge {
                    source: source.source_chunk_idx,
                    target: impact.target_chunk_idx,
                    raw_score: impact.importance_score as f32,
                }),
                Ok(_) | Err(_) => skipped += 1,
            }
        }
    }

    Ok(Parsed {
        records: edges,
        skipped,
    })
}

pub(super) fn parse_resamples(raw: &str) -> serde_json::Result<HashMap<StepIndex, Vec<String>>> {
    let object: Map<String, Value> = serde_json::from_str(raw)?;
    let mut resamples = HashMap::with_capacity(object.len());

    for (key, value) in object {
        let Ok(index) = key.trim().parse::<StepIndex>() else {
            continue;
        };
        let Value::Array(items) = value else {
            continue;
        };

        let texts = items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text),
                _ => None,
            })
            .collect::<Vec<_>>();
        resamples.insert(index, texts);
    }

    Ok(resamples)
}

pub(super) fn parse_object(raw: &str) -> serde_json::Result<Map<String, Value>> {
    serde_json::from_str(raw)
}

fn string_field(object: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| object.get(*key))
        .and_then(|value| match value {
            Value::String(text) => Some(text.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        })
}

pub(super) fn problem_info(object: &Map<String, Value>) -> ProblemInfo {
    ProblemInfo {
        nickname: string_field(object, &["nickname"]),
        text: string_field(object, &["problem", "user_prompt", "scenario", "prompt"]),
        answer: string_field(object, &["gt_answer", "answer"]),
    }
}

pub(super) fn prompt(object: &Map<String, Value>) -> Option<String> {
    string_field(object, &["prompt"]).filter(|prompt| !prompt.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_skip_malformed_records_and_resolve_importance() {
        let raw = r#"[
            {"chunk_idx": 1, "chunk": "b", "function_tags": ["plan_generation"], "counterfactual_importance_kl": 0.0, "counterfactual_importance_test_pass_kl": 0.3},
            {"chunk": "no index"},
            {"chunk_idx": 0, "chunk": "a", "depends_on": ["1", 2, "x"], "counterfactual_importance_kl": -0.5},
            {"chunk_idx": 1, "chunk": "duplicate"}
        ]"#;

        let parsed = parse_chunks(raw, DataFormat::Problem).unwrap();
        assert_eq!(parsed.skipped, 2);
        assert_eq!(parsed.records.len(), 2);

        let first = &parsed.records[0];
        assert_eq!(first.index, 0);
        assert_eq!(first.importance, -0.5);
        assert_eq!(first.depends_on, vec![1, 2]);
        assert_eq!(first.category, "");

        let second = &parsed.records[1];
        assert_eq!(second.text, "b");
        assert!((second.importance - 0.3).abs() < 1e-6);
        assert_eq!(second.category, "plan_generation");
    }

    #[test]
    fn bad_optional_fields_keep_the_step() {
        let raw = r#"[
            {"chunk_idx": 0, "chunk": "fine", "function_tags": ["deduction"], "counterfactual_importance_kl": 0.4},
            {"chunk_idx": 1, "chunk": null, "function_tags": ["self_checking"], "counterfactual_importance_kl": 0.2},
            {"chunk_idx": 2, "chunk": "tags", "function_tags": null, "depends_on": "0"},
            {"chunk_idx": 3, "chunk": "score", "function_tags": [7, "verification"], "counterfactual_importance_kl": "high"}
        ]"#;

        let parsed = parse_chunks(raw, DataFormat::Problem).unwrap();
        assert_eq!(parsed.skipped, 0);
        assert_eq!(
            parsed.records.iter().map(|step| step.index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );

        let steps = &parsed.records;
        assert_eq!(steps[1].text, "");
        assert_eq!(steps[1].category, "self_checking");
        assert_eq!(steps[2].category, "");
        assert!(steps[2].depends_on.is_empty());
        assert_eq!(steps[3].importance, 0.0);
        assert_eq!(steps[3].category, "verification");
    }

    #[test]
    fn scenario_format_reads_category_importance() {
        let raw = r#"[{"chunk_idx": 0, "counterfactual_importance_category_kl": 0.25, "counterfactual_importance_kl": 9.0}]"#;
        let parsed = parse_chunks(raw, DataFormat::Scenario).unwrap();
        assert_eq!(parsed.records[0].importance, 0.25);
    }

    #[test]
    fn missing_importance_reads_as_zero() {
        let raw = r#"[{"chunk_idx": 4, "chunk": "x", "counterfactual_importance_category_kl": null}]"#;
        let parsed = parse_chunks(raw, DataFormat::Scenario).unwrap();
        assert_eq!(parsed.records[0].importance, 0.0);
    }

    #[test]
    fn edges_flatten_sources_and_skip_bad_impacts() {
        let raw = r#"[
            {"source_chunk_idx": 0, "target_impacts": [
                {"target_chunk_idx": 2, "importance_score": 0.9},
                {"target_chunk_idx": "bad", "importance_score": 0.1},
                {"target_chunk_idx": 3, "importance_score": -0.1}
            ]},
            {"target_impacts": []},
            {"source_chunk_idx": 1}
        ]"#;

        let parsed = parse_edges(raw).unwrap();
        assert_eq!(parsed.skipped, 2);
        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.records[1].target, 3);
        assert!((parsed.records[1].raw_score + 0.1).abs() < 1e-6);
    }

    #[test]
    fn non_array_payload_is_an_error() {
        assert!(parse_edges(r#"{"source_chunk_idx": 0}"#).is_err());
    }

    #[test]
    fn resamples_keep_only_numeric_keys_and_strings() {
        let raw = r#"{"0": ["a", "b", 3], "x": ["c"], "2": "not a list"}"#;
        let resamples = parse_resamples(raw).unwrap();
        assert_eq!(resamples.len(), 1);
        assert_eq!(resamples[&0], vec!["a".to_owned(), "b".to_owned()]);
    }

    #[test]
    fn problem_info_reads_known_fields() {
        let object = parse_object(r#"{"problem": "What is 2+2?", "gt_answer": 4, "nickname": null}"#).unwrap();
        let info = problem_info(&object);
        assert_eq!(info.text.as_deref(), Some("What is 2+2?"));
        assert_eq!(info.answer.as_deref(), Some("4"));
        assert_eq!(info.nickname, None);
    }
}
