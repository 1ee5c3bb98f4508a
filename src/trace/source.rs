use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::error::LoadError;
use super::model::{
    DataFormat, EdgeSet, ModelEntry, ProblemEntry, SelectionKey, TraceData,
};
use super::parse::{
    parse_chunks, parse_edges, parse_object, parse_resamples, problem_info, prompt,
};

const PREVIEW_CHARS: usize = 120;

/// Produces per-problem payloads. Implementations must be callable from a
/// background thread.
pub trait ProblemSource: Send + Sync {
    fn models(&self) -> Result<Vec<ModelEntry>, LoadError>;

    fn problems(&self, model: &str, solution_type: &str) -> Result<Vec<ProblemEntry>, LoadError>;

    fn load(&self, key: &SelectionKey) -> Result<TraceData, LoadError>;
}

/// Reads the bundled layout `<root>/<model>/<solution_type>/<problem_id>/*.json`.
#[derive(Clone, Debug)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn problem_dir(&self, key: &SelectionKey) -> PathBuf {
        self.root
            .join(&key.model)
            .join(&key.solution_type)
            .join(&key.problem_id)
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, LoadError> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(error) if error.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "optional file not present");
            Ok(None)
        }
        Err(source) => Err(LoadError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn visible_subdirectories(path: &Path) -> Result<Vec<String>, LoadError> {
    let entries = fs::read_dir(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut names = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| !name.starts_with('.'))
        .collect::<Vec<_>>();
    names.sort();
    Ok(names)
}

/// Optional side files degrade to "absent" when they cannot be parsed.
fn tolerate<T>(path: &Path, result: serde_json::Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(path = %path.display(), %error, "ignoring unreadable optional file");
            None
        }
    }
}

fn problem_preview(dir: &Path) -> String {
    ["problem.json", "scenario.json"]
        .iter()
        .filter_map(|name| fs::read_to_string(dir.join(name)).ok())
        .filter_map(|raw| parse_object(&raw).ok())
        .find_map(|object| problem_info(&object).text)
        .map(|text| crate::util::truncate_chars(&crate::util::flatten_text(&text), PREVIEW_CHARS))
        .unwrap_or_default()
}

impl ProblemSource for DirectorySource {
    fn models(&self) -> Result<Vec<ModelEntry>, LoadError> {
        if !self.root.is_dir() {
            return Err(LoadError::Catalog(format!(
                "data directory {} does not exist",
                self.root.display()
            )));
        }

        let mut models = Vec::new();
        for name in visible_subdirectories(&self.root)? {
            let solution_types = visible_subdirectories(&self.root.join(&name))?;
            if !solution_types.is_empty() {
                models.push(ModelEntry {
                    name,
                    solution_types,
                });
            }
        }

        info!(count = models.len(), root = %self.root.display(), "listed models");
        Ok(models)
    }

    fn problems(&self, model: &str, solution_type: &str) -> Result<Vec<ProblemEntry>, LoadError> {
        let dir = self.root.join(model).join(solution_type);
        if !dir.is_dir() {
            return Err(LoadError::Catalog(format!(
                "path not found: {model}/{solution_type}"
            )));
        }

        let problems = visible_subdirectories(&dir)?
            .into_iter()
            .map(|id| {
                let preview = problem_preview(&dir.join(&id));
                ProblemEntry { id, preview }
            })
            .collect::<Vec<_>>();

        debug!(model, solution_type, count = problems.len(), "listed problems");
        Ok(problems)
    }

    fn load(&self, key: &SelectionKey) -> Result<TraceData, LoadError> {
        let dir = self.problem_dir(key);
        if !dir.is_dir() {
            return Err(LoadError::DataUnavailable { key: key.clone() });
        }

        let mut data = TraceData::empty(key.clone());

        let scenario_path = dir.join("scenario.json");
        let problem_path = dir.join("problem.json");
        if let Some(raw) = read_optional(&scenario_path)? {
            data.format = DataFormat::Scenario;
            data.problem = tolerate(&scenario_path, parse_object(&raw)).map(|object| problem_info(&object));
        } else if let Some(raw) = read_optional(&problem_path)? {
            data.format = DataFormat::Problem;
            data.problem = tolerate(&problem_path, parse_object(&raw)).map(|object| problem_info(&object));
        } else {
            warn!(%key, "neither scenario.json nor problem.json found");
        }

        let chunks_path = dir.join("chunks_labeled.json");
        let Some(raw_chunks) = read_optional(&chunks_path)? else {
            return Err(LoadError::DataUnavailable { key: key.clone() });
        };
        let chunks = parse_chunks(&raw_chunks, data.format).map_err(|source| LoadError::Json {
            path: chunks_path.clone(),
            source,
        })?;
        data.steps = chunks.records;
        data.skipped_records += chunks.skipped;

        let edges_path = dir.join("step_importance.json");
        if let Some(raw) = read_optional(&edges_path)?
            && let Some(edges) = tolerate(&edges_path, parse_edges(&raw))
        {
            data.counterfactual = EdgeSet::new(edges.records);
            data.skipped_records += edges.skipped;
        }

        let suppression_path = dir.join("step_importance_supp.json");
        if let Some(raw) = read_optional(&suppression_path)?
            && let Some(edges) = tolerate(&suppression_path, parse_edges(&raw))
        {
            data.suppression = Some(EdgeSet::new(edges.records));
            data.skipped_records += edges.skipped;
        }

        let summary_path = dir.join("summary.json");
        if let Some(raw) = read_optional(&summary_path)? {
            data.summary = tolerate(&summary_path, parse_object(&raw));
        }

        let resampled_path = dir.join("chunks_resampled.json");
        if let Some(raw) = read_optional(&resampled_path)? {
            data.resamples = tolerate(&resampled_path, parse_resamples(&raw)).unwrap_or_default();
        }

        let base_solution_path = dir.join("base_solution.json");
        if let Some(raw) = read_optional(&base_solution_path)? {
            data.prompt = tolerate(&base_solution_path, parse_object(&raw)).and_then(|object| prompt(&object));
        }

        info!(
            %key,
            steps = data.steps.len(),
            edges = data.counterfactual.len(),
            suppression = data.suppression.is_some(),
            skipped = data.skipped_records,
            "loaded problem"
        );
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::Metric;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(name), contents).unwrap();
    }

    fn fixture() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let problem = root.path().join("model-a").join("correct").join("problem_1");
        write(
            &problem,
            "problem.json",
            r#"{"problem": "Compute the sum\n\nof two numbers", "gt_answer": "7"}"#,
        );
        write(
            &problem,
            "chunks_labeled.json",
            r#"[
                {"chunk_idx": 0, "chunk": "Let me add.", "function_tags": ["plan_generation"], "counterfactual_importance_kl": 0.2},
                {"chunk_idx": 1, "chunk": "3 + 4 = 7", "function_tags": ["active_computation"], "counterfactual_importance_kl": 0.6}
            ]"#,
        );
        write(
            &problem,
            "step_importance.json",
            r#"[{"source_chunk_idx": 0, "target_impacts": [{"target_chunk_idx": 1, "importance_score": 0.4}]}]"#,
        );
        write(&problem, "chunks_resampled.json", r#"{"1": ["3 + 4 is 7"]}"#);
        write(&problem, "summary.json", "not json");
        fs::create_dir_all(root.path().join(".hidden").join("x")).unwrap();
        root
    }

    #[test]
    fn loads_problem_directory() {
        let root = fixture();
        let source = DirectorySource::new(root.path());

        let data = source
            .load(&SelectionKey::new("model-a", "correct", "problem_1"))
            .unwrap();

        assert_eq!(data.format, DataFormat::Problem);
        assert_eq!(data.steps.len(), 2);
        assert_eq!(data.counterfactual.len(), 1);
        assert!(data.suppression.is_none());
        assert!(data.summary.is_none());
        assert_eq!(data.resamples[&1].len(), 1);
        assert_eq!(data.edges_for(Metric::AttentionSuppression).1, Metric::Counterfactual);
        assert_eq!(data.problem.and_then(|problem| problem.answer).as_deref(), Some("7"));
    }

    #[test]
    fn missing_problem_is_data_unavailable() {
        let root = fixture();
        let source = DirectorySource::new(root.path());

        let error = source
            .load(&SelectionKey::new("model-a", "correct", "problem_9"))
            .unwrap_err();
        assert!(matches!(error, LoadError::DataUnavailable { .. }));
    }

    #[test]
    fn catalog_skips_hidden_directories() {
        let root = fixture();
        let source = DirectorySource::new(root.path());

        let models = source.models().unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].name, "model-a");
        assert_eq!(models[0].solution_types, vec!["correct".to_owned()]);

        let problems = source.problems("model-a", "correct").unwrap();
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].preview, "Compute the sum of two numbers");
    }

    #[test]
    fn missing_root_is_a_catalog_error() {
        let source = DirectorySource::new("/definitely/not/here");
        assert!(matches!(source.models(), Err(LoadError::Catalog(_))));
    }
}
