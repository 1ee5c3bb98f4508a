use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::graph::{Direction, ImportanceFilter, SignMode};
use crate::session::{ViewMode, ViewSettings};
use crate::trace::SelectionKey;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SignArg {
    Absolute,
    Positive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DirectionArg {
    Incoming,
    Outgoing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ViewArg {
    Circular,
    Tree,
}

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Args {
    /// Root of the `<model>/<solution_type>/<problem>` tree.
    #[arg(long, env = "CHUNK_LENS_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    #[arg(long, env = "CHUNK_LENS_MODEL")]
    pub model: Option<String>,

    #[arg(long, env = "CHUNK_LENS_SOLUTION_TYPE")]
    pub solution_type: Option<String>,

    /// Problem to open on start; needs `--model` and `--solution-type`.
    #[arg(long, env = "CHUNK_LENS_PROBLEM")]
    pub problem: Option<String>,

    #[arg(long, value_enum, default_value_t = SignArg::Absolute)]
    pub sign_mode: SignArg,

    #[arg(long, default_value_t = 3)]
    pub causal_links: usize,

    /// 0 keeps the top 20% of steps, 4 keeps all of them.
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u8).range(0..=4))]
    pub importance_filter: u8,

    #[arg(long, default_value_t = 2)]
    pub max_depth: usize,

    #[arg(long, value_enum, default_value_t = DirectionArg::Incoming)]
    pub direction: DirectionArg,

    #[arg(long, value_enum, default_value_t = ViewArg::Circular)]
    pub view: ViewArg,
}

/// Launch configuration for the explorer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExplorerConfig {
    pub data_dir: PathBuf,
    pub model: Option<String>,
    pub solution_type: Option<String>,
    pub problem: Option<String>,
    pub settings: ViewSettings,
}

impl ExplorerConfig {
    /// The selection to load on start, when fully specified.
    pub fn initial_selection(&self) -> Option<SelectionKey> {
        match (&self.model, &self.solution_type, &self.problem) {
            (Some(model), Some(solution_type), Some(problem)) => {
                Some(SelectionKey::new(model, solution_type, problem))
            }
            _ => None,
        }
    }
}

impl From<Args> for ExplorerConfig {
    fn from(args: Args) -> Self {
        let settings = ViewSettings {
            view_mode: match args.view {
                ViewArg::Circular => ViewMode::Circular,
                ViewArg::Tree => ViewMode::Tree,
            },
            sign_mode: match args.sign_mode {
                SignArg::Absolute => SignMode::Absolute,
                SignArg::Positive => SignMode::PositiveClamped,
            },
            causal_links: args.causal_links,
            importance_filter: ImportanceFilter::new(args.importance_filter),
            max_depth: args.max_depth,
            direction: match args.direction {
                DirectionArg::Incoming => Direction::Incoming,
                DirectionArg::Outgoing => Direction::Outgoing,
            },
            ..ViewSettings::default()
        }
        .clamped();

        Self {
            data_dir: args.data_dir,
            model: args.model,
            solution_type: args.solution_type,
            problem: args.problem,
            settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ExplorerConfig {
        let argv = std::iter::once("chunk-lens").chain(args.iter().copied());
        ExplorerConfig::from(Args::try_parse_from(argv).unwrap())
    }

    #[test]
    fn defaults_match_view_settings() {
        let config = parse(&["--data-dir", "traces"]);
        assert_eq!(config.data_dir, PathBuf::from("traces"));
        assert_eq!(config.settings, ViewSettings::default());
        assert_eq!(config.initial_selection(), None);
    }

    #[test]
    fn flags_map_to_settings_and_are_clamped() {
        let config = parse(&[
            "--data-dir",
            "traces",
            "--view",
            "tree",
            "--sign-mode",
            "positive",
            "--causal-links",
            "0",
            "--max-depth",
            "50",
            "--direction",
            "outgoing",
            "--importance-filter",
            "1",
        ]);

        assert_eq!(config.settings.view_mode, ViewMode::Tree);
        assert_eq!(config.settings.sign_mode, SignMode::PositiveClamped);
        assert_eq!(config.settings.causal_links, 1);
        assert_eq!(config.settings.max_depth, 20);
        assert_eq!(config.settings.direction, Direction::Outgoing);
        assert_eq!(config.settings.importance_filter.level(), 1);
    }

    #[test]
    fn importance_filter_out_of_range_is_rejected() {
        let argv = ["chunk-lens", "--importance-filter", "7"];
        assert!(Args::try_parse_from(argv).is_err());
    }

    #[test]
    fn full_selection_is_loaded_on_start() {
        let config = parse(&[
            "--data-dir",
            "traces",
            "--model",
            "m",
            "--solution-type",
            "correct",
            "--problem",
            "problem_3",
        ]);
        assert_eq!(
            config.initial_selection(),
            Some(SelectionKey::new("m", "correct", "problem_3"))
        );
    }
}
