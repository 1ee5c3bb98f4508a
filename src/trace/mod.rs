mod error;
mod model;
mod parse;
mod source;

pub use error::LoadError;
pub use model::{
    DataFormat, EdgeSet, InfluenceEdge, Metric, ModelEntry, ProblemEntry, ProblemInfo,
    SelectionKey, Step, StepIndex, TraceData,
};
pub use source::{DirectorySource, ProblemSource};
