use std::path::PathBuf;

use super::model::SelectionKey;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("no data available for {key}")]
    DataUnavailable { key: SelectionKey },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("catalog unavailable: {0}")]
    Catalog(String),

    #[error("background load worker disconnected")]
    Disconnected,
}
