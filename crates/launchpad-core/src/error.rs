use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("no executable named '{name}' found under {}", root.display())]
    NotFound { name: String, root: PathBuf },

    #[error("failed to walk {}: {source}", root.display())]
    Traversal {
        root: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create environment {}: {reason}", path.display())]
    ProvisionFailed { path: PathBuf, reason: String },

    #[error("failed to check environment {}: {source}", path.display())]
    ProvisionCheckFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("elevated relaunch request was refused: {0}")]
    ElevationRequestFailed(String),

    #[error("{0}")]
    Fatal(String),
}
