use thiserror::Error;

use crate::bootstrap::BootstrapReport;
use crate::connections::ConnectionId;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no store connected")]
    StoreNotConnected,

    #[error("collection registered twice: {0}")]
    DuplicateCollection(String),

    #[error("repository error: {0}")]
    Repo(#[from] rindex_repo::RepoError),

    #[error("unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    #[error("connection closed: {0}")]
    ConnectionClosed(ConnectionId),

    #[error("cannot encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
}

/// The bootstrap pipeline stopped. Carries the report of every step that ran,
/// including the failing one.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("bootstrap step '{step}' failed: {reason}")]
    StepFailed {
        step: String,
        reason: String,
        report: BootstrapReport,
    },

    #[error("bootstrap finished without connecting a store")]
    NoStore { report: BootstrapReport },
}

impl BootstrapError {
    pub fn report(&self) -> &BootstrapReport {
        match self {
            Self::StepFailed { report, .. } | Self::NoStore { report } => report,
        }
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
