use thiserror::Error;

use crate::extension::ExtensionId;
use crate::host::HostState;

/// Failures raised by the extension host. Errors from extension code are
/// wrapped with the name of the extension that produced them.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("`{op}` is not allowed while the host is {state:?}")]
    Lifecycle { op: &'static str, state: HostState },

    #[error("extension `{extension}` already holds id {existing}")]
    AlreadyEnabled { extension: String, existing: ExtensionId },

    #[error("extension `{extension}` registers argument `{arg}`, which is already taken")]
    ConflictingArgument { extension: String, arg: String },

    #[error("extension `{extension}` failed during setup")]
    Setup {
        extension: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("extension `{extension}` failed to process a frame")]
    Process {
        extension: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("extension `{extension}` failed during cleanup")]
    Cleanup {
        extension: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("extension `{extension}` panicked while processing a frame")]
    Panicked { extension: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HostError>;
