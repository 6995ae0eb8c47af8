//! Extension contract for the pose visualization pipeline, and a host that
//! drives extensions through their lifecycle.

pub mod args;
pub mod config;
pub mod draw;
pub mod error;
pub mod extension;
pub mod extensions;
pub mod host;
pub mod types;

pub use error::HostError;
pub use extension::{ExtensionId, ExtensionResult, PoseVisExtension};
pub use host::{ExtensionHost, ExtensionOutput, HostState, OutputCheck};
pub use types::Frame;
