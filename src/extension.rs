use std::fmt;

use anyhow::Result;
use clap::{ArgMatches, Command};
use serde::{Deserialize, Serialize};

use crate::types::Frame;

/// Produced by an extension once per processed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionResult<T> {
    pub data: T,
}

impl<T> ExtensionResult<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }

    pub fn into_inner(self) -> T {
        self.data
    }
}

/// Contiguous identifier handed to each enabled extension for the duration of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExtensionId(pub usize);

impl fmt::Display for ExtensionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A pluggable unit that hooks into the frame stream.
///
/// The host calls these in a fixed order:
/// `register_args` -> parse -> `check_enabled` -> `on_enabled` -> `setup`
/// -> `process_frame` per frame -> `cleanup`.
///
/// `draw_overlay` and `check_output` take no receiver. They only see the result
/// they are handed, so they can run after the extension itself is gone.
pub trait PoseVisExtension: Send + 'static {
    type Output: fmt::Debug + Serialize + Send + Sync + 'static;

    fn name(&self) -> String;

    /// Called before argument parsing. Add the flag(s) that enable this extension.
    fn register_args(&self, cmd: Command) -> Command;

    /// Decide from the parsed arguments whether this extension takes part in the run.
    fn check_enabled(&self, args: &ArgMatches) -> bool;

    /// Called once after enablement, before the first frame.
    fn setup(&mut self) -> Result<()>;

    /// Called once per frame. May run on a worker thread.
    fn process_frame(&mut self, frame: &Frame) -> Result<ExtensionResult<Self::Output>>;

    /// Called once at shutdown, also when no frame was ever processed.
    fn cleanup(&mut self) -> Result<()>;

    /// Annotate a display frame with a previous result.
    fn draw_overlay(frame: &mut Frame, result: &ExtensionResult<Self::Output>);

    /// Validate a result. Used by test runs rather than live display.
    fn check_output(result: &ExtensionResult<Self::Output>) -> bool;

    /// Receives the id the host assigned after `check_enabled` returned true.
    ///
    /// The host keeps its own copy and tags every result with it, see
    /// `ExtensionOutput::extension_id`. Override only to keep the id locally.
    fn on_enabled(&mut self, _extension_id: ExtensionId) {}
}

/// Reads a boolean flag without panicking when `id` was never registered.
pub fn flag_set(args: &ArgMatches, id: &str) -> bool {
    matches!(args.try_get_one::<bool>(id), Ok(Some(true)))
}
