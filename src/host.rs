use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::thread;

use clap::{Arg, ArgMatches, Command};
use serde_json::Value;

use crate::error::{HostError, Result};
use crate::extension::{ExtensionId, ExtensionResult, PoseVisExtension};
use crate::types::Frame;

type Payload = dyn Any + Send + Sync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Registering,
    Configured,
    Running,
    ShutDown,
}

// =========================================================================
// Type-erased results
// =========================================================================

#[derive(Clone, Copy)]
struct OutputOps {
    draw: fn(&mut Frame, &Payload),
    check: fn(&Payload) -> bool,
    to_json: fn(&Payload) -> serde_json::Result<Value>,
}

impl OutputOps {
    fn of<E: PoseVisExtension>() -> Self {
        Self {
            draw: draw_erased::<E>,
            check: check_erased::<E>,
            to_json: json_erased::<E>,
        }
    }
}

fn downcast<E: PoseVisExtension>(data: &Payload) -> Option<&ExtensionResult<E::Output>> {
    data.downcast_ref::<ExtensionResult<E::Output>>()
}

fn draw_erased<E: PoseVisExtension>(frame: &mut Frame, data: &Payload) {
    if let Some(result) = downcast::<E>(data) {
        E::draw_overlay(frame, result);
    }
}

fn check_erased<E: PoseVisExtension>(data: &Payload) -> bool {
    downcast::<E>(data).map_or(false, |result| E::check_output(result))
}

fn json_erased<E: PoseVisExtension>(data: &Payload) -> serde_json::Result<Value> {
    match downcast::<E>(data) {
        Some(result) => serde_json::to_value(result),
        None => Ok(Value::Null),
    }
}

/// One extension's result for one frame, tagged with the extension that made it.
///
/// Carries the producing type's `draw_overlay` / `check_output`, so it stays
/// usable after the host has shut down.
pub struct ExtensionOutput {
    extension_id: ExtensionId,
    name: String,
    data: Box<Payload>,
    ops: OutputOps,
}

impl ExtensionOutput {
    pub fn new<E: PoseVisExtension>(
        extension_id: ExtensionId,
        name: impl Into<String>,
        result: ExtensionResult<E::Output>,
    ) -> Self {
        Self {
            extension_id,
            name: name.into(),
            data: Box::new(result),
            ops: OutputOps::of::<E>(),
        }
    }

    pub fn extension_id(&self) -> ExtensionId {
        self.extension_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Typed view of the result, if it was produced by `E`.
    pub fn result<E: PoseVisExtension>(&self) -> Option<&ExtensionResult<E::Output>> {
        downcast::<E>(&*self.data)
    }

    pub fn draw_overlay(&self, frame: &mut Frame) {
        (self.ops.draw)(frame, &*self.data)
    }

    pub fn check_output(&self) -> bool {
        (self.ops.check)(&*self.data)
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok((self.ops.to_json)(&*self.data)?)
    }
}

impl fmt::Debug for ExtensionOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionOutput")
            .field("extension_id", &self.extension_id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Verdict of `check_output` for one output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputCheck {
    pub extension_id: ExtensionId,
    pub name: String,
    pub passed: bool,
}

/// Draw every output onto `frame`, in the order given.
pub fn draw_overlays(frame: &mut Frame, outputs: &[ExtensionOutput]) {
    for output in outputs {
        output.draw_overlay(frame);
    }
}

pub fn check_outputs(outputs: &[ExtensionOutput]) -> Vec<OutputCheck> {
    outputs
        .iter()
        .map(|output| OutputCheck {
            extension_id: output.extension_id,
            name: output.name.clone(),
            passed: output.check_output(),
        })
        .collect()
}

// =========================================================================
// Object-safe view of an extension
// =========================================================================

trait DynExtension: Send {
    fn register_args(&self, cmd: Command) -> Command;
    fn check_enabled(&self, args: &ArgMatches) -> bool;
    fn on_enabled(&mut self, extension_id: ExtensionId);
    fn setup(&mut self) -> anyhow::Result<()>;
    fn process_frame(
        &mut self,
        extension_id: ExtensionId,
        name: &str,
        frame: &Frame,
    ) -> anyhow::Result<ExtensionOutput>;
    fn cleanup(&mut self) -> anyhow::Result<()>;
}

impl<E: PoseVisExtension> DynExtension for E {
    fn register_args(&self, cmd: Command) -> Command {
        PoseVisExtension::register_args(self, cmd)
    }

    fn check_enabled(&self, args: &ArgMatches) -> bool {
        PoseVisExtension::check_enabled(self, args)
    }

    fn on_enabled(&mut self, extension_id: ExtensionId) {
        PoseVisExtension::on_enabled(self, extension_id)
    }

    fn setup(&mut self) -> anyhow::Result<()> {
        PoseVisExtension::setup(self)
    }

    fn process_frame(
        &mut self,
        extension_id: ExtensionId,
        name: &str,
        frame: &Frame,
    ) -> anyhow::Result<ExtensionOutput> {
        let result = PoseVisExtension::process_frame(self, frame)?;
        Ok(ExtensionOutput::new::<E>(extension_id, name, result))
    }

    fn cleanup(&mut self) -> anyhow::Result<()> {
        PoseVisExtension::cleanup(self)
    }
}

struct Slot {
    extension: Box<dyn DynExtension>,
    name: String,
    extension_id: Option<ExtensionId>,
    // setup succeeded and cleanup has not run yet
    ready: bool,
}

impl Slot {
    fn set_enabled(&mut self, extension_id: ExtensionId) -> Result<()> {
        if let Some(existing) = self.extension_id {
            return Err(HostError::AlreadyEnabled {
                extension: self.name.clone(),
                existing,
            });
        }
        self.extension_id = Some(extension_id);
        self.extension.on_enabled(extension_id);
        Ok(())
    }

    fn process(&mut self, frame: &Frame) -> Result<ExtensionOutput> {
        let Some(extension_id) = self.extension_id else {
            return Err(HostError::Lifecycle {
                op: "process_frame",
                state: HostState::Configured,
            });
        };
        log::debug!("{} {}: process_frame", self.name, extension_id);
        self.extension
            .process_frame(extension_id, &self.name, frame)
            .map_err(|source| HostError::Process {
                extension: self.name.clone(),
                source,
            })
    }
}

/// Argument names already claimed on a command.
#[derive(Default)]
struct ArgNames {
    ids: HashSet<String>,
    longs: HashSet<String>,
    shorts: HashSet<char>,
}

impl ArgNames {
    fn of(cmd: &Command) -> Self {
        let mut names = Self::default();
        if !cmd.is_disable_help_flag_set() {
            names.ids.insert("help".to_string());
            names.longs.insert("help".to_string());
            names.shorts.insert('h');
        }
        if cmd.get_version().is_some() && !cmd.is_disable_version_flag_set() {
            names.ids.insert("version".to_string());
            names.longs.insert("version".to_string());
            names.shorts.insert('V');
        }
        for arg in cmd.get_arguments() {
            // args of the base command are trusted to be consistent
            let _ = names.claim(arg);
        }
        names
    }

    /// Claims every name of `arg`, returning the first one that was already taken.
    fn claim(&mut self, arg: &Arg) -> Option<String> {
        let id = arg.get_id().as_str().to_string();
        if !self.ids.insert(id.clone()) {
            return Some(id);
        }
        if let Some(long) = arg.get_long() {
            if !self.longs.insert(long.to_string()) {
                return Some(format!("--{long}"));
            }
        }
        if let Some(short) = arg.get_short() {
            if !self.shorts.insert(short) {
                return Some(format!("-{short}"));
            }
        }
        None
    }
}

// =========================================================================
// Host
// =========================================================================

/// Drives registered extensions through their lifecycle.
pub struct ExtensionHost {
    slots: Vec<Slot>,
    base_index: usize,
    state: HostState,
}

impl Default for ExtensionHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionHost {
    pub fn new() -> Self {
        Self::with_base_index(0)
    }

    /// Enabled extensions will be numbered `base_index, base_index + 1, ...`
    pub fn with_base_index(base_index: usize) -> Self {
        Self {
            slots: Vec::new(),
            base_index,
            state: HostState::Registering,
        }
    }

    pub fn state(&self) -> HostState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|slot| slot.name.as_str())
    }

    /// Enabled extensions in id order.
    pub fn enabled(&self) -> impl Iterator<Item = (ExtensionId, &str)> {
        self.slots
            .iter()
            .filter_map(|slot| slot.extension_id.map(|id| (id, slot.name.as_str())))
    }

    pub fn register<E: PoseVisExtension>(&mut self, extension: E) -> Result<()> {
        self.expect_state("register", HostState::Registering)?;
        let name = extension.name();
        log::debug!("Registered extension {}", name);
        self.slots.push(Slot {
            extension: Box::new(extension),
            name,
            extension_id: None,
            ready: false,
        });
        Ok(())
    }

    /// Let every extension add its flags to `cmd`.
    ///
    /// Fails if an extension adds an argument whose id, long or short name is
    /// already in use.
    pub fn register_args(&self, mut cmd: Command) -> Result<Command> {
        self.expect_state("register_args", HostState::Registering)?;
        let mut taken = ArgNames::of(&cmd);
        for slot in &self.slots {
            let before = cmd.get_arguments().count();
            cmd = slot.extension.register_args(cmd);
            for arg in cmd.get_arguments().skip(before) {
                if let Some(conflict) = taken.claim(arg) {
                    return Err(HostError::ConflictingArgument {
                        extension: slot.name.clone(),
                        arg: conflict,
                    });
                }
            }
        }
        Ok(cmd)
    }

    /// Run every extension's enablement check once and number the enabled ones.
    ///
    /// Returns how many extensions are enabled.
    pub fn configure(&mut self, args: &ArgMatches) -> Result<usize> {
        self.expect_state("configure", HostState::Registering)?;
        let mut next = self.base_index;
        for slot in &mut self.slots {
            if slot.extension.check_enabled(args) {
                let extension_id = ExtensionId(next);
                slot.set_enabled(extension_id)?;
                next += 1;
                log::info!("Enabled extension {} as {}", slot.name, extension_id);
            } else {
                log::debug!("Extension {} is disabled", slot.name);
            }
        }
        self.state = HostState::Configured;
        Ok(next - self.base_index)
    }

    /// Set up every enabled extension in id order.
    ///
    /// Stops at the first failure. Extensions set up before it are still
    /// cleaned up by `shutdown`.
    pub fn setup(&mut self) -> Result<()> {
        self.expect_state("setup", HostState::Configured)?;
        for slot in &mut self.slots {
            if slot.extension_id.is_none() || slot.ready {
                continue;
            }
            slot.extension.setup().map_err(|source| HostError::Setup {
                extension: slot.name.clone(),
                source,
            })?;
            slot.ready = true;
            log::debug!("Extension {} is set up", slot.name);
        }
        self.state = HostState::Running;
        Ok(())
    }

    /// Hand `frame` to every enabled extension, one after another.
    ///
    /// Every extension sees the frame even if an earlier one fails; the first
    /// error is returned afterwards.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<Vec<ExtensionOutput>> {
        self.expect_state("process_frame", HostState::Running)?;
        let processed: Vec<Result<ExtensionOutput>> = self
            .slots
            .iter_mut()
            .filter(|slot| slot.ready)
            .map(|slot| slot.process(frame))
            .collect();
        processed.into_iter().collect()
    }

    /// Like `process_frame`, but each extension runs on its own scoped thread.
    /// Outputs come back in id order. A panicking extension is reported as
    /// `HostError::Panicked`.
    pub fn process_frame_parallel(&mut self, frame: &Frame) -> Result<Vec<ExtensionOutput>> {
        self.expect_state("process_frame", HostState::Running)?;
        let joined: Vec<Result<ExtensionOutput>> = thread::scope(|scope| {
            let workers: Vec<_> = self
                .slots
                .iter_mut()
                .filter(|slot| slot.ready)
                .map(|slot| {
                    let name = slot.name.clone();
                    (name, scope.spawn(move || slot.process(frame)))
                })
                .collect();
            workers
                .into_iter()
                .map(|(name, worker)| {
                    worker
                        .join()
                        .unwrap_or(Err(HostError::Panicked { extension: name }))
                })
                .collect()
        });
        joined.into_iter().collect()
    }

    /// Clean up every extension that was set up. Safe to call more than once.
    ///
    /// A failing cleanup does not stop the others; the first error is returned.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.state == HostState::ShutDown {
            return Ok(());
        }
        let mut first_error = None;
        for slot in self.slots.iter_mut().filter(|slot| slot.ready) {
            slot.ready = false;
            match slot.extension.cleanup() {
                Ok(()) => log::debug!("Extension {} cleaned up", slot.name),
                Err(source) => {
                    log::error!("Cleanup of {} failed: {:#}", slot.name, source);
                    first_error.get_or_insert(HostError::Cleanup {
                        extension: slot.name.clone(),
                        source,
                    });
                }
            }
        }
        self.state = HostState::ShutDown;
        first_error.map_or(Ok(()), Err)
    }

    fn expect_state(&self, op: &'static str, expected: HostState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(HostError::Lifecycle {
                op,
                state: self.state,
            })
        }
    }
}

impl Drop for ExtensionHost {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!("Extension host shut down with errors: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::ArgAction;

    struct Counter {
        flag: &'static str,
        frames: u32,
    }

    impl PoseVisExtension for Counter {
        type Output = u32;

        fn name(&self) -> String {
            format!("counter[{}]", self.flag)
        }

        fn register_args(&self, cmd: Command) -> Command {
            cmd.arg(Arg::new(self.flag).long(self.flag).action(ArgAction::SetTrue))
        }

        fn check_enabled(&self, args: &ArgMatches) -> bool {
            crate::extension::flag_set(args, self.flag)
        }

        fn setup(&mut self) -> anyhow::Result<()> {
            self.frames = 0;
            Ok(())
        }

        fn process_frame(&mut self, _frame: &Frame) -> anyhow::Result<ExtensionResult<u32>> {
            self.frames += 1;
            Ok(ExtensionResult::new(self.frames))
        }

        fn cleanup(&mut self) -> anyhow::Result<()> {
            Ok(())
        }

        fn draw_overlay(frame: &mut Frame, result: &ExtensionResult<u32>) {
            frame.put_pixel(0, 0, image::Rgb([result.data as u8, 0, 0]));
        }

        fn check_output(result: &ExtensionResult<u32>) -> bool {
            result.data > 0
        }
    }

    fn counter(flag: &'static str) -> Counter {
        Counter { flag, frames: 0 }
    }

    #[test]
    fn test_arg_names_detects_long_and_short() {
        let mut names = ArgNames::default();
        assert_eq!(names.claim(&Arg::new("a").long("alpha").short('a')), None);
        assert_eq!(
            names.claim(&Arg::new("b").long("alpha")),
            Some("--alpha".to_string())
        );
        assert_eq!(names.claim(&Arg::new("c").short('a')), Some("-a".to_string()));
        assert_eq!(names.claim(&Arg::new("a")), Some("a".to_string()));
    }

    #[test]
    fn test_help_is_reserved() {
        let mut host = ExtensionHost::new();
        host.register(counter("help")).unwrap();
        let err = host.register_args(Command::new("t")).unwrap_err();
        assert!(matches!(err, HostError::ConflictingArgument { .. }));
    }

    #[test]
    fn test_counter_runs_through_host() {
        let mut host = ExtensionHost::new();
        host.register(counter("use-a")).unwrap();
        let cmd = host.register_args(Command::new("t")).unwrap();
        let matches = cmd.try_get_matches_from(["t", "--use-a"]).unwrap();
        assert_eq!(host.configure(&matches).unwrap(), 1);
        host.setup().unwrap();

        let frame = Frame::new(2, 2);
        host.process_frame(&frame).unwrap();
        let outputs = host.process_frame(&frame).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].result::<Counter>().unwrap().data, 2);
        assert!(outputs[0].check_output());
        assert_eq!(outputs[0].to_json().unwrap(), serde_json::json!({ "data": 2 }));
    }

    #[test]
    fn test_output_draws_after_shutdown() {
        let output = ExtensionOutput::new::<Counter>(ExtensionId(0), "counter", ExtensionResult::new(9));
        let mut frame = Frame::new(1, 1);
        output.draw_overlay(&mut frame);
        assert_eq!(frame.get_pixel(0, 0).0, [9, 0, 0]);
    }

    #[test]
    fn test_out_of_order_calls_are_rejected() {
        let mut host = ExtensionHost::new();
        let frame = Frame::new(1, 1);
        assert!(matches!(
            host.process_frame(&frame),
            Err(HostError::Lifecycle { op: "process_frame", state: HostState::Registering })
        ));
        assert!(matches!(host.setup(), Err(HostError::Lifecycle { .. })));

        let matches = Command::new("t").try_get_matches_from(["t"]).unwrap();
        host.configure(&matches).unwrap();
        assert!(matches!(host.register(counter("late")), Err(HostError::Lifecycle { .. })));
        assert!(matches!(host.configure(&matches), Err(HostError::Lifecycle { .. })));
    }

    #[test]
    fn test_slot_rejects_second_id() {
        let mut slot = Slot {
            extension: Box::new(counter("x")),
            name: "x".to_string(),
            extension_id: None,
            ready: false,
        };
        slot.set_enabled(ExtensionId(0)).unwrap();
        let err = slot.set_enabled(ExtensionId(1)).unwrap_err();
        assert!(matches!(err, HostError::AlreadyEnabled { existing: ExtensionId(0), .. }));
        assert_eq!(slot.extension_id, Some(ExtensionId(0)));
    }
}
