use anyhow::{bail, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde::{Deserialize, Serialize};

use crate::draw;
use crate::extension::{flag_set, ExtensionResult, PoseVisExtension};
use crate::types::{luma, Frame, Rect};

pub const FLAG: &str = "use-motion";

const BAR_HEIGHT: f32 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionScore {
    /// Fraction of pixels whose luma moved by more than the threshold
    pub changed: f32,
    /// No previous frame to compare against
    pub first_frame: bool,
}

/// Frame-to-frame change detector. Keeps the previous frame's luma plane
/// between calls, so frames must arrive in order.
pub struct MotionExtension {
    threshold: u8,
    previous: Option<Vec<u8>>,
    dims: (u32, u32),
}

impl MotionExtension {
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold,
            previous: None,
            dims: (0, 0),
        }
    }
}

fn luma_plane(frame: &Frame) -> Vec<u8> {
    frame.pixels().map(luma).collect()
}

impl PoseVisExtension for MotionExtension {
    type Output = MotionScore;

    fn name(&self) -> String {
        "Motion".to_string()
    }

    fn register_args(&self, cmd: Command) -> Command {
        cmd.arg(
            Arg::new(FLAG)
                .long(FLAG)
                .action(ArgAction::SetTrue)
                .help("Enable frame-to-frame motion scoring"),
        )
    }

    fn check_enabled(&self, args: &ArgMatches) -> bool {
        flag_set(args, FLAG)
    }

    fn setup(&mut self) -> Result<()> {
        self.previous = Some(Vec::new());
        self.dims = (0, 0);
        Ok(())
    }

    fn process_frame(&mut self, frame: &Frame) -> Result<ExtensionResult<MotionScore>> {
        let Some(previous) = self.previous.as_mut() else {
            bail!("process_frame called before setup");
        };
        let current = luma_plane(frame);
        let dims = frame.dimensions();

        let score = if previous.is_empty() || self.dims != dims {
            MotionScore {
                changed: 0.0,
                first_frame: true,
            }
        } else {
            let changed = previous
                .iter()
                .zip(&current)
                .filter(|(a, b)| a.abs_diff(**b) > self.threshold)
                .count();
            MotionScore {
                changed: changed as f32 / current.len() as f32,
                first_frame: false,
            }
        };

        *previous = current;
        self.dims = dims;
        Ok(ExtensionResult::new(score))
    }

    fn cleanup(&mut self) -> Result<()> {
        self.previous = None;
        Ok(())
    }

    fn draw_overlay(frame: &mut Frame, result: &ExtensionResult<MotionScore>) {
        let width = frame.width() as f32 * result.data.changed.clamp(0.0, 1.0);
        if width > 0.0 {
            draw::fill_rect(frame, &Rect::new(0.0, 0.0, width, BAR_HEIGHT), draw::RED);
        }
    }

    fn check_output(result: &ExtensionResult<MotionScore>) -> bool {
        let score = &result.data;
        (0.0..=1.0).contains(&score.changed) && (!score.first_frame || score.changed == 0.0)
    }
}
