use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde::{Deserialize, Serialize};

use crate::draw;
use crate::extension::{flag_set, ExtensionResult, PoseVisExtension};
use crate::types::{luma, Frame, Rect};

pub const FLAG: &str = "use-bright-region";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionDetection {
    /// Bounding box of all pixels at or above the threshold
    pub region: Option<Rect>,
    /// Fraction of the frame's pixels at or above the threshold
    pub coverage: f32,
    pub frame_width: u32,
    pub frame_height: u32,
}

/// Finds the bounding box of the bright part of a frame, e.g. a lit face
/// against a dark room.
pub struct BrightRegionExtension {
    threshold: u8,
}

impl BrightRegionExtension {
    pub fn new(threshold: u8) -> Self {
        Self { threshold }
    }
}

pub fn detect(frame: &Frame, threshold: u8) -> RegionDetection {
    let mut min = (u32::MAX, u32::MAX);
    let mut max = (0u32, 0u32);
    let mut hits = 0u64;

    for (x, y, pixel) in frame.enumerate_pixels() {
        if luma(pixel) >= threshold {
            hits += 1;
            min = (min.0.min(x), min.1.min(y));
            max = (max.0.max(x), max.1.max(y));
        }
    }

    let total = frame.width() as u64 * frame.height() as u64;
    let region = (hits > 0).then(|| {
        Rect::new(
            min.0 as f32,
            min.1 as f32,
            (max.0 - min.0 + 1) as f32,
            (max.1 - min.1 + 1) as f32,
        )
    });
    let coverage = if total == 0 { 0.0 } else { hits as f32 / total as f32 };

    RegionDetection {
        region,
        coverage,
        frame_width: frame.width(),
        frame_height: frame.height(),
    }
}

impl PoseVisExtension for BrightRegionExtension {
    type Output = RegionDetection;

    fn name(&self) -> String {
        "Bright Region".to_string()
    }

    fn register_args(&self, cmd: Command) -> Command {
        cmd.arg(
            Arg::new(FLAG)
                .long(FLAG)
                .action(ArgAction::SetTrue)
                .help("Enable bright-region detection"),
        )
    }

    fn check_enabled(&self, args: &ArgMatches) -> bool {
        flag_set(args, FLAG)
    }

    fn setup(&mut self) -> Result<()> {
        log::debug!("Bright region threshold: {}", self.threshold);
        Ok(())
    }

    fn process_frame(&mut self, frame: &Frame) -> Result<ExtensionResult<RegionDetection>> {
        Ok(ExtensionResult::new(detect(frame, self.threshold)))
    }

    fn cleanup(&mut self) -> Result<()> {
        Ok(())
    }

    fn draw_overlay(frame: &mut Frame, result: &ExtensionResult<RegionDetection>) {
        if let Some(rect) = &result.data.region {
            draw::rect_outline(frame, rect, 2, draw::GREEN);
        }
    }

    fn check_output(result: &ExtensionResult<RegionDetection>) -> bool {
        let det = &result.data;
        if !(0.0..=1.0).contains(&det.coverage) {
            return false;
        }
        match &det.region {
            Some(rect) => {
                det.coverage > 0.0
                    && rect.width > 0.0
                    && rect.height > 0.0
                    && rect.fits_within(det.frame_width, det.frame_height)
            }
            None => det.coverage == 0.0,
        }
    }
}
