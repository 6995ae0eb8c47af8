use anyhow::Result;
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde::{Deserialize, Serialize};

use crate::draw;
use crate::extension::{flag_set, ExtensionResult, PoseVisExtension};
use crate::types::{Frame, Point2D};

pub const FLAG: &str = "use-sim-gaze";

pub const MAX_YAW: f32 = 30.0;
pub const MAX_PITCH: f32 = 25.0;
const EYE_OFFSET: f32 = 30.0;
const RAY_LENGTH: f32 = 225.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeEstimate {
    pub left_eye: Point2D,
    pub right_eye: Point2D,
    /// Degrees, positive = screen right
    pub yaw: f32,
    /// Degrees, positive = up
    pub pitch: f32,
}

/// Gaze that sweeps a slow circle around the frame centre, for exercising
/// the overlay path without a model.
pub struct SimulatedGazeExtension {
    step: f32,
    frame_count: u32,
}

impl SimulatedGazeExtension {
    pub fn new(step: f32) -> Self {
        Self { step, frame_count: 0 }
    }
}

/// Yaw and pitch after `frame_count` frames.
pub fn sweep(frame_count: u32, step: f32) -> (f32, f32) {
    let t = frame_count as f32 * step;
    let yaw = (t.cos() * 20.0).clamp(-MAX_YAW, MAX_YAW);
    let pitch = (t.sin() * 15.0).clamp(-MAX_PITCH, MAX_PITCH);
    (yaw, pitch)
}

impl PoseVisExtension for SimulatedGazeExtension {
    type Output = GazeEstimate;

    fn name(&self) -> String {
        "Simulated Gaze".to_string()
    }

    fn register_args(&self, cmd: Command) -> Command {
        cmd.arg(
            Arg::new(FLAG)
                .long(FLAG)
                .action(ArgAction::SetTrue)
                .help("Enable the simulated gaze sweep"),
        )
    }

    fn check_enabled(&self, args: &ArgMatches) -> bool {
        flag_set(args, FLAG)
    }

    fn setup(&mut self) -> Result<()> {
        self.frame_count = 0;
        Ok(())
    }

    fn process_frame(&mut self, frame: &Frame) -> Result<ExtensionResult<GazeEstimate>> {
        // periodic, so wrapping is harmless
        self.frame_count = self.frame_count.wrapping_add(1);
        let (yaw, pitch) = sweep(self.frame_count, self.step);

        let center_x = frame.width() as f32 / 2.0;
        let center_y = frame.height() as f32 / 2.0;

        Ok(ExtensionResult::new(GazeEstimate {
            left_eye: Point2D::new((center_x - EYE_OFFSET).max(0.0), center_y),
            right_eye: Point2D::new(center_x + EYE_OFFSET, center_y),
            yaw,
            pitch,
        }))
    }

    fn cleanup(&mut self) -> Result<()> {
        Ok(())
    }

    fn draw_overlay(frame: &mut Frame, result: &ExtensionResult<GazeEstimate>) {
        let gaze = &result.data;
        let dx = gaze.yaw.to_radians().sin() * RAY_LENGTH;
        let dy = -gaze.pitch.to_radians().sin() * RAY_LENGTH;
        for eye in [gaze.left_eye, gaze.right_eye] {
            let end = Point2D::new(eye.x + dx, eye.y + dy);
            draw::line(frame, eye, end, draw::CYAN);
            draw::dot(frame, eye, 2, draw::GOLD);
        }
    }

    fn check_output(result: &ExtensionResult<GazeEstimate>) -> bool {
        let gaze = &result.data;
        let eyes_ok = [gaze.left_eye, gaze.right_eye]
            .iter()
            .all(|eye| eye.is_finite() && eye.x >= 0.0 && eye.y >= 0.0);
        eyes_ok
            && gaze.yaw.is_finite()
            && gaze.pitch.is_finite()
            && gaze.yaw.abs() <= MAX_YAW
            && gaze.pitch.abs() <= MAX_PITCH
    }
}
