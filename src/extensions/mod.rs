//! Extensions shipped with the crate.

pub mod bright_region;
pub mod motion;
pub mod sim_gaze;

pub use bright_region::{BrightRegionExtension, RegionDetection};
pub use motion::{MotionExtension, MotionScore};
pub use sim_gaze::{GazeEstimate, SimulatedGazeExtension};

use crate::config::AppConfig;
use crate::error::Result;
use crate::host::ExtensionHost;

/// Register every built-in extension, tuned from `config`.
pub fn register_builtin(host: &mut ExtensionHost, config: &AppConfig) -> Result<()> {
    host.register(SimulatedGazeExtension::new(config.gaze.step))?;
    host.register(BrightRegionExtension::new(config.bright_region.threshold))?;
    host.register(MotionExtension::new(config.motion.threshold))?;
    Ok(())
}
