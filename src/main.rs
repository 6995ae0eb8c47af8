use anyhow::{bail, Context, Result};
use clap::{CommandFactory, FromArgMatches};
use colored::*;
use std::fs;
use std::path::Path;

use pose_vis::args::Args;
use pose_vis::config::AppConfig;
use pose_vis::extensions::register_builtin;
use pose_vis::host::{check_outputs, draw_overlays};
use pose_vis::{ExtensionHost, Frame};

fn main() -> Result<()> {
    env_logger::init();

    // 0. Load Config
    let config = AppConfig::load(&AppConfig::default_path())?;

    // 1. Register extensions and their flags, then parse
    let mut host = ExtensionHost::with_base_index(config.host.base_index);
    register_builtin(&mut host, &config)?;
    let matches = host.register_args(Args::command())?.get_matches();
    let args = Args::from_arg_matches(&matches)?;

    if args.list {
        println!("Registered Extensions:");
        for name in host.names() {
            println!("  {}", name);
        }
        return Ok(());
    }

    // 2. Enable and set up
    let enabled = host.configure(&matches)?;
    if enabled == 0 {
        println!("{}", "No extensions enabled. See --help for the --use-* flags.".yellow());
    }
    for (id, name) in host.enabled() {
        println!("{}", format!("Enabled {} as {}", name, id).green());
    }
    host.setup()?;

    if let Some(dir) = &args.output_dir {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    // 3. Frames
    let mut rejected = 0usize;
    for (index, path) in args.input.iter().enumerate() {
        let mut frame = load_frame(path)?;
        if args.mirror {
            image::imageops::flip_horizontal_in_place(&mut frame);
        }

        let outputs = if config.host.parallel {
            host.process_frame_parallel(&frame)?
        } else {
            host.process_frame(&frame)?
        };

        if args.json {
            for output in &outputs {
                let line = serde_json::json!({
                    "frame": index,
                    "extension_id": output.extension_id().0,
                    "extension": output.name(),
                    "result": output.to_json()?,
                });
                println!("{}", line);
            }
        }

        if args.check {
            for verdict in check_outputs(&outputs) {
                if !verdict.passed {
                    rejected += 1;
                    println!(
                        "{}",
                        format!("{}: {} {} rejected its output", path.display(), verdict.name, verdict.extension_id).red()
                    );
                }
            }
        }

        if let Some(dir) = &args.output_dir {
            draw_overlays(&mut frame, &outputs);
            let name = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_else(|| format!("frame_{}", index));
            let out_path = dir.join(format!("{}_overlay.png", name));
            frame.save(&out_path).with_context(|| format!("Failed to write {}", out_path.display()))?;
            log::info!("Wrote {}", out_path.display());
        }
    }

    // 4. Shutdown
    host.shutdown()?;

    if args.check {
        if rejected > 0 {
            bail!("{} output(s) failed validation", rejected);
        }
        println!("{}", format!("All outputs passed validation ({} frame(s))", args.input.len()).green());
    }

    Ok(())
}

fn load_frame(path: &Path) -> Result<Frame> {
    let img = image::open(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(img.to_rgb8())
}
