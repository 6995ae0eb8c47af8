use clap::{CommandFactory, FromArgMatches};
use image::Rgb;
use pretty_assertions::assert_eq;

use pose_vis::args::Args;
use pose_vis::config::AppConfig;
use pose_vis::extensions::{
    register_builtin, BrightRegionExtension, MotionExtension, SimulatedGazeExtension,
};
use pose_vis::host::check_outputs;
use pose_vis::{ExtensionHost, ExtensionId, Frame};

fn scene(offset: u32) -> Frame {
    let mut frame = Frame::new(64, 48);
    for y in 10..20 {
        for x in (10 + offset)..(20 + offset) {
            frame.put_pixel(x, y, Rgb([250, 250, 250]));
        }
    }
    frame
}

fn host_with(argv: &[&str], config: &AppConfig) -> ExtensionHost {
    let mut host = ExtensionHost::with_base_index(config.host.base_index);
    register_builtin(&mut host, config).unwrap();
    let matches = host
        .register_args(Args::command())
        .unwrap()
        .try_get_matches_from(argv)
        .unwrap();
    Args::from_arg_matches(&matches).unwrap();
    host.configure(&matches).unwrap();
    host.setup().unwrap();
    host
}

#[test]
fn builtin_flags_coexist_with_base_args() {
    let config = AppConfig::default();
    let mut host = ExtensionHost::new();
    register_builtin(&mut host, &config).unwrap();
    let cmd = host.register_args(Args::command()).unwrap();
    cmd.clone().debug_assert();

    let matches = cmd
        .try_get_matches_from(["pose-vis", "--use-motion", "--check", "-i", "a.png", "b.png"])
        .unwrap();
    let args = Args::from_arg_matches(&matches).unwrap();
    assert!(args.check);
    assert_eq!(args.input.len(), 2);
}

#[test]
fn only_requested_extensions_run() {
    let config = AppConfig::default();
    let mut host = host_with(&["pose-vis", "--use-bright-region", "--use-motion"], &config);

    let names: Vec<(ExtensionId, String)> =
        host.enabled().map(|(id, name)| (id, name.to_string())).collect();
    assert_eq!(
        names,
        vec![
            (ExtensionId(0), "Bright Region".to_string()),
            (ExtensionId(1), "Motion".to_string()),
        ]
    );

    let outputs = host.process_frame(&scene(0)).unwrap();
    assert_eq!(outputs.len(), 2);
    assert!(outputs[0].result::<SimulatedGazeExtension>().is_none());
    let region = outputs[0].result::<BrightRegionExtension>().unwrap();
    assert_eq!(region.data.frame_width, 64);
    assert!(region.data.region.is_some());
}

#[test]
fn all_builtin_outputs_pass_their_checks() {
    let config = AppConfig::default();
    let mut host = host_with(
        &["pose-vis", "--use-sim-gaze", "--use-bright-region", "--use-motion"],
        &config,
    );

    for offset in 0..5 {
        let outputs = host.process_frame(&scene(offset * 4)).unwrap();
        assert_eq!(outputs.len(), 3);
        for verdict in check_outputs(&outputs) {
            assert!(verdict.passed, "{} rejected frame {}", verdict.name, offset);
        }
        let motion = outputs[2].result::<MotionExtension>().unwrap();
        assert_eq!(motion.data.first_frame, offset == 0);
        if offset > 0 {
            assert!(motion.data.changed > 0.0);
        }
    }
    host.shutdown().unwrap();
}

#[test]
fn parallel_config_gives_same_results() {
    let mut config = AppConfig::default();
    config.host.parallel = true;
    config.host.base_index = 2;
    let argv = ["pose-vis", "--use-sim-gaze", "--use-bright-region"];
    let mut sequential = host_with(&argv, &config);
    let mut parallel = host_with(&argv, &config);

    let frame = scene(8);
    let a = sequential.process_frame(&frame).unwrap();
    let b = parallel.process_frame_parallel(&frame).unwrap();
    let json = |outputs: &[pose_vis::ExtensionOutput]| {
        outputs
            .iter()
            .map(|o| (o.extension_id(), o.to_json().unwrap()))
            .collect::<Vec<_>>()
    };
    assert_eq!(json(&a), json(&b));
    assert_eq!(a[0].extension_id(), ExtensionId(2));
}
