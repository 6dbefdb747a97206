use std::{env, fs, path::PathBuf};

use head_pose::{
    Evaluation, FrameView, HeadPose, LandmarkDetector, LandmarkPoint, LandmarkSet, PoseEvaluator,
    PoseMargins,
};
use serde::{Deserialize, Serialize};

#[cfg(not(feature = "tracing"))]
use std::str::FromStr;

#[cfg(not(feature = "tracing"))]
use log::{info, LevelFilter};

#[cfg(feature = "tracing")]
use tracing::info;

#[cfg(feature = "tracing")]
use head_pose::core::init_tracing;
#[cfg(not(feature = "tracing"))]
use head_pose::core::init_with_level;

const WIDTH: usize = 640;
const HEIGHT: usize = 480;

#[derive(Debug, Default, Deserialize)]
struct ExampleConfig {
    #[serde(default)]
    margins: PoseMargins,
    #[serde(default)]
    output_path: Option<String>,
}

#[derive(Debug, Serialize)]
struct SceneReport {
    scene: String,
    outcome: Evaluation,
    pose: Option<HeadPose>,
}

/// Replays one scripted landmark set per frame.
struct ScriptedDetector {
    face: LandmarkSet,
}

impl LandmarkDetector for ScriptedDetector {
    fn detect(&self, _frame: &FrameView<'_>) -> Vec<LandmarkSet> {
        vec![self.face.clone()]
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(not(feature = "tracing"))]
    let log_level = LevelFilter::from_str("info").unwrap_or(LevelFilter::Info);
    #[cfg(not(feature = "tracing"))]
    init_with_level(log_level)?;
    #[cfg(not(feature = "tracing"))]
    info!("Logger initialized");

    #[cfg(feature = "tracing")]
    init_tracing(false);

    run()
}

#[cfg_attr(feature = "tracing", tracing::instrument(level = "info"))]
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = load_config()?;
    cfg.margins.validate()?;

    let pixels = vec![0u8; WIDTH * HEIGHT];
    let frame = FrameView {
        width: WIDTH,
        height: HEIGHT,
        data: &pixels,
    };

    let scenes = [
        ("frontal", synthetic_face(|_, _| -0.03)),
        ("tilted-down", synthetic_face(|_, py| (0.3 * (py - 240.0)) as f32)),
        ("turned-left", synthetic_face(|px, _| (0.38 * (px - 320.0)) as f32)),
    ];

    let mut reports = Vec::with_capacity(scenes.len());
    for (name, face) in scenes {
        let gate = PoseEvaluator::new(ScriptedDetector { face });
        let outcome = gate.evaluate(&frame, &cfg.margins)?;
        let pose = gate.head_pose(&frame)?;
        if let Some(pose) = &pose {
            info!("{name}: {outcome:?} ({})", pose.angles);
        } else {
            info!("{name}: {outcome:?}");
        }
        reports.push(SceneReport {
            scene: name.to_string(),
            outcome,
            pose,
        });
    }

    write_report(cfg.output_path.as_deref(), &reports)
}

fn load_config() -> Result<ExampleConfig, Box<dyn std::error::Error>> {
    match env::args().nth(1) {
        Some(path) => {
            let raw = fs::read_to_string(path)?;
            Ok(serde_json::from_str(&raw)?)
        }
        None => Ok(ExampleConfig::default()),
    }
}

/// Six canonical landmarks on a frame-filling face, with caller-chosen depth.
fn synthetic_face(depth: impl Fn(f64, f64) -> f32) -> LandmarkSet {
    let layout = [
        (33u32, 60.0, 120.0),
        (263, 580.0, 120.0),
        (1, 320.0, 300.0),
        (61, 200.0, 400.0),
        (291, 440.0, 400.0),
        (199, 320.0, 470.0),
    ];
    LandmarkSet::new(
        layout
            .iter()
            .map(|&(index, px, py)| LandmarkPoint {
                index,
                x: ((px + 0.5) / WIDTH as f64) as f32,
                y: ((py + 0.5) / HEIGHT as f64) as f32,
                z: depth(px, py),
            })
            .collect(),
    )
}

fn write_report(
    path: Option<&str>,
    reports: &[SceneReport],
) -> Result<(), Box<dyn std::error::Error>> {
    let out_path = path
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("tmpdata/gate_frame_report.json"));
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(reports)?;
    fs::write(&out_path, json)?;
    println!("wrote report JSON to {}", out_path.display());
    Ok(())
}
