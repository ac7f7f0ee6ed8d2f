//! Frame recording and JSON export.
//!
//! `FrameRecorder` is the simulator's renderer: it keeps a sampled trace of
//! the run, and can forward every frame to another renderer (e.g. Rerun).

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use warpfield_core::{FrameView, NodeStyle, Phase, Renderer, WarpError};

/// A single recorded frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimFrame {
    pub frame: u64,

    /// Virtual time in seconds
    pub time_sec: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub warp: Option<WarpSample>,

    pub camera: Point,
    pub look_at: Point,

    /// Node positions, only when the recorder keeps them
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<Point>,
}

/// Warp state of a recorded frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WarpSample {
    pub phase: Phase,
    pub node_progress: f64,
    pub camera_progress: f64,
}

/// A 3D position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<&Vector3<f64>> for Point {
    fn from(v: &Vector3<f64>) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

/// Renderer that records frames for export.
pub struct FrameRecorder {
    /// Keep one frame in this many; warp phase changes are always kept
    interval: u64,
    with_nodes: bool,
    frames: Vec<SimFrame>,
    last_phase: Option<Phase>,
    rendered: u64,
    forward: Option<Box<dyn Renderer + Send>>,
}

impl FrameRecorder {
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
            with_nodes: false,
            frames: Vec::new(),
            last_phase: None,
            rendered: 0,
            forward: None,
        }
    }

    /// Also records every node position in each kept frame.
    pub fn with_nodes(mut self) -> Self {
        self.with_nodes = true;
        self
    }

    /// Passes every frame on to `renderer` as well.
    pub fn with_forward(mut self, renderer: Box<dyn Renderer + Send>) -> Self {
        self.forward = Some(renderer);
        self
    }

    pub fn frames(&self) -> &[SimFrame] {
        &self.frames
    }

    /// Frames seen, kept or not.
    pub fn rendered(&self) -> u64 {
        self.rendered
    }

    pub fn take_frames(&mut self) -> Vec<SimFrame> {
        std::mem::take(&mut self.frames)
    }
}

impl Renderer for FrameRecorder {
    fn render(&mut self, view: &FrameView<'_>) -> Result<(), WarpError> {
        self.rendered += 1;

        let phase = view.warp.map(|w| w.sample.phase);
        let phase_changed = phase != self.last_phase;
        self.last_phase = phase;

        if view.frame % self.interval == 0 || phase_changed {
            let anchor = view
                .scene
                .handles()
                .iter()
                .position(|h| h.style == NodeStyle::Anchor);

            self.frames.push(SimFrame {
                frame: view.frame,
                time_sec: view.time.as_secs_f64(),
                anchor,
                warp: view.warp.map(|w| WarpSample {
                    phase: w.sample.phase,
                    node_progress: w.node_progress,
                    camera_progress: w.camera_progress,
                }),
                camera: Point::from(&view.camera.position),
                look_at: Point::from(&view.look_at),
                nodes: if self.with_nodes {
                    view.scene.handles().iter().map(|h| Point::from(&h.position)).collect()
                } else {
                    Vec::new()
                },
            });
        }

        match self.forward.as_mut() {
            Some(renderer) => renderer.render(view),
            None => Ok(()),
        }
    }
}

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Scenario name
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Duration in seconds
    pub duration_sec: f64,

    /// Sampled frames
    pub frames: Vec<SimFrame>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<String>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64) -> Self {
        Self {
            scenario: scenario.to_string(),
            seed,
            duration_sec: 0.0,
            frames: Vec::new(),
            passed: false,
            violations: Vec::new(),
        }
    }

    /// Adds recorded frames.
    pub fn extend(&mut self, frames: Vec<SimFrame>) {
        if let Some(last) = frames.last() {
            self.duration_sec = last.time_sec;
        }
        self.frames.extend(frames);
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, violations: Vec<String>) {
        self.passed = passed;
        self.violations = violations;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: &str) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use warpfield_core::{Camera, Node, NodeSet, PhaseSample, Scene, WarpFrame};
    use warpfield_env::{NodeId, Viewport};

    fn scene() -> Scene {
        let nodes = NodeSet::new(vec![Node::new(
            NodeId::indexed(0),
            Vector3::new(1.0, 2.0, 3.0),
        )]);
        Scene::new(&nodes, 0.15, Viewport::default())
    }

    fn warp(phase: Phase) -> WarpFrame {
        WarpFrame {
            sample: PhaseSample {
                phase,
                progress: 0.5,
                eased: 0.5,
            },
            node_progress: 0.25,
            camera_progress: 0.5,
            finished: false,
        }
    }

    fn render(recorder: &mut FrameRecorder, frame: u64, warp: Option<WarpFrame>) {
        let scene = scene();
        let camera = Camera::default();
        recorder
            .render(&FrameView {
                frame,
                time: Duration::from_millis(frame * 10),
                scene: &scene,
                camera: &camera,
                look_at: Vector3::zeros(),
                warp,
            })
            .unwrap();
    }

    #[test]
    fn test_samples_every_interval_and_phase_change() {
        let mut recorder = FrameRecorder::new(10);
        for frame in 0..25 {
            let warp = match frame {
                0..=4 => None,
                5..=14 => Some(warp(Phase::Pullback)),
                _ => Some(warp(Phase::Release)),
            };
            render(&mut recorder, frame, warp);
        }

        let kept: Vec<u64> = recorder.frames().iter().map(|f| f.frame).collect();
        assert_eq!(kept, vec![0, 5, 10, 15, 20]);
        assert_eq!(recorder.rendered(), 25);
        assert!(recorder.frames()[0].nodes.is_empty());
    }

    #[test]
    fn test_records_nodes_on_request() {
        let mut recorder = FrameRecorder::new(1).with_nodes();
        render(&mut recorder, 0, None);
        assert_eq!(recorder.frames()[0].nodes, vec![Point { x: 1.0, y: 2.0, z: 3.0 }]);
    }

    #[test]
    fn test_export_serializes() {
        let mut recorder = FrameRecorder::new(1);
        render(&mut recorder, 0, Some(warp(Phase::EaseOut)));
        render(&mut recorder, 1, None);

        let mut export = SimExport::new("single_warp", 42);
        export.extend(recorder.take_frames());
        export.finalize(true, Vec::new());

        let json = serde_json::to_value(&export).unwrap();
        assert_eq!(json["scenario"], "single_warp");
        assert_eq!(json["frames"].as_array().unwrap().len(), 2);
        assert_eq!(json["frames"][0]["warp"]["phase"], "ease_out");
        assert!(json.get("violations").is_none());
        assert!((export.duration_sec - 0.01).abs() < 1e-12);
    }
}
