//! Scenario runner - executes scripted interaction scenarios.

use crate::exporter::{FrameRecorder, SimExport, SimFrame};
use crate::scenarios::ScenarioId;
use crate::world::{SimConfig, SimWorld};

use nalgebra::Vector3;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use warpfield_core::embedding::{generate_embedding_nodes, local_embedding, nearest_neighbors, Umap};
use warpfield_core::{Cursor, EmbeddingError, NodeStyle, Renderer, WarpError};
use warpfield_env::{HostEvent, WarpContext};

/// RNG stream for the embedding probe's vectors.
const STREAM_EMBEDDING: u64 = 100;

/// Why a scenario stopped.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("{0}")]
    Check(String),

    #[error(transparent)]
    Warp(#[from] WarpError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

macro_rules! ensure {
    ($cond:expr, $($msg:tt)+) => {
        if !$cond {
            return Err(ScenarioError::Check(format!($($msg)+)));
        }
    };
}

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total ticks executed
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default)]
pub struct ScenarioMetrics {
    pub clicks_sent: u64,
    pub events_delivered: u64,
    pub warps_started: u64,
    pub warps_completed: u64,
    pub frames_rendered: u64,
    pub violations: Vec<String>,
}

/// Runs scenarios.
pub struct ScenarioRunner {
    config: SimConfig,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, node_count: usize) -> Self {
        let mut config = SimConfig {
            seed,
            ..Default::default()
        };
        config.app.node_count = node_count;
        Self { config }
    }

    /// Creates a runner from a full configuration.
    pub fn with_config(config: SimConfig) -> Self {
        Self { config }
    }

    /// Sets the tick rate.
    pub fn with_fps(mut self, fps: u32) -> Self {
        self.config.app.fps = fps;
        self
    }

    /// Sets the maximum duration.
    pub fn with_duration(mut self, secs: f64) -> Self {
        self.config.max_duration_secs = secs;
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Runs a scenario and returns the result.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        let recorder = FrameRecorder::new(self.config.export_interval);
        self.execute(scenario, recorder).await.0
    }

    /// Runs a scenario and collects its recorded frames for export.
    ///
    /// `forward` receives every frame as it is rendered.
    pub async fn run_with_export(
        &self,
        scenario: ScenarioId,
        forward: Option<Box<dyn Renderer + Send>>,
    ) -> (ScenarioResult, SimExport) {
        let mut recorder = FrameRecorder::new(self.config.export_interval);
        if let Some(renderer) = forward {
            recorder = recorder.with_forward(renderer);
        }

        let (result, frames) = self.execute(scenario, recorder).await;

        let mut export = SimExport::new(scenario.name(), self.config.seed);
        export.extend(frames);
        export.finalize(result.passed, result.metrics.violations.clone());
        (result, export)
    }

    async fn execute(
        &self,
        scenario: ScenarioId,
        recorder: FrameRecorder,
    ) -> (ScenarioResult, Vec<SimFrame>) {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.config.seed);
        debug!("  {}", scenario.description());

        let mut world = match SimWorld::with_recorder(self.config.clone(), recorder) {
            Ok(world) => world,
            Err(e) => {
                warn!("Scenario setup failed: {}", e);
                return (
                    ScenarioResult {
                        scenario,
                        seed: self.config.seed,
                        passed: false,
                        total_ticks: 0,
                        final_time_secs: 0.0,
                        failure_reason: Some(format!("setup failed: {}", e)),
                        metrics: ScenarioMetrics::default(),
                    },
                    Vec::new(),
                );
            }
        };

        let outcome = match scenario {
            ScenarioId::SingleWarp => single_warp(&mut world),
            ScenarioId::ChainedWarps => chained_warps(&mut world),
            ScenarioId::ClickDuringWarp => click_during_warp(&mut world),
            ScenarioId::ProgrammaticRewarp => programmatic_rewarp(&mut world),
            ScenarioId::ResizeMidWarp => resize_mid_warp(&mut world),
            ScenarioId::HoverSweep => hover_sweep(&mut world),
            ScenarioId::EmbeddingProbe => embedding_probe(&world).await,
        };

        let violations: Vec<String> = world
            .oracle
            .violations()
            .iter()
            .map(|v| v.to_string())
            .collect();

        let failure_reason = match outcome {
            Err(e) => Some(e.to_string()),
            Ok(()) if !violations.is_empty() => Some(format!(
                "{} invariant violations, first: {}",
                violations.len(),
                violations[0]
            )),
            Ok(()) if world.time() > self.config.max_duration_secs => Some(format!(
                "ran {:.1}s, over the {:.1}s limit",
                world.time(),
                self.config.max_duration_secs
            )),
            Ok(()) => None,
        };

        let frames = world.recorder_mut().take_frames();
        let metrics = ScenarioMetrics {
            clicks_sent: world.clicks_sent(),
            events_delivered: world.input().delivered(),
            warps_started: world.oracle.warps_started(),
            warps_completed: world.oracle.warps_completed(),
            frames_rendered: world.app().frame_count(),
            violations,
        };

        (
            ScenarioResult {
                scenario,
                seed: self.config.seed,
                passed: failure_reason.is_none(),
                total_ticks: world.tick_count(),
                final_time_secs: world.time(),
                failure_reason,
                metrics,
            },
            frames,
        )
    }
}

// ----------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------

/// A visible node, searching from `from` and wrapping around.
fn find_visible(world: &SimWorld, from: usize) -> Result<usize, ScenarioError> {
    world
        .visible_node(from)
        .or_else(|| world.visible_node(0))
        .ok_or_else(|| ScenarioError::Check("no node in view".to_string()))
}

/// A visible node other than the current anchor.
fn find_visible_non_anchor(world: &SimWorld, from: usize) -> Result<usize, ScenarioError> {
    let anchor = world.app().nodes().anchor_index();
    let len = world.app().nodes().len();
    (0..len)
        .map(|i| (from + i) % len)
        .find(|&i| Some(i) != anchor && world.app().screen_position(i).is_some())
        .ok_or_else(|| ScenarioError::Check("no non-anchor node in view".to_string()))
}

/// Clicks a node and runs the warp to the end. Returns the anchored node.
fn click_and_settle(world: &mut SimWorld, index: usize) -> Result<usize, ScenarioError> {
    let picked = world
        .click_node(index)
        .ok_or_else(|| ScenarioError::Check(format!("node-{} is off screen", index)))?;
    ensure!(world.settle()?, "warp toward node-{} did not settle", picked);
    Ok(picked)
}

fn ensure_anchored_at_origin(world: &SimWorld, expected: usize) -> Result<(), ScenarioError> {
    let nodes = world.app().nodes();
    ensure!(
        nodes.anchor_index() == Some(expected),
        "anchor is {:?}, expected node-{}",
        nodes.anchor_index(),
        expected
    );
    ensure!(nodes.anchor_count() == 1, "{} anchors", nodes.anchor_count());
    let target = world.app().controls().target;
    ensure!(
        target.norm() < 1e-9,
        "camera target settled at {:?} instead of the origin",
        target
    );
    Ok(())
}

// ----------------------------------------------------------------------
// Scenarios
// ----------------------------------------------------------------------

/// WS-001: one click, one full warp.
fn single_warp(world: &mut SimWorld) -> Result<(), ScenarioError> {
    let start = world.time();
    let index = find_visible(world, 0)?;
    let picked = click_and_settle(world, index)?;

    ensure_anchored_at_origin(world, picked)?;
    let total = world.app().warp().timing().total().as_secs_f64();
    ensure!(
        world.time() - start >= total,
        "warp finished after {:.3}s, shorter than {:.3}s",
        world.time() - start,
        total
    );
    ensure!(world.oracle.warps_completed() == 1, "expected one completed warp");
    Ok(())
}

/// WS-002: three warps in a row.
fn chained_warps(world: &mut SimWorld) -> Result<(), ScenarioError> {
    for round in 0..3 {
        let index = find_visible_non_anchor(world, round * 97)?;
        let picked = click_and_settle(world, index)?;
        ensure_anchored_at_origin(world, picked)?;
        debug!("  round {}: node-{} anchored", round + 1, picked);
    }
    ensure!(
        world.oracle.warps_completed() == 3,
        "{} warps completed, expected 3",
        world.oracle.warps_completed()
    );
    Ok(())
}

/// WS-003: a click mid-warp is ignored; the same click after it lands.
fn click_during_warp(world: &mut SimWorld) -> Result<(), ScenarioError> {
    let first = find_visible(world, 0)?;
    let anchor = world
        .click_node(first)
        .ok_or_else(|| ScenarioError::Check("first click missed".to_string()))?;
    world.tick()?;
    world.run_for(Duration::from_millis(1100))?;
    ensure!(world.app().is_warping(), "warp ended too early");

    let other = find_visible_non_anchor(world, 1)?;
    world.click_node(other);
    world.tick()?;

    ensure!(
        world.app().nodes().anchor_index() == Some(anchor),
        "mid-warp click moved the anchor to {:?}",
        world.app().nodes().anchor_index()
    );
    ensure!(world.oracle.warps_started() == 1, "mid-warp click restarted the warp");

    ensure!(world.settle()?, "first warp did not settle");
    let other = find_visible_non_anchor(world, 1)?;
    let picked = click_and_settle(world, other)?;
    ensure_anchored_at_origin(world, picked)?;
    Ok(())
}

/// WS-004: re-anchor from code mid-warp; nothing jumps.
fn programmatic_rewarp(world: &mut SimWorld) -> Result<(), ScenarioError> {
    let len = world.app().nodes().len();
    ensure!(len >= 2, "need two nodes, field has {}", len);

    world.app_mut().set_anchor(0)?;
    world.run_for(Duration::from_millis(2000))?;
    ensure!(world.app().is_warping(), "first warp ended too early");

    let before: Vec<Vector3<f64>> = world.app().nodes().iter().map(|n| n.position).collect();
    let look_at = world.app().controls().target;

    world.app_mut().set_anchor(1)?;
    world.tick()?;

    let jumped = world
        .app()
        .nodes()
        .iter()
        .zip(&before)
        .filter(|(node, old)| node.position != **old)
        .count();
    ensure!(jumped == 0, "{} nodes jumped when the warp restarted", jumped);

    // Pullback only recoils the target; a jump would be far larger than one tick's motion
    let step = (world.app().controls().target - look_at).norm();
    ensure!(step < 1.0, "camera target jumped {:.3} on restart", step);

    ensure!(world.settle()?, "second warp did not settle");
    ensure_anchored_at_origin(world, 1)?;
    ensure!(
        world.oracle.warps_started() == 2 && world.oracle.warps_completed() == 1,
        "expected 2 started / 1 completed, got {} / {}",
        world.oracle.warps_started(),
        world.oracle.warps_completed()
    );
    Ok(())
}

/// WS-005: resize during release; aspect and picking follow.
fn resize_mid_warp(world: &mut SimWorld) -> Result<(), ScenarioError> {
    let first = find_visible(world, 0)?;
    world
        .click_node(first)
        .ok_or_else(|| ScenarioError::Check("first click missed".to_string()))?;
    world.tick()?;
    world.run_for(Duration::from_millis(1200))?;

    world.send(HostEvent::Resize {
        width: 900,
        height: 900,
    });
    world.tick()?;

    let aspect = world.app().camera().aspect;
    ensure!((aspect - 1.0).abs() < 1e-12, "aspect is {} after square resize", aspect);
    let viewport = world.app().scene().viewport();
    ensure!(
        (viewport.width, viewport.height) == (900, 900),
        "viewport is {}x{} after resize",
        viewport.width,
        viewport.height
    );

    ensure!(world.settle()?, "warp did not settle after resize");
    let next = find_visible_non_anchor(world, 5)?;
    let picked = click_and_settle(world, next)?;
    ensure_anchored_at_origin(world, picked)?;
    Ok(())
}

/// WS-006: hover highlights, idle and during a warp.
fn hover_sweep(world: &mut SimWorld) -> Result<(), ScenarioError> {
    let mut from = 0;
    for _ in 0..5 {
        let index = find_visible(world, from)?;
        from = index + 1;
        let hovered = world
            .hover_node(index)
            .ok_or_else(|| ScenarioError::Check(format!("hover over node-{} missed", index)))?;
        world.tick()?;
        check_hover(world, hovered)?;
    }

    world.app_mut().set_anchor(0)?;
    world.run_for(Duration::from_millis(2500))?;
    ensure!(world.app().is_warping(), "warp ended too early");

    let index = find_visible_non_anchor(world, 3)?;
    let hovered = world
        .hover_node(index)
        .ok_or_else(|| ScenarioError::Check("mid-warp hover missed".to_string()))?;
    world.tick()?;
    check_hover(world, hovered)?;

    world.send(HostEvent::PointerMove {
        x: -10_000.0,
        y: -10_000.0,
    });
    world.tick()?;
    ensure!(world.app().hovered().is_none(), "hover stuck after leaving the nodes");
    ensure!(world.app().scene().cursor() == Cursor::Default, "pointer cursor stuck");
    ensure!(world.settle()?, "warp did not settle");
    Ok(())
}

fn check_hover(world: &SimWorld, expected: usize) -> Result<(), ScenarioError> {
    let app = world.app();
    ensure!(
        app.hovered() == Some(expected),
        "hovered {:?}, expected node-{}",
        app.hovered(),
        expected
    );
    ensure!(app.scene().cursor() == Cursor::Pointer, "cursor not a pointer over a node");

    let highlighted: Vec<usize> = app
        .scene()
        .handles()
        .iter()
        .enumerate()
        .filter(|(_, h)| h.style == NodeStyle::Hover)
        .map(|(i, _)| i)
        .collect();
    let is_anchor = app.nodes().anchor_index() == Some(expected);
    let want: Vec<usize> = if is_anchor { vec![] } else { vec![expected] };
    ensure!(highlighted == want, "highlighted {:?}, expected {:?}", highlighted, want);
    Ok(())
}

/// WS-007: project a node's neighborhood with UMAP.
async fn embedding_probe(world: &SimWorld) -> Result<(), ScenarioError> {
    const COUNT: usize = 200;
    const DIM: usize = 16;
    const K: usize = 30;
    const EPOCHS: usize = 50;

    let mut rng = world.context.derive_rng(STREAM_EMBEDDING);
    let nodes = generate_embedding_nodes(COUNT, DIM, &mut rng);
    let query = &nodes[0];

    let neighbors = nearest_neighbors(&nodes, query, K);
    ensure!(neighbors.len() == K, "{} neighbors, expected {}", neighbors.len(), K);
    ensure!(
        neighbors.iter().all(|n| n.id != query.id),
        "query returned as its own neighbor"
    );

    let epochs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&epochs);
    let umap = Umap::builder()
        .n_neighbors(10)
        .n_epochs(EPOCHS)
        .seed(world.config.seed)
        .build();

    let projected = local_embedding(&nodes, query, K, umap, move |epoch| {
        counter.fetch_add(1, Ordering::SeqCst);
        debug!("UMAP epoch {}", epoch);
    })
    .await?;

    ensure!(projected.len() == K, "{} rows, expected {}", projected.len(), K);
    ensure!(
        projected.iter().all(|row| row.len() == 2 && row.iter().all(|v| v.is_finite())),
        "embedding rows must be finite 2D points"
    );
    let seen = epochs.load(Ordering::SeqCst);
    ensure!(seen == EPOCHS, "{} epoch callbacks, expected {}", seen, EPOCHS);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(seed: u64) -> ScenarioRunner {
        let mut config = SimConfig {
            seed,
            ..Default::default()
        };
        config.app.node_count = 150;
        config.app.star_count = 0;
        ScenarioRunner::with_config(config)
    }

    #[tokio::test]
    async fn test_all_scenarios_pass() {
        let runner = runner(42);
        for scenario in ScenarioId::all() {
            let result = runner.run(scenario).await;
            assert!(
                result.passed,
                "{} failed: {:?}",
                scenario,
                result.failure_reason
            );
        }
    }

    #[tokio::test]
    async fn test_scenarios_are_deterministic() {
        let a = runner(7).run(ScenarioId::ChainedWarps).await;
        let b = runner(7).run(ScenarioId::ChainedWarps).await;
        assert_eq!(a.total_ticks, b.total_ticks);
        assert_eq!(a.metrics.warps_completed, b.metrics.warps_completed);
        assert_eq!(a.passed, b.passed);
    }

    #[tokio::test]
    async fn test_export_collects_frames() {
        let (result, export) = runner(3).run_with_export(ScenarioId::SingleWarp, None).await;
        assert!(result.passed, "{:?}", result.failure_reason);
        assert!(!export.frames.is_empty());
        assert!(export.passed);
        assert_eq!(export.scenario, "single_warp");
        assert!(export.frames.iter().any(|f| f.warp.is_some()));
    }

    #[tokio::test]
    async fn test_duration_limit_fails_long_scenarios() {
        let result = runner(42).with_duration(2.0).run(ScenarioId::SingleWarp).await;
        assert!(!result.passed);
        assert!(result.failure_reason.unwrap().contains("limit"));
    }

    #[tokio::test]
    async fn test_bad_config_fails_setup() {
        let mut config = SimConfig::default();
        config.app.space = 1.0;
        let result = ScenarioRunner::with_config(config).run(ScenarioId::SingleWarp).await;
        assert!(!result.passed);
        assert!(result.failure_reason.unwrap().starts_with("setup failed"));
    }
}
