//! The WARP engine - three-phase timed relocation of the node field.
//!
//! A warp is started when a node becomes the anchor. From then on every
//! frame derives its state purely from the time elapsed since the start:
//!
//! ```text
//!  elapsed ─┬──────────────┬────────┬──────────────────────────┬──▶
//!           │   PULLBACK   │RELEASE │         EASE-OUT         │ COMPLETE
//!           │ cubic in-out │ linear │       quartic out        │
//!  nodes    │ 0            │ 0→0.7  │ 0.7→1.0                  │ 1 (settled)
//!  camera   │ 0→-5 (bow)   │ 0→0.8  │ 0.8→1.0                  │ 1
//! ```
//!
//! There are no stored phase-transition flags: [`phase_at`] is a pure
//! function of elapsed time and the [`WarpTiming`].

use crate::camera::{Camera, OrbitControls};
use crate::easing::{ease_in_out_cubic, ease_out_quart, linear};
use crate::layout::TargetLayout;
use crate::node::NodeSet;

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Node progress reached at the end of the release phase.
const NODE_RELEASE_SHARE: f64 = 0.7;

/// Camera progress reached at the end of the release phase.
const CAMERA_RELEASE_SHARE: f64 = 0.8;

/// How far the look-at target is drawn back during pullback, in multiples
/// of the distance to the anchor.
const CAMERA_PULLBACK_FACTOR: f64 = 5.0;

/// Durations of the three warp phases, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpTiming {
    /// Bow-draw phase: nodes hold still, camera target pulls away
    pub pullback_ms: u64,

    /// Arrow-fired phase: quick snap toward the new layout
    pub release_ms: u64,

    /// Long settle to appreciate the result
    pub ease_out_ms: u64,
}

impl Default for WarpTiming {
    fn default() -> Self {
        Self {
            pullback_ms: 1000,
            release_ms: 500,
            ease_out_ms: 4000,
        }
    }
}

impl WarpTiming {
    pub fn pullback(&self) -> Duration {
        Duration::from_millis(self.pullback_ms)
    }

    pub fn release(&self) -> Duration {
        Duration::from_millis(self.release_ms)
    }

    pub fn ease_out(&self) -> Duration {
        Duration::from_millis(self.ease_out_ms)
    }

    /// Sum of all three phases.
    pub fn total(&self) -> Duration {
        self.pullback() + self.release() + self.ease_out()
    }
}

/// One of the contiguous warp phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Pullback,
    Release,
    EaseOut,
    /// Elapsed time has reached the total duration
    Complete,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Pullback => "pullback",
            Phase::Release => "release",
            Phase::EaseOut => "easeout",
            Phase::Complete => "complete",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Phase and within-phase progress at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseSample {
    pub phase: Phase,

    /// Normalized progress through the phase, in `[0, 1]`
    pub progress: f64,

    /// `progress` passed through the phase's easing curve
    pub eased: f64,
}

/// Maps elapsed warp time to the active phase.
///
/// Boundaries belong to the later phase: at exactly `pullback` the warp is
/// in `Release` with progress 0.
pub fn phase_at(elapsed: Duration, timing: &WarpTiming) -> PhaseSample {
    let release_start = timing.pullback();
    let ease_out_start = release_start + timing.release();

    let (phase, progress, curve): (Phase, f64, fn(f64) -> f64) = if elapsed < release_start {
        (
            Phase::Pullback,
            fraction(elapsed, timing.pullback()),
            ease_in_out_cubic,
        )
    } else if elapsed < ease_out_start {
        (
            Phase::Release,
            fraction(elapsed - release_start, timing.release()),
            linear,
        )
    } else if elapsed < timing.total() {
        (
            Phase::EaseOut,
            fraction(elapsed - ease_out_start, timing.ease_out()),
            ease_out_quart,
        )
    } else {
        (Phase::Complete, 1.0, linear)
    };

    PhaseSample {
        phase,
        progress,
        eased: curve(progress),
    }
}

fn fraction(part: Duration, whole: Duration) -> f64 {
    part.as_secs_f64() / whole.as_secs_f64()
}

/// Interpolation factor for node positions (original → target).
pub fn node_progress(sample: &PhaseSample) -> f64 {
    match sample.phase {
        Phase::Pullback => 0.0,
        Phase::Release => sample.eased * NODE_RELEASE_SHARE,
        Phase::EaseOut => NODE_RELEASE_SHARE + sample.eased * (1.0 - NODE_RELEASE_SHARE),
        Phase::Complete => 1.0,
    }
}

/// Interpolation factor for the camera look-at target (start → anchor).
///
/// Negative during pullback: the target is drawn away from the anchor
/// before it is released toward it.
pub fn camera_progress(sample: &PhaseSample) -> f64 {
    match sample.phase {
        Phase::Pullback => -sample.eased * CAMERA_PULLBACK_FACTOR,
        Phase::Release => sample.eased * CAMERA_RELEASE_SHARE,
        Phase::EaseOut => CAMERA_RELEASE_SHARE + sample.eased * (1.0 - CAMERA_RELEASE_SHARE),
        Phase::Complete => 1.0,
    }
}

/// Transient state of one running warp.
#[derive(Debug, Clone)]
pub struct WarpSession {
    /// Context time at which the warp started
    pub started_at: Duration,

    /// Node the camera converges on
    pub anchor: usize,

    /// Look-at target the camera interpolates from
    pub camera_start: Vector3<f64>,

    /// Look-at target the camera interpolates to (re-read from the anchor)
    pub camera_end: Vector3<f64>,

    /// Last phase reported, for transition logging
    last_phase: Option<Phase>,
}

/// Result of one warp update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WarpFrame {
    pub sample: PhaseSample,
    pub node_progress: f64,
    pub camera_progress: f64,

    /// True on the frame that settled every node
    pub finished: bool,
}

/// Drives warp sessions frame by frame.
#[derive(Debug, Clone, Default)]
pub struct WarpController {
    timing: WarpTiming,
    session: Option<WarpSession>,
}

impl WarpController {
    pub fn new(timing: WarpTiming) -> Self {
        Self {
            timing,
            session: None,
        }
    }

    pub fn timing(&self) -> &WarpTiming {
        &self.timing
    }

    /// Whether a warp is in progress.
    pub fn is_warping(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&WarpSession> {
        self.session.as_ref()
    }

    /// Starts a warp toward `anchor`.
    ///
    /// Assigns fresh targets through `layout` and flags every node warping.
    /// If a warp is already running it is replaced: current positions become
    /// the new originals, so nodes continue from where they are.
    pub fn start(
        &mut self,
        nodes: &mut NodeSet,
        anchor: usize,
        layout: &mut dyn TargetLayout,
        look_at: Vector3<f64>,
        now: Duration,
    ) {
        let Some(anchor_position) = nodes.get(anchor).map(|n| n.position) else {
            return;
        };

        if self.session.is_some() {
            debug!("Warp restarted mid-flight, re-basing {} nodes", nodes.warping_count());
        }
        for node in nodes.iter_mut() {
            node.original_position = node.position;
        }

        layout.assign_targets(nodes, anchor);

        self.session = Some(WarpSession {
            started_at: now,
            anchor,
            camera_start: look_at,
            camera_end: anchor_position,
            last_phase: None,
        });
        info!("Space warping started...");
    }

    /// Advances the running warp to `now`.
    ///
    /// Moves every warping node, couples the camera to the anchor, and ends
    /// the session once the total duration has elapsed. Returns `None` when
    /// no warp is running.
    pub fn update(
        &mut self,
        nodes: &mut NodeSet,
        camera: &mut Camera,
        controls: &mut OrbitControls,
        now: Duration,
    ) -> Option<WarpFrame> {
        let session = self.session.as_mut()?;

        let elapsed = now.saturating_sub(session.started_at);
        let sample = phase_at(elapsed, &self.timing);

        if session.last_phase != Some(sample.phase) {
            debug!(phase = %sample.phase, elapsed_ms = elapsed.as_millis() as u64, "Warp phase entered");
            session.last_phase = Some(sample.phase);
        }
        debug!("{} phase: {:.1}%", sample.phase, sample.progress * 100.0);

        // The snap starts from wherever the pullback left the target
        if sample.phase == Phase::Release {
            session.camera_start = controls.target;
        }

        let node_t = node_progress(&sample);
        let camera_t = camera_progress(&sample);
        let finished = sample.phase == Phase::Complete;

        for node in nodes.iter_mut().filter(|n| n.is_warping) {
            if finished {
                node.settle();
            } else {
                node.interpolate(node_t);
            }
        }

        // The anchor is warping too; follow it where it is now
        if let Some(anchor) = nodes.get(session.anchor) {
            session.camera_end = anchor.position;
        }

        let new_target = session.camera_start.lerp(&session.camera_end, camera_t);
        let delta = new_target - controls.target;
        camera.position += delta;
        controls.target = new_target;

        if finished {
            self.session = None;
            info!("Space warp complete!");
        }

        Some(WarpFrame {
            sample,
            node_progress: node_t,
            camera_progress: camera_t,
            finished,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::RandomShellLayout;
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_phase_boundaries_are_exact() {
        let timing = WarpTiming::default();

        let s = phase_at(ms(0), &timing);
        assert_eq!(s.phase, Phase::Pullback);
        assert_eq!(s.progress, 0.0);

        let s = phase_at(ms(999), &timing);
        assert_eq!(s.phase, Phase::Pullback);

        let s = phase_at(ms(1000), &timing);
        assert_eq!(s.phase, Phase::Release);
        assert_eq!(s.progress, 0.0);

        let s = phase_at(ms(1500), &timing);
        assert_eq!(s.phase, Phase::EaseOut);
        assert_eq!(s.progress, 0.0);

        let s = phase_at(ms(5499), &timing);
        assert_eq!(s.phase, Phase::EaseOut);

        assert_eq!(phase_at(ms(5500), &timing).phase, Phase::Complete);
        assert_eq!(phase_at(ms(60_000), &timing).phase, Phase::Complete);
    }

    #[test]
    fn test_phase_names() {
        let timing = WarpTiming::default();
        assert_eq!(phase_at(ms(1000), &timing).phase.name(), "release");
        assert_eq!(phase_at(ms(1500), &timing).phase.name(), "easeout");
    }

    #[test]
    fn test_mid_phase_progress() {
        let timing = WarpTiming::default();

        let s = phase_at(ms(500), &timing);
        assert_relative_eq!(s.progress, 0.5);
        assert_relative_eq!(s.eased, 0.5);
        assert_relative_eq!(camera_progress(&s), -2.5);
        assert_eq!(node_progress(&s), 0.0);

        let s = phase_at(ms(1250), &timing);
        assert_relative_eq!(node_progress(&s), 0.35);
        assert_relative_eq!(camera_progress(&s), 0.4);
    }

    #[test]
    fn test_progress_continuous_at_boundaries() {
        let timing = WarpTiming::default();
        let eps = Duration::from_nanos(1);

        for boundary in [ms(1000), ms(1500), ms(5500)] {
            let before = phase_at(boundary - eps, &timing);
            let at = phase_at(boundary, &timing);
            assert_relative_eq!(node_progress(&before), node_progress(&at), epsilon = 1e-6);
        }
        // Camera is continuous from release onward (pullback re-bases)
        for boundary in [ms(1500), ms(5500)] {
            let before = phase_at(boundary - eps, &timing);
            let at = phase_at(boundary, &timing);
            assert_relative_eq!(camera_progress(&before), camera_progress(&at), epsilon = 1e-6);
        }
    }

    proptest! {
        #[test]
        fn prop_node_progress_non_decreasing(a in 0u64..8000, b in 0u64..8000) {
            let timing = WarpTiming::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            let p_lo = node_progress(&phase_at(ms(lo), &timing));
            let p_hi = node_progress(&phase_at(ms(hi), &timing));
            prop_assert!(p_lo <= p_hi + 1e-12);
            prop_assert!((0.0..=1.0).contains(&p_lo));
        }

        #[test]
        fn prop_progress_within_unit(
            pullback in 1u64..3000,
            release in 1u64..3000,
            ease_out in 1u64..3000,
            at in 0u64..10_000,
        ) {
            let timing = WarpTiming { pullback_ms: pullback, release_ms: release, ease_out_ms: ease_out };
            let s = phase_at(ms(at), &timing);
            prop_assert!((0.0..=1.0).contains(&s.progress));
            prop_assert_eq!(s.phase == Phase::Complete, ms(at) >= timing.total());
        }
    }

    fn setup(count: usize) -> (NodeSet, RandomShellLayout, Camera, OrbitControls) {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let nodes = NodeSet::generate(count, 50.0, &mut rng);
        let layout = RandomShellLayout::new(50.0, ChaCha8Rng::seed_from_u64(43)).unwrap();
        let camera = Camera::default();
        let controls = OrbitControls::default();
        (nodes, layout, camera, controls)
    }

    #[test]
    fn test_full_warp_settles_on_targets() {
        let (mut nodes, mut layout, mut camera, mut controls) = setup(50);
        let mut warp = WarpController::new(WarpTiming::default());

        nodes.set_anchor(4);
        warp.start(&mut nodes, 4, &mut layout, controls.target, ms(100));
        assert!(warp.is_warping());
        assert_eq!(nodes.warping_count(), 50);

        let targets: Vec<_> = nodes.iter().map(|n| n.target_position).collect();
        assert_eq!(targets[4], Vector3::zeros());

        let mut t = 100;
        let mut finished = false;
        while !finished {
            t += 16;
            let frame = warp.update(&mut nodes, &mut camera, &mut controls, ms(t)).unwrap();
            finished = frame.finished;
        }

        assert!(!warp.is_warping());
        assert_eq!(nodes.warping_count(), 0);
        for (node, target) in nodes.iter().zip(&targets) {
            assert_eq!(node.position, *target);
            assert_eq!(node.original_position, *target);
        }
        // Camera converged on the anchor, which sits at the origin
        assert_relative_eq!(controls.target, Vector3::zeros(), epsilon = 1e-9);
        assert!(warp.update(&mut nodes, &mut camera, &mut controls, ms(t + 16)).is_none());
    }

    #[test]
    fn test_nodes_hold_during_pullback() {
        let (mut nodes, mut layout, mut camera, mut controls) = setup(10);
        let before: Vec<_> = nodes.iter().map(|n| n.position).collect();
        let mut warp = WarpController::new(WarpTiming::default());

        nodes.set_anchor(0);
        warp.start(&mut nodes, 0, &mut layout, controls.target, ms(0));
        warp.update(&mut nodes, &mut camera, &mut controls, ms(800));

        for (node, pos) in nodes.iter().zip(&before) {
            assert_eq!(node.position, *pos);
        }
    }

    #[test]
    fn test_camera_pulls_back_then_follows() {
        let (mut nodes, mut layout, mut camera, mut controls) = setup(10);
        let mut warp = WarpController::new(WarpTiming::default());

        nodes.set_anchor(3);
        let anchor = nodes.get(3).unwrap().position;
        let offset = camera.position - controls.target;

        warp.start(&mut nodes, 3, &mut layout, controls.target, ms(0));
        warp.update(&mut nodes, &mut camera, &mut controls, ms(999));

        // Drawn away from the anchor, nearly five times its distance
        let away = controls.target.dot(&anchor);
        assert!(away < 0.0);
        assert!(controls.target.norm() > 4.0 * anchor.norm());

        // Camera moved rigidly with its target
        assert_relative_eq!(camera.position - controls.target, offset, epsilon = 1e-9);
    }

    #[test]
    fn test_restart_rebases_without_jump() {
        let (mut nodes, mut layout, mut camera, mut controls) = setup(20);
        let mut warp = WarpController::new(WarpTiming::default());

        nodes.set_anchor(1);
        warp.start(&mut nodes, 1, &mut layout, controls.target, ms(0));
        warp.update(&mut nodes, &mut camera, &mut controls, ms(2000));
        let mid: Vec<_> = nodes.iter().map(|n| n.position).collect();

        nodes.set_anchor(2);
        warp.start(&mut nodes, 2, &mut layout, controls.target, ms(2000));
        assert_eq!(nodes.anchor_count(), 1);

        warp.update(&mut nodes, &mut camera, &mut controls, ms(2016));
        for (node, pos) in nodes.iter().zip(&mid) {
            assert_eq!(node.position, *pos);
            assert_eq!(node.original_position, *pos);
        }
    }
}
