//! Invariant oracle for simulation.
//!
//! The Oracle watches every frame of a run and records violations of the
//! properties the field must always hold:
//! - at most one anchor, and exactly one once any node was anchored
//! - node progress never decreases within a warp, phases never go back
//! - the camera moves rigidly with its target unless the user orbits
//! - a finished warp leaves every node on its target and the anchor at
//!   the origin

use nalgebra::Vector3;
use serde::Serialize;
use std::time::Duration;
use warpfield_core::{Phase, Renderer, WarpApp, WarpFrame};
use warpfield_env::{HostEvents, WarpContext};

/// Allowed drift of the camera offset between frames.
const RIGID_TOLERANCE: f64 = 1e-6;

/// A broken invariant, with when it happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub time_sec: f64,
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t={:.3}s: {}", self.time_sec, self.message)
    }
}

/// Progress of the warp currently being watched.
#[derive(Debug, Clone, Copy)]
struct WatchedWarp {
    started_at: Duration,
    node_progress: f64,
    phase: Phase,
}

/// Frame-by-frame invariant checker.
#[derive(Debug, Default)]
pub struct Oracle {
    violations: Vec<Violation>,
    current: Option<WatchedWarp>,
    ever_anchored: bool,
    last_offset: Option<Vector3<f64>>,
    warps_started: u64,
    warps_completed: u64,
    frames_observed: u64,
}

fn phase_rank(phase: Phase) -> u8 {
    match phase {
        Phase::Pullback => 0,
        Phase::Release => 1,
        Phase::EaseOut => 2,
        Phase::Complete => 3,
    }
}

impl Oracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks the app state after a frame.
    pub fn observe<Ctx, In, R>(&mut self, app: &WarpApp<Ctx, In, R>, frame: Option<WarpFrame>)
    where
        Ctx: WarpContext,
        In: HostEvents,
        R: Renderer,
    {
        let now = app.context().now();
        self.frames_observed += 1;

        self.check_anchor(app, now);
        self.check_progress(app, frame, now);
        self.check_camera(app, now);

        if frame.is_some_and(|f| f.finished) {
            self.check_settled(app, now);
        }
    }

    fn check_anchor<Ctx, In, R>(&mut self, app: &WarpApp<Ctx, In, R>, now: Duration)
    where
        Ctx: WarpContext,
        In: HostEvents,
        R: Renderer,
    {
        let anchors = app.nodes().anchor_count();
        self.ever_anchored |= anchors > 0;
        if anchors > 1 || (self.ever_anchored && anchors != 1) {
            self.fail(now, format!("{} anchors in the field", anchors));
        }
    }

    fn check_progress<Ctx, In, R>(
        &mut self,
        app: &WarpApp<Ctx, In, R>,
        frame: Option<WarpFrame>,
        now: Duration,
    ) where
        Ctx: WarpContext,
        In: HostEvents,
        R: Renderer,
    {
        let Some(frame) = frame else {
            self.current = None;
            return;
        };

        let started_at = app.warp().session().map(|s| s.started_at);
        let same_warp = match (self.current, started_at) {
            (Some(watched), Some(started)) => watched.started_at == started,
            // The finishing frame has already dropped its session
            (Some(_), None) => frame.finished,
            _ => false,
        };

        if let (true, Some(watched)) = (same_warp, self.current) {
            if frame.node_progress < watched.node_progress {
                self.fail(
                    now,
                    format!(
                        "node progress went back from {:.6} to {:.6}",
                        watched.node_progress, frame.node_progress
                    ),
                );
            }
            if phase_rank(frame.sample.phase) < phase_rank(watched.phase) {
                self.fail(
                    now,
                    format!("phase went back from {} to {}", watched.phase, frame.sample.phase),
                );
            }
        } else {
            self.warps_started += 1;
        }

        if frame.finished {
            self.warps_completed += 1;
            self.current = None;
        } else if let Some(started_at) = started_at {
            self.current = Some(WatchedWarp {
                started_at,
                node_progress: frame.node_progress,
                phase: frame.sample.phase,
            });
        }
    }

    fn check_camera<Ctx, In, R>(&mut self, app: &WarpApp<Ctx, In, R>, now: Duration)
    where
        Ctx: WarpContext,
        In: HostEvents,
        R: Renderer,
    {
        let offset = app.camera().position - app.controls().target;
        // Orbiting changes the offset on purpose
        if app.controls().has_pending_motion() {
            self.last_offset = None;
            return;
        }
        if let Some(last) = self.last_offset {
            let drift = (offset - last).norm();
            if drift > RIGID_TOLERANCE {
                self.fail(now, format!("camera drifted {:.3e} from its target", drift));
            }
        }
        self.last_offset = Some(offset);
    }

    fn check_settled<Ctx, In, R>(&mut self, app: &WarpApp<Ctx, In, R>, now: Duration)
    where
        Ctx: WarpContext,
        In: HostEvents,
        R: Renderer,
    {
        let nodes = app.nodes();
        if let Some(node) = nodes.iter().find(|n| n.position != n.target_position) {
            self.fail(now, format!("{} finished off its target", node.id));
        }
        if nodes.warping_count() > 0 {
            self.fail(now, format!("{} nodes still warping", nodes.warping_count()));
        }
        if let Some(anchor) = nodes.anchor() {
            if anchor.position != Vector3::zeros() {
                self.fail(now, format!("anchor {} settled off the origin", anchor.id));
            }
        }
        if app.is_warping() {
            self.fail(now, "warp still running after its final frame".to_string());
        }
    }

    fn fail(&mut self, now: Duration, message: String) {
        tracing::warn!("Invariant violated at {:?}: {}", now, message);
        self.violations.push(Violation {
            time_sec: now.as_secs_f64(),
            message,
        });
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn warps_started(&self) -> u64 {
        self.warps_started
    }

    pub fn warps_completed(&self) -> u64 {
        self.warps_completed
    }

    pub fn frames_observed(&self) -> u64 {
        self.frames_observed
    }
}
