//! Application runtime - owns the field and drives it frame by frame.
//!
//! This module is the integration layer between the pure pieces (nodes,
//! warp engine, camera, picking) and the environment abstraction
//! (`WarpContext`, `HostEvents`) plus a [`Renderer`].
//!
//! # Frame Order
//!
//! ```text
//! ┌──────────────────────────── WarpApp::frame ────────────────────────────┐
//! │ 1. poll host events   click → pick → anchor → warp start               │
//! │                       move  → hover style + cursor                     │
//! │                       drag/wheel → orbit controls, resize → aspect     │
//! │ 2. orbit controls     apply pending rotation / dolly                   │
//! │ 3. warp engine        phase from elapsed time, move nodes + camera     │
//! │ 4. mirror             node positions → scene handles                   │
//! │ 5. render             Renderer::render(FrameView)                      │
//! └────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use warpfield_core::{AppConfig, NullRenderer, WarpApp};
//! use warpfield_env::{channel_input, TokioContext};
//!
//! let (events, input) = channel_input();
//! let mut app = WarpApp::new(TokioContext::shared(), input, NullRenderer, AppConfig::default())?;
//! app.run(None).await?;
//! ```

use crate::camera::{Camera, OrbitControls};
use crate::error::WarpError;
use crate::layout::{RandomShellLayout, TargetLayout};
use crate::node::NodeSet;
use crate::picking::pick_nearest;
use crate::scene::{Cursor, FrameView, NodeStyle, Renderer, Scene};
use crate::warp::{WarpController, WarpFrame, WarpTiming};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use warpfield_env::{HostEvent, HostEvents, Viewport, WarpContext};

/// RNG stream for the initial node batch.
const STREAM_NODES: u64 = 1;

/// RNG stream for warp target layouts.
const STREAM_LAYOUT: u64 = 2;

/// RNG stream for the starfield.
const STREAM_STARS: u64 = 3;

/// Configuration for a Warpfield application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Number of nodes created at startup (default: 500)
    pub node_count: usize,

    /// Side of the cube nodes are scattered in (default: 50)
    pub space: f64,

    /// Pick radius and drawn size of a node (default: 0.15)
    pub node_radius: f64,

    /// Background stars (default: 2000)
    pub star_count: usize,

    /// Frame rate of the run loop (default: 60)
    pub fps: u32,

    /// Initial surface size
    pub viewport: Viewport,

    /// Initial eye position (default: 0, 0, 10)
    pub camera_position: [f64; 3],

    /// Orbit damping (default: on, 0.05)
    pub enable_damping: bool,
    pub damping_factor: f64,

    pub timing: WarpTiming,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_count: 500,
            space: 50.0,
            node_radius: 0.15,
            star_count: 2000,
            fps: 60,
            viewport: Viewport::default(),
            camera_position: [0.0, 0.0, 10.0],
            enable_damping: true,
            damping_factor: 0.05,
            timing: WarpTiming::default(),
        }
    }
}

impl AppConfig {
    fn validate(&self) -> Result<(), WarpError> {
        if self.fps == 0 {
            return Err(WarpError::InvalidConfig("fps must be positive".to_string()));
        }
        if !(self.node_radius > 0.0) {
            return Err(WarpError::InvalidConfig(format!(
                "node_radius must be positive, got {}",
                self.node_radius
            )));
        }
        Viewport::new(self.viewport.width, self.viewport.height)?;
        Ok(())
    }

    /// Time between frames of the run loop.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps as f64)
    }
}

/// The Warpfield application state.
///
/// Generic over the context, input, and renderer so the same code runs in
/// real time or under the simulation harness.
pub struct WarpApp<Ctx, In, R>
where
    Ctx: WarpContext,
    In: HostEvents,
    R: Renderer,
{
    context: Arc<Ctx>,
    input: In,
    renderer: R,
    config: AppConfig,

    nodes: NodeSet,
    scene: Scene,
    camera: Camera,
    controls: OrbitControls,
    warp: WarpController,
    layout: Box<dyn TargetLayout + Send>,

    hovered: Option<usize>,
    frame_count: u64,
    last_warp: Option<WarpFrame>,
}

impl<Ctx, In, R> WarpApp<Ctx, In, R>
where
    Ctx: WarpContext,
    In: HostEvents,
    R: Renderer,
{
    /// Builds the scene: nodes, starfield, camera, controls.
    pub fn new(context: Arc<Ctx>, input: In, renderer: R, config: AppConfig) -> Result<Self, WarpError> {
        config.validate()?;

        let nodes = NodeSet::generate(
            config.node_count,
            config.space,
            &mut context.derive_rng(STREAM_NODES),
        );
        let scene = Scene::new(&nodes, config.node_radius, config.viewport)
            .with_starfield(config.star_count, &mut context.derive_rng(STREAM_STARS));
        let layout = RandomShellLayout::new(config.space, context.derive_rng(STREAM_LAYOUT))?;

        let camera = Camera {
            position: Vector3::from(config.camera_position),
            aspect: config.viewport.aspect(),
            ..Camera::default()
        };
        let mut controls = OrbitControls::default();
        controls.enable_damping = config.enable_damping;
        controls.damping_factor = config.damping_factor;

        info!(
            "Field created: {} nodes in a {}-unit cube (seed={})",
            nodes.len(),
            config.space,
            context.seed()
        );

        Ok(Self {
            warp: WarpController::new(config.timing),
            context,
            input,
            renderer,
            config,
            nodes,
            scene,
            camera,
            controls,
            layout: Box::new(layout),
            hovered: None,
            frame_count: 0,
            last_warp: None,
        })
    }

    /// Replaces the target layout used by subsequent warps.
    pub fn with_layout(mut self, layout: Box<dyn TargetLayout + Send>) -> Self {
        self.layout = layout;
        self
    }

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------

    /// Dispatches one host event.
    pub fn handle_event(&mut self, event: HostEvent) -> Result<(), WarpError> {
        match event {
            HostEvent::Click { x, y } => {
                self.on_click(x, y)?;
            }
            HostEvent::PointerMove { x, y } => self.on_pointer_move(x, y),
            HostEvent::PointerDrag { dx, dy } => {
                let height = self.scene.viewport().height as f64;
                self.controls.rotate(dx, dy, height);
            }
            HostEvent::Wheel { delta } => self.controls.dolly(delta),
            HostEvent::Resize { width, height } => self.on_resize(width, height)?,
        }
        Ok(())
    }

    /// Anchors the node under the pointer.
    ///
    /// Ignored while a warp is running. Returns the anchored index.
    pub fn on_click(&mut self, x: f64, y: f64) -> Result<Option<usize>, WarpError> {
        if self.warp.is_warping() {
            debug!("Click ignored during warp");
            return Ok(None);
        }
        match self.pick(x, y) {
            Some(index) => {
                self.set_anchor(index)?;
                Ok(Some(index))
            }
            None => Ok(None),
        }
    }

    /// Highlights the node under the pointer.
    pub fn on_pointer_move(&mut self, x: f64, y: f64) {
        let hit = self.pick(x, y);

        for (i, node) in self.nodes.iter().enumerate() {
            if !node.is_anchor {
                self.scene.set_style(i, NodeStyle::Default);
            }
        }

        match hit {
            Some(index) => {
                if self.nodes.get(index).is_some_and(|n| !n.is_anchor) {
                    self.scene.set_style(index, NodeStyle::Hover);
                }
                self.scene.set_cursor(Cursor::Pointer);
            }
            None => self.scene.set_cursor(Cursor::Default),
        }
        self.hovered = hit;
    }

    /// Adapts camera and picking to a new surface size.
    pub fn on_resize(&mut self, width: u32, height: u32) -> Result<(), WarpError> {
        let viewport = Viewport::new(width, height)?;
        self.camera.set_aspect(viewport.aspect());
        self.scene.set_viewport(viewport);
        debug!("Viewport resized to {}x{}", width, height);
        Ok(())
    }

    /// Index of the nearest node under a pixel.
    pub fn pick(&self, x: f64, y: f64) -> Option<usize> {
        let (ndc_x, ndc_y) = self.scene.viewport().to_ndc(x, y);
        let ray = self.camera.ray_through(ndc_x, ndc_y, &self.controls.target);
        let centers = self.scene.handles().iter().map(|h| &h.position);
        pick_nearest(&ray, centers, self.scene.node_radius()).map(|hit| hit.index)
    }

    /// Pixel position of a node, if it is in front of the camera and on
    /// the surface.
    pub fn screen_position(&self, index: usize) -> Option<(f64, f64)> {
        let handle = self.scene.handle(index)?;
        let (ndc_x, ndc_y) = self.camera.project(&handle.position, &self.controls.target)?;
        if ndc_x.abs() > 1.0 || ndc_y.abs() > 1.0 {
            return None;
        }
        let viewport = self.scene.viewport();
        Some((
            (ndc_x + 1.0) / 2.0 * viewport.width as f64,
            (1.0 - ndc_y) / 2.0 * viewport.height as f64,
        ))
    }

    // ------------------------------------------------------------------
    // Anchor & warp
    // ------------------------------------------------------------------

    /// Makes `index` the anchor and starts a warp toward it.
    ///
    /// Unlike clicks, this is not blocked by a running warp; the running
    /// warp is re-based onto current positions.
    pub fn set_anchor(&mut self, index: usize) -> Result<(), WarpError> {
        if index >= self.nodes.len() {
            return Err(WarpError::UnknownNode {
                index,
                len: self.nodes.len(),
            });
        }

        if let Some(previous) = self.nodes.set_anchor(index) {
            self.scene.set_style(previous, NodeStyle::Default);
        }
        self.scene.set_style(index, NodeStyle::Anchor);

        if let Some(node) = self.nodes.get(index) {
            info!(
                "Node {} set as anchor at position: ({:.2}, {:.2}, {:.2})",
                node.id, node.position.x, node.position.y, node.position.z
            );
        }

        let now = self.context.now();
        self.warp.start(
            &mut self.nodes,
            index,
            self.layout.as_mut(),
            self.controls.target,
            now,
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Frame loop
    // ------------------------------------------------------------------

    /// Runs one frame: input, controls, warp, render.
    pub fn frame(&mut self) -> Result<Option<WarpFrame>, WarpError> {
        for event in self.input.poll() {
            if let Err(e) = self.handle_event(event) {
                warn!("Dropped host event {:?}: {}", event, e);
            }
        }

        self.controls.update(&mut self.camera);

        let now = self.context.now();
        let warp_frame = self
            .warp
            .update(&mut self.nodes, &mut self.camera, &mut self.controls, now);

        if warp_frame.is_some() {
            for (i, node) in self.nodes.iter().enumerate() {
                self.scene.sync_node(i, node);
            }
        }

        self.renderer.render(&FrameView {
            frame: self.frame_count,
            time: now,
            scene: &self.scene,
            camera: &self.camera,
            look_at: self.controls.target,
            warp: warp_frame,
        })?;

        self.frame_count += 1;
        self.last_warp = warp_frame;
        Ok(warp_frame)
    }

    /// Runs frames paced by the context clock.
    ///
    /// Stops after `max_frames` frames, or never when `None`; drop the future
    /// to stop early.
    pub async fn run(&mut self, max_frames: Option<u64>) -> Result<(), WarpError> {
        let interval = self.config.frame_interval();
        let mut ran = 0u64;
        while max_frames.map_or(true, |max| ran < max) {
            self.frame()?;
            ran += 1;
            self.context.sleep(interval).await;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn context(&self) -> &Arc<Ctx> {
        &self.context
    }

    pub fn nodes(&self) -> &NodeSet {
        &self.nodes
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn controls(&self) -> &OrbitControls {
        &self.controls
    }

    pub fn warp(&self) -> &WarpController {
        &self.warp
    }

    pub fn is_warping(&self) -> bool {
        self.warp.is_warping()
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Warp state reported by the most recent frame.
    pub fn last_warp(&self) -> Option<WarpFrame> {
        self.last_warp
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Consumes the app, returning its renderer.
    pub fn into_renderer(self) -> R {
        self.renderer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::NullRenderer;
    use crate::warp::Phase;
    use approx::assert_relative_eq;
    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::sync::Mutex;
    use warpfield_env::{channel_input, ChannelInput, EventSender};

    /// Clock advanced only by `sleep`.
    struct ManualClock {
        now: Mutex<Duration>,
    }

    impl ManualClock {
        fn advance(&self, d: Duration) {
            *self.now.lock().unwrap() += d;
        }
    }

    #[async_trait]
    impl WarpContext for ManualClock {
        fn now(&self) -> Duration {
            *self.now.lock().unwrap()
        }

        async fn sleep(&self, duration: Duration) {
            self.advance(duration);
        }

        fn derive_rng(&self, stream: u64) -> ChaCha8Rng {
            ChaCha8Rng::seed_from_u64(7 ^ stream.wrapping_mul(0x9e3779b97f4a7c15))
        }

        fn seed(&self) -> u64 {
            7
        }
    }

    type TestApp = WarpApp<ManualClock, ChannelInput, NullRenderer>;

    fn app(node_count: usize) -> (TestApp, EventSender) {
        let clock = Arc::new(ManualClock {
            now: Mutex::new(Duration::ZERO),
        });
        let (tx, input) = channel_input();
        let config = AppConfig {
            node_count,
            star_count: 10,
            ..Default::default()
        };
        (WarpApp::new(clock, input, NullRenderer, config).unwrap(), tx)
    }

    fn visible_node(app: &TestApp) -> (usize, (f64, f64)) {
        (0..app.nodes().len())
            .find_map(|i| app.screen_position(i).map(|p| (i, p)))
            .expect("some node in view")
    }

    fn step(app: &mut TestApp, ms: u64) -> Option<WarpFrame> {
        app.context().advance(Duration::from_millis(ms));
        app.frame().unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let clock = Arc::new(ManualClock {
            now: Mutex::new(Duration::ZERO),
        });
        let (_tx, input) = channel_input();
        let config = AppConfig {
            fps: 0,
            ..Default::default()
        };
        assert!(matches!(
            WarpApp::new(clock, input, NullRenderer, config),
            Err(WarpError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_config_from_partial_json() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "node_count": 12, "timing": { "release_ms": 250 } }"#).unwrap();
        assert_eq!(config.node_count, 12);
        assert_eq!(config.star_count, 2000);
        assert_eq!(config.timing.release_ms, 250);
        assert_eq!(config.timing.pullback_ms, 1000);
    }

    #[test]
    fn test_click_anchors_and_starts_warp() {
        let (mut app, tx) = app(40);
        let (_, (x, y)) = visible_node(&app);
        let expected = app.pick(x, y).unwrap();

        tx.send(HostEvent::Click { x, y }).unwrap();
        app.frame().unwrap();

        assert_eq!(app.nodes().anchor_index(), Some(expected));
        assert_eq!(app.scene().handle(expected).unwrap().style, NodeStyle::Anchor);
        assert!(app.is_warping());
    }

    #[test]
    fn test_click_on_empty_space_does_nothing() {
        let (mut app, _tx) = app(0);
        assert_eq!(app.on_click(10.0, 10.0).unwrap(), None);
        assert!(!app.is_warping());
    }

    #[test]
    fn test_clicks_ignored_during_warp() {
        let (mut app, _tx) = app(40);
        app.set_anchor(0).unwrap();
        step(&mut app, 100);

        let (_, (x, y)) = visible_node(&app);
        assert_eq!(app.on_click(x, y).unwrap(), None);
        assert_eq!(app.nodes().anchor_index(), Some(0));
    }

    #[test]
    fn test_hover_styles_and_cursor() {
        let (mut app, _tx) = app(40);
        let (_, (x, y)) = visible_node(&app);
        let hit = app.pick(x, y).unwrap();

        app.on_pointer_move(x, y);
        assert_eq!(app.hovered(), Some(hit));
        assert_eq!(app.scene().handle(hit).unwrap().style, NodeStyle::Hover);
        assert_eq!(app.scene().cursor(), Cursor::Pointer);

        // Anchor keeps its style under the pointer
        app.set_anchor(hit).unwrap();
        app.on_pointer_move(x, y);
        assert_eq!(app.scene().handle(hit).unwrap().style, NodeStyle::Anchor);
        assert_eq!(app.scene().cursor(), Cursor::Pointer);

        app.on_pointer_move(-5000.0, -5000.0);
        assert_eq!(app.hovered(), None);
        assert_eq!(app.scene().cursor(), Cursor::Default);
        let hovered = app
            .scene()
            .handles()
            .iter()
            .filter(|h| h.style == NodeStyle::Hover)
            .count();
        assert_eq!(hovered, 0);
    }

    #[test]
    fn test_resize_updates_aspect() {
        let (mut app, tx) = app(5);
        tx.send(HostEvent::Resize { width: 1000, height: 500 }).unwrap();
        app.frame().unwrap();

        assert_relative_eq!(app.camera().aspect, 2.0);
        assert_eq!(app.scene().viewport(), Viewport::new(1000, 500).unwrap());
    }

    #[test]
    fn test_zero_resize_is_dropped() {
        let (mut app, tx) = app(5);
        tx.send(HostEvent::Resize { width: 0, height: 500 }).unwrap();
        app.frame().unwrap();
        assert_eq!(app.scene().viewport(), Viewport::default());
    }

    #[test]
    fn test_full_warp_through_frames() {
        let (mut app, _tx) = app(60);
        app.set_anchor(9).unwrap();
        let targets: Vec<_> = app.nodes().iter().map(|n| n.target_position).collect();
        let offset = app.camera().position - app.controls().target;

        let mut phases = Vec::new();
        while app.is_warping() {
            let frame = step(&mut app, 16).unwrap();
            if phases.last() != Some(&frame.sample.phase) {
                phases.push(frame.sample.phase);
            }
            assert_eq!(app.nodes().anchor_count(), 1);
            assert_relative_eq!(app.camera().position - app.controls().target, offset, epsilon = 1e-9);
        }

        assert_eq!(
            phases,
            vec![Phase::Pullback, Phase::Release, Phase::EaseOut, Phase::Complete]
        );
        for (i, node) in app.nodes().iter().enumerate() {
            assert_eq!(node.position, targets[i]);
            assert!(!node.is_warping);
            assert_eq!(app.scene().handle(i).unwrap().position, targets[i]);
        }
        assert_eq!(app.last_warp().map(|w| w.finished), Some(true));
    }

    #[test]
    fn test_programmatic_reanchor_keeps_single_anchor() {
        let (mut app, _tx) = app(30);
        app.set_anchor(1).unwrap();
        for _ in 0..50 {
            step(&mut app, 40);
        }
        app.set_anchor(2).unwrap();
        assert_eq!(app.nodes().anchor_count(), 1);
        assert_eq!(app.scene().handle(1).unwrap().style, NodeStyle::Default);

        while app.is_warping() {
            step(&mut app, 50);
            assert_eq!(app.nodes().anchor_count(), 1);
        }
        assert_eq!(app.nodes().anchor_index(), Some(2));
        assert_eq!(app.nodes().get(2).unwrap().position, Vector3::zeros());
    }

    #[test]
    fn test_unknown_anchor_index() {
        let (mut app, _tx) = app(3);
        assert!(matches!(
            app.set_anchor(3),
            Err(WarpError::UnknownNode { index: 3, len: 3 })
        ));
    }

    #[tokio::test]
    async fn test_run_paces_frames() {
        let (mut app, _tx) = app(3);
        app.run(Some(30)).await.unwrap();

        assert_eq!(app.frame_count(), 30);
        let expected = app.config().frame_interval() * 30;
        assert_eq!(app.context().now(), expected);
    }
}
