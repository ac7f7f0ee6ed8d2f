//! SimWorld - The simulation harness container.

use crate::context::SimContext;
use crate::exporter::FrameRecorder;
use crate::input::ScriptedInput;
use crate::oracle::Oracle;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use warpfield_core::{AppConfig, WarpApp, WarpError, WarpFrame};
use warpfield_env::{HostEvent, WarpContext};

/// The application as the simulator runs it.
pub type SimApp = WarpApp<SimContext, ScriptedInput, FrameRecorder>;

/// Configuration for a simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Application settings; `app.fps` is the tick rate
    pub app: AppConfig,

    /// Maximum simulated time per scenario in seconds
    pub max_duration_secs: f64,

    /// Keep one recorded frame in this many
    pub export_interval: u64,

    /// Record node positions in exported frames
    pub export_nodes: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            app: AppConfig::default(),
            max_duration_secs: 30.0,
            export_interval: 10,
            export_nodes: false,
        }
    }
}

/// The SimWorld - container for the entire simulation.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,

    /// Shared simulation context (virtual clock)
    pub context: Arc<SimContext>,

    /// Invariant checker fed after every tick
    pub oracle: Oracle,

    /// Handle for scripting host input
    input: ScriptedInput,

    app: SimApp,

    /// Current tick count
    tick_count: u64,

    /// Clicks sent by the harness
    clicks_sent: u64,
}

impl SimWorld {
    /// Creates a new SimWorld with the given configuration.
    pub fn new(config: SimConfig) -> Result<Self, WarpError> {
        Self::with_recorder(config.clone(), FrameRecorder::new(config.export_interval))
    }

    /// Creates a SimWorld around a preconfigured recorder.
    pub fn with_recorder(config: SimConfig, recorder: FrameRecorder) -> Result<Self, WarpError> {
        let recorder = if config.export_nodes {
            recorder.with_nodes()
        } else {
            recorder
        };

        let context = SimContext::shared(config.seed);
        let input = ScriptedInput::new(Arc::clone(&context));
        let app = WarpApp::new(Arc::clone(&context), input.clone(), recorder, config.app.clone())?;

        Ok(Self {
            config,
            context,
            oracle: Oracle::new(),
            input,
            app,
            tick_count: 0,
            clicks_sent: 0,
        })
    }

    /// Time advanced per tick.
    pub fn tick_interval(&self) -> Duration {
        self.config.app.frame_interval()
    }

    /// Advances simulation by one tick: move the clock, run one frame,
    /// check invariants.
    pub fn tick(&mut self) -> Result<Option<WarpFrame>, WarpError> {
        self.context.advance_time(self.tick_interval());
        let frame = self.app.frame()?;
        self.oracle.observe(&self.app, frame);
        self.tick_count += 1;
        Ok(frame)
    }

    /// Ticks for `duration` of virtual time.
    pub fn run_for(&mut self, duration: Duration) -> Result<(), WarpError> {
        let ticks = (duration.as_secs_f64() / self.tick_interval().as_secs_f64()).ceil() as u64;
        for _ in 0..ticks {
            self.tick()?;
        }
        Ok(())
    }

    /// Ticks until no warp is running or `limit` virtual time has passed.
    ///
    /// Returns whether the field settled.
    pub fn run_until_settled(&mut self, limit: Duration) -> Result<bool, WarpError> {
        let deadline = self.context.now() + limit;
        // A click injected this tick starts its warp on the next one
        self.tick()?;
        while self.app.is_warping() {
            if self.context.now() >= deadline {
                return Ok(false);
            }
            self.tick()?;
        }
        Ok(true)
    }

    /// Ticks through one full warp, with a few ticks of slack.
    pub fn settle(&mut self) -> Result<bool, WarpError> {
        let limit = self.config.app.timing.total() + self.tick_interval() * 3;
        self.run_until_settled(limit)
    }

    /// First node at or after `from` that is on screen.
    pub fn visible_node(&self, from: usize) -> Option<usize> {
        (from..self.app.nodes().len()).find(|&i| self.app.screen_position(i).is_some())
    }

    /// Clicks on the pixel where node `index` is drawn.
    ///
    /// Returns the node the click will pick, which may sit in front of
    /// `index`, or `None` if `index` is off screen.
    pub fn click_node(&mut self, index: usize) -> Option<usize> {
        let (x, y) = self.app.screen_position(index)?;
        let picked = self.app.pick(x, y);
        self.send(HostEvent::Click { x, y });
        self.clicks_sent += 1;
        picked
    }

    /// Moves the pointer onto node `index`. Returns the node under it.
    pub fn hover_node(&mut self, index: usize) -> Option<usize> {
        let (x, y) = self.app.screen_position(index)?;
        let picked = self.app.pick(x, y);
        self.send(HostEvent::PointerMove { x, y });
        picked
    }

    /// Delivers `event` on the next tick.
    pub fn send(&self, event: HostEvent) {
        self.input.schedule(self.context.now(), event);
    }

    /// Script handle for timed events.
    pub fn input(&self) -> &ScriptedInput {
        &self.input
    }

    pub fn app(&self) -> &SimApp {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut SimApp {
        &mut self.app
    }

    /// Returns the current simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.context.now().as_secs_f64()
    }

    /// Returns the current tick count.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn clicks_sent(&self) -> u64 {
        self.clicks_sent
    }

    /// Recorder with the frames captured so far.
    pub fn recorder_mut(&mut self) -> &mut FrameRecorder {
        self.app.renderer_mut()
    }
}
