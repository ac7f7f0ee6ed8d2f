//! Warpfield Deterministic Simulation Harness
//!
//! Runs the full Warpfield application on a virtual clock with scripted
//! input, so warps, clicks, and resizes replay identically for a seed.
//!
//! # Core Principle
//!
//! All sources of non-determinism are intercepted and controlled:
//! - **Time**: virtual clock advanced one frame per tick
//! - **Input**: host events scheduled at virtual times
//! - **Randomness**: all entropy derived from a single 64-bit seed
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SimWorld                            │
//! │  ┌──────────────┐   poll   ┌──────────────────────────────┐ │
//! │  │ScriptedInput │─────────►│ WarpApp                      │ │
//! │  └──────────────┘          │  nodes · warp · camera       │ │
//! │         ▲                  └──────────────┬───────────────┘ │
//! │    scenarios                      frame   │                 │
//! │         │                   ┌─────────────▼──────────────┐  │
//! │  ┌──────┴───────┐           │ FrameRecorder (→ Rerun)    │  │
//! │  │SimContext    │           └────────────────────────────┘  │
//! │  │(virtual clock)│   observe ┌────────────────────────────┐  │
//! │  └──────────────┘  ◄────────│ Oracle (invariants)        │  │
//! │                             └────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use warpfield_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let runner = ScenarioRunner::new(42, 500);
//! let result = runner.run(ScenarioId::SingleWarp).await;
//! assert!(result.passed);
//! ```

mod context;
mod exporter;
mod input;
mod oracle;
mod runner;
pub mod scenarios;
mod world;

pub use context::SimContext;
pub use exporter::{FrameRecorder, Point, SimExport, SimFrame, WarpSample};
pub use input::ScriptedInput;
pub use oracle::{Oracle, Violation};
pub use runner::{ScenarioError, ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use world::{SimApp, SimConfig, SimWorld};
