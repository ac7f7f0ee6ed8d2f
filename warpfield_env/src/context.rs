//! Core environment context trait for Warpfield.

use async_trait::async_trait;
use rand_chacha::ChaCha8Rng;
use std::time::Duration;

/// The central interface for environment interaction.
///
/// This trait abstracts the host so the warp controller and render loop can
/// run in real time (tokio) or under a virtual clock (simulation).
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `Instant`, `tokio::time`, OS entropy
/// - **Simulation**: `SimContext` - manual virtual clock, `ChaCha8Rng(seed)`
///
/// # Determinism
///
/// Warp timing is a pure function of `now()`, and every random layout is
/// drawn from `derive_rng()`. A simulation with the same seed and the same
/// scripted input produces the same frames.
#[async_trait]
pub trait WarpContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// Warp sessions record their start against this clock and derive the
    /// active phase from the difference.
    fn now(&self) -> Duration;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);

    /// Derives a random stream from the context seed.
    ///
    /// `stream` separates independent consumers (node generation, target
    /// layout, starfield) so that adding draws to one never shifts another.
    fn derive_rng(&self, stream: u64) -> ChaCha8Rng;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}
