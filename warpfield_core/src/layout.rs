//! Target layouts assigned at the start of a warp.
//!
//! The anchor always goes to the origin. [`RandomShellLayout`] scatters the
//! rest on random spherical shells around it; it stands in until an
//! embedding-driven layout is wired to this trait.

use crate::error::WarpError;
use crate::node::NodeSet;

use nalgebra::Vector3;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Uniform};
use std::f64::consts::PI;

/// Minimum distance of a non-anchor node from the anchor after a warp.
pub const MIN_SHELL_RADIUS: f64 = 2.0;

/// Assigns warp targets to every node.
pub trait TargetLayout {
    /// Sets `target_position` on every node and flags them all warping.
    fn assign_targets(&mut self, nodes: &mut NodeSet, anchor: usize);
}

/// Uniform shell radius in `[2, space)`, uniform azimuth and elevation.
pub struct RandomShellLayout {
    radius: Uniform<f64>,
    azimuth: Uniform<f64>,
    elevation: Uniform<f64>,
    rng: ChaCha8Rng,
}

impl RandomShellLayout {
    /// Creates a layout for a field of side `space`.
    ///
    /// `space` must exceed [`MIN_SHELL_RADIUS`].
    pub fn new(space: f64, rng: ChaCha8Rng) -> Result<Self, WarpError> {
        if !(space > MIN_SHELL_RADIUS) {
            return Err(WarpError::InvalidConfig(format!(
                "space must exceed {}, got {}",
                MIN_SHELL_RADIUS, space
            )));
        }
        Ok(Self {
            radius: Uniform::new(MIN_SHELL_RADIUS, space),
            azimuth: Uniform::new(0.0, 2.0 * PI),
            elevation: Uniform::new(-PI / 2.0, PI / 2.0),
            rng,
        })
    }

    fn sample_point(&mut self) -> Vector3<f64> {
        let r = self.radius.sample(&mut self.rng);
        let theta = self.azimuth.sample(&mut self.rng);
        let phi = self.elevation.sample(&mut self.rng);

        Vector3::new(
            r * phi.cos() * theta.cos(),
            r * phi.sin(),
            r * phi.cos() * theta.sin(),
        )
    }
}

impl TargetLayout for RandomShellLayout {
    fn assign_targets(&mut self, nodes: &mut NodeSet, anchor: usize) {
        for (i, node) in nodes.iter_mut().enumerate() {
            node.target_position = if i == anchor {
                Vector3::zeros()
            } else {
                self.sample_point()
            };
            node.is_warping = true;
        }
    }
}
