//! Perspective camera and orbit controls.
//!
//! The camera always looks at the orbit controls' target. The warp engine
//! moves that target; the controls keep the camera orbiting around it.

use crate::picking::Ray;

use nalgebra::{Isometry3, Matrix4, Perspective3, Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Polar angle margin that keeps the camera off the vertical axis.
const POLAR_EPSILON: f64 = 1e-6;

/// Closest the eye may get to the orbit target.
pub const MIN_ORBIT_RADIUS: f64 = 1e-3;

/// Perspective camera.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camera {
    /// Eye position in world space
    pub position: Vector3<f64>,

    /// World up direction
    pub up: Vector3<f64>,

    /// Vertical field of view in degrees
    pub fov_y_deg: f64,

    /// Width / height of the surface
    pub aspect: f64,

    pub near: f64,
    pub far: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vector3::new(0.0, 0.0, 10.0),
            up: Vector3::y(),
            fov_y_deg: 75.0,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

/// Orthonormal view frame of the camera.
struct ViewBasis {
    forward: Vector3<f64>,
    right: Vector3<f64>,
    up: Vector3<f64>,
}

impl Camera {
    /// Updates the aspect ratio after a resize.
    pub fn set_aspect(&mut self, aspect: f64) {
        self.aspect = aspect;
    }

    pub fn projection(&self) -> Perspective3<f64> {
        Perspective3::new(self.aspect, self.fov_y_deg.to_radians(), self.near, self.far)
    }

    /// World-to-view transform looking at `target`.
    pub fn view_matrix(&self, target: &Vector3<f64>) -> Matrix4<f64> {
        Isometry3::look_at_rh(
            &Point3::from(self.position),
            &Point3::from(*target),
            &self.up,
        )
        .to_homogeneous()
    }

    fn basis(&self, target: &Vector3<f64>) -> ViewBasis {
        let forward = (target - self.position).normalize();
        let mut right = forward.cross(&self.up);
        if right.norm() < 1e-12 {
            // Looking straight along `up`; any horizontal axis will do
            right = Vector3::x();
        }
        let right = right.normalize();
        let up = right.cross(&forward);
        ViewBasis { forward, right, up }
    }

    fn half_fov_tan(&self) -> f64 {
        (self.fov_y_deg.to_radians() / 2.0).tan()
    }

    /// Ray from the eye through a point in normalized device coordinates.
    pub fn ray_through(&self, ndc_x: f64, ndc_y: f64, target: &Vector3<f64>) -> Ray {
        let b = self.basis(target);
        let tan = self.half_fov_tan();
        let direction =
            b.forward + b.right * (ndc_x * tan * self.aspect) + b.up * (ndc_y * tan);
        Ray::new(self.position, direction)
    }

    /// Projects a world point to normalized device coordinates.
    ///
    /// Returns `None` for points at or behind the near plane.
    pub fn project(&self, point: &Vector3<f64>, target: &Vector3<f64>) -> Option<(f64, f64)> {
        let b = self.basis(target);
        let v = point - self.position;
        let depth = v.dot(&b.forward);
        if depth <= self.near {
            return None;
        }
        let tan = self.half_fov_tan();
        Some((
            v.dot(&b.right) / (depth * tan * self.aspect),
            v.dot(&b.up) / (depth * tan),
        ))
    }
}

/// Orbit controls with optional damping.
///
/// Drag input accumulates a spherical delta that [`update`](Self::update)
/// applies around `target`; with damping on, only a fraction is applied per
/// frame and the rest decays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrbitControls {
    /// Point the camera orbits and looks at
    pub target: Vector3<f64>,

    pub enable_damping: bool,

    /// Fraction of pending motion applied per update
    pub damping_factor: f64,

    pub rotate_speed: f64,
    pub zoom_speed: f64,
    pub min_distance: f64,
    pub max_distance: f64,

    /// Pending azimuth change (radians)
    delta_theta: f64,

    /// Pending polar change (radians)
    delta_phi: f64,

    /// Pending radius multiplier
    scale: f64,
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self {
            target: Vector3::zeros(),
            enable_damping: true,
            damping_factor: 0.05,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            min_distance: 0.0,
            max_distance: f64::INFINITY,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
        }
    }
}

impl OrbitControls {
    /// Queues a rotation from a pointer drag of `(dx, dy)` pixels.
    ///
    /// A drag across the full surface height turns the camera once around.
    pub fn rotate(&mut self, dx: f64, dy: f64, surface_height: f64) {
        if surface_height <= 0.0 {
            return;
        }
        self.delta_theta -= 2.0 * PI * dx / surface_height * self.rotate_speed;
        self.delta_phi -= 2.0 * PI * dy / surface_height * self.rotate_speed;
    }

    /// Queues a dolly; positive `delta` moves toward the target.
    pub fn dolly(&mut self, delta: f64) {
        self.scale *= 0.95f64.powf(delta * self.zoom_speed);
    }

    /// Whether queued motion remains.
    pub fn has_pending_motion(&self) -> bool {
        self.delta_theta.abs() > 1e-12 || self.delta_phi.abs() > 1e-12 || (self.scale - 1.0).abs() > 1e-12
    }

    /// Applies queued motion to the camera around the current target.
    ///
    /// Returns `true` if the camera moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        if !self.has_pending_motion() {
            return false;
        }

        let offset = camera.position - self.target;
        let radius = offset.norm();
        if radius == 0.0 {
            self.reset_motion();
            return false;
        }

        let mut theta = offset.x.atan2(offset.z);
        let mut phi = (offset.y / radius).clamp(-1.0, 1.0).acos();

        let share = if self.enable_damping { self.damping_factor } else { 1.0 };
        theta += self.delta_theta * share;
        phi += self.delta_phi * share;
        phi = phi.clamp(POLAR_EPSILON, PI - POLAR_EPSILON);

        let scaled = radius * self.scale;
        let scaled = if scaled.is_finite() { scaled } else { radius };
        let min_radius = self.min_distance.max(MIN_ORBIT_RADIUS);
        let radius = scaled.clamp(min_radius, self.max_distance.max(min_radius));

        let offset = Vector3::new(
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
            radius * phi.sin() * theta.cos(),
        );
        camera.position = self.target + offset;

        if self.enable_damping {
            self.delta_theta *= 1.0 - self.damping_factor;
            self.delta_phi *= 1.0 - self.damping_factor;
        } else {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
        }
        self.scale = 1.0;
        true
    }

    fn reset_motion(&mut self) {
        self.delta_theta = 0.0;
        self.delta_phi = 0.0;
        self.scale = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::picking::pick_nearest;
    use approx::assert_relative_eq;

    #[test]
    fn test_center_ray_points_at_target() {
        let camera = Camera::default();
        let ray = camera.ray_through(0.0, 0.0, &Vector3::zeros());
        assert_relative_eq!(ray.direction, Vector3::new(0.0, 0.0, -1.0), epsilon = 1e-12);
        assert_eq!(ray.origin, camera.position);
    }

    #[test]
    fn test_project_inverts_ray() {
        let camera = Camera::default();
        let target = Vector3::new(1.0, -2.0, 0.0);
        let point = Vector3::new(3.0, 1.5, -4.0);

        let (x, y) = camera.project(&point, &target).unwrap();
        let ray = camera.ray_through(x, y, &target);
        let to_point = (point - ray.origin).normalize();
        assert_relative_eq!(ray.direction, to_point, epsilon = 1e-9);
    }

    #[test]
    fn test_project_behind_camera() {
        let camera = Camera::default();
        assert!(camera.project(&Vector3::new(0.0, 0.0, 20.0), &Vector3::zeros()).is_none());
    }

    #[test]
    fn test_rotate_keeps_distance() {
        let mut camera = Camera::default();
        let mut controls = OrbitControls {
            enable_damping: false,
            ..Default::default()
        };

        controls.rotate(100.0, 40.0, 720.0);
        assert!(controls.update(&mut camera));
        assert_relative_eq!((camera.position - controls.target).norm(), 10.0, epsilon = 1e-9);
        assert!(!controls.update(&mut camera));
    }

    #[test]
    fn test_damped_rotation_decays() {
        let mut camera = Camera::default();
        let mut controls = OrbitControls::default();

        controls.rotate(200.0, 0.0, 720.0);
        let start = camera.position;
        controls.update(&mut camera);
        let first_step = (camera.position - start).norm();
        let mid = camera.position;
        controls.update(&mut camera);
        let second_step = (camera.position - mid).norm();

        assert!(first_step > 0.0);
        assert!(second_step < first_step);
    }

    #[test]
    fn test_dolly_in_shrinks_radius() {
        let mut camera = Camera::default();
        let mut controls = OrbitControls::default();

        controls.dolly(3.0);
        controls.update(&mut camera);
        assert!(camera.position.norm() < 10.0);
    }

    #[test]
    fn test_huge_dolly_keeps_camera_usable() {
        let mut camera = Camera::default();
        let mut controls = OrbitControls::default();
        controls.enable_damping = false;

        controls.dolly(20_000.0);
        assert!(controls.update(&mut camera));
        let radius = (camera.position - controls.target).norm();
        assert_relative_eq!(radius, MIN_ORBIT_RADIUS, epsilon = 1e-12);

        let ray = camera.ray_through(0.0, 0.0, &controls.target);
        assert!(ray.direction.iter().all(|c| c.is_finite()));
        let hit = pick_nearest(&ray, [controls.target].iter(), 0.15);
        assert_eq!(hit.map(|h| h.index), Some(0));

        controls.dolly(-50.0);
        assert!(controls.update(&mut camera));
        assert!((camera.position - controls.target).norm() > radius);
    }

    #[test]
    fn test_huge_dolly_out_stays_finite() {
        let mut camera = Camera::default();
        let mut controls = OrbitControls::default();
        controls.enable_damping = false;

        controls.dolly(-1e6);
        controls.update(&mut camera);
        assert!(camera.position.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_view_matrix_maps_target_forward() {
        let camera = Camera::default();
        let view = camera.view_matrix(&Vector3::zeros());
        let p = view.transform_point(&Point3::origin());
        assert_relative_eq!(p, Point3::new(0.0, 0.0, -10.0), epsilon = 1e-12);
    }
}
