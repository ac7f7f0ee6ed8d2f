//! Ray picking against node handles.

use nalgebra::Vector3;

/// A half-line in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vector3<f64>,

    /// Unit direction
    pub direction: Vector3<f64>,
}

impl Ray {
    /// Creates a ray; `direction` is normalized.
    pub fn new(origin: Vector3<f64>, direction: Vector3<f64>) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    pub fn at(&self, t: f64) -> Vector3<f64> {
        self.origin + self.direction * t
    }

    /// Distance along the ray to the first hit on a sphere.
    ///
    /// Rays starting inside the sphere hit its far side.
    pub fn intersect_sphere(&self, center: &Vector3<f64>, radius: f64) -> Option<f64> {
        let oc = self.origin - center;
        let b = oc.dot(&self.direction);
        let c = oc.norm_squared() - radius * radius;
        let disc = b * b - c;
        if disc < 0.0 {
            return None;
        }
        let sqrt_disc = disc.sqrt();
        let near = -b - sqrt_disc;
        let far = -b + sqrt_disc;
        if near >= 0.0 {
            Some(near)
        } else if far >= 0.0 {
            Some(far)
        } else {
            None
        }
    }
}

/// A picked handle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// Index of the handle in the scene
    pub index: usize,

    /// Distance from the ray origin
    pub distance: f64,
}

/// Returns the nearest sphere hit by `ray`.
pub fn pick_nearest<'a, I>(ray: &Ray, centers: I, radius: f64) -> Option<Hit>
where
    I: IntoIterator<Item = &'a Vector3<f64>>,
{
    centers
        .into_iter()
        .enumerate()
        .filter_map(|(index, center)| {
            ray.intersect_sphere(center, radius)
                .map(|distance| Hit { index, distance })
        })
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn down_z() -> Ray {
        Ray::new(Vector3::new(0.0, 0.0, 10.0), Vector3::new(0.0, 0.0, -2.0))
    }

    #[test]
    fn test_sphere_hit_distance() {
        let t = down_z().intersect_sphere(&Vector3::zeros(), 1.0).unwrap();
        assert_relative_eq!(t, 9.0);
        assert_relative_eq!(down_z().at(t), Vector3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn test_sphere_miss_and_behind() {
        assert!(down_z().intersect_sphere(&Vector3::new(3.0, 0.0, 0.0), 1.0).is_none());
        assert!(down_z().intersect_sphere(&Vector3::new(0.0, 0.0, 20.0), 1.0).is_none());
    }

    #[test]
    fn test_pick_nearest_of_stack() {
        let centers = [
            Vector3::new(0.0, 0.0, -5.0),
            Vector3::new(0.0, 0.0, 2.0),
            Vector3::new(5.0, 0.0, 0.0),
        ];
        let hit = pick_nearest(&down_z(), &centers, 0.15).unwrap();
        assert_eq!(hit.index, 1);
        assert_relative_eq!(hit.distance, 7.85, epsilon = 1e-12);
    }

    #[test]
    fn test_pick_nothing() {
        let centers = [Vector3::new(1.0, 1.0, 0.0)];
        assert!(pick_nearest(&down_z(), &centers, 0.15).is_none());
        let empty: [Vector3<f64>; 0] = [];
        assert!(pick_nearest(&down_z(), &empty, 0.15).is_none());
    }
}
