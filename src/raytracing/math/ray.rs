use super::Vec3;

/// Half-line with a unit-length direction, so `t` in `at` is a literal distance.
#[derive(Debug, Clone)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Builds a ray, always normalizing `direction`.
    /// The caller must not pass a zero-length direction.
    pub fn new(origin: Vec3, direction: Vec3) -> Ray {
        Ray {
            origin,
            direction: direction.normalize(),
        }
    }

    pub fn at(self: &Self, t: f64) -> Vec3 {
        self.origin + self.direction * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_is_normalized() {
        let ray = Ray::new(Vec3::zero(), Vec3::new(0.0, 0.0, -10.0));
        assert_eq!(ray.direction, Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_at_walks_distance_t() {
        let origin = Vec3::new(1.0, -2.0, 0.5);
        let ray = Ray::new(origin, Vec3::new(1.0, 2.0, 2.0));
        assert_eq!(ray.at(0.0), origin);
        for t in [0.5, 1.0, 3.0, -2.0] {
            let p = ray.at(t);
            assert!((p.distance(origin) - f64::abs(t)).abs() < 1e-12);
            // the displacement stays on the direction line
            assert!((p - origin).cross(ray.direction).len() < 1e-12);
        }
    }
}
