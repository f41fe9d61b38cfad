use super::math::{Ray, Vec3};

/// Result of a successful intersection.
#[derive(Debug, Clone, Copy)]
pub struct HitRecord {
    pub point: Vec3,
    /// Unit normal, always facing against the incoming ray.
    pub normal: Vec3,
    pub t: f64,
    /// True when the ray hit the outside of the surface.
    pub front_face: bool,
}

impl HitRecord {
    /// Builds a record orienting `outward_normal` against the ray direction.
    pub fn with_face_normal(ray: &Ray, t: f64, point: Vec3, outward_normal: Vec3) -> HitRecord {
        let front_face = ray.direction.dot(outward_normal) < 0.0;
        let normal = if front_face {
            outward_normal
        } else {
            // the ray started inside the surface
            -outward_normal
        };
        HitRecord {
            point,
            normal,
            t,
            front_face,
        }
    }
}

/// Anything that can report where a ray crosses it.
pub trait Hittable: Send + Sync {
    /// Nearest intersection with a parameter strictly inside `(t_min, t_max)`.
    fn hit(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<HitRecord>;
}

#[derive(Debug, Clone, Copy)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f64,
}

impl Sphere {
    pub fn new(center: Vec3, radius: f64) -> Sphere {
        Sphere { center, radius }
    }

    fn record_at(&self, ray: &Ray, t: f64) -> HitRecord {
        let point = ray.at(t);
        let outward_normal = (point - self.center) / self.radius;
        HitRecord::with_face_normal(ray, t, point, outward_normal)
    }
}

impl Hittable for Sphere {
    fn hit(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<HitRecord> {
        // a degenerate sphere has no surface normal to report
        if self.radius <= 0.0 || self.radius.is_nan() {
            return None;
        }
        let oc = ray.origin - self.center;
        // 1.0 for every ray built through Ray::new, kept so the roots stay right for any direction
        let a = ray.direction.squared_len();
        let half_b = oc.dot(ray.direction);
        let c = oc.squared_len() - self.radius * self.radius;
        let discriminant = half_b * half_b - a * c;

        // tangent rays (discriminant == 0) count as a miss
        if discriminant <= 0.0 {
            return None;
        }

        let root = discriminant.sqrt();
        // near root first, the far one is the exit point when the origin is inside
        let near = (-half_b - root) / a;
        if near > t_min && near < t_max {
            return Some(self.record_at(ray, near));
        }
        let far = (-half_b + root) / a;
        if far > t_min && far < t_max {
            return Some(self.record_at(ray, far));
        }
        None
    }
}

/// Closed set of primitives a scene can hold.
#[derive(Debug, Clone, Copy)]
pub enum Solid {
    Sphere(Sphere),
}

impl Hittable for Solid {
    fn hit(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<HitRecord> {
        match self {
            Solid::Sphere(sphere) => sphere.hit(ray, t_min, t_max),
        }
    }
}

impl From<Sphere> for Solid {
    fn from(sphere: Sphere) -> Self {
        Solid::Sphere(sphere)
    }
}

/// Owns the objects of the world; read-only while a render is running.
#[derive(Debug, Default)]
pub struct Scene {
    objects: Vec<Solid>,
}

impl Scene {
    pub fn new() -> Scene {
        Scene {
            objects: Vec::new(),
        }
    }

    pub fn add(&mut self, object: impl Into<Solid>) {
        self.objects.push(object.into());
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl Hittable for Scene {
    fn hit(&self, ray: &Ray, t_min: f64, t_max: f64) -> Option<HitRecord> {
        let mut closest_so_far = t_max;
        let mut closest_hit = None;
        for object in &self.objects {
            // shrinking the upper bound keeps the first of equally near hits
            if let Some(record) = object.hit(ray, t_min, closest_so_far) {
                closest_so_far = record.t;
                closest_hit = Some(record);
            }
        }
        closest_hit
    }
}
