use rand::Rng;
use thiserror::Error;

use super::math::{Ray, Vec3};

#[derive(Debug, Error, PartialEq)]
pub enum CameraError {
    #[error("camera position and target coincide")]
    NoViewDirection,
    #[error("up vector is parallel to the view direction")]
    UpParallelToView,
}

/// Construction parameters, all in world space except `vertical_fov` (degrees).
#[derive(Debug, Clone, Copy)]
pub struct CameraSettings {
    pub look_from: Vec3,
    pub look_at: Vec3,
    pub vup: Vec3,
    pub vertical_fov: f64,
    pub aspect_ratio: f64,
    pub aperture: f64,
    pub focus_distance: f64,
}

impl Default for CameraSettings {
    /// Pinhole camera at the origin looking down -z.
    fn default() -> Self {
        CameraSettings {
            look_from: Vec3::zero(),
            look_at: Vec3::new(0.0, 0.0, -1.0),
            vup: Vec3::y_axis(),
            vertical_fov: 90.0,
            aspect_ratio: 16.0 / 9.0,
            aperture: 0.0,
            focus_distance: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Camera {
    origin: Vec3,
    lower_left_corner: Vec3,
    horizontal: Vec3,
    vertical: Vec3,
    // right, up and backward
    u: Vec3,
    v: Vec3,
    w: Vec3,
    lens_radius: f64,
}

impl Camera {
    pub fn new(settings: CameraSettings) -> Result<Camera, CameraError> {
        let h = (settings.vertical_fov.to_radians() / 2.0).tan();
        let viewport_height = 2.0 * h;
        let viewport_width = settings.aspect_ratio * viewport_height;

        // the camera looks along -w
        let w = (settings.look_from - settings.look_at)
            .try_normalize()
            .ok_or(CameraError::NoViewDirection)?;
        let u = settings
            .vup
            .cross(w)
            .try_normalize()
            .ok_or(CameraError::UpParallelToView)?;
        let v = w.cross(u);

        let origin = settings.look_from;
        let horizontal = settings.focus_distance * viewport_width * u;
        let vertical = settings.focus_distance * viewport_height * v;
        let lower_left_corner =
            origin - horizontal / 2.0 - vertical / 2.0 - settings.focus_distance * w;

        Ok(Camera {
            origin,
            lower_left_corner,
            horizontal,
            vertical,
            u,
            v,
            w,
            lens_radius: settings.aperture / 2.0,
        })
    }

    /// Ray through the image plane point `(s, t)`, both in `[0, 1]` from the lower left corner.
    /// With a non-zero aperture the origin is jittered over the lens disk.
    pub fn get_ray<R: Rng + ?Sized>(&self, s: f64, t: f64, rng: &mut R) -> Ray {
        let offset = if self.lens_radius > 0.0 {
            let rd = Vec3::random_in_unit_disk(rng) * self.lens_radius;
            self.u * rd.x + self.v * rd.y
        } else {
            Vec3::zero()
        };
        let origin = self.origin + offset;
        Ray::new(
            origin,
            self.lower_left_corner + s * self.horizontal + t * self.vertical - origin,
        )
    }

    /// Direction the camera is looking at.
    pub fn forward(&self) -> Vec3 {
        -self.w
    }
}
