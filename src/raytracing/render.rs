use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::camera::Camera;
use super::core::Hittable;
use super::math::{Ray, Vec3};

/// Rays starting closer than this to a surface ignore it (shadow acne).
const T_MIN: f64 = 0.001;
const REFLECTANCE: f64 = 0.5;

#[derive(Debug, Clone, Copy)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub samples_per_pixel: u32,
    pub max_depth: u32,
    pub seed: u64,
}

/// Averaged linear colors, row-major with the top row first.
#[derive(Debug, Clone, PartialEq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Vec3>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32) -> PixelBuffer {
        PixelBuffer {
            width,
            height,
            pixels: vec![Vec3::zero(); pixel_count(width, height)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, x: u32, y: u32) -> Vec3 {
        self.pixels[x as usize + self.width as usize * y as usize]
    }

    /// Gamma corrected 8-bit image, ready to be written.
    pub fn to_image(&self) -> RgbImage {
        let mut buffer = RgbImage::new(self.width, self.height);
        for (x, y, pixel) in buffer.enumerate_pixels_mut() {
            *pixel = gamma_correction(self.get(x, y)).into();
        }
        buffer
    }
}

/// Widened before multiplying, large images overflow u32.
fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

impl From<Vec3> for Rgb<u8> {
    fn from(value: Vec3) -> Self {
        let quantize = |c: f64| (256.0 * c.clamp(0.0, 0.999)) as u8;
        Rgb([quantize(value.x), quantize(value.y), quantize(value.z)])
    }
}

/// Gamma 2 correction of a linear color.
fn gamma_correction(value: Vec3) -> Vec3 {
    let channel = |c: f64| if c > 0.0 { c.sqrt() } else { 0.0 };
    Vec3::new(channel(value.x), channel(value.y), channel(value.z))
}

fn sky(ray: &Ray) -> Vec3 {
    let t = 0.5 * (ray.direction.normalize().y + 1.0);
    Vec3::one() * (1.0 - t) + Vec3::new(0.5, 0.7, 1.0) * t
}

/// Radiance carried back along `ray`, bouncing diffusely at most `depth` times.
pub fn ray_color<R: Rng + ?Sized>(
    ray: &Ray,
    scene: &dyn Hittable,
    depth: u32,
    rng: &mut R,
) -> Vec3 {
    if depth == 0 {
        return Vec3::zero();
    }

    match scene.hit(ray, T_MIN, f64::INFINITY) {
        Some(record) => {
            let mut direction = record.normal + Vec3::random_in_unit_sphere(rng);
            // the sample can cancel the normal out
            if direction.is_near_zero() {
                direction = record.normal;
            }
            let bounce = Ray::new(record.point, direction);
            ray_color(&bounce, scene, depth - 1, rng) * REFLECTANCE
        }
        None => sky(ray),
    }
}

/// Average of `samples_per_pixel` jittered estimates for the pixel at
/// column `i` and camera row `j` (row 0 at the bottom of the image).
pub fn render_pixel<R: Rng + ?Sized>(
    camera: &Camera,
    scene: &dyn Hittable,
    i: u32,
    j: u32,
    settings: &RenderSettings,
    rng: &mut R,
) -> Vec3 {
    let mut color = Vec3::zero();
    for _ in 0..settings.samples_per_pixel {
        let s = (i as f64 + rng.gen::<f64>()) / (settings.width - 1) as f64;
        let t = (j as f64 + rng.gen::<f64>()) / (settings.height - 1) as f64;
        let ray = camera.get_ray(s, t, rng);
        color += ray_color(&ray, scene, settings.max_depth, rng);
    }
    color / settings.samples_per_pixel as f64
}

/// Seed of the generator owned by one scanline, independent of the worker running it.
fn row_seed(seed: u64, row: u32) -> u64 {
    seed ^ (row as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Renders every scanline in parallel. Rows finish in any order, the returned
/// buffer is complete and in image order.
pub fn render(camera: &Camera, scene: &dyn Hittable, settings: &RenderSettings) -> PixelBuffer {
    let mut buffer = PixelBuffer::new(settings.width, settings.height);
    let remaining = AtomicUsize::new(settings.height as usize);

    log::info!(
        "rendering {}x{} with {} samples per pixel, max depth {}",
        settings.width,
        settings.height,
        settings.samples_per_pixel,
        settings.max_depth
    );

    buffer
        .pixels
        .par_chunks_mut(settings.width as usize)
        .enumerate()
        .for_each(|(y, row)| {
            // image rows go top down, camera rows bottom up
            let j = settings.height - 1 - y as u32;
            let mut rng = StdRng::seed_from_u64(row_seed(settings.seed, j));
            for (i, pixel) in row.iter_mut().enumerate() {
                *pixel = render_pixel(camera, scene, i as u32, j, settings, &mut rng);
            }
            let left = remaining.fetch_sub(1, Ordering::Relaxed) - 1;
            log::debug!("scanlines remaining: {}", left);
        });

    buffer
}

/// Writes the image as plain-text PPM: a three line `P3` header, then one
/// `R G B` line per pixel, top row first.
pub fn write_ppm<W: Write>(image: &RgbImage, mut writer: W) -> io::Result<()> {
    writeln!(writer, "P3")?;
    writeln!(writer, "{} {}", image.width(), image.height())?;
    writeln!(writer, "255")?;
    for Rgb([r, g, b]) in image.pixels() {
        writeln!(writer, "{} {} {}", r, g, b)?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raytracing::camera::CameraSettings;
    use crate::raytracing::core::{Scene, Sphere};

    fn single_sphere_scene() -> Scene {
        let mut scene = Scene::new();
        scene.add(Sphere::new(Vec3::new(0.0, 0.0, -1.0), 0.5));
        scene
    }

    fn brightness(color: Vec3) -> f64 {
        color.x + color.y + color.z
    }

    fn small_settings(seed: u64) -> RenderSettings {
        RenderSettings {
            width: 16,
            height: 9,
            samples_per_pixel: 4,
            max_depth: 5,
            seed,
        }
    }

    #[test]
    fn test_zero_depth_is_black() {
        let scene = single_sphere_scene();
        let mut rng = StdRng::seed_from_u64(1);
        for direction in [Vec3::new(0.0, 0.0, -1.0), Vec3::y_axis()] {
            let ray = Ray::new(Vec3::zero(), direction);
            assert_eq!(ray_color(&ray, &scene, 0, &mut rng), Vec3::zero());
        }
    }

    #[test]
    fn test_sky_gradient() {
        let scene = Scene::new();
        let mut rng = StdRng::seed_from_u64(1);
        let down = ray_color(&Ray::new(Vec3::zero(), -Vec3::y_axis()), &scene, 10, &mut rng);
        let up = ray_color(&Ray::new(Vec3::zero(), Vec3::y_axis()), &scene, 10, &mut rng);
        assert_eq!(down, Vec3::one());
        assert_eq!(up, Vec3::new(0.5, 0.7, 1.0));

        let sideways = Ray::new(Vec3::zero(), Vec3::new(1.0, 0.3, 0.0));
        let side = ray_color(&sideways, &scene, 10, &mut rng);
        assert!(side.x < 1.0 && side.x > 0.5);
        assert!(side.y < 1.0 && side.y > 0.7);
        assert!((side.z - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_hit_is_attenuated() {
        let scene = single_sphere_scene();
        let mut rng = StdRng::seed_from_u64(5);
        let ray = Ray::new(Vec3::zero(), Vec3::new(0.0, 0.0, -1.0));
        for _ in 0..64 {
            let color = ray_color(&ray, &scene, 10, &mut rng);
            // at least one bounce halves the sky
            assert!(color.x <= 0.5 && color.y <= 0.5 && color.z <= 0.5);
            assert!(brightness(color) > 0.0);
        }
    }

    #[test]
    fn test_center_pixel_darker_than_sky_corner() {
        let scene = single_sphere_scene();
        let camera = Camera::new(CameraSettings::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(11);

        let center = camera.get_ray(0.5, 0.5, &mut rng);
        assert!(scene.hit(&center, T_MIN, f64::INFINITY).is_some());
        let corner = camera.get_ray(0.0, 1.0, &mut rng);
        assert!(scene.hit(&corner, T_MIN, f64::INFINITY).is_none());

        let center_color = ray_color(&center, &scene, 10, &mut rng);
        let corner_color = ray_color(&corner, &scene, 10, &mut rng);
        assert!(brightness(center_color) < brightness(corner_color));

        let settings = small_settings(11);
        let buffer = render(&camera, &scene, &settings);
        assert!(brightness(buffer.get(8, 4)) < brightness(buffer.get(0, 0)));
    }

    #[test]
    fn test_render_is_deterministic_for_a_seed() {
        let scene = single_sphere_scene();
        let camera = Camera::new(CameraSettings::default()).unwrap();

        let first = render(&camera, &scene, &small_settings(99)).to_image();
        let second = render(&camera, &scene, &small_settings(99)).to_image();
        assert_eq!(first.as_raw(), second.as_raw());

        let mut first_ppm = Vec::new();
        let mut second_ppm = Vec::new();
        write_ppm(&first, &mut first_ppm).unwrap();
        write_ppm(&second, &mut second_ppm).unwrap();
        assert_eq!(first_ppm, second_ppm);
    }

    #[test]
    fn test_buffer_covers_every_row() {
        let scene = Scene::new();
        let camera = Camera::new(CameraSettings::default()).unwrap();
        let buffer = render(&camera, &scene, &small_settings(3));
        assert_eq!((buffer.width(), buffer.height()), (16, 9));
        for y in 0..9 {
            for x in 0..16 {
                assert!(brightness(buffer.get(x, y)) > 0.0);
            }
        }
        // sky gets bluer towards the top
        assert!(buffer.get(8, 0).x < buffer.get(8, 8).x);
    }

    #[test]
    fn test_gamma_and_clamp() {
        let white: Rgb<u8> = gamma_correction(Vec3::one()).into();
        assert_eq!(white, Rgb([255, 255, 255]));
        let black: Rgb<u8> = gamma_correction(Vec3::new(0.0, -1.0, 0.0)).into();
        assert_eq!(black, Rgb([0, 0, 0]));
        // sqrt(0.25) = 0.5 -> 128
        let mid: Rgb<u8> = gamma_correction(Vec3::new(0.25, 4.0, 0.25)).into();
        assert_eq!(mid, Rgb([128, 255, 128]));
    }

    #[test]
    fn test_ppm_layout() {
        let mut image = RgbImage::new(2, 2);
        image.put_pixel(1, 0, Rgb([255, 128, 0]));
        image.put_pixel(0, 1, Rgb([1, 2, 3]));
        let mut bytes = Vec::new();
        write_ppm(&image, &mut bytes).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(
            text,
            "P3\n2 2\n255\n0 0 0\n255 128 0\n1 2 3\n0 0 0\n"
        );
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_buffer_size_does_not_wrap() {
        // 70000 * 70000 overflows u32
        assert_eq!(pixel_count(70_000, 70_000), 4_900_000_000);
        let small = PixelBuffer::new(3, 2);
        assert_eq!(small.pixels.len(), 6);
        assert_eq!(small.get(2, 1), Vec3::zero());
    }

    #[test]
    fn test_render_is_independent_of_thread_count() {
        let scene = single_sphere_scene();
        let camera = Camera::new(CameraSettings::default()).unwrap();
        let settings = small_settings(2024);

        let render_with = |threads: usize| {
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .unwrap()
                .install(|| render(&camera, &scene, &settings))
                .to_image()
        };
        let single = render_with(1);
        let many = render_with(8);
        assert_eq!(single.as_raw(), many.as_raw());
    }
}
