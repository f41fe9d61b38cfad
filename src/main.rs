use std::error::Error;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use std::time::Instant;

use clap::Parser;
use rand::Rng;

mod raytracing;
use raytracing::parser::{ImageData, SceneParser};
use raytracing::render::{render, write_ppm, RenderSettings};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// the input path to the scene file, renders the built-in demo scene when omitted
    scene: Option<String>,
    /// the path where the rendered image is saved, .ppm files are written as plain text
    #[arg(short, long, default_value = "image.ppm")]
    output: String,
    /// the number of rays shot per pixel
    #[arg(short, long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..))]
    sample_rate: u32,
    /// the maximum number of bounces of a ray
    #[arg(short = 'd', long, default_value_t = 10)]
    max_depth: u32,
    /// seed of the random sampling, the same seed renders the same image
    #[arg(long)]
    seed: Option<u64>,
    /// number of worker threads, defaults to one per core
    #[arg(short = 'j', long)]
    threads: Option<usize>,
}

fn load_scene(path: &str) -> Result<ImageData, Box<dyn Error>> {
    let content = fs::read_to_string(path)?;
    let mut parser = SceneParser::new(&content);
    match parser.parse_scene() {
        Ok(data) => Ok(data),
        Err(parser_error) => {
            log::error!(
                "cannot parse {}\n{}",
                path,
                parser_error.error_location(&content)
            );
            Err(parser_error.into())
        }
    }
}

fn save(image: &image::RgbImage, output: &str) -> Result<(), Box<dyn Error>> {
    let plain_text = Path::new(output)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("ppm") || ext.eq_ignore_ascii_case("pnm"));
    if plain_text {
        write_ppm(image, BufWriter::new(File::create(output)?))?;
    } else {
        image.save(output)?;
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()?;
    }

    let ImageData {
        width,
        height,
        camera,
        scene,
    } = match &args.scene {
        Some(path) => load_scene(path)?,
        None => {
            log::info!("no scene file given, rendering the demo scene");
            ImageData::demo()?
        }
    };
    log::info!("scene loaded with {} objects", scene.len());
    if scene.is_empty() {
        log::warn!("the scene is empty, only the sky will be visible");
    }
    log::debug!("camera looking towards {:?}", camera.forward());

    let seed = args.seed.unwrap_or_else(|| rand::thread_rng().gen());
    log::info!("sampling seed {}", seed);
    let settings = RenderSettings {
        width,
        height,
        samples_per_pixel: args.sample_rate,
        max_depth: args.max_depth,
        seed,
    };

    // measure time
    let start = Instant::now();
    let pixels = render(&camera, &scene, &settings);
    let total_time = start.elapsed();
    log::info!(
        "rendered {}x{} in {:?}",
        pixels.width(),
        pixels.height(),
        total_time
    );

    save(&pixels.to_image(), &args.output)?;
    log::info!("saved {}", args.output);
    Ok(())
}
