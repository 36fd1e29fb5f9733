//! Render the Cornell box to a PNG.

mod cornell;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use cornell::Ball;
use ember_renderer::{render, Integrator, RenderConfig, Scene};
use std::path::PathBuf;
use std::time::Instant;

/// Light transport algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Method {
    /// Bidirectional path tracing
    Bdpt,
    /// Path tracing with next-event estimation
    PathTracer,
}

impl From<Method> for Integrator {
    fn from(method: Method) -> Self {
        match method {
            Method::Bdpt => Integrator::Bdpt,
            Method::PathTracer => Integrator::PathTracer,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Bidirectional path tracer for the Cornell box")]
struct Args {
    /// Samples per pixel [default: 4]
    #[arg(long, value_name = "NUM")]
    spp: Option<u32>,

    /// Worker threads, 0 for all cores [default: 4]
    #[arg(short = 'j', long = "threads", value_name = "NUM")]
    threads: Option<usize>,

    /// Base seed for the per-pixel generators [default: 0]
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value_t = 784)]
    width: u32,

    #[arg(long, default_value_t = 784)]
    height: u32,

    /// Integrator [default: bdpt]
    #[arg(long, value_enum)]
    integrator: Option<Method>,

    /// Material of the ball
    #[arg(long, value_enum, default_value_t = Ball::Glass)]
    ball: Ball,

    /// JSON render configuration; flags override its values
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Where to write the image
    #[arg(short, long, value_name = "FILE", default_value = "cornell.png")]
    output: PathBuf,
}

impl Args {
    fn render_config(&self) -> Result<RenderConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Failed to parse {}", path.display()))?
            }
            None => RenderConfig {
                threads: 4,
                ..Default::default()
            },
        };

        if let Some(spp) = self.spp {
            config.samples_per_pixel = spp;
        }
        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(method) = self.integrator {
            config.integrator = method.into();
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();
    let config = args.render_config()?;

    let start = Instant::now();
    let scene = Scene::new(cornell::primitives(args.ball), cornell::BACKGROUND);
    let camera = cornell::camera(args.width, args.height);
    log::info!("Scene built in {:.2?}", start.elapsed());

    let output = render(&scene, &camera, &config).context("Render failed")?;
    let image = output.resolve();

    image::save_buffer(
        &args.output,
        &image.to_rgba(),
        image.width,
        image.height,
        image::ColorType::Rgba8,
    )
    .with_context(|| format!("Failed to write {}", args.output.display()))?;

    log::info!(
        "Wrote {} ({} samples, {:.2} M vertices/s, {:.2?} total)",
        args.output.display(),
        output.stats.samples,
        output.stats.mega_vertices_per_second(),
        start.elapsed()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from(["ember", "--spp", "16", "-j", "2"]);
        let config = args.render_config().unwrap();
        assert_eq!(config.samples_per_pixel, 16);
        assert_eq!(config.threads, 2);
        assert_eq!(config.seed, 0);
        assert_eq!(config.integrator, Integrator::Bdpt);
        assert_eq!(args.ball, Ball::Glass);

        let args = Args::parse_from(["ember"]);
        let config = args.render_config().unwrap();
        assert_eq!(config.samples_per_pixel, 4);
        assert_eq!(config.threads, 4);

        let args = Args::parse_from(["ember", "--integrator", "path-tracer"]);
        let config = args.render_config().unwrap();
        assert_eq!(config.integrator, Integrator::PathTracer);
        assert!(Args::try_parse_from(["ember", "--integrator", "photon"]).is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let path = std::env::temp_dir().join("ember_cli_config_test.json");
        std::fs::write(
            &path,
            r#"{ "samples_per_pixel": 64, "seed": 3, "integrator": "path_tracer" }"#,
        )
        .unwrap();

        let path_arg = path.to_string_lossy().into_owned();
        let args = Args::parse_from(["ember", "--config", path_arg.as_str(), "--seed", "5", "--ball", "copper"]);
        let config = args.render_config().unwrap();
        assert_eq!(config.samples_per_pixel, 64);
        assert_eq!(config.threads, 0);
        assert_eq!(config.seed, 5);
        assert_eq!(config.integrator, Integrator::PathTracer);
        assert_eq!(args.ball, Ball::Copper);

        std::fs::remove_file(&path).ok();
    }
}
