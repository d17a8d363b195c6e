//! Command-line front end: renders one of the preset scenes with the
//! blocking driver and either writes a binary PPM or paints the image into
//! the terminal with half-block cells.

mod presets;

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use crossterm::style::{self, Stylize};

use nray::pixels::{rgb24_channels, ImageFormat};
use nray::renderer::BlockingRenderer;
use presets::ScenePreset;

/// nray: render n-dimensional scenes from your terminal
#[derive(Parser, Debug)]
#[command(
    name = "nray",
    version,
    about = "An n-dimensional ray tracer 🔭",
    after_help = "EXAMPLES:\n  \
                  nray --scene tesseract\n  \
                  nray --scene showcase -W 1280 -H 720 -o showcase.ppm\n  \
                  nray --scene simplices --seed 7 --threads 4"
)]
struct Cli {
    /// Scene preset to render
    #[arg(short, long, value_enum, default_value_t = ScenePreset::Showcase)]
    scene: ScenePreset,

    /// Image width in pixels
    #[arg(short = 'W', long, default_value_t = 160)]
    width: usize,

    /// Image height in pixels
    #[arg(short = 'H', long, default_value_t = 100)]
    height: usize,

    /// Field of view in radians
    #[arg(long, default_value_t = 0.8)]
    fov: f32,

    /// Maximum reflection recursion depth
    #[arg(long, default_value_t = 4)]
    bounces: i32,

    /// Helper worker threads (the main thread always participates);
    /// defaults to one fewer than the hardware parallelism
    #[arg(short, long)]
    threads: Option<usize>,

    /// Seed for the randomized presets
    #[arg(long, default_value_t = 0x6e726179)]
    seed: u64,

    /// Write a binary PPM here instead of drawing to the terminal
    #[arg(short, long)]
    output: Option<String>,
}

fn write_ppm(path: &str, format: &ImageFormat, pixels: &[u8]) -> io::Result<()> {
    let mut file = io::BufWriter::new(std::fs::File::create(path)?);
    write!(file, "P6\n{} {}\n255\n", format.width, format.height)?;
    file.write_all(pixels)?;
    file.flush()
}

/// Two vertically stacked pixels per character cell, upper half foreground.
fn display_halfblock(format: &ImageFormat, pixels: &[u8]) {
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    let bpp = format.bytes_per_pixel();

    for row in 0..format.height / 2 {
        for x in 0..format.width {
            let top = (row * 2) * format.pitch + x * bpp;
            let bottom = (row * 2 + 1) * format.pitch + x * bpp;
            let _ = write!(
                out,
                "{}",
                "▀".with(style::Color::Rgb {
                    r: pixels[top],
                    g: pixels[top + 1],
                    b: pixels[top + 2],
                })
                .on(style::Color::Rgb {
                    r: pixels[bottom],
                    g: pixels[bottom + 1],
                    b: pixels[bottom + 2],
                })
            );
        }
        let _ = writeln!(out);
    }
    let _ = out.flush();
}

fn main() {
    let cli = Cli::parse();

    let mut scene = cli.scene.build(cli.seed);
    scene.set_fov(cli.fov).expect("fresh scene is unlocked");
    scene.set_max_reflect_depth(cli.bounces).unwrap();
    scene.set_view_size(cli.width, cli.height).unwrap();
    let scene = Arc::new(scene);

    let format = ImageFormat::new(cli.width, cli.height, rgb24_channels()).expect("RGB format");
    let mut pixels = vec![0u8; format.required_len()];

    eprintln!();
    eprintln!("  Scene:      {} ({}-d)", cli.scene.name(), scene.dimension());
    eprintln!("  Resolution: {}×{}", cli.width, cli.height);
    eprintln!();

    let renderer = BlockingRenderer::new(cli.threads);
    let t0 = Instant::now();
    let completed = renderer
        .render(&mut pixels, &format, &scene)
        .expect("buffer sized from the format");
    let elapsed = t0.elapsed();

    let rays = (cli.width * cli.height) as f64;
    eprintln!(
        "  Time: {:.2}s | {:.2} Mrays/s{}",
        elapsed.as_secs_f64(),
        rays / elapsed.as_secs_f64() / 1e6,
        if completed { "" } else { " (aborted)" }
    );
    eprintln!();

    match cli.output {
        Some(path) => {
            write_ppm(&path, &format, &pixels).expect("writing the PPM file");
            eprintln!("  Wrote {path}");
        }
        None => display_halfblock(&format, &pixels),
    }
}
