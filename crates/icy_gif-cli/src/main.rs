//! gifpack - Pack images and animations into small GIFs
//!
//! A command-line tool that turns still images or animated GIFs into a
//! size-budgeted animated GIF.

mod source;

use clap::{Parser, Subcommand};
use icy_gif::{
    build_gif, frame_delay_for_fps, quantize, target_dimensions, GifSettings, QuantizeOptions, Rgb,
};
use source::FileSource;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "gifpack")]
#[command(author = "Mike Krüger <mkrueger@posteo.de>")]
#[command(version)]
#[command(about = "Pack images and animations into small GIFs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode one or more images into an animated GIF
    Encode {
        /// Input files (PNG, JPEG, WebP, BMP or animated GIF), one frame per still image
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output GIF file (default: first input with .packed.gif extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Longest side of the output in pixels (0 keeps the source size)
        #[arg(long, default_value_t = 240)]
        max_size: u32,

        /// Maximum number of colors per frame (2-256)
        #[arg(short, long, default_value_t = 64)]
        colors: u16,

        /// Maximum number of frames
        #[arg(long, default_value_t = 60)]
        max_frames: usize,

        /// Output size budget in bytes
        #[arg(short, long, default_value_t = 20_000)]
        limit: usize,

        /// Composite transparent pixels onto the background color
        #[arg(long)]
        no_alpha: bool,

        /// Disable Floyd-Steinberg dithering
        #[arg(long)]
        no_dither: bool,

        /// Loop count (0 = forever)
        #[arg(long = "loop", value_name = "N", default_value_t = 0)]
        loop_count: u16,

        /// Play the animation once
        #[arg(long, conflicts_with = "loop_count")]
        no_loop: bool,

        /// Delay in milliseconds for frames without their own timing
        #[arg(long, value_name = "MS")]
        delay: Option<u32>,

        /// Frame rate for frames without their own timing
        #[arg(long, conflicts_with = "delay")]
        fps: Option<u32>,

        /// Background color (RGB or RRGGBB, optional leading #)
        #[arg(long, value_parser = parse_hex_color, default_value = "000000")]
        background: Rgb,

        /// Write the file even if it exceeds the size budget
        #[arg(short, long)]
        force: bool,
    },

    /// Print the palette the quantizer picks for an image
    Palette {
        /// Input image file
        input: PathBuf,

        /// Maximum number of colors (2-256)
        #[arg(short, long, default_value_t = 64)]
        colors: u16,

        /// Disable Floyd-Steinberg dithering
        #[arg(long)]
        no_dither: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Encode {
            inputs,
            output,
            max_size,
            colors,
            max_frames,
            limit,
            no_alpha,
            no_dither,
            loop_count,
            no_loop,
            delay,
            fps,
            background,
            force,
        } => {
            let first = &inputs[0];
            let (src_width, src_height) = image::image_dimensions(first)
                .map_err(|e| format!("Failed to open '{}': {}", first.display(), e))?;
            let max_dimension = (max_size > 0).then_some(max_size);
            let (width, height) = target_dimensions(src_width, src_height, max_dimension);

            let defaults = GifSettings::default();
            let settings = GifSettings {
                max_dimension,
                colors: colors.clamp(2, 256),
                max_frames,
                limit_bytes: limit,
                keep_alpha: !no_alpha,
                dither: !no_dither,
                loop_count: (!no_loop).then_some(loop_count),
                base_delay_ms: delay
                    .or(fps.map(frame_delay_for_fps))
                    .unwrap_or(defaults.base_delay_ms),
                background,
                ..defaults
            };

            eprintln!(
                "Encoding {} input(s) at {}x{} with {} colors",
                inputs.len(),
                width,
                height,
                settings.colors
            );

            let output_path = output.unwrap_or_else(|| default_output(first));
            let mut source = FileSource::new(inputs, width, height, max_frames);
            let gif = build_gif(&mut source, &settings)?;

            let verdict = if gif.within_budget(limit) {
                "within budget"
            } else {
                "over budget"
            };
            eprintln!(
                "{}x{}, {} frames, {} colors, {} ({} of {})",
                gif.width,
                gif.height,
                gif.frames,
                gif.colors,
                format_bytes(gif.bytes.len()),
                verdict,
                format_bytes(limit)
            );

            if !gif.within_budget(limit) && !force {
                return Err(format!(
                    "Output is {} but the limit is {}; lower --colors, --max-size or \
                     --max-frames, or pass --force",
                    format_bytes(gif.bytes.len()),
                    format_bytes(limit)
                )
                .into());
            }

            fs::write(&output_path, &gif.bytes)
                .map_err(|e| format!("Failed to write '{}': {}", output_path.display(), e))?;
            eprintln!(
                "Written {} bytes to '{}'",
                gif.bytes.len(),
                output_path.display()
            );
        }

        Commands::Palette {
            input,
            colors,
            no_dither,
        } => {
            let img = image::open(&input)
                .map_err(|e| format!("Failed to open '{}': {}", input.display(), e))?;
            let rgba_img = img.to_rgba8();
            let (width, height) = rgba_img.dimensions();
            let pixels = rgba_img.into_raw();

            let opts = QuantizeOptions {
                max_colors: colors.clamp(2, 256),
                dither: !no_dither,
                ..Default::default()
            };
            let q = quantize(&pixels, width as usize, height as usize, &opts)?;

            println!(
                "'{}' ({}x{}): {} colors",
                input.display(),
                width,
                height,
                q.color_count
            );
            let mut usage = vec![0usize; q.palette.len()];
            for &index in &q.indices {
                usage[index as usize] += 1;
            }
            for (i, (c, count)) in q.palette.iter().zip(&usage).enumerate() {
                let marker = if q.transparent_index == Some(i as u8) {
                    " transparent"
                } else {
                    ""
                };
                println!(
                    "{:3}  #{:02x}{:02x}{:02x}  {:8} px{}",
                    i, c.r, c.g, c.b, count, marker
                );
            }
        }
    }

    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    input.with_extension("packed.gif")
}

/// Parse `RGB`, `RRGGBB`, `#RGB` or `#RRGGBB`.
fn parse_hex_color(s: &str) -> Result<Rgb, String> {
    let hex = s.strip_prefix('#').unwrap_or(s);
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(format!("'{}' is not a hex color", s));
    }
    let channel = |digits: &str| u8::from_str_radix(digits, 16).map_err(|e| e.to_string());
    match hex.len() {
        3 => {
            let short = |i: usize| channel(&hex[i..=i]).map(|v| v * 17);
            Ok(Rgb::new(short(0)?, short(1)?, short(2)?))
        }
        6 => Ok(Rgb::new(
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        )),
        _ => Err(format!("'{}' is not a hex color (use RGB or RRGGBB)", s)),
    }
}

fn format_bytes(bytes: usize) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} kB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
