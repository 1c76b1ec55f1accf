//! raw2mp4 - encode raw RGBA frame files into an H.264 MP4.
//!
//! Each frame file holds exactly `width * height * 4` bytes of RGBA8888,
//! row-major, no header. Frames are encoded in the order given.
//!
//! Usage:
//!   raw2mp4 [options] <output> <width> <height> <frame>...
//!
//! Options:
//!   --fps <N[/D]>     Input frame rate (default: 15)
//!   --keyint <N>      Force a keyframe every N frames (default: first only)
//!   --fragmented      Write a fragmented MP4, one fragment per keyframe

use anyhow::{Context, Result};
use raw2mp4::{expected_frame_size, EncodingSession, SessionConfig};
use std::io::Read;

struct Args {
    output: String,
    width: u32,
    height: u32,
    frames: Vec<String>,
    fps: (u32, u32),
    keyint: u32,
    fragmented: bool,
}

fn parse_fps(value: &str) -> Option<(u32, u32)> {
    match value.split_once('/') {
        Some((num, den)) => Some((num.parse().ok()?, den.parse().ok()?)),
        None => Some((value.parse().ok()?, 1)),
    }
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut fps = (15, 1);
    let mut keyint = 0;
    let mut fragmented = false;
    let mut positional: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--fps" if i + 1 < args.len() => {
                fps = match parse_fps(&args[i + 1]) {
                    Some(fps) => fps,
                    None => {
                        eprintln!("Error: invalid --fps value {}", args[i + 1]);
                        std::process::exit(2);
                    }
                };
                i += 2;
            }
            "--keyint" if i + 1 < args.len() => {
                keyint = match args[i + 1].parse() {
                    Ok(keyint) => keyint,
                    Err(_) => {
                        eprintln!("Error: invalid --keyint value {}", args[i + 1]);
                        std::process::exit(2);
                    }
                };
                i += 2;
            }
            "--fragmented" => {
                fragmented = true;
                i += 1;
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            _ => {
                positional.push(args[i].clone());
                i += 1;
            }
        }
    }

    if positional.len() < 4 {
        print_usage();
        std::process::exit(2);
    }
    let width = positional[1].parse().unwrap_or(0);
    let height = positional[2].parse().unwrap_or(0);
    if width == 0 || height == 0 {
        eprintln!(
            "Error: invalid geometry {}x{}",
            positional[1], positional[2]
        );
        std::process::exit(2);
    }

    Args {
        output: positional[0].clone(),
        width,
        height,
        frames: positional[3..].to_vec(),
        fps,
        keyint,
        fragmented,
    }
}

fn print_usage() {
    println!("raw2mp4 - encode raw RGBA frames into an H.264 MP4 file");
    println!();
    println!("Usage: raw2mp4 [options] <output> <width> <height> <frame>...");
    println!();
    println!("Options:");
    println!("  --fps <N[/D]>     Input frame rate (default: 15)");
    println!("  --keyint <N>      Force a keyframe every N frames (default: first only)");
    println!("  --fragmented      Write a fragmented MP4, one fragment per keyframe");
    println!();
    println!("Examples:");
    println!("  raw2mp4 out.mp4 640 480 frame_*.rgba");
    println!("  raw2mp4 --fps 30000/1001 --keyint 30 --fragmented out.mp4 640 480 frame_*.rgba");
}

/// Read up to `buf.len()` bytes, returning how many were read.
fn read_frame(path: &str, buf: &mut [u8]) -> Result<usize> {
    let mut file =
        std::fs::File::open(path).with_context(|| format!("Unable to open file {}", path))?;
    let mut filled = 0;
    while filled < buf.len() {
        let n = file
            .read(&mut buf[filled..])
            .with_context(|| format!("Unable to read file {}", path))?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("raw2mp4=info".parse()?)
                .add_directive("warn".parse()?),
        )
        .init();

    let args = parse_args();
    let config = SessionConfig::new(args.width, args.height)
        .framerate(args.fps.0, args.fps.1)
        .keyframe_interval(args.keyint)
        .fragmented(args.fragmented);

    println!("writing to {}", args.output);
    let mut session = EncodingSession::open(&args.output, config)?;

    let mut frame = vec![0u8; expected_frame_size(args.width, args.height)];
    for path in &args.frames {
        let n = read_frame(path, &mut frame)?;
        if n < frame.len() {
            eprintln!("Short read ({}) from {}", n, path);
            std::process::exit(1);
        }
        session.add_frame(&frame)?;
    }

    let summary = session.finish()?;
    println!(
        "{}: {} frames, {:.3}s",
        args.output,
        summary.frames_written,
        summary.duration_secs()
    );
    Ok(())
}
