use std::env;
use std::fs;

use anyhow::{anyhow, Context, Result};

use madnight_runtime::app::print_final_state;
use madnight_runtime::{App, CommandRecorder, FrameStats, Scene};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = CliOptions::parse(env::args().skip(1))?;
    let xml = fs::read_to_string(&options.path)
        .with_context(|| format!("failed to read scene {}", options.path))?;
    let scene = Scene::from_xml(&xml).context("failed to parse scene XML")?;

    println!(
        "Loaded scene with {} objects ({} animations)",
        scene.objects.len(),
        scene.animations.len()
    );
    for object in &scene.objects {
        let tag = if object.tag.is_empty() {
            "untagged"
        } else {
            object.tag.as_str()
        };
        println!(" - {} ({tag})", object.name);
    }

    let mut app = App::from_scene(&scene)?;
    // only the latest frame is kept, the stats are all the CLI reports
    let mut recorder = CommandRecorder::with_history(1);
    let mut totals = FrameStats::default();
    for frame in 0..options.frames {
        let Some(stats) = app.frame(options.delta, &mut recorder) else {
            continue;
        };
        if !options.summary_only {
            println!(
                "frame {frame}: {} primitives, {} rejected, {} dropped",
                stats.submitted,
                stats.rejected(),
                stats.overflowed
            );
        }
        totals += stats;
    }

    for event in app.take_events() {
        println!(
            "marker {} of {} on {} at frame {}",
            event.marker, event.animation, event.object, event.frame
        );
    }
    println!(
        "Rendered {} frames: {} primitives submitted, {} back facing, {} behind camera, {} out of depth, {} off screen, {} dropped",
        app.renderer().frames_rendered(),
        totals.submitted,
        totals.back_facing,
        totals.behind_camera,
        totals.out_of_depth,
        totals.off_screen,
        totals.overflowed
    );
    print_final_state(app.world());
    Ok(())
}

const USAGE: &str = "Usage: madnight-runtime <scene.xml> [--frames N] [--delta TICKS] [--summary-only]";

#[derive(Debug, PartialEq)]
struct CliOptions {
    path: String,
    frames: u32,
    delta: u32,
    summary_only: bool,
}

impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut args = args.into_iter();
        let Some(path) = args.next().filter(|arg| !arg.starts_with("--")) else {
            return Err(anyhow!(USAGE));
        };
        let mut options = Self {
            path,
            frames: 60,
            delta: 1,
            summary_only: false,
        };
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--frames" => options.frames = parse_value(&mut args, "--frames")?,
                "--delta" => options.delta = parse_value(&mut args, "--delta")?,
                "--summary-only" => options.summary_only = true,
                other => {
                    return Err(anyhow!(
                        "Unknown argument: {other}. Expected --frames, --delta or --summary-only"
                    ));
                }
            }
        }
        Ok(options)
    }
}

fn parse_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<u32> {
    let value = args
        .next()
        .ok_or_else(|| anyhow!("{flag} needs a value"))?;
    value
        .parse()
        .with_context(|| format!("{flag} expects a whole number, got {value:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliOptions> {
        CliOptions::parse(args.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn defaults_apply() {
        let options = parse(&["scene.xml"]).unwrap();
        assert_eq!(
            options,
            CliOptions {
                path: "scene.xml".into(),
                frames: 60,
                delta: 1,
                summary_only: false,
            }
        );
    }

    #[test]
    fn flags_are_parsed() {
        let options = parse(&["scene.xml", "--frames", "3", "--delta", "2", "--summary-only"]).unwrap();
        assert_eq!(options.frames, 3);
        assert_eq!(options.delta, 2);
        assert!(options.summary_only);
    }

    #[test]
    fn bad_arguments_are_rejected() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["--frames", "3"]).is_err());
        assert!(parse(&["scene.xml", "--frames"]).is_err());
        assert!(parse(&["scene.xml", "--frames", "many"]).is_err());
        assert!(parse(&["scene.xml", "--fast"]).is_err());
    }
}
