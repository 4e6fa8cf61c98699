use std::{
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
};

use anyhow::{Context, bail};
use clap::Parser;
use log::error;
use mdl_model::{ControllerValues, ModelRoot, evaluate_bones, load_model};
use rayon::prelude::*;
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(author, version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// The folder to search recursively like the "valve/models" folder of a game install.
    root_folder: String,

    /// The glob pattern for model files.
    #[arg(long, default_value = "*.mdl")]
    pattern: String,

    /// The number of evenly spaced frames to evaluate for each sequence.
    #[arg(long, default_value_t = 4)]
    frames: usize,

    /// Show info logs like missing companion files.
    #[arg(long)]
    verbose: bool,

    /// Print the time spent in each load and decode step.
    #[arg(long)]
    trace: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Ignore most logs to avoid flooding the console.
    simple_logger::SimpleLogger::new()
        .with_level(if cli.verbose {
            log::LevelFilter::Info
        } else {
            log::LevelFilter::Warn
        })
        .init()?;

    if cli.trace {
        let subscriber = tracing_subscriber::fmt()
            .with_span_events(FmtSpan::CLOSE)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    let start = std::time::Instant::now();

    let checked = AtomicUsize::new(0);
    let failed = AtomicUsize::new(0);

    globwalk::GlobWalkerBuilder::from_patterns(&cli.root_folder, &[cli.pattern.as_str()])
        .case_insensitive(true)
        .build()?
        .par_bridge()
        .for_each(|entry| {
            let path = match entry {
                Ok(entry) => entry.into_path(),
                Err(e) => {
                    error!("Error reading directory entry: {e}");
                    return;
                }
            };

            // Companion files are loaded with their primary model.
            if is_companion_file(&path) {
                return;
            }

            checked.fetch_add(1, Ordering::Relaxed);
            if let Err(e) = check_model(&path, cli.frames) {
                println!("{path:?}: {e:?}");
                failed.fetch_add(1, Ordering::Relaxed);
            }
        });

    let checked = checked.into_inner();
    let failed = failed.into_inner();
    println!(
        "Checked {checked} files with {failed} failures in {:?}",
        start.elapsed()
    );

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Texture files like `barneyT.mdl` and sequence group files like `barney01.mdl`
/// next to a primary `barney.mdl` file.
fn is_companion_file(path: &Path) -> bool {
    let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
        return false;
    };

    let primary_stem = if let Some(stem) = stem.strip_suffix('T') {
        stem
    } else if let Some((stem, digits)) = split_group_suffix(stem) {
        if !digits.parse::<u32>().is_ok_and(|n| (1..=31).contains(&n)) {
            return false;
        }
        stem
    } else {
        return false;
    };

    let mut file_name = primary_stem.to_string();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        file_name.push('.');
        file_name.push_str(extension);
    }
    !primary_stem.is_empty() && path.with_file_name(file_name).exists()
}

fn split_group_suffix(stem: &str) -> Option<(&str, &str)> {
    let i = stem.len().checked_sub(2)?;
    let digits = stem.get(i..)?;
    digits
        .bytes()
        .all(|b| b.is_ascii_digit())
        .then(|| (&stem[..i], digits))
}

fn check_model(path: &Path, frames: usize) -> anyhow::Result<()> {
    let root = load_model(path).with_context(|| format!("failed to load {path:?}"))?;
    check_sequences(&root, frames)
}

fn check_sequences(root: &ModelRoot, frames: usize) -> anyhow::Result<()> {
    let values = ControllerValues::default();

    for (i, sequence) in root.sequences.iter().enumerate() {
        // Unavailable animations are already logged while loading.
        if sequence.animation.is_none() {
            continue;
        }

        for f in 0..frames {
            let frame = sample_frame(sequence.frame_count, f, frames);
            if let Some(transforms) = evaluate_bones(root, i, frame, &values)
                && let Some(bone) = transforms.iter().position(|t| !t.is_finite())
            {
                bail!(
                    "sequence {i} {:?} has a non finite transform for bone {bone} at frame {frame}",
                    sequence.label
                );
            }
        }
    }

    Ok(())
}

/// The frame for sample `index` of `count` samples evenly spaced over the sequence.
fn sample_frame(frame_count: u32, index: usize, count: usize) -> f32 {
    if count <= 1 || frame_count <= 1 {
        0.0
    } else {
        (frame_count - 1) as f32 * index as f32 / (count - 1) as f32
    }
}
