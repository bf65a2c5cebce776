use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use dba_lib::dba::TrackLayout;
use dba_model::{
    Clip, CompressionConfig, Skeleton, compress::build_database, database::SerializeOptions,
};
use log::{error, info};
use rayon::prelude::*;

#[derive(Parser)]
#[command(author, version, about)]
#[command(propagate_version = true)]
struct Cli {
    /// The folder containing clip .json files. Subfolders are also searched.
    input_folder: String,

    /// The skeleton .json file for resolving bone names and rig values.
    skeleton: String,

    /// The output .dba file.
    output: String,

    /// The compression config .json file.
    /// If not specified, all keys are kept without deleting channels.
    #[arg(long)]
    config: Option<String>,

    /// Write big endian data instead of little endian.
    #[arg(long)]
    big_endian: bool,

    /// Anchor track offsets to the end of the file and reserve space for loading in place.
    #[arg(long)]
    in_place: bool,

    /// The pointer size in bytes of the target platform.
    #[arg(long, default_value_t = 8)]
    pointer_size: u32,

    /// The minimum level for log messages.
    #[arg(long, default_value_t = log::LevelFilter::Warn)]
    log_level: log::LevelFilter,

    /// Print the time spent in each compression stage.
    #[arg(long)]
    trace: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    simple_logger::SimpleLogger::new()
        .with_level(cli.log_level)
        .init()?;

    if cli.trace {
        tracing::subscriber::set_global_default(
            tracing_subscriber::fmt()
                .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
                .finish(),
        )?;
    }

    let start = std::time::Instant::now();

    let skeleton = Skeleton::from_json(&cli.skeleton)
        .with_context(|| format!("failed to load skeleton {:?}", cli.skeleton))?;
    let config = match &cli.config {
        Some(path) => CompressionConfig::from_json(path)
            .with_context(|| format!("failed to load config {path:?}"))?,
        None => CompressionConfig::default(),
    };

    let clips = load_clips(&cli.input_folder)?;
    info!("Loaded {} clips in {:?}", clips.len(), start.elapsed());

    let database = build_database(&clips, &skeleton, &config);
    let stats = database.stats();
    println!(
        "Stored {} rotation, {} position, and {} key time tracks for {} controllers in {} clips",
        stats.rotation_tracks,
        stats.position_tracks,
        stats.key_time_tracks,
        stats.controllers,
        stats.clips
    );

    let options = SerializeOptions {
        big_endian: cli.big_endian,
        layout: if cli.in_place {
            TrackLayout::EndAnchored
        } else {
            TrackLayout::Forward
        },
        pointer_size: cli.pointer_size,
    };
    let size = database
        .serialize(&cli.output, &options)
        .with_context(|| format!("failed to write {:?}", cli.output))?;

    println!("Wrote {size} bytes to {:?}", cli.output);
    println!("Finished in {:?}", start.elapsed());
    Ok(())
}

fn load_clips(input_folder: &str) -> anyhow::Result<Vec<Clip>> {
    let mut clips: Vec<(PathBuf, Clip)> =
        globwalk::GlobWalkerBuilder::from_patterns(input_folder, &["*.json"])
            .build()?
            .par_bridge()
            .filter_map(|entry| {
                let path = entry.ok()?.into_path();
                match Clip::from_json(&path) {
                    Ok(clip) => Some((path, clip)),
                    Err(e) => {
                        error!("Error reading {path:?}: {e}");
                        None
                    }
                }
            })
            .collect();

    // Sort by path to make the database independent of the file system traversal order.
    clips.sort_by(|(a, _), (b, _)| a.cmp(b));
    Ok(clips.into_iter().map(|(_, clip)| clip).collect())
}
