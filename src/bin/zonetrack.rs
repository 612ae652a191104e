//! Replays recorded detections through the tracker, the zone and the store.
//!
//! Usage:
//!   zonetrack --config config/config.ini

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::Parser;
use log::{error, info};
use zonetrack::config::Config;
use zonetrack::persistence::jsonl::JsonlStore;
use zonetrack::persistence::memory::MemoryStore;
use zonetrack::persistence::Persistence;
use zonetrack::pipeline::replay::{ReplayDetector, ReplaySource};
use zonetrack::pipeline::runner::{FrameSource, Runner};
use zonetrack::pipeline::Pipeline;
use zonetrack::trackers::mot::MultiObjectTracker;

/// Multi-object tracking with grid zones
#[derive(Parser)]
#[command(name = "zonetrack", about = "Track detections and record zone transitions")]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "config/config.ini")]
    config: PathBuf,
}

fn run<P: Persistence + 'static>(config: &Config, source: &mut ReplaySource, store: P) -> Result<()> {
    let grid = config.grid()?;
    let zone = config.roi_zone(&grid)?;
    info!("Zone {:x} covers {} cells", zone.id(), zone.cells().len());

    let pipeline = Pipeline::new(grid, zone, store);
    let mut runner = Runner::new(
        ReplayDetector,
        config.detection_filter(),
        MultiObjectTracker::new(config.tracker_options()),
        config.tracker.detection_rate,
    );
    let summary = runner.run(source, &pipeline)?;
    let output = pipeline.shutdown()?;

    println!(
        "frames={} detector_runs={} dropped={} events={} occupancy={}",
        summary.frames,
        summary.detections,
        summary.dropped,
        output.events,
        output.zone.occupancy()
    );
    for (cell, count) in output.store.load_cell_traffic()? {
        println!("cell {:>5}: {} records", cell, count);
    }

    // trajectories are redrawn on a grid regenerated from the configuration
    let mut grid = config.grid()?;
    grid.with_scores(output.store.load_cell_scores()?)?;
    for track_id in output.store.load_track_ids()? {
        let cells = output
            .store
            .load_track_points(track_id)?
            .iter()
            .filter_map(|p| grid.cell(p.cell_id))
            .map(|c| format!("{}@({},{}) {:.2}", c.id, c.x, c.y, c.score))
            .collect::<Vec<_>>();
        println!("track {:>5}: {}", track_id, cells.join(" -> "));
    }
    Ok(())
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let dimensions = (config.general.frame_width, config.general.frame_height);
    let mut source = match ReplaySource::open(&config.general.source, dimensions) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    };
    info!("Frame source {}x{}", source.dimensions().0, source.dimensions().1);

    let res = match &config.general.store {
        Some(path) => JsonlStore::open(path).and_then(|store| run(&config, &mut source, store)),
        None => run(&config, &mut source, MemoryStore::new()),
    };
    if let Err(e) = res {
        eprintln!("Error: {:#}", e);
        process::exit(2);
    }
}
