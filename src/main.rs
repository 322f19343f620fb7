use std::{
    path::PathBuf,
    sync::{atomic::AtomicBool, Arc},
    time::Instant,
};

use anyhow::Result;
use clap::Parser;
use fxhash::FxHashMap;

use tangent_gen::{
    driver,
    io::{CsvSegmentSink, PointSource, PolygonSource, SegmentSink, TextPointSource, TextPolygonSource},
    params::DEFAULT_PARAMS,
};

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Draws the tangents to polygons passing through external points.")]
pub struct Args {
    /// Path to the point layer file (one `id x y` per line)
    #[arg(short, long)]
    pub points: PathBuf,

    /// Path to the polygon layer file (one `id x1 y1 x2 y2 ...` ring per line)
    #[arg(short = 'g', long)]
    pub polygons: PathBuf,

    /// Output file for the tangent segments
    #[arg(short, long, default_value = "t_line.csv")]
    pub output: PathBuf,

    /// Reverse the azimuth direction (measure star to vertex)
    #[arg(long)]
    pub inverse: bool,

    /// Worker threads; 1 runs the sequential driver
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Log progress every N pairs; 0 disables
    #[arg(long)]
    pub progress_every: Option<usize>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    log::set_max_level(log::LevelFilter::Trace);
    env_logger::builder()
        .filter(None, log::LevelFilter::Info)
        .init();

    let start = Instant::now();

    let mut params = DEFAULT_PARAMS.clone();
    params.inverse = args.inverse;
    if let Some(n) = args.threads {
        params.n_threads = n.max(1);
    }
    if let Some(n) = args.progress_every {
        params.progress_every = n;
    }
    log::info!("{}", params);

    let points = TextPointSource::new(&args.points).load_points()?;
    let polygons = TextPolygonSource::new(&args.polygons).load_polygons()?;
    log::info!("loaded {} points and {} polygons", points.len(), polygons.len());

    let cancel = Arc::new(AtomicBool::new(false));
    let outcome = if params.n_threads > 1 {
        driver::run_parallel(&points, &polygons, &params, &cancel)?
    } else {
        driver::run(&points, &polygons, &params)?
    };

    // Aggregate skipped pairs per polygon for the end-of-run summary
    let mut skipped: FxHashMap<&str, usize> = FxHashMap::default();
    for w in &outcome.warnings {
        *skipped.entry(w.polygon_id.as_str()).or_insert(0) += 1;
    }
    for (polygon_id, n) in skipped {
        log::warn!("polygon '{}': {} pairs skipped", polygon_id, n);
    }

    let mut sink = CsvSegmentSink::create(&args.output)?;
    for segment in &outcome.segments {
        sink.write_segment(segment)?;
    }
    sink.flush()?;

    log::info!(
        "wrote {} segments to {} ({} warnings) in {:.3?}",
        outcome.segments.len(),
        args.output.display(),
        outcome.warnings.len(),
        start.elapsed()
    );
    Ok(())
}
