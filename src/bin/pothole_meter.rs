//! pothole-meter - replay recorded pothole detections and report size, distance and
//! closing speed per frame, beeping (into the log) when a pothole is big and close.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;

use pothole_meter::{
    AlertLevel, DetectionLog, FrameReport, LogSink, PotholeConfig, Session,
    TrackingMode,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Detection log, one frame per line (`<frame>: [ {x1,y1,x2,y2}, ... ]`).
    detections: PathBuf,
    /// Frame rate of the recording; the configured default is used when omitted.
    #[arg(long)]
    fps: Option<f32>,
    /// TOML config file (overrides POTHOLE_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Cross-frame association strategy: index or centroid.
    #[arg(long)]
    tracking: Option<TrackingMode>,
    /// Print one JSON report per line instead of text.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if let Some(fps) = args.fps {
        if !(fps > 0.0 && fps.is_finite()) {
            return Err(anyhow!("--fps must be a positive number"));
        }
    }

    let mut cfg = match &args.config {
        Some(path) => PotholeConfig::load_from(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PotholeConfig::load().context("loading config")?,
    };
    if let Some(mode) = args.tracking {
        cfg.tracking = mode;
    }

    log::info!(
        "calibration: {:.1} px/m, focal {:.1} px, reference width {:.2} m, tracking {:?}",
        cfg.calibration.pixels_per_meter,
        cfg.calibration.focal_length,
        cfg.calibration.known_width,
        cfg.tracking
    );

    let source = DetectionLog::open(&args.detections, args.fps)
        .with_context(|| format!("opening {}", args.detections.display()))?;

    let mut session = Session::from_config(&cfg)?;
    let rx = session.start(source, LogSink)?;

    let stop = session.stop_handle();
    ctrlc::set_handler(move || stop.stop()).context("error setting Ctrl-C handler")?;

    for report in rx.iter() {
        if args.json {
            println!("{}", serde_json::to_string(&report)?);
        } else {
            print_report(&report);
        }
    }

    session.wait()?;
    Ok(())
}

fn print_report(report: &FrameReport) {
    let mut line = format!(
        "frame {:>5}  speed {:>7.2} km/h",
        report.frame, report.smoothed_speed_kmh
    );

    for obj in &report.objects {
        line.push_str(&format!(
            "  [#{} W:{:.2}m D:{:.2}m",
            obj.track_id, obj.width_m, obj.distance_m
        ));
        if obj.alert != AlertLevel::None {
            line.push_str(&format!(" {}", obj.alert));
        }
        line.push(']');
    }

    if report.skipped > 0 {
        line.push_str(&format!("  ({} skipped)", report.skipped));
    }

    println!("{}", line);
}
