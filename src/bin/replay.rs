use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use flate2::read::GzDecoder;
use serde::Deserialize;
use serde_json::json;

use smartnav_rs::dead_reckoning::{DeadReckoningTracker, DrConfig};
use smartnav_rs::integrator::IntegratorMode;
use smartnav_rs::types::{
    AccelSample, GyroSample, LinearAccelSample, MagSample, RotationVectorSample, SensorEvent,
    StepSample,
};

#[derive(Parser, Debug)]
struct Args {
    /// Path to a recorded session log, session_*.json[.gz]
    #[arg(long, conflicts_with = "dir")]
    log: Option<PathBuf>,

    /// Directory of session logs to batch replay
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Integration variant: full3d or planar
    #[arg(long, default_value = "full3d")]
    mode: String,

    /// Replay in real time, sleeping out the recorded inter-sample gaps
    #[arg(long, default_value_t = false)]
    paced: bool,
}

#[derive(Deserialize)]
struct Vec3Data {
    timestamp_nanos: i64,
    x: f64,
    y: f64,
    z: f64,
}

#[derive(Deserialize)]
struct RotationData {
    timestamp_nanos: i64,
    values: Vec<f64>,
}

#[derive(Deserialize)]
struct StepData {
    timestamp_nanos: i64,
    steps: f64,
}

/// One recorded reading; at most one of the sensor fields is set.
#[derive(Deserialize)]
struct Reading {
    accel: Option<Vec3Data>,
    gyro: Option<Vec3Data>,
    mag: Option<Vec3Data>,
    linear_accel: Option<Vec3Data>,
    rotation_vector: Option<RotationData>,
    step: Option<StepData>,
}

#[derive(Deserialize)]
struct LogFile {
    readings: Vec<Reading>,
}

fn load_log(path: &Path) -> anyhow::Result<LogFile> {
    let file = File::open(path)?;
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        let gz = GzDecoder::new(file);
        let reader = BufReader::new(gz);
        Ok(serde_json::from_reader(reader)?)
    } else {
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

fn to_event(r: &Reading) -> Option<SensorEvent> {
    if let Some(a) = r.accel.as_ref() {
        return Some(SensorEvent::Accel(AccelSample {
            timestamp_nanos: a.timestamp_nanos,
            x: a.x,
            y: a.y,
            z: a.z,
        }));
    }
    if let Some(g) = r.gyro.as_ref() {
        return Some(SensorEvent::Gyro(GyroSample {
            timestamp_nanos: g.timestamp_nanos,
            x: g.x,
            y: g.y,
            z: g.z,
        }));
    }
    if let Some(m) = r.mag.as_ref() {
        return Some(SensorEvent::Magnet(MagSample {
            timestamp_nanos: m.timestamp_nanos,
            x: m.x,
            y: m.y,
            z: m.z,
        }));
    }
    if let Some(la) = r.linear_accel.as_ref() {
        return Some(SensorEvent::LinearAccel(LinearAccelSample {
            timestamp_nanos: la.timestamp_nanos,
            x: la.x,
            y: la.y,
            z: la.z,
        }));
    }
    if let Some(rv) = r.rotation_vector.as_ref() {
        return Some(SensorEvent::RotationVector(RotationVectorSample {
            timestamp_nanos: rv.timestamp_nanos,
            values: rv.values.clone(),
        }));
    }
    if let Some(s) = r.step.as_ref() {
        return Some(SensorEvent::StepDetector(StepSample {
            timestamp_nanos: s.timestamp_nanos,
            steps: s.steps,
        }));
    }
    None
}

async fn run_once(path: &Path, args: &Args) -> anyhow::Result<serde_json::Value> {
    let log = load_log(path)?;

    let mode = match args.mode.as_str() {
        "full3d" => IntegratorMode::Full3d,
        "planar" => IntegratorMode::PlanarHeading,
        other => anyhow::bail!("unknown mode '{}', expected full3d or planar", other),
    };
    let mut tracker = DeadReckoningTracker::new(DrConfig { mode, ..Default::default() });
    tracker.start()?;

    let mut poses = 0u64;
    let mut dropped = 0u64;
    let mut max_speed = 0.0f64;
    let mut last_pose = None;
    let mut last_ts: Option<i64> = None;

    for r in &log.readings {
        let Some(event) = to_event(r) else {
            dropped += 1;
            continue;
        };

        if args.paced {
            let ts = event.timestamp_nanos();
            if let Some(prev) = last_ts {
                let gap = ts - prev;
                if gap > 0 {
                    tokio::time::sleep(Duration::from_nanos(gap as u64)).await;
                }
            }
            last_ts = Some(ts);
        }

        if let Some(pose) = tracker.feed(&event) {
            poses += 1;
            max_speed = max_speed.max(pose.speed());
            last_pose = Some(pose);
        }
    }
    tracker.stop()?;
    let snapshot = tracker.snapshot();

    Ok(json!({
        "log": path.display().to_string(),
        "replayed_at": chrono::Utc::now().to_rfc3339(),
        "mode": args.mode,
        "readings": log.readings.len(),
        "unrecognized": dropped,
        "poses": poses,
        "max_speed": max_speed,
        "final_pose": last_pose,
        "snapshot": snapshot,
    }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut results = Vec::new();

    if let Some(dir) = args.dir.as_ref() {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if !(name.ends_with(".json") || name.ends_with(".json.gz")) {
                continue;
            }
            match run_once(&path, &args).await {
                Ok(res) => results.push(res),
                Err(e) => eprintln!("Failed {}: {}", path.display(), e),
            }
        }
    } else if let Some(log) = args.log.as_ref() {
        results.push(run_once(log, &args).await?);
    } else {
        anyhow::bail!("Provide --log or --dir");
    }

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
