//! beatgrid - play, bounce and author step-sequencer projects
//!
//! Run with: cargo run -- play

mod demo;

use std::{
    io::Write,
    path::PathBuf,
    thread,
    time::{Duration, Instant},
};

use beatgrid::{
    engine::{AudioGraphManager, CpalDevice, EngineEvent},
    export, EngineConfig, ProjectSnapshot,
};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result, WrapErr};

#[derive(Parser)]
#[command(name = "beatgrid", about = "Step sequencer and drum synth")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a project (or the built-in demo) on the default output
    Play {
        /// Project file; the demo groove when omitted
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
        /// Stop after this many seconds
        #[arg(long, default_value_t = 8.0)]
        seconds: f32,
        /// Override the project tempo
        #[arg(long)]
        bpm: Option<f32>,
        /// Engine config (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Render a project to a mono 16-bit WAV
    Bounce {
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long, default_value_t = 8.0)]
        seconds: f32,
        #[arg(long)]
        sample_rate: Option<u32>,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Write the demo groove as a project file
    DemoSnapshot {
        #[arg(short, long)]
        out: PathBuf,
        #[arg(long, default_value_t = 120.0)]
        bpm: f32,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Commands::Play {
            snapshot,
            seconds,
            bpm,
            config,
        } => play(snapshot, seconds, bpm, config),
        Commands::Bounce {
            snapshot,
            out,
            seconds,
            sample_rate,
            config,
        } => {
            let config = load_config(config)?;
            let project = load_project(snapshot)?;
            let rate = sample_rate.unwrap_or(config.offline_sample_rate);
            export::bounce_to_file(&out, &project, seconds, rate, &config)
                .wrap_err_with(|| format!("failed to bounce to {}", out.display()))?;
            println!("Wrote {} ({seconds} s at {rate} Hz)", out.display());
            Ok(())
        }
        Commands::DemoSnapshot { out, bpm } => {
            demo::snapshot(bpm)?
                .save(&out)
                .wrap_err_with(|| format!("failed to write {}", out.display()))?;
            println!("Wrote {}", out.display());
            Ok(())
        }
    }
}

fn load_config(path: Option<PathBuf>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_json_file(&path)
            .wrap_err_with(|| format!("failed to load config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn load_project(path: Option<PathBuf>) -> Result<ProjectSnapshot> {
    match path {
        Some(path) => ProjectSnapshot::load(&path)
            .wrap_err_with(|| format!("failed to load project {}", path.display())),
        None => demo::snapshot(120.0),
    }
}

fn play_duration(seconds: f32) -> Result<Duration> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(eyre!("--seconds must be a positive number, got {seconds}"));
    }
    Duration::try_from_secs_f32(seconds).wrap_err("--seconds is out of range")
}

fn play(
    snapshot: Option<PathBuf>,
    seconds: f32,
    bpm: Option<f32>,
    config: Option<PathBuf>,
) -> Result<()> {
    let duration = play_duration(seconds)?;
    let config = load_config(config)?;
    let project = load_project(snapshot)?;

    let mut manager = AudioGraphManager::new(CpalDevice::new(), config);
    manager.restore(&project)?;
    if let Some(bpm) = bpm {
        manager.set_bpm(bpm);
    }
    manager
        .initialize()
        .wrap_err("failed to start audio output")?;

    println!("=== beatgrid ===");
    println!("BPM: {}", manager.transport().bpm);
    println!("Tracks: {}", manager.sequencer().tracks().len());
    println!("Playing for {seconds} s... Press Ctrl+C to stop");
    println!();

    manager.start();
    let deadline = Instant::now() + duration;
    let mut stdout = std::io::stdout();
    while Instant::now() < deadline {
        for event in manager.poll_events() {
            match event {
                EngineEvent::StepFired { step_index, .. } => {
                    let row: String = (0..16)
                        .map(|i| if i == step_index { '●' } else { '·' })
                        .collect();
                    print!("\r{row}");
                    stdout.flush()?;
                }
                EngineEvent::AudioFault { frame } => log::warn!("audio fault at frame {frame}"),
                EngineEvent::Error(message) => log::error!("{message}"),
                _ => {}
            }
        }
        thread::sleep(Duration::from_millis(15));
    }
    println!();

    manager.stop();
    // let release tails ring out
    thread::sleep(Duration::from_millis(300));
    manager.dispose();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_duration_rejects_non_finite_and_non_positive() {
        for seconds in [0.0, -2.0, f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            assert!(play_duration(seconds).is_err(), "{seconds}");
        }
        assert_eq!(play_duration(1.5).expect("duration"), Duration::from_millis(1500));
    }
}
