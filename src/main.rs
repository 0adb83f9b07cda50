//! fxcore CLI - DSP probe
//!
//! Renders synthetic signals through the fxcore components and prints
//! JSON measurements.

use clap::Parser;
use env_logger::Env;
use log::info;
use serde_json::Value;

use fxcore::cli::{commands, Cli, Commands};
use fxcore::FxConfig;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    info!("fxcore probe v{}", env!("CARGO_PKG_VERSION"));

    let Some(command) = cli.command else {
        println!("fxcore probe v{}", env!("CARGO_PKG_VERSION"));
        println!("Use --help for available commands");
        return Ok(());
    };

    let config = commands::load_config(cli.config.as_deref())?;
    let report = handle_command(command, config)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Apply command-line overrides on top of the config, then run.
fn handle_command(cmd: Commands, mut config: FxConfig) -> anyhow::Result<Value> {
    match cmd {
        Commands::Filter {
            kind,
            frequency,
            q,
            gain_db,
            probe,
        } => {
            if let Some(kind) = kind {
                config.biquad.kind = kind;
            }
            if let Some(frequency) = frequency {
                config.biquad.frequency = frequency;
            }
            if let Some(q) = q {
                config.biquad.q = q;
            }
            if let Some(gain_db) = gain_db {
                config.biquad.gain_db = gain_db;
            }
            commands::filter(&config, &probe)
        }
        Commands::Reverb {
            tank,
            size,
            damping,
            seconds,
        } => {
            if let Some(tank) = tank {
                config.reverb.tank = tank;
            }
            if let Some(size) = size {
                config.reverb.size = size;
            }
            if let Some(damping) = damping {
                config.reverb.damping = damping;
            }
            commands::reverb(&config, seconds)
        }
        Commands::Stft {
            frame_size,
            overlap,
            seconds,
        } => {
            if let Some(frame_size) = frame_size {
                config.stft.frame_size = frame_size;
            }
            if let Some(overlap) = overlap {
                config.stft.overlap = overlap;
            }
            commands::stft(&config, seconds)
        }
        Commands::Match {
            detector,
            fft,
            tone,
            seconds,
        } => {
            if let Some(detector) = detector {
                config.spectrum_match.detector = detector;
            }
            commands::spectrum_match(&config, fft, tone, seconds)
        }
        Commands::Envelope {
            attack_ms,
            release_ms,
            hold_ms,
            seconds,
        } => {
            if let Some(attack_ms) = attack_ms {
                config.envelope.attack_ms = attack_ms;
            }
            if let Some(release_ms) = release_ms {
                config.envelope.release_ms = release_ms;
            }
            if let Some(hold_ms) = hold_ms {
                config.envelope.hold_ms = hold_ms;
            }
            commands::envelope(&config, seconds)
        }
        Commands::Transient { attack, seconds } => {
            if let Some(attack) = attack {
                config.transient.attack = attack;
            }
            commands::transient(&config, seconds)
        }
        Commands::Clip {
            mode,
            drive_db,
            ceiling,
            amplitude,
            seconds,
        } => {
            if let Some(mode) = mode {
                config.clipper.mode = mode;
            }
            if let Some(drive_db) = drive_db {
                config.clipper.drive_db = drive_db;
            }
            if let Some(ceiling) = ceiling {
                config.clipper.ceiling = ceiling;
            }
            commands::clip(&config, amplitude, seconds)
        }
        Commands::PrintConfig => commands::print_config(&config),
    }
}
