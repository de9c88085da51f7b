//! Orchestrion CLI — run a pattern orchestra against real MIDI ports

use clap::Parser;
use orchestrion::{
    allocate, open_ports, output_ports, AdvanceConfig, Orchestra, OrchestraError, PatternLibrary,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io;
use std::path::PathBuf;
use std::thread;
use tracing::info;

#[derive(Parser)]
#[command(name = "orchestrion")]
#[command(about = "Generative multi-track MIDI pattern orchestra", long_about = None)]
struct Cli {
    /// Directory containing the MIDI pattern files
    patterns: PathBuf,

    /// Number of tracks to play (16 tracks fit on one output port)
    tracks: usize,

    /// Only use output ports whose name contains this substring
    /// (e.g. the name of a virtual MIDI bus like "loopMIDI")
    #[arg(short = 'f', long)]
    port_filter: Option<String>,

    /// Probability that a track advances to its next pattern after finishing one
    #[arg(long, default_value = "0.1")]
    step_chance: f64,

    /// Track that always repeats its pattern, acting as the rhythmic anchor
    #[arg(long, default_value = "0")]
    pulse_track: usize,

    /// Let every track advance stochastically, including the pulse track
    #[arg(long)]
    no_pulse: bool,
}

fn main() -> Result<(), OrchestraError> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    if cli.tracks == 0 {
        return Err(OrchestraError::Configuration(
            "track count must be at least 1 (0 given)".to_string(),
        ));
    }

    let library = PatternLibrary::load(&cli.patterns)?;
    info!(
        "Loaded {} pattern(s) from {}",
        library.len(),
        cli.patterns.display()
    );

    let descriptors = output_ports(cli.port_filter.as_deref())?;
    let names: Vec<&str> = descriptors.iter().map(|d| d.name.as_str()).collect();
    println!("{names:?}");

    let allocation = allocate(cli.tracks, descriptors.len())?;
    let ports = open_ports(&descriptors, allocation.ports_used)?;

    let config = AdvanceConfig {
        step_chance: cli.step_chance,
        pulse_track: (!cli.no_pulse).then_some(cli.pulse_track),
    };
    let rng = Box::new(StdRng::from_entropy());
    let (orchestra, handle) = Orchestra::new(library, allocation, ports, config, rng)?;

    let runner = thread::spawn(move || orchestra.run());

    println!("Press Enter to quit");
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    println!("stopping...");

    handle.shutdown();
    let _ = runner.join();
    Ok(())
}
