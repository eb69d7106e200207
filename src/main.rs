use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::info;
use std::path::PathBuf;

use traffic_network::harness::InvariantChecker;
use traffic_network::simulation::{
    CyclingController, FixedController, NetworkDefinition, PhaseController, QueueController,
    SimWorld,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ControllerKind {
    /// Hold the phases given by --phases
    Fixed,
    /// Advance every junction one phase every --cycle-ticks ticks
    Cycle,
    /// Favour the phase serving the longest queue
    Queue,
}

#[derive(Parser)]
#[command(name = "traffic_network")]
#[command(about = "Headless traffic network simulation with signal-controlled junctions")]
struct Cli {
    /// Number of simulation ticks to run
    #[arg(long, default_value = "1000")]
    ticks: u64,

    /// Seed for the spawn streams
    #[arg(long, default_value = "4321")]
    seed: u64,

    /// TOML network definition; the built-in network is used if omitted
    #[arg(long)]
    network: Option<PathBuf>,

    /// How junction phases are chosen
    #[arg(long, value_enum, default_value = "queue")]
    controller: ControllerKind,

    /// Phase requests per junction for the fixed controller
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    phases: Vec<f64>,

    /// Ticks between phase changes for the cycling controller
    #[arg(long, default_value = "20")]
    cycle_ticks: u64,

    /// Print a summary every this many ticks
    #[arg(long, default_value = "100")]
    report_every: u64,

    /// Draw the ASCII map with each summary
    #[arg(long)]
    map: bool,

    /// Verify flow invariants after every tick
    #[arg(long)]
    check: bool,

    /// Milliseconds to pause after each summary
    #[arg(long, default_value = "0")]
    pace_ms: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn,traffic_network=info"),
    )
    .init();

    let cli = Cli::parse();
    run_headless(&cli)
}

/// Run the simulation in headless mode (no graphics)
fn run_headless(cli: &Cli) -> Result<()> {
    let network = match &cli.network {
        Some(path) => NetworkDefinition::load(path)
            .with_context(|| format!("failed to load network from {}", path.display()))?,
        None => NetworkDefinition::default_network(),
    };

    let mut controller: Box<dyn PhaseController> = match cli.controller {
        ControllerKind::Fixed => Box::new(FixedController::new(cli.phases.clone())),
        ControllerKind::Cycle => Box::new(CyclingController::new(cli.cycle_ticks)),
        ControllerKind::Queue => Box::new(QueueController::default()),
    };

    info!(
        "running {} ticks with {:?} controller, seed {}",
        cli.ticks, cli.controller, cli.seed
    );

    let mut world = SimWorld::new(network, cli.seed);
    let mut checker = cli.check.then(|| InvariantChecker::new(&world));

    println!("Initial state:");
    world.print_summary();
    if cli.map {
        world.draw_map();
    }
    println!();

    let report_every = cli.report_every.max(1);
    while world.tick_count() < cli.ticks {
        let report = world.tick_with(controller.as_mut());
        if let Some(checker) = checker.as_mut() {
            checker.check(&world, &report)?;
        }

        if world.tick_count() % report_every == 0 && world.tick_count() < cli.ticks {
            println!("--- After tick {} ---", world.tick_count());
            world.print_summary();
            if cli.map {
                world.draw_map();
            }
            println!();
            if cli.pace_ms > 0 {
                std::thread::sleep(std::time::Duration::from_millis(cli.pace_ms));
            }
        }
    }

    println!("=== Final State ===");
    world.print_summary();
    if cli.map {
        world.draw_map();
    }

    let metrics = world.metrics();
    info!("SIMULATION COMPLETE");
    info!("Ticks: {}", world.tick_count());
    info!("Vehicles exited: {}", metrics.exits);
    info!("Vehicles in network: {}", metrics.occupied);
    info!("Occupancy: {:.1}%", metrics.occupancy_ratio * 100.0);
    Ok(())
}
