use anyhow::Context;
use clap::Parser;
use multiworld_loader::LoaderRegistry;
use multiworld_manager::{ServerConfig, WorldManager};
use multiworld_mirror::TimePolicy;
use multiworld_scene::{empty_world, read_physics};
use multiworld_transport::{ControlChannel, DiscoveryBus};
use std::io::BufReader;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Engines the server tries to support; unsupported ones are skipped.
const CANDIDATE_ENGINES: [&str; 4] = ["ode", "bullet", "dart", "simbody"];

#[derive(Parser)]
#[command(
    name = "multiworld-server",
    about = "Run scenes side by side in several physics engines"
)]
struct Cli {
    /// World file(s)
    worlds: Vec<PathBuf>,

    /// Physics engines to load every world with [ode, bullet, dart, simbody].
    /// When omitted, each world uses the engine its file declares.
    #[arg(short, long, num_args = 1..)]
    engines: Vec<String>,

    /// Keep the world names from the files. Only applies without --engines.
    #[arg(short, long)]
    keep_name: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Server configuration file (YAML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Scene file whose physics replaces each engine's defaults
    #[arg(long)]
    physics: Option<PathBuf>,

    /// Stop after this many iterations
    #[arg(long)]
    iterations: Option<u64>,

    /// Do not load the mirror world
    #[arg(long)]
    no_mirror: bool,

    /// Clock the mirror keeps after each sync [target, current]
    #[arg(long)]
    time_policy: Option<TimePolicy>,
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    if cli.worlds.is_empty() {
        println!("You need to specify at least one world.");
        return Ok(ExitCode::from(2));
    }
    if cli.engines.is_empty() {
        tracing::info!("no engines given, using the physics declared in the world files");
    } else {
        tracing::info!(engines = ?cli.engines, "engines to load");
    }

    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if cli.iterations.is_some() {
        config.max_iterations = cli.iterations;
    }
    if let Some(policy) = cli.time_policy {
        config.time_policy = policy;
    }
    if cli.no_mirror {
        config.mirror_name.clear();
    }

    let physics = cli
        .physics
        .as_ref()
        .map(read_physics)
        .transpose()
        .context("reading physics override")?;

    let bus = DiscoveryBus::new();
    let registry = LoaderRegistry::build(
        &CANDIDATE_ENGINES,
        bus,
        config.discovery(),
        physics.as_ref(),
    )?;

    let mut manager = WorldManager::new(config.time_policy);
    let control = ControlChannel::new();
    manager.attach_control(&control);

    if config.mirror_enabled() {
        let mirror = registry
            .load_auto(empty_world(&config.mirror_name), None)
            .context("loading mirror world")?;
        manager.set_mirror(mirror)?;
    }

    let engines: Vec<&str> = cli.engines.iter().map(String::as_str).collect();
    for (i, file) in cli.worlds.iter().enumerate() {
        let prefix = (!engines.is_empty() || !cli.keep_name).then(|| format!("world_{i}"));
        tracing::info!(file = %file.display(), "loading world");
        if engines.is_empty() {
            match registry.load_auto_file(file, prefix.as_deref()) {
                Ok(world) => manager.add_world(world)?,
                Err(e) => tracing::warn!(file = %file.display(), "could not auto-load world: {e}"),
            }
        } else {
            let prefix = prefix.unwrap_or_default();
            match registry.load_explicit_file(file, &engines, &prefix) {
                Ok(worlds) => {
                    for world in worlds {
                        manager.add_world(world)?;
                    }
                }
                Err(e) => tracing::warn!(file = %file.display(), "could not load world: {e}"),
            }
        }
    }
    if manager.world_count() > 0 {
        manager.set_mirrored_world(config.mirrored_world)?;
    }

    let iterations = manager.run(&config, || Some(BufReader::new(std::io::stdin())))?;
    tracing::info!(iterations, "run finished");
    manager.log_world_states();
    manager.stop();
    Ok(ExitCode::SUCCESS)
}
