//! Replay dataset pipeline.
//!
//! # Usage
//!
//! ```bash
//! # Sample frames from action logs
//! cargo run -p replay_pipeline -- sample --match-list lists/Terran_vs_Terran.json
//!
//! # Extract observations through an engine bridge
//! cargo run -p replay_pipeline -- extract --match-list lists/Terran_vs_Terran.json \
//!     --engine ./sc2-bridge --workers 16
//!
//! # Use a config file, overriding one value
//! cargo run -p replay_pipeline -- --config pipeline.ron extract --match-list lists/Zerg_vs_Zerg.json --map-size 32
//! ```
//!
//! Logs go to stderr. Set `RUST_LOG` for per-module filtering.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use replay_core::sampler::AbilityTable;
use replay_pipeline::{
    run_sampling, Dispatcher, MatchList, PipelineConfig, PipelineError, ProcessLauncher,
};

/// Exit status after an interrupt (128 + SIGINT).
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[command(name = "replay_pipeline")]
#[command(about = "Turn recorded matches into training datasets")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// RON config file (flags override its values)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Dataset root directory
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    /// Worker threads
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Choose frames to capture from recorded action logs
    Sample {
        /// Match list JSON file (its stem names the matchup)
        #[arg(short, long)]
        match_list: PathBuf,

        /// Directory of per-replay info files
        #[arg(long)]
        infos: Option<PathBuf>,

        /// Ability table (RON)
        #[arg(long)]
        abilities: Option<PathBuf>,

        /// Game loops per action step
        #[arg(long)]
        step_mul: Option<u32>,

        /// Periodic capture interval in game loops
        #[arg(long)]
        skip: Option<u32>,
    },

    /// Replay matches and write encoded observations
    Extract {
        /// Match list JSON file (its stem names the matchup)
        #[arg(short, long)]
        match_list: PathBuf,

        /// Engine program speaking the JSON-lines protocol
        #[arg(long)]
        engine: Option<String>,

        /// Extra engine arguments
        #[arg(long = "engine-arg")]
        engine_args: Vec<String>,

        /// Directory custom maps are resolved against
        #[arg(long)]
        maps: Option<PathBuf>,

        /// Matches per engine session
        #[arg(long)]
        batch_size: Option<usize>,

        /// Feature layer resolution
        #[arg(long)]
        map_size: Option<u32>,

        /// Delay between worker starts (milliseconds)
        #[arg(long)]
        stagger_ms: Option<u64>,

        /// How long Ctrl-C waits for workers to clean up (milliseconds)
        #[arg(long)]
        interrupt_grace_ms: Option<u64>,

        /// Write the run summary as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging to stderr
    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let registry = tracing_subscriber::registry().with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true),
    );
    if std::env::var_os("RUST_LOG").is_some() {
        registry.with(EnvFilter::from_default_env()).init();
    } else {
        registry
            .with(tracing_subscriber::filter::LevelFilter::from_level(
                log_level,
            ))
            .init();
    }

    let mut config = load_config(cli.config.as_deref());
    if let Some(dataset) = cli.dataset {
        config = config.with_dataset_dir(dataset);
    }
    if let Some(workers) = cli.workers {
        config = config.with_workers(workers);
    }

    match cli.command {
        Commands::Sample {
            match_list,
            infos,
            abilities,
            step_mul,
            skip,
        } => {
            if let Some(infos) = infos {
                config = config.with_infos_dir(infos);
            }
            if let Some(abilities) = abilities {
                config = config.with_abilities(abilities);
            }
            let step_mul = step_mul.unwrap_or(config.step_mul);
            let skip = skip.unwrap_or(config.skip);
            config = config.with_sampling(step_mul, skip);
            cmd_sample(&config, &match_list);
        }
        Commands::Extract {
            match_list,
            engine,
            engine_args,
            maps,
            batch_size,
            map_size,
            stagger_ms,
            interrupt_grace_ms,
            report,
        } => {
            if engine.is_some() || !engine_args.is_empty() {
                let program = engine.unwrap_or_else(|| config.engine.program.clone());
                config = config.with_engine(&program, engine_args);
            }
            if let Some(maps) = maps {
                config = config.with_maps_dir(maps);
            }
            if let Some(batch_size) = batch_size {
                config = config.with_batch_size(batch_size);
            }
            if let Some(map_size) = map_size {
                config = config.with_map_size(map_size);
            }
            if let Some(ms) = stagger_ms {
                config = config.with_stagger(std::time::Duration::from_millis(ms));
            }
            if let Some(ms) = interrupt_grace_ms {
                config = config.with_interrupt_grace(std::time::Duration::from_millis(ms));
            }
            cmd_extract(config, &match_list, report.as_deref());
        }
    }
}

fn load_config(path: Option<&Path>) -> PipelineConfig {
    let Some(path) = path else {
        return PipelineConfig::default();
    };
    match PipelineConfig::load(path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "Loaded config");
            config
        }
        Err(e) => {
            tracing::error!(error = %e, path = %path.display(), "Failed to load config");
            eprintln!("FATAL: Cannot load config '{}': {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

fn load_match_list(path: &Path) -> MatchList {
    match MatchList::load(path) {
        Ok(list) => list,
        Err(e) => {
            tracing::error!(error = %e, path = %path.display(), "Failed to load match list");
            eprintln!("FATAL: Cannot load match list '{}': {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

/// Sample frames for every match in the list
fn cmd_sample(config: &PipelineConfig, match_list: &Path) {
    let matches = load_match_list(match_list);

    let table = match std::fs::read_to_string(&config.abilities)
        .map_err(|e| PipelineError::io(&config.abilities, e))
        .and_then(|text| AbilityTable::from_ron(&text).map_err(PipelineError::from))
    {
        Ok(table) => table,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load ability table");
            eprintln!("FATAL: Cannot load ability table: {}", e);
            std::process::exit(1);
        }
    };
    tracing::info!(abilities = table.len(), "Loaded ability table");

    match run_sampling(&matches, config, &table) {
        Ok(report) => {
            eprintln!("\n{}", "=".repeat(50));
            eprintln!("SAMPLING COMPLETE");
            eprintln!("{}", "=".repeat(50));
            eprintln!("Matches:         {}", report.total);
            eprintln!("Sampled:         {}", report.sampled);
            eprintln!("Already sampled: {}", report.already_sampled);
            eprintln!("Skipped:         {}", report.skipped);
            eprintln!("Failed:          {}", report.failed);
            eprintln!("Frames:          {}", report.frames);
        }
        Err(e) => {
            eprintln!("FATAL: Sampling failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Replay every match in the list through the engine pool
fn cmd_extract(config: PipelineConfig, match_list: &Path, report_path: Option<&Path>) {
    let matches = load_match_list(match_list);
    let launcher = ProcessLauncher::new(config.engine.clone());
    let dispatcher = Dispatcher::new(launcher, config);

    let handle = dispatcher.interrupt_handle();
    if let Err(e) = ctrlc::set_handler(move || handle.interrupt()) {
        tracing::warn!(error = %e, "Failed to install interrupt handler");
    }

    match dispatcher.run(&matches) {
        Ok(report) => {
            eprintln!("\n{}", "=".repeat(50));
            eprintln!("EXTRACTION COMPLETE");
            eprintln!("{}", "=".repeat(50));
            eprintln!("Matches:          {}", report.total);
            eprintln!("Extracted:        {}", report.extracted);
            eprintln!("Sessions:         {}", report.sessions);
            eprintln!("Already complete: {}", report.already_complete);
            eprintln!("Skipped:          {}", report.skipped);
            eprintln!("Failed:           {}", report.failed);
            eprintln!("Duration:         {:.1}s", report.duration_seconds);

            if let Some(path) = report_path {
                let written = serde_json::to_string_pretty(&report)
                    .map_err(std::io::Error::other)
                    .and_then(|json| std::fs::write(path, json));
                if let Err(e) = written {
                    eprintln!("FATAL: Failed to save report: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Err(e) if e.is_interrupt() => {
            eprintln!("Interrupted, exiting");
            std::process::exit(EXIT_INTERRUPTED);
        }
        Err(e) => {
            tracing::error!(error = %e, "Extraction failed");
            eprintln!("FATAL: {}", e);
            std::process::exit(1);
        }
    }
}
