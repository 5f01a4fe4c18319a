//! sw-precache CLI
//!
//! Entry point for the `sw-precache` command-line tool.

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process;
use sw_precache::config::{deep_merge, parse_override};
use sw_precache::{build_and_inject, BuildPaths, EffectiveConfig, ManifestBuilder};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Config file looked up in the config directory when `--config` is absent
const DEFAULT_CONFIG_FILE: &str = "service-worker.toml";

#[derive(Parser)]
#[command(name = "sw-precache")]
#[command(about = "Generate a service worker precache manifest", version)]
struct Cli {
    #[command(flatten)]
    layout: LayoutArgs,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct LayoutArgs {
    /// Project root (default: current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Build output directory, relative to the root
    #[arg(long, default_value = "dist", global = true)]
    build_dir: PathBuf,

    /// Configuration directory, relative to the root
    #[arg(long, default_value = "config", global = true)]
    config_dir: PathBuf,

    /// Config file (default: <config-dir>/service-worker.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Override a field, e.g. --set 'globIgnores=["**/*.map"]'
    #[arg(long = "set", value_name = "KEY=VALUE", global = true)]
    overrides: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration
    Config {
        /// Include the contributing sources
        #[arg(long)]
        sources: bool,
    },

    /// Build the precache manifest and print it
    Manifest {
        /// Write the manifest to a file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Print the build report as JSON after the manifest
        #[arg(long)]
        report: bool,
    },

    /// Build the manifest and write the service worker to swDest
    Inject,

    /// Show how paths and URLs are classified
    Check {
        /// Paths relative to globDirectory
        #[arg(required = true)]
        paths: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("sw_precache=warn"),
        1 => EnvFilter::new("sw_precache=info"),
        _ => EnvFilter::new("sw_precache=debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let effective = match load_config(&cli.layout) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Config { sources } => run_config(&effective, sources),
        Commands::Manifest { output, report } => run_manifest(&effective, output, report),
        Commands::Inject => run_inject(&effective),
        Commands::Check { paths } => run_check(&effective, &paths),
    }
}

fn load_config(layout: &LayoutArgs) -> Result<EffectiveConfig, String> {
    let root = match &layout.root {
        Some(root) => root.clone(),
        None => std::env::current_dir().map_err(|e| format!("current directory: {}", e))?,
    };

    let paths = BuildPaths::new(root)
        .with_build_dir(&layout.build_dir)
        .with_config_dir(&layout.config_dir);

    let config_path = layout
        .config
        .as_ref()
        .map(|p| paths.root.join(p))
        .unwrap_or_else(|| paths.config_dir.join(DEFAULT_CONFIG_FILE));

    if layout.config.is_some() && !config_path.exists() {
        return Err(format!("config file not found: {}", config_path.display()));
    }

    let overrides = collect_overrides(&layout.overrides)?;
    debug!(config = %config_path.display(), "loading configuration");

    EffectiveConfig::build(&paths, Some(config_path.as_path()), overrides).map_err(|e| e.to_string())
}

fn collect_overrides(assignments: &[String]) -> Result<Option<Value>, String> {
    if assignments.is_empty() {
        return Ok(None);
    }

    let mut merged = Value::Object(serde_json::Map::new());
    for assignment in assignments {
        let value = parse_override(assignment)
            .ok_or_else(|| format!("invalid --set '{}', expected KEY=VALUE", assignment))?;
        merged = deep_merge(merged, value);
    }
    Ok(Some(merged))
}

fn run_config(effective: &EffectiveConfig, sources: bool) {
    let json = if sources {
        effective.to_json()
    } else {
        effective.config().to_json()
    };

    match json {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn run_manifest(effective: &EffectiveConfig, output: Option<PathBuf>, report: bool) {
    let result = match ManifestBuilder::new(effective.config()).build() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Manifest error: {}", e);
            process::exit(1);
        }
    };

    for warning in &result.report.warnings {
        eprintln!("Warning: {}", warning);
    }

    match output {
        Some(path) => {
            if let Err(e) = result.manifest.write_to_file(&path) {
                eprintln!("Error writing {}: {}", path.display(), e);
                process::exit(1);
            }
        }
        None => match result.manifest.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        },
    }

    if report {
        match serde_json::to_string_pretty(&result.report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing report: {}", e);
                process::exit(1);
            }
        }
    }
}

fn run_inject(effective: &EffectiveConfig) {
    match build_and_inject(effective.config()) {
        Ok(result) => {
            for warning in &result.report.warnings {
                eprintln!("Warning: {}", warning);
            }
            println!(
                "Wrote {} ({} files, {} bytes precached)",
                result.sw_dest.display(),
                result.report.count,
                result.report.size
            );
        }
        Err(e) => {
            eprintln!("Inject error: {}", e);
            process::exit(1);
        }
    }
}

fn run_check(effective: &EffectiveConfig, paths: &[String]) {
    let config = effective.config();
    let rules = match config.glob_rules() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Rules error: {}", e);
            process::exit(1);
        }
    };

    for path in paths {
        let decision = rules.classify(Path::new(path));
        let versioned = if config.is_versioned_url(path) {
            "versioned"
        } else {
            "revisioned"
        };
        println!("{:<10} {:<10} {}", format!("{:?}", decision).to_lowercase(), versioned, path);
    }
}
