//! Command-line host for cooker modules.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cooker_core::config::{GeneralSettings, env_vars};
use cooker_core::{App, AppInfo, LoadReport, ManagerConfig, ModuleManager, Settings};
use serde_json::json;

/// Cooker - load and run dynamically loaded modules.
#[derive(Parser, Debug)]
#[command(name = "cooker")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Organization scoping system-wide directories.
    #[arg(long, global = true, default_value = "cooker")]
    org: String,

    /// Product scoping system-wide directories.
    #[arg(long, global = true, default_value = "cooker")]
    product: String,

    /// Project scoping system-wide directories.
    #[arg(long, global = true, default_value = "cooker")]
    project: String,

    /// Program name; selects the `<program>.toml` settings file.
    #[arg(long, global = true, default_value = "cooker")]
    program: String,

    /// Extra module search path, searched after the built-in ones.
    #[arg(short = 'p', long = "module-path", global = true)]
    module_paths: Vec<PathBuf>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Load modules, start their after-ready hooks and wait for Ctrl-C.
    Run {
        /// Settings file (defaults to the discovered `<program>.toml`).
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Modules to load after the ones listed in the settings file.
        modules: Vec<String>,
    },
    /// List loadable units in the search paths with their declared names.
    Scan {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let info = AppInfo::new(&args.org, &args.product, &args.project, &args.program);

    match args.command {
        Command::Run { config, modules } => run(info, args.module_paths, config, modules).await,
        Command::Scan { json } => scan(info, args.module_paths, json),
    }
}

fn init_logging(verbose: bool) {
    let json_logging = std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let default_directive = if verbose { "cooker=debug" } else { "cooker=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}

fn manager_for(info: &AppInfo, module_paths: Vec<PathBuf>) -> ModuleManager {
    let config = module_paths
        .into_iter()
        .fold(ManagerConfig::with_defaults(info), |config, path| {
            config.with_search_path(path)
        });
    ModuleManager::new(config)
}

async fn run(
    info: AppInfo,
    module_paths: Vec<PathBuf>,
    config: Option<PathBuf>,
    modules: Vec<String>,
) -> Result<()> {
    let manager = manager_for(&info, module_paths);
    let app = App::with_manager(info, manager);

    let report = match config {
        Some(path) => {
            let mut settings = Settings::from_file(&path)?;
            settings.general.modules.extend(modules);
            app.init_with(&settings)
        }
        None if modules.is_empty() => app.init()?,
        None => app.init_with(&Settings {
            general: GeneralSettings { modules },
            ..Default::default()
        }),
    };
    print_report(&report);

    app.run().await?;
    Ok(())
}

fn print_report(report: &LoadReport) {
    for name in &report.loaded {
        println!("loaded   {}", name);
    }
    for name in &report.skipped {
        println!("skipped  {}", name);
    }
    for (name, error) in &report.failed {
        println!("failed   {}: {}", name, error);
    }
}

fn scan(info: AppInfo, module_paths: Vec<PathBuf>, as_json: bool) -> Result<()> {
    let manager = manager_for(&info, module_paths);
    let scanned = manager.scan();

    if as_json {
        let dirs: Vec<_> = scanned
            .iter()
            .map(|(dir, found)| match found {
                Ok(units) => json!({
                    "path": dir.display().to_string(),
                    "units": units
                        .iter()
                        .map(|unit| match &unit.declared_name {
                            Ok(name) => json!({"file": unit.path.display().to_string(), "name": name}),
                            Err(e) => json!({"file": unit.path.display().to_string(), "error": e}),
                        })
                        .collect::<Vec<_>>(),
                }),
                Err(e) => json!({"path": dir.display().to_string(), "error": e.to_string()}),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&dirs)?);
        return Ok(());
    }

    let mut total = 0;
    for (dir, found) in &scanned {
        match found {
            Ok(units) => {
                println!("{}", dir.display());
                for unit in units {
                    match &unit.declared_name {
                        Ok(name) => println!("  {:<24} {}", name, unit.path.display()),
                        Err(e) => println!("  {:<24} {} ({})", "-", unit.path.display(), e),
                    }
                }
                total += units.len();
            }
            Err(e) => tracing::debug!("{}", e),
        }
    }

    if total == 0 {
        println!("No modules found");
    }
    Ok(())
}
