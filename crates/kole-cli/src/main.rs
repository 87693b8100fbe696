#![forbid(unsafe_code)]

use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use kole_config::BuildConfig;
use kole_engine::{BuildOptions, Builder, DirectoryManager, LinkOutcome};
use kole_util::ShellExecutor;

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Debug, Parser)]
#[command(name = "kole", about = "An incremental build tool for C and C++ projects")]
#[command(version)]
struct Cli {
    /// Path to the build configuration
    #[arg(long, global = true, default_value = kole_config::CONFIG_FILE)]
    config: PathBuf,
    /// Show debug logs
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile stale sources and link the binary
    Build {
        /// Recompile every source, ignoring timestamps
        #[arg(long)]
        rebuild: bool,
        /// Number of compile commands to run at once
        #[arg(long, short = 'j', default_value_t = 1)]
        jobs: usize,
    },
    /// Build and run the binary
    Run {
        /// Recompile every source, ignoring timestamps
        #[arg(long)]
        rebuild: bool,
        /// Number of compile commands to run at once
        #[arg(long, short = 'j', default_value_t = 1)]
        jobs: usize,
        /// Arguments to pass to the program
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// Create the configured project directories
    Setup,
    /// Write a default configuration and create the project directories
    Init,
    /// Remove every file from the object directory
    Clean,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let result = match cli.command {
        Command::Build { rebuild, jobs } => cmd_build(&cli.config, rebuild, jobs),
        Command::Run {
            rebuild,
            jobs,
            args,
        } => cmd_run(&cli.config, rebuild, jobs, &args),
        Command::Setup => cmd_setup(&cli.config),
        Command::Init => cmd_init(&cli.config),
        Command::Clean => cmd_clean(&cli.config),
    };

    if let Err(msg) = result {
        eprintln!("error: {msg}");
        process::exit(1);
    }
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn build_options(rebuild: bool, jobs: usize) -> BuildOptions {
    BuildOptions {
        rebuild,
        jobs: jobs.max(1),
    }
}

fn cmd_build(config_path: &Path, rebuild: bool, jobs: usize) -> CliResult {
    let config = BuildConfig::load(config_path)?;
    let options = build_options(rebuild, jobs);

    let result = kole_engine::build(&config, &options, &ShellExecutor)?;

    let secs = result.duration.as_secs_f64();
    match result.link {
        LinkOutcome::Linked(path) => {
            eprintln!("    Finished `{}` in {secs:.2}s", path.display());
        }
        LinkOutcome::Skipped => {
            eprintln!("    Finished in {secs:.2}s (nothing to link)");
        }
    }
    Ok(())
}

fn cmd_run(config_path: &Path, rebuild: bool, jobs: usize, args: &[String]) -> CliResult {
    let config = BuildConfig::load(config_path)?;
    let options = build_options(rebuild, jobs);

    let mut builder = Builder::new(&config, &options, &ShellExecutor);
    builder.compile_object_files(options.rebuild)?;
    builder.link_object_files()?;

    let code = builder.run_binary_executable(&args.join(" "))?;
    if code != 0 {
        process::exit(code);
    }
    Ok(())
}

fn cmd_setup(config_path: &Path) -> CliResult {
    let config = BuildConfig::load(config_path)?;
    let created = DirectoryManager::new(&config).create_directories();
    eprintln!("    Created {created} director{}", plural_y(created));
    Ok(())
}

fn cmd_init(config_path: &Path) -> CliResult {
    if BuildConfig::write_default(config_path)? {
        eprintln!("    Created {}", config_path.display());
    }
    cmd_setup(config_path)
}

fn cmd_clean(config_path: &Path) -> CliResult {
    let config = BuildConfig::load(config_path)?;
    let removed = DirectoryManager::new(&config).clear_object_directory()?;
    eprintln!("    Removed {removed} object file(s)");
    Ok(())
}

fn plural_y(count: usize) -> &'static str {
    if count == 1 {
        "y"
    } else {
        "ies"
    }
}
