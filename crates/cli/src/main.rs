mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use output::OutputFormat;

/// kiln - recipe-driven native build and packaging
#[derive(Parser)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Output format
  #[arg(short, long, global = true, value_enum, default_value_t)]
  output: OutputFormat,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Run the full pipeline: layout, generate, build, package
  Create(BuildArgs),

  /// Lay out the build directories and generate toolchain files
  Install(BuildArgs),

  /// Resolve requirements and write kiln.lock
  Lock(BuildArgs),

  /// Print the package descriptor
  Inspect(SettingsArgs),

  /// Show host settings and kiln directories
  Info,
}

/// Recipe and settings selection shared by every recipe command.
#[derive(Args, Debug, Clone)]
pub struct SettingsArgs {
  /// Recipe file, or a directory containing kiln.lua
  #[arg(default_value = ".")]
  pub recipe: PathBuf,

  /// Override a setting (os, arch, compiler, compiler.version, build_type)
  #[arg(short = 's', long = "setting", value_name = "KEY=VALUE")]
  pub settings: Vec<String>,

  /// Settings profile: a path or a name under the profiles directory
  #[arg(long)]
  pub profile: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
  #[command(flatten)]
  pub settings: SettingsArgs,

  /// Local package index (defaults to $KILN_HOME/p)
  #[arg(long, value_name = "DIR")]
  pub index: Option<PathBuf>,

  /// Remote package index URL; the local index becomes its cache
  #[arg(long, env = "KILN_REMOTE", value_name = "URL")]
  pub remote: Option<String>,

  /// Build directory (defaults to <recipe dir>/build/<build_type>)
  #[arg(long, value_name = "DIR")]
  pub build_dir: Option<PathBuf>,

  /// Package directory (defaults to <recipe dir>/package/<build_type>)
  #[arg(long, value_name = "DIR")]
  pub package_dir: Option<PathBuf>,

  /// Parallel jobs for the compile step
  #[arg(short, long)]
  pub jobs: Option<usize>,

  /// Fail unless resolution matches kiln.lock exactly
  #[arg(long)]
  pub locked: bool,
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "warn" }));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Create(args) => cmd::cmd_create(&args, cli.output),
    Commands::Install(args) => cmd::cmd_install(&args, cli.output),
    Commands::Lock(args) => cmd::cmd_lock(&args, cli.output),
    Commands::Inspect(args) => cmd::cmd_inspect(&args, cli.output),
    Commands::Info => cmd::cmd_info(cli.output),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      output::print_error(&format!("{e:#}"));
      ExitCode::FAILURE
    }
  }
}
