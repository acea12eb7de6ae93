//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use slipway::core::{CompilerId, HostOs};

/// Slipway - build, install and verify a package from a recipe
#[derive(Parser)]
#[command(name = "slipway")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build, install and verify a recipe
    Run(RunArgs),

    /// Print the build plan for a platform without running anything
    Plan(PlanArgs),

    /// Verify an existing installation
    Verify(VerifyArgs),

    /// List the dependencies a recipe declares for a platform
    Deps(DepsArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Which platform to plan for. Anything not given is detected.
#[derive(Args, Clone)]
pub struct PlatformArgs {
    /// Host OS family (macos, linux, other)
    #[arg(long)]
    pub os: Option<HostOs>,

    /// Compiler identity, e.g. `gcc@13` or `apple-clang@15`
    #[arg(long)]
    pub compiler: Option<CompilerId>,

    /// C compiler executable
    #[arg(long, env = "CC")]
    pub cc: Option<PathBuf>,
}

/// Where and how the package is installed.
#[derive(Args, Clone)]
pub struct InstallArgs {
    /// Installation prefix
    #[arg(long)]
    pub prefix: PathBuf,

    /// Root of the surrounding package installation
    #[arg(long)]
    pub tool_prefix: Option<PathBuf>,

    /// Verify a development (head) build
    #[arg(long)]
    pub head: bool,

    /// Parallel variant checks
    #[arg(long)]
    pub verify_jobs: Option<usize>,

    /// Output format: human, json, github
    #[arg(long, default_value = "human")]
    pub output_format: String,
}

#[derive(Args)]
pub struct RunArgs {
    /// Path to the recipe file
    pub recipe: PathBuf,

    #[command(flatten)]
    pub platform: PlatformArgs,

    #[command(flatten)]
    pub install: InstallArgs,

    /// Unpacked source tree (defaults to the current directory)
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Number of parallel build jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Stop after installing
    #[arg(long)]
    pub skip_verify: bool,

    /// Print the build commands without running them
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Path to the recipe file
    pub recipe: PathBuf,

    #[command(flatten)]
    pub platform: PlatformArgs,

    /// Installation prefix
    #[arg(long, default_value = "/usr/local")]
    pub prefix: PathBuf,

    /// Root of the surrounding package installation
    #[arg(long)]
    pub tool_prefix: Option<PathBuf>,

    /// Unpacked source tree (defaults to the current directory)
    #[arg(long)]
    pub source: Option<PathBuf>,

    /// Number of parallel build jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// Path to the recipe file
    pub recipe: PathBuf,

    #[command(flatten)]
    pub platform: PlatformArgs,

    #[command(flatten)]
    pub install: InstallArgs,
}

#[derive(Args)]
pub struct DepsArgs {
    /// Path to the recipe file
    pub recipe: PathBuf,

    #[command(flatten)]
    pub platform: PlatformArgs,

    /// List every declared dependency, not only those for this platform
    #[arg(long)]
    pub all: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
