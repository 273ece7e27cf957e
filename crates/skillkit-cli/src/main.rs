mod completion;
mod dispatch;
mod flows;
mod prompt;
mod render;
mod settings;
mod signal;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::completion::CliCompletionShell;

#[derive(Parser, Debug)]
#[command(name = "skillkit")]
#[command(version)]
#[command(
    about = "Install skill, agent, command and hook templates into a project",
    long_about = None
)]
struct Cli {
    /// Config file to read instead of the default location.
    #[arg(long, global = true, env = "SKILLKIT_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,
    /// Disable badges, colors and progress bars.
    #[arg(long, global = true)]
    plain: bool,
    #[arg(short, long, global = true, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch the templates and install them into TARGET.
    Install(InstallArgs),
    /// List backup sets left in TARGET by earlier installs.
    Backups {
        target: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
    /// Print the resolved configuration.
    Config,
    /// Print a shell completion script.
    Completions { shell: CliCompletionShell },
}

#[derive(Args, Debug, Clone, Default)]
struct InstallArgs {
    /// Project directory; defaults to the current directory.
    target: Option<PathBuf>,
    /// Answer yes to every prompt and create a missing target.
    #[arg(short, long)]
    yes: bool,
    #[arg(long, value_name = "OWNER/REPO")]
    repo: Option<String>,
    #[arg(long = "ref", value_name = "REF")]
    reference: Option<String>,
    /// Install from a local directory instead of downloading an archive.
    #[arg(long, value_name = "DIR", conflicts_with_all = ["repo", "reference", "archive_base"])]
    source_dir: Option<PathBuf>,
    #[arg(long, value_name = "URL")]
    archive_base: Option<String>,
    /// Do not run npm install for hook dependencies.
    #[arg(long)]
    skip_deps: bool,
    /// Show what would be backed up and created, then exit.
    #[arg(long)]
    dry_run: bool,
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match dispatch::run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_directive(verbose, quiet)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .try_init();
}

fn default_log_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
