#![forbid(unsafe_code)]

mod cmd;
mod output;
mod session;
mod tui;

use clap::{CommandFactory, Parser, Subcommand};
use output::{OutputMode, resolve_output_mode};
use phaseboard_core::config::load_user_config;
use std::env;
use std::path::PathBuf;
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "pb: phase roll-up dashboard",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format: pretty, text, or json.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for --format json.
    #[arg(long, global = true, hide = true)]
    json: bool,

    /// Snapshot location tried before every configured source (path or URL).
    #[arg(long, global = true, value_name = "LOC")]
    source: Option<String>,

    /// Project root holding .phaseboard/config.toml (default: current directory).
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn source_flag(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Read",
        about = "List issues by phase",
        long_about = "List issues grouped by phase with optional query, ISA, track and phase filters.",
        after_help = "EXAMPLES:\n    # Everything in the snapshot\n    pb list\n\n    # Free-text search\n    pb list -q uart\n\n    # Fast-track ISA work in development\n    pb list --isa isa --track fast-track --phase dev\n\n    # Emit machine-readable output\n    pb list --format json"
    )]
    List(cmd::list::ListArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show one issue",
        long_about = "Show progress, subtasks and linked issues for a single issue key.",
        after_help = "EXAMPLES:\n    # Show an issue\n    pb show RVS-1234\n\n    # Emit machine-readable output\n    pb show RVS-1234 --format json"
    )]
    Show(cmd::show::ShowArgs),

    #[command(
        next_help_heading = "Read",
        about = "Show snapshot metadata and phase counts",
        long_about = "Show schema version, project, generation time and declared vs actual counts per phase.",
        after_help = "EXAMPLES:\n    # Per-phase counts\n    pb counts\n\n    # Against a specific snapshot\n    pb counts --source data/rollup.yaml"
    )]
    Counts(cmd::counts::CountsArgs),

    #[command(
        next_help_heading = "Diagnostics",
        about = "Validate the snapshot shape",
        long_about = "Fetch the snapshot from the first readable source and report every shape problem. Exits non-zero when invalid.",
        after_help = "EXAMPLES:\n    # Validate the configured sources\n    pb validate\n\n    # Validate a file before publishing it\n    pb validate --source out/rollup.yaml"
    )]
    Validate(cmd::validate::ValidateArgs),

    #[command(
        next_help_heading = "Live",
        about = "Run the refresh cycle and report updates",
        long_about = "Refresh on the configured interval, printing each update, notice expiry and failure.",
        after_help = "EXAMPLES:\n    # Watch until interrupted\n    pb watch\n\n    # Three cycles, ten seconds apart, as JSON lines\n    pb watch --max-cycles 3 --interval 10 --format json"
    )]
    Watch(cmd::watch::WatchArgs),

    #[command(
        next_help_heading = "Live",
        about = "Open the interactive dashboard",
        long_about = "Full-screen dashboard with live refresh, debounced search and ISA/track/phase filters.",
        after_help = "KEYS:\n    /        search (applied after a short pause)\n    i t p    cycle ISA / track / phase filter\n    j k      move selection\n    Enter    toggle detail\n    r        refresh now\n    Esc      clear filters\n    q        quit"
    )]
    Tui,

    #[command(
        next_help_heading = "Project Maintenance",
        about = "Generate shell completion scripts",
        long_about = "Generate shell completion scripts for supported shells.",
        after_help = "EXAMPLES:\n    # Generate bash completions\n    pb completions bash\n\n    # Generate zsh completions\n    pb completions zsh"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

fn init_tracing(verbose: bool, interactive: bool) {
    let default = if interactive {
        "error"
    } else if verbose || env::var("DEBUG").is_ok() {
        "phaseboard=debug,info"
    } else {
        "phaseboard=info,warn"
    };
    let filter = EnvFilter::try_from_env("PHASEBOARD_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let format = env::var("PHASEBOARD_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);
    match format.as_str() {
        "json" => registry
            .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
            .init(),
        _ => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init(),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, matches!(cli.command, Commands::Tui));

    let user_output = match load_user_config() {
        Ok(user) => user.output,
        Err(err) => {
            warn!(error = %err, "ignoring unreadable user config");
            None
        }
    };
    let output = resolve_output_mode(cli.format, cli.json, user_output.as_deref());

    let project_root = match cli.config.clone() {
        Some(root) => root,
        None => env::current_dir()?,
    };
    debug!(root = %project_root.display(), ?output, "starting");

    let source = cli.source_flag();
    match cli.command {
        Commands::List(ref args) => cmd::list::run_list(args, output, &project_root, source),
        Commands::Show(ref args) => cmd::show::run_show(args, output, &project_root, source),
        Commands::Counts(ref args) => cmd::counts::run_counts(args, output, &project_root, source),
        Commands::Validate(ref args) => {
            cmd::validate::run_validate(args, output, &project_root, source)
        }
        Commands::Watch(ref args) => cmd::watch::run_watch(args, output, &project_root, source),
        Commands::Tui => tui::run_dashboard(output, &project_root, source),
        Commands::Completions(ref args) => {
            let mut command = Cli::command();
            cmd::completions::run_completions(args.shell, &mut command)
        }
    }
}
