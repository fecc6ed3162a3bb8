use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use oxid_show::command::show::{self, ShowArgs};
use oxid_show::command::ShowContext;
use oxid_show::output::formatter;
use oxid_show::ShowError;

/// Reset SIGPIPE to default behavior so piping (e.g. `oxid-show --json plan | head`)
/// exits cleanly instead of panicking on broken pipe.
#[cfg(unix)]
fn reset_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

/// oxid-show - Inspect plan and state files
#[derive(Parser)]
#[command(name = "oxid-show", version, about, long_about = None)]
struct Cli {
    /// Plan or state file to show. Without one, the current state of the
    /// workspace is shown.
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Print the plan as a machine-readable JSON document (plan files only)
    #[arg(long)]
    json: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Path to the configuration directory
    #[arg(short, long, default_value = ".")]
    config: PathBuf,

    /// Working directory for .oxid state and cache
    #[arg(short, long, default_value = ".oxid")]
    working_dir: PathBuf,

    /// Workspace whose state is shown when no path is given
    #[arg(long, env = "OXID_WORKSPACE", default_value = "default")]
    workspace: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    #[cfg(unix)]
    reset_sigpipe();

    let cli = Cli::parse();

    // RUST_LOG wins over -v. Logs go to stderr so stdout stays parseable.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.no_color {
        colored::control::set_override(false);
    }

    match cmd_show(&cli).await {
        Ok(output) => {
            println!("{}", output.trim_end_matches('\n'));
            ExitCode::SUCCESS
        }
        Err(e) => {
            formatter::print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

async fn cmd_show(cli: &Cli) -> Result<String, ShowError> {
    let args = ShowArgs::from_paths(&cli.paths, cli.json)?;
    let ctx = ShowContext::open(
        cli.config.clone(),
        cli.working_dir.clone(),
        &cli.workspace,
    )?;
    show::run(&ctx, &args).await
}
