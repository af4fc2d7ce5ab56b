use clap::{Parser, Subcommand};
use fogcover_runtime::cli;
use fogcover_runtime::cli::persona_cmd::PersonaAction;
use fogcover_runtime::cli::settings_cmd::SettingsAction;

#[derive(Parser, Debug)]
#[command(
    name = "fogcover",
    version,
    about = "Cover traffic from scheduled browsing personas"
)]
struct Cli {
    /// Machine-readable output where supported
    #[arg(long, global = true)]
    json: bool,
    /// Suppress progress output
    #[arg(long, short, global = true)]
    quiet: bool,
    /// Disable colors
    #[arg(long, global = true)]
    no_color: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the scheduler daemon until Ctrl-C
    Run,
    /// Stop a running daemon
    Stop,
    /// Show daemon, persona and recent activity status
    Status,
    /// Run one persona in the foreground
    Session {
        /// Persona id
        persona_id: String,
    },
    /// Manage personas
    Persona {
        #[command(subcommand)]
        action: PersonaAction,
    },
    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Show fog metrics
    Metrics,
    /// Check that this machine is ready to browse
    Doctor,
}

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    // Output helpers read these.
    if args.json {
        std::env::set_var("FOGCOVER_JSON", "1");
    }
    if args.quiet {
        std::env::set_var("FOGCOVER_QUIET", "1");
    }
    if args.no_color {
        std::env::set_var("FOGCOVER_NO_COLOR", "1");
    }

    let result = match args.command {
        Command::Run => cli::run_cmd::run().await,
        Command::Stop => cli::stop::run().await,
        Command::Status => cli::status::run().await,
        Command::Session { persona_id } => cli::session_cmd::run(&persona_id).await,
        Command::Persona { action } => cli::persona_cmd::run(action).await,
        Command::Settings { action } => cli::settings_cmd::run(action).await,
        Command::Metrics => cli::metrics_cmd::run().await,
        Command::Doctor => cli::doctor::run().await,
    };

    if let Err(e) = result {
        eprintln!("  Error: {e:#}");
        std::process::exit(1);
    }
}
