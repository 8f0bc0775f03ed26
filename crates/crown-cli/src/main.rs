//! Crown CLI - sign in to the game service and manage the local session.

mod commands;
mod host;
mod output;

use clap::{Parser, Subcommand};
use crown_config_and_utils::{init_logging, parse_level, Config, Paths};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Crown CLI - manage the signed-in session on this machine.
#[derive(Parser)]
#[command(name = "crown")]
#[command(about = "Crown CLI for signing in, inspecting, and signing out")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error); defaults to the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Override the data directory (defaults to ~/.crown)
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Mirror logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify the stored session and show who is signed in
    Status,

    /// Sign in through the identity provider
    Login {
        /// Print the consent URL instead of opening a browser
        #[arg(long)]
        no_browser: bool,
    },

    /// Finish a sign-in from a redirect URL pasted by hand
    Callback {
        /// Full redirect URL, including the accessToken parameter
        url: String,
    },

    /// Sign out and clear every stored credential
    Logout,

    /// Show the play summary for the signed-in user
    Profile,

    /// Change the signed-in user's nickname
    Rename {
        /// New nickname
        nickname: String,
    },

    /// Describe the stored token without revealing it
    Token,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let paths = match &cli.base_dir {
        Some(dir) => Paths::with_base_dir(dir.clone()),
        None => match Paths::new() {
            Ok(paths) => paths,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
    };

    let (config, config_error) = match Config::load(&paths) {
        Ok(config) => (config, None),
        Err(e) => (Config::new(), Some(e)),
    };

    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    let level = parse_level(level).to_string().to_lowercase();
    init_logging("crown-cli", &level, &paths, cli.verbose);

    if let Some(e) = config_error {
        warn!(error = %e, "Ignoring unreadable config file, using defaults");
    }
    debug!(base_dir = %paths.base_dir().display(), "Paths resolved");

    let ctx = commands::Context {
        config,
        paths,
        format: cli.format,
    };

    let result = match cli.command {
        Commands::Status => commands::status(&ctx).await,
        Commands::Login { no_browser } => commands::login(&ctx, no_browser).await,
        Commands::Callback { url } => commands::callback(&ctx, &url).await,
        Commands::Logout => commands::logout(&ctx).await,
        Commands::Profile => commands::profile(&ctx).await,
        Commands::Rename { nickname } => commands::rename(&ctx, &nickname).await,
        Commands::Token => commands::token(&ctx).await,
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e), &ctx.format);
        std::process::exit(1);
    }
}
