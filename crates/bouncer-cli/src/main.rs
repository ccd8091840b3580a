//! Bouncer CLI - sign in, list bouncer devices, and toggle their block state.

mod commands;

use std::path::PathBuf;

use bouncer_config_and_utils::{init_logging, Config, Paths};
use clap::{Parser, Subcommand};

/// Bouncer command-line interface.
#[derive(Parser)]
#[command(name = "bouncer")]
#[command(about = "Manage bouncer devices: list and block/unblock")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Base directory for runtime files (config, logs). Defaults to ~/.bouncer
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Override the API base URL from the config file
    #[arg(long, global = true)]
    api_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify credentials against the API
    Login {
        #[arg(long, env = "BOUNCER_EMAIL")]
        email: String,
        #[arg(long, env = "BOUNCER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// List the devices tied to the account
    Devices {
        #[arg(long, env = "BOUNCER_EMAIL")]
        email: String,
        #[arg(long, env = "BOUNCER_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Toggle a device's block state and wait for confirmation
    Toggle {
        /// Device id as shown by `devices`
        device_id: String,
        #[arg(long, env = "BOUNCER_EMAIL")]
        email: String,
        #[arg(long, env = "BOUNCER_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let mut config = Config::load(&paths)?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }

    match cli.command {
        Commands::Login { email, password } => {
            commands::login(&config, email, password).await?;
        }
        Commands::Devices { email, password } => {
            commands::devices(&config, email, password).await?;
        }
        Commands::Toggle {
            device_id,
            email,
            password,
        } => {
            commands::toggle(&config, device_id, email, password).await?;
        }
    }

    Ok(())
}
