mod demo;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "tandem")]
#[command(about = "Master/follower browser input replication", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated session: one master, N followers, scripted input
    Demo {
        /// Number of follower clients
        #[arg(short, long, default_value_t = 2)]
        followers: usize,

        /// Replay delay bound in milliseconds
        #[arg(long, default_value_t = 500)]
        max_delay_ms: u64,

        /// Fixed RNG seed for reproducible timing
        #[arg(long)]
        seed: Option<u64>,
    },

    /// List the keyboard shortcuts the core exposes
    Shortcuts,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match cli.command {
        Commands::Demo {
            followers,
            max_delay_ms,
            seed,
        } => demo::run(followers, max_delay_ms, seed).await,
        Commands::Shortcuts => {
            for spec in tandem_client::shortcut_specs() {
                println!("{:<20} {}", spec.keys.join("+"), spec.description);
            }
            Ok(())
        }
    }
}
