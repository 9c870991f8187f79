use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use medichat::store::FileStore;

mod client;
mod session;

use session::Session;

#[derive(Parser)]
#[command(name = "medichat")]
#[command(version, about = "Terminal client for the Heoriinside consultation relay")]
struct Cli {
    /// Relay base URL
    #[arg(long, global = true, default_value = "http://127.0.0.1:3000")]
    server: String,

    /// Conversation store path (defaults to ~/.config/medichat/store.json)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat interactively (the default)
    Chat,
    /// Forget the saved conversation and reset the usage counters
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let store_path = match cli.store {
        Some(path) => path,
        None => FileStore::default_path()?,
    };

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => Session::new(&cli.server, store_path)?.start().await,
        Commands::Clear => session::clear(store_path),
    }
}
