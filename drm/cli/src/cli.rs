use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::{FairPlayCommand, InspectPlaylistCommand};

/**
    DRM command-line tool.
*/
#[derive(Parser)]
#[command(name = "drm-cli")]
pub struct Cli {
    /// Enable debug logging (overridden by RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// FairPlay Streaming commands.
    #[command(name = "fairplay")]
    FairPlay(FairPlayCommand),
    /// List the key tags of an HLS playlist.
    InspectPlaylist(InspectPlaylistCommand),
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::FairPlay(cmd) => cmd.run().await,
            Command::InspectPlaylist(cmd) => cmd.run().await,
        }
    }
}
