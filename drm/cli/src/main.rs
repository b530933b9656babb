use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod logging;

use self::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);
    cli.run().await
}
