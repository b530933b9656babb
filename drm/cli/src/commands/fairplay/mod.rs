mod check;
mod fetch_certificate;
mod get_license;

use anyhow::Result;
use clap::{Args, Subcommand};

use self::check::CheckCommand;
use self::fetch_certificate::FetchCertificateCommand;
use self::get_license::GetLicenseCommand;

/**
    FairPlay Streaming commands.
*/
#[derive(Args)]
pub struct FairPlayCommand {
    #[command(subcommand)]
    command: FairPlaySubcommand,
}

#[derive(Subcommand)]
enum FairPlaySubcommand {
    FetchCertificate(FetchCertificateCommand),
    GetLicense(GetLicenseCommand),
    Check(CheckCommand),
}

impl FairPlayCommand {
    pub async fn run(self) -> Result<()> {
        match self.command {
            FairPlaySubcommand::FetchCertificate(cmd) => cmd.run().await,
            FairPlaySubcommand::GetLicense(cmd) => cmd.run().await,
            FairPlaySubcommand::Check(cmd) => cmd.run().await,
        }
    }
}
