use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use url::Url;

use drm_fairplay::{HttpKeyServer, KeyServer};

/**
    Download the FairPlay application certificate.
*/
#[derive(Args)]
pub struct FetchCertificateCommand {
    /// Certificate location (http, https or file URL).
    #[arg(short, long)]
    certificate_url: Url,

    /// Write the certificate to this file instead of printing it as base64.
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl FetchCertificateCommand {
    pub async fn run(self) -> Result<()> {
        let certificate = HttpKeyServer::new()
            .fetch_certificate(&self.certificate_url)
            .await
            .context("failed to fetch application certificate")?;
        tracing::info!("Received certificate ({} bytes)", certificate.len());

        match self.output {
            Some(path) => {
                std::fs::write(&path, &certificate).context("failed to write certificate")?;
                tracing::info!("Wrote {}", path.display());
            }
            None => println!("{}", data_encoding::BASE64.encode(&certificate)),
        }

        Ok(())
    }
}
