use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use drm_fairplay::{LicenseConfig, LicenseDelegate};

/**
    Load a license configuration and verify the certificate is reachable.
*/
#[derive(Args)]
pub struct CheckCommand {
    /// Path to the YAML license configuration.
    #[arg(short, long)]
    config: PathBuf,
}

impl CheckCommand {
    pub async fn run(self) -> Result<()> {
        let config =
            LicenseConfig::from_yaml_file(&self.config).context("failed to load configuration")?;
        let delegate =
            LicenseDelegate::from_config(&config).context("failed to create license delegate")?;

        println!("Certificate URL: {}", delegate.certificate_url());
        println!("License URL:     {}", delegate.license_url());
        println!("Encoding:        {:?}", delegate.key_server().encoding());
        println!("Timeout:         {}s", config.timeout_secs);

        let certificate = delegate
            .certificate()
            .await
            .context("failed to fetch application certificate")?;
        let preview = &certificate[..certificate.len().min(16)];
        println!(
            "Certificate:     {} bytes ({}...)",
            certificate.len(),
            hex::encode(preview)
        );

        Ok(())
    }
}
