use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use drm_fairplay::{HttpKeyServer, KeyServer, MessageEncoding};

/**
    Send a key request (SPC) produced by a player to a license server and
    save the license response (CKC).
*/
#[derive(Args)]
pub struct GetLicenseCommand {
    /**
        License server URL to POST the key request to.
    */
    #[arg(short, long)]
    license_url: Url,

    /**
        Path to the raw SPC file captured from the player.
    */
    #[arg(short, long)]
    spc: PathBuf,

    /**
        Exchange messages as base64 text instead of raw bytes.
    */
    #[arg(long)]
    base64: bool,

    /**
        Request timeout in seconds.
    */
    #[arg(long, default_value = "30")]
    timeout: u64,

    /**
        Additional HTTP headers in "Key: Value" format. Can be repeated.
    */
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /**
        Write the CKC to this file instead of printing it as base64.
    */
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl GetLicenseCommand {
    pub async fn run(self) -> Result<()> {
        let spc = std::fs::read(&self.spc).context("failed to read SPC file")?;
        if spc.is_empty() {
            bail!("SPC file {} is empty", self.spc.display());
        }

        let mut headers = HeaderMap::new();
        for h in &self.headers {
            let (key, value) = parse_header(h)?;
            let name = HeaderName::from_bytes(key.as_bytes())
                .with_context(|| format!("invalid header name '{key}'"))?;
            let value = HeaderValue::from_str(&value)
                .with_context(|| format!("invalid value for header '{key}'"))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(self.timeout))
            .build()
            .context("failed to build HTTP client")?;
        let encoding = if self.base64 {
            MessageEncoding::Base64
        } else {
            MessageEncoding::Raw
        };
        let server = HttpKeyServer::with_client(client, encoding)
            .with_timeout(Duration::from_secs(self.timeout));

        tracing::info!("Sending key request ({} bytes) to {}", spc.len(), self.license_url);
        let ckc = server
            .request_license(&self.license_url, spc)
            .await
            .context("license request failed")?;
        if ckc.is_empty() {
            bail!("license server returned an empty response");
        }
        tracing::info!("Received license ({} bytes)", ckc.len());

        match self.output {
            Some(path) => {
                std::fs::write(&path, &ckc).context("failed to write CKC")?;
                tracing::info!("Wrote {}", path.display());
            }
            None => println!("{}", data_encoding::BASE64.encode(&ckc)),
        }

        Ok(())
    }
}

fn parse_header(s: &str) -> Result<(String, String)> {
    let (key, value) = s
        .split_once(':')
        .context("header must be in 'Key: Value' format")?;
    let key = key.trim();
    if key.is_empty() {
        bail!("header name is empty in '{s}'");
    }
    Ok((key.to_string(), value.trim().to_string()))
}
