use anyhow::{Context, Result, bail};
use clap::Args;

use drm_fairplay::{KeyTag, fairplay_key_uris, key_tags};

/**
    List the key tags of an HLS playlist.
*/
#[derive(Args)]
pub struct InspectPlaylistCommand {
    /// Playlist file path or http(s) URL.
    pub source: String,
}

impl InspectPlaylistCommand {
    pub async fn run(self) -> Result<()> {
        let playlist = load(&self.source).await?;
        if !playlist.trim_start().starts_with("#EXTM3U") {
            bail!("{} is not an HLS playlist", self.source);
        }

        let tags = key_tags(&playlist);
        if tags.is_empty() {
            println!("No key tags (clear content)");
            return Ok(());
        }

        println!("Key tags ({}):", tags.len());
        for tag in &tags {
            print_tag(tag);
        }

        let uris = fairplay_key_uris(&playlist);
        if !uris.is_empty() {
            println!();
            println!("FairPlay assets ({}):", uris.len());
            for uri in uris {
                println!("  {}", uri.asset_id());
            }
        }

        Ok(())
    }
}

fn print_tag(tag: &KeyTag) {
    let kind = if tag.session { "session" } else { "segment" };
    let system = match tag.key_format.system_id() {
        Some(id) => id.to_name(),
        None if tag.is_clear() => "none",
        None => "-",
    };
    println!("  [{kind}] {} {system}", tag.method);
    println!("    Format: {}", tag.key_format);
    if let Some(uri) = &tag.uri {
        println!("    URI:    {uri}");
    }
    if let Some(iv) = &tag.iv {
        println!("    IV:     {iv}");
    }
}

async fn load(source: &str) -> Result<String> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let response = reqwest::get(source)
            .await
            .context("failed to fetch playlist")?;
        let status = response.status();
        if !status.is_success() {
            bail!("playlist server returned HTTP {status}");
        }
        response.text().await.context("failed to read playlist")
    } else {
        std::fs::read_to_string(source).context("failed to read playlist file")
    }
}
