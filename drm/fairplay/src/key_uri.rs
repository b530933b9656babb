use core::fmt;
use core::str::FromStr;

use drm_core::FAIRPLAY_KEY_SCHEME;
use url::Url;

use crate::error::{LicenseError, LicenseResult};

/**
    A FairPlay key URI, as found in the `URI` attribute of an
    `#EXT-X-KEY` tag with the FairPlay key format: `skd://<asset id>`.

    The host player requests this URI from the resource loader when it
    needs the key for a protected segment.

    The text the URI was created from is kept next to the parsed URL, so
    the asset id and content identifier are exactly what the playlist
    says, even where URL parsing would percent-encode characters.
*/
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyUri {
    url: Url,
    raw: String,
}

impl KeyUri {
    /**
        Validate a URL as a FairPlay key URI.

        A [`Url`] is already normalized, so the identifiers derived from it
        follow its serialization. Parse the playlist text with
        [`FromStr`] to keep it verbatim.
    */
    pub fn from_url(url: &Url) -> LicenseResult<Self> {
        Self::with_raw(url.clone(), url.as_str().to_owned())
    }

    fn with_raw(url: Url, raw: String) -> LicenseResult<Self> {
        if url.scheme() != FAIRPLAY_KEY_SCHEME {
            return Err(LicenseError::UnsupportedScheme(url.scheme().to_owned()));
        }
        let uri = Self { url, raw };
        if uri.asset_id().trim_matches('/').is_empty() {
            return Err(LicenseError::MissingContentId);
        }
        Ok(uri)
    }

    /**
        Returns `true` if the URL uses the FairPlay key scheme.
    */
    pub fn is_key_request(url: &Url) -> bool {
        url.scheme() == FAIRPLAY_KEY_SCHEME
    }

    /**
        Everything after `skd://`: host, path and query.
    */
    pub fn asset_id(&self) -> &str {
        let s = self.raw.as_str();
        s.strip_prefix(FAIRPLAY_KEY_SCHEME)
            .and_then(|rest| rest.strip_prefix("://").or_else(|| rest.strip_prefix(':')))
            .unwrap_or(s)
    }

    /**
        Content identifier handed to the host when it builds the key
        request (SPC): the complete key URI as UTF-8.
    */
    pub fn content_identifier(&self) -> &[u8] {
        self.raw.as_bytes()
    }

    pub fn as_url(&self) -> &Url {
        &self.url
    }
}

impl fmt::Display for KeyUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for KeyUri {
    type Err = LicenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let url = Url::parse(raw).map_err(|e| LicenseError::InvalidUrl {
            kind: "key",
            url: s.to_owned(),
            reason: e.to_string(),
        })?;
        Self::with_raw(url, raw.to_owned())
    }
}
