use drm_core::KeyFormat;

use crate::key_uri::KeyUri;

const KEY_TAG: &str = "#EXT-X-KEY:";
const SESSION_KEY_TAG: &str = "#EXT-X-SESSION-KEY:";

/**
    A key tag from an HLS playlist (`#EXT-X-KEY` or `#EXT-X-SESSION-KEY`).
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTag {
    /// `true` for `#EXT-X-SESSION-KEY`.
    pub session: bool,
    /// `METHOD` attribute, e.g. `SAMPLE-AES` or `AES-128`.
    pub method: String,
    pub uri: Option<String>,
    /// `KEYFORMAT` attribute, [`KeyFormat::Identity`] when absent.
    pub key_format: KeyFormat,
    pub key_format_versions: Option<String>,
    pub iv: Option<String>,
}

impl KeyTag {
    /**
        Parse a single playlist line. Returns `None` for lines that are not
        key tags or have no `METHOD`.
    */
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (session, attributes) = if let Some(rest) = line.strip_prefix(KEY_TAG) {
            (false, rest)
        } else if let Some(rest) = line.strip_prefix(SESSION_KEY_TAG) {
            (true, rest)
        } else {
            return None;
        };

        let mut tag = KeyTag {
            session,
            method: String::new(),
            uri: None,
            key_format: KeyFormat::Identity,
            key_format_versions: None,
            iv: None,
        };

        for (name, value) in attribute_list(attributes) {
            match name {
                "METHOD" => tag.method = value.to_owned(),
                "URI" => tag.uri = Some(value.to_owned()),
                "KEYFORMAT" => tag.key_format = KeyFormat::parse(value),
                "KEYFORMATVERSIONS" => tag.key_format_versions = Some(value.to_owned()),
                "IV" => tag.iv = Some(value.to_owned()),
                _ => {}
            }
        }

        if tag.method.is_empty() {
            return None;
        }
        Some(tag)
    }

    /**
        Returns `true` if the segments are unencrypted (`METHOD=NONE`).
    */
    pub fn is_clear(&self) -> bool {
        self.method == "NONE"
    }

    /**
        The FairPlay key URI of this tag, if it has one.
    */
    pub fn fairplay_key_uri(&self) -> Option<KeyUri> {
        if !self.key_format.is_fairplay() {
            return None;
        }
        self.uri.as_deref()?.parse().ok()
    }
}

/**
    All key tags of a playlist, in order of appearance.
*/
pub fn key_tags(playlist: &str) -> Vec<KeyTag> {
    playlist.lines().filter_map(KeyTag::parse).collect()
}

/**
    Distinct FairPlay key URIs of a playlist, in order of first appearance.
*/
pub fn fairplay_key_uris(playlist: &str) -> Vec<KeyUri> {
    let mut uris: Vec<KeyUri> = Vec::new();
    for uri in key_tags(playlist).iter().filter_map(KeyTag::fairplay_key_uri) {
        if !uris.contains(&uri) {
            uris.push(uri);
        }
    }
    uris
}

/**
    Split an HLS attribute list into name/value pairs. Quoted values may
    contain commas; quotes are stripped.
*/
fn attribute_list(s: &str) -> Vec<(&str, &str)> {
    let mut out = Vec::new();
    let mut rest = s.trim();

    while !rest.is_empty() {
        let Some((name, after)) = rest.split_once('=') else {
            break;
        };
        let name = name.trim();

        let (value, remaining) = if let Some(quoted) = after.strip_prefix('"') {
            match quoted.find('"') {
                Some(end) => (&quoted[..end], &quoted[end + 1..]),
                None => (quoted, ""),
            }
        } else {
            match after.find(',') {
                Some(end) => (after[..end].trim(), &after[end..]),
                None => (after.trim(), ""),
            }
        };

        out.push((name, value));
        rest = remaining.trim_start().trim_start_matches(',').trim_start();
    }

    out
}
