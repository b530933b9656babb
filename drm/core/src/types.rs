use core::fmt;
use core::str::FromStr;

use crate::constants::*;
use crate::error::ParseError;

/**
    DRM content protection system identifier.

    Recognizes the major DRM systems by their DASH-IF registered UUIDs.
    Unrecognized system IDs are captured in the `Unknown` variant.

    Reference: <https://dashif.org/identifiers/content_protection/>
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemId {
    Widevine,
    PlayReady,
    FairPlay,
    ClearKey,
    Unknown([u8; 16]),
}

impl SystemId {
    /**
        Identify a DRM system from its 16-byte UUID.
    */
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        match bytes {
            WIDEVINE_SYSTEM_ID => Self::Widevine,
            PLAYREADY_SYSTEM_ID => Self::PlayReady,
            FAIRPLAY_SYSTEM_ID => Self::FairPlay,
            CLEARKEY_SYSTEM_ID => Self::ClearKey,
            other => Self::Unknown(other),
        }
    }

    /**
        Return the raw 16-byte UUID for this system.
    */
    pub const fn to_bytes(self) -> [u8; 16] {
        match self {
            Self::Widevine => WIDEVINE_SYSTEM_ID,
            Self::PlayReady => PLAYREADY_SYSTEM_ID,
            Self::FairPlay => FAIRPLAY_SYSTEM_ID,
            Self::ClearKey => CLEARKEY_SYSTEM_ID,
            Self::Unknown(bytes) => bytes,
        }
    }

    /**
        Human-readable name for this system.
    */
    pub const fn to_name(self) -> &'static str {
        match self {
            Self::Widevine => "Widevine",
            Self::PlayReady => "PlayReady",
            Self::FairPlay => "FairPlay",
            Self::ClearKey => "ClearKey",
            Self::Unknown(_) => "Unknown",
        }
    }

    /**
        Parse a UUID string into a `SystemId`.

        Accepts both hyphenated (`94ce86fb-07ff-4f43-adb8-93d2fa968ca2`) and
        plain (`94ce86fb07ff4f43adb893d2fa968ca2`) formats. Hex digits are
        case-insensitive.
    */
    pub fn from_uuid(s: &str) -> Option<Self> {
        let plain: String = s.trim().chars().filter(|c| *c != '-').collect();
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(plain, &mut bytes).ok()?;
        Some(Self::from_bytes(bytes))
    }

    /**
        Format as a standard UUID string (`xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`).
    */
    pub fn to_uuid(self) -> String {
        let h = hex::encode(self.to_bytes());
        format!(
            "{}-{}-{}-{}-{}",
            &h[0..8],
            &h[8..12],
            &h[12..16],
            &h[16..20],
            &h[20..32]
        )
    }

    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.to_name(), self.to_uuid())
    }
}

impl FromStr for SystemId {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_uuid(s).ok_or_else(|| ParseError::new("system id", s))
    }
}

/**
    Value of the HLS `KEYFORMAT` attribute on `#EXT-X-KEY` and
    `#EXT-X-SESSION-KEY` tags.

    Identifies how the key behind a key URI must be obtained. FairPlay keys
    are delivered through the player's resource loader, identity keys are
    fetched directly, and UUID formats name another DRM system.
*/
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum KeyFormat {
    #[default]
    Identity,
    FairPlay,
    Uuid(SystemId),
    Other(String),
}

impl KeyFormat {
    /**
        Parse a `KEYFORMAT` attribute value (without surrounding quotes).

        Never fails: unrecognized formats are kept verbatim in `Other`.
    */
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value == IDENTITY_KEY_FORMAT || value.is_empty() {
            return Self::Identity;
        }
        if value == FAIRPLAY_KEY_FORMAT {
            return Self::FairPlay;
        }
        let uuid = value
            .get(..UUID_KEY_FORMAT_PREFIX.len())
            .filter(|prefix| prefix.eq_ignore_ascii_case(UUID_KEY_FORMAT_PREFIX))
            .and_then(|_| SystemId::from_uuid(&value[UUID_KEY_FORMAT_PREFIX.len()..]));
        match uuid {
            Some(id) => Self::Uuid(id),
            None => Self::Other(value.to_owned()),
        }
    }

    /**
        The DRM system behind this key format, if any.

        Identity keys are not DRM protected and return `None`.
    */
    pub fn system_id(&self) -> Option<SystemId> {
        match self {
            Self::Identity | Self::Other(_) => None,
            Self::FairPlay => Some(SystemId::FairPlay),
            Self::Uuid(id) => Some(*id),
        }
    }

    pub fn is_fairplay(&self) -> bool {
        self.system_id() == Some(SystemId::FairPlay)
    }
}

impl fmt::Display for KeyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => f.write_str(IDENTITY_KEY_FORMAT),
            Self::FairPlay => f.write_str(FAIRPLAY_KEY_FORMAT),
            Self::Uuid(id) => write!(f, "{UUID_KEY_FORMAT_PREFIX}{}", id.to_uuid()),
            Self::Other(s) => f.write_str(s),
        }
    }
}

impl FromStr for KeyFormat {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Self::parse(s) {
            Self::Other(value) => Err(ParseError::new("key format", value)),
            known => Ok(known),
        }
    }
}
