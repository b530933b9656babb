mod constants;
mod error;
mod types;

pub use self::constants::{
    CLEARKEY_SYSTEM_ID, FAIRPLAY_KEY_FORMAT, FAIRPLAY_KEY_SCHEME, FAIRPLAY_SYSTEM_ID,
    IDENTITY_KEY_FORMAT, PLAYREADY_SYSTEM_ID, UUID_KEY_FORMAT_PREFIX, WIDEVINE_SYSTEM_ID,
};
pub use self::error::ParseError;
pub use self::types::{KeyFormat, SystemId};
