use hex_literal::hex;

/**
    Widevine DRM System ID: `edef8ba9-79d6-4ace-a3c8-27dcd51d21ed`
*/
pub const WIDEVINE_SYSTEM_ID: [u8; 16] = hex!("edef8ba979d64acea3c827dcd51d21ed");

/**
    PlayReady DRM System ID: `9a04f079-9840-4286-ab92-e65be0885f95`
*/
pub const PLAYREADY_SYSTEM_ID: [u8; 16] = hex!("9a04f07998404286ab92e65be0885f95");

/**
    Apple FairPlay DRM System ID: `94ce86fb-07ff-4f43-adb8-93d2fa968ca2`
*/
pub const FAIRPLAY_SYSTEM_ID: [u8; 16] = hex!("94ce86fb07ff4f43adb893d2fa968ca2");

/**
    W3C ClearKey System ID: `1077efec-c0b2-4d02-ace3-3c1e52e2fb4b`
*/
pub const CLEARKEY_SYSTEM_ID: [u8; 16] = hex!("1077efecc0b24d02ace33c1e52e2fb4b");

/**
    HLS `KEYFORMAT` of FairPlay Streaming keys.
*/
pub const FAIRPLAY_KEY_FORMAT: &str = "com.apple.streamingkeydelivery";

/**
    HLS `KEYFORMAT` of plain AES-128 keys. Also the implied format when the
    attribute is absent.
*/
pub const IDENTITY_KEY_FORMAT: &str = "identity";

/**
    Prefix of `KEYFORMAT` values that name a DRM system by UUID
    (`urn:uuid:edef8ba9-...` for Widevine, for example).
*/
pub const UUID_KEY_FORMAT_PREFIX: &str = "urn:uuid:";

/**
    URI scheme of FairPlay key requests (`skd://<asset id>`).
*/
pub const FAIRPLAY_KEY_SCHEME: &str = "skd";
