/*!
    FairPlay Streaming license delegate.

    Bridges a host media framework's resource loader to an external
    certificate server and license server. The key request (SPC) and the
    license response (CKC) are produced and consumed by the host platform;
    this crate only moves them between the host and the servers.
*/

mod config;
mod delegate;
mod error;
mod key_uri;
mod loader;
mod playlist;
mod server;

// Re-export shared DRM types from drm-core
pub use drm_core::{FAIRPLAY_KEY_FORMAT, FAIRPLAY_KEY_SCHEME, KeyFormat, SystemId};

pub use self::config::{DEFAULT_TIMEOUT, LicenseConfig, MessageEncoding};
pub use self::delegate::LicenseDelegate;
pub use self::error::{LicenseError, LicenseResult};
pub use self::key_uri::KeyUri;
pub use self::loader::{
    BoxLoadingRequest, HostError, LoadingRequest, RequestKind, ResourceLoaderDelegate,
};
pub use self::playlist::{KeyTag, fairplay_key_uris, key_tags};
pub use self::server::{HttpKeyServer, KeyServer};
