/*!
    The resource loading capability a host media framework exposes to
    custom loaders.

    The host owns the playback pipeline. Whenever it reaches a resource it
    cannot load by itself (a FairPlay key URI, for example) it hands a
    [`LoadingRequest`] to the registered [`ResourceLoaderDelegate`], which
    either declines it or promises to finish it later.
*/

use core::fmt;

use url::Url;

use crate::error::LicenseError;

/**
    Error reported by the host when it cannot build a key request.
*/
pub type HostError = Box<dyn std::error::Error + Send + Sync>;

/**
    Why the host is asking for a resource.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// First load of the resource.
    Loading,
    /// The host wants to renew a key it already holds.
    Renewal,
}

impl RequestKind {
    pub const fn to_name(self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Renewal => "renewal",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_name())
    }
}

/**
    A pending resource load, owned by whoever is going to finish it.

    Implemented by the host integration. Exactly one of
    [`finish_loading`](Self::finish_loading) and
    [`finish_loading_with_error`](Self::finish_loading_with_error) must be
    called once the delegate has accepted the request.
*/
pub trait LoadingRequest: Send + 'static {
    /**
        URL of the requested resource.
    */
    fn url(&self) -> &Url;

    /**
        Ask the host platform to build the key request message (SPC) for
        the given application certificate and content identifier.

        The returned bytes are opaque and go to the license server as-is.
    */
    fn content_key_request(
        &self,
        certificate: &[u8],
        content_id: &[u8],
    ) -> Result<Vec<u8>, HostError>;

    /**
        Provide the resource data (the CKC for key requests).
    */
    fn respond_with_data(&mut self, data: &[u8]);

    /**
        Complete the request successfully.
    */
    fn finish_loading(self: Box<Self>);

    /**
        Complete the request with an error.
    */
    fn finish_loading_with_error(self: Box<Self>, error: LicenseError);
}

/**
    A boxed request as handed over by the host.
*/
pub type BoxLoadingRequest = Box<dyn LoadingRequest>;

/**
    The capability a host media framework consults for resources it cannot
    load by itself.

    Returning `false` declines the request; the host then handles it as if
    no delegate were registered, and the request handle is dropped without
    being finished.
    Returning `true` means the delegate took ownership and will finish the
    request, possibly after this call returns.

    Object safe, so hosts can keep registered delegates as
    `Box<dyn ResourceLoaderDelegate>`.
*/
pub trait ResourceLoaderDelegate: Send + Sync {
    fn should_wait_for_loading(&self, request: BoxLoadingRequest) -> bool;

    /**
        Called when the host wants to renew a resource it loaded earlier.
        Defaults to the regular loading path.
    */
    fn should_wait_for_renewal(&self, request: BoxLoadingRequest) -> bool {
        self.should_wait_for_loading(request)
    }
}
