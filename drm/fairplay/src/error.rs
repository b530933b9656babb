use thiserror::Error;

/**
    Errors raised while serving a FairPlay key request.

    Every variant is cheap to clone so a single failure can be both logged
    and handed back to the host that issued the request.
*/
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LicenseError {
    // ── URL validation ────────────────────────────────────────────────
    #[error("{0} URL is empty")]
    EmptyUrl(&'static str),
    #[error("invalid {kind} URL '{url}': {reason}")]
    InvalidUrl {
        kind: &'static str,
        url: String,
        reason: String,
    },
    #[error("unsupported scheme '{scheme}' for {kind} URL")]
    UnsupportedUrlScheme { kind: &'static str, scheme: String },

    // ── Key URI ───────────────────────────────────────────────────────
    #[error("not a FairPlay key request (scheme '{0}')")]
    UnsupportedScheme(String),
    #[error("key URI has no content identifier")]
    MissingContentId,

    // ── Application certificate ───────────────────────────────────────
    #[error("application certificate is empty")]
    EmptyCertificate,
    #[error("failed to read certificate file: {0}")]
    CertificateFile(String),

    // ── Host key request ──────────────────────────────────────────────
    #[error("host could not create a key request: {0}")]
    KeyRequest(String),

    // ── Transport ─────────────────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("{url} returned HTTP {status}")]
    ServerStatus { status: u16, url: String },
    #[error("invalid header '{0}'")]
    InvalidHeader(String),

    // ── License response ──────────────────────────────────────────────
    #[error("license server returned an empty response")]
    EmptyLicense,
    #[error("license response is not valid base64: {0}")]
    InvalidBase64(String),

    // ── Runtime ───────────────────────────────────────────────────────
    #[error("no async runtime available to serve the request")]
    NoRuntime,
    #[error("key request was cancelled before it completed")]
    Cancelled,

    // ── Configuration ─────────────────────────────────────────────────
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for LicenseError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

impl From<serde_yaml::Error> for LicenseError {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Config(e.to_string())
    }
}

/**
    Type alias for results that may return a [`LicenseError`].
*/
pub type LicenseResult<T> = std::result::Result<T, LicenseError>;
