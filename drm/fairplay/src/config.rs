use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{LicenseError, LicenseResult};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/**
    Upper bound on a single certificate or license request when nothing
    else is configured.
*/
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(DEFAULT_TIMEOUT_SECS);

/**
    How SPC and CKC messages are carried in HTTP bodies.
*/
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageEncoding {
    /// Raw bytes in both directions.
    #[default]
    Raw,
    /// SPC sent as base64 text, CKC received as base64 text.
    Base64,
}

/**
    Configuration of a license delegate and the key server it talks to.

    Usually loaded from YAML:

    ```yaml
    certificate_url: https://drm.example.com/fairplay.cer
    license_url: https://drm.example.com/license
    headers:
      X-Api-Key: secret
    timeout_secs: 10
    message_encoding: base64
    ```
*/
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseConfig {
    pub certificate_url: Url,
    pub license_url: Url,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub message_encoding: MessageEncoding,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl LicenseConfig {
    pub fn new(certificate_url: Url, license_url: Url) -> Self {
        Self {
            certificate_url,
            license_url,
            headers: BTreeMap::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: None,
            message_encoding: MessageEncoding::Raw,
        }
    }

    pub fn from_yaml_str(s: &str) -> LicenseResult<Self> {
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> LicenseResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| LicenseError::Config(format!("{}: {e}", path.display())))?;
        Self::from_yaml_str(&content)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /**
        Check URL schemes and timeout. Called by the YAML loaders; configs
        built in code are checked when a delegate is created from them.
    */
    pub fn validate(&self) -> LicenseResult<()> {
        check_scheme("certificate", &self.certificate_url, &["http", "https", "file"])?;
        check_scheme("license", &self.license_url, &["http", "https"])?;
        if self.timeout_secs == 0 {
            return Err(LicenseError::Config("timeout_secs must be positive".into()));
        }
        Ok(())
    }
}

pub(crate) fn check_scheme(kind: &'static str, url: &Url, allowed: &[&str]) -> LicenseResult<()> {
    if allowed.contains(&url.scheme()) {
        Ok(())
    } else {
        Err(LicenseError::UnsupportedUrlScheme {
            kind,
            scheme: url.scheme().to_owned(),
        })
    }
}
