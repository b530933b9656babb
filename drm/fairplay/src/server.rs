use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use data_encoding::{BASE64, BASE64_NOPAD};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use tracing::debug;
use url::Url;

use crate::config::{DEFAULT_TIMEOUT, LicenseConfig, MessageEncoding};
use crate::error::{LicenseError, LicenseResult};

/**
    Remote side of the FairPlay exchange: where the application certificate
    lives and where key requests are answered.

    Both messages are opaque to this crate.
*/
pub trait KeyServer: Send + Sync + 'static {
    /**
        Retrieve the application certificate.
    */
    fn fetch_certificate(&self, url: &Url) -> impl Future<Output = LicenseResult<Bytes>> + Send;

    /**
        Send a key request (SPC) and return the license response (CKC).
    */
    fn request_license(
        &self,
        url: &Url,
        spc: Vec<u8>,
    ) -> impl Future<Output = LicenseResult<Bytes>> + Send;
}

/**
    [`KeyServer`] backed by HTTP.

    Certificates are fetched with GET (or read from disk for `file://`
    URLs). Key requests are POSTed to the license URL.
*/
#[derive(Debug, Clone)]
pub struct HttpKeyServer {
    client: reqwest::Client,
    encoding: MessageEncoding,
    timeout: Duration,
}

impl HttpKeyServer {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new(), MessageEncoding::Raw)
    }

    /**
        Wrap an existing client. Every request is bounded by
        [`DEFAULT_TIMEOUT`] unless changed with
        [`with_timeout`](Self::with_timeout).
    */
    pub fn with_client(client: reqwest::Client, encoding: MessageEncoding) -> Self {
        Self {
            client,
            encoding,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /**
        Build a client with the headers, user agent and timeout of the
        given configuration.
    */
    pub fn from_config(config: &LicenseConfig) -> LicenseResult<Self> {
        let mut headers = HeaderMap::new();
        for (key, value) in &config.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|_| LicenseError::InvalidHeader(key.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| LicenseError::InvalidHeader(key.clone()))?;
            headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout());
        if let Some(ref agent) = config.user_agent {
            builder = builder.user_agent(agent.as_str());
        }
        let client = builder.build()?;

        Ok(Self::with_client(client, config.message_encoding).with_timeout(config.timeout()))
    }

    pub fn encoding(&self) -> MessageEncoding {
        self.encoding
    }

    async fn read_certificate_file(url: &Url) -> LicenseResult<Bytes> {
        let path = url
            .to_file_path()
            .map_err(|_| LicenseError::CertificateFile(format!("not a local path: {url}")))?;
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| LicenseError::CertificateFile(format!("{}: {e}", path.display())))?;
        Ok(Bytes::from(data))
    }

    async fn read_success(response: reqwest::Response) -> LicenseResult<Bytes> {
        let status = response.status();
        if !status.is_success() {
            return Err(LicenseError::ServerStatus {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }
        Ok(response.bytes().await?)
    }
}

impl Default for HttpKeyServer {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyServer for HttpKeyServer {
    async fn fetch_certificate(&self, url: &Url) -> LicenseResult<Bytes> {
        let certificate = if url.scheme() == "file" {
            Self::read_certificate_file(url).await?
        } else {
            let response = self
                .client
                .get(url.clone())
                .timeout(self.timeout)
                .send()
                .await?;
            Self::read_success(response).await?
        };
        debug!(%url, bytes = certificate.len(), "fetched application certificate");
        Ok(certificate)
    }

    async fn request_license(&self, url: &Url, spc: Vec<u8>) -> LicenseResult<Bytes> {
        let (body, content_type) = match self.encoding {
            MessageEncoding::Raw => (spc, "application/octet-stream"),
            MessageEncoding::Base64 => (BASE64.encode(&spc).into_bytes(), "text/plain"),
        };
        debug!(%url, bytes = body.len(), encoding = ?self.encoding, "sending key request");

        let response = self
            .client
            .post(url.clone())
            .timeout(self.timeout)
            .header(CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await?;
        let raw = Self::read_success(response).await?;

        match self.encoding {
            MessageEncoding::Raw => Ok(raw),
            MessageEncoding::Base64 => decode_base64_body(&raw),
        }
    }
}

/**
    Decode a base64 CKC body. Line breaks and surrounding whitespace are
    ignored, and trailing `=` padding is optional.
*/
fn decode_base64_body(raw: &[u8]) -> LicenseResult<Bytes> {
    let mut text: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    while text.last() == Some(&b'=') {
        text.pop();
    }
    BASE64_NOPAD
        .decode(&text)
        .map(Bytes::from)
        .map_err(|e| LicenseError::InvalidBase64(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_wrapped_base64() {
        let decoded = decode_base64_body(b"  AAEC\r\nAwQ=\n").unwrap();
        assert_eq!(&decoded[..], &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn decodes_unpadded_base64() {
        let decoded = decode_base64_body(b"AAECAwQ").unwrap();
        assert_eq!(&decoded[..], &[0, 1, 2, 3, 4]);
        let decoded = decode_base64_body(b"AAECAwQF\n").unwrap();
        assert_eq!(&decoded[..], &[0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn rejects_bad_base64() {
        let err = decode_base64_body(b"not base64!").unwrap_err();
        assert!(matches!(err, LicenseError::InvalidBase64(_)));
    }

    #[test]
    fn requests_are_bounded_by_default() {
        assert_eq!(HttpKeyServer::new().timeout(), DEFAULT_TIMEOUT);
        assert_eq!(DEFAULT_TIMEOUT, Duration::from_secs(30));

        let server = HttpKeyServer::with_client(reqwest::Client::new(), MessageEncoding::Base64);
        assert_eq!(server.timeout(), DEFAULT_TIMEOUT);
        let server = server.with_timeout(Duration::from_secs(3));
        assert_eq!(server.timeout(), Duration::from_secs(3));
    }

    #[test]
    fn config_timeout_is_applied() {
        let mut config = LicenseConfig::new(
            Url::parse("https://a.example/c").unwrap(),
            Url::parse("https://a.example/l").unwrap(),
        );
        config.timeout_secs = 7;
        let server = HttpKeyServer::from_config(&config).unwrap();
        assert_eq!(server.timeout(), Duration::from_secs(7));
    }

    #[test]
    fn config_with_bad_header_fails() {
        let mut config = LicenseConfig::new(
            Url::parse("https://a.example/c").unwrap(),
            Url::parse("https://a.example/l").unwrap(),
        );
        config.headers.insert("Bad Header".into(), "x".into());
        let err = HttpKeyServer::from_config(&config).unwrap_err();
        assert_eq!(err, LicenseError::InvalidHeader("Bad Header".into()));
    }

    #[tokio::test]
    async fn reads_file_certificate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.cer");
        std::fs::write(&path, [0x30, 0x82, 0x01]).unwrap();
        let url = Url::from_file_path(&path).unwrap();

        let cert = HttpKeyServer::new().fetch_certificate(&url).await.unwrap();
        assert_eq!(&cert[..], &[0x30, 0x82, 0x01]);
    }

    #[tokio::test]
    async fn missing_file_certificate_fails() {
        let dir = tempfile::tempdir().unwrap();
        let url = Url::from_file_path(dir.path().join("missing.cer")).unwrap();
        let err = HttpKeyServer::new()
            .fetch_certificate(&url)
            .await
            .unwrap_err();
        assert!(matches!(err, LicenseError::CertificateFile(_)));
    }
}
