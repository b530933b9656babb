use core::fmt;
use std::sync::Arc;

use bytes::Bytes;
use tokio::runtime::Handle;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::{LicenseConfig, check_scheme};
use crate::error::{LicenseError, LicenseResult};
use crate::key_uri::KeyUri;
use crate::loader::{BoxLoadingRequest, LoadingRequest, RequestKind, ResourceLoaderDelegate};
use crate::server::{HttpKeyServer, KeyServer};

struct Inner<S> {
    certificate_url: Url,
    license_url: Url,
    server: S,
    certificate: OnceCell<Bytes>,
}

/**
    Resource loader delegate that serves FairPlay key requests.

    Holds the application certificate URL and the license server URL given
    at construction; neither can change afterwards. When the host asks for
    an `skd://` resource the delegate:

    1. fetches the application certificate (once, then cached),
    2. asks the host to build the key request (SPC) for the key URI,
    3. POSTs the key request to the license URL,
    4. hands the response (CKC) back to the host.

    Clones share the certificate cache and key server.
*/
pub struct LicenseDelegate<S: KeyServer = HttpKeyServer> {
    inner: Arc<Inner<S>>,
    runtime: Option<Handle>,
}

impl LicenseDelegate<HttpKeyServer> {
    /**
        Create a delegate talking to the given URLs over plain HTTP.
    */
    pub fn new(certificate_url: Url, license_url: Url) -> Self {
        Self::with_key_server(certificate_url, license_url, HttpKeyServer::new())
    }

    /**
        Create a delegate from URL strings.

        Empty strings, unparsable URLs and unsupported schemes are rejected.
        The certificate may be served over `http`, `https` or read from a
        `file` URL; the license server must be `http` or `https`.
    */
    pub fn parse(certificate_url: &str, license_url: &str) -> LicenseResult<Self> {
        let certificate_url = parse_url("certificate", certificate_url)?;
        check_scheme("certificate", &certificate_url, &["http", "https", "file"])?;
        let license_url = parse_url("license", license_url)?;
        check_scheme("license", &license_url, &["http", "https"])?;
        Ok(Self::new(certificate_url, license_url))
    }

    /**
        Create a delegate with an HTTP key server configured from `config`.
    */
    pub fn from_config(config: &LicenseConfig) -> LicenseResult<Self> {
        config.validate()?;
        let server = HttpKeyServer::from_config(config)?;
        Ok(Self::with_key_server(
            config.certificate_url.clone(),
            config.license_url.clone(),
            server,
        ))
    }
}

impl<S: KeyServer> LicenseDelegate<S> {
    pub fn with_key_server(certificate_url: Url, license_url: Url, server: S) -> Self {
        Self {
            inner: Arc::new(Inner {
                certificate_url,
                license_url,
                server,
                certificate: OnceCell::new(),
            }),
            runtime: None,
        }
    }

    /**
        Run accepted requests on `handle` instead of the runtime that
        happens to be current when the host calls in.
    */
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /**
        Location of the application certificate.
    */
    pub fn certificate_url(&self) -> &Url {
        &self.inner.certificate_url
    }

    /**
        Endpoint that answers key requests.
    */
    pub fn license_url(&self) -> &Url {
        &self.inner.license_url
    }

    pub fn key_server(&self) -> &S {
        &self.inner.server
    }

    /**
        The application certificate, fetched on first use.

        Failed or empty fetches are not cached, the next call retries.
    */
    pub async fn certificate(&self) -> LicenseResult<Bytes> {
        let inner = &*self.inner;
        inner
            .certificate
            .get_or_try_init(|| async {
                let certificate = inner.server.fetch_certificate(&inner.certificate_url).await?;
                if certificate.is_empty() {
                    return Err(LicenseError::EmptyCertificate);
                }
                info!(
                    url = %inner.certificate_url,
                    bytes = certificate.len(),
                    "application certificate cached"
                );
                Ok(certificate)
            })
            .await
            .cloned()
    }

    /**
        Run the complete key exchange for one request and return the
        license response (CKC). The request is not finished.
    */
    #[instrument(skip_all, fields(url = %request.url()))]
    pub async fn acquire_license<R: LoadingRequest + ?Sized>(
        &self,
        request: &mut R,
    ) -> LicenseResult<Bytes> {
        let key_uri = KeyUri::from_url(request.url())?;
        debug!(asset_id = key_uri.asset_id(), "serving key request");

        let certificate = self.certificate().await?;

        let spc = request
            .content_key_request(&certificate, key_uri.content_identifier())
            .map_err(|e| LicenseError::KeyRequest(e.to_string()))?;
        debug!(bytes = spc.len(), "host built key request");

        let ckc = self
            .inner
            .server
            .request_license(&self.inner.license_url, spc)
            .await?;
        if ckc.is_empty() {
            return Err(LicenseError::EmptyLicense);
        }

        info!(asset_id = key_uri.asset_id(), bytes = ckc.len(), "license acquired");
        Ok(ckc)
    }

    async fn serve(self, mut pending: PendingRequest, kind: RequestKind) {
        let Some(request) = pending.request.as_deref_mut() else {
            return;
        };
        let result = self.acquire_license(request).await;
        pending.finish(result, kind);
    }

    fn accept(&self, request: BoxLoadingRequest, kind: RequestKind) -> bool {
        if !KeyUri::is_key_request(request.url()) {
            debug!(url = %request.url(), "not a key request, declining");
            return false;
        }

        let Some(runtime) = self.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            warn!(url = %request.url(), "no runtime to serve key request");
            request.finish_loading_with_error(LicenseError::NoRuntime);
            return true;
        };

        debug!(url = %request.url(), %kind, "accepted key request");
        runtime.spawn(self.clone().serve(PendingRequest::new(request), kind));
        true
    }
}

impl<S: KeyServer> Clone for LicenseDelegate<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            runtime: self.runtime.clone(),
        }
    }
}

impl<S: KeyServer> fmt::Debug for LicenseDelegate<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LicenseDelegate")
            .field("certificate_url", &self.inner.certificate_url.as_str())
            .field("license_url", &self.inner.license_url.as_str())
            .finish_non_exhaustive()
    }
}

impl<S: KeyServer> ResourceLoaderDelegate for LicenseDelegate<S> {
    fn should_wait_for_loading(&self, request: BoxLoadingRequest) -> bool {
        self.accept(request, RequestKind::Loading)
    }

    fn should_wait_for_renewal(&self, request: BoxLoadingRequest) -> bool {
        self.accept(request, RequestKind::Renewal)
    }
}

/**
    An accepted request that has not been finished yet.

    If it is dropped unfinished, for example because the runtime shut down
    with the task still queued or running, the request is finished with
    [`LicenseError::Cancelled`].
*/
struct PendingRequest {
    request: Option<BoxLoadingRequest>,
}

impl PendingRequest {
    fn new(request: BoxLoadingRequest) -> Self {
        Self {
            request: Some(request),
        }
    }

    fn finish(mut self, result: LicenseResult<Bytes>, kind: RequestKind) {
        let Some(mut request) = self.request.take() else {
            return;
        };
        match result {
            Ok(ckc) => {
                request.respond_with_data(&ckc);
                request.finish_loading();
            }
            Err(e) => {
                warn!(url = %request.url(), %kind, error = %e, "key request failed");
                request.finish_loading_with_error(e);
            }
        }
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        if let Some(request) = self.request.take() {
            warn!(url = %request.url(), "key request dropped unfinished");
            request.finish_loading_with_error(LicenseError::Cancelled);
        }
    }
}

fn parse_url(kind: &'static str, s: &str) -> LicenseResult<Url> {
    let s = s.trim();
    if s.is_empty() {
        return Err(LicenseError::EmptyUrl(kind));
    }
    Url::parse(s).map_err(|e| LicenseError::InvalidUrl {
        kind,
        url: s.to_owned(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::oneshot;

    use super::*;
    use crate::loader::HostError;

    const CERT: &[u8] = b"application-certificate";
    const CKC: &[u8] = b"content-key-context";

    #[derive(Default)]
    struct FakeServer {
        certificate: Vec<u8>,
        license: Option<Vec<u8>>,
        certificate_fetches: AtomicUsize,
        received: Mutex<Vec<(Url, Vec<u8>)>>,
    }

    impl FakeServer {
        fn working() -> Self {
            Self {
                certificate: CERT.to_vec(),
                license: Some(CKC.to_vec()),
                ..Self::default()
            }
        }
    }

    impl KeyServer for FakeServer {
        async fn fetch_certificate(&self, _url: &Url) -> LicenseResult<Bytes> {
            self.certificate_fetches.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(Bytes::from(self.certificate.clone()))
        }

        async fn request_license(&self, url: &Url, spc: Vec<u8>) -> LicenseResult<Bytes> {
            self.received.lock().unwrap().push((url.clone(), spc));
            match self.license {
                Some(ref ckc) => Ok(Bytes::from(ckc.clone())),
                None => Err(LicenseError::ServerStatus {
                    status: 403,
                    url: url.to_string(),
                }),
            }
        }
    }

    #[derive(Debug, PartialEq)]
    enum Outcome {
        Finished(Vec<u8>),
        Failed(LicenseError),
    }

    struct FakeRequest {
        url: Url,
        fail_key_request: bool,
        seen: Arc<Mutex<Vec<(Vec<u8>, Vec<u8>)>>>,
        data: Vec<u8>,
        done: Option<oneshot::Sender<Outcome>>,
    }

    impl FakeRequest {
        fn new(url: &str) -> (Self, oneshot::Receiver<Outcome>) {
            let (tx, rx) = oneshot::channel();
            let request = Self {
                url: Url::parse(url).unwrap(),
                fail_key_request: false,
                seen: Arc::default(),
                data: Vec::new(),
                done: Some(tx),
            };
            (request, rx)
        }

        fn complete(mut self, outcome: Outcome) {
            if let Some(tx) = self.done.take() {
                let _ = tx.send(outcome);
            }
        }
    }

    impl LoadingRequest for FakeRequest {
        fn url(&self) -> &Url {
            &self.url
        }

        fn content_key_request(
            &self,
            certificate: &[u8],
            content_id: &[u8],
        ) -> Result<Vec<u8>, HostError> {
            if self.fail_key_request {
                return Err("invalid certificate".into());
            }
            self.seen
                .lock()
                .unwrap()
                .push((certificate.to_vec(), content_id.to_vec()));
            let mut spc = b"spc:".to_vec();
            spc.extend_from_slice(content_id);
            Ok(spc)
        }

        fn respond_with_data(&mut self, data: &[u8]) {
            self.data.extend_from_slice(data);
        }

        fn finish_loading(self: Box<Self>) {
            let mut this = *self;
            let data = std::mem::take(&mut this.data);
            this.complete(Outcome::Finished(data));
        }

        fn finish_loading_with_error(self: Box<Self>, error: LicenseError) {
            (*self).complete(Outcome::Failed(error));
        }
    }

    fn delegate(server: FakeServer) -> LicenseDelegate<FakeServer> {
        LicenseDelegate::with_key_server(
            Url::parse("https://drm.example.com/fairplay.cer").unwrap(),
            Url::parse("https://drm.example.com/license").unwrap(),
            server,
        )
    }

    #[test]
    fn accessors_return_constructor_values() {
        let cert = Url::parse("https://drm.example.com/fairplay.cer").unwrap();
        let license = Url::parse("https://drm.example.com/license?tenant=7").unwrap();
        let delegate = LicenseDelegate::new(cert.clone(), license.clone());
        assert_eq!(delegate.certificate_url(), &cert);
        assert_eq!(delegate.license_url(), &license);

        let copy = delegate.clone();
        assert_eq!(copy.certificate_url(), &cert);
        assert_eq!(copy.license_url(), &license);
    }

    #[test]
    fn parse_accepts_valid_urls() {
        let delegate =
            LicenseDelegate::parse("file:///etc/fairplay.cer", " https://drm.example.com/l ")
                .unwrap();
        assert_eq!(delegate.certificate_url().as_str(), "file:///etc/fairplay.cer");
        assert_eq!(delegate.license_url().as_str(), "https://drm.example.com/l");
    }

    #[test]
    fn parse_rejects_empty_urls() {
        let err = LicenseDelegate::parse("", "https://drm.example.com/l").unwrap_err();
        assert_eq!(err, LicenseError::EmptyUrl("certificate"));
        let err = LicenseDelegate::parse("https://drm.example.com/c", "   ").unwrap_err();
        assert_eq!(err, LicenseError::EmptyUrl("license"));
    }

    #[test]
    fn parse_rejects_bad_urls() {
        let err = LicenseDelegate::parse("not a url", "https://drm.example.com/l").unwrap_err();
        assert!(matches!(err, LicenseError::InvalidUrl { kind: "certificate", .. }));
        let err = LicenseDelegate::parse("https://drm.example.com/c", "skd://abc").unwrap_err();
        assert_eq!(
            err,
            LicenseError::UnsupportedUrlScheme {
                kind: "license",
                scheme: "skd".into()
            }
        );
    }

    #[tokio::test]
    async fn acquire_license_runs_exchange() {
        let delegate = delegate(FakeServer::working());
        let (mut request, _rx) = FakeRequest::new("skd://asset-42");
        let seen = Arc::clone(&request.seen);

        let ckc = delegate.acquire_license(&mut request).await.unwrap();
        assert_eq!(&ckc[..], CKC);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[(CERT.to_vec(), b"skd://asset-42".to_vec())]);

        let received = delegate.key_server().received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, *delegate.license_url());
        assert_eq!(received[0].1, b"spc:skd://asset-42");
    }

    #[tokio::test]
    async fn certificate_fetched_once() {
        let delegate = delegate(FakeServer::working());
        for _ in 0..3 {
            let (mut request, _rx) = FakeRequest::new("skd://asset");
            delegate.acquire_license(&mut request).await.unwrap();
        }
        assert_eq!(
            delegate
                .key_server()
                .certificate_fetches
                .load(Ordering::SeqCst),
            1
        );
    }

    #[tokio::test]
    async fn empty_certificate_is_not_cached() {
        let delegate = delegate(FakeServer::default());
        assert_eq!(
            delegate.certificate().await.unwrap_err(),
            LicenseError::EmptyCertificate
        );
        assert_eq!(
            delegate.certificate().await.unwrap_err(),
            LicenseError::EmptyCertificate
        );
        assert_eq!(
            delegate
                .key_server()
                .certificate_fetches
                .load(Ordering::SeqCst),
            2
        );
    }

    #[tokio::test]
    async fn host_key_request_failure_is_reported() {
        let delegate = delegate(FakeServer::working());
        let (mut request, _rx) = FakeRequest::new("skd://asset");
        request.fail_key_request = true;
        let err = delegate.acquire_license(&mut request).await.unwrap_err();
        assert_eq!(err, LicenseError::KeyRequest("invalid certificate".into()));
        assert!(delegate.key_server().received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_license_is_an_error() {
        let delegate = delegate(FakeServer {
            license: Some(Vec::new()),
            ..FakeServer::working()
        });
        let (mut request, _rx) = FakeRequest::new("skd://asset");
        let err = delegate.acquire_license(&mut request).await.unwrap_err();
        assert_eq!(err, LicenseError::EmptyLicense);
    }

    #[tokio::test]
    async fn loading_request_is_finished_with_ckc() {
        let delegate = delegate(FakeServer::working());
        let (request, rx) = FakeRequest::new("skd://asset-1");
        assert!(delegate.should_wait_for_loading(Box::new(request)));
        assert_eq!(rx.await.unwrap(), Outcome::Finished(CKC.to_vec()));
    }

    #[tokio::test]
    async fn renewal_follows_loading_path() {
        let delegate = delegate(FakeServer::working());
        let (request, rx) = FakeRequest::new("skd://asset-1");
        assert!(delegate.should_wait_for_renewal(Box::new(request)));
        assert_eq!(rx.await.unwrap(), Outcome::Finished(CKC.to_vec()));
    }

    #[tokio::test]
    async fn server_error_finishes_with_error() {
        let delegate = delegate(FakeServer {
            license: None,
            ..FakeServer::working()
        });
        let (request, rx) = FakeRequest::new("skd://asset-1");
        assert!(delegate.should_wait_for_loading(Box::new(request)));
        assert_eq!(
            rx.await.unwrap(),
            Outcome::Failed(LicenseError::ServerStatus {
                status: 403,
                url: "https://drm.example.com/license".into()
            })
        );
    }

    #[tokio::test]
    async fn missing_content_id_finishes_with_error() {
        let delegate = delegate(FakeServer::working());
        let (request, rx) = FakeRequest::new("skd://");
        assert!(delegate.should_wait_for_loading(Box::new(request)));
        assert_eq!(
            rx.await.unwrap(),
            Outcome::Failed(LicenseError::MissingContentId)
        );
    }

    #[tokio::test]
    async fn other_schemes_are_declined() {
        let delegate = delegate(FakeServer::working());
        let (request, rx) = FakeRequest::new("https://cdn.example.com/master.m3u8");
        assert!(!delegate.should_wait_for_loading(Box::new(request)));
        assert!(rx.await.is_err());
        assert_eq!(
            delegate
                .key_server()
                .certificate_fetches
                .load(Ordering::SeqCst),
            0
        );
    }

    #[test]
    fn without_runtime_request_fails() {
        let delegate = delegate(FakeServer::working());
        let (request, mut rx) = FakeRequest::new("skd://asset-1");
        assert!(delegate.should_wait_for_loading(Box::new(request)));
        assert_eq!(
            rx.try_recv().unwrap(),
            Outcome::Failed(LicenseError::NoRuntime)
        );
    }

    #[test]
    fn explicit_runtime_serves_requests_from_foreign_threads() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let delegate = delegate(FakeServer::working()).with_runtime(runtime.handle().clone());

        let (request, rx) = FakeRequest::new("skd://asset-1");
        std::thread::spawn(move || {
            assert!(delegate.should_wait_for_loading(Box::new(request)));
        })
            .join()
            .unwrap();

        let outcome = runtime.block_on(rx).unwrap();
        assert_eq!(outcome, Outcome::Finished(CKC.to_vec()));
    }

    #[test]
    fn debug_shows_urls() {
        let delegate = delegate(FakeServer::working());
        let debug = format!("{delegate:?}");
        assert!(debug.contains("https://drm.example.com/fairplay.cer"));
        assert!(debug.contains("https://drm.example.com/license"));
    }

    #[test]
    fn shut_down_runtime_cancels_request() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let handle = runtime.handle().clone();
        runtime.shutdown_background();

        let delegate = delegate(FakeServer::working()).with_runtime(handle);
        let (request, rx) = FakeRequest::new("skd://asset-1");
        assert!(delegate.should_wait_for_loading(Box::new(request)));
        assert_eq!(
            rx.blocking_recv().unwrap(),
            Outcome::Failed(LicenseError::Cancelled)
        );
    }

    #[test]
    fn unfinished_pending_request_is_cancelled_on_drop() {
        let (request, mut rx) = FakeRequest::new("skd://asset-1");
        drop(PendingRequest::new(Box::new(request)));
        assert_eq!(
            rx.try_recv().unwrap(),
            Outcome::Failed(LicenseError::Cancelled)
        );
    }

    #[test]
    fn finished_pending_request_is_not_cancelled() {
        let (request, mut rx) = FakeRequest::new("skd://asset-1");
        PendingRequest::new(Box::new(request))
            .finish(Ok(Bytes::from_static(CKC)), RequestKind::Loading);
        assert_eq!(rx.try_recv().unwrap(), Outcome::Finished(CKC.to_vec()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_fetch_certificate_once() {
        let delegate = delegate(FakeServer::working());

        let mut pending = Vec::new();
        for i in 0..8 {
            let (request, rx) = FakeRequest::new(&format!("skd://asset-{i}"));
            assert!(delegate.should_wait_for_loading(Box::new(request)));
            pending.push(rx);
        }

        for rx in pending {
            assert_eq!(rx.await.unwrap(), Outcome::Finished(CKC.to_vec()));
        }
        assert_eq!(
            delegate
                .key_server()
                .certificate_fetches
                .load(Ordering::SeqCst),
            1
        );
        assert_eq!(delegate.key_server().received.lock().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn delegates_can_be_registered_as_trait_objects() {
        let registry: Vec<Box<dyn ResourceLoaderDelegate>> =
            vec![Box::new(delegate(FakeServer::working()))];

        let (request, rx) = FakeRequest::new("skd://asset-1");
        assert!(registry[0].should_wait_for_loading(Box::new(request)));
        assert_eq!(rx.await.unwrap(), Outcome::Finished(CKC.to_vec()));
    }
}
