/*!
 * Shared test collaborators
 * Counting filesystem, echo HTTP client, and context helpers
 */

#![allow(dead_code)]

use ai_os_wasi::filesystem::{
    DescriptorStat, HostFs, NativeDirIter, NativeFs, NativeOpenOptions,
};
use ai_os_wasi::http::{HttpClient, NativeRequest, NativeResponse};
use ai_os_wasi::{ErrorCode, Handle, HostConfig, HostContext};
use futures::future::BoxFuture;
use futures::{stream, FutureExt, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;
use tempfile::TempDir;

// =============================================================================
// Counting filesystem
// =============================================================================

/// `HostFs` wrapper that counts every native call
#[derive(Debug, Default)]
pub struct CountingFs {
    inner: HostFs,
    calls: AtomicUsize,
}

impl CountingFs {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl NativeFs for CountingFs {
    fn open(&self, path: &Path, options: NativeOpenOptions) -> io::Result<File> {
        self.count();
        self.inner.open(path, options)
    }

    fn metadata(&self, path: &Path) -> io::Result<DescriptorStat> {
        self.count();
        self.inner.metadata(path)
    }

    fn symlink_metadata(&self, path: &Path) -> io::Result<DescriptorStat> {
        self.count();
        self.inner.symlink_metadata(path)
    }

    fn read_dir(&self, path: &Path) -> io::Result<NativeDirIter> {
        self.count();
        self.inner.read_dir(path)
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        self.count();
        self.inner.create_dir(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        self.count();
        self.inner.remove_dir(path)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        self.count();
        self.inner.remove_file(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.count();
        self.inner.rename(from, to)
    }

    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        self.count();
        self.inner.symlink(target, link)
    }

    fn hard_link(&self, original: &Path, link: &Path) -> io::Result<()> {
        self.count();
        self.inner.hard_link(original, link)
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        self.count();
        self.inner.read_link(path)
    }

    fn set_times(
        &self,
        path: &Path,
        accessed: Option<SystemTime>,
        modified: Option<SystemTime>,
        follow: bool,
    ) -> io::Result<()> {
        self.count();
        self.inner.set_times(path, accessed, modified, follow)
    }

    fn name(&self) -> &str {
        "counting"
    }
}

// =============================================================================
// Echo HTTP client
// =============================================================================

/// Answers every request with its own body, plus an `x-trailer` trailer
#[derive(Debug, Default)]
pub struct EchoClient {
    calls: AtomicUsize,
    stalled: AtomicBool,
    last_url: parking_lot::Mutex<Option<String>>,
}

impl EchoClient {
    /// Leave later responses pending forever
    pub fn stall(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_url(&self) -> Option<String> {
        self.last_url.lock().clone()
    }
}

impl HttpClient for EchoClient {
    fn send(&self, request: NativeRequest) -> BoxFuture<'static, Result<NativeResponse, ErrorCode>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_url.lock() = Some(request.url.to_string());
        if self.stalled.load(Ordering::SeqCst) {
            return futures::future::pending().boxed();
        }

        let mut headers = HeaderMap::new();
        if let Ok(method) = HeaderValue::from_str(request.method.as_str()) {
            headers.insert("x-echo-method", method);
        }
        let mut trailers = HeaderMap::new();
        trailers.insert("x-trailer", HeaderValue::from_static("done"));

        let body = request.body.unwrap_or_else(|| stream::empty().boxed());
        async move {
            Ok(NativeResponse {
                status: 200,
                headers,
                body,
                trailers: Some(trailers),
            })
        }
        .boxed()
    }
}

// =============================================================================
// Contexts
// =============================================================================

/// Context over a fresh temp dir preopened at `/sandbox`
pub struct Sandbox {
    pub dir: TempDir,
    pub fs: Arc<CountingFs>,
    pub http: Arc<EchoClient>,
    pub host: HostContext,
}

impl Sandbox {
    pub fn new() -> Self {
        Self::with_config(|builder| builder)
    }

    pub fn with_config(
        configure: impl FnOnce(ai_os_wasi::config::HostConfigBuilder) -> ai_os_wasi::config::HostConfigBuilder,
    ) -> Self {
        let dir = TempDir::new().unwrap();
        let config = configure(HostConfig::builder().preopen("/sandbox", dir.path()).worker_threads(2))
            .validate()
            .unwrap();
        let fs = Arc::new(CountingFs::default());
        let http = Arc::new(EchoClient::default());
        let host = HostContext::builder(config)
            .with_native_fs(fs.clone())
            .with_http_client(http.clone())
            .build()
            .unwrap();
        Self { dir, fs, http, host }
    }

    /// Handle of the `/sandbox` preopen
    pub fn root(&self) -> Handle {
        self.host
            .get_directories()
            .into_iter()
            .find(|(_, path)| path == "/sandbox")
            .map(|(handle, _)| handle)
            .unwrap()
    }
}

/// Read an input stream until it ends
pub fn read_to_end(host: &HostContext, stream: Handle) -> Vec<u8> {
    let mut received = Vec::new();
    loop {
        let outcome = host.stream_blocking_read(stream, 16 * 1024).unwrap();
        received.extend_from_slice(&outcome.bytes);
        if outcome.ended {
            return received;
        }
    }
}
