/*!
 * HTTP Client
 * The native call behind `handle`, as an injectable trait
 */

use super::types::RequestOptions;
use crate::core::limits::DEFAULT_CONNECT_TIMEOUT;
use crate::streams::BodyStream;
use crate::translate::{ErrorCode, ErrorCodeTranslator, Operation};
use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use reqwest::header::HeaderMap;
use std::error::Error as _;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Fully checked request ready for the wire
pub struct NativeRequest {
    pub method: reqwest::Method,
    pub url: reqwest::Url,
    pub headers: HeaderMap,
    pub body: Option<BodyStream>,
    pub options: RequestOptions,
}

impl fmt::Debug for NativeRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers.len())
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

/// Response as soon as its head is known
pub struct NativeResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: BodyStream,
    pub trailers: Option<HeaderMap>,
}

impl fmt::Debug for NativeResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeResponse")
            .field("status", &self.status)
            .field("headers", &self.headers.len())
            .finish()
    }
}

/// One native request per call
pub trait HttpClient: Send + Sync + 'static {
    fn send(&self, request: NativeRequest) -> BoxFuture<'static, Result<NativeResponse, ErrorCode>>;
}

/// `reqwest` backed client
///
/// Redirects are not followed and proxies are not consulted, so one
/// `send` talks to exactly the authority that was checked.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
    translator: ErrorCodeTranslator,
}

impl ReqwestClient {
    pub fn new(translator: ErrorCodeTranslator) -> Result<Self, ErrorCode> {
        Self::with_connect_timeout(translator, DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_connect_timeout(
        translator: ErrorCodeTranslator,
        connect_timeout: Duration,
    ) -> Result<Self, ErrorCode> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .no_proxy()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|_| ErrorCode::Unsupported)?;
        Ok(Self { client, translator })
    }
}

/// Map a reqwest failure onto the portable codes
fn classify(err: &reqwest::Error, translator: ErrorCodeTranslator) -> ErrorCode {
    if err.is_timeout() {
        return ErrorCode::Timeout;
    }
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            return translator.translate(io, Operation::Http);
        }
        source = cause.source();
    }
    if err.is_connect() {
        ErrorCode::ConnectionRefused
    } else if err.is_builder() {
        ErrorCode::InvalidArgument
    } else {
        ErrorCode::Io
    }
}

/// Fail a body when it stalls longer than `limit` between chunks
pub(crate) fn with_idle_timeout(body: BodyStream, limit: Option<Duration>) -> BodyStream {
    let Some(limit) = limit else {
        return body;
    };
    let stream = async_stream::stream! {
        let mut body = body;
        loop {
            match tokio::time::timeout(limit, body.next()).await {
                Ok(Some(item)) => yield item,
                Ok(None) => break,
                Err(_) => {
                    yield Err(ErrorCode::Timeout);
                    break;
                }
            }
        }
    };
    stream.boxed()
}

impl HttpClient for ReqwestClient {
    fn send(&self, request: NativeRequest) -> BoxFuture<'static, Result<NativeResponse, ErrorCode>> {
        let translator = self.translator;
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(reqwest::Body::wrap_stream(body));
        }
        let options = request.options;

        async move {
            let sent = builder.send();
            let response = match options.header_deadline() {
                Some(limit) => tokio::time::timeout(limit, sent)
                    .await
                    .map_err(|_| ErrorCode::Timeout)?,
                None => sent.await,
            }
            .map_err(|e| classify(&e, translator))?;

            let status = response.status().as_u16();
            let headers = response.headers().clone();
            debug!(status, "response head received");
            let body = response
                .bytes_stream()
                .map(move |chunk| chunk.map_err(|e| classify(&e, translator)))
                .boxed();
            Ok(NativeResponse {
                status,
                headers,
                body: with_idle_timeout(body, options.between_bytes_timeout),
                trailers: None,
            })
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::stream;

    #[test]
    fn test_idle_timeout_fails_stalled_body() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let stalled = stream::once(async { Ok(Bytes::from_static(b"a")) })
            .chain(stream::pending())
            .boxed();
        let items: Vec<_> = rt.block_on(
            with_idle_timeout(stalled, Some(Duration::from_millis(20))).collect(),
        );
        assert_eq!(items, vec![Ok(Bytes::from_static(b"a")), Err(ErrorCode::Timeout)]);
    }

    #[test]
    fn test_client_builds() {
        assert!(ReqwestClient::new(ErrorCodeTranslator::native()).is_ok());
    }
}
