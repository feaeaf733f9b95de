//! The transport capability and its production implementation.
//!
//! # Design
//! [`Transport`] has a single method. The pipeline only ever talks to
//! `dyn Transport`, so the network-backed [`ReqwestTransport`] and the
//! fixture-backed mock are interchangeable. Closures with the right signature
//! are transports too, which keeps ad-hoc test doubles short.

use std::sync::{Arc, OnceLock};

use tokio::runtime::Handle;

use crate::error::Error;
use crate::future::{promise, ResponseFuture};
use crate::http::{Headers, RawResponse, WireRequest};

/// Sends a request and asynchronously produces the raw response.
///
/// Failing to obtain any response at all (no connectivity, malformed target)
/// fails the returned future. A response with an error status is still a
/// response and resolves it.
pub trait Transport: Send + Sync {
    fn load_data(&self, request: WireRequest) -> ResponseFuture<RawResponse>;
}

impl<F> Transport for F
where
    F: Fn(WireRequest) -> ResponseFuture<RawResponse> + Send + Sync,
{
    fn load_data(&self, request: WireRequest) -> ResponseFuture<RawResponse> {
        self(request)
    }
}

/// The transport used when neither the request nor its session names one.
/// Every call returns a handle to the same shared client.
pub fn default_transport() -> Arc<dyn Transport> {
    static SHARED: OnceLock<Arc<ReqwestTransport>> = OnceLock::new();
    SHARED.get_or_init(|| Arc::new(ReqwestTransport::new())).clone()
}

/// Network transport backed by `reqwest`.
///
/// Each exchange runs as a task on the tokio runtime that is current when
/// `load_data` is called; the task settles the promise when the body has been
/// read. Calling outside a runtime fails the future instead of panicking.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn load_data(&self, request: WireRequest) -> ResponseFuture<RawResponse> {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(err) => return ResponseFuture::failed(Error::transport(err)),
        };
        let (future, promise) = promise();
        let client = self.client.clone();
        handle.spawn(async move {
            promise.settle(exchange(&client, request).await);
        });
        future
    }
}

async fn exchange(client: &reqwest::Client, request: WireRequest) -> Result<RawResponse, Error> {
    let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
        .map_err(Error::transport)?;
    let mut builder = client.request(method, request.url);
    for (name, value) in request.headers.iter() {
        builder = builder.header(name, value);
    }
    if let Some(body) = request.body {
        builder = builder.body(body);
    }

    let response = builder.send().await.map_err(Error::transport)?;
    let status = response.status().as_u16();
    let headers: Headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|value| (name.as_str(), value)))
        .collect();
    let body = response.bytes().await.map_err(Error::transport)?;
    Ok(RawResponse::http(status, headers, body.to_vec()))
}
