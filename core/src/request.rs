//! Typed JSON request pipeline.
//!
//! # Design
//! A [`JsonRequest`] is configured once (target, method, headers, transport,
//! codecs) and can then be performed any number of times. Session-relative
//! constructors merge the session into the request at construction time;
//! nothing reads the session afterwards.
//!
//! `perform` splits into a pure [`JsonRequest::build`] step, whose failures
//! are returned synchronously, and a dispatch step whose outcome always
//! arrives through the returned [`ResponseFuture`]. Decoding is chained onto
//! the transport's future as a continuation, so the pipeline itself never
//! needs an executor.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::codec::{JsonDecoder, JsonEncoder};
use crate::error::Error;
use crate::future::{promise, ResponseFuture};
use crate::http::{Headers, HttpMethod, RawResponse, WireRequest};
use crate::log::Logger;
use crate::session::Session;
use crate::transport::{default_transport, Transport};

/// Status codes in this range decode as the success model.
pub fn is_success(status: u16) -> bool {
    (200..=299).contains(&status)
}

/// Per-call arguments to [`JsonRequest::perform`]. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Call {
    /// Overrides the request's method.
    pub method: Option<HttpMethod>,
    /// Appended to the request's URL path.
    pub command: String,
    /// Used verbatim as the target; skips all other building.
    pub url: Option<Url>,
    /// Query items for GET/HEAD, otherwise the JSON body.
    pub parameters: BTreeMap<String, String>,
    /// Raw body; takes precedence over `parameters`.
    pub body: Option<Vec<u8>>,
}

impl Call {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    pub fn command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    pub fn url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    pub fn parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A reusable request that decodes 2xx responses as `S` and error responses
/// as `E`.
///
/// `E`'s `Display` text becomes the message of [`Error::StatusCode`].
pub struct JsonRequest<S, E> {
    url: Url,
    method: HttpMethod,
    headers: Headers,
    transport: Arc<dyn Transport>,
    decoder: JsonDecoder,
    encoder: JsonEncoder,
    logger: Logger,
    models: PhantomData<fn() -> (S, E)>,
}

impl<S, E> JsonRequest<S, E> {
    /// A standalone request against an absolute URL, using the platform
    /// transport and no headers.
    pub fn new(method: HttpMethod, url: Url) -> Self {
        Self {
            url,
            method,
            headers: Headers::new(),
            transport: default_transport(),
            decoder: JsonDecoder::default(),
            encoder: JsonEncoder::default(),
            logger: Logger::current(),
            models: PhantomData,
        }
    }

    /// A request for `path` resolved against the session's base URL.
    pub fn with_session(method: HttpMethod, path: &str, session: &Session) -> Result<Self, Error> {
        let url = session.base_url().join(path).map_err(|e| {
            Error::InvalidUrl(format!("cannot resolve `{path}` against {}: {e}", session.base_url()))
        })?;
        Ok(Self::with_session_url(method, url, session))
    }

    /// A request for an already resolved URL, configured from the session.
    pub fn with_session_url(method: HttpMethod, url: Url, session: &Session) -> Self {
        let mut request = Self::new(method, url);
        request.headers = session.effective_headers();
        if let Some(transport) = &session.transport {
            request.transport = Arc::clone(transport);
        }
        request.decoder.policy.apply(&session.decoding);
        request.encoder.policy.apply(&session.encoding);
        request
    }

    /// Add a header; it overrides a same-named session header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_headers(mut self, headers: &Headers) -> Self {
        self.headers.merge(headers);
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_decoder(mut self, decoder: JsonDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_encoder(mut self, encoder: JsonEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn decoder(&self) -> &JsonDecoder {
        &self.decoder
    }

    pub fn encoder(&self) -> &JsonEncoder {
        &self.encoder
    }

    /// Serialize a body with this request's encoder policy.
    pub fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, Error> {
        self.encoder.encode(value).map_err(|e| Error::Encode(Arc::new(e)))
    }

    /// Build the wire request for `call` without sending it.
    pub fn build(&self, call: &Call) -> Result<WireRequest, Error> {
        let method = call.method.unwrap_or(self.method);
        if let Some(url) = &call.url {
            return Ok(WireRequest {
                method,
                url: url.clone(),
                headers: Headers::new(),
                body: None,
            });
        }

        if self.url.cannot_be_a_base() {
            return Err(Error::InvalidUrl(format!("{} has no path to extend", self.url)));
        }
        let mut url = self.url.clone();
        let path = format!("{}{}", url.path(), call.command);
        url.set_path(&path);
        if method.carries_query() && !call.parameters.is_empty() {
            url.query_pairs_mut().extend_pairs(&call.parameters);
        }

        let body = match &call.body {
            Some(body) => Some(body.clone()),
            None if !method.carries_query() => {
                Some(serde_json::to_vec(&call.parameters).map_err(|e| Error::Encode(Arc::new(e)))?)
            }
            None => None,
        };

        let mut headers = Headers::new();
        headers.insert("Content-Type", "application/json");
        headers.insert("Accept", "*/*");
        headers.merge(&self.headers);

        Ok(WireRequest {
            method,
            url,
            headers,
            body,
        })
    }
}

impl<S, E> JsonRequest<S, E>
where
    S: DeserializeOwned + Clone + Send + Sync + 'static,
    E: DeserializeOwned + fmt::Display + 'static,
{
    /// Build and dispatch `call`. Building failures are returned here;
    /// everything after dispatch arrives through the future.
    pub fn perform(&self, call: Call) -> Result<ResponseFuture<S>, Error> {
        let wire = self.build(&call)?;
        Ok(self.perform_wire(wire))
    }

    /// Dispatch a caller-built wire request.
    pub fn perform_wire(&self, wire: WireRequest) -> ResponseFuture<S> {
        self.logger
            .in_scope(|| debug!(method = %wire.method, url = %wire.url, "dispatching request"));
        let (future, promise) = promise();
        let decoder = self.decoder.clone();
        let logger = self.logger.clone();
        self.transport.load_data(wire).on_settle(move |outcome| {
            let result = match outcome {
                Ok(raw) => classify::<S, E>(&decoder, &logger, raw),
                Err(err) => Err(err.clone()),
            };
            promise.settle(result);
        });
        future
    }
}

fn classify<S, E>(decoder: &JsonDecoder, logger: &Logger, raw: &RawResponse) -> Result<S, Error>
where
    S: DeserializeOwned,
    E: DeserializeOwned + fmt::Display,
{
    let status = raw
        .status()
        .ok_or_else(|| Error::BadResponse("response carries no HTTP status".to_string()))?;
    logger.in_scope(|| debug!(status, bytes = raw.body.len(), "response received"));

    let payload: &[u8] = if raw.body.is_empty() { b"{}" } else { &raw.body };
    if is_success(status) {
        return decoder.decode::<S>(payload).map_err(|e| Error::Decode(Arc::new(e)));
    }
    match decoder.decode::<E>(payload) {
        Ok(model) => {
            let message = model.to_string();
            logger.in_scope(|| debug!(status, %message, "error response"));
            Err(Error::StatusCode { status, message })
        }
        Err(_) => Err(Error::UnableToDecodeErrorResponse { status }),
    }
}

impl<S, E> Clone for JsonRequest<S, E> {
    fn clone(&self) -> Self {
        Self {
            url: self.url.clone(),
            method: self.method,
            headers: self.headers.clone(),
            transport: Arc::clone(&self.transport),
            decoder: self.decoder.clone(),
            encoder: self.encoder.clone(),
            logger: self.logger.clone(),
            models: PhantomData,
        }
    }
}

impl<S, E> fmt::Debug for JsonRequest<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonRequest")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &self.headers)
            .field("decoder", &self.decoder)
            .field("encoder", &self.encoder)
            .finish_non_exhaustive()
    }
}
