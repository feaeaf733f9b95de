//! Transport that answers from a [`MockRegistry`] instead of the network.

use std::sync::Arc;

use resonance_core::{Headers, RawResponse, ResponseFuture, Transport, WireRequest};

use crate::registry::MockRegistry;

/// In-process transport backed by fixtures. Failures surface through the
/// returned future as transport errors, exactly like network failures.
#[derive(Debug, Clone)]
pub struct MockTransport {
    registry: Arc<MockRegistry>,
}

impl MockTransport {
    pub fn new(registry: Arc<MockRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &MockRegistry {
        &self.registry
    }
}

impl Transport for MockTransport {
    fn load_data(&self, request: WireRequest) -> ResponseFuture<RawResponse> {
        let url = &request.url;
        match self.registry.serve(request.method.as_str(), url.path(), url.query()) {
            Ok(fixture) => ResponseFuture::ready(RawResponse::http(
                fixture.status,
                Headers::new(),
                fixture.response.clone(),
            )),
            Err(err) => ResponseFuture::failed(err.into()),
        }
    }
}
