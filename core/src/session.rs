//! Reusable configuration shared by the requests built from it.
//!
//! # Design
//! A `Session` is a plain configuration object. Requests copy what they need
//! out of it when they are constructed and never look at it again, so editing
//! a session only affects requests built afterwards. `Clone` is the
//! "copy of another session" constructor: headers, token and codec overrides
//! are deep copies, while the transport handle is shared.

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::codec::CodecOverrides;
use crate::error::Error;
use crate::http::Headers;
use crate::transport::Transport;

pub const AUTHORIZATION: &str = "Authorization";

#[derive(Clone)]
pub struct Session {
    base_url: Url,
    /// Default headers for every request built from this session.
    pub headers: Headers,
    /// Sent as the `Authorization` header when non-empty.
    pub auth_token: String,
    pub decoding: CodecOverrides,
    pub encoding: CodecOverrides,
    pub transport: Option<Arc<dyn Transport>>,
}

impl Session {
    /// A session with no headers, no token, default codecs and no transport
    /// override.
    pub fn new(base_url: &str) -> Result<Self, Error> {
        let base_url = Url::parse(base_url).map_err(|e| Error::InvalidUrl(format!("{base_url}: {e}")))?;
        Ok(Self::from_url(base_url))
    }

    pub fn from_url(base_url: Url) -> Self {
        Self {
            base_url,
            headers: Headers::new(),
            auth_token: String::new(),
            decoding: CodecOverrides::default(),
            encoding: CodecOverrides::default(),
            transport: None,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = token.into();
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_decoding(mut self, overrides: CodecOverrides) -> Self {
        self.decoding = overrides;
        self
    }

    pub fn with_encoding(mut self, overrides: CodecOverrides) -> Self {
        self.encoding = overrides;
        self
    }

    /// Default headers plus the `Authorization` header synthesized from the
    /// token. The token wins over an `Authorization` entry in `headers`.
    pub fn effective_headers(&self) -> Headers {
        let mut merged = self.headers.clone();
        if !self.auth_token.is_empty() {
            merged.insert(AUTHORIZATION, self.auth_token.as_str());
        }
        merged
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url.as_str())
            .field("headers", &self.headers)
            .field("auth_token", &if self.auth_token.is_empty() { "" } else { "<redacted>" })
            .field("decoding", &self.decoding)
            .field("encoding", &self.encoding)
            .field("transport", &self.transport.is_some())
            .finish()
    }
}
