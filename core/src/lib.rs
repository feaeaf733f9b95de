//! Typed request pipeline for JSON HTTP APIs.
//!
//! # Overview
//! A [`Session`] holds configuration shared by many requests. A
//! [`JsonRequest`] is built from a session (or standalone), performs calls
//! through a pluggable [`Transport`], and decodes the response into a success
//! model or an error model. Results arrive through a [`ResponseFuture`], a
//! single-assignment cell that any number of tasks can await.
//!
//! # Design
//! - Session settings are merged into a request once, at construction.
//! - The transport is a one-method trait; the network transport
//!   ([`ReqwestTransport`]) and fixture mocks are interchangeable.
//! - Building errors are returned synchronously; dispatch, classification and
//!   decoding errors arrive through the future.
//! - Logging goes through an injected [`Logger`], not a global.

pub mod codec;
pub mod error;
pub mod future;
pub mod http;
pub mod log;
pub mod request;
pub mod session;
pub mod transport;

pub use codec::{BytesStrategy, CodecOverrides, CodecPolicy, DateStrategy, JsonDecoder, JsonEncoder, KeyStrategy};
pub use error::{Error, SharedError};
pub use future::{promise, Promise, ResponseFuture};
pub use http::{Headers, HttpMethod, RawResponse, StatusMetadata, WireRequest};
pub use log::Logger;
pub use request::{is_success, Call, JsonRequest};
pub use session::Session;
pub use transport::{default_transport, ReqwestTransport, Transport};
pub use url::Url;
