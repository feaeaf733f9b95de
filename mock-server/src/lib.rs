//! Fixture-backed mocks for `resonance-core`.
//!
//! # Overview
//! [`MockRegistry`] loads canned exchanges from a directory of JSON fixture
//! files. [`MockTransport`] plugs the registry into a session or request as
//! its transport, so pipelines run deterministically without a network.
//! [`app`]/[`run`] serve the same registry over HTTP for clients that need a
//! real socket.

pub mod error;
pub mod registry;
pub mod server;
pub mod transport;

pub use error::MockError;
pub use registry::{parse_query, Fixture, FixtureKey, MockRegistry, DEFAULT_MARKER};
pub use server::{app, run};
pub use transport::MockTransport;
