//! Errors raised while loading fixtures and while matching requests.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MockError {
    /// The fixture file does not live below a directory named after the
    /// root marker.
    #[error("{path}: no `{marker}` directory in the fixture path")]
    MockFolderNotFound { path: PathBuf, marker: String },

    #[error("{path}: fixture file did not parse: {reason}")]
    FileDidNotParse { path: PathBuf, reason: String },

    #[error("{path}: fixture record has no `request`")]
    RequestMissing { path: PathBuf },

    #[error("{path}: fixture record has no `response`")]
    ResponseMissing { path: PathBuf },

    #[error("{path}: fixture record has no string `method`")]
    MethodMissing { path: PathBuf },

    #[error("duplicate fixture for {method} {path}")]
    DuplicateFixture { method: String, path: String },

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No fixture is registered for the method and path.
    #[error("no fixture for {method} {path}")]
    LoadFailure { method: String, path: String },

    /// The fixture's stored request shape is not a JSON object.
    #[error("fixture request for {method} {path} is not a JSON object")]
    ParamsDidNotParse { method: String, path: String },
}

impl From<MockError> for resonance_core::Error {
    fn from(err: MockError) -> Self {
        resonance_core::Error::transport(err)
    }
}
