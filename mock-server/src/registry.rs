//! In-memory index of canned fixtures, loaded once from a directory tree.
//!
//! # Design
//! Every `*.json` file below the fixture root holds an array of records
//! `{ "method", "request", "response", "status"? }`. The file's path after
//! the last directory named after the root marker (default `Mocks`), without
//! extension and lower-cased, is the lookup path; the record's method
//! completes the key. Keys are a structured `(method, path)` pair, so no two
//! distinct methods can collide, and loading the same key twice is an error.
//!
//! Symlinked directories below the root are skipped. Request paths are
//! percent-decoded before lookup, so `hello%20world` finds `hello world.json`.
//!
//! The registry is immutable after loading and safe to share across threads.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Component, Path, PathBuf};

use resonance_core::Logger;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::MockError;

pub const DEFAULT_MARKER: &str = "Mocks";
const FIXTURE_EXTENSION: &str = "json";
const DEFAULT_STATUS: u16 = 200;

/// Lookup key: the method token, compared case-sensitively, and the
/// lower-cased path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FixtureKey {
    pub method: String,
    pub path: String,
}

/// One canned exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    /// Expected request shape, serialized JSON.
    pub request: Vec<u8>,
    /// Response body, serialized JSON.
    pub response: Vec<u8>,
    pub status: u16,
}

#[derive(Debug)]
pub struct MockRegistry {
    fixtures: HashMap<FixtureKey, Fixture>,
    logger: Logger,
}

impl MockRegistry {
    /// Load every fixture below `root` using the `Mocks` marker.
    pub fn load(root: impl AsRef<Path>) -> Result<Self, MockError> {
        Self::load_with_marker(root.as_ref(), DEFAULT_MARKER, Logger::current())
    }

    pub fn load_with_marker(root: &Path, marker: &str, logger: Logger) -> Result<Self, MockError> {
        logger.in_scope(|| debug!(root = %root.display(), marker, "loading fixtures"));
        let mut files = Vec::new();
        collect_fixture_files(root, &mut files)?;
        files.sort();

        let mut registry = Self {
            fixtures: HashMap::new(),
            logger,
        };
        for file in &files {
            let path = fixture_path(file, marker)?;
            registry.load_file(file, &path)?;
        }
        registry
            .logger
            .in_scope(|| info!(fixtures = registry.fixtures.len(), files = files.len(), "fixtures loaded"));
        Ok(registry)
    }

    fn load_file(&mut self, file: &Path, path: &str) -> Result<(), MockError> {
        let text = fs::read(file).map_err(|source| MockError::Io {
            path: file.to_path_buf(),
            source,
        })?;
        let records: Vec<Value> = serde_json::from_slice(&text).map_err(|e| MockError::FileDidNotParse {
            path: file.to_path_buf(),
            reason: e.to_string(),
        })?;

        for record in &records {
            let (method, fixture) = parse_record(file, record)?;
            let key = FixtureKey {
                method,
                path: path.to_string(),
            };
            match self.fixtures.entry(key) {
                Entry::Occupied(occupied) => {
                    let key = occupied.key();
                    return Err(MockError::DuplicateFixture {
                        method: key.method.clone(),
                        path: key.path.clone(),
                    });
                }
                Entry::Vacant(vacant) => {
                    self.logger.in_scope(|| {
                        debug!(method = %vacant.key().method, path = %vacant.key().path, status = fixture.status, "loaded fixture")
                    });
                    vacant.insert(fixture);
                }
            }
        }
        Ok(())
    }

    /// Exact lookup by method and path.
    pub fn fetch(&self, method: &str, path: &str) -> Result<&Fixture, MockError> {
        let key = FixtureKey {
            method: method.to_string(),
            path: path.to_string(),
        };
        self.fixtures.get(&key).ok_or(MockError::LoadFailure {
            method: key.method,
            path: key.path,
        })
    }

    /// Match an incoming request: strip the leading `/` from the
    /// percent-encoded `path`, decode it, look the fixture up, parse the
    /// query, and check that the stored request shape is a JSON object.
    pub fn serve(&self, method: &str, path: &str, query: Option<&str>) -> Result<&Fixture, MockError> {
        let path = decode_path(path.strip_prefix('/').unwrap_or(path));
        let path = path.as_str();
        let fixture = self.fetch(method, path)?;
        let params = parse_query(query.unwrap_or_default());
        let shape: Map<String, Value> =
            serde_json::from_slice(&fixture.request).map_err(|_| MockError::ParamsDidNotParse {
                method: method.to_string(),
                path: path.to_string(),
            })?;
        self.logger
            .in_scope(|| debug!(method, path, ?params, ?shape, status = fixture.status, "matched fixture"));
        Ok(fixture)
    }

    pub fn len(&self) -> usize {
        self.fixtures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixtures.is_empty()
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<&FixtureKey> {
        let mut keys: Vec<_> = self.fixtures.keys().collect();
        keys.sort();
        keys
    }
}

/// Split a raw query string into a flat map. Pairs without exactly one `=`
/// are skipped; a repeated name keeps its last value.
pub fn parse_query(query: &str) -> BTreeMap<String, String> {
    query
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.split('=');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(name), Some(value), None) => Some((name.to_string(), value.to_string())),
                _ => None,
            }
        })
        .collect()
}

/// Percent-decode a request path. Sequences that do not decode to UTF-8
/// leave the path as sent.
fn decode_path(path: &str) -> String {
    urlencoding::decode(path)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| path.to_owned())
}

fn collect_fixture_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), MockError> {
    let io_error = |source| MockError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let entry = entry.map_err(io_error)?;
        let path = entry.path();
        // Symlinked directories are not followed; a link back up the tree
        // would recurse forever.
        if entry.file_type().map_err(io_error)?.is_dir() {
            collect_fixture_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == FIXTURE_EXTENSION) {
            out.push(path);
        }
    }
    Ok(())
}

/// Lookup path for `file`: the components after the last `marker` directory,
/// extension dropped, joined with `/` and lower-cased.
fn fixture_path(file: &Path, marker: &str) -> Result<String, MockError> {
    let stem = file.with_extension("");
    let components = stem
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_str()),
            _ => None,
        })
        .collect::<Option<Vec<&str>>>()
        .ok_or_else(|| MockError::FileDidNotParse {
            path: file.to_path_buf(),
            reason: "fixture path is not valid UTF-8".to_string(),
        })?;
    let start = components
        .iter()
        .rposition(|part| *part == marker)
        .ok_or_else(|| MockError::MockFolderNotFound {
            path: file.to_path_buf(),
            marker: marker.to_string(),
        })?;
    Ok(components[start + 1..].join("/").to_lowercase())
}

fn parse_record(file: &Path, record: &Value) -> Result<(String, Fixture), MockError> {
    let object = record.as_object().ok_or_else(|| MockError::FileDidNotParse {
        path: file.to_path_buf(),
        reason: "fixture record is not an object".to_string(),
    })?;
    let request = object.get("request").ok_or_else(|| MockError::RequestMissing {
        path: file.to_path_buf(),
    })?;
    let response = object.get("response").ok_or_else(|| MockError::ResponseMissing {
        path: file.to_path_buf(),
    })?;
    let method = object
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| MockError::MethodMissing {
            path: file.to_path_buf(),
        })?;
    let status = object
        .get("status")
        .and_then(Value::as_u64)
        .and_then(|status| u16::try_from(status).ok())
        .unwrap_or(DEFAULT_STATUS);

    let encode = |value: &Value| {
        serde_json::to_vec(value).map_err(|e| MockError::FileDidNotParse {
            path: file.to_path_buf(),
            reason: e.to_string(),
        })
    };
    Ok((
        method.to_string(),
        Fixture {
            request: encode(request)?,
            response: encode(response)?,
            status,
        },
    ))
}
