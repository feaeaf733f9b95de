//! Fixture loading against throwaway directory trees.

use std::fs;
use std::path::Path;

use resonance_core::Logger;
use resonance_mock::{FixtureKey, MockError, MockRegistry};
use tempfile::TempDir;

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn tree(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (relative, contents) in files {
        write(dir.path(), relative, contents);
    }
    dir
}

const SIMPLE: &str = r#"[{"method": "GET", "request": {}, "response": {"value": 10}}]"#;

#[test]
fn loads_nested_fixtures_below_the_marker() {
    let dir = tree(&[
        ("Mocks/test.json", SIMPLE),
        ("Mocks/Users/Profile.json", r#"[
            {"method": "GET", "request": {}, "response": {"name": "ada"}},
            {"method": "PUT", "request": {"name": "x"}, "response": {}, "status": 204}
        ]"#),
        ("Mocks/notes.txt", "ignored"),
    ]);
    let registry = MockRegistry::load(dir.path().join("Mocks")).unwrap();

    assert_eq!(registry.len(), 3);
    let keys: Vec<String> = registry
        .keys()
        .into_iter()
        .map(|FixtureKey { method, path }| format!("{method} {path}"))
        .collect();
    assert_eq!(keys, ["GET test", "GET users/profile", "PUT users/profile"]);
    assert_eq!(registry.fetch("PUT", "users/profile").unwrap().status, 204);
}

#[test]
fn omitted_status_is_served_as_200() {
    let dir = tree(&[("Mocks/test.json", SIMPLE)]);
    let registry = MockRegistry::load(dir.path()).unwrap();
    let fixture = registry.fetch("GET", "test").unwrap();
    assert_eq!(fixture.status, 200);
    assert_eq!(fixture.response, br#"{"value":10}"#);
}

#[test]
fn lookups_are_idempotent() {
    let dir = tree(&[("Mocks/test.json", SIMPLE)]);
    let registry = MockRegistry::load(dir.path()).unwrap();
    let first = registry.fetch("GET", "test").unwrap().clone();
    let second = registry.fetch("GET", "test").unwrap().clone();
    assert_eq!(first, second);
    assert_eq!(registry.len(), 1);
}

#[test]
fn unknown_key_is_a_load_failure() {
    let dir = tree(&[("Mocks/test.json", SIMPLE)]);
    let registry = MockRegistry::load(dir.path()).unwrap();
    assert!(matches!(registry.fetch("GET", "other"), Err(MockError::LoadFailure { .. })));
    assert!(matches!(registry.fetch("get", "test"), Err(MockError::LoadFailure { .. })));
}

#[test]
fn fixture_outside_the_marker_fails_the_load() {
    let dir = tree(&[("Fixtures/test.json", SIMPLE)]);
    let err = MockRegistry::load(dir.path()).unwrap_err();
    assert!(matches!(err, MockError::MockFolderNotFound { .. }));
}

#[test]
fn custom_marker() {
    let dir = tree(&[("Fixtures/api/Test.json", SIMPLE)]);
    let registry = MockRegistry::load_with_marker(dir.path(), "Fixtures", Logger::silent()).unwrap();
    assert!(registry.fetch("GET", "api/test").is_ok());
}

#[test]
fn duplicate_keys_fail_the_load() {
    let dir = tree(&[(
        "Mocks/A/Test.json",
        r#"[
            {"method": "GET", "request": {}, "response": {"value": 1}},
            {"method": "GET", "request": {}, "response": {"value": 2}}
        ]"#,
    )]);
    match MockRegistry::load(dir.path()).unwrap_err() {
        MockError::DuplicateFixture { method, path } => {
            assert_eq!(method, "GET");
            assert_eq!(path, "a/test");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn same_path_with_different_methods_is_fine() {
    let dir = tree(&[(
        "Mocks/test.json",
        r#"[
            {"method": "GET", "request": {}, "response": {}},
            {"method": "GETX", "request": {}, "response": {}}
        ]"#,
    )]);
    let registry = MockRegistry::load(dir.path()).unwrap();
    assert_eq!(registry.len(), 2);
}

#[test]
fn missing_fields_fail_the_load() {
    let cases = [
        (r#"[{"method": "GET", "response": {}}]"#, "request"),
        (r#"[{"method": "GET", "request": {}}]"#, "response"),
        (r#"[{"request": {}, "response": {}}]"#, "method"),
    ];
    for (contents, field) in cases {
        let dir = tree(&[("Mocks/test.json", contents)]);
        let err = MockRegistry::load(dir.path()).unwrap_err();
        let matched = match field {
            "request" => matches!(err, MockError::RequestMissing { .. }),
            "response" => matches!(err, MockError::ResponseMissing { .. }),
            _ => matches!(err, MockError::MethodMissing { .. }),
        };
        assert!(matched, "{field}: got {err:?}");
    }
}

#[test]
fn files_that_are_not_fixture_arrays_fail_the_load() {
    for contents in ["{not json", r#"{"method": "GET"}"#, "[1, 2]"] {
        let dir = tree(&[("Mocks/test.json", contents)]);
        let err = MockRegistry::load(dir.path()).unwrap_err();
        assert!(matches!(err, MockError::FileDidNotParse { .. }), "{contents}: got {err:?}");
    }
}

#[test]
fn missing_root_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let err = MockRegistry::load(dir.path().join("Mocks")).unwrap_err();
    assert!(matches!(err, MockError::Io { .. }));
}

#[test]
fn serve_strips_the_leading_slash_and_checks_the_shape() {
    let dir = tree(&[
        ("Mocks/test.json", SIMPLE),
        ("Mocks/bad.json", r#"[{"method": "GET", "request": "text", "response": {}}]"#),
    ]);
    let registry = MockRegistry::load(dir.path()).unwrap();
    assert!(registry.serve("GET", "/test", Some("a=1&b")).is_ok());
    assert!(registry.serve("GET", "test", None).is_ok());
    assert!(matches!(
        registry.serve("GET", "/bad", None),
        Err(MockError::ParamsDidNotParse { .. })
    ));
}

#[cfg(unix)]
#[test]
fn symlinked_directories_are_not_followed() {
    let dir = tree(&[("Mocks/test.json", SIMPLE)]);
    let mocks = dir.path().join("Mocks");
    std::os::unix::fs::symlink(&mocks, mocks.join("loop")).unwrap();

    let registry = MockRegistry::load(&mocks).unwrap();
    assert_eq!(registry.len(), 1);
    assert!(registry.fetch("GET", "test").is_ok());
}

#[test]
fn serve_decodes_percent_encoded_paths() {
    let dir = tree(&[("Mocks/Hello World.json", SIMPLE)]);
    let registry = MockRegistry::load(dir.path()).unwrap();
    assert!(registry.serve("GET", "/hello%20world", None).is_ok());
    assert!(registry.serve("GET", "/hello world", None).is_ok());
}
