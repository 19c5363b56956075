//! Property tests for path normalization and lookup.

mod common;

use common::ZipFixture;
use quickcheck::TestResult;
use quickcheck_macros::quickcheck;
use std::io::Cursor;
use zipdir::{normalize_path, IndexBuilder};

fn segment(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_alphanumeric()).take(12).collect()
}

#[quickcheck]
fn normalize_is_idempotent(path: String) -> bool {
    let once = normalize_path(&path);
    normalize_path(&once) == once
}

#[quickcheck]
fn normalize_ignores_ascii_case(path: String) -> bool {
    normalize_path(&path.to_ascii_uppercase()) == normalize_path(&path.to_ascii_lowercase())
}

#[quickcheck]
fn separators_are_interchangeable(path: String) -> bool {
    normalize_path(&path.replace('/', "\\")) == normalize_path(&path)
}

#[quickcheck]
fn stored_names_resolve_in_any_case(names: Vec<(String, String)>) -> TestResult {
    let paths: Vec<String> = names
        .iter()
        .map(|(dir, file)| (segment(dir), segment(file)))
        .filter(|(_, file)| !file.is_empty())
        .map(|(dir, file)| {
            if dir.is_empty() {
                file
            } else {
                format!("{}/{}", dir, file)
            }
        })
        .take(32)
        .collect();
    if paths.is_empty() {
        return TestResult::discard();
    }

    let fixture = paths
        .iter()
        .fold(ZipFixture::new(), |fixture, path| fixture.store(path, path.as_bytes()));
    let index = match IndexBuilder::default().build(Cursor::new(fixture.build().bytes)) {
        Ok(index) => index,
        Err(e) => return TestResult::error(format!("{:?}", e)),
    };

    let all_found = paths.iter().all(|path| {
        let upper = path.to_ascii_uppercase().replace('/', "\\");
        match (index.find(path), index.find(&upper)) {
            (Some(a), Some(b)) => std::ptr::eq(a, b),
            _ => false,
        }
    });
    TestResult::from_bool(all_found)
}
