#![allow(dead_code)]

use std::path::{Path, PathBuf};

pub fn write_file(dir: &Path, name: &str, src: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create fixture dir");
    }
    std::fs::write(&path, src).expect("write fixture");
    path
}

pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path).expect("read output")
}

/// Asserts `haystack` contains `needle`, with a readable failure.
pub fn assert_contains(haystack: &str, needle: &str) {
    assert!(
        haystack.contains(needle),
        "expected output to contain {needle:?}, got:\n{haystack}"
    );
}

pub fn assert_not_contains(haystack: &str, needle: &str) {
    assert!(
        !haystack.contains(needle),
        "expected output to not contain {needle:?}, got:\n{haystack}"
    );
}
