//! Shared test helpers: on-disk fake helper executables.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

/// Write an executable shell script to `dir` and return its path.
///
/// Scripts usually append a line to `<script>.count` so tests can assert
/// how many times the helper was actually spawned.
#[cfg(unix)]
pub fn write_helper_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();

    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();

    path
}

/// A helper that counts invocations and prints `token` on stdout.
#[cfg(unix)]
pub fn counting_token_helper(dir: &Path, name: &str, token: &str) -> PathBuf {
    let body = format!("echo run >> \"$0.count\"\necho \"{token}\"");
    write_helper_script(dir, name, &body)
}

/// Number of times a helper script has been spawned.
pub fn spawn_count(script: &Path) -> usize {
    let count_file = PathBuf::from(format!("{}.count", script.display()));
    match std::fs::read_to_string(count_file) {
        Ok(contents) => contents.lines().count(),
        Err(_) => 0,
    }
}
