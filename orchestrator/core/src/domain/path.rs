// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Virtual-path normalisation, generalised from a single volume-root boundary
//! check into the mount-agnostic normaliser the resolver needs.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path contains a traversal segment")]
    Traversal,
    #[error("path contains an embedded NUL byte")]
    EmbeddedNul,
    #[error("path exceeds the maximum length of {0} bytes")]
    TooLong(usize),
}

const MAX_PATH_LEN: usize = 4096;

/// A normalised virtual path: always starts with `/`, never ends in `/`
/// unless it is the root, no `.`/`..` segments, no repeated separators.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NormPath(String);

impl NormPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn root() -> Self {
        NormPath("/".to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// `self - prefix`, i.e. the portion of this path below `prefix`, which
    /// must itself be a normalised path that is a segment-wise prefix of
    /// `self`. Returns `None` if `prefix` does not bound `self`.
    pub fn strip_prefix(&self, prefix: &NormPath) -> Option<String> {
        if prefix.is_root() {
            return Some(self.0.trim_start_matches('/').to_string());
        }
        if self.0 == prefix.0 {
            return Some(String::new());
        }
        let with_slash = format!("{}/", prefix.0);
        self.0
            .strip_prefix(&with_slash)
            .map(|rest| rest.to_string())
    }
}

impl std::fmt::Display for NormPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalises a raw virtual path: collapses repeated separators, resolves
/// `.` segments, rejects `..` segments and embedded NULs, and preserves
/// trailing-separator "directory intent" only when `keep_trailing_slash`
/// is set by the caller.
///
/// Idempotent: `normalise(normalise(p)?.as_str())? == normalise(p)?`.
pub fn normalise(raw: &str, keep_trailing_slash: bool) -> Result<NormPath, PathError> {
    if raw.len() > MAX_PATH_LEN {
        return Err(PathError::TooLong(MAX_PATH_LEN));
    }
    if raw.contains('\0') {
        return Err(PathError::EmbeddedNul);
    }

    let trailing = keep_trailing_slash && raw.len() > 1 && raw.ends_with('/');

    let mut out: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(PathError::Traversal),
            s => out.push(s),
        }
    }

    let mut normalised = String::from("/");
    normalised.push_str(&out.join("/"));
    if trailing && normalised != "/" {
        normalised.push('/');
    }
    Ok(NormPath(normalised))
}

/// Lightweight validity check without allocating a `NormPath`, used on hot
/// paths (e.g. cursor-embedded path prefixes) where full normalisation is
/// unnecessary but traversal/NUL rejection still applies.
pub fn validate(raw: &str) -> Result<(), PathError> {
    if raw.len() > MAX_PATH_LEN {
        return Err(PathError::TooLong(MAX_PATH_LEN));
    }
    if raw.contains('\0') {
        return Err(PathError::EmbeddedNul);
    }
    if raw.split('/').any(|s| s == "..") {
        return Err(PathError::Traversal);
    }
    Ok(())
}

/// Filename rules shared by every upload entry point (§4.4): forbid path
/// separators, NUL, leading/trailing whitespace, and the special names
/// `.`/`..`.
pub fn validate_filename(name: &str) -> Result<(), PathError> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(PathError::Traversal);
    }
    if name.contains('\0') {
        return Err(PathError::EmbeddedNul);
    }
    if name.contains('/') || name.contains('\\') {
        return Err(PathError::Traversal);
    }
    if name.trim() != name {
        return Err(PathError::Traversal);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_and_resolves_dot_segments() {
        let p = normalise("/a//b/./c", false).unwrap();
        assert_eq!(p.as_str(), "/a/b/c");
    }

    #[test]
    fn rejects_traversal() {
        assert_eq!(normalise("/a/../b", false), Err(PathError::Traversal));
    }

    #[test]
    fn rejects_embedded_nul() {
        assert_eq!(normalise("/a\0b", false), Err(PathError::EmbeddedNul));
    }

    #[test]
    fn idempotent() {
        let once = normalise("/a//b/./c/", true).unwrap();
        let twice = normalise(once.as_str(), true).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn strips_mount_prefix() {
        let full = normalise("/mnt/docs/report.pdf", false).unwrap();
        let mount = normalise("/mnt", false).unwrap();
        assert_eq!(full.strip_prefix(&mount).as_deref(), Some("docs/report.pdf"));
    }

    #[test]
    fn root_prefix_strips_leading_slash_only() {
        let full = normalise("/docs/report.pdf", false).unwrap();
        assert_eq!(full.strip_prefix(&NormPath::root()).as_deref(), Some("docs/report.pdf"));
    }

    #[test]
    fn filename_rules() {
        assert!(validate_filename("report.pdf").is_ok());
        assert!(validate_filename("..").is_err());
        assert!(validate_filename("a/b").is_err());
        assert!(validate_filename(" leading").is_err());
    }
}
