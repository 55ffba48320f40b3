//! Purpose: Centralize wire-format identification, versioning, and shared limits.
//! Exports: `BINARY_MAGIC`, `FORMAT_VERSION`, `SUPPORTED_FORMAT_VERSIONS`, `TEXT_FORMAT_NAME`,
//!          `DIGEST_LEN`, `MAX_NESTING_DEPTH`, `version_error`.
//! Role: Shared policy for gating compatibility across the binary and text decoders.
//! Invariants: Version list is additive; bump only for incompatible layout changes.
//! Invariants: New logical type tags do not require a version bump.

use crate::core::error::Error;

pub const BINARY_MAGIC: [u8; 4] = *b"CLFR";
pub const FORMAT_VERSION: u16 = 1;
pub const SUPPORTED_FORMAT_VERSIONS: &[u16] = &[FORMAT_VERSION];

/// Value of the `format` key at the top of every text document.
pub const TEXT_FORMAT_NAME: &str = "colframe";

/// Length of the SHA-256 trailer closing every binary encoding.
pub const DIGEST_LEN: usize = 32;

/// Deepest type or token nesting any decoder will follow.
pub const MAX_NESTING_DEPTH: usize = 64;

pub fn is_supported_version(version: u16) -> bool {
    SUPPORTED_FORMAT_VERSIONS.contains(&version)
}

pub fn version_error(detected: u64) -> Error {
    let supported = SUPPORTED_FORMAT_VERSIONS
        .iter()
        .map(|version| version.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    Error::malformed(format!(
        "unsupported format version {detected} (supported: {supported})"
    ))
}

#[cfg(test)]
mod tests {
    use super::{FORMAT_VERSION, is_supported_version, version_error};
    use crate::core::error::ErrorKind;

    #[test]
    fn current_version_is_supported() {
        assert!(is_supported_version(FORMAT_VERSION));
        assert!(!is_supported_version(FORMAT_VERSION + 1));
    }

    #[test]
    fn version_error_lists_supported_versions() {
        let err = version_error(9);
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
        assert!(err.to_string().contains("unsupported format version 9 (supported: 1)"));
    }
}
