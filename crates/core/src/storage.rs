//! Blob store path conventions and validation.
//!
//! The blob store is addressed by opaque relative paths; these helpers
//! are the single place those paths are built, so layout changes never
//! scatter. Validation guards repository-supplied paths before any
//! filesystem access.

use crate::error::CoreError;
use crate::job::Half;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Path builders
// ---------------------------------------------------------------------------

/// Storage path for a registered match video.
pub fn video_path(match_id: DbId, half: Half) -> String {
    format!("videos/{match_id}/{}.mp4", half.as_str())
}

/// Storage path for a half's full tracking result document.
pub fn tracking_result_path(match_id: DbId, half: Half) -> String {
    format!("results/{match_id}/tracking_{}.json", half.as_str())
}

/// Storage path for a cut highlight clip.
pub fn clip_path(match_id: DbId, clip_id: DbId) -> String {
    format!("clips/{match_id}/clip_{clip_id}.mp4")
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a blob path before it touches the filesystem.
///
/// Paths must be non-empty, relative, and free of empty or `.`/`..`
/// segments.
pub fn validate_blob_path(path: &str) -> Result<(), CoreError> {
    if path.is_empty() {
        return Err(CoreError::Validation("Blob path must not be empty".into()));
    }
    if path.starts_with('/') {
        return Err(CoreError::Validation(format!(
            "Blob path must be relative: '{path}'"
        )));
    }
    for segment in path.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(CoreError::Validation(format!(
                "Blob path contains an invalid segment: '{path}'"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_produce_expected_layout() {
        assert_eq!(video_path(7, Half::First), "videos/7/first.mp4");
        assert_eq!(
            tracking_result_path(7, Half::Second),
            "results/7/tracking_second.json"
        );
        assert_eq!(clip_path(7, 42), "clips/7/clip_42.mp4");
    }

    #[test]
    fn builders_produce_valid_paths() {
        for path in [
            video_path(1, Half::Full),
            tracking_result_path(2, Half::First),
            clip_path(3, 4),
        ] {
            assert!(validate_blob_path(&path).is_ok());
        }
    }

    #[test]
    fn traversal_segments_rejected() {
        assert!(validate_blob_path("videos/../etc/passwd").is_err());
        assert!(validate_blob_path("./videos/1.mp4").is_err());
    }

    #[test]
    fn absolute_paths_rejected() {
        assert!(validate_blob_path("/videos/1.mp4").is_err());
    }

    #[test]
    fn empty_and_doubled_separators_rejected() {
        assert!(validate_blob_path("").is_err());
        assert!(validate_blob_path("videos//1.mp4").is_err());
    }
}
