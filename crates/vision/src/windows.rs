//! Timeline splitting for the windowed labeling variant.

use matchlens_core::types::VideoSecs;

/// Length of one label window in seconds.
pub const WINDOW_SECS: f64 = 60.0;

/// Overlap between consecutive windows, so events near a boundary are
/// sighted by both neighbors and merged by the deduplicator.
pub const WINDOW_OVERLAP_SECS: f64 = 10.0;

/// One label window over the video timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window {
    pub id: u32,
    pub start_secs: VideoSecs,
    pub end_secs: VideoSecs,
}

/// Split a video of `total_secs` into overlapping label windows.
///
/// Windows advance by `WINDOW_SECS - WINDOW_OVERLAP_SECS`; the last
/// window is truncated to the video end. A non-positive duration yields
/// no windows.
pub fn split_windows(total_secs: VideoSecs) -> Vec<Window> {
    if total_secs <= 0.0 || !total_secs.is_finite() {
        return Vec::new();
    }

    let stride = WINDOW_SECS - WINDOW_OVERLAP_SECS;
    let mut windows = Vec::new();
    let mut start = 0.0;
    let mut id = 0u32;

    loop {
        let end = (start + WINDOW_SECS).min(total_secs);
        windows.push(Window {
            id,
            start_secs: start,
            end_secs: end,
        });
        if end >= total_secs {
            return windows;
        }
        start += stride;
        id += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_video_is_one_window() {
        let w = split_windows(45.0);
        assert_eq!(w.len(), 1);
        assert_eq!(w[0].id, 0);
        assert!((w[0].start_secs - 0.0).abs() < f64::EPSILON);
        assert!((w[0].end_secs - 45.0).abs() < f64::EPSILON);
    }

    #[test]
    fn windows_overlap_by_ten_seconds() {
        let w = split_windows(200.0);
        assert!(w.len() >= 2);
        for pair in w.windows(2) {
            let overlap = pair[0].end_secs - pair[1].start_secs;
            // Interior windows overlap exactly; the truncated last one
            // may overlap more.
            assert!(overlap >= WINDOW_OVERLAP_SECS - f64::EPSILON);
        }
    }

    #[test]
    fn windows_cover_the_whole_timeline() {
        let total = 334.0;
        let w = split_windows(total);
        assert!((w[0].start_secs - 0.0).abs() < f64::EPSILON);
        assert!((w.last().unwrap().end_secs - total).abs() < f64::EPSILON);
        for pair in w.windows(2) {
            assert!(pair[1].start_secs < pair[0].end_secs);
        }
    }

    #[test]
    fn exact_multiple_does_not_emit_empty_tail() {
        // 60s video: one full window, no zero-length follow-up.
        let w = split_windows(60.0);
        assert_eq!(w.len(), 1);
    }

    #[test]
    fn degenerate_durations_yield_nothing() {
        assert!(split_windows(0.0).is_empty());
        assert!(split_windows(-5.0).is_empty());
        assert!(split_windows(f64::NAN).is_empty());
    }

    #[test]
    fn ids_are_sequential() {
        let w = split_windows(500.0);
        for (i, window) in w.iter().enumerate() {
            assert_eq!(window.id, i as u32);
        }
    }
}
