//! Displayed progress.
//!
//! The bar is a heuristic, not a measurement. The first half tracks bytes
//! handed to the connection during the upload; the second half advances by
//! a fixed step per status check, because the backend reports no progress
//! of its own. Only completion jumps to 100.

/// Upload occupies `[0, UPLOAD_PHASE_END]`.
pub const UPLOAD_PHASE_END: u8 = 50;

/// Highest value reachable while processing.
pub const PROCESSING_CEILING: u8 = 90;

/// Increment per status check.
pub const POLL_STEP: u8 = 2;

/// Map raw transfer progress onto the upload half of the bar.
pub fn upload_progress(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return UPLOAD_PHASE_END;
    }
    let sent = sent.min(total) as u128;
    ((sent * UPLOAD_PHASE_END as u128) / total as u128) as u8
}

/// Progress shown after `attempts` status checks: `50 + min(40, attempts * 2)`.
pub fn poll_progress(attempts: u32) -> u8 {
    let span = (PROCESSING_CEILING - UPLOAD_PHASE_END) as u32;
    let advance = attempts.saturating_mul(POLL_STEP as u32).min(span);
    UPLOAD_PHASE_END + advance as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_progress_maps_to_first_half() {
        assert_eq!(upload_progress(0, 1000), 0);
        assert_eq!(upload_progress(500, 1000), 25);
        assert_eq!(upload_progress(1000, 1000), 50);
        assert_eq!(upload_progress(5000, 1000), 50);
        assert_eq!(upload_progress(0, 0), 50);
    }

    #[test]
    fn test_poll_progress_caps_at_ninety() {
        assert_eq!(poll_progress(0), 50);
        assert_eq!(poll_progress(1), 52);
        assert_eq!(poll_progress(10), 70);
        assert_eq!(poll_progress(20), 90);
        assert_eq!(poll_progress(60), 90);
        assert_eq!(poll_progress(u32::MAX), 90);
    }
}
