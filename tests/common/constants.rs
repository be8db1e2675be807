//! Shared constants for end-to-end tests

#![allow(dead_code)]

// ============================================================================
// Test User Credentials
// ============================================================================

/// Regular test user handle
pub const TEST_USER: &str = "testuser";

/// Second user, used to check that libraries never leak across users
pub const OTHER_USER: &str = "otheruser";

/// Password shared by every test user
pub const TEST_PASS: &str = "testpass123";

// ============================================================================
// Playlist
// ============================================================================

pub const TEST_PLAYLIST_URL: &str = "https://www.youtube.com/playlist?list=PLtest123";

/// Titles the fake downloader lists for `TEST_PLAYLIST_URL`
pub const TEST_PLAYLIST_TITLES: [&str; 5] = [
    "First Song",
    "Second Song",
    "Broken Song",
    "Fourth Song",
    "Fifth Song",
];

/// Title whose download always fails
pub const FAILING_PLAYLIST_TITLE: &str = "Broken Song";

// ============================================================================
// Timeouts
// ============================================================================

pub const REQUEST_TIMEOUT_SECS: u64 = 10;
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 20;

/// Upload limit configured on test servers
pub const TEST_MAX_UPLOAD_SIZE_BYTES: u64 = 256 * 1024;
