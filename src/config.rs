//! File-level tunables and global diagnostic verbosity.
//!
//! Mirrors the teacher's `io/prefs.rs`: a small `Config` struct for per-file
//! knobs plus a process-global `DISPLAY_LEVEL` atomic gating stderr
//! diagnostics (`XCDFWarn`/`XCDFError` in the original).

use std::sync::atomic::{AtomicU32, Ordering};

/// Default number of events staged before a block is flushed.
pub const DEFAULT_BLOCK_SIZE: u32 = 1000;

/// Default staged-byte threshold that forces a block flush even if
/// `DEFAULT_BLOCK_SIZE` events have not yet accumulated.
pub const DEFAULT_THRESHOLD_BYTE_COUNT: u64 = 100_000_000;

/// Current on-wire file format version emitted by this crate.
pub const XCDF_VERSION: u32 = 3;

/// Global verbosity level for `XCDFWarn`/`XCDFError`-style diagnostics.
/// 0 = silent, 1 = errors+warnings (default), 4 = verbose.
static DISPLAY_LEVEL: AtomicU32 = AtomicU32::new(1);

pub fn display_level() -> u32 {
    DISPLAY_LEVEL.load(Ordering::Relaxed)
}

pub fn set_display_level(level: u32) {
    DISPLAY_LEVEL.store(level, Ordering::Relaxed);
}

/// Per-file tunables controlling block flush policy and wire encoding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Flush a block once this many events have been staged.
    pub block_size: u32,
    /// Flush a block once this many staged bytes have accumulated, even if
    /// `block_size` has not been reached.
    pub threshold_byte_count: u64,
    /// Zero-align each block's `active_min` to a multiple of the field's
    /// resolution (spec.md §4.4 step 3).
    pub zero_align: bool,
    /// Wrap each frame's payload in zlib deflate before emission.
    pub deflate: bool,
    /// File format version to emit (gates trailer globals/aliases, v >= 3).
    pub version: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            block_size: DEFAULT_BLOCK_SIZE,
            threshold_byte_count: DEFAULT_THRESHOLD_BYTE_COUNT,
            zero_align: true,
            deflate: true,
            version: XCDF_VERSION,
        }
    }
}
