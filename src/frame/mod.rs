//! Binary frame protocol: growable buffer, checksum, optional deflate, and
//! the typed envelope that is the sole on-wire unit.

pub mod buffer;
pub mod frame;
pub mod types;

pub use buffer::FrameBuffer;
pub use frame::Frame;
pub use types::{is_valid_frame_type, BLOCK_DATA, BLOCK_HEADER, FILE_HEADER, FILE_TRAILER, XCDF_DEFLATED};
