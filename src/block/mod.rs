//! Bit-packing core and per-block range/codec logic.

pub mod bitbuffer;
pub mod codec;
pub mod header;

pub use bitbuffer::BitBuffer;
pub use codec::{BlockCodec, FieldPlan, Record};
pub use header::{BlockHeader, BlockIndexEntry, FieldHeader};
