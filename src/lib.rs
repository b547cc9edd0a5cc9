// XCDF — eXplicitly Compressed Data Format, a Rust port of the core engine

pub mod block;
pub mod config;
pub mod error;
pub mod expr;
pub mod field;
pub mod file;
pub mod frame;
pub mod io;
pub mod schema;
pub mod store;

// ─────────────────────────────────────────────────────────────────────────────
// Top-level convenience re-exports for the most common API entry points.
// ─────────────────────────────────────────────────────────────────────────────

/// File-level orchestration: open for write/read/append, seek, globals.
pub use file::{FileEngine, FileHeader, FileMode, FileTrailer, GlobalsReport};

/// Schema and field/alias descriptors.
pub use schema::{AliasDescriptor, FieldDescriptor, FieldType, LengthKind, Schema, Value};

/// Record-level ergonomic helpers: typed field handles, filters, projections.
pub use field::{FieldHandle, Filter, Projection, RecordView};

/// Expression engine entry point and result AST.
pub use expr::{parse as parse_expression, Ast as Expression};

/// I/O abstraction and concrete adapters.
pub use io::{FileStream, ReadSource, SeekReadSource, SeekStream, SeekWriteSink, Sink, Source, WriteSink};

/// Errors and file-level configuration.
pub use config::Config;
pub use error::{ErrorKind, Result, XcdfError};

/// Current on-wire file format version emitted by this crate.
pub use config::XCDF_VERSION;
