//! Exhaustive error taxonomy for the XCDF core.
//!
//! Every fallible entry point in this crate returns `Result<_, XcdfError>`.
//! There is no panic/unwind path for malformed input — `XCDFFatal` in the
//! reference C++ implementation (which throws `XCDFException`) becomes a
//! plain `Err` return here.

use std::fmt;
use std::io;

/// The location an error was raised from, captured at the `XcdfError`
/// construction site. Corresponds to the `__FILE__,__FUNCTION__:__LINE__`
/// prefix baked into the original `XCDFFatal` macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub file: &'static str,
    pub line: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Capture the call site of an `XcdfError`. Always used via the `xcdf_err!`
/// macro so `file!()`/`line!()` resolve at the raise site, not inside `error.rs`.
#[macro_export]
macro_rules! xcdf_err {
    ($kind:expr) => {
        $crate::error::XcdfError::new($kind, $crate::error::Location { file: file!(), line: line!() })
    };
}

/// Exhaustive set of error kinds the XCDF core can raise.
///
/// Mirrors spec.md §7: nine kinds, each covering a distinct failure class.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    /// Duplicate/missing/incorrectly-typed field, resolution out of bounds,
    /// parent misuse, or wrong entry count passed to `write()`.
    SchemaViolation(String),
    /// Unknown frame type, truncated payload, or bad zlib stream.
    CorruptFrame(String),
    /// Adler-32 does not match the payload bytes.
    ChecksumMismatch { expected: u32, actual: u32 },
    /// Block header/data inconsistent, or underflow while unpacking.
    CorruptBlock(String),
    /// Underlying source/sink I/O failure.
    Io(String),
    /// Random-access operation requested on a non-seekable source.
    SeekUnsupported,
    /// Expression-engine type rule violated (e.g. bitwise op on F64).
    Type(String),
    /// Expression-engine parse failure.
    Parse(String),
    /// Binary expression node operands have distinct vector parents.
    IncompatibleVectors { lhs_parent: String, rhs_parent: String },
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::SchemaViolation(msg) => write!(f, "schema violation: {msg}"),
            ErrorKind::CorruptFrame(msg) => write!(f, "corrupt frame: {msg}"),
            ErrorKind::ChecksumMismatch { expected, actual } => write!(
                f,
                "checksum mismatch: expected {expected:#010x}, got {actual:#010x}"
            ),
            ErrorKind::CorruptBlock(msg) => write!(f, "corrupt block: {msg}"),
            ErrorKind::Io(msg) => write!(f, "I/O error: {msg}"),
            ErrorKind::SeekUnsupported => write!(f, "seek requested on a non-seekable source"),
            ErrorKind::Type(msg) => write!(f, "type error: {msg}"),
            ErrorKind::Parse(msg) => write!(f, "parse error: {msg}"),
            ErrorKind::IncompatibleVectors { lhs_parent, rhs_parent } => write!(
                f,
                "incompatible vectors: parent \"{lhs_parent}\" vs \"{rhs_parent}\""
            ),
        }
    }
}

/// The error type returned by every fallible XCDF operation.
#[derive(Debug, Clone, PartialEq)]
pub struct XcdfError {
    pub kind: ErrorKind,
    pub location: Location,
}

impl XcdfError {
    pub fn new(kind: ErrorKind, location: Location) -> Self {
        XcdfError { kind, location }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl fmt::Display for XcdfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "XCDF FATAL ERROR: [{}]: {}", self.location, self.kind)
    }
}

impl std::error::Error for XcdfError {}

impl From<io::Error> for XcdfError {
    fn from(e: io::Error) -> Self {
        XcdfError::new(
            ErrorKind::Io(e.to_string()),
            Location { file: "io", line: 0 },
        )
    }
}

/// Print an `XCDFWarn`-style diagnostic to stderr, gated on the global
/// verbosity level (see [`crate::config::display_level`]).
pub fn warn(message: impl fmt::Display) {
    if crate::config::display_level() >= 1 {
        eprintln!("XCDF WARNING: {message}");
    }
}

/// Print an `XCDFError`-style (non-fatal) diagnostic to stderr.
pub fn report(message: impl fmt::Display) {
    if crate::config::display_level() >= 1 {
        eprintln!("XCDF ERROR: {message}");
    }
}

pub type Result<T> = std::result::Result<T, XcdfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_driver_prefix() {
        let e = xcdf_err!(ErrorKind::SeekUnsupported);
        let s = e.to_string();
        assert!(s.starts_with("XCDF FATAL ERROR: "));
    }

    #[test]
    fn checksum_mismatch_formats_hex() {
        let e = ErrorKind::ChecksumMismatch { expected: 0xDEAD, actual: 0xBEEF };
        assert_eq!(e.to_string(), "checksum mismatch: expected 0x0000dead, got 0x0000beef");
    }
}
