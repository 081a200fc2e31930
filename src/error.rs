//! The crate-wide error type and the result alias built on it.
//!
//! Errors are hand-rolled rather than pulled from an error-derive crate: the
//! taxonomy is small, fixed, and every variant carries exactly the context a
//! batch tool needs to bucket a failing sample (see the integrity variants,
//! which name the CID, object index, and byte offset at the point of drift).

use core::fmt;

#[cfg(feature = "std")]
use std::io;

/// Structured kinds a [`crate::diagnostics::Diagnostics`] sink can record.
///
/// Mirrors the taxonomy errors are drawn from, so best-effort mode can
/// downgrade an `Error` into a `Diagnostic` without losing information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Magic mismatch, out-of-range CID, unterminated string, and similar.
    Invalid,
    /// A read ran past the end of the backing buffer.
    Truncated,
    /// A count or cross-reference does not add up (e.g. cluster sum vs. `num_objects`).
    Inconsistent,
}

/// The crate's error type.
#[derive(Debug)]
pub enum Error {
    /// A read ran past the end of the backing buffer.
    Truncated { wanted: usize, offset: usize, len: usize },
    /// The 4-byte snapshot magic did not match `F5 F5 DC DC`.
    BadMagic([u8; 4]),
    /// The features string following the header was never null-terminated.
    UnterminatedFeatures,
    /// A decoded class-id fell outside the plausible range for the profile in use.
    CidOutOfRange { cid: i64 },
    /// The snapshot header's `kind` field was not one of the four known values.
    BadSnapshotKind(i64),
    /// The hash matched a known runtime release, but that release has no supported profile.
    UnsupportedVersion { dart_version: &'static str },
    /// A reference id fell outside `[0, num_objects]`.
    ReferenceOutOfRange { reference: u32, num_objects: u32 },
    /// The sum of per-cluster object counts did not equal `num_objects`.
    ClusterCountMismatch { expected: u32, actual: u32 },
    /// The `max_steps` budget passed in `ParseOptions` was exhausted.
    BudgetExhausted,
    /// A required ELF symbol could not be resolved, or a virtual address could not be mapped.
    MissingSymbol(&'static str),
    /// A region's declared size could not be reconciled with the segment it lives in.
    UnmappableRegion { name: &'static str },
    /// The ELF container is not what this crate supports (ELF64, little-endian, `EM_AARCH64`).
    UnsupportedContainer(&'static str),
    /// Bytes could not be interpreted as UTF-8 where a string was expected.
    InvalidUtf8,
    /// Wraps a [`scroll`] decoding error (fixed-width reads gone wrong).
    Scroll(scroll::Error),
    /// Wraps a `std::io::Error` surfaced while reading the underlying file.
    #[cfg(feature = "std")]
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Truncated { wanted, offset, len } => write!(
                f,
                "truncated read: wanted {wanted} bytes at offset {offset}, buffer is {len} bytes"
            ),
            Error::BadMagic(magic) => write!(f, "invalid snapshot magic: {magic:02x?}"),
            Error::UnterminatedFeatures => write!(f, "features string has no null terminator"),
            Error::CidOutOfRange { cid } => write!(f, "class id {cid} is out of the plausible range"),
            Error::BadSnapshotKind(raw) => write!(f, "snapshot kind {raw} is not one of Full/Core/FullJIT/FullAOT"),
            Error::UnsupportedVersion { dart_version } => {
                write!(f, "runtime version {dart_version} is known but has no supported profile")
            }
            Error::ReferenceOutOfRange { reference, num_objects } => write!(
                f,
                "reference id {reference} is out of range [0, {num_objects}]"
            ),
            Error::ClusterCountMismatch { expected, actual } => write!(
                f,
                "cluster object counts summed to {actual}, header declared {expected}"
            ),
            Error::BudgetExhausted => write!(f, "max_steps budget exhausted"),
            Error::MissingSymbol(name) => write!(f, "required symbol `{name}` not found"),
            Error::UnmappableRegion { name } => write!(f, "region `{name}` could not be mapped to a file offset"),
            Error::UnsupportedContainer(why) => write!(f, "unsupported ELF container: {why}"),
            Error::InvalidUtf8 => write!(f, "expected UTF-8 but bytes were not valid UTF-8"),
            Error::Scroll(err) => write!(f, "{err}"),
            #[cfg(feature = "std")]
            Error::Io(err) => write!(f, "{err}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Scroll(err) => Some(err),
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<scroll::Error> for Error {
    fn from(err: scroll::Error) -> Self {
        Error::Scroll(err)
    }
}

#[cfg(feature = "std")]
impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, Error>;
