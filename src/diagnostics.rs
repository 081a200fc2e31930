//! The diagnostic sink best-effort mode writes to instead of aborting.
//!
//! Mirrors the teacher's [`crate::options::BestEffort`] degrade-and-record
//! pattern, but for cases where there is no sensible default value to fall
//! back to (e.g. "this whole region failed to map") — here the stage simply
//! records what happened and moves on to the next independent piece of work.

use core::fmt;

pub use crate::error::DiagnosticKind;

/// One structured finding recorded while parsing in best-effort mode.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Virtual address the finding pertains to, if one is meaningful.
    pub va: Option<u64>,
    /// Coarse classification, shared with [`crate::error::Error`]'s taxonomy.
    pub kind: DiagnosticKind,
    /// Human-readable detail, e.g. naming the CID/offset/hash involved.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.va {
            Some(va) => write!(f, "[{:?} @ 0x{:x}] {}", self.kind, va, self.message),
            None => write!(f, "[{:?}] {}", self.kind, self.message),
        }
    }
}

/// An ordered collection of [`Diagnostic`]s accumulated across one parse run.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Start an empty sink.
    pub fn new() -> Self {
        Diagnostics::default()
    }

    /// Record one finding.
    pub fn add(&mut self, va: Option<u64>, kind: DiagnosticKind, message: impl Into<String>) {
        let message = message.into();
        #[cfg(feature = "log")]
        log::warn!("diagnostic: {kind:?} {message}");
        self.entries.push(Diagnostic { va, kind, message });
    }

    /// All recorded findings, in the order they were added.
    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    /// Whether anything was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of recorded findings.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Findings of a particular kind.
    pub fn of_kind(&self, kind: DiagnosticKind) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order() {
        let mut diags = Diagnostics::new();
        diags.add(Some(0x1000), DiagnosticKind::Invalid, "bad magic");
        diags.add(None, DiagnosticKind::Truncated, "short read");
        assert_eq!(diags.len(), 2);
        assert_eq!(diags.entries()[0].message, "bad magic");
        assert_eq!(diags.of_kind(DiagnosticKind::Truncated).count(), 1);
    }
}
