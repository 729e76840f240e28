//! # Edit Session
//!
//! Single authoritative holder of the document text and its edit counter.
//!
//! Every accepted local edit bumps the sequence by exactly one and hands an
//! immutable [`Snapshot`] to both debounce gates. Nothing downstream runs
//! synchronously inside [`EditSession::apply_edit`], so typing speed is never
//! coupled to network or render latency. Network results never write back
//! into the session.

use crate::DebounceGate;
use bbdsl_live_protocol::ExportFormat;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Freshness tag of an edit.
///
/// Ordered by `generation` first: a newly loaded document starts a new
/// generation at sequence 0, so results computed for a previous document
/// always compare older than anything produced for the current one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision {
    pub generation: u32,
    pub sequence: u64,
}

impl Revision {
    pub const fn new(generation: u32, sequence: u64) -> Self {
        Self {
            generation,
            sequence,
        }
    }

    /// Sequence 0 of a generation, before any edit
    pub const fn initial(generation: u32) -> Self {
        Self::new(generation, 0)
    }

    fn next_edit(self) -> Self {
        Self::new(self.generation, self.sequence + 1)
    }

    fn next_document(self) -> Self {
        Self::initial(self.generation.wrapping_add(1))
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.generation, self.sequence)
    }
}

/// Immutable `(text, sequence)` pair handed to downstream components
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub revision: Revision,
    pub text: Arc<str>,
}

impl Snapshot {
    pub fn sequence(&self) -> u64 {
        self.revision.sequence
    }
}

/// What a pending derivation is computing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Validation,
    Preview,
    Export(ExportFormat),
}

/// Derivation waiting for its response
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// Edit the request was issued for
    pub revision: Revision,

    pub kind: RequestKind,

    /// When it was issued
    pub issued_at: Instant,
}

impl PendingRequest {
    pub fn new(revision: Revision, kind: RequestKind) -> Self {
        Self {
            revision,
            kind,
            issued_at: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.issued_at.elapsed()
    }
}

pub struct EditSession {
    text: Arc<str>,
    revision: Revision,
    validation: DebounceGate<Snapshot>,
    preview: DebounceGate<Snapshot>,
}

impl EditSession {
    /// Empty session at generation 0, sequence 0
    pub fn new(validation: DebounceGate<Snapshot>, preview: DebounceGate<Snapshot>) -> Self {
        Self {
            text: Arc::from(""),
            revision: Revision::default(),
            validation,
            preview,
        }
    }

    /// Record a local edit and schedule both derivations.
    ///
    /// This is the only mutation path for the text and it cannot fail.
    pub fn apply_edit(&mut self, new_text: impl Into<Arc<str>>) -> Snapshot {
        self.text = new_text.into();
        self.revision = self.revision.next_edit();
        trace!(revision = %self.revision, bytes = self.text.len(), "Applied edit");
        self.notify()
    }

    /// Replace the document wholesale.
    ///
    /// Starts a new generation with the sequence reset to 0, drops anything
    /// still debounced for the previous document and schedules both
    /// derivations for the loaded text.
    pub fn load(&mut self, text: impl Into<Arc<str>>) -> Snapshot {
        self.cancel_pending();
        self.text = text.into();
        self.revision = self.revision.next_document();
        trace!(revision = %self.revision, bytes = self.text.len(), "Loaded document");
        self.notify()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            revision: self.revision,
            text: Arc::clone(&self.text),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn sequence(&self) -> u64 {
        self.revision.sequence
    }

    pub fn revision(&self) -> Revision {
        self.revision
    }

    /// Schedule validation of the current text again without counting an edit
    pub fn rearm_validation(&self) -> Snapshot {
        let snapshot = self.snapshot();
        self.validation.arm(snapshot.clone());
        snapshot
    }

    /// Cancel both debounce gates
    pub fn cancel_pending(&self) {
        self.validation.cancel();
        self.preview.cancel();
    }

    fn notify(&self) -> Snapshot {
        let snapshot = self.snapshot();
        self.validation.arm(snapshot.clone());
        self.preview.arm(snapshot.clone());
        snapshot
    }
}
