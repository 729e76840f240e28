//! # Result Gate
//!
//! Freshest-wins filter in front of the view state.
//!
//! Each result kind keeps its own high-water mark. A result is published when
//! its revision is greater than *or equal to* the mark: the validation stream
//! may legitimately deliver several reports for one edit, and those pass in
//! arrival order until a newer edit supersedes them. Older results are
//! dropped silently; that is the ordering policy working, not an error.
//!
//! Validation and preview are ordered independently, so a preview may be
//! newer than the last report and vice versa.

use crate::util::lock;
use crate::Revision;
use bbdsl_live_protocol::{ExportFormat, ValidationReport};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::{mpsc, watch};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultKind {
    Validation,
    Preview,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedReport {
    pub revision: Revision,
    pub report: ValidationReport,
}

/// Rendered bidding-tree preview (SVG markup)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewArtifact {
    pub revision: Revision,
    pub body: String,
}

/// Result of a manual export; handed to the caller rather than the view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub revision: Revision,
    pub format: ExportFormat,
    pub body: String,
}

/// One accepted result, in acceptance order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewUpdate {
    Validation(TaggedReport),
    Preview(PreviewArtifact),
}

impl ViewUpdate {
    pub fn kind(&self) -> ResultKind {
        match self {
            ViewUpdate::Validation(_) => ResultKind::Validation,
            ViewUpdate::Preview(_) => ResultKind::Preview,
        }
    }

    pub fn revision(&self) -> Revision {
        match self {
            ViewUpdate::Validation(tagged) => tagged.revision,
            ViewUpdate::Preview(artifact) => artifact.revision,
        }
    }
}

/// What the editing view currently shows
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub validation: Option<TaggedReport>,
    pub preview: Option<PreviewArtifact>,
}

impl ViewState {
    fn apply(&mut self, update: &ViewUpdate) {
        match update {
            ViewUpdate::Validation(tagged) => self.validation = Some(tagged.clone()),
            ViewUpdate::Preview(artifact) => self.preview = Some(artifact.clone()),
        }
    }
}

pub type ViewUpdates = mpsc::UnboundedReceiver<ViewUpdate>;

pub struct ResultGate {
    marks: Mutex<HashMap<ResultKind, Revision>>,
    view: watch::Sender<ViewState>,
    updates: mpsc::UnboundedSender<ViewUpdate>,
}

impl ResultGate {
    pub fn new() -> (Self, ViewUpdates) {
        let (updates, receiver) = mpsc::unbounded_channel();
        let (view, _) = watch::channel(ViewState::default());
        let gate = Self {
            marks: Mutex::new(HashMap::new()),
            view,
            updates,
        };
        (gate, receiver)
    }

    /// Publish `update` unless a newer result of the same kind was already
    /// accepted. Returns whether it was published.
    pub fn accept(&self, update: ViewUpdate) -> bool {
        let kind = update.kind();
        let revision = update.revision();

        // Held across publishing so acceptance order equals publication order
        let mut marks = lock(&self.marks);
        if let Some(mark) = marks.get(&kind) {
            if revision < *mark {
                debug!(?kind, %revision, %mark, "Discarding stale result");
                return false;
            }
        }
        marks.insert(kind, revision);

        self.view.send_modify(|view| view.apply(&update));
        // The receiver may be gone; the view state still updates
        let _ = self.updates.send(update);
        true
    }

    /// Start a new document generation: clear the view and raise every
    /// mark to the generation's first revision.
    pub fn reset(&self, generation: u32) {
        let mut marks = lock(&self.marks);
        let floor = Revision::initial(generation);
        marks.insert(ResultKind::Validation, floor);
        marks.insert(ResultKind::Preview, floor);
        self.view.send_replace(ViewState::default());
        debug!(generation, "Result gate reset");
    }

    pub fn high_water(&self, kind: ResultKind) -> Option<Revision> {
        lock(&self.marks).get(&kind).copied()
    }

    pub fn view(&self) -> ViewState {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.view.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bbdsl_live_protocol::{Finding, Severity};

    fn report(rule: &str) -> ValidationReport {
        ValidationReport::new(vec![Finding {
            rule_id: rule.to_string(),
            severity: Severity::Warning,
            message: "check".to_string(),
            scope: None,
        }])
    }

    fn validation(sequence: u64, rule: &str) -> ViewUpdate {
        ViewUpdate::Validation(TaggedReport {
            revision: Revision::new(0, sequence),
            report: report(rule),
        })
    }

    fn preview(sequence: u64, body: &str) -> ViewUpdate {
        ViewUpdate::Preview(PreviewArtifact {
            revision: Revision::new(0, sequence),
            body: body.to_string(),
        })
    }

    fn drain(updates: &mut ViewUpdates) -> Vec<ViewUpdate> {
        let mut out = Vec::new();
        while let Ok(update) = updates.try_recv() {
            out.push(update);
        }
        out
    }

    #[test]
    fn test_older_result_is_discarded() {
        let (gate, mut updates) = ResultGate::new();

        assert!(gate.accept(validation(5, "v")));
        assert!(!gate.accept(validation(4, "v2")));

        assert_eq!(drain(&mut updates), vec![validation(5, "v")]);
        assert_eq!(gate.view().validation.unwrap().report, report("v"));
    }

    #[test]
    fn test_equal_sequence_passes_in_arrival_order() {
        let (gate, mut updates) = ResultGate::new();

        assert!(gate.accept(validation(3, "received")));
        assert!(gate.accept(validation(3, "computed")));

        assert_eq!(
            drain(&mut updates),
            vec![validation(3, "received"), validation(3, "computed")]
        );
        assert_eq!(gate.view().validation.unwrap().report, report("computed"));
    }

    #[test]
    fn test_out_of_order_preview_keeps_newest() {
        let (gate, mut updates) = ResultGate::new();

        assert!(gate.accept(preview(7, "<svg>7</svg>")));
        assert!(!gate.accept(preview(5, "<svg>5</svg>")));

        let view = gate.view();
        assert_eq!(view.preview.unwrap().body, "<svg>7</svg>");
        assert_eq!(drain(&mut updates).len(), 1);
        assert_eq!(gate.high_water(ResultKind::Preview), Some(Revision::new(0, 7)));
    }

    #[test]
    fn test_kinds_are_ordered_independently() {
        let (gate, _updates) = ResultGate::new();

        assert!(gate.accept(preview(9, "p")));
        assert!(gate.accept(validation(2, "v")));
        assert!(gate.accept(validation(4, "v")));
        assert!(!gate.accept(preview(8, "p")));

        assert_eq!(gate.high_water(ResultKind::Validation), Some(Revision::new(0, 4)));
        assert_eq!(gate.high_water(ResultKind::Preview), Some(Revision::new(0, 9)));
    }

    #[test]
    fn test_reset_discards_previous_generation() {
        let (gate, _updates) = ResultGate::new();

        assert!(gate.accept(validation(40, "old")));
        gate.reset(1);
        assert_eq!(gate.view(), ViewState::default());

        // An in-flight result for the previous document arrives late
        assert!(!gate.accept(validation(41, "stale")));

        let fresh = ViewUpdate::Validation(TaggedReport {
            revision: Revision::new(1, 0),
            report: report("fresh"),
        });
        assert!(gate.accept(fresh));
        assert_eq!(gate.view().validation.unwrap().revision, Revision::new(1, 0));
    }

    #[test]
    fn test_accept_without_receiver_still_updates_view() {
        let (gate, updates) = ResultGate::new();
        drop(updates);

        assert!(gate.accept(preview(1, "svg")));
        assert_eq!(gate.view().preview.unwrap().body, "svg");
    }

    #[tokio::test]
    async fn test_subscribers_see_latest_view() {
        let (gate, _updates) = ResultGate::new();
        let mut view = gate.subscribe();

        gate.accept(preview(1, "one"));
        view.changed().await.unwrap();
        assert_eq!(view.borrow().preview.as_ref().unwrap().body, "one");
    }
}
