//! # Preview Requester
//!
//! Issues on-demand derivation calls and tags each result with the revision
//! that was current when the call was issued.
//!
//! Two paths lead here: the long debounce gate calls [`PreviewRequester::refresh`]
//! once editing quiesces, and explicit user actions call
//! [`PreviewRequester::preview`] or [`PreviewRequester::export`] directly.
//! In-flight calls are never cancelled when the user keeps typing; the
//! result gate filters whatever comes back late. A failed call publishes
//! nothing, so the last good artifact stays on screen.

use crate::gate::{ExportArtifact, PreviewArtifact, ResultGate, ViewUpdate};
use crate::session::{PendingRequest, RequestKind, Snapshot};
use crate::util::lock;
use crate::{DerivationService, DeriveError};
use bbdsl_live_protocol::{ExportFormat, ExportOptions};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time;
use tracing::{debug, warn};

/// What happened to a successful preview
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewOutcome {
    /// Published to the view
    Shown,

    /// A newer preview had already been accepted
    Superseded,
}

struct Inner {
    service: Arc<dyn DerivationService>,
    gate: Arc<ResultGate>,
    options: ExportOptions,
    timeout: Duration,
    in_flight: Mutex<BTreeMap<u64, PendingRequest>>,
    next_id: AtomicU64,
    runtime: Handle,
}

#[derive(Clone)]
pub struct PreviewRequester {
    inner: Arc<Inner>,
}

impl PreviewRequester {
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new(
        service: Arc<dyn DerivationService>,
        gate: Arc<ResultGate>,
        options: ExportOptions,
        timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                service,
                gate,
                options,
                timeout,
                in_flight: Mutex::new(BTreeMap::new()),
                next_id: AtomicU64::new(0),
                runtime: Handle::current(),
            }),
        }
    }

    /// Automatic path: render in the background, swallowing failures
    pub fn refresh(&self, snapshot: Snapshot) {
        let requester = self.clone();
        self.inner.runtime.spawn(async move {
            match requester.preview(&snapshot).await {
                Ok(outcome) => {
                    debug!(revision = %snapshot.revision, ?outcome, "Automatic preview finished");
                }
                Err(err) => {
                    warn!(revision = %snapshot.revision, error = %err, "Automatic preview failed");
                }
            }
        });
    }

    /// Render `snapshot` and offer the artifact to the result gate
    pub async fn preview(&self, snapshot: &Snapshot) -> Result<PreviewOutcome, DeriveError> {
        let body = self
            .request(snapshot, RequestKind::Preview, ExportFormat::Svg)
            .await?;

        let shown = self.inner.gate.accept(ViewUpdate::Preview(PreviewArtifact {
            revision: snapshot.revision,
            body,
        }));
        Ok(if shown {
            PreviewOutcome::Shown
        } else {
            PreviewOutcome::Superseded
        })
    }

    /// Export `snapshot`; the artifact goes back to the caller only
    pub async fn export(
        &self,
        snapshot: &Snapshot,
        format: ExportFormat,
    ) -> Result<ExportArtifact, DeriveError> {
        let body = self
            .request(snapshot, RequestKind::Export(format), format)
            .await?;
        Ok(ExportArtifact {
            revision: snapshot.revision,
            format,
            body,
        })
    }

    /// Calls still waiting for a response, oldest first
    pub fn in_flight(&self) -> Vec<PendingRequest> {
        lock(&self.inner.in_flight).values().cloned().collect()
    }

    async fn request(
        &self,
        snapshot: &Snapshot,
        kind: RequestKind,
        format: ExportFormat,
    ) -> Result<String, DeriveError> {
        let _tracked = self.track(PendingRequest::new(snapshot.revision, kind));
        let inner = &self.inner;

        let call = inner.service.derive(&snapshot.text, format, &inner.options);
        match time::timeout(inner.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(DeriveError::Timeout(inner.timeout)),
        }
    }

    fn track(&self, request: PendingRequest) -> Tracked<'_> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.in_flight).insert(id, request);
        Tracked {
            table: &self.inner.in_flight,
            id,
        }
    }
}

/// Removes its entry from the in-flight table however the call ends
struct Tracked<'a> {
    table: &'a Mutex<BTreeMap<u64, PendingRequest>>,
    id: u64,
}

impl Drop for Tracked<'_> {
    fn drop(&mut self) {
        lock(self.table).remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Revision;
    use async_trait::async_trait;
    use std::collections::HashMap;

    /// Answers after a per-text delay, failing for texts it has no delay for
    struct ScriptedService {
        delays: HashMap<&'static str, Duration>,
    }

    #[async_trait]
    impl DerivationService for ScriptedService {
        async fn derive(
            &self,
            text: &str,
            format: ExportFormat,
            _options: &ExportOptions,
        ) -> Result<String, DeriveError> {
            match self.delays.get(text) {
                Some(delay) => {
                    time::sleep(*delay).await;
                    Ok(format!("<{format}>{text}</{format}>"))
                }
                None => Err(DeriveError::Service {
                    status: 422,
                    detail: format!("cannot load {text}"),
                }),
            }
        }
    }

    fn requester(delays: &[(&'static str, u64)]) -> (PreviewRequester, Arc<ResultGate>) {
        let service = ScriptedService {
            delays: delays
                .iter()
                .map(|(text, ms)| (*text, Duration::from_millis(*ms)))
                .collect(),
        };
        let (gate, _updates) = ResultGate::new();
        let gate = Arc::new(gate);
        let requester = PreviewRequester::new(
            Arc::new(service),
            Arc::clone(&gate),
            ExportOptions::default(),
            Duration::from_secs(30),
        );
        (requester, gate)
    }

    fn snapshot(sequence: u64, text: &str) -> Snapshot {
        Snapshot {
            revision: Revision::new(0, sequence),
            text: Arc::from(text),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_older_preview_is_discarded() {
        let (requester, gate) = requester(&[("five", 300), ("seven", 50)]);

        requester.refresh(snapshot(5, "five"));
        requester.refresh(snapshot(7, "seven"));
        time::sleep(Duration::from_millis(100)).await;
        assert_eq!(gate.view().preview.unwrap().revision, Revision::new(0, 7));

        time::sleep(Duration::from_millis(500)).await;
        let shown = gate.view().preview.unwrap();
        assert_eq!(shown.revision, Revision::new(0, 7));
        assert_eq!(shown.body, "<svg>seven</svg>");
        assert!(requester.in_flight().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_preview_reports_superseded() {
        let (requester, _gate) = requester(&[("old", 200), ("new", 10)]);

        let manual = tokio::spawn({
            let requester = requester.clone();
            async move { requester.preview(&snapshot(3, "old")).await }
        });
        requester.refresh(snapshot(4, "new"));

        let outcome = manual.await.unwrap().unwrap();
        assert_eq!(outcome, PreviewOutcome::Superseded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_last_good_artifact() {
        let (requester, gate) = requester(&[("good", 10)]);

        let outcome = requester.preview(&snapshot(1, "good")).await.unwrap();
        assert_eq!(outcome, PreviewOutcome::Shown);

        let err = requester.preview(&snapshot(2, "broken")).await.unwrap_err();
        assert!(matches!(err, DeriveError::Service { status: 422, .. }));

        requester.refresh(snapshot(3, "also broken"));
        time::sleep(Duration::from_millis(50)).await;

        assert_eq!(gate.view().preview.unwrap().body, "<svg>good</svg>");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out() {
        let (gate, _updates) = ResultGate::new();
        let requester = PreviewRequester::new(
            Arc::new(ScriptedService {
                delays: HashMap::from([("slow", Duration::from_secs(60))]),
            }),
            Arc::new(gate),
            ExportOptions::default(),
            Duration::from_secs(5),
        );

        let err = requester.preview(&snapshot(1, "slow")).await.unwrap_err();
        assert!(matches!(err, DeriveError::Timeout(d) if d == Duration::from_secs(5)));
        assert!(requester.in_flight().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_export_bypasses_gate() {
        let (requester, gate) = requester(&[("doc", 10)]);

        let artifact = requester
            .export(&snapshot(2, "doc"), ExportFormat::Bml)
            .await
            .unwrap();

        assert_eq!(artifact.revision, Revision::new(0, 2));
        assert_eq!(artifact.format, ExportFormat::Bml);
        assert_eq!(artifact.body, "<bml>doc</bml>");
        assert!(gate.view().preview.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_tracks_pending_calls() {
        let (requester, _gate) = requester(&[("a", 100), ("b", 200)]);

        requester.refresh(snapshot(1, "a"));
        requester.refresh(snapshot(2, "b"));
        time::sleep(Duration::from_millis(10)).await;

        let pending = requester.in_flight();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].revision, Revision::new(0, 1));
        assert_eq!(pending[1].kind, RequestKind::Preview);

        time::sleep(Duration::from_millis(150)).await;
        assert_eq!(requester.in_flight().len(), 1);

        time::sleep(Duration::from_millis(100)).await;
        assert!(requester.in_flight().is_empty());
    }
}
