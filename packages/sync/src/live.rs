//! # Live Sync
//!
//! The context object of one editing view. It owns the edit session, the
//! validation connection, the preview requester and the result gate, and
//! wires them together:
//!
//! ```text
//! apply_edit ─▶ EditSession ─┬─▶ DebounceGate (short) ─▶ ConnectionClient ─┐
//!                            │                                             ├─▶ ResultGate ─▶ ViewState
//!                            └─▶ DebounceGate (long) ──▶ PreviewRequester ─┘
//! ```
//!
//! Everything the view needs lives here and dies with it; dropping a
//! `LiveSync` cancels both debounce gates and disposes the connection.

use crate::connection::{ConnectionClient, ConnectionStatus, InboundReport};
use crate::gate::{ExportArtifact, ResultGate, TaggedReport, ViewState, ViewUpdate, ViewUpdates};
use crate::preview::{PreviewOutcome, PreviewRequester};
use crate::session::{EditSession, Revision, Snapshot};
use crate::transport::Connector;
use crate::{DebounceGate, DerivationService, DeriveError, SyncConfig};
use bbdsl_live_protocol::{ExportFormat, ServerMessage};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub struct LiveSync {
    session: EditSession,
    connection: Arc<ConnectionClient>,
    preview: PreviewRequester,
    gate: Arc<ResultGate>,
}

impl LiveSync {
    /// Build the pipeline for one view. Call [`LiveSync::open`] to connect.
    ///
    /// # Panics
    ///
    /// Panics when called outside a Tokio runtime.
    pub fn new(
        config: &SyncConfig,
        connector: Arc<dyn Connector>,
        service: Arc<dyn DerivationService>,
    ) -> (Self, ViewUpdates) {
        let (gate, updates) = ResultGate::new();
        let gate = Arc::new(gate);

        let connection = Arc::new(
            ConnectionClient::new(connector, config.reconnect_delay())
                .with_connect_timeout(config.connect_timeout()),
        );
        let report_gate = Arc::clone(&gate);
        connection.on_message(move |inbound| route_report(&report_gate, inbound));

        let preview = PreviewRequester::new(
            service,
            Arc::clone(&gate),
            config.export.clone(),
            config.request_timeout(),
        );

        let validation_gate = {
            let connection = Arc::clone(&connection);
            DebounceGate::new("validation", config.validation_debounce(), move |snapshot: Snapshot| {
                connection.send(snapshot.revision, snapshot.text);
            })
        };
        let preview_gate = {
            let preview = preview.clone();
            DebounceGate::new("preview", config.preview_debounce(), move |snapshot: Snapshot| {
                preview.refresh(snapshot);
            })
        };

        let sync = Self {
            session: EditSession::new(validation_gate, preview_gate),
            connection,
            preview,
            gate,
        };
        (sync, updates)
    }

    pub fn open(&self) {
        self.connection.open();
    }

    /// Record a local edit. Never fails; all network work is deferred.
    pub fn apply_edit(&mut self, text: impl Into<Arc<str>>) -> Snapshot {
        self.session.apply_edit(text)
    }

    /// Validate the current text again once the short debounce elapses.
    ///
    /// The connection never replays frames it dropped while not `Open`;
    /// callers use this when a channel comes up after the text was set.
    pub fn resync(&self) -> Snapshot {
        let snapshot = self.session.rearm_validation();
        debug!(revision = %snapshot.revision, "Validation re-armed");
        snapshot
    }

    /// Swap in a different document, discarding the previous one's results
    pub fn load_document(&mut self, text: impl Into<Arc<str>>) -> Snapshot {
        let generation = self.session.revision().generation.wrapping_add(1);
        self.gate.reset(generation);
        let snapshot = self.session.load(text);
        info!(revision = %snapshot.revision, "Document loaded");
        snapshot
    }

    /// Manual preview at the revision current *now*.
    ///
    /// The returned future owns everything it needs, so editing can continue
    /// while it runs.
    pub fn preview_now(
        &self,
    ) -> impl Future<Output = Result<PreviewOutcome, DeriveError>> + Send + 'static {
        let preview = self.preview.clone();
        let snapshot = self.session.snapshot();
        async move { preview.preview(&snapshot).await }
    }

    /// Manual export at the revision current *now*
    pub fn export(
        &self,
        format: ExportFormat,
    ) -> impl Future<Output = Result<ExportArtifact, DeriveError>> + Send + 'static {
        let preview = self.preview.clone();
        let snapshot = self.session.snapshot();
        async move { preview.export(&snapshot, format).await }
    }

    pub fn snapshot(&self) -> Snapshot {
        self.session.snapshot()
    }

    pub fn revision(&self) -> Revision {
        self.session.revision()
    }

    pub fn text(&self) -> &str {
        self.session.text()
    }

    pub fn view(&self) -> watch::Receiver<ViewState> {
        self.gate.subscribe()
    }

    pub fn connection(&self) -> watch::Receiver<ConnectionStatus> {
        self.connection.subscribe()
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    pub fn preview_requester(&self) -> &PreviewRequester {
        &self.preview
    }

    /// Cancel pending work and dispose the connection
    pub fn shutdown(&self) {
        self.session.cancel_pending();
        self.connection.close();
        debug!("Live sync shut down");
    }
}

impl Drop for LiveSync {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn route_report(gate: &ResultGate, inbound: InboundReport) {
    match inbound.message {
        ServerMessage::Ok { report, .. } => {
            gate.accept(ViewUpdate::Validation(TaggedReport {
                revision: inbound.revision,
                report,
            }));
        }
        ServerMessage::Error { message, .. } => {
            warn!(revision = %inbound.revision, %message, "Validation service reported an error");
        }
    }
}
