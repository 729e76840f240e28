//! End-to-end behavior of the live-sync pipeline over the in-memory transport

use async_trait::async_trait;
use bbdsl_live_sync::transport::{memory_channel, MemoryListener, MemoryPeer};
use bbdsl_live_sync::{
    ConnectionState, DerivationService, DeriveError, ExportFormat, ExportOptions, Finding,
    LiveSync, PreviewOutcome, Revision, ServerMessage, Severity, SyncConfig, ValidationReport,
    ViewUpdates,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time;

/// Renders `svg:<text>` after a per-text delay (20ms unless scripted)
#[derive(Default)]
struct FakeRenderer {
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<String>>,
}

impl FakeRenderer {
    fn delay(&self, text: &str, ms: u64) {
        self.delays
            .lock()
            .unwrap()
            .insert(text.to_string(), Duration::from_millis(ms));
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DerivationService for FakeRenderer {
    async fn derive(
        &self,
        text: &str,
        format: ExportFormat,
        _options: &ExportOptions,
    ) -> Result<String, DeriveError> {
        self.calls.lock().unwrap().push(text.to_string());
        let delay = self
            .delays
            .lock()
            .unwrap()
            .get(text)
            .copied()
            .unwrap_or(Duration::from_millis(20));
        time::sleep(delay).await;
        if text.contains("!!") {
            return Err(DeriveError::Service {
                status: 422,
                detail: "YAML parse error".to_string(),
            });
        }
        Ok(format!("{format}:{text}"))
    }
}

struct Harness {
    sync: LiveSync,
    _updates: ViewUpdates,
    listener: MemoryListener,
    peer: MemoryPeer,
    renderer: Arc<FakeRenderer>,
}

async fn harness() -> Harness {
    let (connector, mut listener) = memory_channel();
    let renderer = Arc::new(FakeRenderer::default());
    let (sync, updates) = LiveSync::new(
        &SyncConfig::default(),
        Arc::new(connector),
        Arc::clone(&renderer) as Arc<dyn DerivationService>,
    );
    sync.open();
    let peer = listener.accept().await.unwrap();
    wait_for_state(&sync, ConnectionState::Open).await;

    Harness {
        sync,
        _updates: updates,
        listener,
        peer,
        renderer,
    }
}

async fn wait_for_state(sync: &LiveSync, state: ConnectionState) {
    sync.connection()
        .wait_for(|status| status.state == state)
        .await
        .unwrap();
}

fn report(rule_ids: &[&str]) -> String {
    let findings = rule_ids
        .iter()
        .map(|rule_id| Finding {
            rule_id: rule_id.to_string(),
            severity: Severity::Error,
            message: format!("{rule_id} failed"),
            scope: Some("openings".to_string()),
        })
        .collect();
    ServerMessage::ok(ValidationReport::new(findings))
        .to_frame()
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_single_edit_sends_one_frame_after_quiet_period() {
    let mut h = harness().await;

    h.sync.apply_edit("A");
    time::sleep(Duration::from_millis(499)).await;
    assert!(h.peer.drain().is_empty());

    time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.peer.drain(), vec!["A".to_string()]);

    time::sleep(Duration::from_secs(5)).await;
    assert!(h.peer.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rapid_edits_coalesce() {
    let mut h = harness().await;

    h.sync.apply_edit("A");
    time::sleep(Duration::from_millis(100)).await;
    h.sync.apply_edit("AB");
    time::sleep(Duration::from_millis(2000)).await;

    assert_eq!(h.peer.drain(), vec!["AB".to_string()]);
    // The slower gate coalesces too
    assert_eq!(h.renderer.calls(), vec!["AB".to_string()]);
    let preview = h.sync.view().borrow().preview.clone().unwrap();
    assert_eq!(preview.revision, Revision::new(0, 2));
}

#[tokio::test(start_paused = true)]
async fn test_sequence_counts_edits() {
    let mut h = harness().await;

    for i in 1..=5u64 {
        let snapshot = h.sync.apply_edit(format!("edit {i}"));
        assert_eq!(snapshot.sequence(), i);
    }
    assert_eq!(h.sync.revision().sequence, 5);
}

#[tokio::test(start_paused = true)]
async fn test_out_of_order_previews_show_the_newest() {
    let mut h = harness().await;
    h.renderer.delay("v5", 3000);
    h.renderer.delay("v7", 50);

    for i in 1..=5 {
        h.sync.apply_edit(format!("v{i}"));
    }
    time::sleep(Duration::from_millis(1600)).await;
    for i in 6..=7 {
        h.sync.apply_edit(format!("v{i}"));
    }
    time::sleep(Duration::from_millis(1600)).await;

    let preview = h.sync.view().borrow().preview.clone().unwrap();
    assert_eq!(preview.revision, Revision::new(0, 7));

    // Let the slow v5 response land
    time::sleep(Duration::from_secs(2)).await;
    let preview = h.sync.view().borrow().preview.clone().unwrap();
    assert_eq!(preview.revision, Revision::new(0, 7));
    assert_eq!(preview.body, "svg:v7");
}

#[tokio::test(start_paused = true)]
async fn test_validation_replies_follow_send_order() {
    let mut h = harness().await;

    h.sync.apply_edit("one");
    time::sleep(Duration::from_millis(600)).await;
    h.sync.apply_edit("two");
    time::sleep(Duration::from_millis(600)).await;
    assert_eq!(h.peer.drain().len(), 2);

    h.peer.send(report(&["R1"]));
    h.peer.send(report(&["R2"]));
    time::sleep(Duration::from_millis(10)).await;

    let shown = h.sync.view().borrow().validation.clone().unwrap();
    assert_eq!(shown.revision, Revision::new(0, 2));
    assert_eq!(shown.report.findings[0].rule_id, "R2");
    assert_eq!(shown.report.error_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_drop_and_recover_without_replay() {
    let mut h = harness().await;

    h.sync.apply_edit("before");
    time::sleep(Duration::from_millis(600)).await;
    assert_eq!(h.peer.drain(), vec!["before".to_string()]);

    // Server goes away; an edit made while disconnected is not queued
    drop(h.peer);
    wait_for_state(&h.sync, ConnectionState::ReconnectWait).await;
    h.sync.apply_edit("while down");
    time::sleep(Duration::from_millis(600)).await;

    // One reconnect attempt after the fixed delay
    time::sleep(Duration::from_secs(3)).await;
    let mut peer = h.listener.accept().await.unwrap();
    wait_for_state(&h.sync, ConnectionState::Open).await;
    assert_eq!(h.listener.attempts(), 2);
    assert_eq!(h.sync.connection_status().epoch, 2);

    time::sleep(Duration::from_secs(1)).await;
    assert!(peer.drain().is_empty(), "nothing is replayed on reconnect");

    h.sync.apply_edit("after");
    time::sleep(Duration::from_millis(600)).await;
    assert_eq!(peer.drain(), vec!["after".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_refused_connection_retries_at_fixed_interval() {
    let (connector, listener) = memory_channel();
    listener.set_refusing(true);
    let (sync, _updates) = LiveSync::new(
        &SyncConfig::default(),
        Arc::new(connector),
        Arc::new(FakeRenderer::default()),
    );
    sync.open();

    time::sleep(Duration::from_millis(100)).await;
    assert_eq!(listener.attempts(), 1);
    time::sleep(Duration::from_secs(3)).await;
    assert_eq!(listener.attempts(), 2);
    time::sleep(Duration::from_secs(3)).await;
    assert_eq!(listener.attempts(), 3);

    sync.shutdown();
    wait_for_state(&sync, ConnectionState::Disposed).await;
    time::sleep(Duration::from_secs(30)).await;
    assert_eq!(listener.attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_preview_failure_keeps_last_good() {
    let mut h = harness().await;

    h.sync.apply_edit("good");
    time::sleep(Duration::from_millis(1600)).await;
    h.sync.apply_edit("bad !!");
    time::sleep(Duration::from_millis(1600)).await;

    let preview = h.sync.view().borrow().preview.clone().unwrap();
    assert_eq!(preview.body, "svg:good");
    assert!(h.sync.preview_requester().in_flight().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_manual_preview_and_export() {
    let mut h = harness().await;

    h.sync.apply_edit("system");
    let outcome = h.sync.preview_now().await.unwrap();
    assert_eq!(outcome, PreviewOutcome::Shown);
    assert_eq!(
        h.sync.view().borrow().preview.as_ref().unwrap().body,
        "svg:system"
    );

    let err = {
        h.sync.apply_edit("!! broken");
        h.sync.export(ExportFormat::Pbn).await.unwrap_err()
    };
    assert!(matches!(err, DeriveError::Service { status: 422, .. }));

    h.sync.apply_edit("fixed");
    let artifact = h.sync.export(ExportFormat::Html).await.unwrap();
    assert_eq!(artifact.body, "html:fixed");
    assert_eq!(artifact.revision, Revision::new(0, 3));
}
