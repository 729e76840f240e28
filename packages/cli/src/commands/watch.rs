use super::ServerArgs;
use crate::config::Config;
use crate::render;
use crate::watcher::FileWatcher;
use anyhow::{Context, Result};
use bbdsl_live_sync::{
    ConnectionState, ConnectionStatus, HttpDerivationService, LiveSync, SyncConfig, ViewUpdate,
    WsConnector,
};
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// BBDSL document to watch
    pub file: PathBuf,

    #[command(flatten)]
    pub server: ServerArgs,

    /// Where to write the rendered bidding tree (defaults to <FILE>.svg)
    #[arg(long)]
    pub preview_out: Option<PathBuf>,

    /// Quiet period before validation, in milliseconds (overrides config)
    #[arg(long)]
    pub validation_debounce_ms: Option<u64>,

    /// Quiet period before a preview render, in milliseconds (overrides config)
    #[arg(long)]
    pub preview_debounce_ms: Option<u64>,

    /// Delay between reconnect attempts, in milliseconds (overrides config)
    #[arg(long)]
    pub reconnect_delay_ms: Option<u64>,
}

impl WatchArgs {
    fn sync_config(&self, config: &Config) -> SyncConfig {
        let mut sync = config.sync.clone();
        if let Some(ms) = self.validation_debounce_ms {
            sync.validation_debounce_ms = ms;
        }
        if let Some(ms) = self.preview_debounce_ms {
            sync.preview_debounce_ms = ms;
        }
        if let Some(ms) = self.reconnect_delay_ms {
            sync.reconnect_delay_ms = ms;
        }
        sync
    }

    fn preview_path(&self) -> PathBuf {
        self.preview_out
            .clone()
            .unwrap_or_else(|| self.file.with_extension("svg"))
    }
}

pub async fn watch(args: WatchArgs, cwd: &Path) -> Result<()> {
    let config = Config::load(cwd)?;
    let sync_config = args.sync_config(&config);
    let (endpoints, session) = args.server.resolve(&config)?;
    let preview_out = args.preview_path();

    let text = fs::read_to_string(&args.file)
        .with_context(|| format!("Cannot read {}", args.file.display()))?;
    let mut watcher = FileWatcher::new(&args.file)?;

    println!("👀 {} {}", "Watching".green().bold(), args.file.display());
    println!("   Validation: {}", endpoints.validate);
    println!("   Preview:    {}", preview_out.display());
    println!();

    let connector = Arc::new(WsConnector::new(endpoints.validate.clone()));
    let service = Arc::new(HttpDerivationService::new(endpoints, session)?);
    let (mut sync, mut updates) = LiveSync::new(&sync_config, connector, service);
    let mut connection = sync.connection();

    sync.open();
    sync.load_document(text);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = watcher.changed() => {
                if changed.is_none() {
                    warn!("File watcher stopped");
                    break;
                }
                match fs::read_to_string(&args.file) {
                    Ok(text) if text != sync.text() => {
                        let snapshot = sync.apply_edit(text);
                        debug!(revision = %snapshot.revision, "Picked up edit");
                    }
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "Cannot re-read document"),
                }
            }
            Ok(()) = connection.changed() => {
                let status = *connection.borrow_and_update();
                connection_changed(&sync, status);
            }
            Some(update) = updates.recv() => match update {
                ViewUpdate::Validation(tagged) => render::print(render::report_lines(&tagged)),
                ViewUpdate::Preview(artifact) => match fs::write(&preview_out, &artifact.body) {
                    Ok(()) => render::print([render::preview_line(&artifact, &preview_out)]),
                    Err(err) => warn!(error = %err, path = %preview_out.display(), "Cannot write preview"),
                },
            },
        }
    }

    println!();
    println!("{}", "Shutting down...".dimmed());
    sync.shutdown();
    let disposed = connection.wait_for(|status| status.state == ConnectionState::Disposed);
    if tokio::time::timeout(Duration::from_secs(2), disposed).await.is_err() {
        debug!("Validation channel did not close in time");
    }
    Ok(())
}

/// Report a connection transition. The document was loaded before the
/// channel could carry it, so the first open validates it again.
fn connection_changed(sync: &LiveSync, status: ConnectionStatus) -> bool {
    render::print([render::connection_line(status)]);
    let first_open = status.state == ConnectionState::Open && status.epoch == 1;
    if first_open {
        sync.resync();
    }
    first_open
}
