//! # BBDSL Live Sync
//!
//! Keeps a bidding-convention document and its two derived views (the
//! validation report and the bidding-tree preview) in step while the user
//! types.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ EditSession: text + edit sequence           │
//! └─────────────────────────────────────────────┘
//!          ↓ (500ms)                ↓ (1500ms)
//! ┌──────────────────────┐ ┌──────────────────────┐
//! │ ConnectionClient     │ │ PreviewRequester     │
//! │  streamed validation │ │  request/response    │
//! └──────────────────────┘ └──────────────────────┘
//!          ↓                        ↓
//! ┌─────────────────────────────────────────────┐
//! │ ResultGate: freshest result wins, per kind  │
//! └─────────────────────────────────────────────┘
//!                     ↓
//!                 ViewState
//! ```
//!
//! ## Core Principles
//!
//! 1. **The session is the source of truth**: reports and previews are
//!    derived views and never write back into the text
//! 2. **Only current text matters**: frames are dropped, never queued, while
//!    the connection is down
//! 3. **Freshest wins**: a result can never replace one computed for a newer
//!    edit, whatever order the network delivers them in
//! 4. **Editing never fails**: transport, payload and derivation failures are
//!    logged or returned to the caller that asked, never raised from
//!    `apply_edit`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bbdsl_live_sync::{Endpoints, HttpDerivationService, LiveSync, SessionContext, SyncConfig, WsConnector};
//! use std::sync::Arc;
//!
//! let endpoints = Endpoints::from_origin("http://localhost:8000")?;
//! let connector = Arc::new(WsConnector::new(endpoints.validate.clone()));
//! let service = Arc::new(HttpDerivationService::new(endpoints, SessionContext::anonymous())?);
//!
//! let (mut sync, mut updates) = LiveSync::new(&SyncConfig::default(), connector, service);
//! sync.open();
//! sync.apply_edit("system:\n  name: Precision\n");
//!
//! while let Some(update) = updates.recv().await {
//!     // render
//! }
//! ```

mod config;
mod connection;
mod debounce;
mod derive;
mod error;
mod gate;
mod live;
mod preview;
mod session;
pub mod transport;
mod util;

pub use config::{Endpoints, SessionContext, SyncConfig};
pub use connection::{ConnectionClient, ConnectionState, ConnectionStatus, InboundReport};
pub use debounce::DebounceGate;
pub use derive::{DerivationService, HttpDerivationService};
pub use error::{ConfigError, DeriveError, TransportError};
pub use gate::{
    ExportArtifact, PreviewArtifact, ResultGate, ResultKind, TaggedReport, ViewState, ViewUpdate,
    ViewUpdates,
};
pub use live::LiveSync;
pub use preview::{PreviewOutcome, PreviewRequester};
pub use session::{EditSession, PendingRequest, RequestKind, Revision, Snapshot};
pub use transport::{Channel, Connector, WsConnector};

// Re-export wire types for convenience
pub use bbdsl_live_protocol::{
    ExportFormat, ExportOptions, Finding, ServerMessage, Severity, ValidationReport,
};
