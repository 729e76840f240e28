//! # BBDSL Live Protocol
//!
//! Wire types shared by the live-synchronization pipeline and its remote
//! collaborator.
//!
//! ```text
//! client ──(raw YAML text frame)──────────────▶ /api/v1/validate
//! client ◀─(ServerMessage JSON frame)───────── /api/v1/validate
//! client ──(POST ExportRequest)───────────────▶ /api/v1/export/{fmt}
//! client ◀─(exported text, or {"detail": ..})─ /api/v1/export/{fmt}
//! ```
//!
//! Client frames on the validation channel are the document text itself with
//! no envelope, so only the server side of that channel has a type here.

mod error;
mod export;
mod message;
mod report;

pub use error::ProtocolError;
pub use export::{ExportFormat, ExportOptions, ExportRequest};
pub use message::ServerMessage;
pub use report::{Finding, Severity, ValidationReport};
