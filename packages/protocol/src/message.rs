//! Server → client frames on the validation channel.
//!
//! On the wire every frame is `{ status, report?, message? }`. A report is
//! required when `status` is `"ok"`; the service omits it when the rule
//! engine itself failed and sends `message` instead.

use crate::{ProtocolError, ValidationReport};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireMessage", into = "WireMessage")]
pub enum ServerMessage {
    /// The document was validated; the report may still contain errors
    Ok {
        report: ValidationReport,
        message: Option<String>,
    },

    /// The service could not validate the document (e.g. unparsable YAML)
    Error {
        message: String,
        report: Option<ValidationReport>,
    },
}

impl ServerMessage {
    pub fn ok(report: ValidationReport) -> Self {
        ServerMessage::Ok {
            report,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
            report: None,
        }
    }

    /// Parse one inbound text frame
    pub fn parse(frame: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(frame)?)
    }

    /// Encode as a text frame (the service side of the channel)
    pub fn to_frame(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ServerMessage::Ok { .. })
    }

    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            ServerMessage::Ok { report, .. } => Some(report),
            ServerMessage::Error { report, .. } => report.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum WireStatus {
    Ok,
    Error,
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    status: WireStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    report: Option<ValidationReport>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl TryFrom<WireMessage> for ServerMessage {
    type Error = String;

    fn try_from(wire: WireMessage) -> Result<Self, String> {
        match wire.status {
            WireStatus::Ok => match wire.report {
                Some(report) => Ok(ServerMessage::Ok {
                    report,
                    message: wire.message,
                }),
                None => Err("status \"ok\" without a report".to_string()),
            },
            WireStatus::Error => Ok(ServerMessage::Error {
                message: wire
                    .message
                    .unwrap_or_else(|| "validation failed".to_string()),
                report: wire.report,
            }),
        }
    }
}

impl From<ServerMessage> for WireMessage {
    fn from(msg: ServerMessage) -> Self {
        match msg {
            ServerMessage::Ok { report, message } => WireMessage {
                status: WireStatus::Ok,
                report: Some(report),
                message,
            },
            ServerMessage::Error { message, report } => WireMessage {
                status: WireStatus::Error,
                report,
                message: Some(message),
            },
        }
    }
}
