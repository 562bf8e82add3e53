// THEORY:
// The status panel is the only place a poll outcome is reported to a human. It is
// a tiny per-tick state machine whose terminal state is overwritten by the next
// tick:
//
//     Idle ──tick──▶ Fetching ──204──────────▶ WaitingForData
//                        │──2xx + envelope──▶ Live
//                        └──anything else───▶ Error
//
// `WaitingForData` is not an error. It is what the panel shows until the first
// live frame has reached the producer.

use chrono::{DateTime, Local};
use std::fmt;

use crate::core_modules::envelope::FetchEnvelope;

pub const WAITING_TEXT: &str = "Waiting for live UDP data...";

/// Where a rendered matrix came from, as derived from the envelope's message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceLabel {
    UdpStream,
    SyntheticFallback,
}

impl SourceLabel {
    pub fn from_message(message: &str) -> Self {
        if message.contains("UDP") {
            SourceLabel::UdpStream
        } else {
            SourceLabel::SyntheticFallback
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SourceLabel::UdpStream => "UDP Stream",
            SourceLabel::SyntheticFallback => "Synthetic Fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusMessage {
    /// Before the first tick.
    Idle,
    /// A request went out at the given local time.
    Fetching { at: DateTime<Local> },
    /// The producer answered 204.
    WaitingForData,
    /// A matrix was decoded and bound.
    Live {
        /// Envelope timestamp, already rendered as local time.
        timestamp: String,
        source: SourceLabel,
    },
    Error { message: String },
}

impl StatusMessage {
    pub fn live(envelope: &FetchEnvelope) -> Self {
        StatusMessage::Live {
            timestamp: envelope.timestamp.display_time(),
            source: SourceLabel::from_message(&envelope.message),
        }
    }

    pub fn error(error: impl fmt::Display) -> Self {
        StatusMessage::Error {
            message: error.to_string(),
        }
    }

    /// Short machine-readable state name.
    pub fn state(&self) -> &'static str {
        match self {
            StatusMessage::Idle => "idle",
            StatusMessage::Fetching { .. } => "fetching",
            StatusMessage::WaitingForData => "waiting",
            StatusMessage::Live { .. } => "live",
            StatusMessage::Error { .. } => "error",
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, StatusMessage::Live { .. })
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusMessage::Idle => write!(f, "Idle"),
            StatusMessage::Fetching { at } => write!(f, "Fetching... ({})", at.format("%H:%M:%S")),
            StatusMessage::WaitingForData => write!(f, "{WAITING_TEXT}"),
            StatusMessage::Live { timestamp, source } => {
                write!(f, "LIVE | Timestamp: {timestamp} | Source: {}", source.as_str())
            }
            StatusMessage::Error { message } => write!(f, "Error: {message}"),
        }
    }
}
