// THEORY:
// The fetch envelope is the JSON document returned by the matrix endpoint on a
// successful poll: `{ matrix, timestamp, message }`. It is transient. Each poll
// decodes one, hands its matrix to the transformer, and drops it.
//
// The timestamp field is loosely typed on the wire. Some producers send epoch
// milliseconds, others an ISO-8601 string from `datetime.isoformat()`, with or
// without an offset. `Timestamp` accepts all of them and defers interpretation
// to `display_time`, which renders a local wall-clock string or "Invalid Date".
// A `null` or missing timestamp still decodes; it only shows as "Invalid Date".

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// The JSON payload produced by the matrix endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchEnvelope {
    pub matrix: Vec<f64>,
    #[serde(default)]
    pub timestamp: Timestamp,
    pub message: String,
}

impl FetchEnvelope {
    pub fn from_slice(body: &[u8]) -> Result<Self, FetchError> {
        Ok(serde_json::from_slice(body)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    /// Milliseconds since the Unix epoch.
    Millis(f64),
    /// An ISO-8601 / RFC 3339 date-time string.
    Text(String),
    /// `null` or absent on the wire.
    #[default]
    Missing,
}

impl Timestamp {
    pub fn now() -> Self {
        Timestamp::Millis(Local::now().timestamp_millis() as f64)
    }

    pub fn to_local(&self) -> Option<DateTime<Local>> {
        match self {
            Timestamp::Millis(ms) => {
                if !ms.is_finite() {
                    return None;
                }
                DateTime::from_timestamp_millis(ms.trunc() as i64).map(|utc| utc.with_timezone(&Local))
            }
            Timestamp::Text(text) => parse_text(text),
            Timestamp::Missing => None,
        }
    }

    /// Local `HH:MM:SS`, or "Invalid Date" when the timestamp cannot be parsed.
    pub fn display_time(&self) -> String {
        match self.to_local() {
            Some(time) => time.format("%H:%M:%S").to_string(),
            None => "Invalid Date".to_string(),
        }
    }
}

fn parse_text(text: &str) -> Option<DateTime<Local>> {
    let text = text.trim();
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(text) {
        return Some(with_offset.with_timezone(&Local));
    }
    // Offset-less ISO strings are local time.
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
}
