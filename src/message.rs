//! Message records as returned by the conversation history endpoints.
//!
//! Only the fields the exporter acts on are typed; everything else Slack sends
//! is kept in `extra` so day files round-trip the upstream payload.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ExportError;

/// Number of fractional digits kept when comparing timestamps
const FRACTION_DIGITS: usize = 9;

/// A single message, thread reply or channel event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message timestamp, unique within a conversation
    pub ts: String,
    /// Timestamp of the thread root this message belongs to (or opens)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_ts: Option<String>,
    /// Event tag such as `channel_join` or `channel_name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    /// All remaining upstream fields, preserved verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Create a bare message with only a timestamp
    pub fn new(ts: impl Into<String>) -> Self {
        Self {
            ts: ts.into(),
            thread_ts: None,
            subtype: None,
            extra: Map::new(),
        }
    }

    /// Parsed form of `ts`
    pub fn timestamp(&self) -> Result<SlackTimestamp, ExportError> {
        SlackTimestamp::parse(&self.ts)
    }

    /// True when this message opens a thread (its `thread_ts` is its own `ts`)
    pub fn is_thread_root(&self) -> bool {
        self.thread_ts.as_deref() == Some(self.ts.as_str())
    }

    /// Look up an untyped string field
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

/// Exact ordering key for Slack's dotted decimal timestamps
///
/// `"1609459199.000200"` is whole seconds plus a sub-second counter. Comparing
/// through `f64` loses the counter's low digits, so the fraction is kept as a
/// right-padded integer instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlackTimestamp {
    secs: i64,
    fraction: u64,
}

impl SlackTimestamp {
    /// Parse `"<secs>"` or `"<secs>.<fraction>"`
    pub fn parse(raw: &str) -> Result<Self, ExportError> {
        let invalid = || ExportError::InvalidTimestamp(raw.to_string());

        let (secs_part, fraction_part) = match raw.split_once('.') {
            Some((secs, fraction)) => (secs, fraction),
            None => (raw, ""),
        };

        if secs_part.is_empty()
            || fraction_part.len() > FRACTION_DIGITS
            || !fraction_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let secs = secs_part.parse::<i64>().map_err(|_| invalid())?;
        let fraction = if fraction_part.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", fraction_part, width = FRACTION_DIGITS);
            padded.parse::<u64>().map_err(|_| invalid())?
        };

        Ok(Self { secs, fraction })
    }

    /// Whole seconds since the Unix epoch
    pub fn secs(&self) -> i64 {
        self.secs
    }

    /// UTC calendar day of the whole-second part
    pub fn utc_day(&self) -> Result<NaiveDate, ExportError> {
        DateTime::<Utc>::from_timestamp(self.secs, 0)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| ExportError::InvalidTimestamp(self.to_string()))
    }
}

impl Ord for SlackTimestamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.secs
            .cmp(&other.secs)
            .then(self.fraction.cmp(&other.fraction))
    }
}

impl PartialOrd for SlackTimestamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SlackTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:0width$}", self.secs, self.fraction, width = FRACTION_DIGITS)
    }
}

/// Sort ascending by timestamp and drop repeated timestamps
///
/// Fails on the first unparseable timestamp; nothing is reordered in that case.
pub fn sort_chronologically(messages: &mut Vec<Message>) -> Result<(), ExportError> {
    let keys = messages
        .iter()
        .map(Message::timestamp)
        .collect::<Result<Vec<_>, _>>()?;
    let mut keyed: Vec<_> = keys.into_iter().zip(messages.drain(..)).collect();

    keyed.sort_by(|a, b| a.0.cmp(&b.0));
    keyed.dedup_by(|later, earlier| later.0 == earlier.0);

    messages.extend(keyed.into_iter().map(|(_, m)| m));
    Ok(())
}
