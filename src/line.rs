//! Line protocol encoding for the socket transport.
//!
//! One meter becomes `<metric> <timestamp> <value> <k>=<v> ...`; a batch is
//! the concatenation of `put <line>\n` for every queued meter.

use std::{collections::BTreeMap, fmt::Write as _};

use crate::{error::FormatError, meter::Meter};

/// Command prefix for data submission lines.
pub const PUT_COMMAND: &str = "put";

/// Encode a single meter without the command prefix or line terminator.
pub fn encode_line(meter: &Meter) -> String {
    let mut line = String::with_capacity(64);
    push_line(&mut line, meter);
    line
}

/// Encode a single meter as a terminated `put` command.
pub fn encode_put(meter: &Meter) -> String {
    let mut line = String::with_capacity(68);
    push_put(&mut line, meter);
    line
}

/// Encode a whole queue into one payload, ready for a single socket write.
pub fn encode_batch(meters: &[Meter]) -> Vec<u8> {
    let mut payload = String::with_capacity(meters.len() * 68);
    for meter in meters {
        push_put(&mut payload, meter);
    }
    payload.into_bytes()
}

fn push_put(buf: &mut String, meter: &Meter) {
    buf.push_str(PUT_COMMAND);
    buf.push(' ');
    push_line(buf, meter);
    buf.push('\n');
}

fn push_line(buf: &mut String, meter: &Meter) {
    // Writing into a String cannot fail.
    let _ = write!(buf, "{} {} {}", meter.metric(), meter.timestamp(), meter.value());
    for (key, value) in meter.tags() {
        let _ = write!(buf, " {key}={value}");
    }
}

/// A line decoded back into its parts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedLine {
    pub metric: String,
    pub timestamp: i64,
    /// Value text exactly as it appeared on the wire.
    pub value: String,
    pub tags: BTreeMap<String, String>,
}

/// Parse one line, with or without the `put` prefix and trailing newline.
pub fn parse_line(line: &str) -> Result<ParsedLine, FormatError> {
    let expected = "put <metric> <timestamp> <value> <tagk>=<tagv>[ ...]";
    let malformed = || FormatError::new(format!("{line:?}"), expected);
    let mut parts = line.trim_end_matches(['\r', '\n']).split(' ');
    let mut metric = parts.next().ok_or_else(malformed)?;
    if metric == PUT_COMMAND {
        metric = parts.next().ok_or_else(malformed)?;
    }
    let timestamp = parts
        .next()
        .and_then(|ts| ts.parse().ok())
        .ok_or_else(malformed)?;
    let value = parts.next().filter(|v| !v.is_empty()).ok_or_else(malformed)?;
    let mut tags = BTreeMap::new();
    for pair in parts {
        let (key, val) = pair.split_once('=').ok_or_else(malformed)?;
        if key.is_empty() || val.is_empty() {
            return Err(malformed());
        }
        tags.insert(key.to_owned(), val.to_owned());
    }
    if metric.is_empty() || tags.is_empty() {
        return Err(malformed());
    }
    Ok(ParsedLine {
        metric: metric.to_owned(),
        timestamp,
        value: value.to_owned(),
        tags,
    })
}
