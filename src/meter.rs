//! Data points accepted by the database.
//!
//! A [`Meter`] can only be built through validating constructors, so every
//! value that reaches the send queue is already encodable.

use std::{collections::BTreeMap, fmt};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::FormatError;

const FIELDS: [&str; 4] = ["metric", "timestamp", "value", "tags"];

/// Numeric payload of a meter.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MeterValue {
    Integer(i64),
    Float(f64),
    /// A numeric literal kept verbatim, e.g. `"4.2e3"`.
    Text(String),
}

impl MeterValue {
    fn validate(&self) -> Result<(), FormatError> {
        match self {
            Self::Integer(_) => Ok(()),
            Self::Float(v) if v.is_finite() => Ok(()),
            Self::Float(v) => Err(FormatError::new(v.to_string(), "a finite number")),
            Self::Text(text) => {
                let trimmed = text.trim();
                let numeric = trimmed.parse::<f64>().is_ok_and(f64::is_finite);
                if trimmed.is_empty() || trimmed != text || !numeric {
                    Err(FormatError::new(format!("{text:?}"), "a numeric value"))
                } else {
                    Ok(())
                }
            }
        }
    }
}

impl fmt::Display for MeterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

macro_rules! integer_value {
    ($($ty:ty),*) => {
        $(impl From<$ty> for MeterValue {
            fn from(value: $ty) -> Self {
                Self::Integer(i64::from(value))
            }
        })*
    };
}

integer_value!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for MeterValue {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<f64> for MeterValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for MeterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for MeterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// One time-series data point.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Meter {
    metric: String,
    timestamp: i64,
    value: MeterValue,
    tags: BTreeMap<String, String>,
}

impl Meter {
    /// Build a meter, validating every field.
    pub fn new<K, V>(
        metric: impl Into<String>,
        timestamp: i64,
        value: impl Into<MeterValue>,
        tags: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self, FormatError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let metric = metric.into();
        check_token(&metric, "metric name")?;
        if timestamp < 0 {
            return Err(FormatError::new(
                timestamp.to_string(),
                "a non-negative epoch timestamp",
            ));
        }
        let value = value.into();
        value.validate()?;
        let tags: BTreeMap<String, String> = tags
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        if tags.is_empty() {
            return Err(FormatError::new("{}", "at least one tag pair"));
        }
        for (key, val) in &tags {
            check_token(key, "tag key")?;
            if key.contains('=') {
                return Err(FormatError::new(format!("{key:?}"), "a tag key without '='"));
            }
            check_token(val, "tag value")?;
        }
        Ok(Self {
            metric,
            timestamp,
            value,
            tags,
        })
    }

    /// Build a meter stamped with the current wall-clock second.
    pub fn now<K, V>(
        metric: impl Into<String>,
        value: impl Into<MeterValue>,
        tags: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self, FormatError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::new(metric, chrono::Utc::now().timestamp(), value, tags)
    }

    /// Convert a JSON object, or an array of objects, into meters.
    ///
    /// Every record must carry exactly `metric`, `timestamp`, `value` and
    /// `tags`. Validation stops at the first bad record.
    pub fn from_json(value: &Value) -> Result<Vec<Self>, FormatError> {
        match value {
            Value::Array(records) => records.iter().map(Self::from_record).collect(),
            other => Self::from_record(other).map(|meter| vec![meter]),
        }
    }

    fn from_record(record: &Value) -> Result<Self, FormatError> {
        let shape_err = || FormatError::shape(record.to_string());
        let map = record.as_object().ok_or_else(shape_err)?;
        if map.len() != FIELDS.len() || !FIELDS.iter().all(|field| map.contains_key(*field)) {
            return Err(shape_err());
        }
        let metric = map["metric"]
            .as_str()
            .ok_or_else(|| FormatError::new(map["metric"].to_string(), "a metric name string"))?;
        let timestamp = json_timestamp(&map["timestamp"])?;
        let value = json_value(&map["value"])?;
        let tags = json_tags(&map["tags"])?;
        Self::new(metric, timestamp, value, tags)
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn value(&self) -> &MeterValue {
        &self.value
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }
}

fn check_token(token: &str, what: &str) -> Result<(), FormatError> {
    if token.is_empty() || token.chars().any(char::is_whitespace) {
        return Err(FormatError::new(
            format!("{token:?}"),
            format!("a non-empty {what} without whitespace"),
        ));
    }
    Ok(())
}

// `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive.
const I64_RANGE: std::ops::Range<f64> = i64::MIN as f64..i64::MAX as f64;

fn json_timestamp(raw: &Value) -> Result<i64, FormatError> {
    let err = || FormatError::new(raw.to_string(), "an integer epoch timestamp");
    match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .map(f64::trunc)
                    .filter(|f| I64_RANGE.contains(f))
                    .map(|f| f as i64)
            })
            .ok_or_else(err),
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse().map_err(|_| err())
        }
        _ => Err(err()),
    }
}

fn json_value(raw: &Value) -> Result<MeterValue, FormatError> {
    match raw {
        Value::Number(n) => Ok(match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => MeterValue::Integer(i),
            (None, Some(f)) if n.is_f64() => MeterValue::Float(f),
            _ => MeterValue::Text(n.to_string()),
        }),
        Value::String(s) => Ok(MeterValue::Text(s.clone())),
        other => Err(FormatError::new(other.to_string(), "a numeric value")),
    }
}

fn json_tags(raw: &Value) -> Result<Vec<(String, String)>, FormatError> {
    let map: &Map<String, Value> = raw
        .as_object()
        .ok_or_else(|| FormatError::new(raw.to_string(), "a map of tag pairs"))?;
    map.iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key.clone(), s.clone())),
            Value::Number(n) => Ok((key.clone(), n.to_string())),
            other => Err(FormatError::new(
                other.to_string(),
                format!("a string value for tag {key:?}"),
            )),
        })
        .collect()
}
