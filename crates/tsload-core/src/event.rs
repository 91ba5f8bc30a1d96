//! Input event model.
//!
//! The pipeline never assumes a particular in-memory representation of a
//! decoded record. It reads events through the [`Event`] trait, which exposes
//! index-based accessors for fields and tags so a decoder can hand out views
//! over its own buffers. [`Point`] is the owned representation produced by
//! [`JsonlDecoder`](crate::JsonlDecoder).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A dynamically typed scalar field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(v) => f.write_str(v),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

/// A decoded time-series event.
///
/// Implementations are immutable from the pipeline's point of view. Indices
/// passed to [`field`](Event::field) and [`tag`](Event::tag) are always in
/// `0..fields_len()` and `0..tags_len()` respectively.
pub trait Event: Send + 'static {
    /// Measurement (series) name.
    fn measurement(&self) -> &str;

    /// Timestamp in nanoseconds since the Unix epoch.
    fn timestamp(&self) -> i64;

    /// Number of field pairs.
    fn fields_len(&self) -> usize;

    /// The `i`-th field pair.
    fn field(&self, i: usize) -> (&str, &FieldValue);

    /// Number of tag pairs.
    fn tags_len(&self) -> usize;

    /// The `i`-th tag pair.
    fn tag(&self, i: usize) -> (&str, &str);
}

/// Owned event as read from a JSON line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub measurement: String,

    /// Nanoseconds since the Unix epoch.
    pub timestamp: i64,

    #[serde(default)]
    pub tags: Vec<(String, String)>,

    #[serde(default)]
    pub fields: Vec<(String, FieldValue)>,
}

impl Point {
    /// Create a point with no tags or fields.
    pub fn new(measurement: impl Into<String>, timestamp: i64) -> Self {
        Self {
            measurement: measurement.into(),
            timestamp,
            tags: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Append a tag pair.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }

    /// Append a field pair.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }
}

impl Event for Point {
    fn measurement(&self) -> &str {
        &self.measurement
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn fields_len(&self) -> usize {
        self.fields.len()
    }

    fn field(&self, i: usize) -> (&str, &FieldValue) {
        let (key, value) = &self.fields[i];
        (key, value)
    }

    fn tags_len(&self) -> usize {
        self.tags.len()
    }

    fn tag(&self, i: usize) -> (&str, &str) {
        let (key, value) = &self.tags[i];
        (key, value)
    }
}
