//! Per-event storage document.

use crate::event::{Event, FieldValue};
use serde::Serialize;
use std::collections::HashMap;

/// The record written to the backing store for each event.
///
/// Documents are recycled through a pool, so a freshly acquired document may
/// still hold the previous event's data. [`overwrite_from`](Self::overwrite_from)
/// replaces every field; the maps are cleared rather than merged so no stale
/// key survives reuse.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Document {
    pub measurement: String,

    #[serde(rename = "timestamp_ns")]
    pub timestamp: i64,

    pub fields: HashMap<String, FieldValue>,

    pub tags: HashMap<String, String>,
}

impl Document {
    /// Replace the contents of this document with `event`.
    ///
    /// Keeps the existing string and map allocations. Returns the number of
    /// field values copied.
    pub fn overwrite_from<E: Event + ?Sized>(&mut self, event: &E) -> usize {
        self.measurement.clear();
        self.measurement.push_str(event.measurement());
        self.timestamp = event.timestamp();

        self.fields.clear();
        let fields_len = event.fields_len();
        for i in 0..fields_len {
            let (key, value) = event.field(i);
            self.fields.insert(key.to_string(), value.clone());
        }

        self.tags.clear();
        for i in 0..event.tags_len() {
            let (key, value) = event.tag(i);
            self.tags.insert(key.to_string(), value.to_string());
        }

        fields_len
    }
}
