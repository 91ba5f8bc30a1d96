//! Input decoders.
//!
//! A [`Decoder`] turns a byte stream into a sequence of [`Event`]s. The
//! scanner pulls one event at a time, so a decoder never has to buffer more
//! than the record it is currently parsing.
//!
//! # JSON lines format
//!
//! [`JsonlDecoder`] reads one JSON object per line:
//!
//! ```text
//! {"measurement":"cpu","timestamp":1451606400000000000,"tags":[["hostname","host_0"]],"fields":[["usage_user",58]]}
//! ```
//!
//! Tags and fields are arrays of pairs so their order survives decoding.
//! Blank lines are skipped.

use crate::error::{Error, Result};
use crate::event::{Event, Point};
use std::io::BufRead;

/// A source of decoded events.
pub trait Decoder {
    /// Concrete event type yielded by this decoder.
    type Event: Event;

    /// Decode the next event.
    ///
    /// Returns `Ok(None)` at end of input. A malformed record is an error;
    /// there is no skip-and-continue mode.
    fn next_event(&mut self) -> Result<Option<Self::Event>>;
}

/// Decoder for newline-delimited JSON points.
pub struct JsonlDecoder<R> {
    reader: R,
    line: String,
    line_number: u64,
    bytes_read: u64,
}

impl<R: BufRead> JsonlDecoder<R> {
    /// Create a decoder over a buffered reader.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::with_capacity(512),
            line_number: 0,
            bytes_read: 0,
        }
    }

    /// Number of lines consumed so far (including blank lines).
    pub fn lines_read(&self) -> u64 {
        self.line_number
    }

    /// Number of raw bytes consumed so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}

impl<R: BufRead> Decoder for JsonlDecoder<R> {
    type Event = Point;

    fn next_event(&mut self) -> Result<Option<Point>> {
        loop {
            self.line.clear();
            let n = self.reader.read_line(&mut self.line)?;
            if n == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            self.bytes_read += n as u64;

            let trimmed = self.line.trim();
            if trimmed.is_empty() {
                continue;
            }

            return serde_json::from_str::<Point>(trimmed)
                .map(Some)
                .map_err(|e| Error::Decode {
                    line: self.line_number,
                    reason: e.to_string(),
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::FieldValue;
    use std::fs::File;
    use std::io::{BufReader, Cursor, Write};
    use tempfile::TempDir;

    fn decode_all<D: Decoder>(decoder: &mut D) -> Result<Vec<D::Event>> {
        let mut events = Vec::new();
        while let Some(event) = decoder.next_event()? {
            events.push(event);
        }
        Ok(events)
    }

    #[test]
    fn test_decode_single_line() {
        let input = r#"{"measurement":"cpu","timestamp":10,"tags":[["hostname","host_0"]],"fields":[["usage_user",58],["usage_idle",1.5]]}"#;
        let mut decoder = JsonlDecoder::new(Cursor::new(input));

        let point = decoder.next_event().unwrap().unwrap();
        assert_eq!(point.measurement, "cpu");
        assert_eq!(point.timestamp, 10);
        assert_eq!(point.tags, vec![("hostname".into(), "host_0".into())]);
        assert_eq!(point.fields[0].1, FieldValue::Int(58));
        assert_eq!(point.fields[1].1, FieldValue::Float(1.5));

        assert!(decoder.next_event().unwrap().is_none());
        assert_eq!(decoder.lines_read(), 1);
    }

    #[test]
    fn test_decode_skips_blank_lines() {
        let input = "\n{\"measurement\":\"mem\",\"timestamp\":1}\n   \n{\"measurement\":\"mem\",\"timestamp\":2}\n";
        let mut decoder = JsonlDecoder::new(Cursor::new(input));

        let events = decode_all(&mut decoder).unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].fields.is_empty());
        assert!(events[0].tags.is_empty());
        assert_eq!(events[1].timestamp, 2);
        assert_eq!(decoder.lines_read(), 4);
        assert_eq!(decoder.bytes_read(), input.len() as u64);
    }

    #[test]
    fn test_decode_error_reports_line() {
        let input = "{\"measurement\":\"cpu\",\"timestamp\":1}\n{\"measurement\":\"cpu\"}\n";
        let mut decoder = JsonlDecoder::new(Cursor::new(input));

        assert!(decoder.next_event().unwrap().is_some());
        let err = decoder.next_event().unwrap_err();
        match err {
            Error::Decode { line, reason } => {
                assert_eq!(line, 2);
                assert!(reason.contains("timestamp"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_empty_input() {
        let mut decoder = JsonlDecoder::new(Cursor::new(""));
        assert!(decoder.next_event().unwrap().is_none());
        assert_eq!(decoder.bytes_read(), 0);
    }

    #[test]
    fn test_decode_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("points.jsonl");
        let mut file = File::create(&path).unwrap();
        for i in 0..25 {
            writeln!(
                file,
                r#"{{"measurement":"disk","timestamp":{i},"fields":[["free",{i}]]}}"#
            )
            .unwrap();
        }
        drop(file);

        let mut decoder = JsonlDecoder::new(BufReader::new(File::open(&path).unwrap()));
        let events = decode_all(&mut decoder).unwrap();
        assert_eq!(events.len(), 25);
        assert_eq!(events[24].fields[0].1, FieldValue::Int(24));
    }
}
