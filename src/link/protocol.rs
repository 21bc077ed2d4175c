// Line protocol decoder
//
// The device streams newline-separated text. Each line is either a control
// marker (STATUS:, BUFFER:FULL, DATA:START, DATA:END) or waveform samples,
// one integer per line or several comma-separated on one line.
//
// Control markers are matched before the numeric fallback so that a marker
// can never be read as data.

use serde::{Deserialize, Serialize};

const STATUS_PREFIX: &str = "STATUS:";
const BUFFER_FULL: &str = "BUFFER:FULL";
const DATA_START: &str = "DATA:START";
const DATA_END: &str = "DATA:END";

/// One decoded protocol line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    /// Informational status text following `STATUS:`
    StatusUpdate(String),
    /// Device receive buffer is full; flush the in-flight capture
    BufferFull,
    /// A new capture begins; discard the in-flight capture
    DataStart,
    /// Capture complete; flush the in-flight capture
    DataEnd,
    /// Waveform samples carried by one line
    SampleBatch(Vec<i32>),
    /// Line matched no known grammar
    Unrecognized(String),
}

/// Handling of CSV fields that are not valid integers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldPolicy {
    /// Unparseable fields become 0 and the rest of the batch is kept
    #[default]
    ZeroFill,
    /// Any unparseable field turns the whole line into `Unrecognized`
    DropBatch,
}

/// Stateless line classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtocolDecoder {
    field_policy: FieldPolicy,
}

impl ProtocolDecoder {
    pub fn new(field_policy: FieldPolicy) -> Self {
        Self { field_policy }
    }

    /// Classify a single line. Returns `None` for blank lines.
    pub fn decode_line(&self, line: &str) -> Option<ProtocolEvent> {
        let line = line.trim_end_matches(['\r', '\n']);
        let trimmed = line.trim();

        if trimmed.is_empty() {
            return None;
        }

        if let Some(status) = line.strip_prefix(STATUS_PREFIX) {
            return Some(ProtocolEvent::StatusUpdate(status.to_string()));
        }

        let event = match trimmed {
            BUFFER_FULL => ProtocolEvent::BufferFull,
            DATA_START => ProtocolEvent::DataStart,
            DATA_END => ProtocolEvent::DataEnd,
            _ if trimmed.contains(',') => self.decode_csv(line),
            _ => match trimmed.parse::<i32>() {
                Ok(value) => ProtocolEvent::SampleBatch(vec![value]),
                Err(_) => ProtocolEvent::Unrecognized(line.to_string()),
            },
        };

        Some(event)
    }

    /// Decode a text payload that may hold several newline-separated lines
    pub fn decode_payload(&self, payload: &str) -> Vec<ProtocolEvent> {
        payload
            .split('\n')
            .filter_map(|line| self.decode_line(line))
            .collect()
    }

    fn decode_csv(&self, line: &str) -> ProtocolEvent {
        let mut values = Vec::new();

        for field in line.split(',') {
            match field.trim().parse::<i32>() {
                Ok(value) => values.push(value),
                Err(_) => match self.field_policy {
                    FieldPolicy::ZeroFill => values.push(0),
                    FieldPolicy::DropBatch => return ProtocolEvent::Unrecognized(line.to_string()),
                },
            }
        }

        ProtocolEvent::SampleBatch(values)
    }
}

/// Classify one line with the default (zero-fill) field policy
pub fn decode_line(line: &str) -> Option<ProtocolEvent> {
    ProtocolDecoder::default().decode_line(line)
}

/// Splits an arbitrary byte stream into lines
///
/// Bytes after the last `\n` are held until a later chunk completes the
/// line. A trailing `\r` is stripped from every emitted line.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: Vec<u8>,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(1024),
        }
    }

    /// Feed a chunk and collect every line it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();

        for &byte in chunk {
            if byte == b'\n' {
                if self.buffer.last() == Some(&b'\r') {
                    self.buffer.pop();
                }
                lines.push(String::from_utf8_lossy(&self.buffer).into_owned());
                self.buffer.clear();
            } else {
                self.buffer.push(byte);
            }
        }

        lines
    }

    /// Number of buffered bytes belonging to an incomplete line
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_keeps_exact_suffix() {
        assert_eq!(
            decode_line("STATUS:MEASURING"),
            Some(ProtocolEvent::StatusUpdate("MEASURING".to_string()))
        );
        assert_eq!(
            decode_line("STATUS:12,34"),
            Some(ProtocolEvent::StatusUpdate("12,34".to_string()))
        );
        assert_eq!(
            decode_line("STATUS:42"),
            Some(ProtocolEvent::StatusUpdate("42".to_string()))
        );
        assert_eq!(
            decode_line("STATUS: battery 80% "),
            Some(ProtocolEvent::StatusUpdate(" battery 80% ".to_string()))
        );
        assert_eq!(
            decode_line("STATUS:"),
            Some(ProtocolEvent::StatusUpdate(String::new()))
        );
    }

    #[test]
    fn test_control_markers() {
        assert_eq!(decode_line("BUFFER:FULL"), Some(ProtocolEvent::BufferFull));
        assert_eq!(decode_line("DATA:START"), Some(ProtocolEvent::DataStart));
        assert_eq!(decode_line("DATA:END"), Some(ProtocolEvent::DataEnd));
        assert_eq!(decode_line("DATA:END\r"), Some(ProtocolEvent::DataEnd));
        assert_eq!(
            decode_line("DATA:ENDED"),
            Some(ProtocolEvent::Unrecognized("DATA:ENDED".to_string()))
        );
    }

    #[test]
    fn test_sample_lines() {
        assert_eq!(
            decode_line("12,45,-3"),
            Some(ProtocolEvent::SampleBatch(vec![12, 45, -3]))
        );
        assert_eq!(
            decode_line(" 1 , 2 ,3 "),
            Some(ProtocolEvent::SampleBatch(vec![1, 2, 3]))
        );
        assert_eq!(decode_line("7"), Some(ProtocolEvent::SampleBatch(vec![7])));
        assert_eq!(decode_line("-2048"), Some(ProtocolEvent::SampleBatch(vec![-2048])));
    }

    #[test]
    fn test_blank_lines_yield_nothing() {
        assert_eq!(decode_line(""), None);
        assert_eq!(decode_line("   "), None);
        assert_eq!(decode_line("\r"), None);
        assert_eq!(decode_line("\t\n"), None);
    }

    #[test]
    fn test_csv_zero_fill() {
        assert_eq!(
            decode_line("10,abc,30"),
            Some(ProtocolEvent::SampleBatch(vec![10, 0, 30]))
        );
        assert_eq!(decode_line("5,"), Some(ProtocolEvent::SampleBatch(vec![5, 0])));
    }

    #[test]
    fn test_csv_drop_batch() {
        let decoder = ProtocolDecoder::new(FieldPolicy::DropBatch);
        assert_eq!(
            decoder.decode_line("10,abc,30"),
            Some(ProtocolEvent::Unrecognized("10,abc,30".to_string()))
        );
        assert_eq!(
            decoder.decode_line("10,20,30"),
            Some(ProtocolEvent::SampleBatch(vec![10, 20, 30]))
        );
    }

    #[test]
    fn test_unrecognized() {
        assert_eq!(
            decode_line("hello"),
            Some(ProtocolEvent::Unrecognized("hello".to_string()))
        );
        assert_eq!(
            decode_line("3.14"),
            Some(ProtocolEvent::Unrecognized("3.14".to_string()))
        );
    }

    #[test]
    fn test_payload_with_several_lines() {
        let decoder = ProtocolDecoder::default();
        let events = decoder.decode_payload("DATA:START\n1,2\r\n\n3\nDATA:END");
        assert_eq!(
            events,
            vec![
                ProtocolEvent::DataStart,
                ProtocolEvent::SampleBatch(vec![1, 2]),
                ProtocolEvent::SampleBatch(vec![3]),
                ProtocolEvent::DataEnd,
            ]
        );
    }

    #[test]
    fn test_splitter_holds_partial_line() {
        let mut splitter = LineSplitter::new();

        assert!(splitter.push(b"DATA:ST").is_empty());
        assert_eq!(splitter.pending(), 7);

        let lines = splitter.push(b"ART\r\n100,1");
        assert_eq!(lines, vec!["DATA:START".to_string()]);
        assert_eq!(splitter.pending(), 5);

        let lines = splitter.push(b"01\n7\n");
        assert_eq!(lines, vec!["100,101".to_string(), "7".to_string()]);
        assert_eq!(splitter.pending(), 0);
    }

    #[test]
    fn test_splitter_reset_discards_partial() {
        let mut splitter = LineSplitter::new();
        splitter.push(b"12,3");
        splitter.reset();
        assert_eq!(splitter.push(b"4\n"), vec!["4".to_string()]);
    }
}
