use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::global_variables::{
    METRIC_CAM_RECV, METRIC_CAM_SEND, METRIC_DENM_RCV, METRIC_TRIGGER_SEND,
};

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Which pair of log markers to match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkKind {
    /// Red-light triggers against DENMs received by the LDM.
    V2i,
    /// CAMs sent against CAMs received by the LDM.
    V2v,
}

impl LinkKind {
    pub fn send_marker(&self) -> &'static str {
        match self {
            LinkKind::V2i => METRIC_TRIGGER_SEND,
            LinkKind::V2v => METRIC_CAM_SEND,
        }
    }

    pub fn receive_marker(&self) -> &'static str {
        match self {
            LinkKind::V2i => METRIC_DENM_RCV,
            LinkKind::V2v => METRIC_CAM_RECV,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LinkKind::V2i => "V2I (DENM)",
            LinkKind::V2v => "V2V (CAM)",
        }
    }

    // V2I loggers put arbitrary text between the fields, V2V ones only whitespace.
    fn pattern(&self, marker: &str) -> Regex {
        let separator = match self {
            LinkKind::V2i => r"\D+",
            LinkKind::V2v => r"\s+",
        };
        let source = format!(
            "{}{sep}(\\d+){sep}(\\d+)",
            regex::escape(marker),
            sep = separator
        );
        Regex::new(&source).expect("metric pattern is valid")
    }

    pub fn send_pattern(&self) -> Regex {
        self.pattern(self.send_marker())
    }

    pub fn receive_pattern(&self) -> Regex {
        self.pattern(self.receive_marker())
    }
}

/// One `(message id, timestamp ms)` pair found in a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub message_id: u64,
    pub timestamp_ms: i64,
}

/// Extracts every record matching `pattern`, in file order.
///
/// Lines whose numbers do not fit the record types are skipped.
pub fn parse_metric_lines<R: BufRead>(reader: R, pattern: &Regex) -> std::io::Result<Vec<MetricRecord>> {
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if let Some(caps) = pattern.captures(&line) {
            if let (Ok(message_id), Ok(timestamp_ms)) = (caps[1].parse(), caps[2].parse()) {
                records.push(MetricRecord {
                    message_id,
                    timestamp_ms,
                });
            }
        }
    }
    Ok(records)
}

pub fn parse_metric_file<P: AsRef<Path>>(path: P, pattern: &Regex) -> Result<Vec<MetricRecord>, MetricsError> {
    let path = path.as_ref();
    let io_error = |source| MetricsError::Io {
        path: path.display().to_string(),
        source,
    };
    let file = File::open(path).map_err(io_error)?;
    parse_metric_lines(BufReader::new(file), pattern).map_err(io_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn v2i_accepts_any_non_digit_separator() {
        let log = "\
[info] gps: METRIC_TRIGGER_SEND id=12 t=1700000000123
noise line 5 6
[info] gps: METRIC_TRIGGER_SEND 13 1700000000456
";
        let records = parse_metric_lines(Cursor::new(log), &LinkKind::V2i.send_pattern()).unwrap();
        assert_eq!(
            records,
            vec![
                MetricRecord {
                    message_id: 12,
                    timestamp_ms: 1_700_000_000_123
                },
                MetricRecord {
                    message_id: 13,
                    timestamp_ms: 1_700_000_000_456
                },
            ]
        );
    }

    #[test]
    fn v2v_requires_whitespace_separators() {
        let log = "METRIC_CAM_SEND 1 100\nMETRIC_CAM_SEND id=2 t=200\n";
        let records = parse_metric_lines(Cursor::new(log), &LinkKind::V2v.send_pattern()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].message_id, 1);
    }

    #[test]
    fn receive_marker_does_not_match_send_lines() {
        let log = "METRIC_TRIGGER_SEND 1 100\nMETRIC_DENM_RCV 1 140\n";
        let records = parse_metric_lines(Cursor::new(log), &LinkKind::V2i.receive_pattern()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].timestamp_ms, 140);
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = parse_metric_file("/no/such/gps.log", &LinkKind::V2i.send_pattern()).unwrap_err();
        assert!(err.to_string().contains("/no/such/gps.log"));
    }
}
