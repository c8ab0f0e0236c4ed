use std::collections::{BTreeSet, HashMap};
use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::delivery_metrics::parser::{LinkKind, MetricRecord};

/// Mean/min/max of a series of millisecond values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub mean: f64,
    pub min: i64,
    pub max: i64,
}

impl Summary {
    pub fn of(values: &[i64]) -> Option<Self> {
        let min = *values.iter().min()?;
        let max = *values.iter().max()?;
        let mean = values.iter().sum::<i64>() as f64 / values.len() as f64;
        Some(Self { mean, min, max })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub kind: LinkKind,
    /// Send records, duplicates included.
    pub sent: usize,
    /// Receive records, duplicates included.
    pub received_raw: usize,
    /// Sends whose id was received with a non-negative latency.
    pub matched: usize,
    /// Ids never received, in send order.
    pub lost: Vec<u64>,
    /// Ids received but never sent.
    pub extra: Vec<u64>,
    /// Ids received more than once.
    pub duplicates: Vec<u64>,
    /// Ids skipped because they were received before being sent.
    pub negative_latency: Vec<u64>,
    pub pdr_percent: f64,
    pub latency: Option<Summary>,
    pub send_interval: Option<Summary>,
}

/// Pairs send and receive records by message id.
///
/// The last record seen for an id wins on both sides. Packet delivery ratio
/// is matched sends over all sends.
pub fn analyze(kind: LinkKind, sent: &[MetricRecord], received: &[MetricRecord]) -> DeliveryReport {
    let mut send_times: HashMap<u64, i64> = HashMap::new();
    for record in sent {
        send_times.insert(record.message_id, record.timestamp_ms);
    }

    let mut recv_times: HashMap<u64, i64> = HashMap::new();
    let mut recv_counts: HashMap<u64, usize> = HashMap::new();
    for record in received {
        recv_times.insert(record.message_id, record.timestamp_ms);
        *recv_counts.entry(record.message_id).or_insert(0) += 1;
    }

    let mut latencies = Vec::new();
    let mut lost = Vec::new();
    let mut negative_latency = Vec::new();
    for record in sent {
        let id = record.message_id;
        match (send_times.get(&id), recv_times.get(&id)) {
            (Some(&t_send), Some(&t_recv)) => {
                let latency = t_recv - t_send;
                if latency >= 0 {
                    latencies.push(latency);
                } else {
                    warn!("Ignoring negative latency for message {}", id);
                    negative_latency.push(id);
                }
            }
            _ => lost.push(id),
        }
    }

    let extra: Vec<u64> = recv_times
        .keys()
        .filter(|id| !send_times.contains_key(id))
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let duplicates: Vec<u64> = recv_counts
        .iter()
        .filter(|(_, &count)| count > 1)
        .map(|(&id, _)| id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut by_send_time: Vec<(u64, i64)> = send_times.into_iter().collect();
    by_send_time.sort_by_key(|&(id, t)| (t, id));
    let intervals: Vec<i64> = by_send_time
        .windows(2)
        .map(|pair| pair[1].1 - pair[0].1)
        .filter(|&dt| dt > 0)
        .collect();

    let pdr_percent = if sent.is_empty() {
        0.0
    } else {
        latencies.len() as f64 / sent.len() as f64 * 100.0
    };

    DeliveryReport {
        kind,
        sent: sent.len(),
        received_raw: received.len(),
        matched: latencies.len(),
        lost,
        extra,
        duplicates,
        negative_latency,
        pdr_percent,
        latency: Summary::of(&latencies),
        send_interval: Summary::of(&intervals),
    }
}

fn write_summary(f: &mut fmt::Formatter<'_>, label: &str, summary: &Option<Summary>) -> fmt::Result {
    match summary {
        Some(s) => {
            writeln!(f, "{} mean:  {:.2} ms", label, s.mean)?;
            writeln!(f, "{} min:   {} ms", label, s.min)?;
            writeln!(f, "{} max:   {} ms", label, s.max)
        }
        None => writeln!(f, "{}: no valid samples", label),
    }
}

impl fmt::Display for DeliveryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "===== {} DELIVERY REPORT =====", self.kind.label())?;
        writeln!(f)?;
        writeln!(f, "Sent:                 {}", self.sent)?;
        writeln!(f, "Received (raw):       {}", self.received_raw)?;
        writeln!(f, "Matched:              {}", self.matched)?;
        writeln!(f, "Unmatched received:   {}", self.extra.len())?;
        writeln!(f, "Lost:                 {}", self.lost.len())?;
        writeln!(f, "Duplicated ids:       {}", self.duplicates.len())?;
        writeln!(f, "PDR:                  {:.2}%", self.pdr_percent)?;
        writeln!(f)?;
        write_summary(f, "Latency", &self.latency)?;
        if self.kind == LinkKind::V2v {
            write_summary(f, "Send interval", &self.send_interval)?;
        }
        writeln!(f)?;
        writeln!(f, "Lost ids:       {:?}", self.lost)?;
        writeln!(f, "Unmatched ids:  {:?}", self.extra)?;
        writeln!(f, "Duplicated ids: {:?}", self.duplicates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(pairs: &[(u64, i64)]) -> Vec<MetricRecord> {
        pairs
            .iter()
            .map(|&(message_id, timestamp_ms)| MetricRecord {
                message_id,
                timestamp_ms,
            })
            .collect()
    }

    #[test]
    fn pairs_sends_with_receipts() {
        let sent = records(&[(1, 100), (2, 200), (3, 300), (4, 400)]);
        let received = records(&[(1, 130), (2, 190), (2, 260), (4, 410), (9, 999)]);
        let report = analyze(LinkKind::V2i, &sent, &received);

        assert_eq!(report.sent, 4);
        assert_eq!(report.received_raw, 5);
        // id 2: last receipt (260) wins, latency 60.
        assert_eq!(report.matched, 3);
        assert_eq!(report.lost, vec![3]);
        assert_eq!(report.extra, vec![9]);
        assert_eq!(report.duplicates, vec![2]);
        assert!(report.negative_latency.is_empty());
        assert!((report.pdr_percent - 75.0).abs() < 1e-9);

        let latency = report.latency.unwrap();
        assert_eq!(latency.min, 10);
        assert_eq!(latency.max, 60);
        assert!((latency.mean - (30.0 + 60.0 + 10.0) / 3.0).abs() < 1e-9);
    }

    #[test]
    fn negative_latency_is_neither_matched_nor_lost() {
        let sent = records(&[(1, 500)]);
        let received = records(&[(1, 400)]);
        let report = analyze(LinkKind::V2i, &sent, &received);
        assert_eq!(report.matched, 0);
        assert!(report.lost.is_empty());
        assert_eq!(report.negative_latency, vec![1]);
        assert_eq!(report.latency, None);
    }

    #[test]
    fn nothing_sent_means_zero_pdr() {
        let report = analyze(LinkKind::V2v, &[], &records(&[(1, 1)]));
        assert_eq!(report.pdr_percent, 0.0);
        assert_eq!(report.extra, vec![1]);
    }

    #[test]
    fn send_intervals_follow_send_time_order() {
        let sent = records(&[(3, 300), (1, 100), (2, 100), (4, 450)]);
        let report = analyze(LinkKind::V2v, &sent, &[]);
        // Sorted: 100, 100, 300, 450 -> gaps 0 (dropped), 200, 150.
        let interval = report.send_interval.unwrap();
        assert_eq!(interval.min, 150);
        assert_eq!(interval.max, 200);
        assert_eq!(report.lost, vec![3, 1, 2, 4]);
    }

    #[test]
    fn report_renders_key_figures() {
        let sent = records(&[(1, 100)]);
        let received = records(&[(1, 120)]);
        let text = analyze(LinkKind::V2i, &sent, &received).to_string();
        assert!(text.contains("V2I (DENM)"));
        assert!(text.contains("PDR:                  100.00%"));
        assert!(text.contains("Latency mean:  20.00 ms"));
        assert!(!text.contains("Send interval"));
    }
}
