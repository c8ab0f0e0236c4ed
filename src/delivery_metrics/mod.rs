// delivery_metrics/mod.rs
pub mod parser;
pub mod report;

pub use parser::{parse_metric_file, parse_metric_lines, LinkKind, MetricRecord, MetricsError};
pub use report::{analyze, DeliveryReport, Summary};
