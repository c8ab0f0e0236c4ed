// delivery_report_main.rs
use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use v2i_hazard_bridge::communication::read_hazard_log;
use v2i_hazard_bridge::delivery_metrics::{analyze, parse_metric_file, LinkKind};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Kind {
    V2i,
    V2v,
}

impl From<Kind> for LinkKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::V2i => LinkKind::V2i,
            Kind::V2v => LinkKind::V2v,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "delivery_report",
    about = "Packet delivery ratio and latency from sender/receiver logs"
)]
struct Args {
    /// Sender log (GPS trigger log for V2I, CAM log for V2V)
    send_log: PathBuf,

    /// Receiver (LDM) log
    receive_log: PathBuf,

    #[arg(long, value_enum, default_value_t = Kind::V2i)]
    kind: Kind,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Hazard CSV written by the monitor, summarized after the report
    #[arg(long)]
    hazards: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();
    let kind = LinkKind::from(args.kind);

    let sent = parse_metric_file(&args.send_log, &kind.send_pattern())?;
    let received = parse_metric_file(&args.receive_log, &kind.receive_pattern())?;
    let report = analyze(kind, &sent, &received);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }

    if let Some(path) = &args.hazards {
        let records = read_hazard_log(path)?;
        println!("Hazard episodes logged: {}", records.len());
        for record in &records {
            println!(
                "  tick {:>6}  {} -> {} ({}) {:.1} m",
                record.tick,
                record.vehicle_id,
                record.traffic_light_id,
                record.signal_state,
                record.distance
            );
        }
    }
    Ok(())
}
