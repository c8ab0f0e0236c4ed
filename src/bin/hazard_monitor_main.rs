// hazard_monitor_main.rs
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::{error, info, warn};

use v2i_hazard_bridge::communication::{
    AmqpWarningPublisher, CsvHazardLog, LogPublisher, WarningNotifier, WarningPublisher,
};
use v2i_hazard_bridge::config::{load_config, BridgeConfig};
use v2i_hazard_bridge::monitoring::{
    FanOutSink, HazardSink, LogSink, StepOutcome, TrafficHazardMonitor,
};
use v2i_hazard_bridge::shared_data::Position;
use v2i_hazard_bridge::traci::{Frame, InMemorySimulation, SimulationLink, TraciClient};

type BoxError = Box<dyn Error + Send + Sync>;

/// Consecutive failed ticks after which the link is considered lost.
const MAX_FAILED_STEPS: u32 = 3;

#[derive(Parser, Debug)]
#[command(name = "hazard_monitor", about = "V2I red-light hazard monitor for SUMO")]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// SUMO route file holding the default vehicle definition
    #[arg(long)]
    route_file: Option<PathBuf>,

    #[arg(long)]
    amqp_url: Option<String>,

    #[arg(long)]
    max_ticks: Option<u64>,

    /// CSV file receiving one row per hazard episode
    #[arg(long)]
    hazard_log: Option<PathBuf>,

    /// Log warnings instead of publishing them to RabbitMQ
    #[arg(long)]
    no_amqp: bool,

    /// Run a built-in scripted scenario instead of connecting to SUMO
    #[arg(long)]
    dry_run: bool,
}

impl Args {
    fn resolve(&self) -> Result<BridgeConfig, BoxError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => BridgeConfig::default(),
        };
        if let Some(host) = &self.host {
            config.sumo_host = host.clone();
        }
        if let Some(port) = self.port {
            config.sumo_port = port;
        }
        if let Some(route_file) = &self.route_file {
            config.route_file = Some(route_file.clone());
        }
        if let Some(url) = &self.amqp_url {
            config.amqp_url = url.clone();
        }
        if self.max_ticks.is_some() {
            config.max_ticks = self.max_ticks;
        }
        if let Some(path) = &self.hazard_log {
            config.hazard_log_csv = Some(path.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

/// A vehicle driving east towards a light at x = 100 that is red for 10 ticks, then green.
fn demo_scenario() -> InMemorySimulation {
    let mut frames = Vec::new();
    for tick in 1..=30u32 {
        let x = f64::from(tick) * 5.0;
        let state = if (tick / 10) % 2 == 0 { "rrrr" } else { "GGGG" };
        frames.push(
            Frame::new()
                .vehicle("car0", Position::new(x, 0.0))
                .signal("A1", state),
        );
    }
    frames.push(Frame::new().depart("car0"));

    InMemorySimulation::new()
        .with_vehicle("car0", Position::new(0.0, 0.0))
        .with_traffic_light("A1", "GGGG", Position::new(100.0, 0.0))
        .with_frames(frames)
}

fn build_sink(config: &BridgeConfig) -> Arc<dyn HazardSink> {
    let mut sink = FanOutSink::new().with(Arc::new(LogSink));
    if let Some(path) = &config.hazard_log_csv {
        sink = sink.with(Arc::new(CsvHazardLog::new(path)));
    }
    Arc::new(sink)
}

fn drive<L: SimulationLink, P: WarningPublisher>(
    link: L,
    publisher: P,
    config: &BridgeConfig,
) -> Result<u64, BoxError> {
    let mut monitor = TrafficHazardMonitor::new(link)
        .with_hazard_distance(config.hazard_distance)
        .with_reference(config.reference());
    let mut notifier = WarningNotifier::new(publisher).with_reference(config.reference());
    let sink = build_sink(config);

    if let Some(route_file) = &config.route_file {
        if monitor.load_default_vehicle_id(route_file).is_err() {
            warn!("Continuing without a default vehicle id");
        }
    }

    monitor.connect(&config.sumo_host, config.sumo_port)?;

    let mut published = 0u64;
    let mut failed_steps = 0u32;
    loop {
        if config.max_ticks.is_some_and(|max| monitor.tick() >= max) {
            info!("Reached {} ticks", monitor.tick());
            break;
        }
        if !monitor.is_simulation_active() {
            info!("Simulation finished after {} ticks", monitor.tick());
            break;
        }

        match monitor.advance_step_with_monitoring(&sink) {
            StepOutcome::StepFailed => {
                failed_steps += 1;
                if failed_steps >= MAX_FAILED_STEPS {
                    error!("Giving up after {} failed ticks", failed_steps);
                    break;
                }
                continue;
            }
            StepOutcome::HazardRaised(event) => {
                info!("Hazard episode started at tick {}", event.tick);
            }
            StepOutcome::HazardOngoing | StepOutcome::Clear => {}
        }
        failed_steps = 0;

        if notifier.notify_pending(&mut monitor).is_some() {
            published += 1;
        }
    }

    monitor.close();
    Ok(published)
}

fn run(args: Args) -> Result<u64, BoxError> {
    let config = args.resolve()?;

    if args.dry_run {
        info!("Dry run: scripted scenario, warnings are logged only");
        return drive(demo_scenario(), LogPublisher::default(), &config);
    }

    let link = TraciClient::with_read_timeout(config.read_timeout());
    if args.no_amqp {
        return drive(link, LogPublisher::default(), &config);
    }
    match AmqpWarningPublisher::open(&config.amqp_url, &config.warning_queue) {
        Ok(publisher) => drive(link, publisher, &config),
        Err(e) => {
            error!("RabbitMQ unavailable ({}); logging warnings instead", e);
            drive(link, LogPublisher::default(), &config)
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    match tokio::task::spawn_blocking(move || run(args)).await {
        Ok(Ok(published)) => info!("Published {} red light warnings", published),
        Ok(Err(e)) => {
            error!("Hazard monitor error: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            error!("Hazard monitor task failed: {}", e);
            std::process::exit(1);
        }
    }
}
