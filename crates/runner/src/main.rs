use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use fxpilot_clock::SystemClock;
use fxpilot_core::{MarketEvent, RegimeLabel};
use fxpilot_gateway::{LogNotifier, PaperBroker, StaticAdvisory, read_events};
use fxpilot_runner::{Collaborators, PipelineConfig, build, load_config, load_default_config};
use log::{error, info, warn};
use tokio::io::BufReader;
use tokio::sync::{mpsc, watch};

#[derive(Parser, Debug)]
#[command(name = "fxpilot", about = "FX trading-decision pipeline (paper execution)")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run against newline-delimited JSON market events on stdin
    Run {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Regime the stand-in advisory reports for every instrument
        #[arg(long, value_enum, default_value_t = RegimeArg::Unknown)]
        regime: RegimeArg,
        /// Write the decision trail here on shutdown
        #[arg(long)]
        audit: Option<PathBuf>,
    },
    /// Validate a configuration file and print the effective config
    Check {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum RegimeArg {
    Trending,
    Ranging,
    Unknown,
}

impl From<RegimeArg> for RegimeLabel {
    fn from(arg: RegimeArg) -> Self {
        match arg {
            RegimeArg::Trending => RegimeLabel::Trending,
            RegimeArg::Ranging => RegimeLabel::Ranging,
            RegimeArg::Unknown => RegimeLabel::Unknown,
        }
    }
}

fn read_config(path: Option<PathBuf>) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(path) => load_config(path)?,
        None => load_default_config()?,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Cli::parse().command {
        Command::Check { config } => {
            let config = read_config(config)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Command::Run { config, regime, audit } => run(read_config(config)?, regime.into(), audit).await,
    }
}

async fn run(
    config: PipelineConfig,
    regime: RegimeLabel,
    audit: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let clock = Arc::new(SystemClock::new());
    let broker = Arc::new(PaperBroker::new(config.paper.clone(), clock.clone()));
    let capacity = config.scheduler.channel_capacity;

    let runtime = build(
        config,
        Collaborators {
            clock,
            broker: broker.clone(),
            advisory: Arc::new(StaticAdvisory::new(regime)),
            notifier: Arc::new(LogNotifier),
        },
    )?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = runtime.start(shutdown_rx);

    let (event_tx, mut event_rx) = mpsc::channel::<MarketEvent>(capacity);
    let feed = tokio::spawn(read_events(BufReader::new(tokio::io::stdin()), event_tx));

    let pipeline = Arc::clone(&runtime.pipeline);
    let forward = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match &event {
                MarketEvent::Bar(bar) => broker.set_price(bar.instrument.clone(), bar.close),
                MarketEvent::Tick { instrument, price, .. } => broker.set_price(instrument.clone(), *price),
                MarketEvent::Gap { .. } => {}
            }
            if let Err(e) = pipeline.ingest(event).await {
                warn!("[FEED] event not applied: {e}");
            }
        }
    });

    let interrupted = tokio::select! {
        _ = tokio::signal::ctrl_c() => true,
        _ = forward => false,
    };
    if interrupted {
        info!("[MAIN] interrupt received");
        feed.abort();
    }
    match feed.await {
        Ok(Ok(stats)) => info!("[MAIN] feed: {} events, {} malformed", stats.events, stats.malformed),
        Ok(Err(e)) => warn!("[MAIN] feed stopped: {e}"),
        Err(e) if e.is_cancelled() => {}
        Err(e) => error!("[MAIN] feed task failed: {e}"),
    }

    shutdown_tx.send(true)?;
    if !runtime.scheduler.wait_idle(Duration::from_secs(30)).await {
        warn!("[MAIN] cycles still running at shutdown");
    }
    for task in tasks.drain(..) {
        let _ = task.await;
    }

    match runtime.executor.reconcile().await {
        Ok(report) if report.is_clean() => info!("[MAIN] broker reconciled: {} positions", report.matched),
        Ok(report) => warn!("[MAIN] reconciliation mismatch: {report:?}"),
        Err(e) => warn!("[MAIN] reconciliation failed: {e}"),
    }

    let ledger = runtime.ledger.snapshot();
    let risk = runtime.risk.snapshot();
    info!(
        "[MAIN] done: cycles={:?} open={} realized_pnl={} daily_loss={} breaker={}",
        runtime.scheduler.stats(),
        ledger.open.len(),
        ledger.realized_pnl,
        risk.daily_loss,
        risk.breaker_tripped()
    );

    if let Some(path) = audit {
        let file = std::io::BufWriter::new(std::fs::File::create(&path)?);
        let written = runtime.decisions.write_json_lines(file)?;
        info!("[MAIN] {written} decisions written to {}", path.display());
    }
    Ok(())
}
