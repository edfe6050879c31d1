//! Bootstrap - wiring the pipeline from configuration
//!
//! Builds every component once, shares them through `Arc`, and hands back a
//! `Runtime` whose `start` spawns the long-running tasks:
//! - advisory refresher (trigger consumer) and its scheduled timer
//! - one evaluation ticker per instrument
//! - the trading-day boundary check

use std::sync::Arc;

use fxpilot_advisory::{
    AdvisoryBudget, AdvisoryCache, AdvisoryRefresher, MarketSummaryProvider, RefreshTrigger,
    RegimeFilter, spawn_refresh_timer,
};
use fxpilot_core::InstrumentId;
use fxpilot_order_manager::{OrderExecutor, PositionLedger};
use fxpilot_ports::{AdvisorySource, BrokerGateway, Clock, NotificationSink};
use fxpilot_risk_manager::RiskManager;
use fxpilot_strategy::{FeatureEngine, LocalSignalModel};
use log::{info, warn};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::audit::DecisionLog;
use crate::config::PipelineConfig;
use crate::error::BootstrapError;
use crate::market::MarketStore;
use crate::pipeline::Pipeline;
use crate::scheduler::Scheduler;

/// External collaborators the pipeline is wired against
pub struct Collaborators {
    pub clock: Arc<dyn Clock>,
    pub broker: Arc<dyn BrokerGateway>,
    pub advisory: Arc<dyn AdvisorySource>,
    pub notifier: Arc<dyn NotificationSink>,
}

/// Fully wired pipeline
pub struct Runtime {
    pub config: PipelineConfig,
    pub clock: Arc<dyn Clock>,
    pub market: Arc<MarketStore>,
    pub model: Arc<LocalSignalModel>,
    pub cache: Arc<AdvisoryCache>,
    pub budget: Arc<AdvisoryBudget>,
    pub refresher: Arc<AdvisoryRefresher>,
    pub risk: Arc<RiskManager>,
    pub ledger: Arc<PositionLedger>,
    pub executor: Arc<OrderExecutor>,
    pub decisions: Arc<DecisionLog>,
    pub pipeline: Arc<Pipeline>,
    pub scheduler: Arc<Scheduler>,
    refresh_tx: mpsc::Sender<RefreshTrigger>,
    refresh_rx: Mutex<Option<mpsc::Receiver<RefreshTrigger>>>,
}

/// Builds the runtime. Fails only on invalid config or an unreadable model.
pub fn build(config: PipelineConfig, collaborators: Collaborators) -> Result<Runtime, BootstrapError> {
    config.validate()?;
    let Collaborators {
        clock,
        broker,
        advisory,
        notifier,
    } = collaborators;
    let now = clock.now();

    let engine = FeatureEngine::new(config.features.clone());
    let market = Arc::new(MarketStore::new(
        &config.instruments,
        config.scheduler.window_capacity,
        engine.clone(),
    ));

    let model = Arc::new(LocalSignalModel::empty());
    match &config.model.path {
        Some(path) => {
            model.load_from_path(path)?;
            info!(
                "[BOOT] model {} loaded from {}",
                model.version().unwrap_or_default(),
                path.display()
            );
        }
        None => warn!("[BOOT] no model configured; every cycle will be skipped"),
    }

    let cache = Arc::new(AdvisoryCache::new(config.regime, config.advisory.cache_ttl()));
    let budget = Arc::new(AdvisoryBudget::new(config.advisory.daily_cap, config.calendar));
    let summaries: Arc<dyn MarketSummaryProvider> = market.clone();
    let refresher = Arc::new(AdvisoryRefresher::new(
        advisory,
        summaries,
        Arc::clone(&cache),
        Arc::clone(&budget),
        Arc::clone(&clock),
        Arc::clone(&notifier),
        config.advisory.clone(),
    ));
    let filter = Arc::new(RegimeFilter::new(
        Arc::clone(&cache),
        config.regime,
        Arc::clone(&clock),
    ));

    let risk = Arc::new(RiskManager::new(config.risk.clone(), config.calendar, now));
    let ledger = Arc::new(PositionLedger::new());
    let executor = Arc::new(OrderExecutor::new(
        broker,
        Arc::clone(&risk),
        Arc::clone(&ledger),
        Arc::clone(&clock),
        Arc::clone(&notifier),
        config.execution.clone(),
    ));

    let decisions = Arc::new(DecisionLog::new());
    let pipeline = Arc::new(Pipeline::new(
        Arc::clone(&market),
        engine,
        Arc::clone(&model),
        filter,
        Arc::clone(&risk),
        Arc::clone(&executor),
        notifier,
        Arc::clone(&decisions),
        Arc::clone(&clock),
    ));
    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&pipeline),
        Arc::clone(&risk),
        Arc::clone(&clock),
        config.scheduler.clone(),
    ));

    let (refresh_tx, refresh_rx) = mpsc::channel(config.scheduler.channel_capacity);
    info!(
        "[BOOT] pipeline ready: instruments={:?} max_open={} advisory_cap={}/day",
        config.instruments.iter().map(|i| i.as_str()).collect::<Vec<_>>(),
        config.risk.max_open_positions,
        config.advisory.daily_cap
    );

    Ok(Runtime {
        config,
        clock,
        market,
        model,
        cache,
        budget,
        refresher,
        risk,
        ledger,
        executor,
        decisions,
        pipeline,
        scheduler,
        refresh_tx,
        refresh_rx: Mutex::new(Some(refresh_rx)),
    })
}

impl Runtime {
    /// Spawns the background tasks. A second call spawns only the tickers.
    pub fn start(&self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();
        if let Some(rx) = self.refresh_rx.lock().take() {
            handles.push(tokio::spawn(
                Arc::clone(&self.refresher).run(rx, shutdown.clone()),
            ));
            handles.push(spawn_refresh_timer(
                self.refresh_tx.clone(),
                self.config.advisory.refresh_interval(),
                shutdown.clone(),
            ));
        }
        handles.extend(self.scheduler.spawn(&self.config.instruments, shutdown));
        handles
    }

    /// Requests an out-of-band regime refresh (news, operator)
    pub async fn request_refresh(&self, trigger: RefreshTrigger) -> bool {
        self.refresh_tx.send(trigger).await.is_ok()
    }

    pub fn instruments(&self) -> &[InstrumentId] {
        &self.config.instruments
    }
}
