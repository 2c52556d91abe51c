use clap::Parser;
use njord_bus::Bus;
use njord_controller::Session;
use njord_core::{Clock, IntentMetaStore, SystemClock};
use njord_journal::Journal;
use njord_killswitch::{InMemorySharedState, KillSwitch};
use njord_portfolio::{PortfolioTracker, TargetAllocations};
use njord_risk::{InMemoryPositionView, ReferencePriceCache, RiskConfig, RiskEngine};
use njord_wiring::{
    cli::{Cli, Command, KillswitchAction},
    config::AppConfig,
    load_layered,
    validate,
    wiring::run_risk_loop,
    stop_signal, tail,
};
use std::{path::PathBuf, sync::Arc};
use tokio::sync::watch;
use tracing::{error, info};

// Usage errors (exit code 2) are handled by clap itself via `Cli::parse`.
const EXIT_VALIDATION: i32 = 3;
const EXIT_RUNTIME: i32 = 4;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();
}

fn load_and_validate(cli: &Cli) -> AppConfig {
    let config = match load_layered(&cli.config, cli.env_overlay.as_deref(), cli.secrets_overlay.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!(%err, "config load failed");
            std::process::exit(EXIT_VALIDATION);
        }
    };
    if let Err(err) = validate(&config, &njord_wiring::Secrets::new()) {
        error!(%err, "config validation failed");
        std::process::exit(EXIT_VALIDATION);
    }
    config
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let code = match &cli.command {
        Command::Killswitch { action } => {
            let config = load_and_validate(&cli);
            run_killswitch(&config, action).await
        }
        Command::Tail { topic, journal_dir } => run_tail(topic, journal_dir).await,
        Command::Stop { service } => run_stop(service),
        Command::Start { service } => {
            let config = load_and_validate(&cli);
            run_start(config, service.clone()).await
        }
    };
    std::process::exit(code);
}

async fn run_killswitch(config: &AppConfig, action: &KillswitchAction) -> i32 {
    let sentinel = PathBuf::from(&config.killswitch.file_path);
    match action {
        KillswitchAction::Trip => {
            if let Some(parent) = sentinel.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            match std::fs::write(&sentinel, b"") {
                Ok(()) => {
                    info!(path = %sentinel.display(), "kill-switch tripped");
                    0
                }
                Err(err) => {
                    error!(%err, "failed to write kill-switch sentinel");
                    EXIT_RUNTIME
                }
            }
        }
        KillswitchAction::Reset => {
            let shared = Arc::new(InMemorySharedState::default());
            let ks = KillSwitch::new(sentinel, &config.killswitch.state_key, shared);
            match ks.reset().await {
                Ok(()) => {
                    info!("kill-switch reset");
                    0
                }
                Err(err) => {
                    error!(%err, "failed to reset kill-switch");
                    EXIT_RUNTIME
                }
            }
        }
    }
}

async fn run_tail(topic: &str, journal_dir: &PathBuf) -> i32 {
    let (_tx, rx) = watch::channel(false);
    let result = tail::tail_topic(journal_dir, topic, rx, |line| println!("{line}")).await;
    match result {
        Ok(()) => 0,
        Err(err) => {
            error!(%err, "tail failed");
            EXIT_RUNTIME
        }
    }
}

fn run_stop(service: &str) -> i32 {
    let run_dir = PathBuf::from("var/run/njord");
    match stop_signal::request_stop(&run_dir, service) {
        Ok(()) => {
            info!(service, "stop requested");
            0
        }
        Err(err) => {
            error!(%err, "failed to request stop");
            EXIT_RUNTIME
        }
    }
}

/// Boot the ambient infra and the risk-evaluation loop for `service`
/// (or every service, if `None`), until ctrl-c or a stop sentinel fires.
async fn run_start(config: AppConfig, service: Option<String>) -> i32 {
    let service_name = service.unwrap_or_else(|| "all".to_string());
    let run_dir = PathBuf::from("var/run/njord");
    let journal_dir = PathBuf::from("var/log/njord");

    let bus = Bus::new();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let shared_state = Arc::new(InMemorySharedState::default());
    let kill_switch = Arc::new(KillSwitch::new(
        PathBuf::from(&config.killswitch.file_path),
        &config.killswitch.state_key,
        shared_state,
    ));
    kill_switch.spawn_poller();

    let reference_prices = Arc::new(ReferencePriceCache::new());
    let positions = Arc::new(InMemoryPositionView::new());
    let _meta_store = Arc::new(IntentMetaStore::new());

    let risk_config = RiskConfig {
        venue: "default".to_string(),
        symbol_allow_list: config.risk.symbol_allow_list.clone(),
        rate_cap_per_strategy: config.risk.rate_cap_per_strategy,
        rate_window_ns: (config.risk.rate_window_s as i64) * 1_000_000_000,
        position_cap_usd: config.risk.position_cap_usd,
        live_micro_cap_usd: config.risk.live_micro_cap_usd,
        live_enabled: config.app.env == njord_wiring::config::Env::Live,
    };
    let risk = Arc::new(RiskEngine::new(risk_config, kill_switch.clone(), reference_prices.clone(), positions.clone()));

    let mut targets = TargetAllocations::new();
    for target in &config.portfolio.targets {
        targets.set(&target.strategy_id, &target.symbol, target.weight);
    }
    let drift_threshold = config.portfolio.drift_threshold.unwrap_or(rust_decimal::Decimal::new(5, 2));
    let rebalance_interval_ns = (config.portfolio.rebalance_interval_s.unwrap_or(3600) as i64) * 1_000_000_000;
    let portfolio = Arc::new(PortfolioTracker::new(
        bus.clone(),
        Journal::new(&journal_dir, "positions.snapshot", None),
        clock.clone(),
        reference_prices.clone(),
        targets,
        drift_threshold,
        rebalance_interval_ns,
    ));

    let session_journal = Journal::new(&journal_dir, "controller.session", None);
    let config_paths: Vec<PathBuf> = vec![];
    let now_ns = clock.now_ns();
    let session = match Session::start(session_journal, &config_paths, vec![service_name.clone()], now_ns).await {
        Ok(s) => s,
        Err(err) => {
            error!(%err, "failed to start session");
            return EXIT_RUNTIME;
        }
    };
    info!(session_id = %session.id, service = %service_name, "njord started");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let risk_task = tokio::spawn(run_risk_loop(bus.clone(), risk, clock.clone(), shutdown_rx.clone()));
    let portfolio_task = tokio::spawn(portfolio.run(shutdown_rx.clone()));

    let mut poll_stop = tokio::time::interval(std::time::Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received, shutting down");
                break;
            }
            _ = poll_stop.tick() => {
                if stop_signal::stop_requested(&run_dir, &service_name) {
                    info!(service = %service_name, "stop sentinel observed, shutting down");
                    let _ = stop_signal::clear(&run_dir, &service_name);
                    break;
                }
            }
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = risk_task.await;
    if let Ok(Err(err)) = portfolio_task.await {
        error!(%err, "portfolio tracker exited with an error");
    }
    if let Err(err) = session.end(clock.now_ns()).await {
        error!(%err, "failed to journal session end");
        return EXIT_RUNTIME;
    }
    0
}
