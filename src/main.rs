use anyhow::Result;
use clap::Parser;
use jurisdiction_monitor::{
    api::HttpEventsApi,
    cli::Args,
    client::ConnectionManager,
    config::Config,
    events::{DashboardEvent, EventSender, create_event_channel},
    formatter::OutputFormat,
    hydrate::{hydrate, mark_read_confirmed, spawn_refresh},
    monitoring::setup_metrics,
    notify::TerminalNotifier,
    pipeline::LivePipeline,
    scheduler::TokioScheduler,
    store::{EventFilter, EventStore, SharedEventStore},
    tracing_setup::setup_tracing,
    transport::TungsteniteTransport,
    ui::{UIController, UIOptions},
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup tracing/logging
    setup_tracing(&args.log_level, args.json_logs)?;

    info!(
        "Starting Jurisdiction Monitor v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Load configuration
    let config = Config::from_args(&args)?;

    // Setup metrics server if enabled
    if config.metrics.enabled {
        setup_metrics(config.metrics.port).await?;
        info!("Metrics server started on port {}", config.metrics.port);
    }

    let store = EventStore::shared(config.store.capacity);
    let (ui_tx, ui_rx) = create_event_channel();

    let transport = Arc::new(TungsteniteTransport::current(
        config.connection.connect_timeout,
    )?);
    let scheduler = Arc::new(TokioScheduler::current()?);
    let manager = ConnectionManager::new(config.connection.clone(), transport, scheduler);

    let notifier = Arc::new(TerminalNotifier::new(
        config.display.notifications,
        config.display.colored,
    ));
    let pipeline = LivePipeline::attach(&manager, store.clone(), notifier, Some(ui_tx.clone()));

    let jurisdictions = config
        .connection
        .filter
        .as_ref()
        .map(|f| f.jurisdiction_ids.clone())
        .unwrap_or_default();
    let mut ui = UIController::new(
        ui_rx,
        store.clone(),
        OutputFormat::from(config.display.format.as_str()),
        UIOptions {
            colored: config.display.colored,
            quiet: config.display.quiet,
            top: config.display.top,
            filter: EventFilter::all().with_jurisdictions(jurisdictions),
        },
    );
    let mut ui_task = tokio::spawn(async move { ui.run().await });

    manager.connect(config.connection.filter.clone());

    let refresh = match &config.api.base_url {
        Some(base_url) => {
            let api = HttpEventsApi::new(
                base_url.clone(),
                config.api.auth_token.as_deref(),
                config.api.request_timeout,
            )?;
            load_history(&config, &store, api, &ui_tx).await
        }
        None => {
            info!("No REST endpoint configured, showing live events only");
            None
        }
    };

    info!("Monitor started. Press Ctrl+C to shutdown...");
    let ui_finished = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received");
            false
        }
        _ = &mut ui_task => true,
    };

    if let Some(refresh) = refresh {
        refresh.abort();
    }
    pipeline.detach();
    manager.disconnect();

    if !ui_finished
        && ui_tx.send(DashboardEvent::Stopping).await.is_ok()
        && let Err(e) = ui_task.await
    {
        warn!("UI task ended abnormally: {}", e);
    }

    info!(health = %manager.health().to_json(), "Monitor stopped");
    Ok(())
}

/// Initial hydration, requested mark-reads, then the periodic refresh task.
async fn load_history(
    config: &Config,
    store: &SharedEventStore,
    api: HttpEventsApi,
    ui: &EventSender,
) -> Option<JoinHandle<()>> {
    match hydrate(store, &api, config.api.page_size).await {
        Ok(report) => {
            info!(
                fetched = report.fetched,
                unread = report.unread,
                "Event history loaded"
            );
            let _ = ui.send(DashboardEvent::Hydrated(report)).await;
        }
        Err(e) => {
            error!("Failed to load event history: {}", e);
            let _ = ui.send(DashboardEvent::HydrateFailed(e.to_string())).await;
        }
    }

    for id in &config.display.mark_read {
        if let Err(e) = mark_read_confirmed(store, &api, id).await {
            let _ = ui
                .send(DashboardEvent::MarkReadFailed {
                    id: id.clone(),
                    reason: e.to_string(),
                })
                .await;
        }
    }

    config.api.refresh_interval.map(|period| {
        spawn_refresh(store.clone(), api, period, config.api.page_size)
    })
}
