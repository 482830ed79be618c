mod config;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use casework_core::audit::action_types;
use casework_db::{PgEventSink, PgHealthProbe};
use casework_events::{
    AuditEvent, DomainEvent, EventSink, HealthProbe, InProcessBroker, MessageBroker,
};
use casework_pipeline::{
    BrokerHealthProbe, BufferFlushService, ConnectionStateTracker, Dependency, EventBuffer,
    EventPublisher, EventSubscriber, FallbackEventStore, FallbackReplayService, HealthMonitor,
    NoopEventPublisher, ResilientEventPublisher,
};

use config::WorkerConfig;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "casework_worker=debug,casework_pipeline=debug,casework_db=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env();
    tracing::info!(
        buffer_dir = %config.pipeline.buffer_dir.display(),
        fallback_dir = %config.pipeline.fallback_dir.display(),
        events_enabled = config.events_enabled,
        "Loaded worker configuration",
    );

    // --- Database ---
    // Lazy pool: the worker must come up during a store outage and let the
    // health monitor drive recovery.
    let pool = casework_db::create_pool_lazy(&config.database_url)
        .expect("DATABASE_URL must be a valid Postgres URL");
    tracing::info!("Database pool created");

    // --- Shared pipeline state ---
    let tracker = Arc::new(ConnectionStateTracker::new());
    let broker: Arc<dyn MessageBroker> = Arc::new(InProcessBroker::new());
    let sink: Arc<dyn EventSink> = Arc::new(PgEventSink::new(pool.clone()));

    // --- Durable queues ---
    let fallback = Arc::new(
        FallbackEventStore::open(&config.pipeline.fallback_dir)
            .await
            .expect("Failed to open fallback event store"),
    );
    let buffer = Arc::new(
        EventBuffer::open(&config.pipeline.buffer_dir, config.pipeline.buffer_capacity)
            .await
            .expect("Failed to open event buffer"),
    );
    if buffer.recovered_events() > 0 {
        tracing::info!(
            recovered = buffer.recovered_events(),
            "Carried over buffered events from previous run",
        );
    }

    // --- Background services ---
    let cancel = CancellationToken::new();
    let mut handles = Vec::new();

    let store_probe = Arc::new(PgHealthProbe::new(pool.clone())) as Arc<dyn HealthProbe>;
    let store_monitor = HealthMonitor::with_config(
        Dependency::Store,
        store_probe,
        Arc::clone(&tracker),
        config.pipeline.monitor.clone(),
    );
    let store_cancel = cancel.clone();
    handles.push(tokio::spawn(async move {
        store_monitor.run(store_cancel).await;
    }));

    let broker_probe = Arc::new(BrokerHealthProbe::new(Arc::clone(&broker))) as Arc<dyn HealthProbe>;
    let broker_monitor = HealthMonitor::with_config(
        Dependency::Broker,
        broker_probe,
        Arc::clone(&tracker),
        config.pipeline.monitor.clone(),
    );
    let broker_cancel = cancel.clone();
    handles.push(tokio::spawn(async move {
        broker_monitor.run(broker_cancel).await;
    }));

    let subscriber = EventSubscriber::new(
        Arc::clone(&broker),
        Arc::clone(&sink),
        Arc::clone(&buffer),
        Arc::clone(&tracker),
        config.pipeline.channels.clone(),
    );
    let subscriber_cancel = cancel.clone();
    handles.push(tokio::spawn(async move {
        subscriber.run(subscriber_cancel).await;
    }));

    let flush = BufferFlushService::with_interval(
        Arc::clone(&buffer),
        Arc::clone(&sink),
        Arc::clone(&tracker),
        config.pipeline.flush_interval,
    );
    let flush_cancel = cancel.clone();
    handles.push(tokio::spawn(async move {
        flush.run(flush_cancel).await;
    }));

    let replay = FallbackReplayService::with_config(
        Arc::clone(&fallback),
        Arc::clone(&broker),
        Arc::clone(&tracker),
        config.pipeline.replay.clone(),
    );
    let replay_cancel = cancel.clone();
    handles.push(tokio::spawn(async move {
        replay.run(replay_cancel).await;
    }));

    tracing::info!("Pipeline services started (monitors, subscriber, flush, replay)");

    // --- Startup marker event ---
    let publisher: Arc<dyn EventPublisher> = if config.events_enabled {
        Arc::new(ResilientEventPublisher::new(
            Arc::clone(&broker),
            Arc::clone(&tracker),
            Some(Arc::clone(&fallback)),
        ))
    } else {
        Arc::new(NoopEventPublisher)
    };
    publisher
        .publish(&config.pipeline.channels.audit, &startup_event())
        .await;

    // --- Shutdown ---
    shutdown_signal().await;
    cancel.cancel();
    for handle in handles {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }
    tracing::info!("Event worker stopped");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the worker
/// shuts down cleanly whether stopped interactively or by a process
/// manager (e.g. systemd, Docker, Kubernetes).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

fn startup_event() -> DomainEvent {
    DomainEvent::Audit(AuditEvent {
        actor_user_id: None,
        actor_name: Some("casework-worker".to_string()),
        action: action_types::SYSTEM.to_string(),
        entity_type: "service".to_string(),
        entity_id: None,
        old_values: None,
        new_values: Some(serde_json::json!({ "status": "started" })),
        timestamp: chrono::Utc::now(),
    })
}
