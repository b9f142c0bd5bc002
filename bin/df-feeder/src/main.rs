//! Device feeder service
//!
//! Consumes commands from the dispatch queue and delivers them to edge nodes,
//! fanning out `org.*` commands through the node registry.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use df_config::{AppConfig, ConfigLoader, ServiceEndpointConfig};
use df_feeder::api::{create_router, ApiState};
use df_feeder::{
    ClientConfig, CommandDispatcher, DispatcherConfig, ExecutorConfig, FeederListener, ListenerConfig,
    LookupClient, RegistryClient, RequestExecutor, RequestMultiplier,
};
use df_queue::amqp::{AmqpBroker, BrokerConfig};
use df_queue::{QueuePublisher, TopologyConfig};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::{net::TcpListener, signal, sync::watch};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// How long in-flight deliveries get to finish after shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let config = ConfigLoader::new().load()?;
    df_common::logging::init_logging("df-feeder", config.debug_mode);

    info!(
        queue = %config.amqp.queue,
        routing_key = %config.amqp.routing_key,
        max_retry_count = config.feeder.max_retry_count,
        retry_period_seconds = config.feeder.retry_period_seconds,
        concurrency = config.feeder.concurrency_level,
        "Starting device feeder"
    );

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    let broker = Arc::new(AmqpBroker::connect(broker_config(&config), topology_config(&config)).await?);
    let publisher: Arc<dyn QueuePublisher> = Arc::new(broker.publisher());

    let registry = Arc::new(RegistryClient::new(&client_config(&config.registry))?);
    let lookup = Arc::new(LookupClient::new(&client_config(&config.lookup))?);

    let executor = Arc::new(RequestExecutor::new(lookup, executor_config(&config))?);
    let multiplier = Arc::new(RequestMultiplier::new(registry, publisher));
    let dispatcher = Arc::new(CommandDispatcher::new(
        executor,
        multiplier,
        DispatcherConfig {
            max_retry_count: config.feeder.max_retry_count,
        },
    ));
    let listener = Arc::new(FeederListener::new(
        broker.clone(),
        dispatcher,
        ListenerConfig {
            concurrency: config.feeder.concurrency_level,
        },
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let app = create_router(ApiState::new(listener.ready_flag(), Some(metrics_handle)))
        .layer(TraceLayer::new_for_http());
    let addr = format!("{}:{}", config.http.host, config.http.port);
    let tcp_listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "Starting HTTP API server");

    let server_task = {
        let shutdown = wait_for_shutdown(shutdown_rx.clone());
        tokio::spawn(async move {
            if let Err(e) = axum::serve(tcp_listener, app).with_graceful_shutdown(shutdown).await {
                error!(error = %e, "HTTP API server failed");
            }
        })
    };

    let mut listener_task = {
        let listener = listener.clone();
        let shutdown = wait_for_shutdown(shutdown_rx);
        tokio::spawn(async move { listener.run(shutdown).await })
    };

    info!("Device feeder started. Press Ctrl+C to shutdown.");

    let finished_early = tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received, draining in-flight deliveries...");
            None
        }
        result = &mut listener_task => Some(result),
    };

    let _ = shutdown_tx.send(true);

    let listener_result = match finished_early {
        Some(result) => result,
        None => match tokio::time::timeout(DRAIN_TIMEOUT, listener_task).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_secs = DRAIN_TIMEOUT.as_secs(), "Listener did not drain in time");
                Ok(Ok(()))
            }
        },
    };

    if tokio::time::timeout(Duration::from_secs(5), server_task).await.is_err() {
        warn!("HTTP API server did not stop in time");
    }
    broker.close().await;

    match listener_result {
        Ok(Ok(())) => {
            info!("Device feeder shutdown complete");
            Ok(())
        }
        Ok(Err(e)) => {
            error!(error = %e, "Listener stopped unexpectedly");
            Err(e.into())
        }
        Err(e) => {
            error!(error = %e, "Listener task panicked");
            Err(e.into())
        }
    }
}

fn broker_config(config: &AppConfig) -> BrokerConfig {
    BrokerConfig {
        uri: config.amqp.uri.clone(),
        prefetch_count: u16::try_from(config.feeder.concurrency_level).unwrap_or(u16::MAX),
        ..Default::default()
    }
}

fn topology_config(config: &AppConfig) -> TopologyConfig {
    TopologyConfig {
        exchange: config.amqp.exchange.clone(),
        queue: config.amqp.queue.clone(),
        routing_key: config.amqp.routing_key.clone(),
        retry_exchange: config.amqp.retry_exchange.clone(),
        waiting_queue: config.amqp.waiting_queue.clone(),
        retry_period: Duration::from_secs(config.feeder.retry_period_seconds),
        durable: true,
    }
}

fn executor_config(config: &AppConfig) -> ExecutorConfig {
    ExecutorConfig {
        device_port: config.feeder.device_port,
        request_timeout: Duration::from_secs(config.feeder.device_request_timeout_seconds),
        resolver_not_found_permanent: config.feeder.resolver_not_found_permanent,
    }
}

fn client_config(endpoint: &ServiceEndpointConfig) -> ClientConfig {
    ClientConfig::new(endpoint.url.clone(), Duration::from_secs(endpoint.timeout_seconds))
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stopping| *stopping).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
